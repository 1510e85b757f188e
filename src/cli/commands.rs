//! Command implementations for the enrollment CLI
//!
//! Library calls that block on the network or disk run on the blocking
//! pool; batch commands show a progress bar unless output is quiet or JSON.

use crate::cache::CacheEntry;
use crate::classify::era_for_year;
use crate::cli::args::{Args, CacheAction, Commands, OutputFormat};
use crate::config::EnrollmentConfig;
use crate::frames::{long_to_frame, write_csv};
use crate::models::{GradeBand, LongRecord};
use crate::pipeline::{EnrollmentClient, EnrollmentData};
use crate::query::{filter_by_county, filter_by_district, grade_band_rollup};
use crate::registry::YearRegistry;

use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Rows printed before the table is cut short
const PREVIEW_ROWS: usize = 20;

/// Main command runner
pub async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);
    args.validate()?;

    let config = load_configuration(&args)?;
    let registry = match &args.registry {
        Some(path) => YearRegistry::from_json_file(path)
            .with_context(|| format!("Failed to load registry {}", path.display()))?,
        None => YearRegistry::default(),
    };
    let client = EnrollmentClient::new(config).with_registry(registry);

    let Some(command) = args.command.clone() else {
        return Ok(());
    };

    match command {
        Commands::Fetch(fetch) => {
            let tidy = !fetch.wide;
            let policy = fetch.cache_policy();
            let data = blocking({
                let client = client.clone();
                move || client.fetch_enr_with(fetch.year, tidy, policy)
            })
            .await
            .with_context(|| format!("Failed to fetch {}", fetch.year))?;
            report_data(&args, &data, fetch.output.as_deref())?;
        }
        Commands::Range(range) => {
            let years: Vec<u16> = (range.start..=range.end).collect();
            let data = run_batch(&args, &client, &years, !range.wide).await?;
            report_data(&args, &data, range.output.as_deref())?;
        }
        Commands::Import(import) => {
            let year = import.year;
            let tidy = !import.wide;
            let path = import.path.clone();
            let data = blocking({
                let client = client.clone();
                move || client.import_local_enr(&path, year, tidy)
            })
            .await
            .with_context(|| format!("Failed to import {}", import.path.display()))?;
            report_data(&args, &data, import.output.as_deref())?;
        }
        Commands::Years => report_years(&args, client.registry())?,
        Commands::Summary(summary) => {
            let rows = client.get_state_summary(&summary.years).await;
            report_long(&args, "Statewide enrollment", &rows, None)?;
        }
        Commands::District(district) => {
            let records = fetch_tidy_long(&client, district.year).await?;
            let rows = filter_by_district(&records, &district.code);
            let title = format!("District {} ({})", district.code, district.year);
            report_long(&args, &title, &rows, district.output.as_deref())?;
        }
        Commands::County(county) => {
            let records = fetch_tidy_long(&client, county.year).await?;
            let rows = filter_by_county(&records, &county.name);
            let title = format!("Matching \"{}\" ({})", county.name, county.year);
            report_long(&args, &title, &rows, county.output.as_deref())?;
        }
        Commands::Band(band) => {
            let grade_band = GradeBand::from(band.band);
            let records = fetch_tidy_long(&client, band.year).await?;
            let rows = grade_band_rollup(&records, grade_band);
            let title = format!("{} rollup ({})", grade_band.label(), band.year);
            report_long(&args, &title, &rows, band.output.as_deref())?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Status => report_cache(&args, &client.cache_status()?)?,
            CacheAction::Clear { year } => {
                let removed = client.clear_cache(year)?;
                println!(
                    "{} {} cache entr{}",
                    "Removed".bright_green().bold(),
                    removed,
                    if removed == 1 { "y" } else { "ies" }
                );
            }
        },
    }

    info!("Finished in {}", HumanDuration(start_time.elapsed()));
    Ok(())
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nv_enrollment={}", log_level)));

    if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .context("Failed to initialize logging")?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Config file (if any), then command-line overrides
fn load_configuration(args: &Args) -> Result<EnrollmentConfig> {
    let mut config = match &args.config {
        Some(path) => EnrollmentConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EnrollmentConfig::default(),
    };

    if let Some(cache_dir) = &args.cache_dir {
        config = config.with_cache_dir(cache_dir);
    }

    debug!("Loaded configuration: {:?}", config);
    Ok(config)
}

/// Run a library call on the blocking pool
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(f)
        .await
        .context("Background task failed")?;
    Ok(result?)
}

async fn fetch_tidy_long(client: &EnrollmentClient, year: u16) -> Result<Vec<LongRecord>> {
    let data = blocking({
        let client = client.clone();
        move || client.fetch_enr(year, true, true)
    })
    .await
    .with_context(|| format!("Failed to fetch {}", year))?;

    Ok(match data {
        EnrollmentData::Tidy(records) => records.into_iter().map(|r| r.record).collect(),
        EnrollmentData::Wide(_) => Vec::new(),
    })
}

async fn run_batch(
    args: &Args,
    client: &EnrollmentClient,
    years: &[u16],
    tidy: bool,
) -> Result<EnrollmentData> {
    let progress_bar = if args.show_progress() {
        let pb = ProgressBar::new(years.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        pb.set_message("Fetching...");
        Some(pb)
    } else {
        None
    };

    let report = client
        .fetch_enr_batch(years, tidy, progress_bar.clone())
        .await;

    if let Some(pb) = &progress_bar {
        pb.finish_and_clear();
    }

    if args.output_format == OutputFormat::Human {
        for (year, error) in &report.failures {
            println!("{} {}: {}", "Skipped".yellow().bold(), year, error);
        }
    }
    Ok(report.data)
}

fn report_data(args: &Args, data: &EnrollmentData, output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        data.write_csv(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    match args.output_format {
        OutputFormat::Json => {
            let json = match data {
                EnrollmentData::Wide(records) => serde_json::to_string_pretty(records)?,
                EnrollmentData::Tidy(records) => serde_json::to_string_pretty(records)?,
            };
            println!("{}", json);
        }
        OutputFormat::Human => {
            let years: Vec<String> = data.years().iter().map(u16::to_string).collect();
            println!(
                "{} {} {} records for {}",
                "Loaded".bright_green().bold(),
                data.len(),
                data.representation(),
                if years.is_empty() { "no years".to_string() } else { years.join(", ") }
            );

            match data {
                EnrollmentData::Wide(records) => {
                    println!(
                        "{}",
                        format!(
                            "  {:<9} {:<6} {:<40} {:<6} {:>10}",
                            "level", "code", "name", "grade", "total"
                        )
                        .bright_black()
                    );
                    for r in records.iter().take(PREVIEW_ROWS) {
                        println!(
                            "  {:<9} {:<6} {:<40} {:<6} {:>10}",
                            r.entity.entity_type.as_str(),
                            entity_code(&r.entity),
                            truncate(entity_label(&r.entity), 40),
                            r.grade_level,
                            r.enrollment_total
                                .map(|n| n.to_string())
                                .unwrap_or_else(|| "-".to_string())
                        );
                    }
                }
                EnrollmentData::Tidy(records) => {
                    let rows: Vec<&LongRecord> = records.iter().map(|r| &r.record).collect();
                    print_long_table(&rows);
                }
            }

            if data.len() > PREVIEW_ROWS {
                println!(
                    "  {}",
                    format!("... {} more rows", data.len() - PREVIEW_ROWS).bright_black()
                );
            }
            if let Some(path) = output {
                println!("{} {}", "Wrote".bright_green().bold(), path.display());
            }
        }
    }
    Ok(())
}

fn report_long(args: &Args, title: &str, rows: &[LongRecord], output: Option<&Path>) -> Result<()> {
    if let Some(path) = output {
        write_csv(&mut long_to_frame(rows)?, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    match args.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Human => {
            println!("{} ({} rows)", title.bright_cyan().bold(), rows.len());
            let refs: Vec<&LongRecord> = rows.iter().collect();
            print_long_table(&refs);
            if rows.len() > PREVIEW_ROWS {
                println!(
                    "  {}",
                    format!("... {} more rows", rows.len() - PREVIEW_ROWS).bright_black()
                );
            }
            if let Some(path) = output {
                println!("{} {}", "Wrote".bright_green().bold(), path.display());
            }
        }
    }
    Ok(())
}

fn print_long_table(rows: &[&LongRecord]) {
    println!(
        "{}",
        format!(
            "  {:<5} {:<9} {:<6} {:<32} {:<6} {:<18} {:>9} {:>7}",
            "year", "level", "code", "name", "grade", "subgroup", "n", "pct"
        )
        .bright_black()
    );
    for r in rows.iter().take(PREVIEW_ROWS) {
        println!(
            "  {:<5} {:<9} {:<6} {:<32} {:<6} {:<18} {:>9} {:>7}",
            r.end_year,
            r.entity.entity_type.as_str(),
            entity_code(&r.entity),
            truncate(entity_label(&r.entity), 32),
            r.grade_level,
            r.subgroup,
            r.n_students,
            r.pct
                .map(|p| format!("{:.1}%", p * 100.0))
                .unwrap_or_else(|| "-".to_string())
        );
    }
}

fn report_years(args: &Args, registry: &YearRegistry) -> Result<()> {
    let (Some(min), Some(max)) = (registry.min_year(), registry.max_year()) else {
        println!("{}", "No years registered".yellow());
        return Ok(());
    };

    if args.output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&registry.available_years())?);
        return Ok(());
    }

    println!("{}", "Enrollment years:".bright_green().bold());
    for year in min..=max {
        let era = era_for_year(year);
        if registry.is_available(year) {
            println!(
                "  {} {}",
                year.to_string().bright_yellow().bold(),
                format!("({}-{}, {} format)", year - 1, year, era).bright_black()
            );
        } else {
            println!(
                "  {} {}",
                year.to_string().bright_black(),
                "not currently available".yellow()
            );
        }
    }
    Ok(())
}

fn report_cache(args: &Args, entries: &[CacheEntry]) -> Result<()> {
    if args.output_format == OutputFormat::Json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .map(|e| {
                serde_json::json!({
                    "end_year": e.key.end_year,
                    "representation": e.key.representation.as_str(),
                    "path": e.path,
                    "size_bytes": e.size_bytes,
                    "modified": e.modified.to_rfc3339(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", "Cache is empty".bright_black());
        return Ok(());
    }

    println!("{}", "Cached entries:".bright_green().bold());
    let mut total = 0;
    for entry in entries {
        total += entry.size_bytes;
        println!(
            "  {} {:<5} {:>10}  {}",
            entry.key.end_year.to_string().bright_yellow().bold(),
            entry.key.representation.as_str(),
            format_size(entry.size_bytes),
            format!("{} days old", entry.age().num_days()).bright_black()
        );
    }
    println!("  {} {}", "Total:".bold(), format_size(total));
    Ok(())
}

fn entity_code(entity: &crate::models::EntityIdentity) -> &str {
    entity
        .school_code
        .as_deref()
        .or(entity.lea_code.as_deref())
        .or(entity.district_code.as_deref())
        .unwrap_or("")
}

fn entity_label(entity: &crate::models::EntityIdentity) -> &str {
    entity
        .school_name
        .as_deref()
        .or(entity.organization_name())
        .unwrap_or("")
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Human-readable byte size
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}
