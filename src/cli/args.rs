//! Command-line argument definitions for the enrollment CLI
//!
//! Global flags (cache location, config files, verbosity) apply to every
//! subcommand.

use crate::error::{EnrollmentError, Result};
use crate::models::GradeBand;
use crate::pipeline::CachePolicy;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Fetch, cache and query Nevada school enrollment data
#[derive(Debug, Clone, Parser)]
#[command(
    name = "nv-enrollment",
    version,
    about = "Fetch, normalize and query Nevada Validation Day enrollment data",
    long_about = "Downloads the Nevada Department of Education enrollment workbooks, \
                  normalizes their year-to-year layout changes into one schema, and \
                  caches the results as parquet. Output is tidy (one row per entity, \
                  grade and subgroup) unless --wide is given."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Cache directory (overrides config file and NV_ENROLLMENT_CACHE_DIR)
    #[arg(long = "cache-dir", value_name = "PATH", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// JSON year registry override: {"2024": "https://...", "2025": null}
    #[arg(long = "registry", value_name = "FILE", global = true)]
    pub registry: Option<PathBuf>,

    /// Increase logging verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only show warnings and errors
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// How results are printed
    #[arg(long = "output-format", value_enum, default_value = "human", global = true)]
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Fetch one school year (by end year, e.g. 2024 for 2023-24)
    Fetch(FetchArgs),
    /// Fetch an inclusive range of years; failed years are skipped
    Range(RangeArgs),
    /// Process a workbook that was downloaded by hand
    Import(ImportArgs),
    /// List the years the source publishes
    Years,
    /// Statewide total enrollment per year
    Summary(SummaryArgs),
    /// Rows for one district / LEA code
    District(DistrictArgs),
    /// Rows whose district or LEA name contains a county name
    County(CountyArgs),
    /// Grade-band rollup (K-8, 9-12 or K-12)
    Band(BandArgs),
    /// Inspect or clear the on-disk cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Clone, Parser)]
pub struct FetchArgs {
    /// School year end, e.g. 2024
    pub year: u16,

    /// Wide output (one column per subgroup) instead of tidy
    #[arg(long)]
    pub wide: bool,

    /// Refetch from the source and overwrite the cached entry
    #[arg(long, conflicts_with = "no_cache")]
    pub refresh: bool,

    /// Neither read nor update the cache
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Write the records to a CSV file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct RangeArgs {
    pub start: u16,
    pub end: u16,

    #[arg(long)]
    pub wide: bool,

    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct ImportArgs {
    /// Path to an .xlsx / .xls workbook
    pub path: PathBuf,

    /// School year end the workbook belongs to
    pub year: u16,

    #[arg(long)]
    pub wide: bool,

    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct SummaryArgs {
    /// Years to include (default: every available year)
    pub years: Vec<u16>,
}

#[derive(Debug, Clone, Parser)]
pub struct DistrictArgs {
    pub year: u16,

    /// District or LEA code; "2" and "02" are the same
    pub code: String,

    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct CountyArgs {
    pub year: u16,

    /// Case-insensitive name fragment, e.g. "washoe"
    pub name: String,

    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Parser)]
pub struct BandArgs {
    pub year: u16,

    #[arg(value_enum)]
    pub band: BandArg,

    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CacheAction {
    /// List cached entries with size and age
    Status,
    /// Remove one year's entries, or everything
    Clear {
        /// Year to remove (default: all)
        year: Option<u16>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BandArg {
    /// Kindergarten through grade 8
    K8,
    /// Grades 9-12
    Hs,
    /// Kindergarten through grade 12
    K12,
}

impl FetchArgs {
    pub fn cache_policy(&self) -> CachePolicy {
        if self.no_cache {
            CachePolicy::Bypass
        } else if self.refresh {
            CachePolicy::Refresh
        } else {
            CachePolicy::Use
        }
    }
}

impl From<BandArg> for GradeBand {
    fn from(band: BandArg) -> Self {
        match band {
            BandArg::K8 => GradeBand::K8,
            BandArg::Hs => GradeBand::HighSchool,
            BandArg::K12 => GradeBand::K12,
        }
    }
}

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored tables
    Human,
    /// JSON on stdout
    Json,
}

impl Args {
    /// Reject argument combinations that cannot work
    pub fn validate(&self) -> Result<()> {
        for (label, path) in [("Config file", &self.config), ("Registry file", &self.registry)] {
            if let Some(path) = path {
                if !path.exists() {
                    return Err(EnrollmentError::Configuration {
                        message: format!("{} does not exist: {}", label, path.display()),
                    });
                }
            }
        }

        if let Some(Commands::Range(range)) = &self.command {
            if range.start > range.end {
                return Err(EnrollmentError::Configuration {
                    message: format!(
                        "Range start {} is after end {}",
                        range.start, range.end
                    ),
                });
            }
        }
        Ok(())
    }

    /// Log level for the crate's own events
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "warn"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    /// Progress bars only in interactive, human-readable mode
    pub fn show_progress(&self) -> bool {
        !self.quiet && self.output_format == OutputFormat::Human
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_parsing() {
        let args = Args::try_parse_from([
            "nv-enrollment",
            "fetch",
            "2024",
            "--wide",
            "--no-cache",
        ])
        .unwrap();
        match args.command {
            Some(Commands::Fetch(fetch)) => {
                assert_eq!(fetch.year, 2024);
                assert!(fetch.wide);
                assert!(fetch.no_cache);
                assert!(fetch.output.is_none());
                assert_eq!(fetch.cache_policy(), CachePolicy::Bypass);
            }
            other => panic!("Expected fetch, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_refresh_flag() {
        let args = Args::try_parse_from(["nv-enrollment", "fetch", "2024", "--refresh"]).unwrap();
        match args.command {
            Some(Commands::Fetch(fetch)) => assert_eq!(fetch.cache_policy(), CachePolicy::Refresh),
            other => panic!("Expected fetch, got {:?}", other),
        }

        let args = Args::try_parse_from(["nv-enrollment", "fetch", "2024"]).unwrap();
        match args.command {
            Some(Commands::Fetch(fetch)) => assert_eq!(fetch.cache_policy(), CachePolicy::Use),
            other => panic!("Expected fetch, got {:?}", other),
        }

        assert!(
            Args::try_parse_from(["nv-enrollment", "fetch", "2024", "--refresh", "--no-cache"])
                .is_err()
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "nv-enrollment",
            "district",
            "2024",
            "2",
            "--cache-dir",
            "/tmp/enr",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.cache_dir, Some(PathBuf::from("/tmp/enr")));
        assert_eq!(args.get_log_level(), "trace");
    }

    #[test]
    fn test_band_values() {
        let args = Args::try_parse_from(["nv-enrollment", "band", "2023", "hs"]).unwrap();
        match args.command {
            Some(Commands::Band(band)) => {
                assert_eq!(GradeBand::from(band.band), GradeBand::HighSchool)
            }
            other => panic!("Expected band, got {:?}", other),
        }
        assert!(Args::try_parse_from(["nv-enrollment", "band", "2023", "k5"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["nv-enrollment", "-q", "-v", "years"]).is_err());
        let quiet = Args::try_parse_from(["nv-enrollment", "-q", "years"]).unwrap();
        assert_eq!(quiet.get_log_level(), "warn");
        assert!(!quiet.show_progress());
    }

    #[test]
    fn test_validate_range_order() {
        let args = Args::try_parse_from(["nv-enrollment", "range", "2024", "2021"]).unwrap();
        assert!(matches!(
            args.validate(),
            Err(EnrollmentError::Configuration { .. })
        ));
    }

    #[test]
    fn test_cache_clear_optional_year() {
        let args = Args::try_parse_from(["nv-enrollment", "cache", "clear"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Commands::Cache {
                action: CacheAction::Clear { year: None }
            })
        ));
    }
}
