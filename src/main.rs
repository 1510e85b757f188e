use clap::Parser;
use nv_enrollment::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        tokio::select! {
            result = commands::run(args) => result,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nReceived CTRL+C, shutting down...");
                Err(anyhow::anyhow!("Interrupted by user"))
            }
        }
    });

    if let Err(error) = result {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("nv-enrollment - Nevada school enrollment data");
    println!("=============================================");
    println!();
    println!("Fetch the Nevada Validation Day enrollment workbooks, normalize them");
    println!("into one schema and query them by district, county or grade band.");
    println!();
    println!("USAGE:");
    println!("    nv-enrollment <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    fetch       Fetch one school year (tidy by default, --wide for wide)");
    println!("    range       Fetch an inclusive range of years");
    println!("    import      Process a workbook downloaded by hand");
    println!("    years       List available years");
    println!("    summary     Statewide total enrollment per year");
    println!("    district    Rows for one district / LEA code");
    println!("    county      Rows matching a county name");
    println!("    band        K-8, 9-12 or K-12 rollup");
    println!("    cache       Show or clear the cache");
    println!();
    println!("EXAMPLES:");
    println!("    nv-enrollment fetch 2024 --output enr_2024.csv");
    println!("    nv-enrollment fetch 2024 --refresh");
    println!("    nv-enrollment range 2021 2026");
    println!("    nv-enrollment district 2024 2");
    println!("    nv-enrollment band 2024 hs --output-format json");
    println!("    nv-enrollment import ~/Downloads/2018-2019.xlsx 2019");
    println!();
    println!("For detailed help on any command, use:");
    println!("    nv-enrollment <COMMAND> --help");
}
