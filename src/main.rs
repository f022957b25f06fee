use clap::Parser;
use std::process;
use warehouse_auditor::cli::{args::Args, commands};

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
                Err(warehouse_auditor::Error::processing_interrupted(
                    "Interrupted by user".to_string(),
                ))
            }
        }
    });

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(2);
        }
    }
}

/// Show help information when no subcommand is provided
fn show_help_and_commands() {
    println!("Warehouse Auditor - Delimited File Loader and Data Quality Validator");
    println!("====================================================================");
    println!();
    println!("Load large TSV/CSV files into a warehouse table with a fail-fast quality");
    println!("gate, then audit loaded tables for missing dates, anomalous daily volumes,");
    println!("and duplicate composite keys.");
    println!();
    println!("USAGE:");
    println!("    warehouse-auditor <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    load               Quality-check a file and COPY it into its table");
    println!("    validate           Validate one or all configured tables");
    println!("    check-duplicates   Run the duplicate-key analysis alone");
    println!("    report             Validate many tables in parallel with a summary");
    println!("    delete             Delete a table's rows within a date range");
    println!("    help               Show this help message or help for a command");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Show help information");
    println!("    -V, --version    Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Load a file with the quality gate:");
    println!("    warehouse-auditor load --file events_2024-04.tsv --table events");
    println!();
    println!("    # Validate one table for a month:");
    println!("    warehouse-auditor validate --table events --month 2024-04");
    println!();
    println!("    # Full report across all configured tables:");
    println!("    warehouse-auditor report --max-workers 8 --output report.json");
    println!();
    println!("For detailed help on any command, use:");
    println!("    warehouse-auditor <COMMAND> --help");
}
