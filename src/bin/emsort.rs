use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use emsort::{CheckOutcome, ExternalSorter, SortOutcome, check_file, generate_file};

#[derive(Parser)]
#[command(
    name = "emsort",
    about = "External multi-way merge sort for flat files of 64-bit integers"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a file of random 64-bit integers
    Generate {
        file: PathBuf,

        /// Number of records to write
        count: u64,

        /// Pre-sort the generated records
        #[arg(long)]
        sorted: bool,
    },
    /// Check whether a file is sorted ascending (full linear scan)
    Check { file: PathBuf },
    /// Sort a file in place
    Sort {
        file: PathBuf,

        /// Memory budget in MiB (default: one tenth of the file size)
        #[arg(short, long)]
        memory_mb: Option<usize>,
    },
}

fn main() -> ExitCode {
    // clap exits with 2 on usage errors by default; this tool reports every
    // failure as 1.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Generate {
            file,
            count,
            sorted,
        } => {
            generate_file(&file, count, sorted)
                .map_err(|e| format!("cannot generate {}: {}", file.display(), e))?;
            println!(
                "Generated {} 64-bit integers into {}{}",
                count,
                file.display(),
                if sorted { " (sorted)" } else { "" }
            );
            Ok(())
        }
        Command::Check { file } => {
            match check_file(&file)? {
                CheckOutcome::Sorted => println!("File is sorted ascending."),
                CheckOutcome::Unsorted {
                    index,
                    previous,
                    value,
                } => {
                    println!(
                        "File is NOT sorted (found {} after {} at record {}).",
                        value, previous, index
                    );
                }
            }
            Ok(())
        }
        Command::Sort { file, memory_mb } => {
            let sorter = match memory_mb {
                Some(mb) => ExternalSorter::with_memory_limit_mb(mb),
                None => ExternalSorter::new(),
            };
            if let SortOutcome::Sorted(stats) = sorter.sort(&file)? {
                println!("{stats}");
            }
            Ok(())
        }
    }
}
