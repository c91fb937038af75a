use clap::Parser;

use lmsops_cli::Cli;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = lmsops_cli::run(cli) {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
