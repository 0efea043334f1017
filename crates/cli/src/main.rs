//! sftpdiff binary entry point.
//!
//! Compare files across hosts by streaming them over SFTP into the local
//! diff tool.

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use sftpdiff_cli::{Cli, Comparison};

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("sftpdiff=debug,sftpdiff_cli=debug,sftpdiff_proto=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    let code = rt.block_on(run(cli));
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let comparison = Comparison::new(cli.diff_args());
    match comparison.compare_files(&cli.file1, &cli.file2).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "comparison failed");
            eprintln!("sftpdiff: {}", e);
            2
        }
    }
}
