//! vmops - resilient VM lifecycle orchestration for session-based hypervisor endpoints

#![cfg_attr(test, allow(clippy::expect_used))]

use clap::Parser;
use vmops_cli::cli::Cli;
use vmops_cli::domain::VmopsError;
use vmops_cli::output::json::format_error;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    if let Err(e) = cli.run().await {
        if json {
            let code = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<VmopsError>())
                .map_or("error", |err| err.kind().code());
            match format_error(&format!("{e:#}"), code) {
                Ok(out) => println!("{out}"),
                Err(_) => eprintln!("Error: {e:#}"),
            }
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }
}
