//! Cookbook FS CLI Binary

use clap::Parser;
use cookbook_fs::logging::init_logging;
use cookbook_fs::tooling::cli::{Cli, CliContext};
use std::process;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match CliContext::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    if let Err(e) = init_logging(Some(&cli.logging_config(&config))) {
        eprintln!("Error initializing logging: {}", e);
        process::exit(1);
    }

    let context = match CliContext::new(&config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error initializing server tree: {:#}", e);
            process::exit(1);
        }
    };

    match context.execute(&cli.command).await {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
