use std::process;

use clap::Parser;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use runboard::cli::{self, Cli};
use runboard::config::Config;

fn main() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUNBOARD_LOG")
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = cli::run(cli, &config) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
