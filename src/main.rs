mod cli;
mod commands;
mod config;
mod downloader;
mod error;
mod plan;
mod progress;

use std::process;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    pretty_env_logger::init_timed();
    process::exit(cli::run())
}
