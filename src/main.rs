pub mod action;
pub mod app;
pub mod cli;
pub mod config;
pub mod enumerator;
pub mod enums;
pub mod error;
pub mod orchestrator;
pub mod phase;
pub mod privilege;
pub mod report;
pub mod runner;
pub mod session;
pub mod snapshot;
pub mod utils;

use clap::Parser;
use cli::Cli;
use color_eyre::eyre::Result;

use crate::{
    app::App,
    utils::{initialize_logging, initialize_panic_handler},
};

async fn tokio_main() -> Result<()> {
    initialize_logging()?;

    initialize_panic_handler()?;

    let args = Cli::parse();
    log::info!("{} starting: {:?}", env!("CARGO_PKG_NAME"), args.command);
    let mut app = App::new(args.config.as_deref())?;
    app.run(args.command).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = tokio_main().await {
        eprintln!("{} error: Something went wrong", env!("CARGO_PKG_NAME"));
        Err(e)
    } else {
        Ok(())
    }
}
