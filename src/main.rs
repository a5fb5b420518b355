//! # hotelprep command-line entry point
//!
//! ```text
//! main()
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Load config (--config, ./hotelprep.json, or defaults)
//!   ├─> Initialize logging
//!   └─> Create Tokio runtime and execute the command
//! ```
//!
//! ```bash
//! hotelprep download
//! hotelprep process --data-version 1
//! hotelprep process --destination db --data-version 1
//! hotelprep train --data-version 1 --model-version v1
//! ```

#![expect(clippy::print_stdout)] // CLI output goes to stdout

mod cli;

use anyhow::{Context as _, Result};
use clap::Parser as _;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    let config = hotelprep::config::load_app_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    hotelprep::logging::init(config.log_dir.as_deref())?;

    tokio::runtime::Runtime::new()?.block_on(cli::run_command(cli.command, &config))
}
