//! Coupon assignment optimiser

use std::io;

use anyhow::Result;
use clap::Parser;

use coupons::{cli::Cli, logging};

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    cli.run(&mut handle)
}
