use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use gpio_scpi::cli::Args;
use gpio_scpi::instrument::Instrument;
use gpio_scpi::pin::NullHardware;
use gpio_scpi::{buzzer, server};

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    buzzer::play_intro(args.tune_folder.as_deref());

    let instrument = Arc::new(Mutex::new(Instrument::new(
        Box::new(NullHardware),
        args.strict_errors,
    )));

    server::run(&args.bind, args.port, instrument)
        .context("SCPI server terminated unexpectedly")
}
