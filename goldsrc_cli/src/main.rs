#![warn(clippy::all, clippy::pedantic)]

mod dump;

use dump::{dump, Dump};

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(version = "0.1.0")]
struct Opts {
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    Dump(Dump),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = Opts::parse();

    match opts.subcommand {
        SubCommand::Dump(opts) => dump(opts),
    }
}
