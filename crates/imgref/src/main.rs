//! imgref - find every markdown document that embeds an image.

mod cli;
mod config;
mod documents;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when `RUST_LOG` is unset.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "imgref=debug,imgref_core=debug"
    } else {
        "imgref=info,imgref_core=info"
    }
}

fn main() -> anyhow::Result<()> {
    let opts = cli::Opts::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(opts.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    cli::run(opts)
}
