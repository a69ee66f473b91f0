mod args;
mod platform;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    platform::run_app(args::Args::parse())
}
