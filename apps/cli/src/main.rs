//! couchpack CLI: assemble CouchDB design documents from directory trees.
//!
//! Reads `couchpack.toml`, loads each design document's views, lists,
//! shows, schemas and attachments from disk, and writes the assembled JSON.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
