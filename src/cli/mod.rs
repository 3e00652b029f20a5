// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `stream` — runs the full pipeline and draws batches
//   2. `pack`   — runs only the window packer and reports stats
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PackArgs, StreamArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "activation-store",
    version = "0.1.0",
    about = "Stream transformer activations from a corpus and serve shuffled training batches."
)]
pub struct Cli {
    /// The subcommand to run (stream or pack)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Stream(args) => Self::run_stream(args),
            Commands::Pack(args)   => Self::run_pack(args),
        }
    }

    /// Handles the `stream` subcommand.
    fn run_stream(args: StreamArgs) -> Result<()> {
        use crate::application::stream_use_case::StreamUseCase;

        tracing::info!("Streaming activations from: {}", args.corpus);

        // Convert CLI args → application config (separates presentation from domain)
        let use_case = StreamUseCase::new(args.into());
        use_case.execute()?;

        println!("Streaming run complete. Metrics written.");
        Ok(())
    }

    /// Handles the `pack` subcommand.
    fn run_pack(args: PackArgs) -> Result<()> {
        use crate::application::pack_use_case::PackUseCase;

        let use_case = PackUseCase::new(args.into());
        let report   = use_case.execute()?;

        println!(
            "Packed {} windows: {} tokens, {} boundary markers.",
            report.windows, report.tokens, report.boundary_markers,
        );
        Ok(())
    }
}
