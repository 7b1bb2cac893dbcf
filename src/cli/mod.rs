// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Three commands are supported:
//   1. `split`    — builds dev / labeled / unlabeled pools
//   2. `train`    — runs the self-training rounds
//   3. `evaluate` — scores the latest checkpoints on a file
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, SplitArgs, TrainArgs};

/// clap reads the fields and generates argument parsing code
/// via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "lexicon-self-training",
    version = "0.1.0",
    about = "Grow a small labeled text pool with lexicon-guided pseudo-labels."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Split(args)    => run_split(args),
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_split(args: SplitArgs) -> Result<()> {
    use crate::application::split_use_case::SplitUseCase;

    let split = SplitUseCase::new(args.into()).execute()?;
    println!(
        "Split complete: {} dev, {} labeled, {} unlabeled.",
        split.dev.len(), split.labeled.len(), split.unlabeled.len()
    );
    Ok(())
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::self_train_use_case::SelfTrainUseCase;

    tracing::info!("Starting self-training on '{}' in '{}'", args.dataset, args.data_dir);

    let report = SelfTrainUseCase::new(args.into()).execute()?;
    println!(
        "Self-training complete after {} rounds: {} examples accepted, {} still unlabeled.",
        report.rounds_run, report.accepted, report.remaining
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let score = EvaluateUseCase::new(args.into()).execute()?;
    println!("{score}");
    Ok(())
}
