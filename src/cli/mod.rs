// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes each subcommand to its use
// case in Layer 2. Runs use the WGPU backend on its default device.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{CheckpointArgs, Commands, RetrainArgs, TrainArgs};

use crate::application::{resume_use_case::ResumeUseCase, train_use_case::TrainUseCase};
use crate::ml::{TrainBackend, TrainDevice};

#[derive(Parser, Debug)]
#[command(
    name = "emorec",
    version,
    about = "Train, evaluate and explain emotion classifiers over conversation turns."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Thin routing only; all work happens in the use cases.
    pub fn run(self) -> Result<()> {
        let device = TrainDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);

        match self.command {
            Commands::Train(args) => run_train(args, &device),
            Commands::Eval(args) => run_eval(args, &device),
            Commands::Explain(args) => run_explain(args, &device),
            Commands::Retrain(args) => run_retrain(args, &device),
        }
    }
}

fn run_train(args: TrainArgs, device: &TrainDevice) -> Result<()> {
    let config = crate::domain::config::RunConfig::from(&args);
    let outcomes = TrainUseCase::new(config)
        .with_note(args.note)
        .with_lr_sweep(args.tune_lr)
        .execute::<TrainBackend>(device)?;

    for out in outcomes {
        println!(
            "Run finished ({:?} after {} epochs), best valid_acc {:.2}% → '{}'",
            out.summary.phase,
            out.summary.epochs_run,
            out.summary.best_valid_acc,
            out.run_dir.display()
        );
    }
    Ok(())
}

fn run_eval(args: CheckpointArgs, device: &TrainDevice) -> Result<()> {
    let use_case = ResumeUseCase::open(&args.checkpoint)?;
    use_case.eval::<TrainBackend>(device)?;
    println!("f1_score written to '{}'", use_case.plan().manager.log_path().display());
    Ok(())
}

fn run_explain(args: CheckpointArgs, device: &TrainDevice) -> Result<()> {
    let (path, written) = ResumeUseCase::open(&args.checkpoint)?.explain::<TrainBackend>(device)?;
    println!("Wrote {} explanations to '{}'", written, path.display());
    Ok(())
}

fn run_retrain(args: RetrainArgs, device: &TrainDevice) -> Result<()> {
    let use_case = ResumeUseCase::open(&args.checkpoint.checkpoint)?;
    let summary = use_case.retrain::<TrainBackend>(args.rem_epoch, args.patience, device)?;
    println!(
        "Retrain finished ({:?} after {} epochs), best valid_acc {:.2}% in '{}'",
        summary.phase,
        summary.epochs_run,
        summary.best_valid_acc,
        use_case.run_dir().display()
    );
    Ok(())
}
