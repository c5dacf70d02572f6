// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Four subcommands:
//
//   train    fresh run (or a --tune-lr sweep)
//   eval     report and re-score a stored checkpoint on test
//   explain  per-example predictions for the test split
//   retrain  more epochs from a stored checkpoint
//
// eval, explain and retrain take their hyperparameters from the
// log.json beside the checkpoint, so they only need its path.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::domain::config::{InputType, RunConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a classifier from scratch
    Train(TrainArgs),

    /// Evaluate a stored checkpoint on the test split
    Eval(CheckpointArgs),

    /// Write per-example predictions for the test split
    Explain(CheckpointArgs),

    /// Continue training a stored checkpoint
    Retrain(RetrainArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Dataset name; files are read from <data-dir>/<dataset>/
    #[arg(long, default_value = "ed")]
    pub dataset: String,

    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Root for run directories
    #[arg(long, default_value = "save")]
    pub save_dir: String,

    /// rcnn, transformer or sl_transformer
    #[arg(long, default_value = "transformer")]
    pub arch: String,

    /// speaker, listener or speaker+listener
    #[arg(long, default_value = "speaker+listener")]
    pub input_type: InputType,

    /// "word" builds a word-level tokenizer from train; otherwise a tokenizer.json path
    #[arg(long, default_value = "word")]
    pub tokenizer: String,

    /// random or glove
    #[arg(long, default_value = "random")]
    pub embedding_type: String,

    /// Whitespace-separated vector file, required for glove
    #[arg(long)]
    pub embedding_path: Option<String>,

    #[arg(long, default_value_t = 300)]
    pub embedding_length: usize,

    /// Number of emotion classes; must match the dataset's labels
    #[arg(long, default_value_t = 32)]
    pub output_size: usize,

    #[arg(long, default_value_t = 256)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    /// Tokens per utterance, including [CLS] and [SEP]
    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 12)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 3e-5)]
    pub lr: f64,

    /// Decay the learning rate every N epochs; 0 keeps it constant
    #[arg(long, default_value_t = 10)]
    pub step_size: usize,

    #[arg(long, default_value_t = 0.5)]
    pub lr_gamma: f64,

    /// Gradient value clip applied before each optimizer step
    #[arg(long, default_value_t = 0.1)]
    pub grad_clip: f64,

    #[arg(long, default_value_t = 5)]
    pub nepoch: usize,

    /// Stop after this many epochs without a better validation accuracy
    #[arg(long, default_value_t = 30)]
    pub patience: usize,

    /// k for the top-k test accuracy
    #[arg(long, default_value_t = 3)]
    pub top_k: usize,

    /// Print a confusion matrix after each evaluation
    #[arg(long)]
    pub confusion: bool,

    /// Print per-class accuracy after each evaluation
    #[arg(long)]
    pub per_class: bool,

    /// Progress line every N training steps
    #[arg(long, default_value_t = 100)]
    pub log_every: usize,

    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Comma-separated learning rates; one full run per rate
    #[arg(long, value_delimiter = ',')]
    pub tune_lr: Vec<f64>,

    /// Free text stored in log.json
    #[arg(long, default_value = "")]
    pub note: String,
}

/// The application layer never sees clap types.
impl From<&TrainArgs> for RunConfig {
    fn from(a: &TrainArgs) -> Self {
        RunConfig {
            learning_rate:    a.lr,
            batch_size:       a.batch_size,
            hidden_size:      a.hidden_size,
            output_size:      a.output_size,
            arch_name:        a.arch.clone(),
            input_type:       a.input_type,
            tokenizer:        a.tokenizer.clone(),
            embedding_type:   a.embedding_type.clone(),
            embedding_length: a.embedding_length,
            embedding_path:   a.embedding_path.clone(),
            max_seq_len:      a.max_seq_len,
            step_size:        (a.step_size > 0).then_some(a.step_size),
            lr_gamma:         a.lr_gamma,
            nepoch:           a.nepoch,
            patience:         a.patience,
            start_epoch:      0,
            dataset:          a.dataset.clone(),
            data_dir:         a.data_dir.clone(),
            save_dir:         a.save_dir.clone(),
            confusion:        a.confusion,
            per_class:        a.per_class,
            top_k:            a.top_k,
            grad_clip:        a.grad_clip,
            num_heads:        a.num_heads,
            num_layers:       a.num_layers,
            d_ff:             a.d_ff,
            dropout:          a.dropout,
            log_every:        a.log_every,
            seed:             a.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct CheckpointArgs {
    /// Run directory, or a checkpoint / model_best file inside one
    #[arg(long)]
    pub checkpoint: PathBuf,
}

#[derive(Args, Debug)]
pub struct RetrainArgs {
    #[command(flatten)]
    pub checkpoint: CheckpointArgs,

    /// Epochs to run on top of the stored checkpoint
    #[arg(long, default_value_t = 10)]
    pub rem_epoch: usize,

    #[arg(long, default_value_t = 10)]
    pub patience: usize,
}
