// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands: `split`, `train` and
// `evaluate`, and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, BackendKind, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{
    evaluate_use_case::EvaluateConfig,
    self_train_use_case::{BackendKind, SelfTrainConfig},
    split_use_case::SplitConfig,
};
use crate::domain::{lexicon::MinerConfig, pseudo_label::PseudoLabelConfig};

/// The three top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split a total-pool TSV into dev, labeled and unlabeled pools
    Split(SplitArgs),

    /// Run lexicon-guided self-training
    Train(TrainArgs),

    /// Score the latest checkpoints on a labeled TSV file
    Evaluate(EvaluateArgs),
}

// ─── split ───────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Total pool, one `label<TAB>text` row per line
    #[arg(long)]
    pub input: String,

    /// Where the three pool files are written
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Prefix of the output files (<name>_dev.tsv, ...)
    #[arg(long, default_value = "dbpedia")]
    pub name: String,

    /// Preset (imdb, ag, yahoo, dbpedia) or comma-separated labels
    #[arg(long, default_value = "dbpedia")]
    pub labels: String,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Dev rows per class (overrides the proportional default)
    #[arg(long)]
    pub dev_per_class: Option<usize>,

    /// Labeled rows per class
    #[arg(long)]
    pub labeled_per_class: Option<usize>,

    /// Maximum unlabeled rows per class
    #[arg(long)]
    pub unlabeled_per_class: Option<usize>,
}

impl From<SplitArgs> for SplitConfig {
    fn from(a: SplitArgs) -> Self {
        SplitConfig {
            input:     a.input,
            data_dir:  a.data_dir,
            name:      a.name,
            labels:    a.labels,
            seed:      a.seed,
            dev:       a.dev_per_class,
            labeled:   a.labeled_per_class,
            unlabeled: a.unlabeled_per_class,
        }
    }
}

// ─── train ───────────────────────────────────────────────────────────────────
/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory holding the split files
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Split name: reads <data_dir>/<dataset>_{dev,labeled,unlabeled}.tsv
    #[arg(long, default_value = "dbpedia")]
    pub dataset: String,

    /// Preset or comma-separated labels (defaults to the dataset name)
    #[arg(long)]
    pub labels: Option<String>,

    /// Working copies of the labeled and unlabeled pools
    #[arg(long, default_value = "work")]
    pub work_dir: String,

    /// Per-class lexicon files (defaults to <work_dir>/lexicons)
    #[arg(long)]
    pub lexicon_dir: Option<String>,

    /// Directory to save checkpoints, tokenizers and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// BERT vocab.txt for the encoder tokenizer (built from the corpus if absent)
    #[arg(long)]
    pub vocab_file: Option<String>,

    /// Word vectors in text format for the recurrent classifier
    #[arg(long)]
    pub word_vectors: Option<String>,

    /// Labeled TSV to evaluate on after the last round
    #[arg(long)]
    pub test_file: Option<String>,

    /// Keep existing work pools instead of copying the split again
    #[arg(long)]
    pub resume: bool,

    /// cpu (NdArray) or gpu (WGPU)
    #[arg(long, default_value = "gpu")]
    pub backend: BackendKind,

    /// Number of self-training rounds
    #[arg(long, default_value_t = 5)]
    pub rounds: usize,

    /// Epochs each fresh classifier trains per round
    #[arg(long, default_value_t = 3)]
    pub warmup_epochs: usize,

    #[arg(long, default_value_t = 48)]
    pub batch_size: usize,

    /// Maximum number of tokens per input sequence
    #[arg(long, default_value_t = 128)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    // ── Lexicon mining ──
    /// Attention positions kept per example
    #[arg(long, default_value_t = 4)]
    pub top_k: usize,

    /// Distinct keywords an example needs to contribute a phrase
    #[arg(long, default_value_t = 3)]
    pub min_keywords: usize,

    /// Phrases kept per class
    #[arg(long, default_value_t = 50)]
    pub lexicon_size: usize,

    // ── Pseudo-labeling ──
    /// Lexicon matches that label an example when both classifiers agree
    #[arg(long, default_value_t = 3)]
    pub primary_matches: usize,

    /// Lexicon matches that label an example on their own
    #[arg(long, default_value_t = 4)]
    pub secondary_matches: usize,

    /// Minimum confidence for an assignment to be queued
    #[arg(long, default_value_t = 0.9)]
    pub confidence_threshold: f32,

    /// Class each label is counted under for the quota, e.g. 0,1,2,...,9,9,9,9
    #[arg(long, value_delimiter = ',')]
    pub queue_class_map: Vec<usize>,

    // ── Encoder classifier ──
    #[arg(long, default_value_t = 30522)]
    pub encoder_vocab_size: usize,

    /// Hidden dimension of the transformer
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,

    #[arg(long, default_value_t = 1e-4)]
    pub encoder_lr: f64,

    // ── Recurrent classifier ──
    /// Vocabulary cap when no word vectors are given
    #[arg(long, default_value_t = 50000)]
    pub recurrent_vocab_size: usize,

    /// Ignored when word vectors are given
    #[arg(long, default_value_t = 300)]
    pub embed_dim: usize,

    /// LSTM hidden size per direction
    #[arg(long, default_value_t = 150)]
    pub hidden_dim: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub recurrent_lr: f64,
}

/// Convert CLI TrainArgs into the application-layer SelfTrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for SelfTrainConfig {
    fn from(a: TrainArgs) -> Self {
        SelfTrainConfig {
            labels:         a.labels.unwrap_or_else(|| a.dataset.clone()),
            lexicon_dir:    a.lexicon_dir.unwrap_or_else(|| format!("{}/lexicons", a.work_dir)),
            data_dir:       a.data_dir,
            dataset:        a.dataset,
            work_dir:       a.work_dir,
            checkpoint_dir: a.checkpoint_dir,
            vocab_file:     a.vocab_file,
            word_vectors:   a.word_vectors,
            test_file:      a.test_file,
            resume:         a.resume,

            backend:        a.backend,
            rounds:         a.rounds,
            warmup_epochs:  a.warmup_epochs,
            batch_size:     a.batch_size,
            max_seq_len:    a.max_seq_len,
            seed:           a.seed,
            miner: MinerConfig {
                top_k:        a.top_k,
                min_keywords: a.min_keywords,
                lexicon_size: a.lexicon_size,
            },
            labeling: PseudoLabelConfig {
                primary_matches:      a.primary_matches,
                secondary_matches:    a.secondary_matches,
                confidence_threshold: a.confidence_threshold,
                queue_class_map:      a.queue_class_map,
            },

            encoder_vocab_size: a.encoder_vocab_size,
            d_model:            a.d_model,
            num_heads:          a.num_heads,
            num_layers:         a.num_layers,
            d_ff:               a.d_ff,
            dropout:            a.dropout,
            encoder_lr:         a.encoder_lr,

            recurrent_vocab_size: a.recurrent_vocab_size,
            embed_dim:            a.embed_dim,
            hidden_dim:           a.hidden_dim,
            recurrent_lr:         a.recurrent_lr,
        }
    }
}

// ─── evaluate ────────────────────────────────────────────────────────────────
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Labeled TSV file to score
    #[arg(long)]
    pub file: String,

    /// Directory where `train` saved its checkpoints
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, default_value = "gpu")]
    pub backend: BackendKind,

    /// Defaults to the batch size used in training
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            checkpoint_dir: a.checkpoint_dir,
            file:           a.file,
            backend:        a.backend,
            batch_size:     a.batch_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_train_args_fill_nested_configs() {
        let cli = Cli::try_parse_from([
            "lexicon-self-training", "train",
            "--dataset", "ag",
            "--backend", "cpu",
            "--queue-class-map", "0,1,1,1",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: SelfTrainConfig = args.into();

        assert_eq!(cfg.labels, "ag");
        assert_eq!(cfg.lexicon_dir, "work/lexicons");
        assert_eq!(cfg.backend, BackendKind::Cpu);
        assert_eq!(cfg.labeling.queue_class_map, vec![0, 1, 1, 1]);
        assert_eq!(cfg.miner, MinerConfig::default());
        assert_eq!(cfg.batch_size, 48);
    }
}
