// ============================================================
// Layer 2 — SelfTrainUseCase
// ============================================================
// Orchestrates the self-training run:
//
//   Step 1: Resolve labels, prepare work pools   (Layer 4 - data)
//   Step 2: Rebuild both tokenizers              (Layer 6 - infra)
//   Step 3: Save run + architecture configs      (Layer 6 - infra)
//   Step 4: For every round:
//     4a. Load labeled + unlabeled pools         (Layer 4 - data)
//     4b. Train fresh classifiers                (Layer 5 - ml)
//     4c. Inference passes over unlabeled        (Layer 5 - ml)
//     4d. Mine, pseudo-label, rebalance          (RoundEngine)
//     4e. Log metrics, checkpoint                (Layer 6 - infra)
//   Step 5: Evaluate on the test pool            (optional)
//
// The loop stops after `rounds` rounds or as soon as the
// unlabeled pool is empty.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{anyhow, Context, Result};
use burn::{
    backend::{
        ndarray::NdArrayDevice,
        wgpu::WgpuDevice,
        Autodiff, NdArray, Wgpu,
    },
    module::AutodiffModule,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::{fmt, path::{Path, PathBuf}, str::FromStr};

use crate::application::evaluate_use_case::{score_pair, PairScore};
use crate::application::round_engine::RoundEngine;
use crate::data::{
    batcher::ClassificationBatcher,
    dataset::ClassificationDataset,
    pool::TsvPool,
    preprocessor::Preprocessor,
    tokenization::TextEncoder,
};
use crate::domain::{
    label_set::LabelSet,
    lexicon::MinerConfig,
    pseudo_label::PseudoLabelConfig,
    round_state::RoundState,
    traits::{PoolSink, PoolSource},
};
use crate::infra::{
    checkpoint::{CheckpointManager, ENCODER, RECURRENT},
    lexicon_store::LexiconStore,
    metrics::{EpochMetrics, MetricsLogger, RoundMetrics},
    tokenizer_store::TokenizerStore,
    word_vectors::WordVectors,
};
use crate::ml::{
    inferencer::{inference_loader, predict},
    model::EncoderClassifierConfig,
    recurrent::RecurrentClassifierConfig,
    trainer::{train_pair, PairData, TrainSettings, TrainedPair},
};

// ─── Backend selection ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Cpu,
    Gpu,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" | "ndarray" => Ok(Self::Cpu),
            "gpu" | "wgpu"    => Ok(Self::Gpu),
            other => Err(format!("unknown backend '{other}' (expected cpu or gpu)")),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        })
    }
}

// ─── Self-Training Configuration ─────────────────────────────────────────────
// Everything a run needs. Saved next to the checkpoints so
// `evaluate` can rebuild the tokenizers and models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfTrainConfig {
    // ── Files ──
    pub data_dir:       String,
    pub dataset:        String,
    pub labels:         String,
    pub work_dir:       String,
    pub lexicon_dir:    String,
    pub checkpoint_dir: String,
    pub vocab_file:     Option<String>,
    pub word_vectors:   Option<String>,
    pub test_file:      Option<String>,
    /// Keep the work pools of an earlier run instead of re-copying the split.
    pub resume:         bool,

    // ── Loop ──
    pub backend:        BackendKind,
    pub rounds:         usize,
    pub warmup_epochs:  usize,
    pub batch_size:     usize,
    pub max_seq_len:    usize,
    pub seed:           u64,
    pub miner:          MinerConfig,
    pub labeling:       PseudoLabelConfig,

    // ── Encoder classifier ──
    pub encoder_vocab_size: usize,
    pub d_model:            usize,
    pub num_heads:          usize,
    pub num_layers:         usize,
    pub d_ff:               usize,
    pub dropout:            f64,
    pub encoder_lr:         f64,

    // ── Recurrent classifier ──
    pub recurrent_vocab_size: usize,
    pub embed_dim:            usize,
    pub hidden_dim:           usize,
    pub recurrent_lr:         f64,
}

impl Default for SelfTrainConfig {
    fn default() -> Self {
        Self {
            data_dir:       "data".to_string(),
            dataset:        "dbpedia".to_string(),
            labels:         "dbpedia".to_string(),
            work_dir:       "work".to_string(),
            lexicon_dir:    "work/lexicons".to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            vocab_file:     None,
            word_vectors:   None,
            test_file:      None,
            resume:         false,

            backend:        BackendKind::Gpu,
            rounds:         5,
            warmup_epochs:  3,
            batch_size:     48,
            max_seq_len:    128,
            seed:           42,
            miner:          MinerConfig::default(),
            labeling:       PseudoLabelConfig::default(),

            encoder_vocab_size: 30522,
            d_model:            256,
            num_heads:          8,
            num_layers:         4,
            d_ff:               1024,
            dropout:            0.1,
            encoder_lr:         1e-4,

            recurrent_vocab_size: 50000,
            embed_dim:            300,
            hidden_dim:           150,
            recurrent_lr:         1e-3,
        }
    }
}

impl SelfTrainConfig {
    fn split_file(&self, part: &str) -> PathBuf {
        Path::new(&self.data_dir).join(format!("{}_{part}.tsv", self.dataset))
    }
}

/// Result of a whole run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub rounds_run: usize,
    pub accepted:   usize,
    pub remaining:  usize,
    pub test:       Option<PairScore>,
}

// ─── Work pools ──────────────────────────────────────────────────────────────
/// The pool files a run mutates, plus the fixed dev pool.
pub struct WorkPools {
    pub labeled:   TsvPool,
    pub unlabeled: TsvPool,
    pub dev:       TsvPool,
}

impl WorkPools {
    /// Copy the split's labeled / unlabeled files into the work dir
    /// (unless resuming an earlier run that already has them).
    pub fn prepare(cfg: &SelfTrainConfig) -> Result<Self> {
        let work      = Path::new(&cfg.work_dir);
        let labeled   = TsvPool::new(work.join("labeled.tsv"));
        let unlabeled = TsvPool::new(work.join("unlabeled.tsv"));
        let dev       = TsvPool::new(cfg.split_file("dev"));

        if cfg.resume && labeled.exists() && unlabeled.exists() {
            tracing::info!("Resuming from work pools in '{}'", work.display());
        } else {
            for (part, pool) in [("labeled", &labeled), ("unlabeled", &unlabeled)] {
                let source = TsvPool::new(cfg.split_file(part));
                let rows   = source
                    .load_rows()
                    .with_context(|| format!("Run 'split' first to create '{}'", source.path().display()))?;
                pool.write_rows(&rows)?;
                tracing::info!("Copied {} {} rows into '{}'", rows.len(), part, pool.path().display());
            }
        }
        Ok(Self { labeled, unlabeled, dev })
    }
}

// ─── SelfTrainUseCase ────────────────────────────────────────────────────────
pub struct SelfTrainUseCase {
    config: SelfTrainConfig,
}

impl SelfTrainUseCase {
    pub fn new(config: SelfTrainConfig) -> Self {
        Self { config }
    }

    /// Run on the configured backend.
    pub fn execute(&self) -> Result<RunReport> {
        match self.config.backend {
            BackendKind::Gpu => {
                let device = WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                self.run::<Autodiff<Wgpu>>(device)
            }
            BackendKind::Cpu => {
                tracing::info!("Using NdArray CPU backend");
                self.run::<Autodiff<NdArray>>(NdArrayDevice::Cpu)
            }
        }
    }

    pub fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<RunReport> {
        let cfg = &self.config;

        // ── Step 1: Labels and pools ──────────────────────────────────────────
        let labels = LabelSet::parse(&cfg.labels)?;
        cfg.labeling.validate(labels.len())?;
        if cfg.batch_size == 0 {
            return Err(anyhow!("batch size must be at least 1"));
        }
        tracing::info!("{} classes: {}", labels.len(), labels.names().join(", "));

        let pools = WorkPools::prepare(cfg)?;
        let dev   = pools.dev.read_labeled(&labels)?;
        tracing::info!("Dev pool: {} rows", dev.len());

        // ── Step 2: Tokenizers ────────────────────────────────────────────────
        // Rebuilt from this run's pools and vectors, then reused every round
        let corpus  = tokenizer_corpus(&pools)?;
        let vectors = cfg
            .word_vectors
            .as_deref()
            .map(|p| WordVectors::load(Path::new(p)))
            .transpose()?;

        let tok_store = TokenizerStore::new(cfg.checkpoint_dir.clone());
        let encoder_text = TextEncoder::for_encoder(
            tok_store.build_wordpiece(
                &corpus,
                cfg.vocab_file.as_deref().map(Path::new),
                cfg.encoder_vocab_size,
            )?,
            cfg.max_seq_len,
        )?;
        let recurrent_text = TextEncoder::for_recurrent(
            tok_store.build_word_level(
                &corpus,
                vectors.as_ref().map(|v| v.words.as_slice()),
                cfg.recurrent_vocab_size,
            )?,
            cfg.max_seq_len,
        )?;

        // ── Step 3: Architectures and configs ─────────────────────────────────
        let encoder_cfg = EncoderClassifierConfig::new(
            encoder_text.vocab_size(), cfg.max_seq_len, labels.len(),
            cfg.d_model, cfg.num_heads, cfg.num_layers, cfg.d_ff, cfg.dropout,
        );
        // A pretrained table fixes both the vocabulary and the width
        let recurrent_cfg = RecurrentClassifierConfig::new(
            vectors.as_ref().map_or(recurrent_text.vocab_size(), |v| v.rows()),
            vectors.as_ref().map_or(cfg.embed_dim, |v| v.dim),
            cfg.hidden_dim,
            labels.len(),
        );

        let ckpt = CheckpointManager::new(cfg.checkpoint_dir.clone())?;
        ckpt.save_config(cfg)?;
        ckpt.save_model_config(ENCODER, &encoder_cfg)?;
        ckpt.save_model_config(RECURRENT, &recurrent_cfg)?;

        let metrics  = MetricsLogger::new(cfg.checkpoint_dir.clone())?;
        let lexicons = LexiconStore::new(cfg.lexicon_dir.clone());
        let engine   = RoundEngine::new(cfg.miner, &cfg.labeling, &lexicons, &recurrent_text);

        let mut state    = RoundState::new(labels.len());
        let mut rng      = ChaCha8Rng::seed_from_u64(cfg.seed);
        let mut last     = None;
        let mut accepted = 0usize;
        let mut rounds   = 0usize;

        // ── Step 4: Rounds ────────────────────────────────────────────────────
        for round in 0..cfg.rounds {

            // ── 4a: Current pools ─────────────────────────────────────────────
            let labeled   = pools.labeled.read_labeled(&labels)?;
            let unlabeled = pools.unlabeled.read_unlabeled(&labels)?;
            if unlabeled.is_empty() {
                tracing::info!("Unlabeled pool is empty, stopping before round {}", round);
                break;
            }
            tracing::info!(
                "Round {}/{}: {} labeled, {} unlabeled",
                round + 1, cfg.rounds, labeled.len(), unlabeled.len(),
            );
            state.reset(round, &unlabeled);

            // ── 4b: Train fresh classifiers ───────────────────────────────────
            let round_seed = cfg.seed + round as u64;
            B::seed(round_seed);
            let pair = TrainedPair {
                encoder:   encoder_cfg.init::<B>(&device),
                recurrent: match &vectors {
                    Some(v) => recurrent_cfg.init_with_embeddings::<B>(v, &device)?,
                    None    => recurrent_cfg.init::<B>(&device),
                },
            };
            let data = PairData {
                encoder_train:   ClassificationDataset::from_labeled(&encoder_text, &labeled)?,
                encoder_dev:     ClassificationDataset::from_labeled(&encoder_text, &dev)?,
                recurrent_train: ClassificationDataset::from_labeled(&recurrent_text, &labeled)?,
                recurrent_dev:   ClassificationDataset::from_labeled(&recurrent_text, &dev)?,
            };
            let settings = TrainSettings {
                epochs:       cfg.warmup_epochs,
                batch_size:   cfg.batch_size,
                seed:         round_seed,
                encoder_lr:   cfg.encoder_lr,
                recurrent_lr: cfg.recurrent_lr,
            };
            let pair = train_pair(pair, data, &settings, &device, |r| {
                metrics.log_epoch(&EpochMetrics {
                    round,
                    epoch:             r.epoch,
                    encoder_loss:      r.encoder_loss,
                    recurrent_loss:    r.recurrent_loss,
                    encoder_dev_acc:   r.encoder_dev_acc,
                    recurrent_dev_acc: r.recurrent_dev_acc,
                })
            })?;

            // ── 4c: Inference passes (no shuffle, eval mode) ──────────────────
            let encoder_valid   = pair.encoder.valid();
            let recurrent_valid = pair.recurrent.valid();

            let encoder_out = predict(
                &encoder_valid,
                &inference_loader(
                    ClassificationBatcher::<B::InnerBackend>::new(device.clone()),
                    ClassificationDataset::from_unlabeled(&encoder_text, &unlabeled)?,
                    cfg.batch_size,
                ),
            )?;
            let recurrent_out = predict(
                &recurrent_valid,
                &inference_loader(
                    ClassificationBatcher::<B::InnerBackend>::new(device.clone()).sorted_by_length(),
                    ClassificationDataset::from_unlabeled(&recurrent_text, &unlabeled)?,
                    cfg.batch_size,
                ),
            )?;

            // ── 4d: Lexicon, pseudo-labels, rebalancing ───────────────────────
            engine.cache_encoder(&mut state, &encoder_out);
            engine.mine(&mut state, &unlabeled, &recurrent_out)?;
            engine.pseudo_label(&mut state, &unlabeled, &recurrent_out)?;
            let summary = engine.settle(&mut state, &labels, &mut rng, &pools.labeled, &pools.unlabeled)?;

            // ── 4e: Metrics and checkpoints ───────────────────────────────────
            metrics.log_round(&RoundMetrics {
                round,
                unlabeled:        summary.unlabeled,
                queued:           summary.rebalance.queued,
                accepted:         summary.rebalance.accepted,
                pseudo_label_acc: summary.pseudo_label_acc,
            })?;
            for (source, count) in &summary.by_source {
                tracing::debug!("Round {}: {} assignments from {}", round, count, source);
            }

            ckpt.save_model(&pair.encoder, ENCODER, round)?;
            ckpt.save_model(&pair.recurrent, RECURRENT, round)?;
            ckpt.mark_round(round)?;

            println!(
                "Round {:>2}/{} | queued={} | accepted={} | quota={} | pseudo_label_acc={}",
                round + 1, cfg.rounds,
                summary.rebalance.queued, summary.rebalance.accepted, summary.rebalance.quota,
                summary.pseudo_label_acc.map_or_else(|| "n/a".to_string(), |a| format!("{:.1}%", a * 100.0)),
            );

            accepted += summary.rebalance.accepted;
            rounds   += 1;
            last      = Some(pair);
        }

        let remaining = pools.unlabeled.load_rows()?.len();

        // ── Step 5: Test evaluation ───────────────────────────────────────────
        let test = match (&cfg.test_file, &last) {
            (Some(path), Some(pair)) => {
                let rows = TsvPool::new(path).read_labeled(&labels)?;
                let score = score_pair(
                    &pair.encoder.valid(),
                    &pair.recurrent.valid(),
                    &encoder_text,
                    &recurrent_text,
                    &rows,
                    cfg.batch_size,
                    &device,
                )?;
                println!("{score}");
                Some(score)
            }
            _ => None,
        };

        tracing::info!("Self-training finished after {} rounds, {} examples accepted", rounds, accepted);
        Ok(RunReport { rounds_run: rounds, accepted, remaining, test })
    }
}

/// Cleaned texts of the starting labeled, unlabeled and dev pools.
fn tokenizer_corpus(pools: &WorkPools) -> Result<Vec<String>> {
    let pre = Preprocessor::new();
    let mut texts = Vec::new();
    for pool in [&pools.labeled, &pools.unlabeled, &pools.dev] {
        texts.extend(pool.load_rows()?.into_iter().map(|r| pre.clean(&r.text)));
    }
    Ok(texts)
}
