use std::path::PathBuf;

use anyhow::{Context, Result};
use candle_core::{DType, Device};
use clap::Parser;
use tracing::{info, warn};

use vocab_transplant::model::{check_architecture, check_output_dir};
use vocab_transplant::{
    DecayFactor, DonorWeights, HfConfig, ModelFiles, ModelTokenizer, ModelWriter, TokenOverride,
    TransplantConfig, VocabTransplant,
};

#[derive(Parser, Debug)]
#[command(name = "vocab-transplant")]
#[command(version, about = "Transplant token embeddings between language models")]
struct Args {
    /// Donor model directory or HuggingFace model ID
    donor: String,

    /// Target model directory or HuggingFace model ID
    target: String,

    /// Output model directory
    output: PathBuf,

    /// Override target token with donor token (can be used multiple times)
    #[arg(long = "override", num_args = 2, value_names = ["TARGET", "DONOR"])]
    overrides: Vec<String>,

    /// JSON file with a list of {"target": .., "donor": ..} overrides
    #[arg(long)]
    overrides_file: Option<PathBuf>,

    /// Decay factor [0-1] for multi-token mappings:
    /// 0=first token only, 0.5=decreasing weights, 1=uniform mean
    #[arg(long, default_value = "0.5")]
    weighting_decay_factor: f64,

    /// Use CPU only for model loading and processing in float32
    #[arg(long)]
    use_cpu_only: bool,

    /// Overwrite output directory if it exists
    #[arg(long)]
    overwrite: bool,

    /// Show detailed token mapping output
    #[arg(long)]
    verbose: bool,

    /// Git revision for models fetched from the HuggingFace Hub
    #[arg(long, default_value = "main")]
    revision: String,
}

impl Args {
    fn transplant_config(&self) -> Result<TransplantConfig> {
        let decay = DecayFactor::new(self.weighting_decay_factor)?;
        let mut config = TransplantConfig::new(decay)
            .cpu_only(self.use_cpu_only)
            .overwrite(self.overwrite)
            .verbose(self.verbose);

        for pair in self.overrides.chunks_exact(2) {
            config = config.with_override(pair[0].as_str(), pair[1].as_str());
        }
        if let Some(path) = &self.overrides_file {
            let from_file: Vec<TokenOverride> = TransplantConfig::load_overrides(path)
                .with_context(|| format!("reading overrides from {}", path.display()))?;
            config.overrides.extend(from_file);
        }
        Ok(config)
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = args.transplant_config()?;
    check_output_dir(&args.output, config.overwrite)?;

    let donor_files = ModelFiles::resolve(&args.donor, &args.revision)
        .with_context(|| format!("resolving donor model {}", args.donor))?;
    let target_files = ModelFiles::resolve(&args.target, &args.revision)
        .with_context(|| format!("resolving target model {}", args.target))?;

    let donor_config = HfConfig::load(&donor_files.config)?;
    let target_config = HfConfig::load(&target_files.config)?;

    let donor_tokenizer = ModelTokenizer::load(&donor_files, &donor_config)?;
    let target_tokenizer = ModelTokenizer::load(&target_files, &target_config)?;
    let target_vocab = target_tokenizer.vocabulary()?;

    let target_vocab_size = target_config.vocab_size()?;
    info!(
        donor_vocab_size = donor_config.vocab_size()?,
        target_vocab_size,
        used = target_vocab.len(),
        unused = target_vocab_size.saturating_sub(target_vocab.len()),
        donor_hidden_size = donor_config.hidden_size()?,
        "loaded tokenizers and configs"
    );

    let (device, dtype) = if config.use_cpu_only {
        (Device::Cpu, Some(DType::F32))
    } else {
        (Device::cuda_if_available(0)?, None)
    };

    let weights = DonorWeights::open(&donor_files.weights)?;
    let embedding = weights.embedding(dtype, &device)?;
    let head = weights.head(donor_config.tie_word_embeddings(), dtype, &device)?;
    check_architecture(&donor_config, &embedding, &head)?;

    let output = VocabTransplant::new(&target_vocab, &donor_tokenizer.tokenizer)
        .special_tokens(donor_tokenizer.special, target_tokenizer.special)
        .overrides(config.overrides.clone())
        .decay(config.decay_factor)
        .run(&embedding, &head, target_vocab_size)?;

    let mut report = output.report;
    report.verbose = config.verbose;
    println!("{report}");
    for problem in report.problems() {
        warn!(
            target_id = problem.target_id,
            token = ?problem.target_text,
            donor_ids = ?problem.donor_ids,
            outcome = ?problem.outcome,
            "mapping needs attention"
        );
    }

    let writer = ModelWriter {
        donor_weights: &weights,
        donor_config: &donor_config,
        donor_generation_config: donor_files.generation_config.as_deref(),
        target_tokenizer_files: &target_files.tokenizer_files,
        target_special: target_tokenizer.special,
        dtype,
        device: &device,
    };
    writer.write(
        &args.output,
        &output.embeddings,
        report.special.bos,
        config.overwrite,
    )?;

    info!("operation completed successfully");
    Ok(())
}
