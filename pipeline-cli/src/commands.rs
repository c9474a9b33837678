use clap::{Args, Parser, Subcommand, ValueEnum};
use inference::BigramConfig;
use sampler::{ConfigError, SamplingConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tokviz")]
#[command(about = "Inspect next-token sampling: ranking, nucleus and the pipeline diagram")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank raw scores and draw from them
    Sample {
        /// Raw scores, one per vocabulary id
        #[arg(allow_negative_numbers = true)]
        scores: Vec<f32>,

        /// Read scores from a file (JSON array or whitespace separated)
        #[arg(long, short)]
        file: Option<PathBuf>,

        /// Number of repeated draws to tally
        #[arg(long, default_value_t = 0)]
        draws: usize,

        #[command(flatten)]
        sampling: SamplingArgs,

        /// Print the predictions as JSON
        #[arg(long)]
        json: bool,
    },

    /// Train the bigram model and run the pipeline on a prompt
    Run {
        #[command(flatten)]
        model: ModelArgs,

        /// Prompt text
        prompt: String,

        /// Feed the sampled token back this many times
        #[arg(long, default_value_t = 1)]
        steps: usize,

        #[command(flatten)]
        sampling: SamplingArgs,

        /// Print each step as JSON
        #[arg(long)]
        json: bool,
    },

    /// Step the animation headlessly and report what each frame draws
    Frames {
        #[command(flatten)]
        model: ModelArgs,

        /// Prompt text
        prompt: String,

        /// Number of ticks to run
        #[arg(long, default_value_t = 120)]
        ticks: usize,

        /// Print every n-th tick
        #[arg(long, default_value_t = 10)]
        every: usize,

        /// Launch the sampled token's travel animation before stepping
        #[arg(long)]
        travel: bool,

        #[command(flatten)]
        sampling: SamplingArgs,
    },
}

/// Sampling parameters; individual flags override `--config`
#[derive(Args)]
pub struct SamplingArgs {
    /// JSON file with a sampling config
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, short)]
    pub temperature: Option<f32>,

    #[arg(long, short = 'k')]
    pub top_k: Option<usize>,

    #[arg(long, short = 'p')]
    pub top_p: Option<f32>,

    /// Seed for the draw; taken from the OS when omitted
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the resolved config to this JSON file
    #[arg(long)]
    pub save_config: Option<PathBuf>,
}

impl SamplingArgs {
    pub fn resolve(&self) -> Result<SamplingConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => SamplingConfig::load(&path.to_string_lossy())?,
            None => SamplingConfig::default(),
        };
        if let Some(t) = self.temperature {
            config = config.with_temperature(t);
        }
        if let Some(k) = self.top_k {
            config = config.with_top_k(k);
        }
        if let Some(p) = self.top_p {
            config = config.with_top_p(p);
        }
        if let Some(path) = &self.save_config {
            config.save(&path.to_string_lossy())?;
        }
        Ok(config)
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Preset {
    Tiny,
    Small,
}

impl Preset {
    pub fn config(self) -> BigramConfig {
        match self {
            Preset::Tiny => BigramConfig::tiny(),
            Preset::Small => BigramConfig::small(),
        }
    }
}

/// Where the reference model's training text comes from
#[derive(Args)]
pub struct ModelArgs {
    /// Corpus file, one text per line
    #[arg(long, short)]
    pub corpus: Option<PathBuf>,

    /// Extra training text (repeatable)
    #[arg(long = "text")]
    pub texts: Vec<String>,

    #[arg(long, value_enum, default_value = "tiny")]
    pub preset: Preset,

    /// Canvas size used for layout and fitting
    #[arg(long, default_value_t = 1200.0)]
    pub width: f64,

    #[arg(long, default_value_t = 700.0)]
    pub height: f64,
}
