//! Value types for the enrich command's CLI flags.

use clap::ValueEnum;

/// Output format for the results file.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON array
    #[default]
    Json,
    /// One JSON object per line
    Jsonl,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

impl From<OutputFormat> for txenrich_core::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => txenrich_core::OutputFormat::Json,
            OutputFormat::Jsonl => txenrich_core::OutputFormat::JsonLines,
        }
    }
}
