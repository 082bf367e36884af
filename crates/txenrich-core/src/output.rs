//! Result persistence in JSON and JSONL formats.
//!
//! [`OutputWriter`] serializes items to any writer; [`ResultStore`] places
//! timestamped result and summary files in an output directory.

use crate::error::TxenrichError;
use crate::stats::RunStats;
use crate::types::EnrichmentResult;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Single JSON array
    Json,
    /// One JSON object per line (newline-delimited JSON)
    JsonLines,
}

impl OutputFormat {
    /// Parse format from string (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::JsonLines => "jsonl",
        }
    }
}

/// A writer that serializes items to JSON or JSONL format.
pub struct OutputWriter<W: Write> {
    writer: W,
    format: OutputFormat,
    pretty: bool,
    items_written: usize,
}

impl<W: Write> OutputWriter<W> {
    /// `pretty` only affects the JSON format.
    pub fn new(writer: W, format: OutputFormat, pretty: bool) -> Self {
        Self {
            writer,
            format,
            pretty,
            items_written: 0,
        }
    }

    /// Write a batch: a JSON array, or one object per line for JSONL.
    pub fn write_all<T: Serialize>(&mut self, items: &[T]) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                if self.pretty {
                    serde_json::to_writer_pretty(&mut self.writer, items)
                        .map_err(io::Error::other)?;
                } else {
                    serde_json::to_writer(&mut self.writer, items).map_err(io::Error::other)?;
                }
                writeln!(self.writer)?;
            }
            OutputFormat::JsonLines => {
                // JSONL is never pretty-printed (one object per line)
                for item in items {
                    serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
                    writeln!(self.writer)?;
                }
            }
        }
        self.items_written += items.len();
        Ok(())
    }

    /// Get the number of items written.
    pub fn items_written(&self) -> usize {
        self.items_written
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Summary file contents.
#[derive(Debug, Serialize)]
struct SummaryDocument<'a> {
    generated_at: DateTime<Utc>,
    statistics: &'a RunStats,
}

/// Timestamp used in output file names, e.g. `20260301_142501`.
pub fn file_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Writes result and summary files into one directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Use `dir` for output, creating it if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, TxenrichError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `enrichments_<stamp>.json[l]` and return its path.
    pub fn save_results(
        &self,
        results: &[EnrichmentResult],
        format: OutputFormat,
        pretty: bool,
        stamp: &str,
    ) -> Result<PathBuf, TxenrichError> {
        let path = self
            .dir
            .join(format!("enrichments_{stamp}.{}", format.extension()));
        let mut writer = OutputWriter::new(BufWriter::new(File::create(&path)?), format, pretty);
        writer.write_all(results)?;
        writer.flush()?;

        tracing::debug!("Saved {} results to {:?}", writer.items_written(), path);
        Ok(path)
    }

    /// Write `summary_<stamp>.json` and return its path.
    pub fn save_summary(&self, stats: &RunStats, stamp: &str) -> Result<PathBuf, TxenrichError> {
        let path = self.dir.join(format!("summary_{stamp}.json"));
        let doc = SummaryDocument {
            generated_at: Utc::now(),
            statistics: stats,
        };
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut writer, &doc)?;
        writeln!(writer)?;
        writer.flush()?;

        tracing::debug!("Saved summary to {:?}", path);
        Ok(path)
    }
}
