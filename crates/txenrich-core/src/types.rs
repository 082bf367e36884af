//! Core data types: input transactions and per-transaction enrichment results.

use crate::error::{ApiError, ErrorKind, InputError};
use crate::payload::EnrichmentPayload;
use serde::{Deserialize, Serialize};

/// Maximum accepted length of a transaction title, in characters.
pub const MAX_TITLE_CHARS: usize = 256;

/// Transaction direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Expense,
    Income,
}

impl TransactionType {
    /// Parse a direction string (case-insensitive, surrounding whitespace ignored).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "expense" => Some(Self::Expense),
            "income" => Some(Self::Income),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Expense => "expense",
            TransactionType::Income => "income",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw bank transaction to be enriched.
///
/// Validated on construction and immutable afterwards. The `comment` is kept
/// for the caller's own bookkeeping and is never sent to the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transaction {
    title: String,
    country: String,
    #[serde(rename = "type")]
    kind: TransactionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

impl Transaction {
    /// Build a transaction, trimming the title and upper-casing the country code.
    pub fn new(
        title: impl Into<String>,
        country: impl Into<String>,
        kind: TransactionType,
    ) -> Result<Self, InputError> {
        let title = title.into().trim().to_string();
        let country = country.into().trim().to_uppercase();

        if title.is_empty() {
            return Err(InputError::InvalidField {
                field: "title",
                message: "must not be empty".into(),
            });
        }
        let title_len = title.chars().count();
        if title_len > MAX_TITLE_CHARS {
            return Err(InputError::InvalidField {
                field: "title",
                message: format!("{title_len} characters exceeds the {MAX_TITLE_CHARS} limit"),
            });
        }
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(InputError::InvalidField {
                field: "country",
                message: format!("'{country}' is not an ISO 3166-1 alpha-2 code"),
            });
        }

        Ok(Self {
            title,
            country,
            kind,
            comment: None,
        })
    }

    /// Attach a free-form comment. Empty comments are dropped.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        let comment = comment.trim();
        self.comment = (!comment.is_empty()).then(|| comment.to_string());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn kind(&self) -> TransactionType {
        self.kind
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}

/// Why a transaction ended without an enrichment payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDetail {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl From<&ApiError> for FailureDetail {
    fn from(error: &ApiError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
            status_code: error.status_code(),
        }
    }
}

/// Terminal outcome of enriching one transaction.
///
/// Internally tagged: `{"status":"success",...}` or `{"status":"failure",...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success {
        /// The service could only enrich part of the transaction
        partial: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        data: Box<EnrichmentPayload>,
    },
    Failure {
        error: FailureDetail,
    },
}

/// The terminal result for one input transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichmentResult {
    pub input: Transaction,

    #[serde(flatten)]
    pub outcome: Outcome,

    /// Number of HTTP calls made for this transaction (0 if it was cancelled)
    pub attempts: u32,

    /// Wall time from first dispatch to terminal outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<f64>,
}

impl EnrichmentResult {
    pub fn success(input: Transaction, enriched: Enriched, attempts: u32) -> Self {
        Self {
            input,
            outcome: Outcome::Success {
                partial: enriched.partial,
                request_id: enriched.request_id,
                data: Box::new(enriched.payload),
            },
            attempts,
            processing_time_ms: None,
        }
    }

    pub fn failure(input: Transaction, error: &ApiError, attempts: u32) -> Self {
        Self::failure_with(input, FailureDetail::from(error), attempts)
    }

    pub fn failure_with(input: Transaction, detail: FailureDetail, attempts: u32) -> Self {
        Self {
            input,
            outcome: Outcome::Failure { error: detail },
            attempts,
            processing_time_ms: None,
        }
    }

    pub fn with_processing_time_ms(mut self, ms: f64) -> Self {
        self.processing_time_ms = Some(ms);
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn is_partial(&self) -> bool {
        matches!(self.outcome, Outcome::Success { partial: true, .. })
    }

    /// The enrichment payload, if this result is a success.
    pub fn payload(&self) -> Option<&EnrichmentPayload> {
        match &self.outcome {
            Outcome::Success { data, .. } => Some(data),
            Outcome::Failure { .. } => None,
        }
    }

    /// The failure detail, if this result is a failure.
    pub fn failure_detail(&self) -> Option<&FailureDetail> {
        match &self.outcome {
            Outcome::Failure { error } => Some(error),
            Outcome::Success { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.failure_detail().map(|detail| detail.kind)
    }
}

/// A decoded successful response for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched {
    pub payload: EnrichmentPayload,
    pub partial: bool,
    pub request_id: Option<String>,
}
