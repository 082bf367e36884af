//! Aggregate statistics over a finished batch.

use crate::api::RateLimitState;
use crate::error::ErrorKind;
use crate::types::EnrichmentResult;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Category label used when the service found no category.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// How many successful results had each entity found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub merchants: usize,
    pub locations: usize,
    pub payment_processors: usize,
    pub peer_to_peer: usize,
    /// Found and flagged as recurring
    pub subscriptions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: usize,
}

/// Statistics for one batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub total: usize,
    pub succeeded: usize,
    pub partial: usize,
    pub failed: usize,
    /// Percentage of transactions that succeeded
    pub success_rate: f64,
    pub failures_by_kind: BTreeMap<ErrorKind, usize>,
    /// Primary categories of successful results, most frequent first
    pub categories: Vec<CategoryCount>,
    pub entities: EntityCounts,
    /// HTTP calls made across all transactions
    pub total_attempts: u32,
    /// Wall time of the whole batch
    pub total_time_ms: f64,
    /// Mean per-transaction processing time
    pub avg_time_ms: f64,
    pub transactions_per_second: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitState>,
}

impl RunStats {
    pub fn from_results(results: &[EnrichmentResult], elapsed: Duration) -> Self {
        let mut stats = Self {
            total: results.len(),
            total_time_ms: elapsed.as_secs_f64() * 1000.0,
            ..Default::default()
        };

        let mut categories: HashMap<String, usize> = HashMap::new();
        let mut timed = 0usize;
        let mut time_sum = 0.0;

        for result in results {
            stats.total_attempts += result.attempts;
            if let Some(ms) = result.processing_time_ms {
                timed += 1;
                time_sum += ms;
            }

            if let Some(kind) = result.error_kind() {
                stats.failed += 1;
                *stats.failures_by_kind.entry(kind).or_default() += 1;
                continue;
            }

            stats.succeeded += 1;
            if result.is_partial() {
                stats.partial += 1;
            }

            let Some(payload) = result.payload() else {
                continue;
            };
            let category = payload.primary_category_name().unwrap_or(UNKNOWN_CATEGORY);
            *categories.entry(category.to_string()).or_default() += 1;

            let entities = &mut stats.entities;
            entities.merchants += usize::from(payload.merchant.is_found());
            entities.locations += usize::from(payload.location.is_found());
            entities.payment_processors += usize::from(payload.payment_processor.is_found());
            entities.peer_to_peer += usize::from(payload.peer_to_peer.is_found());
            entities.subscriptions += usize::from(
                payload
                    .subscription
                    .found()
                    .is_some_and(|sub| sub.recurring),
            );
        }

        if stats.total > 0 {
            stats.success_rate = stats.succeeded as f64 / stats.total as f64 * 100.0;
        }
        if timed > 0 {
            stats.avg_time_ms = time_sum / timed as f64;
        }
        if elapsed.as_secs_f64() > 0.0 {
            stats.transactions_per_second = stats.total as f64 / elapsed.as_secs_f64();
        }

        stats.categories = categories
            .into_iter()
            .map(|(name, count)| CategoryCount { name, count })
            .collect();
        stats
            .categories
            .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));

        stats
    }

    pub fn with_rate_limit(mut self, state: RateLimitState) -> Self {
        self.rate_limit = Some(state);
        self
    }

    pub fn failures_of(&self, kind: ErrorKind) -> usize {
        self.failures_by_kind.get(&kind).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::payload::tests::VERVE_PAYLOAD_JSON;
    use crate::payload::EnrichmentPayload;
    use crate::types::{Enriched, Transaction, TransactionType};

    fn tx(title: &str) -> Transaction {
        Transaction::new(title, "US", TransactionType::Expense).unwrap()
    }

    fn success(payload: EnrichmentPayload, partial: bool) -> EnrichmentResult {
        EnrichmentResult::success(
            tx("ok"),
            Enriched {
                payload,
                partial,
                request_id: None,
            },
            1,
        )
        .with_processing_time_ms(100.0)
    }

    fn uncategorized() -> EnrichmentPayload {
        let mut value: serde_json::Value = serde_json::from_str(VERVE_PAYLOAD_JSON).unwrap();
        value["category"] = serde_json::json!({"status": "not_found", "confidence": 10});
        value["merchant"] = serde_json::json!({"status": "not_found"});
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_batch() {
        let stats = RunStats::from_results(&[], Duration::ZERO);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.transactions_per_second, 0.0);
        assert!(stats.categories.is_empty());
    }

    #[test]
    fn test_counts_and_rates() {
        let verve = crate::payload::tests::verve_payload();
        let results = vec![
            success(verve.clone(), false),
            success(verve, true),
            success(uncategorized(), false),
            EnrichmentResult::failure(
                tx("bad"),
                &ApiError::Client {
                    status: 422,
                    message: "invalid".to_string(),
                },
                1,
            ),
        ];
        let stats = RunStats::from_results(&results, Duration::from_secs(2));

        assert_eq!(stats.total, 4);
        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.partial, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.success_rate, 75.0);
        assert_eq!(stats.failures_of(ErrorKind::ClientError), 1);
        assert_eq!(stats.failures_of(ErrorKind::Auth), 0);
        assert_eq!(stats.total_attempts, 4);
        assert_eq!(stats.avg_time_ms, 100.0);
        assert_eq!(stats.transactions_per_second, 2.0);

        assert_eq!(stats.entities.merchants, 2);
        assert_eq!(stats.entities.payment_processors, 3);
        assert_eq!(stats.entities.peer_to_peer, 0);
        assert_eq!(stats.entities.subscriptions, 0);

        assert_eq!(
            stats.categories,
            vec![
                CategoryCount {
                    name: "Food & Dining".to_string(),
                    count: 2
                },
                CategoryCount {
                    name: UNKNOWN_CATEGORY.to_string(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_summary_serializes_failure_kinds_as_keys() {
        let results = vec![EnrichmentResult::failure(
            tx("x"),
            &ApiError::Network {
                message: "refused".to_string(),
                timed_out: false,
            },
            3,
        )];
        let stats = RunStats::from_results(&results, Duration::from_millis(10));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["failures_by_kind"]["network_error"], 1);
        assert!(json.get("rate_limit").is_none());
    }
}
