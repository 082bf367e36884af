//! Terminal reports for the enrich command.
//!
//! Everything is rendered to a `String` first and written to stderr by the
//! caller, so stdout stays free for piping.

use std::fmt::Write as _;
use txenrich_core::{EnrichmentResult, RateLimitState, RunStats, Transaction};

const TITLE_WIDTH: usize = 32;
const MERCHANT_WIDTH: usize = 24;
const CATEGORY_WIDTH: usize = 22;
const TOP_CATEGORIES: usize = 5;

/// Rows shown by `--dry-run`.
pub fn render_preview(transactions: &[Transaction], limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:>3}  {:<7}  {:<8}  {}",
        "#", "Country", "Type", "Title"
    );
    for (i, tx) in transactions.iter().take(limit).enumerate() {
        let _ = writeln!(
            out,
            "  {:>3}  {:<7}  {:<8}  {}",
            i + 1,
            tx.country(),
            tx.kind().as_str(),
            truncate(tx.title(), TITLE_WIDTH * 2)
        );
    }
    if transactions.len() > limit {
        let _ = writeln!(out, "  ... and {} more", transactions.len() - limit);
    }
    out
}

/// One line per result: title, merchant, category and status.
pub fn render_table(results: &[EnrichmentResult], limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:>3}  {:<tw$}  {:<mw$}  {:<cw$}  {}",
        "#",
        "Title",
        "Merchant",
        "Category",
        "Status",
        tw = TITLE_WIDTH,
        mw = MERCHANT_WIDTH,
        cw = CATEGORY_WIDTH
    );

    for (i, result) in results.iter().take(limit).enumerate() {
        let payload = result.payload();
        let merchant = payload.and_then(|p| p.merchant_name()).unwrap_or("-");
        let category = payload.and_then(|p| p.primary_category_name()).unwrap_or("-");
        let status = match result.error_kind() {
            Some(kind) => kind.to_string(),
            None if result.is_partial() => "partial".to_string(),
            None => "ok".to_string(),
        };

        let _ = writeln!(
            out,
            "  {:>3}  {:<tw$}  {:<mw$}  {:<cw$}  {}",
            i + 1,
            truncate(result.input.title(), TITLE_WIDTH),
            truncate(merchant, MERCHANT_WIDTH),
            truncate(category, CATEGORY_WIDTH),
            status,
            tw = TITLE_WIDTH,
            mw = MERCHANT_WIDTH,
            cw = CATEGORY_WIDTH
        );
    }
    if results.len() > limit {
        let _ = writeln!(out, "  ... and {} more in the results file", results.len() - limit);
    }
    out
}

/// Summary block printed after a run.
pub fn render_summary(stats: &RunStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "  ====================================");
    let _ = writeln!(out, "           Enrichment Summary");
    let _ = writeln!(out, "  ====================================");
    let _ = writeln!(out, "    Succeeded:    {:>8}", stats.succeeded);
    if stats.partial > 0 {
        let _ = writeln!(out, "      partial:    {:>8}", stats.partial);
    }
    if stats.failed > 0 {
        let _ = writeln!(out, "    Failed:       {:>8}", stats.failed);
        for (kind, count) in &stats.failures_by_kind {
            let _ = writeln!(out, "      {:<12}{:>8}", kind.as_str(), count);
        }
    }
    let _ = writeln!(out, "  ------------------------------------");
    let _ = writeln!(out, "    Total:        {:>8}", stats.total);
    let _ = writeln!(out, "    Success rate: {:>7.1}%", stats.success_rate);
    let _ = writeln!(out, "    Requests:     {:>8}", stats.total_attempts);
    let _ = writeln!(out, "    Duration:     {:>7.1}s", stats.total_time_ms / 1000.0);
    let _ = writeln!(out, "    Avg time:     {:>6.0}ms", stats.avg_time_ms);
    let _ = writeln!(out, "    Rate:         {:>7.1} tx/sec", stats.transactions_per_second);
    let _ = writeln!(out, "  ====================================");

    if !stats.categories.is_empty() {
        let _ = writeln!(out, "    Top categories:");
        for category in stats.categories.iter().take(TOP_CATEGORIES) {
            let _ = writeln!(
                out,
                "      {:<22}{:>6}",
                truncate(&category.name, 22),
                category.count
            );
        }
    }
    if stats.succeeded > 0 {
        let e = &stats.entities;
        let _ = writeln!(
            out,
            "    Found: {} merchants, {} locations, {} processors, {} p2p, {} subscriptions",
            e.merchants, e.locations, e.payment_processors, e.peer_to_peer, e.subscriptions
        );
    }
    out
}

/// Last known rate-limit budget, if the server reported one.
pub fn render_rate_limit(state: Option<&RateLimitState>) -> Option<String> {
    let state = state?;
    let remaining = state.remaining?;
    let mut line = match state.burst.or(state.limit) {
        Some(capacity) => format!("  Rate limit: {remaining}/{capacity} requests remaining"),
        None => format!("  Rate limit: {remaining} requests remaining"),
    };
    if let Some(reset) = state.reset {
        let local = reset.with_timezone(&chrono::Local);
        let _ = write!(line, ", resets at {}", local.format("%H:%M:%S"));
    }
    Some(line)
}

/// Cut `s` to at most `width` characters, marking the cut with `...`.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_string();
    }
    let kept: String = s.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use txenrich_core::{ApiError, TransactionType};

    fn tx(title: &str) -> Transaction {
        Transaction::new(title, "US", TransactionType::Expense).unwrap()
    }

    fn failed(title: &str) -> EnrichmentResult {
        EnrichmentResult::failure(
            tx(title),
            &ApiError::Server {
                status: 503,
                message: "unavailable".to_string(),
            },
            3,
        )
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("SQ *VERVE ROASTERS gosq.com CA", 12), "SQ *VERVE...");
        assert_eq!(truncate("ÄÖÜÄÖÜÄÖÜ", 6), "ÄÖÜ...");
    }

    #[test]
    fn test_table_shows_failure_kind() {
        let results = vec![failed("NETFLIX.COM")];
        let table = render_table(&results, 15);
        let row = table.lines().nth(1).unwrap();
        assert!(row.contains("NETFLIX.COM"));
        assert!(row.contains("server_error"));
        assert!(row.contains(" - "));
    }

    #[test]
    fn test_table_respects_limit() {
        let results: Vec<_> = (0..4).map(|i| failed(&format!("TX {i}"))).collect();
        let table = render_table(&results, 2);
        assert_eq!(table.lines().count(), 4);
        assert!(table.contains("and 2 more"));
    }

    #[test]
    fn test_preview_lists_rows() {
        let txs = vec![tx("AMAZON"), tx("UBER")];
        let preview = render_preview(&txs, 5);
        assert!(preview.contains("AMAZON"));
        assert!(preview.contains("expense"));
        assert!(!preview.contains("more"));
    }

    #[test]
    fn test_summary_lists_failures_by_kind() {
        let results = vec![failed("A"), failed("B")];
        let stats = RunStats::from_results(&results, Duration::from_secs(2));
        let summary = render_summary(&stats);
        assert!(summary.contains("Failed:"));
        assert!(summary.contains("server_error"));
        assert!(!summary.contains("Top categories"));
    }

    #[test]
    fn test_rate_limit_line() {
        assert!(render_rate_limit(None).is_none());
        assert!(render_rate_limit(Some(&RateLimitState::default())).is_none());

        let state = RateLimitState {
            limit: Some(10),
            remaining: Some(7),
            reset: None,
            burst: Some(20),
        };
        assert_eq!(
            render_rate_limit(Some(&state)).unwrap(),
            "  Rate limit: 7/20 requests remaining"
        );
    }
}
