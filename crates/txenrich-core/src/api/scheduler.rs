//! Concurrency controller for a batch of enrichment requests.
//!
//! Transactions wait in an admission queue ordered by the instant they become
//! eligible. Up to `concurrency_limit` of them are in flight at once; a freed
//! slot is refilled immediately. A failed transaction that is worth retrying
//! goes back into the queue with a later eligibility instant and holds no slot
//! while it waits.
//!
//! An authentication failure halts the session: nothing else is dispatched,
//! and everything still waiting is finalized as cancelled.

use super::executor::Executor;
use super::retry::{RetryDecision, RetryPolicy};
use crate::error::{ApiError, ErrorKind};
use crate::types::{Enriched, EnrichmentResult, FailureDetail, Transaction};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{AbortHandle, Id, JoinSet};
use tokio::time::Instant;

/// Stand-in for "never" when a deadline would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `from + delay`, saturating instead of overflowing.
fn deadline(from: Instant, delay: Duration) -> Instant {
    from.checked_add(delay).unwrap_or_else(|| from + FAR_FUTURE)
}

/// Spaces consecutive dispatches at least `delay` apart.
///
/// Each caller atomically reserves the next free slot, so concurrent tasks
/// never share one.
#[derive(Debug)]
pub struct DispatchPacer {
    delay: Duration,
    last: Mutex<Option<Instant>>,
}

impl DispatchPacer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last: Mutex::new(None),
        }
    }

    /// Reserve the next dispatch slot and sleep until it arrives.
    pub async fn wait_turn(&self) {
        let slot = {
            let mut last = self.last.lock().await;
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => deadline(prev, self.delay).max(now),
                None => now,
            };
            *last = Some(slot);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Queue entry. Ordered by eligibility, then input position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Admission {
    eligible_at: Instant,
    index: usize,
}

/// What a dispatched task came back with.
enum Dispatch {
    Sent(Result<Enriched, ApiError>),
    /// The session halted before the request went out
    Cancelled,
}

/// Per-transaction bookkeeping while the batch runs.
#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    attempts: u32,
    first_dispatch: Option<Instant>,
}

/// Drives a batch through the executor with bounded concurrency and retries.
pub struct Scheduler {
    executor: Arc<Executor>,
    retry: RetryPolicy,
    concurrency_limit: usize,
    pacer: Arc<DispatchPacer>,
    halt: Arc<OnceLock<ApiError>>,
}

impl Scheduler {
    pub fn new(
        executor: Executor,
        retry: RetryPolicy,
        concurrency_limit: usize,
        request_delay: Duration,
    ) -> Self {
        Self {
            executor: Arc::new(executor),
            retry,
            concurrency_limit: concurrency_limit.max(1),
            pacer: Arc::new(DispatchPacer::new(request_delay)),
            halt: Arc::new(OnceLock::new()),
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// The error that halted the session, if any.
    pub fn halted(&self) -> Option<&ApiError> {
        self.halt.get()
    }

    /// Run every transaction to a terminal result.
    ///
    /// Returns one result per input, in input order. `on_result` is called as
    /// each transaction reaches its terminal result, in completion order.
    pub async fn run_batch<F>(
        &self,
        transactions: &[Transaction],
        mut on_result: F,
    ) -> Vec<EnrichmentResult>
    where
        F: FnMut(&EnrichmentResult),
    {
        let total = transactions.len();
        let shared: Arc<[Transaction]> = Arc::from(transactions.to_vec());
        let mut results: Vec<Option<EnrichmentResult>> = (0..total).map(|_| None).collect();
        let mut progress = vec![Progress::default(); total];

        let start = Instant::now();
        let mut queue: BinaryHeap<Reverse<Admission>> = (0..total)
            .map(|index| {
                Reverse(Admission {
                    eligible_at: start,
                    index,
                })
            })
            .collect();
        let mut in_flight: JoinSet<(usize, Dispatch)> = JoinSet::new();
        let mut task_index: HashMap<Id, usize> = HashMap::new();

        loop {
            if let Some(fatal) = self.halt.get() {
                while let Some(Reverse(admission)) = queue.pop() {
                    let result = cancelled(
                        &shared[admission.index],
                        fatal,
                        progress[admission.index],
                    );
                    on_result(&result);
                    results[admission.index] = Some(result);
                }
            }

            let now = Instant::now();
            while in_flight.len() < self.concurrency_limit {
                match queue.peek() {
                    Some(Reverse(next)) if next.eligible_at <= now => {
                        let index = next.index;
                        queue.pop();
                        progress[index].first_dispatch.get_or_insert(now);
                        let task = self.spawn(&mut in_flight, shared.clone(), index);
                        task_index.insert(task.id(), index);
                    }
                    _ => break,
                }
            }

            if in_flight.is_empty() && queue.is_empty() {
                break;
            }

            let next_eligible = if in_flight.len() < self.concurrency_limit {
                queue.peek().map(|Reverse(next)| next.eligible_at)
            } else {
                None
            };

            tokio::select! {
                Some(joined) = in_flight.join_next_with_id() => match joined {
                    Ok((id, (index, dispatch))) => {
                        task_index.remove(&id);
                        if let Some(result) =
                            self.settle(&shared[index], index, dispatch, &mut progress, &mut queue)
                        {
                            on_result(&result);
                            results[index] = Some(result);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Enrichment task panicked: {e}");
                        if let Some(index) = task_index.remove(&e.id()) {
                            let result = unfinished(&shared[index], progress[index].attempts);
                            on_result(&result);
                            results[index] = Some(result);
                        }
                    }
                },
                _ = tokio::time::sleep_until(next_eligible.unwrap_or(now)), if next_eligible.is_some() => {}
                else => break,
            }
        }

        results
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| unfinished(&shared[index], progress[index].attempts))
            })
            .collect()
    }

    /// Start one request task. The rate-limit token is taken only after the
    /// pacer slot arrives, so a 429 seen in the meantime still holds it back.
    fn spawn(
        &self,
        in_flight: &mut JoinSet<(usize, Dispatch)>,
        transactions: Arc<[Transaction]>,
        index: usize,
    ) -> AbortHandle {
        let executor = self.executor.clone();
        let pacer = self.pacer.clone();
        let halt = self.halt.clone();

        in_flight.spawn(async move {
            loop {
                pacer.wait_turn().await;
                if halt.get().is_some() {
                    return (index, Dispatch::Cancelled);
                }
                let wait = executor.limiter().acquire().await;
                if wait.is_zero() {
                    break;
                }
                tracing::warn!(
                    "Rate limit reached. Waiting {:.1}s until reset...",
                    wait.as_secs_f64()
                );
                tokio::time::sleep(wait).await;
            }
            let outcome = executor.send(&transactions[index]).await;
            (index, Dispatch::Sent(outcome))
        })
    }

    /// Turn a finished dispatch into a terminal result, or re-queue it.
    fn settle(
        &self,
        tx: &Transaction,
        index: usize,
        dispatch: Dispatch,
        progress: &mut [Progress],
        queue: &mut BinaryHeap<Reverse<Admission>>,
    ) -> Option<EnrichmentResult> {
        let outcome = match dispatch {
            Dispatch::Sent(outcome) => outcome,
            Dispatch::Cancelled => {
                let fatal = self.halt.get()?;
                return Some(cancelled(tx, fatal, progress[index]));
            }
        };

        progress[index].attempts += 1;
        let attempts = progress[index].attempts;
        let elapsed = progress[index]
            .first_dispatch
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or_default();

        let err = match outcome {
            Ok(enriched) => {
                return Some(
                    EnrichmentResult::success(tx.clone(), enriched, attempts)
                        .with_processing_time_ms(elapsed),
                );
            }
            Err(err) => err,
        };

        if err.is_session_fatal() {
            if self.halt.set(err.clone()).is_ok() {
                tracing::error!("Halting session, no further requests will be sent: {err}");
            }
        } else if self.halt.get().is_none() {
            if let RetryDecision::RetryAfter(delay) = self.retry.should_retry(&err, attempts) {
                tracing::debug!(
                    "Retry {attempts}/{} for '{}' after {delay:?}: {err}",
                    self.retry.max_attempts,
                    tx.title()
                );
                queue.push(Reverse(Admission {
                    eligible_at: deadline(Instant::now(), delay),
                    index,
                }));
                return None;
            }
        }

        Some(EnrichmentResult::failure(tx.clone(), &err, attempts).with_processing_time_ms(elapsed))
    }
}

/// Result for a transaction whose task panicked or never reported back.
pub(crate) fn unfinished(tx: &Transaction, attempts: u32) -> EnrichmentResult {
    let detail = FailureDetail {
        kind: ErrorKind::Internal,
        message: "enrichment task did not complete".to_string(),
        status_code: None,
    };
    EnrichmentResult::failure_with(tx.clone(), detail, attempts)
}

fn cancelled(tx: &Transaction, fatal: &ApiError, progress: Progress) -> EnrichmentResult {
    let detail = FailureDetail {
        kind: ErrorKind::Auth,
        message: format!("Cancelled after session halt: {fatal}"),
        status_code: None,
    };
    EnrichmentResult::failure_with(tx.clone(), detail, progress.attempts)
}
