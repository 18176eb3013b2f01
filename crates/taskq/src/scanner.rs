//! Delayable queue scanner

use std::sync::Arc;

use chrono::FixedOffset;
use tracing::{debug, warn};

use crate::payload::QueuePayload;
use crate::queue::TaskQueue;
use crate::store::QueueStore;
use crate::time::parse_run_at;
use crate::worker::{execute_batch, guard_tick, TickReport};

/// Members of one scan, split by what happens to them
#[derive(Debug, Default, PartialEq, Eq)]
struct Claim {
    /// Removed and executed
    due: Vec<String>,
    /// Removed: everything in `due` plus payloads whose `runAt` cannot be read
    remove: Vec<String>,
}

/// Decide, for each candidate, whether it is due, malformed or not yet due.
fn claim_due(candidates: Vec<String>, now_secs: i64, zone: &FixedOffset) -> Claim {
    let mut claim = Claim::default();

    for payload in candidates {
        if payload.is_empty() {
            continue;
        }
        let run_at = QueuePayload::from_json(&payload)
            .ok()
            .and_then(|p| p.run_at)
            .and_then(|text| parse_run_at(&text, zone));

        match run_at {
            // Unreadable entries would match every scan forever.
            None => claim.remove.push(payload),
            Some(at) if now_secs < at.timestamp() => {}
            Some(_) => {
                claim.remove.push(payload.clone());
                claim.due.push(payload);
            }
        }
    }

    claim
}

impl<S: QueueStore + ?Sized + 'static> TaskQueue<S> {
    /// One tick of the delayable queue.
    ///
    /// Reads members scored in `[now - lookback, now + lookahead]`, removes
    /// due and malformed ones in a single call, then runs the due ones and
    /// waits for all. Removal happens before execution, so a crash mid-run
    /// loses the claimed tasks instead of redelivering them.
    pub async fn run_delayable_tick(self: &Arc<Self>) -> TickReport {
        guard_tick("delayable", async {
            let due = self.claim_delayable().await;
            execute_batch(self, due).await
        })
        .await
    }

    async fn claim_delayable(&self) -> Vec<String> {
        let key = &self.config.delayable_key;
        let now_secs = self.now().timestamp();
        let min = now_secs.saturating_sub(self.config.due_lookback_secs);
        let max = now_secs.saturating_add(self.config.due_lookahead_secs);

        let timeout = self.config.acquire_timeout();
        let candidates =
            match tokio::time::timeout(timeout, self.store.range_by_score(key, min, max)).await {
                Ok(Ok(candidates)) => candidates,
                Ok(Err(e)) => {
                    debug!(error = %e, "Delayable scan skipped");
                    return Vec::new();
                }
                Err(_) => {
                    debug!(timeout_ms = self.config.acquire_timeout_ms, "Delayable scan timed out");
                    return Vec::new();
                }
            };
        if candidates.is_empty() {
            return Vec::new();
        }

        let claim = claim_due(candidates, now_secs, &self.zone);
        if !claim.remove.is_empty() {
            if let Err(e) = self.store.remove_members(key, &claim.remove).await {
                warn!(error = %e, count = claim.remove.len(), "Failed to remove claimed delayable tasks");
            }
        }
        claim.due
    }
}
