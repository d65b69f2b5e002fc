//! Background delivery of points events.
//!
//! A check-in never waits for its award. Events are handed to a spawned
//! task that retries retryable failures, and a periodic backfill pass picks
//! up anything that still slipped through.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::DispatchSettings;
use crate::engine::error::EngineResult;
use crate::engine::ledger::{AwardResult, Ledger};
use crate::model::points::PointsEvent;
use crate::store::LedgerStore;

pub struct AwardDispatcher<S> {
    ledger: Arc<Ledger<S>>,
    settings: DispatchSettings,
}

impl<S: LedgerStore> Clone for AwardDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: LedgerStore> AwardDispatcher<S> {
    pub fn new(ledger: Arc<Ledger<S>>, settings: DispatchSettings) -> Self {
        Self { ledger, settings }
    }

    /// Fire and forget. Failures are logged with the attendance id and left
    /// for the backfill pass.
    pub fn dispatch(&self, event: PointsEvent) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.award_with_retry(&event).await {
                error!(
                    error = %e,
                    user_id = event.user_id,
                    attendance_id = ?event.attendance_id,
                    "Points award failed, left for backfill"
                );
            }
        })
    }

    /// Replays the whole award on retryable errors. Safe because an
    /// attendance that was already paid comes back as `already_applied`.
    pub async fn award_with_retry(&self, event: &PointsEvent) -> EngineResult<AwardResult> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.ledger.award(event).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    warn!(
                        error = %e,
                        attempt,
                        user_id = event.user_id,
                        "Award attempt failed, retrying"
                    );
                    let backoff = self.settings.retry_backoff_ms * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Awards every successful attendance in the lookback window that has no
    /// history yet. Returns how many records were newly paid.
    pub async fn backfill(&self, now: NaiveDateTime) -> EngineResult<usize> {
        let since = now - chrono::Duration::days(i64::from(self.settings.backfill_lookback_days));
        let mut pending = self.ledger.store().unawarded_attendance(since).await?;
        pending.sort_by_key(|r| (r.timestamp, r.id));

        let mut paid = 0;
        for record in &pending {
            match self.award_with_retry(&PointsEvent::from(record)).await {
                Ok(result) if !result.already_applied => paid += 1,
                Ok(_) => {}
                Err(e) => error!(
                    error = %e,
                    attendance_id = record.id,
                    user_id = record.user_id,
                    "Backfill award failed"
                ),
            }
        }
        if paid > 0 {
            info!(paid, scanned = pending.len(), "Backfill awarded missing points");
        }
        Ok(paid)
    }

    pub fn spawn_backfill(&self) -> JoinHandle<()> {
        let this = self.clone();
        let period = Duration::from_secs(self.settings.backfill_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = this.backfill(Local::now().naive_local()).await {
                    error!(error = %e, "Backfill pass failed");
                }
            }
        })
    }
}
