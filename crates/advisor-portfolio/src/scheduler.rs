//! Schedule driver
//!
//! A single coordinating loop polls the stored schedule configs and fires at
//! most one evaluation per user per local day, within a tolerance window
//! after the configured time. The fired marker lives in the storage
//! collaborator, so a process restart inside the window cannot fire the same
//! user twice. Per-user runs are mutually exclusive: a poll never starts an
//! evaluation for a user whose previous one is still going. A failed run is
//! not marked as fired, so it retries on the next tick while the window is
//! still open.

use std::collections::HashSet;
use std::sync::Arc;

use advisor_core::{Result, ScheduleConfig, SchedulerSettings, Storage, Transport};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::evaluator::PortfolioEvaluator;

/// The work a scheduled fire performs. Seam for the driver so it can be
/// tested without a full pipeline behind it.
#[async_trait]
pub trait EvaluationRunner: Send + Sync {
    async fn evaluate_and_render(&self, user_id: i64) -> Result<String>;
}

#[async_trait]
impl EvaluationRunner for PortfolioEvaluator {
    async fn evaluate_and_render(&self, user_id: i64) -> Result<String> {
        PortfolioEvaluator::evaluate_and_render(self, user_id).await
    }
}

pub struct Scheduler {
    storage: Arc<dyn Storage>,
    transport: Arc<dyn Transport>,
    runner: Arc<dyn EvaluationRunner>,
    settings: SchedulerSettings,
    /// Users with an evaluation in flight. In-process state only; the fired
    /// marker itself is persisted through storage.
    running: Mutex<HashSet<i64>>,
}

impl Scheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        transport: Arc<dyn Transport>,
        runner: Arc<dyn EvaluationRunner>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            storage,
            transport,
            runner,
            settings,
            running: Mutex::new(HashSet::new()),
        }
    }

    /// Drive the poll loop forever. Intended to run in its own task.
    pub async fn run(&self) {
        let mut tick = tokio::time::interval(self.settings.tick);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            self.poll_once(Utc::now()).await;
        }
    }

    /// One poll pass: fire every due schedule. Returns how many evaluations
    /// completed successfully. Errors are contained per user.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> usize {
        let configs = match self.storage.schedule_configs().await {
            Ok(configs) => configs,
            Err(err) => {
                tracing::warn!(%err, "could not read schedule configs");
                return 0;
            }
        };

        let window = chrono::Duration::from_std(self.settings.tolerance).unwrap_or_default();
        let mut fired = 0;
        for config in configs {
            if !config.enabled {
                continue;
            }

            let Some(fire_date) = due_date(&config, now, window) else {
                continue;
            };

            let marker = match self.storage.last_fired(config.user_id).await {
                Ok(marker) => marker,
                Err(err) => {
                    tracing::warn!(user_id = config.user_id, %err, "could not read fire marker");
                    continue;
                }
            };
            if marker == Some(fire_date) {
                continue;
            }

            if !self.begin(config.user_id).await {
                continue;
            }
            let outcome = self.fire(config.user_id).await;
            if outcome.is_ok() {
                if let Err(err) = self.storage.set_last_fired(config.user_id, fire_date).await {
                    tracing::warn!(user_id = config.user_id, %err, "could not persist fire marker");
                }
                fired += 1;
            }
            self.finish(config.user_id).await;
        }
        fired
    }

    /// Claim the user for a run. Refuses when one is already in flight.
    async fn begin(&self, user_id: i64) -> bool {
        self.running.lock().await.insert(user_id)
    }

    async fn finish(&self, user_id: i64) {
        self.running.lock().await.remove(&user_id);
    }

    async fn fire(&self, user_id: i64) -> Result<()> {
        tracing::info!(user_id, "scheduled evaluation firing");
        let report = self.runner.evaluate_and_render(user_id).await?;
        self.transport.send(user_id, &report).await?;
        Ok(())
    }
}

/// The local date a due schedule's window opened on, or `None` when the
/// schedule is outside its window. A window opened just before local
/// midnight keeps its opening date after the date rolls over, so the fired
/// marker stays consistent across the boundary.
fn due_date(
    config: &ScheduleConfig,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Option<NaiveDate> {
    let local_time = config.local_time(now);
    let local_date = config.local_date(now);
    let since = local_time.signed_duration_since(config.fire_time);

    if since >= chrono::Duration::zero() && since <= window {
        return Some(local_date);
    }
    if since < chrono::Duration::zero() && since + chrono::Duration::days(1) <= window {
        return local_date.pred_opt();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::{AdvisorError, MemoryStorage, ScheduleConfig};
    use chrono::{NaiveTime, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn send(&self, _user_id: i64, _message: &str) -> Result<()> {
            Ok(())
        }
    }

    struct CountingRunner {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingRunner {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl EvaluationRunner for CountingRunner {
        async fn evaluate_and_render(&self, _user_id: i64) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AdvisorError::MarketData("feed down".to_string()))
            } else {
                Ok("report".to_string())
            }
        }
    }

    struct BlockingRunner {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl EvaluationRunner for BlockingRunner {
        async fn evaluate_and_render(&self, _user_id: i64) -> Result<String> {
            self.release.notified().await;
            Ok("report".to_string())
        }
    }

    async fn storage_with(config: ScheduleConfig) -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_schedule_config(config).await.unwrap();
        storage
    }

    fn at_0930_ist(enabled: bool) -> ScheduleConfig {
        ScheduleConfig {
            user_id: 7,
            enabled,
            fire_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            utc_offset_minutes: 330,
        }
    }

    fn make_scheduler(
        storage: Arc<MemoryStorage>,
        runner: Arc<dyn EvaluationRunner>,
    ) -> Scheduler {
        Scheduler::new(
            storage,
            Arc::new(NullTransport),
            runner,
            SchedulerSettings {
                tick: Duration::from_secs(30),
                tolerance: Duration::from_secs(300),
            },
        )
    }

    // 09:32 IST on 2024-06-03.
    fn inside_window() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 4, 2, 0).unwrap()
    }

    #[tokio::test]
    async fn fires_once_within_window_per_day() {
        let storage = storage_with(at_0930_ist(true)).await;
        let runner = Arc::new(CountingRunner::new(false));
        let scheduler = make_scheduler(storage, Arc::clone(&runner) as Arc<dyn EvaluationRunner>);

        assert_eq!(scheduler.poll_once(inside_window()).await, 1);
        // Still inside the window, already fired today.
        assert_eq!(scheduler.poll_once(inside_window()).await, 0);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);

        // Next day it fires again.
        let next_day = Utc.with_ymd_and_hms(2024, 6, 4, 4, 2, 0).unwrap();
        assert_eq!(scheduler.poll_once(next_day).await, 1);
    }

    #[tokio::test]
    async fn fired_marker_survives_a_restart() {
        let storage = storage_with(at_0930_ist(true)).await;
        let runner = Arc::new(CountingRunner::new(false));
        let scheduler = make_scheduler(
            Arc::clone(&storage),
            Arc::clone(&runner) as Arc<dyn EvaluationRunner>,
        );
        assert_eq!(scheduler.poll_once(inside_window()).await, 1);

        // A fresh scheduler over the same storage sees the fired marker and
        // does not run the user again inside the window.
        let restarted =
            make_scheduler(storage, Arc::clone(&runner) as Arc<dyn EvaluationRunner>);
        assert_eq!(restarted.poll_once(inside_window()).await, 0);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    fn at_2358_utc() -> ScheduleConfig {
        ScheduleConfig {
            user_id: 7,
            enabled: true,
            fire_time: NaiveTime::from_hms_opt(23, 58, 0).unwrap(),
            utc_offset_minutes: 0,
        }
    }

    #[tokio::test]
    async fn window_spanning_midnight_fires_after_rollover() {
        let storage = storage_with(at_2358_utc()).await;
        let runner = Arc::new(CountingRunner::new(false));
        let scheduler = make_scheduler(storage, Arc::clone(&runner) as Arc<dyn EvaluationRunner>);

        // First poll lands after the local date change, three minutes into
        // the window opened at 23:58.
        let after_midnight = Utc.with_ymd_and_hms(2024, 6, 4, 0, 1, 0).unwrap();
        assert_eq!(scheduler.poll_once(after_midnight).await, 1);
    }

    #[tokio::test]
    async fn window_spanning_midnight_does_not_refire_after_rollover() {
        let storage = storage_with(at_2358_utc()).await;
        let runner = Arc::new(CountingRunner::new(false));
        let scheduler = make_scheduler(storage, Arc::clone(&runner) as Arc<dyn EvaluationRunner>);

        let before_midnight = Utc.with_ymd_and_hms(2024, 6, 3, 23, 59, 0).unwrap();
        assert_eq!(scheduler.poll_once(before_midnight).await, 1);

        // Same window, new local date: the marker from 23:59 still applies.
        let after_midnight = Utc.with_ymd_and_hms(2024, 6, 4, 0, 1, 0).unwrap();
        assert_eq!(scheduler.poll_once(after_midnight).await, 0);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_fire_outside_window_or_when_disabled() {
        let storage = storage_with(at_0930_ist(true)).await;
        let runner = Arc::new(CountingRunner::new(false));
        let scheduler = make_scheduler(storage, Arc::clone(&runner) as Arc<dyn EvaluationRunner>);

        // 09:00 IST, before the fire time.
        let early = Utc.with_ymd_and_hms(2024, 6, 3, 3, 30, 0).unwrap();
        assert_eq!(scheduler.poll_once(early).await, 0);

        // 09:40 IST, past the five-minute tolerance.
        let late = Utc.with_ymd_and_hms(2024, 6, 3, 4, 10, 0).unwrap();
        assert_eq!(scheduler.poll_once(late).await, 0);

        let disabled = storage_with(at_0930_ist(false)).await;
        let scheduler = make_scheduler(disabled, Arc::new(CountingRunner::new(false)));
        assert_eq!(scheduler.poll_once(inside_window()).await, 0);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_run_retries_on_next_tick() {
        let storage = storage_with(at_0930_ist(true)).await;
        let runner = Arc::new(CountingRunner::new(true));
        let scheduler = make_scheduler(storage, Arc::clone(&runner) as Arc<dyn EvaluationRunner>);

        assert_eq!(scheduler.poll_once(inside_window()).await, 0);
        assert_eq!(scheduler.poll_once(inside_window()).await, 0);
        // Not marked as fired, so both polls attempted the run.
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn overlapping_runs_for_one_user_are_refused() {
        let storage = storage_with(at_0930_ist(true)).await;
        let release = Arc::new(Notify::new());
        let runner = Arc::new(BlockingRunner {
            release: Arc::clone(&release),
        });
        let scheduler = Arc::new(make_scheduler(storage, runner as Arc<dyn EvaluationRunner>));

        let first = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.poll_once(inside_window()).await }
        });
        // Let the first poll reach the blocked runner.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        // Second poll sees the user as running and skips it.
        assert_eq!(scheduler.poll_once(inside_window()).await, 0);

        release.notify_one();
        assert_eq!(first.await.unwrap(), 1);
    }
}
