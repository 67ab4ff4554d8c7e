//! Temporal scheduler
//!
//! One background task with two fixed-interval checks (snooze wake and
//! scheduled send), both firing once immediately on start, plus an optional
//! periodic full resync. The task feeds ordinary commands to the mailbox
//! actor, so its transitions queue behind and ahead of user commands in
//! arrival order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::constants::{SCHEDULED_SEND_CHECK_SECS, SNOOZE_CHECK_SECS};
use crate::gateway::PersistenceGateway;
use crate::mailbox::{MailboxHandle, MailboxOp};
use crate::retry::{RetryConfig, with_retry};

/// Wall clock used to judge deadlines
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub snooze_check: Duration,
    pub scheduled_send_check: Duration,
    /// `None` disables periodic reconciliation
    pub resync: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            snooze_check: Duration::from_secs(SNOOZE_CHECK_SECS),
            scheduled_send_check: Duration::from_secs(SCHEDULED_SEND_CHECK_SECS),
            resync: None,
        }
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    clock: Clock,
    running: Option<(CancellationToken, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            clock: Arc::new(Utc::now),
            running: None,
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|(_, task)| !task.is_finished())
    }

    /// Spawn the background task. A second call while running is ignored.
    pub fn start<G: PersistenceGateway>(&mut self, handle: MailboxHandle, gateway: Arc<G>) {
        if self.is_running() {
            tracing::warn!("Scheduler already running");
            return;
        }
        let token = CancellationToken::new();
        let task = tokio::spawn(run_scheduler(
            self.config,
            Arc::clone(&self.clock),
            handle,
            gateway,
            token.clone(),
        ));
        tracing::info!(
            "Scheduler started (snooze every {:?}, send every {:?}, resync {:?})",
            self.config.snooze_check,
            self.config.scheduled_send_check,
            self.config.resync
        );
        self.running = Some((token, task));
    }

    /// Cancel the task and wait for it to finish
    pub async fn stop(&mut self) {
        let Some((token, task)) = self.running.take() else {
            return;
        };
        token.cancel();
        if let Err(e) = task.await {
            tracing::warn!("Scheduler task ended abnormally: {}", e);
        }
        tracing::info!("Scheduler stopped");
    }
}

fn every(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Resolves on the next tick, or never when there is no interval
async fn tick_opt(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn run_scheduler<G: PersistenceGateway>(
    config: SchedulerConfig,
    clock: Clock,
    handle: MailboxHandle,
    gateway: Arc<G>,
    token: CancellationToken,
) {
    let mut snooze_check = every(config.snooze_check);
    let mut send_check = every(config.scheduled_send_check);
    // Resync skips the immediate first tick; the store was just loaded
    let mut resync = config.resync.map(|period| {
        let mut interval =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    loop {
        let op = tokio::select! {
            _ = token.cancelled() => break,
            _ = snooze_check.tick() => MailboxOp::WakeDueSnoozes(clock()),
            _ = send_check.tick() => MailboxOp::ReleaseDueScheduled(clock()),
            _ = tick_opt(&mut resync) => {
                // Returns early once the token is cancelled
                resync_now(gateway.as_ref(), &handle, &token).await;
                continue;
            }
        };

        match handle.execute(op).await {
            Ok(outcome) if outcome.is_persisted() => {
                tracing::info!("Scheduler moved {} message(s)", outcome.tickets.len());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Scheduler stopping: {}", e);
                break;
            }
        }
    }
}

/// Fetch the authoritative collection and hand it to the store. Cancelling
/// `token` abandons the fetch and its backoff, and results that arrive
/// after cancellation are dropped. Returns whether the store was updated.
pub async fn resync_now<G: PersistenceGateway>(
    gateway: &G,
    handle: &MailboxHandle,
    token: &CancellationToken,
) -> bool {
    let fetched = with_retry(&RetryConfig::default(), token, || gateway.fetch_all()).await;

    if token.is_cancelled() {
        tracing::debug!("Discarding resync result after shutdown");
        return false;
    }

    match fetched {
        Ok(messages) => handle.execute(MailboxOp::ReplaceAll(messages)).await.is_ok(),
        Err(e) => {
            tracing::warn!("Resync failed: {}", e);
            false
        }
    }
}
