//! Periodic execution of the research pipeline.
//!
//! Runs a [`Job`] on a fixed interval (first run immediately) or on a
//! five-field cron expression in local time. A tick that arrives while the
//! previous run is still going is skipped.

use crate::error::ScheduleError;
use crate::settings::ScheduleSettings;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use croner::Cron;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// Work triggered by the scheduler.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    async fn run(&self);
}

/// When the job fires.
pub enum Trigger {
    Interval(Duration),
    Cron { expr: String, cron: Box<Cron> },
}

impl Trigger {
    /// A cron expression wins over the interval when both are set.
    pub fn from_settings(settings: &ScheduleSettings) -> Result<Self, ScheduleError> {
        match settings.cron.as_deref().map(str::trim) {
            Some(expr) if !expr.is_empty() => Ok(Trigger::Cron {
                expr: expr.to_string(),
                cron: Box::new(parse_cron(expr)?),
            }),
            _ => {
                if settings.interval_minutes == 0 {
                    return Err(ScheduleError::ZeroInterval);
                }
                let seconds = settings
                    .interval_minutes
                    .checked_mul(60)
                    .ok_or(ScheduleError::IntervalTooLarge(settings.interval_minutes))?;
                Ok(Trigger::Interval(Duration::from_secs(seconds)))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Trigger::Interval(period) => format!("every {} minute(s)", period.as_secs() / 60),
            Trigger::Cron { expr, .. } => format!("cron '{}'", expr),
        }
    }
}

/// Parse a minute/hour/day/month/weekday expression.
pub fn parse_cron(expr: &str) -> Result<Cron, ScheduleError> {
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        return Err(ScheduleError::CronFieldCount(fields, expr.to_string()));
    }

    Cron::new(expr)
        .parse()
        .map_err(|e| ScheduleError::InvalidCron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })
}

/// Time from `now` until the next occurrence, strictly after `now`.
pub fn next_delay(
    cron: &Cron,
    expr: &str,
    now: DateTime<Local>,
) -> Result<(DateTime<Local>, Duration), ScheduleError> {
    let next = cron
        .find_next_occurrence(&now, false)
        .map_err(|e| ScheduleError::InvalidCron {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;

    let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
    Ok((next, delay))
}

/// Clears the running flag when a run ends, including by panic.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Scheduler {
    trigger: Trigger,
    job: Arc<dyn Job>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(trigger: Trigger, job: Arc<dyn Job>) -> Self {
        Self {
            trigger,
            job,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start a run unless one is already active.
    fn fire(&self) -> Option<JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Previous run still in progress, skipping this tick");
            return None;
        }

        info!("Running scheduled research task");
        let guard = RunGuard(Arc::clone(&self.running));
        let job = Arc::clone(&self.job);
        Some(tokio::spawn(async move {
            let _guard = guard;
            job.run().await;
        }))
    }

    /// Tick until `shutdown` completes.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), ScheduleError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Scheduler started: {}", self.trigger.describe());

        match &self.trigger {
            Trigger::Interval(period) => self.run_interval(*period, shutdown.as_mut()).await,
            Trigger::Cron { expr, cron } => {
                self.run_cron(cron, expr, Local::now, shutdown.as_mut())
                    .await?
            }
        }

        if self.running.load(Ordering::SeqCst) {
            warn!("Scheduler stopping while a run is still in progress");
        }
        info!("Scheduler stopped");
        Ok(())
    }

    async fn run_interval<F>(&self, period: Duration, mut shutdown: Pin<&mut F>)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.as_mut() => break,
                _ = ticker.tick() => {
                    self.fire();
                }
            }
        }
    }

    /// `now` is read before every wait.
    async fn run_cron<F, C>(
        &self,
        cron: &Cron,
        expr: &str,
        now: C,
        mut shutdown: Pin<&mut F>,
    ) -> Result<(), ScheduleError>
    where
        F: Future<Output = ()>,
        C: Fn() -> DateTime<Local>,
    {
        loop {
            let (next, delay) = next_delay(cron, expr, now())?;
            info!("Next run at {}", next.format("%Y-%m-%d %H:%M:%S"));

            tokio::select! {
                _ = shutdown.as_mut() => return Ok(()),
                _ = tokio::time::sleep(delay) => {
                    self.fire();
                }
            }
        }
    }

    /// Tick until Ctrl-C.
    pub async fn run_forever(&self) -> Result<(), ScheduleError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl-C, shutting down");
        })
        .await
    }
}

/// Run `job` according to `settings` until Ctrl-C. Returns immediately
/// when scheduling is disabled.
pub async fn start(settings: &ScheduleSettings, job: Arc<dyn Job>) -> Result<(), ScheduleError> {
    if !settings.enabled {
        warn!("Scheduling is disabled (SCHEDULE_ENABLED=false)");
        return Ok(());
    }

    let trigger = Trigger::from_settings(settings)?;
    Scheduler::new(trigger, job).run_forever().await
}
