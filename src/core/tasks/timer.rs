// src/core/tasks/timer.rs

//! Recurring background work that shares the link's write path.

use super::calendar::CalendarSchedule;
use crate::core::link::Link;
use crate::core::{MudlinkError, metrics};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// The work a timer does on each firing.
///
/// `run` takes `&self` and builds a new future each time, so nothing carries
/// over from one firing to the next.
#[async_trait]
pub trait TimerJob: Send + Sync {
    async fn run(&self, link: Link) -> Result<(), MudlinkError>;
}

#[async_trait]
impl<F, Fut> TimerJob for F
where
    F: Fn(Link) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), MudlinkError>> + Send + 'static,
{
    async fn run(&self, link: Link) -> Result<(), MudlinkError> {
        (self)(link).await
    }
}

/// When a timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Once immediately when started, then every period.
    Interval(Duration),
    /// At each matching local-time minute.
    Calendar(CalendarSchedule),
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Interval(period) => write!(f, "every {period:?}"),
            Schedule::Calendar(cal) => write!(f, "cron '{cal}'"),
        }
    }
}

#[derive(Clone)]
pub struct Timer {
    name: String,
    schedule: Schedule,
    pause_when_disconnected: bool,
    job: Arc<dyn TimerJob>,
}

impl Timer {
    /// Creates a timer that pauses while the transport is detached.
    pub fn new(name: impl Into<String>, schedule: Schedule, job: impl TimerJob + 'static) -> Self {
        Self {
            name: name.into(),
            schedule,
            pause_when_disconnected: true,
            job: Arc::new(job),
        }
    }

    pub fn every(name: impl Into<String>, period: Duration, job: impl TimerJob + 'static) -> Self {
        Self::new(name, Schedule::Interval(period), job)
    }

    pub fn cron(
        name: impl Into<String>,
        expression: &str,
        job: impl TimerJob + 'static,
    ) -> Result<Self, MudlinkError> {
        let schedule = CalendarSchedule::parse(expression)?;
        Ok(Self::new(name, Schedule::Calendar(schedule), job))
    }

    pub fn pause_when_disconnected(mut self, pause: bool) -> Self {
        self.pause_when_disconnected = pause;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn pauses_when_disconnected(&self) -> bool {
        self.pause_when_disconnected
    }

    /// Runs one firing now, honoring the pause flag. Returns false if the
    /// firing was skipped.
    pub async fn fire(&self, link: &Link) -> bool {
        if self.pause_when_disconnected && !link.is_attached() {
            debug!("Timer '{}' skipped: transport is detached.", self.name);
            return false;
        }
        metrics::TIMER_FIRINGS_TOTAL
            .with_label_values(&[self.name.as_str()])
            .inc();
        if let Err(e) = self.job.run(link.clone()).await {
            warn!("Timer '{}' failed: {}", self.name, e);
            metrics::HANDLER_FAILURES_TOTAL.inc();
            link.stats().increment_handler_failures();
        }
        true
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("name", &self.name)
            .field("schedule", &self.schedule)
            .field("pause_when_disconnected", &self.pause_when_disconnected)
            .finish()
    }
}

/// Drives one timer for the lifetime of a session.
pub struct TimerTask {
    timer: Timer,
    link: Link,
}

impl TimerTask {
    pub fn new(timer: Timer, link: Link) -> Self {
        Self { timer, link }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Timer '{}' started ({}).",
            self.timer.name, self.timer.schedule
        );
        match &self.timer.schedule {
            Schedule::Interval(period) => {
                let mut interval = tokio::time::interval(*period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = interval.tick() => {}
                    }
                    if !self.fire_or_shutdown(&mut shutdown_rx).await {
                        break;
                    }
                }
            }
            Schedule::Calendar(calendar) => {
                let mut last_fired: Option<DateTime<Local>> = None;
                loop {
                    let now = Local::now();
                    let from = last_fired.map_or(now, |last| last.max(now));
                    let Some(next) = calendar.next_after(&from) else {
                        warn!(
                            "Timer '{}' has no upcoming firing for '{}'; stopping.",
                            self.timer.name, calendar
                        );
                        break;
                    };
                    let delay = (next - now).to_std().unwrap_or_default();
                    tokio::select! {
                        biased;
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    last_fired = Some(next);
                    if !self.fire_or_shutdown(&mut shutdown_rx).await {
                        break;
                    }
                }
            }
        }
        info!("Timer '{}' stopped.", self.timer.name);
    }

    /// Returns false if shutdown arrived while the job was running.
    async fn fire_or_shutdown(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> bool {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => false,
            _ = self.timer.fire(&self.link) => true,
        }
    }
}
