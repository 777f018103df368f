//! Minute-granularity dispatcher.
//!
//! A single cooperative loop wakes once per minute, aligned to the
//! zero-second boundary, and fires every schedule whose cron expression
//! matches the current minute and which has not already fired in that
//! minute. Each firing spawns one backup-then-cleanup pipeline task;
//! overlapping pipelines are permitted, duplication being prevented by the
//! catalog's unique artifact ids.

use async_trait::async_trait;
use chrono::{DateTime, Local, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use bk_config::ScheduleConfig;

use crate::cron::CronExpr;

/// The pipeline a firing launches. Implemented by the core orchestrators.
#[async_trait]
pub trait PipelineRunner: Send + Sync + 'static {
    /// Run one backup-then-cleanup pipeline for the schedule.
    async fn run(&self, schedule: &str);
}

/// One dispatchable schedule.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub name: String,
    pub cron: CronExpr,
    /// Effective zone; `None` evaluates in local time.
    pub zone: Option<Tz>,
}

impl ScheduleEntry {
    fn matches(&self, now: DateTime<Utc>) -> bool {
        match self.zone {
            Some(tz) => self.cron.matches(&now.with_timezone(&tz)),
            None => self.cron.matches(&now.with_timezone(&Local)),
        }
    }

    /// The next firing instant after `from`.
    pub fn next_run(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.zone {
            Some(tz) => self
                .cron
                .next_run(&from.with_timezone(&tz))
                .map(|dt| dt.with_timezone(&Utc)),
            None => self
                .cron
                .next_run(&from.with_timezone(&Local))
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

/// Build dispatchable entries from configured schedules. Invalid cron
/// expressions or timezones are logged and skipped; the remaining
/// schedules still run.
pub fn build_entries(
    schedules: impl IntoIterator<Item = (String, ScheduleConfig)>,
    default_zone: Option<Tz>,
) -> Vec<ScheduleEntry> {
    let mut entries = Vec::new();
    for (name, config) in schedules {
        let cron = match CronExpr::parse(&config.cron) {
            Ok(cron) => cron,
            Err(e) => {
                tracing::error!(schedule = %name, error = %e, "skipping schedule with invalid cron expression");
                continue;
            }
        };
        let zone = match &config.timezone {
            Some(zone) => match zone.parse::<Tz>() {
                Ok(tz) => Some(tz),
                Err(_) => {
                    tracing::error!(schedule = %name, %zone, "skipping schedule with unknown timezone");
                    continue;
                }
            },
            None => default_zone,
        };
        entries.push(ScheduleEntry { name, cron, zone });
    }
    entries
}

/// Dispatcher lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Initialized,
    Running,
    Stopped,
}

/// The cron-driven dispatcher.
pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
    runner: Arc<dyn PipelineRunner>,
    state: Mutex<SchedulerState>,
    /// Epoch minute each schedule last fired in. Owned exclusively by the
    /// dispatcher; ticks read and update it atomically under one lock.
    last_fired: Mutex<HashMap<String, i64>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stop: Notify,
}

impl Scheduler {
    pub fn new(entries: Vec<ScheduleEntry>, runner: Arc<dyn PipelineRunner>) -> Arc<Self> {
        Arc::new(Self {
            entries,
            runner,
            state: Mutex::new(SchedulerState::Initialized),
            last_fired: Mutex::new(HashMap::new()),
            tasks: Mutex::new(Vec::new()),
            stop: Notify::new(),
        })
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().expect("scheduler state poisoned")
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Run the minute loop until [`Scheduler::stop`] is called. A no-op if
    /// the scheduler is already running.
    pub async fn start(self: Arc<Self>) {
        {
            let mut state = self.state.lock().expect("scheduler state poisoned");
            if *state == SchedulerState::Running {
                return;
            }
            *state = SchedulerState::Running;
        }

        for entry in &self.entries {
            if let Some(next) = entry.next_run(Utc::now()) {
                tracing::info!(schedule = %entry.name, cron = %entry.cron.source(), %next, "schedule armed");
            }
        }

        loop {
            let wait = until_next_minute();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {
                    self.tick(Utc::now());
                }
                _ = self.stop.notified() => break,
            }
        }

        *self.state.lock().expect("scheduler state poisoned") = SchedulerState::Stopped;
        tracing::info!("scheduler stopped, in-flight pipelines draining");
    }

    /// Evaluate one tick: fire every schedule matching this minute that has
    /// not already fired in it.
    pub fn tick(&self, now: DateTime<Utc>) {
        let minute = now.timestamp() / 60;
        let mut last_fired = self.last_fired.lock().expect("last_fired poisoned");

        for entry in &self.entries {
            if !entry.matches(now) {
                continue;
            }
            if last_fired.get(&entry.name) == Some(&minute) {
                continue;
            }
            last_fired.insert(entry.name.clone(), minute);

            tracing::info!(schedule = %entry.name, "schedule fired");
            let runner = self.runner.clone();
            let name = entry.name.clone();
            let handle = tokio::spawn(async move {
                runner.run(&name).await;
            });

            let mut tasks = self.tasks.lock().expect("task list poisoned");
            tasks.retain(|t| !t.is_finished());
            tasks.push(handle);
        }
    }

    /// Request a stop. New firings cease; in-flight pipelines complete.
    pub fn stop(&self) {
        // notify_one stores a permit, so a stop issued between ticks is not
        // lost.
        self.stop.notify_one();
    }

    /// Wait up to `timeout` for in-flight pipelines to finish. Returns
    /// whether everything drained in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.tasks.lock().expect("task list poisoned"));
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };
        tokio::time::timeout(timeout, wait_all).await.is_ok()
    }
}

/// Duration until the next zero-second minute boundary.
fn until_next_minute() -> Duration {
    let now = Utc::now();
    let into_minute =
        now.second() as u64 * 1_000 + (now.timestamp_subsec_millis() as u64 % 1_000);
    Duration::from_millis(60_000u64.saturating_sub(into_minute).max(1))
}
