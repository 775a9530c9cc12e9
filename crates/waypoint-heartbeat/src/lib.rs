//! Interval-driven heartbeat scheduler for Waypoint.
//!
//! A Game Server proves its games are alive by rewriting their
//! `ActiveGameStatus` records on a fixed cadence. This crate owns the
//! cadence; the work done on each beat is supplied as named async tasks.
//!
//! # Usage
//!
//! ```ignore
//! let handle = HeartbeatScheduler::new(HeartbeatConfig::default())
//!     .with_task("active-game-status", move || {
//!         let server = server.clone();
//!         async move { server.refresh_active_games().await }
//!     })
//!     .start();
//! // ... dropping `handle` stops the loop.
//! ```
//!
//! # Missed beats
//!
//! Beats never pile up. If the tasks of one beat run past the next
//! deadline, the missed beats are skipped and the schedule restarts from
//! the moment the late beat fired. A refresh that is late once is
//! harmless; a burst of catch-up writes is not.

use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`HeartbeatScheduler`].
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between beats. Default: 10 s.
    pub tick: Duration,
    /// Upper bound of the random delay added to the *first* beat so that
    /// servers started together do not hit the store in lockstep.
    /// Default: 500 ms.
    pub initial_jitter: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(10),
            initial_jitter: Duration::from_millis(500),
        }
    }
}

impl HeartbeatConfig {
    /// Shortest tick the scheduler accepts.
    pub const MIN_TICK: Duration = Duration::from_millis(1);

    /// A config with the given tick and no jitter.
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick,
            initial_jitter: Duration::ZERO,
        }
    }

    /// Raises a too-short tick to [`Self::MIN_TICK`].
    ///
    /// Called automatically by [`HeartbeatScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.tick < Self::MIN_TICK {
            warn!(tick = ?self.tick, min = ?Self::MIN_TICK, "heartbeat tick too short, clamping");
            self.tick = Self::MIN_TICK;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Beat info
// ---------------------------------------------------------------------------

/// Information about one beat, returned by [`HeartbeatScheduler::wait_for_beat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatInfo {
    /// Monotonically increasing beat number, starting at 1.
    pub beat: u64,
    /// Beats skipped because this one fired late.
    pub missed: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

type TaskFn = Box<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct NamedTask {
    name: String,
    run: TaskFn,
}

/// Runs a list of named async tasks once per beat.
///
/// Tasks run one after another, in the order they were added, so a
/// beat is finished only when every task has finished.
pub struct HeartbeatScheduler {
    config: HeartbeatConfig,
    next_beat: Instant,
    beat_count: u64,
    tasks: Vec<NamedTask>,
}

impl HeartbeatScheduler {
    pub fn new(config: HeartbeatConfig) -> Self {
        let config = config.validated();

        let jitter = if config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max = u64::try_from(config.initial_jitter.as_micros()).unwrap_or(u64::MAX);
            Duration::from_micros(rand::rng().random_range(0..max))
        };
        debug!(tick = ?config.tick, ?jitter, "heartbeat scheduler created");

        Self {
            next_beat: Instant::now() + config.tick + jitter,
            config,
            beat_count: 0,
            tasks: Vec::new(),
        }
    }

    /// Registers a task to run on every beat.
    pub fn add_task<F, Fut>(&mut self, name: impl Into<String>, task: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(NamedTask {
            name: name.into(),
            run: Box::new(move || Box::pin(task())),
        });
    }

    /// Builder form of [`add_task`](Self::add_task).
    pub fn with_task<F, Fut>(mut self, name: impl Into<String>, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_task(name, task);
        self
    }

    /// Names of the registered tasks, in run order.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.name.as_str())
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    pub fn tick(&self) -> Duration {
        self.config.tick
    }

    /// Waits until the next beat is due.
    pub async fn wait_for_beat(&mut self) -> BeatInfo {
        let due = self.next_beat;
        time::sleep_until(due).await;

        let now = Instant::now();
        let tick = self.config.tick;
        let late_by = now.saturating_duration_since(due);
        let missed = u64::try_from(late_by.as_nanos() / tick.as_nanos()).unwrap_or(u64::MAX);
        if missed > 0 {
            warn!(
                beat = self.beat_count + 1,
                missed,
                late_ms = late_by.as_millis() as u64,
                "heartbeat fell behind, skipping ahead"
            );
        }

        self.beat_count += 1;
        self.next_beat = now + tick;
        BeatInfo {
            beat: self.beat_count,
            missed,
        }
    }

    /// Runs every registered task once, in order.
    pub async fn run_tasks(&self) {
        for task in &self.tasks {
            trace!(task = %task.name, beat = self.beat_count, "heartbeat task");
            (task.run)().await;
        }
    }

    /// Spawns the beat loop onto the current runtime.
    ///
    /// The loop runs until the returned handle is stopped or dropped.
    pub fn start(mut self) -> HeartbeatHandle {
        debug!(tasks = self.tasks.len(), "heartbeat started");
        let task = tokio::spawn(async move {
            loop {
                self.wait_for_beat().await;
                self.run_tasks().await;
            }
        });
        HeartbeatHandle { task }
    }
}

/// Owner of a running heartbeat loop. Dropping it stops the loop.
pub struct HeartbeatHandle {
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Stops the loop. A beat in progress is cancelled at its next
    /// suspension point.
    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
