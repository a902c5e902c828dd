//! Recurring task scheduler
//!
//! Two repeating tasks drive the hub: "publish-due" (every 5 minutes) and
//! "refresh-metrics" (every 60 minutes). In a fleet, only the designated
//! processing node runs them, and a shared registry keyed by group name
//! prevents a second registration of the same task. Tasks are plain
//! closures capturing their services; a task's runs never overlap because
//! each worker awaits the current run before sleeping again.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::store::Store;

pub const PUBLISH_TASK_GROUP: &str = "publish-due";
pub const METRICS_TASK_GROUP: &str = "refresh-metrics";

type TaskFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct TaskSpec {
    group: &'static str,
    interval: Duration,
    run: TaskFn,
}

pub struct Scheduler {
    store: Store,
    processing_node: bool,
    tasks: Vec<TaskSpec>,
    running: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(store: Store, processing_node: bool) -> Self {
        Self {
            store,
            processing_node,
            tasks: Vec::new(),
            running: Vec::new(),
        }
    }

    /// Add a recurring task. `run` is captured at construction time with
    /// everything it needs; nothing is looked up when the trigger fires.
    pub fn add_task<F, Fut>(&mut self, group: &'static str, interval: Duration, run: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tasks.push(TaskSpec {
            group,
            interval,
            run: Arc::new(move || Box::pin(run())),
        });
    }

    /// Register and start every task that is not already registered in the
    /// shared namespace. On a non-processing node nothing is registered.
    /// Returns the number of tasks started.
    pub async fn start(&mut self) -> Result<usize> {
        if !self.processing_node {
            warn!("Not a processing node, no recurring tasks registered");
            return Ok(0);
        }

        let mut started = 0;
        for spec in self.tasks.drain(..) {
            if self.store.task_registered(spec.group).await? {
                warn!(
                    "Task group '{}' already registered, skipping",
                    spec.group
                );
                continue;
            }

            self.store.register_task(spec.group).await?;
            info!(
                "Scheduled task '{}' every {}s",
                spec.group,
                spec.interval.as_secs()
            );

            let group = spec.group;
            let interval = spec.interval;
            let run = spec.run;

            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // Consume the immediate first tick so the first run happens
                // one interval after startup.
                ticker.tick().await;

                loop {
                    ticker.tick().await;
                    info!("Task '{}' firing", group);
                    run().await;
                }
            });

            self.running.push((group, handle));
            started += 1;
        }

        Ok(started)
    }

    /// Run every configured task once, immediately. Used by `--once` mode.
    pub async fn run_once(&self) {
        for spec in &self.tasks {
            info!("Running task '{}' once", spec.group);
            (spec.run)().await;
        }
    }

    /// Stop the workers and release the registry entries.
    pub async fn shutdown(&mut self) {
        for (group, handle) in self.running.drain(..) {
            handle.abort();
            if let Err(e) = self.store.remove_task(group).await {
                error!("Failed to deregister task '{}': {}", group, e);
            } else {
                info!("Task '{}' unscheduled", group);
            }
        }
    }

    /// Groups currently running in this process.
    pub fn running_groups(&self) -> Vec<&'static str> {
        self.running.iter().map(|(group, _)| *group).collect()
    }
}

/// Wire the two standard hub tasks onto a scheduler. Each closure captures
/// its service; a failed run logs and waits for the next trigger.
pub fn add_standard_tasks(
    scheduler: &mut Scheduler,
    publish: crate::publish::PublishService,
    metrics: crate::metrics::MetricsService,
    publish_interval: Duration,
    metrics_interval: Duration,
) {
    scheduler.add_task(PUBLISH_TASK_GROUP, publish_interval, move || {
        let publish = publish.clone();
        async move {
            if let Err(e) = publish.publish_due_scheduled().await {
                error!("publish-due run failed: {}", e);
            }
        }
    });

    scheduler.add_task(METRICS_TASK_GROUP, metrics_interval, move || {
        let metrics = metrics.clone();
        async move {
            if let Err(e) = metrics.refresh_published_posts().await {
                error!("refresh-metrics run failed: {}", e);
            }
        }
    });
}
