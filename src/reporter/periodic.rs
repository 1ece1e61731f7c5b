//! Periodic Reporter
//!
//! Runs a background timer that enqueues a measurement task every interval.
//! It never publishes itself; the worker does.

use crate::queue::{Task, TaskProducer};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct PeriodicReporter {
    interval: Duration,
    producer: TaskProducer,
}

impl PeriodicReporter {
    pub fn new(interval: Duration, producer: TaskProducer) -> Self {
        Self { interval, producer }
    }

    /// Start the reporting background task.
    /// The first measurement is enqueued one interval after start.
    pub fn start(self) -> ReporterHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let Self { interval, producer } = self;

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("[REPORTER] Started, interval {:?}", interval);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if let Err(e) = producer.enqueue(Task::SendMeasurement).await {
                            warn!("[REPORTER] Cannot enqueue measurement: {}", e);
                            break;
                        }
                        debug!("[REPORTER] Measurement enqueued");
                    }
                }
            }

            info!("[REPORTER] Stopped");
        });

        ReporterHandle {
            stop_tx: Some(stop_tx),
            task,
        }
    }
}

/// Handle to stop the reporter
pub struct ReporterHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ReporterHandle {
    /// Stop admitting measurements and wait for the timer task to end
    pub async fn stop(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("[REPORTER] Timer task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
