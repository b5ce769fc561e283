//! Queue polling loop
//!
//! Keeps up to `max_concurrent_jobs` processing invocations in flight. A
//! message is acknowledged once its invocation has recorded an outcome; a
//! retry outcome or an unrecordable failure leaves it to reappear after the
//! visibility timeout.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use mixcut_common::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::stages::{ProcessingStage, StageOutcome};
use crate::storage::{Delivery, JobQueue};
use crate::StageContext;

pub struct Worker {
    queue: Arc<dyn JobQueue>,
    stage: ProcessingStage,
    max_concurrent_jobs: usize,
    poll_interval: std::time::Duration,
}

impl Worker {
    pub fn new(ctx: StageContext) -> Self {
        Self {
            queue: Arc::clone(&ctx.queue),
            max_concurrent_jobs: ctx.config.max_concurrent_jobs.max(1),
            poll_interval: ctx.config.queue.poll_interval(),
            stage: ProcessingStage::new(ctx),
        }
    }

    /// Receive and handle at most one message
    pub async fn run_once(&self) -> Result<Option<StageOutcome>> {
        match self.queue.receive().await? {
            Some(delivery) => Ok(self.handle(delivery).await),
            None => Ok(None),
        }
    }

    /// Poll until `shutdown` is cancelled, then wait for in-flight jobs
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            max_concurrent_jobs = self.max_concurrent_jobs,
            "Worker started"
        );

        let mut in_flight = FuturesUnordered::new();

        loop {
            while in_flight.len() < self.max_concurrent_jobs && !shutdown.is_cancelled() {
                match self.queue.receive().await {
                    Ok(Some(delivery)) => in_flight.push(self.handle(delivery)),
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "Failed to receive from queue");
                        break;
                    }
                }
            }

            if shutdown.is_cancelled() {
                break;
            }

            tokio::select! {
                Some(_) = in_flight.next(), if !in_flight.is_empty() => {}
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = shutdown.cancelled() => {}
            }
        }

        if !in_flight.is_empty() {
            info!(in_flight = in_flight.len(), "Waiting for in-flight jobs");
            while in_flight.next().await.is_some() {}
        }
        info!("Worker stopped");
    }

    async fn handle(&self, delivery: Delivery) -> Option<StageOutcome> {
        let job_id = delivery.message.job_id;

        let outcome = match self.stage.handle(&delivery).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Could not record job outcome, message left for redelivery");
                return None;
            }
        };

        if outcome.should_ack() {
            if let Err(e) = self.queue.ack(&delivery).await {
                error!(job_id = %job_id, error = %e, "Failed to acknowledge message");
            }
        } else {
            debug!(job_id = %job_id, "Message left for redelivery");
        }

        Some(outcome)
    }
}
