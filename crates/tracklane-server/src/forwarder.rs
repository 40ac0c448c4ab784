//! Fire-and-forget postback dispatch.
//!
//! A bounded queue plus one worker task sits between the request path and
//! the network: conversions enqueue a job and return immediately, so a slow
//! or failing traffic-channel endpoint never adds latency to tracking
//! responses. Send outcomes are recorded on the conversion row for manual
//! replay; failures are logged, never propagated.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, warn};

use tracklane_core::backend::TrackingBackend;
use tracklane_core::config::Config;

#[derive(Debug, Clone)]
pub struct PostbackJob {
    pub conversion_id: String,
    pub url: String,
}

#[derive(Clone)]
pub struct PostbackForwarder {
    tx: mpsc::Sender<PostbackJob>,
}

impl PostbackForwarder {
    /// Spawn the worker task and return the enqueue handle. Queue capacity
    /// and retry count come from config.
    pub fn spawn(backend: Arc<dyn TrackingBackend>, config: &Config) -> Self {
        let (tx, mut rx) = mpsc::channel::<PostbackJob>(config.postback_queue_capacity.max(1));
        let retries = config.postback_retries;

        tokio::spawn(async move {
            let client = match reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(3))
                .timeout(Duration::from_secs(5))
                .build()
            {
                Ok(client) => client,
                Err(e) => {
                    error!(error = %e, "postback client build failed; forwarder disabled");
                    return;
                }
            };
            while let Some(job) = rx.recv().await {
                deliver(&client, backend.as_ref(), job, retries).await;
            }
        });

        Self { tx }
    }

    /// Hand a job to the worker. When the queue is full the job is dropped
    /// with a warning — the conversion itself is already committed and the
    /// row keeps `postback_sent = false` for replay.
    pub fn enqueue(&self, job: PostbackJob) {
        if let Err(e) = self.tx.try_send(job) {
            warn!(error = %e, "postback queue full, dropping job");
        }
    }
}

async fn deliver(
    client: &reqwest::Client,
    backend: &dyn TrackingBackend,
    job: PostbackJob,
    retries: u32,
) {
    let mut last_error = String::new();
    for attempt in 0..=retries {
        if attempt > 0 {
            tokio::time::sleep(backoff_delay(attempt)).await;
        }
        match client.get(&job.url).send().await {
            Ok(response) if response.status().is_success() => {
                let status = response.status().to_string();
                if let Err(e) = backend
                    .set_postback_result(&job.conversion_id, true, Some(&status))
                    .await
                {
                    warn!(conversion_id = %job.conversion_id, error = %e, "failed to record postback success");
                }
                return;
            }
            Ok(response) => last_error = format!("status {}", response.status()),
            Err(e) => last_error = format!("send failed: {e}"),
        }
        warn!(
            conversion_id = %job.conversion_id,
            attempt,
            error = %last_error,
            "postback attempt failed"
        );
    }

    if let Err(e) = backend
        .set_postback_result(&job.conversion_id, false, Some(&last_error))
        .await
    {
        warn!(conversion_id = %job.conversion_id, error = %e, "failed to record postback failure");
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(500u64 << attempt.min(6))
}
