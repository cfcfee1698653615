//! Signal consumer: drains the monitor's output channel.
//!
//! Hands each signal to a callback (by default a JSON line on stdout for
//! the external autoscaling loop) and, when configured, re-arms the key's
//! scaling gate once the scaling action has had time to settle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use connscale_core::{MonitorKey, SignalRecord};
use connscale_monitor::{ConnectionMonitor, MonitorError, SignalStream};

/// Callback invoked for every consumed signal.
pub type SignalCallback = Box<dyn Fn(SignalRecord) -> BoxFuture + Send + Sync>;

type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>;

pub struct SignalConsumer {
    monitor: Arc<ConnectionMonitor>,
    stream: SignalStream,
    /// Delay before clearing a key's gate after its signal was handed off.
    rearm_after: Option<Duration>,
    /// Latest signal generation per key with a re-arm pending.
    rearm_generations: Arc<Mutex<HashMap<MonitorKey, u64>>>,
    on_signal: SignalCallback,
}

impl SignalConsumer {
    pub fn new(monitor: Arc<ConnectionMonitor>, stream: SignalStream) -> Self {
        Self {
            monitor,
            stream,
            rearm_after: None,
            rearm_generations: Arc::default(),
            on_signal: Box::new(|record| -> BoxFuture {
                Box::pin(async move { print_json_line(&record) })
            }),
        }
    }

    pub fn with_rearm_after(mut self, rearm_after: Option<Duration>) -> Self {
        self.rearm_after = rearm_after;
        self
    }

    #[cfg(test)]
    pub fn with_callback(mut self, f: SignalCallback) -> Self {
        self.on_signal = f;
        self
    }

    /// Handle one signal: deliver it, then schedule the re-arm.
    async fn handle(&self, record: SignalRecord) {
        let signal = record.signal();
        info!(key = %signal.key, direction = %signal.direction, "scale signal consumed");

        if let Err(e) = (self.on_signal)(record).await {
            warn!(key = %signal.key, error = %e, "signal delivery failed");
        }

        if let Some(delay) = self.rearm_after {
            let generation = {
                let mut generations = self.rearm_generations.lock().await;
                let current = generations.entry(signal.key).or_insert(0);
                *current += 1;
                *current
            };
            let generations = Arc::clone(&self.rearm_generations);
            let monitor = Arc::clone(&self.monitor);
            let key = signal.key;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                {
                    let mut generations = generations.lock().await;
                    // A later signal for this key owns the gate now.
                    if generations.get(&key) != Some(&generation) {
                        debug!(%key, generation, "superseded re-arm skipped");
                        return;
                    }
                    generations.remove(&key);
                }
                match monitor.clear_gate(&key) {
                    Ok(_) => {}
                    Err(MonitorError::UnknownKey(_)) => {
                        debug!(%key, "key unregistered before re-arm");
                    }
                    Err(e) => warn!(%key, error = %e, "re-arm failed"),
                }
            });
        }
    }

    /// Run until shutdown or until the monitor is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(rearm_after = ?self.rearm_after, "signal consumer started");

        loop {
            tokio::select! {
                record = self.stream.recv() => match record {
                    Some(record) => self.handle(record).await,
                    None => {
                        info!("signal channel closed");
                        break;
                    }
                },
                _ = shutdown.changed() => {
                    info!("signal consumer shutting down");
                    break;
                }
            }
        }
    }
}

fn print_json_line(record: &SignalRecord) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(record)?);
    Ok(())
}
