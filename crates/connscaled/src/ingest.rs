//! Line-delimited JSON event ingestion.
//!
//! Lets an external observer pipe extracted connection events into the
//! daemon, one `{"key": "netns:4026531840", "state": 1}` object per line.
//!
//! Stdin is read on a plain OS thread that forwards lines over a bounded
//! channel. A read blocked on an idle pipe never holds up runtime shutdown.

use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use connscale_core::ConnEvent;
use connscale_monitor::ConnectionMonitor;

/// Lines buffered between the reader thread and the monitor.
const LINE_BUFFER: usize = 256;

/// Forward every line of `reader` into `tx` until EOF, a read error, or
/// the receiving side going away. Blocks the calling thread.
pub fn forward_lines<R: BufRead>(reader: R, tx: mpsc::Sender<String>) {
    for line in reader.lines() {
        match line {
            Ok(line) => {
                if tx.blocking_send(line).is_err() {
                    debug!("event ingestion gone, reader stopping");
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "event input read failed");
                return;
            }
        }
    }
}

/// Feed received lines into the monitor until the sender closes or
/// shutdown is signalled.
///
/// Malformed lines are logged and skipped. Returns the number of events
/// handed to the monitor.
pub async fn ingest_lines(
    mut lines: mpsc::Receiver<String>,
    monitor: Arc<ConnectionMonitor>,
    mut shutdown: watch::Receiver<bool>,
) -> u64 {
    let mut ingested = 0u64;

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = shutdown.changed() => {
                debug!("event ingestion shutting down");
                break;
            }
        };
        let Some(line) = line else {
            info!(ingested, "event input closed");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ConnEvent>(line) {
            Ok(event) => {
                monitor.on_event(&event);
                ingested += 1;
            }
            Err(e) => warn!(error = %e, line, "malformed event line skipped"),
        }
    }

    ingested
}

/// Ingest events from the process's standard input.
pub async fn ingest_stdin(
    monitor: Arc<ConnectionMonitor>,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<u64> {
    let (tx, rx) = mpsc::channel(LINE_BUFFER);
    std::thread::Builder::new()
        .name("connscale-stdin".to_string())
        .spawn(move || forward_lines(std::io::stdin().lock(), tx))?;
    Ok(ingest_lines(rx, monitor, shutdown).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    use connscale_core::{GatePolicy, MonitorKey, MonitorSettings, ThresholdConfig};
    use connscale_monitor::SignalStream;

    fn test_monitor() -> (Arc<ConnectionMonitor>, SignalStream) {
        let (monitor, stream) = ConnectionMonitor::new(&MonitorSettings {
            gate: GatePolicy::Latched,
            max_keys: 8,
            signal_slots: 1,
            slot_capacity: 8,
        });
        let monitor = monitor
            .with_thresholds(ThresholdConfig::new(2, 10, 3).unwrap())
            .unwrap();
        (Arc::new(monitor), stream)
    }

    /// Pipe `input` through a reader thread, as stdin ingestion does.
    fn piped(input: &str) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(LINE_BUFFER);
        let input = input.to_string();
        std::thread::spawn(move || forward_lines(Cursor::new(input), tx));
        rx
    }

    #[tokio::test]
    async fn ingests_valid_lines_and_skips_garbage() {
        let (monitor, _stream) = test_monitor();
        let key = MonitorKey::Netns(4026531840);
        monitor.register(key).unwrap();

        let input = concat!(
            "{\"key\":\"netns:4026531840\",\"state\":1}\n",
            "not json\n",
            "\n",
            "{\"key\":\"netns:4026531840\",\"state\":1}\n",
            "{\"key\":\"netns:4026531840\",\"state\":10}\n",
            "{\"key\":\"port:1\",\"state\":1}\n",
        );
        let (_tx, rx) = watch::channel(false);
        let n = ingest_lines(piped(input), Arc::clone(&monitor), rx).await;

        assert_eq!(n, 4);
        assert_eq!(monitor.stats(&key).unwrap().count, 2);
        let m = monitor.metrics();
        assert_eq!(m.events_ignored, 1);
        assert_eq!(m.events_unwatched, 1);
    }

    #[tokio::test]
    async fn emits_signal_from_piped_events() {
        let (monitor, mut stream) = test_monitor();
        monitor.register(MonitorKey::Port(8080)).unwrap();

        let input = "{\"key\":\"port:8080\",\"state\":7}\n".repeat(3);
        let (_tx, rx) = watch::channel(false);
        ingest_lines(piped(&input), Arc::clone(&monitor), rx).await;

        assert_eq!(stream.drain().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_stops_ingestion_while_input_stays_open() {
        let (monitor, _stream) = test_monitor();
        let key = MonitorKey::Port(443);
        monitor.register(key).unwrap();

        // The sender is held for the whole test, like an idle observer
        // that never closes its end of the pipe.
        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(ingest_lines(line_rx, Arc::clone(&monitor), shutdown_rx));

        line_tx
            .send("{\"key\":\"port:443\",\"state\":1}".to_string())
            .await
            .unwrap();
        while monitor.stats(&key).unwrap().count == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        shutdown_tx.send(true).unwrap();
        let n = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("ingestion did not stop on shutdown")
            .unwrap();
        assert_eq!(n, 1);
        drop(line_tx);
    }

    #[test]
    fn reader_stops_when_ingestion_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        // Returns instead of blocking on a channel nobody drains.
        forward_lines(Cursor::new("a\nb\nc\n"), tx);
    }
}
