//! Prometheus text exposition format.
//!
//! Renders the monitor counters and per-key state for scraping by a
//! Prometheus server or compatible agent.

use crate::metrics::MetricsSnapshot;
use crate::registry::KeyStats;

/// Render monitor counters and per-key gauges into Prometheus text format.
///
/// Per-key gauges carry a `key` label in its `netns:<id>` / `port:<n>` form.
pub fn render_prometheus(metrics: &MetricsSnapshot, keys: &[KeyStats]) -> String {
    let mut out = String::new();

    let counters = [
        (
            "connscale_events_processed_total",
            "Qualifying transitions applied to a watched key.",
            metrics.events_processed,
        ),
        (
            "connscale_events_ignored_total",
            "Records whose TCP state was not a qualifying transition.",
            metrics.events_ignored,
        ),
        (
            "connscale_events_unwatched_total",
            "Qualifying transitions for unregistered keys.",
            metrics.events_unwatched,
        ),
        (
            "connscale_events_unconfigured_total",
            "Transitions dropped because thresholds were unset or inconsistent.",
            metrics.events_unconfigured,
        ),
        (
            "connscale_signals_emitted_total",
            "Scale signals delivered to the output channel.",
            metrics.signals_emitted,
        ),
        (
            "connscale_signals_dropped_total",
            "Scale signals dropped on a full or closed output slot.",
            metrics.signals_dropped,
        ),
        (
            "connscale_registrations_rejected_total",
            "Key registrations refused because the registry was full.",
            metrics.registrations_rejected,
        ),
    ];

    for (name, help, value) in counters {
        out.push_str(&format!("# HELP {name} {help}\n"));
        out.push_str(&format!("# TYPE {name} counter\n"));
        out.push_str(&format!("{name} {value}\n"));
    }

    out.push_str("# HELP connscale_connections Live established connections per key.\n");
    out.push_str("# TYPE connscale_connections gauge\n");
    for k in keys {
        out.push_str(&format!("connscale_connections{{key=\"{}\"}} {}\n", k.key, k.count));
    }

    out.push_str("# HELP connscale_hysteresis Consecutive out-of-band events per key.\n");
    out.push_str("# TYPE connscale_hysteresis gauge\n");
    for k in keys {
        out.push_str(&format!("connscale_hysteresis{{key=\"{}\"}} {}\n", k.key, k.hysteresis));
    }

    out.push_str("# HELP connscale_gate_held Whether the key's scaling gate is held (0/1).\n");
    out.push_str("# TYPE connscale_gate_held gauge\n");
    for k in keys {
        out.push_str(&format!(
            "connscale_gate_held{{key=\"{}\"}} {}\n",
            k.key,
            u8::from(k.gated)
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use connscale_core::MonitorKey;

    fn stats(key: MonitorKey, count: u32, gated: bool) -> KeyStats {
        KeyStats {
            key,
            count,
            hysteresis: 2,
            gated,
        }
    }

    #[test]
    fn render_empty() {
        let output = render_prometheus(&MetricsSnapshot::default(), &[]);
        // Should still have type declarations.
        assert!(output.contains("# TYPE connscale_connections gauge"));
        assert!(output.contains("connscale_signals_emitted_total 0"));
    }

    #[test]
    fn render_keys_and_counters() {
        let metrics = MetricsSnapshot {
            events_processed: 42,
            signals_dropped: 1,
            ..Default::default()
        };
        let keys = vec![
            stats(MonitorKey::Netns(4026531840), 7, true),
            stats(MonitorKey::Port(8080), 3, false),
        ];
        let output = render_prometheus(&metrics, &keys);

        assert!(output.contains("connscale_events_processed_total 42"));
        assert!(output.contains("connscale_signals_dropped_total 1"));
        assert!(output.contains("connscale_connections{key=\"netns:4026531840\"} 7"));
        assert!(output.contains("connscale_hysteresis{key=\"port:8080\"} 2"));
        assert!(output.contains("connscale_gate_held{key=\"netns:4026531840\"} 1"));
        assert!(output.contains("connscale_gate_held{key=\"port:8080\"} 0"));
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let keys = vec![stats(MonitorKey::Port(1), 1, false)];
        let output = render_prometheus(&MetricsSnapshot::default(), &keys);

        // Every sample line is `name[{labels}] value`.
        for line in output.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.rsplitn(2, ' ');
            let value = parts.next().unwrap();
            assert!(value.parse::<u64>().is_ok(), "bad value in: {line}");
            assert!(parts.next().unwrap().starts_with("connscale_"), "bad name in: {line}");
        }
    }
}
