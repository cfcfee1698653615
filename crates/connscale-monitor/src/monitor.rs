//! Connection monitor: the single entry point for transition events.
//!
//! Ties the watch registry, the live threshold slots, the counter, the
//! hysteresis accumulator and the signal emitter together. Every event is
//! handled independently and fails open: an unwatched key, missing bounds
//! or a full output slot turn the event into a no-op, never an error.

use tracing::{debug, info, warn};

use connscale_core::{
    ConnEvent, GatePolicy, MonitorKey, MonitorSettings, SignalRecord, ThresholdConfig, Transition,
};

use crate::counter::{self, CountUpdate};
use crate::emitter::{signal_channel, SignalEmitter, SignalStream};
use crate::error::{MonitorError, MonitorResult};
use crate::extract::{ConnEventExtractor, Extractor};
use crate::hysteresis::{self, Evaluation};
use crate::metrics::{MetricsSnapshot, MonitorMetrics};
use crate::registry::{KeyState, KeyStats, WatchRegistry};
use crate::slots::ThresholdSlots;

pub struct ConnectionMonitor {
    registry: WatchRegistry,
    thresholds: ThresholdSlots,
    emitter: SignalEmitter,
    gate_policy: GatePolicy,
    metrics: MonitorMetrics,
}

impl ConnectionMonitor {
    /// Create a monitor and the stream its signals arrive on.
    ///
    /// Threshold slots start empty; events are ignored until bounds are
    /// stored.
    pub fn new(settings: &MonitorSettings) -> (Self, SignalStream) {
        let (emitter, stream) = signal_channel(settings.signal_slots, settings.slot_capacity);
        let monitor = Self {
            registry: WatchRegistry::new(settings.max_keys),
            thresholds: ThresholdSlots::new(),
            emitter,
            gate_policy: settings.gate,
            metrics: MonitorMetrics::default(),
        };
        (monitor, stream)
    }

    /// Seed the threshold slots.
    pub fn with_thresholds(self, config: ThresholdConfig) -> MonitorResult<Self> {
        self.thresholds.store(config)?;
        Ok(self)
    }

    pub fn thresholds(&self) -> &ThresholdSlots {
        &self.thresholds
    }

    // ── Control surface ────────────────────────────────────────

    pub fn register(&self, key: MonitorKey) -> MonitorResult<bool> {
        let result = self.registry.register(key);
        if let Err(MonitorError::CapacityExceeded { .. }) = result {
            MonitorMetrics::incr(&self.metrics.registrations_rejected);
        }
        result
    }

    pub fn unregister(&self, key: &MonitorKey) -> bool {
        self.registry.unregister(key)
    }

    pub fn is_watched(&self, key: &MonitorKey) -> bool {
        self.registry.is_watched(key)
    }

    pub fn keys(&self) -> Vec<MonitorKey> {
        self.registry.keys()
    }

    pub fn stats(&self, key: &MonitorKey) -> Option<KeyStats> {
        self.registry.stats(key)
    }

    pub fn all_stats(&self) -> Vec<KeyStats> {
        self.registry.all_stats()
    }

    /// Re-arm a key after its signal has been acted on.
    pub fn clear_gate(&self, key: &MonitorKey) -> MonitorResult<bool> {
        let was_set = self.registry.clear_gate(key)?;
        if was_set {
            info!(%key, "scaling gate cleared");
        }
        Ok(was_set)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    // ── Event path ─────────────────────────────────────────────

    /// Apply a transition to a watched key's count.
    pub fn apply(&self, key: &MonitorKey, transition: Transition) -> CountUpdate {
        match self.registry.state(key) {
            Some(state) => CountUpdate::Applied(counter::apply(&state, transition)),
            None => CountUpdate::Skipped,
        }
    }

    /// Feed a post-transition count into the key's accumulator, emitting a
    /// signal when a run completes.
    pub fn evaluate(&self, key: &MonitorKey, count: u32, config: &ThresholdConfig) -> Evaluation {
        match self.registry.state(key) {
            Some(state) => self.settle(key, &state, count, config),
            None => Evaluation::NoSignal,
        }
    }

    fn settle(
        &self,
        key: &MonitorKey,
        state: &KeyState,
        count: u32,
        config: &ThresholdConfig,
    ) -> Evaluation {
        let evaluation = hysteresis::evaluate(state, count, config, self.gate_policy);
        if let Evaluation::Signal(direction) = evaluation {
            info!(
                %key,
                %direction,
                count,
                buffer_length = config.buffer_length,
                gated = self.gate_policy == GatePolicy::Latched,
                "scale signal"
            );
            let record = SignalRecord {
                key: *key,
                direction,
                buffer_length: Some(config.buffer_length),
            };
            if self.emitter.emit(record) {
                MonitorMetrics::incr(&self.metrics.signals_emitted);
            } else {
                MonitorMetrics::incr(&self.metrics.signals_dropped);
                if self.gate_policy == GatePolicy::Latched {
                    warn!(%key, "signal lost with gate held, key stays suppressed until cleared");
                }
            }
        }
        evaluation
    }

    /// Process one qualifying transition end to end.
    pub fn on_transition(&self, key: MonitorKey, transition: Transition) -> Evaluation {
        let Some(state) = self.registry.state(&key) else {
            MonitorMetrics::incr(&self.metrics.events_unwatched);
            return Evaluation::NoSignal;
        };

        let Some(config) = self.thresholds.load() else {
            MonitorMetrics::incr(&self.metrics.events_unconfigured);
            debug!(%key, "threshold slots unset, event ignored");
            return Evaluation::NoSignal;
        };

        let count = counter::apply(&state, transition);
        MonitorMetrics::incr(&self.metrics.events_processed);

        self.settle(&key, &state, count, &config)
    }

    /// Process a pre-extracted event carrying a raw TCP state.
    pub fn on_event(&self, event: &ConnEvent) -> Evaluation {
        self.on_raw(&ConnEventExtractor, event)
    }

    /// Process a raw record through an extraction step.
    pub fn on_raw<E: Extractor>(&self, extractor: &E, raw: &E::Raw) -> Evaluation {
        match extractor.extract(raw) {
            Some((key, transition)) => self.on_transition(key, transition),
            None => {
                MonitorMetrics::incr(&self.metrics.events_ignored);
                Evaluation::NoSignal
            }
        }
    }
}
