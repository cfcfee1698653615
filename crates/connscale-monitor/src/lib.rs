//! connscale-monitor: the connection-pressure state machine.
//!
//! Counts established connections per registered key, debounces
//! threshold crossings over a run of qualifying events, and emits one
//! scale signal per crossing run onto a multi-slot output channel.
//!
//! # Architecture
//!
//! ```text
//! (key, transition)
//!   ├── WatchRegistry::state()      ← unregistered keys stop here
//!   ├── ThresholdSlots::load()      ← missing bounds stop here
//!   ├── counter::apply()            → new count (floor 0)
//!   ├── hysteresis::evaluate()      → NoSignal | Signal(direction)
//!   └── SignalEmitter::emit()       → SignalStream (consumer)
//! ```
//!
//! Every per-key field is its own atomic; no lock spans more than one key
//! and nothing on the event path blocks or allocates. A signal latches the
//! key's scaling gate under `GatePolicy::Latched`; only an external
//! `clear_gate` re-arms it.

pub mod counter;
pub mod emitter;
pub mod error;
pub mod extract;
pub mod hysteresis;
pub mod metrics;
pub mod monitor;
pub mod prometheus;
pub mod registry;
pub mod slots;

pub use counter::CountUpdate;
pub use emitter::{signal_channel, SignalEmitter, SignalStream};
pub use error::{MonitorError, MonitorResult};
pub use extract::{
    ConnEventExtractor, Extractor, InetSockSetState, InetSockSetStateExtractor,
    SocketStateExtractor, SocketStateRecord,
};
pub use hysteresis::Evaluation;
pub use metrics::{MetricsSnapshot, MonitorMetrics};
pub use monitor::ConnectionMonitor;
pub use prometheus::render_prometheus;
pub use registry::{KeyStats, WatchRegistry};
pub use slots::ThresholdSlots;
