//! Extraction step: turns whatever an observation point produces into a
//! `(key, transition)` pair.
//!
//! The observation points differ only in how they find the key and the
//! socket state; everything after extraction is the same state machine.

use connscale_core::{classify, ConnEvent, MonitorKey, Transition};

/// Pluggable extraction of a qualifying transition from a raw record.
///
/// Returning `None` means the record carries no qualifying transition and
/// the monitor is not invoked.
pub trait Extractor {
    type Raw;

    fn extract(&self, raw: &Self::Raw) -> Option<(MonitorKey, Transition)>;
}

/// Socket-state probe record: the reader's network namespace and the
/// socket's current TCP state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketStateRecord {
    pub netns: u32,
    pub state: u8,
}

/// Keys by network namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketStateExtractor;

impl Extractor for SocketStateExtractor {
    type Raw = SocketStateRecord;

    fn extract(&self, raw: &SocketStateRecord) -> Option<(MonitorKey, Transition)> {
        classify(raw.state).map(|t| (MonitorKey::Netns(raw.netns), t))
    }
}

/// `sock:inet_sock_set_state` tracepoint arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InetSockSetState {
    pub dport: u16,
    pub newstate: u8,
}

/// Keys by destination port.
#[derive(Debug, Clone, Copy, Default)]
pub struct InetSockSetStateExtractor;

impl Extractor for InetSockSetStateExtractor {
    type Raw = InetSockSetState;

    fn extract(&self, raw: &InetSockSetState) -> Option<(MonitorKey, Transition)> {
        classify(raw.newstate).map(|t| (MonitorKey::Port(raw.dport), t))
    }
}

/// Records whose key was resolved upstream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnEventExtractor;

impl Extractor for ConnEventExtractor {
    type Raw = ConnEvent;

    fn extract(&self, raw: &ConnEvent) -> Option<(MonitorKey, Transition)> {
        classify(raw.state).map(|t| (raw.key, t))
    }
}
