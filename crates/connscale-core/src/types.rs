//! Shared types used across connscale crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Identifier of a monitored logical unit.
///
/// Network namespaces and ports live in separate key spaces, so
/// `Netns(8080)` and `Port(8080)` never share state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MonitorKey {
    /// Network namespace inode number.
    Netns(u32),
    /// Local TCP port.
    Port(u16),
}

impl fmt::Display for MonitorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorKey::Netns(id) => write!(f, "netns:{id}"),
            MonitorKey::Port(port) => write!(f, "port:{port}"),
        }
    }
}

impl FromStr for MonitorKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidKey(s.to_string());
        let (kind, value) = s.trim().split_once(':').ok_or_else(invalid)?;
        match kind {
            "netns" => value.parse().map(MonitorKey::Netns).map_err(|_| invalid()),
            "port" => value.parse().map(MonitorKey::Port).map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for MonitorKey {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MonitorKey> for String {
    fn from(key: MonitorKey) -> Self {
        key.to_string()
    }
}

/// A qualifying connection transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Established,
    Closed,
}

/// Linux TCP socket states, numbered as in `include/net/tcp_states.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TcpState {
    Established = 1,
    SynSent = 2,
    SynRecv = 3,
    FinWait1 = 4,
    FinWait2 = 5,
    TimeWait = 6,
    Close = 7,
    CloseWait = 8,
    LastAck = 9,
    Listen = 10,
    Closing = 11,
    NewSynRecv = 12,
}

impl TcpState {
    /// Decode a raw kernel state value. Unknown values yield `None`.
    pub fn from_raw(raw: u8) -> Option<Self> {
        let state = match raw {
            1 => TcpState::Established,
            2 => TcpState::SynSent,
            3 => TcpState::SynRecv,
            4 => TcpState::FinWait1,
            5 => TcpState::FinWait2,
            6 => TcpState::TimeWait,
            7 => TcpState::Close,
            8 => TcpState::CloseWait,
            9 => TcpState::LastAck,
            10 => TcpState::Listen,
            11 => TcpState::Closing,
            12 => TcpState::NewSynRecv,
            _ => return None,
        };
        Some(state)
    }

    /// Classify the state. Only ESTABLISHED, CLOSE and CLOSE_WAIT qualify.
    pub fn transition(self) -> Option<Transition> {
        match self {
            TcpState::Established => Some(Transition::Established),
            TcpState::Close | TcpState::CloseWait => Some(Transition::Closed),
            _ => None,
        }
    }
}

/// Classify a raw kernel state value in one step.
pub fn classify(raw_state: u8) -> Option<Transition> {
    TcpState::from_raw(raw_state).and_then(TcpState::transition)
}

/// Direction of a scale signal.
///
/// On the wire the two directions are the fixed tokens `"Lower"` and
/// `"Upper"`; inside the workspace they are only ever this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "Lower")]
    ScaleDown,
    #[serde(rename = "Upper")]
    ScaleUp,
}

impl Direction {
    /// Transport token for this direction.
    pub fn token(&self) -> &'static str {
        match self {
            Direction::ScaleDown => "Lower",
            Direction::ScaleUp => "Upper",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A debounced scaling decision for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleSignal {
    pub key: MonitorKey,
    pub direction: Direction,
}

/// Fixed-shape output record delivered to the signal consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub key: MonitorKey,
    pub direction: Direction,
    /// Buffer length in force when the signal fired, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_length: Option<u32>,
}

impl SignalRecord {
    pub fn signal(&self) -> ScaleSignal {
        ScaleSignal {
            key: self.key,
            direction: self.direction,
        }
    }
}

/// A pre-extracted connection event as delivered by an external observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnEvent {
    pub key: MonitorKey,
    /// Raw kernel TCP state value.
    pub state: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_text_form() {
        assert_eq!(MonitorKey::Netns(4026531840).to_string(), "netns:4026531840");
        assert_eq!("port:8080".parse::<MonitorKey>().unwrap(), MonitorKey::Port(8080));
        assert_eq!(
            "netns:12".parse::<MonitorKey>().unwrap(),
            MonitorKey::Netns(12)
        );
    }

    #[test]
    fn key_rejects_garbage() {
        assert!("8080".parse::<MonitorKey>().is_err());
        assert!("pid:1".parse::<MonitorKey>().is_err());
        assert!("port:70000".parse::<MonitorKey>().is_err());
        assert!("netns:".parse::<MonitorKey>().is_err());
    }

    #[test]
    fn key_spaces_are_distinct() {
        assert_ne!(MonitorKey::Netns(8080), MonitorKey::Port(8080));
    }

    #[test]
    fn classify_states() {
        assert_eq!(classify(1), Some(Transition::Established));
        assert_eq!(classify(7), Some(Transition::Closed));
        assert_eq!(classify(8), Some(Transition::Closed));
        for ignored in [2u8, 3, 4, 5, 6, 9, 10, 11, 12, 0, 99] {
            assert_eq!(classify(ignored), None, "state {ignored}");
        }
    }

    #[test]
    fn direction_tokens() {
        assert_eq!(Direction::ScaleDown.token(), "Lower");
        assert_eq!(Direction::ScaleUp.to_string(), "Upper");
    }

    #[test]
    fn signal_record_json_shape() {
        let record = SignalRecord {
            key: MonitorKey::Port(8080),
            direction: Direction::ScaleUp,
            buffer_length: Some(3),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"key": "port:8080", "direction": "Upper", "buffer_length": 3})
        );

        let back: SignalRecord =
            serde_json::from_str(r#"{"key":"netns:7","direction":"Lower"}"#).unwrap();
        assert_eq!(back.signal().direction, Direction::ScaleDown);
        assert_eq!(back.buffer_length, None);
    }
}
