//! Core protocol types for Slipstream's wire format.
//!
//! The wire format is plain tagged JSON: every message is an object with
//! a `type` field naming its kind. Clients publish domain updates
//! (`Aircraft`, `Location`, ...); the hub emits membership events
//! (`add`, `remove`). The shapes here are fixed — a client SDK parses
//! them field by field, so the serde attributes are load-bearing.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// RecordKind
// ---------------------------------------------------------------------------

/// The kind of a domain state record.
///
/// The Aircraft record is the root for an entity: it carries the owner,
/// and ownership checks for the other four kinds consult it. On the wire
/// the kinds appear capitalized (`"Aircraft"`); in storage keys they are
/// lowercase (`"aircraft:..."`), which serde's `rename_all` handles.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Aircraft,
    Location,
    Engines,
    Lights,
    Controls,
}

impl RecordKind {
    /// All record kinds, in no particular order of significance.
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Aircraft,
        RecordKind::Location,
        RecordKind::Engines,
        RecordKind::Lights,
        RecordKind::Controls,
    ];

    /// The `type` tag this kind carries on the wire.
    pub fn wire_tag(&self) -> &'static str {
        match self {
            Self::Aircraft => "Aircraft",
            Self::Location => "Location",
            Self::Engines => "Engines",
            Self::Lights => "Lights",
            Self::Controls => "Controls",
        }
    }

    /// The lowercase tag used in storage keys.
    pub fn storage_tag(&self) -> &'static str {
        match self {
            Self::Aircraft => "aircraft",
            Self::Location => "location",
            Self::Engines => "engines",
            Self::Lights => "lights",
            Self::Controls => "controls",
        }
    }

    /// Looks up a kind by its wire tag. Returns `None` for tags outside
    /// the known set.
    pub fn from_wire_tag(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.wire_tag() == tag)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_tag())
    }
}

// ---------------------------------------------------------------------------
// SessionEvent — server-emitted membership events
// ---------------------------------------------------------------------------

/// A membership event the hub broadcasts to a room.
///
/// These are server-emitted only. A client that sends an `add` or
/// `remove` frame is ignored, not echoed — otherwise a client could
/// fake another entity's join or leave.
///
/// `#[serde(tag = "type")]` produces the internally tagged wire shape:
/// `{"type":"add","room":"Sundowners","callsign":"PH-ABC"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SessionEvent {
    /// An entity joined the room.
    Add { room: String, callsign: String },

    /// An entity left the room.
    Remove { room: String, callsign: String },
}

impl SessionEvent {
    /// Serializes the event to its wire bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::ProtocolError> {
        serde_json::to_vec(self).map_err(crate::ProtocolError::Encode)
    }
}

// ---------------------------------------------------------------------------
// CloseCode
// ---------------------------------------------------------------------------

/// The reason class attached to a forced connection closure.
///
/// Maps onto the standard WebSocket close codes so the default
/// transport can put them straight into a close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Graceful closure.
    Normal,
    /// Malformed message, missing `type`, hello out of order.
    ProtocolError,
    /// Missing or invalid credential on hello.
    CannotAccept,
}

impl CloseCode {
    /// The transport-level status code.
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::ProtocolError => 1002,
            Self::CannotAccept => 1003,
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::ProtocolError => write!(f, "protocol-error"),
            Self::CannotAccept => write!(f, "cannot-accept"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
