//! Stored record shape and deterministic key derivation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use slipstream_protocol::RecordKind;

/// One domain state record as it lives in the keyed store.
///
/// The record's key is fully determined by `(kind, room, entity)`, so an
/// update for the same entity always lands on the same key (last write
/// wins, no versioning). Only Aircraft records carry `owner`; the other
/// kinds inherit ownership from their entity's Aircraft root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub kind: RecordKind,
    pub room: String,
    /// The entity id (callsign).
    pub entity: String,
    /// Owning username. Set on Aircraft records, `None` elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// The message body as published, opaque to the hub beyond the
    /// fields it inspects.
    pub body: Value,
}

impl StoredRecord {
    /// The store key this record lives under.
    pub fn key(&self) -> String {
        record_key(self.kind, &self.room, &self.entity)
    }
}

/// Key for a room-scoped record: `kind:room:entity`.
pub fn record_key(kind: RecordKind, room: &str, entity: &str) -> String {
    format!("{}:{room}:{entity}", kind.storage_tag())
}

/// Prefix covering every record of `kind` in `room`: `kind:room:`.
pub fn room_prefix(kind: RecordKind, room: &str) -> String {
    format!("{}:{room}:", kind.storage_tag())
}

/// Key for the room-less session record of a room: `session:room`.
///
/// The global key form `kind:entity` is for records not scoped inside a
/// room; the session record (the room itself) is the one such record
/// the hub maintains.
pub fn session_key(room: &str) -> String {
    format!("session:{room}")
}
