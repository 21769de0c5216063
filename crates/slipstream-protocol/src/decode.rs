//! The inbound decode boundary.
//!
//! Raw frames are parsed exactly once, here, and classified over the
//! closed set of known message kinds. Everything past this point works
//! with [`Inbound`], never with raw JSON strings, so the dispatch in the
//! hub is a single pattern match instead of string branching scattered
//! through the code.

use serde_json::Value;

use crate::{ProtocolError, RecordKind};

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// The handshake: `{"type":"hello","token":"BEARER ..."}`.
    ///
    /// The token is optional at this layer; a hello without one is
    /// well-formed JSON but will fail credential verification.
    Hello { token: Option<String> },

    /// A domain state update. `body` is the full message object; the hub
    /// inspects only the fields it must (`callsign`, `owner`) and passes
    /// the rest through opaque.
    Update { kind: RecordKind, body: Value },

    /// An `add` or `remove` frame arriving FROM a client. These are
    /// server-emitted events; inbound copies are ignored by the hub.
    ServerEvent { tag: String },

    /// A well-shaped message whose `type` tag is outside the known set.
    /// Not a protocol violation.
    Unknown { tag: String },
}

/// Parses and classifies one inbound frame.
///
/// # Errors
///
/// - [`ProtocolError::Decode`] — the frame is not valid JSON.
/// - [`ProtocolError::InvalidMessage`] — valid JSON, but not an object.
/// - [`ProtocolError::MissingType`] — an object with no string `type`
///   field. Distinct from an unknown tag, which classifies as
///   [`Inbound::Unknown`].
pub fn decode_inbound(data: &[u8]) -> Result<Inbound, ProtocolError> {
    let value: Value =
        serde_json::from_slice(data).map_err(ProtocolError::Decode)?;

    let object = value.as_object().ok_or_else(|| {
        ProtocolError::InvalidMessage("frame is not a JSON object".into())
    })?;

    let tag = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_owned();

    if tag == "hello" {
        let token = object
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_owned);
        return Ok(Inbound::Hello { token });
    }

    if let Some(kind) = RecordKind::from_wire_tag(&tag) {
        return Ok(Inbound::Update { kind, body: value });
    }

    if tag == "add" || tag == "remove" {
        return Ok(Inbound::ServerEvent { tag });
    }

    Ok(Inbound::Unknown { tag })
}

// =========================================================================
// Tests
// =========================================================================
