//! The credential claim set.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The claim set carried inside a signed credential.
///
/// A `Claims` value is never mutated after construction. Reassigning a
/// session to a different room or callsign produces a NEW claim set (and
/// a new signature) via [`Claims::reassigned`]; the old token simply
/// stops being presented. Validity is computed from the fields, never
/// stored alongside them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated identity.
    pub username: String,

    /// Opaque unique id for one logical login. Survives reassignment so
    /// a login can be traced across room changes.
    pub session_id: String,

    /// The room this credential grants access to.
    pub room: String,

    /// The entity (aircraft tail number) this identity controls.
    pub callsign: String,
}

impl Claims {
    /// Builds the claim set for a fresh login, minting a new session id.
    pub fn login(
        username: impl Into<String>,
        room: impl Into<String>,
        callsign: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            session_id: Uuid::new_v4().to_string(),
            room: room.into(),
            callsign: callsign.into(),
        }
    }

    /// Builds the claim set for an in-session reassignment: same identity
    /// and session id, new room and callsign. The caller re-signs.
    pub fn reassigned(
        &self,
        room: impl Into<String>,
        callsign: impl Into<String>,
    ) -> Self {
        Self {
            username: self.username.clone(),
            session_id: self.session_id.clone(),
            room: room.into(),
            callsign: callsign.into(),
        }
    }

    /// A claim set is valid iff every claim is non-empty.
    pub fn is_valid(&self) -> bool {
        !self.username.is_empty()
            && !self.session_id.is_empty()
            && !self.room.is_empty()
            && !self.callsign.is_empty()
    }
}
