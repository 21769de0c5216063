//! Ownership rules: who may create, mutate, or delete a record.
//!
//! The decisions here are pure functions over the identity and the
//! stored record; no I/O, no clock. The hub consults them before every
//! persist and acts on the answer; the policy itself never touches the
//! store.

use serde_json::Value;
use slipstream_credential::Claims;

use crate::{StoreError, StoredRecord};

/// Ownership policy for state records.
///
/// One username is designated the administrative identity; it may
/// mutate or delete any record. Everyone else is confined to records
/// they own.
#[derive(Debug, Clone)]
pub struct OwnershipPolicy {
    admin: String,
}

impl Default for OwnershipPolicy {
    fn default() -> Self {
        Self {
            admin: "admin".into(),
        }
    }
}

impl OwnershipPolicy {
    /// Creates a policy with the given administrative username.
    pub fn new(admin: impl Into<String>) -> Self {
        Self {
            admin: admin.into(),
        }
    }

    /// The administrative username.
    pub fn admin(&self) -> &str {
        &self.admin
    }

    /// Whether `identity` may create `draft`.
    ///
    /// Always true for a well-formed draft. The draft's owner must
    /// already have been forced to the creating identity; any
    /// client-supplied owner value was overridden, not honored.
    pub fn can_create(&self, identity: &Claims, draft: &StoredRecord) -> bool {
        if draft.room.is_empty() || draft.entity.is_empty() {
            return false;
        }
        match &draft.owner {
            Some(owner) => *owner == identity.username,
            None => true,
        }
    }

    /// Whether `identity` may update or delete `existing`.
    ///
    /// True iff the identity owns the record or is the admin. `existing`
    /// is the ownership root (the Aircraft record) even when the update
    /// targets a subsystem record.
    pub fn can_mutate(
        &self,
        identity: &Claims,
        existing: &StoredRecord,
    ) -> bool {
        if identity.username == self.admin {
            return true;
        }
        existing.owner.as_deref() == Some(identity.username.as_str())
    }

    /// Rejects updates that try to change an immutable field.
    ///
    /// `entityId` (callsign) and `owner` are fixed at creation; a
    /// proposed body that carries either with a different value is
    /// refused, never silently applied.
    pub fn check_immutable_fields(
        &self,
        existing: &StoredRecord,
        proposed: &Value,
    ) -> Result<(), StoreError> {
        if let Some(callsign) = proposed.get("callsign").and_then(Value::as_str)
        {
            if callsign != existing.entity {
                return Err(StoreError::BadRequest(
                    "callsign is immutable".into(),
                ));
            }
        }
        if let Some(owner) = proposed.get("owner").and_then(Value::as_str) {
            if existing.owner.as_deref() != Some(owner) {
                return Err(StoreError::BadRequest("owner is immutable".into()));
            }
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
