//! The state repository: domain records over a keyed store.

use serde::{Deserialize, Serialize};
use slipstream_protocol::RecordKind;

use crate::record::{record_key, room_prefix, session_key};
use crate::{KeyedStore, StoreError, StoredRecord};

/// The room-less record marking a room as live.
///
/// Written when a room gains its first member, deleted when it loses
/// its last. Demonstrates the global `kind:entity` key form.
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    room: String,
}

/// Room- and entity-scoped storage of domain records.
///
/// Every operation maps to a single keyed-store call; there are no
/// multi-key transactions. Multi-record sweeps ([`delete_entity`]) are
/// therefore not atomic as a whole — a partial failure leaves a
/// partially cleaned entity, which the idempotent delete semantics make
/// safe to retry.
///
/// [`delete_entity`]: StateRepository::delete_entity
pub struct StateRepository<S> {
    store: S,
}

impl<S: KeyedStore> StateRepository<S> {
    /// Wraps a keyed store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Fetches one record, or `None` if absent.
    pub async fn get(
        &self,
        kind: RecordKind,
        room: &str,
        entity: &str,
    ) -> Result<Option<StoredRecord>, StoreError> {
        let key = record_key(kind, room, entity);
        match self.store.get(&key).await? {
            Some(bytes) => Ok(Some(decode_record(&key, &bytes)?)),
            None => Ok(None),
        }
    }

    /// Upserts a record under its deterministic key.
    pub async fn put(&self, record: &StoredRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record).map_err(|e| {
            StoreError::Backend(format!("record encoding failed: {e}"))
        })?;
        self.store.set(&record.key(), &bytes).await
    }

    /// Deletes one record. Deleting an absent record succeeds.
    pub async fn delete(
        &self,
        kind: RecordKind,
        room: &str,
        entity: &str,
    ) -> Result<(), StoreError> {
        self.store.delete(&record_key(kind, room, entity)).await
    }

    /// Enumerates every record of `kind` in `room`.
    ///
    /// Implemented as a prefix scan followed by per-key fetches. The
    /// scan is not a snapshot: a key that disappears between the scan
    /// and its fetch is skipped, not an error. No ordering guarantee.
    pub async fn list_by_room(
        &self,
        kind: RecordKind,
        room: &str,
    ) -> Result<Vec<StoredRecord>, StoreError> {
        let keys = self.store.scan_prefix(&room_prefix(kind, room)).await?;
        let mut records = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(bytes) = self.store.get(&key).await? {
                records.push(decode_record(&key, &bytes)?);
            }
        }
        Ok(records)
    }

    /// Removes every subsystem record for one entity in one room.
    ///
    /// Not atomic across kinds; each delete is independently idempotent,
    /// so a retry after partial failure converges.
    pub async fn delete_entity(
        &self,
        room: &str,
        entity: &str,
    ) -> Result<(), StoreError> {
        for kind in RecordKind::ALL {
            self.delete(kind, room, entity).await?;
        }
        Ok(())
    }

    /// Writes the room's session record.
    pub async fn open_session(&self, room: &str) -> Result<(), StoreError> {
        let record = SessionRecord { room: room.into() };
        let bytes = serde_json::to_vec(&record).map_err(|e| {
            StoreError::Backend(format!("record encoding failed: {e}"))
        })?;
        self.store.set(&session_key(room), &bytes).await
    }

    /// Deletes the room's session record. Idempotent.
    pub async fn close_session(&self, room: &str) -> Result<(), StoreError> {
        self.store.delete(&session_key(room)).await
    }

    /// `true` while the room's session record exists.
    pub async fn session_exists(&self, room: &str) -> Result<bool, StoreError> {
        Ok(self.store.get(&session_key(room)).await?.is_some())
    }
}

fn decode_record(key: &str, bytes: &[u8]) -> Result<StoredRecord, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| {
        StoreError::Backend(format!("corrupt record under {key}: {e}"))
    })
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn repo() -> StateRepository<MemoryStore> {
        StateRepository::new(MemoryStore::new())
    }

    fn aircraft(room: &str, entity: &str, owner: &str) -> StoredRecord {
        StoredRecord {
            kind: RecordKind::Aircraft,
            room: room.into(),
            entity: entity.into(),
            owner: Some(owner.into()),
            body: serde_json::json!({"type": "Aircraft", "model": "C172"}),
        }
    }

    fn location(room: &str, entity: &str) -> StoredRecord {
        StoredRecord {
            kind: RecordKind::Location,
            room: room.into(),
            entity: entity.into(),
            owner: None,
            body: serde_json::json!({"type": "Location", "latitude": 52.3}),
        }
    }

    // =====================================================================
    // get / put / delete
    // =====================================================================

    #[tokio::test]
    async fn test_get_absent_record_returns_none() {
        let repo = repo();
        let got = repo
            .get(RecordKind::Aircraft, "Sundowners", "PH-ABC")
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_returns_record() {
        let repo = repo();
        let record = aircraft("Sundowners", "PH-ABC", "alice");
        repo.put(&record).await.unwrap();

        let got = repo
            .get(RecordKind::Aircraft, "Sundowners", "PH-ABC")
            .await
            .unwrap()
            .expect("record should exist");
        assert_eq!(got, record);
    }

    #[tokio::test]
    async fn test_put_upserts_last_write_wins() {
        let repo = repo();
        let mut record = location("Sundowners", "PH-ABC");
        repo.put(&record).await.unwrap();

        record.body = serde_json::json!({"type": "Location", "latitude": 53.0});
        repo.put(&record).await.unwrap();

        let got = repo
            .get(RecordKind::Location, "Sundowners", "PH-ABC")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.body["latitude"], 53.0);
    }

    #[tokio::test]
    async fn test_delete_twice_is_idempotent() {
        let repo = repo();
        repo.put(&aircraft("Sundowners", "PH-ABC", "alice"))
            .await
            .unwrap();

        repo.delete(RecordKind::Aircraft, "Sundowners", "PH-ABC")
            .await
            .expect("first delete should succeed");
        repo.delete(RecordKind::Aircraft, "Sundowners", "PH-ABC")
            .await
            .expect("second delete should also succeed");

        assert!(
            repo.get(RecordKind::Aircraft, "Sundowners", "PH-ABC")
                .await
                .unwrap()
                .is_none()
        );
    }

    // =====================================================================
    // list_by_room
    // =====================================================================

    #[tokio::test]
    async fn test_list_by_room_scopes_to_room_and_kind() {
        let repo = repo();
        repo.put(&location("Sundowners", "PH-ABC")).await.unwrap();
        repo.put(&location("Sundowners", "PH-XYZ")).await.unwrap();
        repo.put(&location("Nightflyers", "PH-QQQ")).await.unwrap();
        repo.put(&aircraft("Sundowners", "PH-ABC", "alice"))
            .await
            .unwrap();

        let mut listed = repo
            .list_by_room(RecordKind::Location, "Sundowners")
            .await
            .unwrap();
        listed.sort_by(|a, b| a.entity.cmp(&b.entity));

        let entities: Vec<&str> =
            listed.iter().map(|r| r.entity.as_str()).collect();
        assert_eq!(entities, vec!["PH-ABC", "PH-XYZ"]);
        assert!(listed.iter().all(|r| r.kind == RecordKind::Location));
    }

    #[tokio::test]
    async fn test_list_by_room_empty_room_returns_empty() {
        let repo = repo();
        let listed = repo
            .list_by_room(RecordKind::Aircraft, "Deserted")
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_list_by_room_is_restartable() {
        let repo = repo();
        repo.put(&location("Sundowners", "PH-ABC")).await.unwrap();

        // Two consecutive scans see the same world.
        let first = repo
            .list_by_room(RecordKind::Location, "Sundowners")
            .await
            .unwrap();
        let second = repo
            .list_by_room(RecordKind::Location, "Sundowners")
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    // =====================================================================
    // delete_entity
    // =====================================================================

    #[tokio::test]
    async fn test_delete_entity_sweeps_every_kind() {
        let repo = repo();
        repo.put(&aircraft("Sundowners", "PH-ABC", "alice"))
            .await
            .unwrap();
        repo.put(&location("Sundowners", "PH-ABC")).await.unwrap();
        repo.put(&StoredRecord {
            kind: RecordKind::Engines,
            room: "Sundowners".into(),
            entity: "PH-ABC".into(),
            owner: None,
            body: serde_json::json!({"rpm": 2400}),
        })
        .await
        .unwrap();

        repo.delete_entity("Sundowners", "PH-ABC").await.unwrap();

        for kind in RecordKind::ALL {
            assert!(
                repo.get(kind, "Sundowners", "PH-ABC")
                    .await
                    .unwrap()
                    .is_none(),
                "{kind} record should be gone"
            );
        }
    }

    #[tokio::test]
    async fn test_delete_entity_leaves_other_entities_alone() {
        let repo = repo();
        repo.put(&location("Sundowners", "PH-ABC")).await.unwrap();
        repo.put(&location("Sundowners", "PH-XYZ")).await.unwrap();

        repo.delete_entity("Sundowners", "PH-ABC").await.unwrap();

        assert!(
            repo.get(RecordKind::Location, "Sundowners", "PH-XYZ")
                .await
                .unwrap()
                .is_some()
        );
    }

    // =====================================================================
    // Session records
    // =====================================================================

    #[tokio::test]
    async fn test_session_record_lifecycle() {
        let repo = repo();
        assert!(!repo.session_exists("Sundowners").await.unwrap());

        repo.open_session("Sundowners").await.unwrap();
        assert!(repo.session_exists("Sundowners").await.unwrap());

        repo.close_session("Sundowners").await.unwrap();
        assert!(!repo.session_exists("Sundowners").await.unwrap());

        // Closing again is idempotent.
        repo.close_session("Sundowners").await.unwrap();
    }
}
