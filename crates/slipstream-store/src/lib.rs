//! Room-scoped state storage for Slipstream.
//!
//! This crate owns three seams of the hub's state handling:
//!
//! 1. **Store contract** ([`KeyedStore`]) — get/set/delete/prefix-scan
//!    over opaque string keys. [`MemoryStore`] is the in-process
//!    adapter; production deployments swap in a real key-value backend.
//! 2. **State repository** ([`StateRepository`]) — domain records
//!    (aircraft, location, engines, lights, controls) with deterministic
//!    keys and room-scoped enumeration via prefix scan.
//! 3. **Ownership rules** ([`OwnershipPolicy`]) — who may create, mutate,
//!    or delete a record, and which fields are immutable.
//!
//! # How it fits in the stack
//!
//! ```text
//! Hub (above)        ← persists updates, enumerates room state
//!     ↕
//! Store layer (this crate)
//!     ↕
//! KeyedStore backend ← opaque bytes, prefix-scannable keys
//! ```

mod error;
mod ownership;
mod record;
mod repository;
mod store;

pub use error::StoreError;
pub use ownership::OwnershipPolicy;
pub use record::{StoredRecord, record_key, room_prefix, session_key};
pub use repository::StateRepository;
pub use store::{KeyedStore, MemoryStore};
