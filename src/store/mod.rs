//! Local persistence: a quota-limited primary key-value store, a SQLite
//! secondary store for bulk collections, and the actor-backed façade that
//! serializes access to both.
//!
//! Layout:
//! - `kv.rs`: primary file-backed key-value store with a byte quota
//! - `schema.rs`: SQL DDL for the secondary store (SQLite-first)
//! - `sqlite.rs`: secondary store adapter over sqlx
//! - `actor.rs`: the storage actor owning both stores
//! - `facade.rs`: typed handle the rest of the application calls

pub mod actor;
pub mod facade;
pub mod kv;
pub mod schema;
pub mod sqlite;

pub use facade::StorageHandle;
pub use kv::KvStore;
pub use schema::SQLITE_INIT;
pub use sqlite::{CollectionStorage, SqlitePool};

/// The entity collections owned by the storage façade. Each maps to one fixed
/// key in the primary store; passengers additionally live in the secondary
/// store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Users,
    Passengers,
    Conductors,
    Trips,
    CurrentUser,
    Signatures,
    ConductorCredentials,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Users,
        EntityKind::Passengers,
        EntityKind::Conductors,
        EntityKind::Trips,
        EntityKind::CurrentUser,
        EntityKind::Signatures,
        EntityKind::ConductorCredentials,
    ];

    pub fn storage_key(self) -> &'static str {
        match self {
            EntityKind::Users => "transport_users",
            EntityKind::Passengers => "transport_passengers",
            EntityKind::Conductors => "transport_conductors",
            EntityKind::Trips => "transport_trips",
            EntityKind::CurrentUser => "transport_current_user",
            EntityKind::Signatures => "transport_signatures",
            EntityKind::ConductorCredentials => "transport_conductor_credentials",
        }
    }
}
