use crate::error::TransitError;
use crate::store::kv::KvStore;
use crate::store::sqlite::CollectionStorage;
use crate::store::EntityKind;

use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use serde_json::Value;
use tracing::warn;

/// Messages handled by the storage actor. All storage operations flow through
/// one mailbox, so writes are serialized per process and two overlapping
/// saves can never interleave.
#[derive(Debug)]
pub enum StorageMessage {
    /// Passenger reads consult the secondary store first (see `load_passengers`).
    LoadPassengers(RpcReplyPort<Result<Vec<Value>, TransitError>>),
    /// Persist the full passenger collection to both local stores.
    SavePassengers(Vec<Value>, RpcReplyPort<Result<(), TransitError>>),
    /// Primary-store-only collection read.
    LoadList(EntityKind, RpcReplyPort<Result<Vec<Value>, TransitError>>),
    /// Primary-store-only collection write.
    SaveList(EntityKind, Vec<Value>, RpcReplyPort<Result<(), TransitError>>),
    /// Single-document read (current user).
    LoadSingle(EntityKind, RpcReplyPort<Result<Option<Value>, TransitError>>),
    /// Single-document write; `None` removes the key.
    SaveSingle(EntityKind, Option<Value>, RpcReplyPort<Result<(), TransitError>>),
    /// Delete every named collection. Each deletion is independent; one
    /// failure never prevents the rest.
    ClearAll(RpcReplyPort<Result<(), TransitError>>),
}

pub struct StorageActorState {
    kv: KvStore,
    db: CollectionStorage,
}

pub struct StorageActor;

#[ractor::async_trait]
impl Actor for StorageActor {
    type Msg = StorageMessage;
    type State = StorageActorState;
    type Arguments = (KvStore, CollectionStorage);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (kv, db): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        db.init_schema()
            .await
            .map_err(|e| ActorProcessingErr::from(format!("collection storage init failed: {e}")))?;
        Ok(StorageActorState { kv, db })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            StorageMessage::LoadPassengers(rp) => {
                let _ = rp.send(load_passengers(state).await);
            }
            StorageMessage::SavePassengers(docs, rp) => {
                let _ = rp.send(save_passengers(state, docs).await);
            }
            StorageMessage::LoadList(kind, rp) => {
                let _ = rp.send(load_list_from_kv(&state.kv, kind));
            }
            StorageMessage::SaveList(kind, docs, rp) => {
                let _ = rp.send(save_list_to_kv(&state.kv, kind, &docs));
            }
            StorageMessage::LoadSingle(kind, rp) => {
                let _ = rp.send(load_single_from_kv(&state.kv, kind));
            }
            StorageMessage::SaveSingle(kind, doc, rp) => {
                let _ = rp.send(save_single_to_kv(&state.kv, kind, doc.as_ref()));
            }
            StorageMessage::ClearAll(rp) => {
                let _ = rp.send(clear_all(state).await);
            }
        }
        Ok(())
    }
}

/// Contract (resolving the divergent source strategies): the secondary store
/// is authoritative for passengers. The primary mirror is consulted only when
/// the secondary has never been written, or as a last resort when it errors.
async fn load_passengers(state: &StorageActorState) -> Result<Vec<Value>, TransitError> {
    match state.db.load_collection(EntityKind::Passengers).await {
        Ok(Some(bodies)) => bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(Into::into))
            .collect(),
        Ok(None) => load_list_from_kv(&state.kv, EntityKind::Passengers),
        Err(e) => {
            warn!(error = %e, "secondary store read failed; trying primary mirror");
            match load_list_from_kv(&state.kv, EntityKind::Passengers) {
                Ok(docs) if !docs.is_empty() => Ok(docs),
                // A broken store must surface as an error, not as "no data yet".
                _ => Err(e),
            }
        }
    }
}

async fn save_passengers(
    state: &StorageActorState,
    docs: Vec<Value>,
) -> Result<(), TransitError> {
    let payload = serde_json::to_string(&docs)?;

    let primary = state
        .kv
        .put(EntityKind::Passengers.storage_key(), &payload);
    if let Err(e) = &primary {
        warn!(error = %e, "primary store rejected passenger write; relying on secondary");
    }

    let rows = record_rows(&docs);
    let secondary = state
        .db
        .replace_collection(EntityKind::Passengers, &rows)
        .await;
    if let Err(e) = &secondary {
        warn!(error = %e, "secondary store rejected passenger write");
    }

    match (primary, secondary) {
        (Err(_), Err(_)) => Err(TransitError::StorageFull),
        _ => Ok(()),
    }
}

fn record_rows(docs: &[Value]) -> Vec<(String, String)> {
    docs.iter()
        .enumerate()
        .map(|(position, doc)| {
            let record_id = doc
                .get("id")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| position.to_string());
            (record_id, doc.to_string())
        })
        .collect()
}

fn load_list_from_kv(kv: &KvStore, kind: EntityKind) -> Result<Vec<Value>, TransitError> {
    match kv.get(kind.storage_key())? {
        Some(payload) => serde_json::from_str(&payload).map_err(Into::into),
        None => Ok(Vec::new()),
    }
}

fn save_list_to_kv(kv: &KvStore, kind: EntityKind, docs: &[Value]) -> Result<(), TransitError> {
    let payload = serde_json::to_string(docs)?;
    kv.put(kind.storage_key(), &payload)
}

fn load_single_from_kv(kv: &KvStore, kind: EntityKind) -> Result<Option<Value>, TransitError> {
    match kv.get(kind.storage_key())? {
        Some(payload) => serde_json::from_str(&payload).map(Some).map_err(Into::into),
        None => Ok(None),
    }
}

fn save_single_to_kv(
    kv: &KvStore,
    kind: EntityKind,
    doc: Option<&Value>,
) -> Result<(), TransitError> {
    match doc {
        Some(doc) => kv.put(kind.storage_key(), &doc.to_string()),
        None => kv.remove(kind.storage_key()),
    }
}

async fn clear_all(state: &StorageActorState) -> Result<(), TransitError> {
    let mut first_err = None;

    for kind in EntityKind::ALL {
        if let Err(e) = state.kv.remove(kind.storage_key()) {
            warn!(key = kind.storage_key(), error = %e, "failed to clear primary key");
            first_err.get_or_insert(e);
        }
    }

    if let Err(e) = state.db.clear_collection(EntityKind::Passengers).await {
        warn!(error = %e, "failed to clear secondary passenger collection");
        first_err.get_or_insert(e);
    }

    match first_err {
        None => Ok(()),
        Some(e) => Err(e),
    }
}
