use crate::error::TransitError;
use crate::store::EntityKind;
use crate::store::actor::{StorageActor, StorageMessage};
use crate::store::kv::KvStore;
use crate::store::sqlite::CollectionStorage;
use crate::types::{Conductor, ConductorCredential, Passenger, Signature, Trip, User};

use ractor::{Actor, ActorRef};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Handle for the storage façade. Cloneable; every clone talks to the same
/// actor, so one handle per application session is enough and tests can spawn
/// isolated instances.
#[derive(Clone)]
pub struct StorageHandle {
    actor: ActorRef<StorageMessage>,
}

impl StorageHandle {
    /// Spawn the storage actor over the two local stores. Store
    /// initialization failures surface here rather than as empty reads later.
    pub async fn spawn(kv: KvStore, db: CollectionStorage) -> Result<Self, TransitError> {
        let (actor, _jh) = Actor::spawn(None, StorageActor, (kv, db))
            .await
            .map_err(|e| TransitError::ChannelClosed(format!("storage actor spawn failed: {e}")))?;
        Ok(Self { actor })
    }

    pub async fn get_passengers(&self) -> Result<Vec<Passenger>, TransitError> {
        let docs = ractor::call!(self.actor, StorageMessage::LoadPassengers)
            .map_err(|e| TransitError::ChannelClosed(format!("LoadPassengers RPC failed: {e}")))??;
        from_docs(docs)
    }

    /// Persists the full collection, not incremental deltas.
    pub async fn save_passengers(&self, passengers: &[Passenger]) -> Result<(), TransitError> {
        let docs = to_docs(passengers)?;
        ractor::call!(self.actor, StorageMessage::SavePassengers, docs)
            .map_err(|e| TransitError::ChannelClosed(format!("SavePassengers RPC failed: {e}")))?
    }

    pub async fn get_users(&self) -> Result<Vec<User>, TransitError> {
        self.load_list(EntityKind::Users).await
    }

    pub async fn save_users(&self, users: &[User]) -> Result<(), TransitError> {
        self.save_list(EntityKind::Users, users).await
    }

    pub async fn get_conductors(&self) -> Result<Vec<Conductor>, TransitError> {
        self.load_list(EntityKind::Conductors).await
    }

    pub async fn save_conductors(&self, conductors: &[Conductor]) -> Result<(), TransitError> {
        self.save_list(EntityKind::Conductors, conductors).await
    }

    pub async fn get_trips(&self) -> Result<Vec<Trip>, TransitError> {
        self.load_list(EntityKind::Trips).await
    }

    pub async fn save_trips(&self, trips: &[Trip]) -> Result<(), TransitError> {
        self.save_list(EntityKind::Trips, trips).await
    }

    pub async fn get_signatures(&self) -> Result<Vec<Signature>, TransitError> {
        self.load_list(EntityKind::Signatures).await
    }

    pub async fn save_signatures(&self, signatures: &[Signature]) -> Result<(), TransitError> {
        self.save_list(EntityKind::Signatures, signatures).await
    }

    pub async fn get_conductor_credentials(
        &self,
    ) -> Result<Vec<ConductorCredential>, TransitError> {
        self.load_list(EntityKind::ConductorCredentials).await
    }

    pub async fn save_conductor_credentials(
        &self,
        credentials: &[ConductorCredential],
    ) -> Result<(), TransitError> {
        self.save_list(EntityKind::ConductorCredentials, credentials)
            .await
    }

    pub async fn get_current_user(&self) -> Result<Option<User>, TransitError> {
        let doc = ractor::call!(self.actor, StorageMessage::LoadSingle, EntityKind::CurrentUser)
            .map_err(|e| TransitError::ChannelClosed(format!("LoadSingle RPC failed: {e}")))??;
        doc.map(|d| serde_json::from_value(d).map_err(Into::into))
            .transpose()
    }

    pub async fn set_current_user(&self, user: Option<&User>) -> Result<(), TransitError> {
        let doc = user.map(serde_json::to_value).transpose()?;
        ractor::call!(
            self.actor,
            StorageMessage::SaveSingle,
            EntityKind::CurrentUser,
            doc
        )
        .map_err(|e| TransitError::ChannelClosed(format!("SaveSingle RPC failed: {e}")))?
    }

    /// Full application reset.
    pub async fn clear_all(&self) -> Result<(), TransitError> {
        ractor::call!(self.actor, StorageMessage::ClearAll)
            .map_err(|e| TransitError::ChannelClosed(format!("ClearAll RPC failed: {e}")))?
    }

    async fn load_list<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<T>, TransitError> {
        let docs = ractor::call!(self.actor, StorageMessage::LoadList, kind)
            .map_err(|e| TransitError::ChannelClosed(format!("LoadList RPC failed: {e}")))??;
        from_docs(docs)
    }

    async fn save_list<T: Serialize>(
        &self,
        kind: EntityKind,
        items: &[T],
    ) -> Result<(), TransitError> {
        let docs = to_docs(items)?;
        ractor::call!(self.actor, StorageMessage::SaveList, kind, docs)
            .map_err(|e| TransitError::ChannelClosed(format!("SaveList RPC failed: {e}")))?
    }
}

fn to_docs<T: Serialize>(items: &[T]) -> Result<Vec<Value>, TransitError> {
    items
        .iter()
        .map(|item| serde_json::to_value(item).map_err(Into::into))
        .collect()
}

fn from_docs<T: DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<T>, TransitError> {
    docs.into_iter()
        .map(|doc| serde_json::from_value(doc).map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn spawn_handle(dir: &std::path::Path, quota: u64) -> StorageHandle {
        let kv = KvStore::open(dir.join("kv"), quota).unwrap();
        let url = format!("sqlite:{}", dir.join("store.sqlite").display());
        let db = CollectionStorage::connect(&url).await.unwrap();
        StorageHandle::spawn(kv, db).await.unwrap()
    }

    fn passenger(name: &str, cedula: &str) -> Passenger {
        Passenger::new(name.to_string(), cedula.to_string(), "TI".to_string(), None)
    }

    #[tokio::test]
    async fn passenger_save_then_get_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = spawn_handle(dir.path(), 1024 * 1024).await;

        let list = vec![passenger("Ana", "100"), passenger("Luis", "200")];
        storage.save_passengers(&list).await.unwrap();
        assert_eq!(storage.get_passengers().await.unwrap(), list);
    }

    #[tokio::test]
    async fn quota_fallback_keeps_save_working() {
        let dir = tempdir().unwrap();
        // Quota too small for any passenger payload: every primary write
        // fails, the secondary store carries the collection alone.
        let storage = spawn_handle(dir.path(), 8).await;

        let list = vec![passenger("Ana", "100")];
        storage.save_passengers(&list).await.unwrap();
        assert_eq!(storage.get_passengers().await.unwrap(), list);
    }

    #[tokio::test]
    async fn small_collections_stay_in_primary_store() {
        let dir = tempdir().unwrap();
        let storage = spawn_handle(dir.path(), 1024 * 1024).await;

        let admin = User::default_admin();
        storage.save_users(std::slice::from_ref(&admin)).await.unwrap();
        assert_eq!(storage.get_users().await.unwrap(), vec![admin.clone()]);

        storage.set_current_user(Some(&admin)).await.unwrap();
        assert_eq!(storage.get_current_user().await.unwrap(), Some(admin));
        storage.set_current_user(None).await.unwrap();
        assert_eq!(storage.get_current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn opaque_records_roundtrip_through_primary_store() {
        let dir = tempdir().unwrap();
        let storage = spawn_handle(dir.path(), 1024 * 1024).await;

        let sig = Signature::new(serde_json::json!({ "image": "data:image/png;base64,AAAA" }));
        storage.save_signatures(std::slice::from_ref(&sig)).await.unwrap();
        assert_eq!(storage.get_signatures().await.unwrap(), vec![sig]);

        let cred = ConductorCredential::new(serde_json::json!({ "badge": "B-42" }));
        storage
            .save_conductor_credentials(std::slice::from_ref(&cred))
            .await
            .unwrap();
        assert_eq!(
            storage.get_conductor_credentials().await.unwrap(),
            vec![cred]
        );
    }

    #[tokio::test]
    async fn clear_all_resets_every_collection() {
        let dir = tempdir().unwrap();
        let storage = spawn_handle(dir.path(), 1024 * 1024).await;

        storage
            .save_passengers(&[passenger("Ana", "100")])
            .await
            .unwrap();
        storage
            .save_users(&[User::default_admin()])
            .await
            .unwrap();

        storage.clear_all().await.unwrap();
        assert!(storage.get_passengers().await.unwrap().is_empty());
        assert!(storage.get_users().await.unwrap().is_empty());
    }
}
