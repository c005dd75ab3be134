use crate::error::TransitError;
use crate::store::StorageHandle;
use crate::types::{
    Conductor, ConductorInput, Passenger, PassengerInput, ReportRow, StartTripInput, Trip,
    TripStatus, User, check_embedded_payload,
};

use chrono::{NaiveDate, Utc};
use tracing::info;

/// Domain operations over the storage façade. The registry is the only
/// writer of stored collections; remote adapters go through it as well.
#[derive(Clone)]
pub struct Registry {
    storage: StorageHandle,
}

impl Registry {
    pub fn new(storage: StorageHandle) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &StorageHandle {
        &self.storage
    }

    /// Seed the single default administrator when the user collection is
    /// empty. Idempotent across restarts.
    pub async fn ensure_seed_data(&self) -> Result<(), TransitError> {
        let users = self.storage.get_users().await?;
        if users.is_empty() {
            self.storage.save_users(&[User::default_admin()]).await?;
            info!("seeded default administrator account");
        }
        Ok(())
    }

    pub async fn list_passengers(&self) -> Result<Vec<Passenger>, TransitError> {
        self.storage.get_passengers().await
    }

    pub async fn get_passenger(&self, id: &str) -> Result<Passenger, TransitError> {
        self.storage
            .get_passengers()
            .await?
            .into_iter()
            .find(|p| p.id == id)
            .ok_or(TransitError::NotFound("passenger"))
    }

    pub async fn create_passenger(
        &self,
        input: PassengerInput,
    ) -> Result<Passenger, TransitError> {
        validate_passenger_input(&input)?;
        let mut passengers = self.storage.get_passengers().await?;
        reject_duplicate_cedula(&passengers, &input.cedula, None)?;

        let passenger = Passenger::new(input.name, input.cedula, input.gerencia, input.qr_code);
        passengers.push(passenger.clone());
        self.storage.save_passengers(&passengers).await?;
        Ok(passenger)
    }

    pub async fn update_passenger(
        &self,
        id: &str,
        input: PassengerInput,
    ) -> Result<Passenger, TransitError> {
        validate_passenger_input(&input)?;
        let mut passengers = self.storage.get_passengers().await?;
        reject_duplicate_cedula(&passengers, &input.cedula, Some(id))?;

        let passenger = passengers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(TransitError::NotFound("passenger"))?;
        passenger.name = input.name;
        passenger.cedula = input.cedula;
        passenger.gerencia = input.gerencia;
        if let Some(qr_code) = input.qr_code {
            passenger.qr_code = qr_code;
        }
        passenger.updated_at = Utc::now();
        let updated = passenger.clone();

        self.storage.save_passengers(&passengers).await?;
        Ok(updated)
    }

    /// Local-only delete; no remote delete propagation.
    pub async fn delete_passenger(&self, id: &str) -> Result<(), TransitError> {
        let mut passengers = self.storage.get_passengers().await?;
        let before = passengers.len();
        passengers.retain(|p| p.id != id);
        if passengers.len() == before {
            return Err(TransitError::NotFound("passenger"));
        }
        self.storage.save_passengers(&passengers).await
    }

    /// Overwrite the local collection wholesale (pull-from-remote path).
    pub async fn replace_passengers(
        &self,
        passengers: Vec<Passenger>,
    ) -> Result<usize, TransitError> {
        let count = passengers.len();
        self.storage.save_passengers(&passengers).await?;
        Ok(count)
    }

    /// Append pre-validated records (import path) in one collection write.
    pub async fn append_passengers(
        &self,
        new_passengers: Vec<Passenger>,
    ) -> Result<usize, TransitError> {
        if new_passengers.is_empty() {
            return Ok(0);
        }
        let count = new_passengers.len();
        let mut passengers = self.storage.get_passengers().await?;
        passengers.extend(new_passengers);
        self.storage.save_passengers(&passengers).await?;
        Ok(count)
    }

    pub async fn list_conductors(&self) -> Result<Vec<Conductor>, TransitError> {
        self.storage.get_conductors().await
    }

    pub async fn create_conductor(
        &self,
        input: ConductorInput,
    ) -> Result<Conductor, TransitError> {
        if input.name.trim().is_empty() {
            return Err(TransitError::Validation(
                "missing required field: name".to_string(),
            ));
        }
        let mut conductors = self.storage.get_conductors().await?;
        let mut conductor = Conductor::new(input.name, input.license_id, input.phone);
        conductor.active = input.active;
        conductors.push(conductor.clone());
        self.storage.save_conductors(&conductors).await?;
        Ok(conductor)
    }

    pub async fn list_trips(&self) -> Result<Vec<Trip>, TransitError> {
        self.storage.get_trips().await
    }

    pub async fn start_trip(&self, input: StartTripInput) -> Result<Trip, TransitError> {
        let passengers = self.storage.get_passengers().await?;
        if !passengers.iter().any(|p| p.id == input.passenger_id) {
            return Err(TransitError::NotFound("passenger"));
        }
        let conductors = self.storage.get_conductors().await?;
        if !conductors.iter().any(|c| c.id == input.conductor_id) {
            return Err(TransitError::NotFound("conductor"));
        }

        let trip = Trip::start(
            input.passenger_id,
            input.conductor_id,
            input.origin,
            input.destination,
        );
        let mut trips = self.storage.get_trips().await?;
        trips.push(trip.clone());
        self.storage.save_trips(&trips).await?;
        Ok(trip)
    }

    /// `started -> finished` exactly once; finishing a finished trip is
    /// rejected and the stored collection is unchanged.
    pub async fn finish_trip(&self, trip_id: &str) -> Result<Trip, TransitError> {
        let mut trips = self.storage.get_trips().await?;
        let trip = trips
            .iter_mut()
            .find(|t| t.id == trip_id)
            .ok_or(TransitError::NotFound("trip"))?;

        if trip.status == TripStatus::Finished {
            return Err(TransitError::Validation(
                "trip is already finished".to_string(),
            ));
        }
        trip.status = TripStatus::Finished;
        trip.finished_at = Some(Utc::now());
        let finished = trip.clone();

        self.storage.save_trips(&trips).await?;
        Ok(finished)
    }

    /// Joined trip/passenger/conductor view for the report lookup endpoint.
    pub async fn trip_report(&self, trip_id: &str) -> Result<ReportRow, TransitError> {
        let trips = self.storage.get_trips().await?;
        let trip = trips
            .into_iter()
            .find(|t| t.id == trip_id)
            .ok_or(TransitError::NotFound("trip"))?;

        let passenger = self.get_passenger(&trip.passenger_id).await?;
        let conductor = self
            .storage
            .get_conductors()
            .await?
            .into_iter()
            .find(|c| c.id == trip.conductor_id)
            .ok_or(TransitError::NotFound("conductor"))?;

        Ok(ReportRow {
            trip_id: trip.id,
            status: trip.status,
            origin: trip.origin,
            destination: trip.destination,
            started_at: trip.started_at,
            finished_at: trip.finished_at,
            passenger_id: passenger.id,
            passenger_name: passenger.name,
            passenger_doc: passenger.cedula,
            conductor_id: conductor.id,
            conductor_name: conductor.name,
            conductor_license: conductor.license_id,
            conductor_phone: conductor.phone,
        })
    }

    /// Trips belonging to one passenger that started on the given day.
    pub async fn trips_for_passenger_on(
        &self,
        passenger_id: &str,
        day: NaiveDate,
    ) -> Result<Vec<Trip>, TransitError> {
        let trips = self.storage.get_trips().await?;
        Ok(trips
            .into_iter()
            .filter(|t| t.passenger_id == passenger_id && t.started_at.date_naive() == day)
            .collect())
    }
}

fn validate_passenger_input(input: &PassengerInput) -> Result<(), TransitError> {
    if input.name.trim().is_empty() {
        return Err(TransitError::Validation(
            "missing required field: name".to_string(),
        ));
    }
    if input.cedula.trim().is_empty() {
        return Err(TransitError::Validation(
            "missing required field: cedula".to_string(),
        ));
    }
    if let Some(qr_code) = &input.qr_code {
        check_embedded_payload(qr_code).map_err(TransitError::Validation)?;
    }
    Ok(())
}

fn reject_duplicate_cedula(
    passengers: &[Passenger],
    cedula: &str,
    exclude_id: Option<&str>,
) -> Result<(), TransitError> {
    let duplicate = passengers
        .iter()
        .any(|p| p.cedula == cedula && exclude_id != Some(p.id.as_str()));
    if duplicate {
        return Err(TransitError::Validation(format!(
            "a passenger with cedula {cedula} already exists"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CollectionStorage, KvStore, StorageHandle};
    use tempfile::tempdir;

    async fn test_registry(dir: &std::path::Path) -> Registry {
        let kv = KvStore::open(dir.join("kv"), 1024 * 1024).unwrap();
        let url = format!("sqlite:{}", dir.join("store.sqlite").display());
        let db = CollectionStorage::connect(&url).await.unwrap();
        Registry::new(StorageHandle::spawn(kv, db).await.unwrap())
    }

    fn input(name: &str, cedula: &str) -> PassengerInput {
        PassengerInput {
            name: name.to_string(),
            cedula: cedula.to_string(),
            gerencia: "TI".to_string(),
            qr_code: None,
        }
    }

    #[tokio::test]
    async fn duplicate_cedula_is_rejected_and_store_unchanged() {
        let dir = tempdir().unwrap();
        let registry = test_registry(dir.path()).await;

        registry.create_passenger(input("Ana", "100")).await.unwrap();
        let before = registry.list_passengers().await.unwrap();

        let err = registry
            .create_passenger(input("Otra Ana", "100"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitError::Validation(_)));
        assert_eq!(registry.list_passengers().await.unwrap(), before);
    }

    #[tokio::test]
    async fn update_allows_own_cedula_but_not_anothers() {
        let dir = tempdir().unwrap();
        let registry = test_registry(dir.path()).await;

        let ana = registry.create_passenger(input("Ana", "100")).await.unwrap();
        registry.create_passenger(input("Luis", "200")).await.unwrap();

        // Same cedula, same passenger: fine.
        registry
            .update_passenger(&ana.id, input("Ana María", "100"))
            .await
            .unwrap();
        // Someone else's cedula: rejected.
        let err = registry
            .update_passenger(&ana.id, input("Ana", "200"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransitError::Validation(_)));
    }

    #[tokio::test]
    async fn trip_finishes_exactly_once() {
        let dir = tempdir().unwrap();
        let registry = test_registry(dir.path()).await;

        let passenger = registry.create_passenger(input("Ana", "100")).await.unwrap();
        let conductor = registry
            .create_conductor(ConductorInput {
                name: "Pedro".to_string(),
                license_id: Some("L-1".to_string()),
                phone: None,
                active: true,
            })
            .await
            .unwrap();

        let trip = registry
            .start_trip(StartTripInput {
                passenger_id: passenger.id.clone(),
                conductor_id: conductor.id.clone(),
                origin: Some("Base".to_string()),
                destination: Some("Planta".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(trip.status, TripStatus::Started);
        assert_eq!(trip.finished_at, None);

        let finished = registry.finish_trip(&trip.id).await.unwrap();
        assert_eq!(finished.status, TripStatus::Finished);
        assert!(finished.finished_at.is_some());

        let err = registry.finish_trip(&trip.id).await.unwrap_err();
        assert!(matches!(err, TransitError::Validation(_)));

        // The stored trip kept its first finish timestamp.
        let stored = registry.list_trips().await.unwrap();
        assert_eq!(stored[0].finished_at, finished.finished_at);
    }

    #[tokio::test]
    async fn start_trip_requires_existing_references() {
        let dir = tempdir().unwrap();
        let registry = test_registry(dir.path()).await;

        let err = registry
            .start_trip(StartTripInput {
                passenger_id: "missing".to_string(),
                conductor_id: "missing".to_string(),
                origin: None,
                destination: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransitError::NotFound("passenger")));
    }

    #[tokio::test]
    async fn seed_is_idempotent() {
        let dir = tempdir().unwrap();
        let registry = test_registry(dir.path()).await;

        registry.ensure_seed_data().await.unwrap();
        registry.ensure_seed_data().await.unwrap();
        let users = registry.storage().get_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Administrador");
    }

    #[tokio::test]
    async fn replace_overwrites_not_merges() {
        let dir = tempdir().unwrap();
        let registry = test_registry(dir.path()).await;

        registry.create_passenger(input("Ana", "100")).await.unwrap();
        let remote = vec![Passenger::new(
            "Remota".to_string(),
            "900".to_string(),
            "RRHH".to_string(),
            None,
        )];
        registry.replace_passengers(remote.clone()).await.unwrap();

        assert_eq!(registry.list_passengers().await.unwrap(), remote);
    }
}
