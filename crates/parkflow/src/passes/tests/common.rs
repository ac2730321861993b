use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::passes::domain::{
    ActiveVisit, CreatePassRequest, OperatorAccount, ParkingSettings, ParkingSlot, PassId,
    PassStatus, PassWithResident, Resident, ResidentId, SlotCounts, SlotReconciliation,
    SlotStatus, SweepReport, VisitorPass,
};
use crate::passes::memory::InMemoryPassStore;
use crate::passes::repository::{
    CancelOutcome, CredentialError, CredentialVerifier, EntryOutcome, ExitOutcome, NewPass,
    PassRepository, RepositoryError,
};
use crate::passes::router::pass_router;
use crate::passes::service::PassLifecycleService;

pub(super) type MemoryService = PassLifecycleService<InMemoryPassStore, InMemoryPassStore>;

pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn hours(n: i64) -> Duration {
    Duration::hours(n)
}

pub(super) fn operator() -> OperatorAccount {
    OperatorAccount {
        id: "admin".to_string(),
        password: "admin123".to_string(),
    }
}

pub(super) fn settings(max_active_slots: u32) -> ParkingSettings {
    ParkingSettings {
        max_duration_hours: 4,
        max_active_slots,
    }
}

pub(super) fn build_store(slots: u32) -> (Arc<InMemoryPassStore>, Vec<Resident>) {
    let store = Arc::new(InMemoryPassStore::new(settings(slots), operator()));
    let residents = vec![
        store
            .add_resident("Arun", "arun@parkflow.test", "password123", "A101")
            .expect("resident seeded"),
        store
            .add_resident("Meera", "meera@parkflow.test", "password123", "A102")
            .expect("resident seeded"),
    ];
    (store, residents)
}

pub(super) fn build_service(slots: u32) -> (Arc<MemoryService>, Arc<InMemoryPassStore>, Vec<Resident>) {
    let (store, residents) = build_store(slots);
    let service = Arc::new(PassLifecycleService::new(store.clone(), store.clone()));
    (service, store, residents)
}

/// Storage double that fails every operation, for surfacing-policy tests.
pub(super) struct UnavailableStore;

impl UnavailableStore {
    fn down<T>() -> Result<T, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl PassRepository for UnavailableStore {
    fn insert_pass(&self, _pass: NewPass) -> Result<VisitorPass, RepositoryError> {
        Self::down()
    }

    fn fetch_pass(&self, _id: &PassId) -> Result<Option<VisitorPass>, RepositoryError> {
        Self::down()
    }

    fn fetch_pass_by_code(&self, _code: &str) -> Result<Option<VisitorPass>, RepositoryError> {
        Self::down()
    }

    fn fetch_resident(&self, _id: &ResidentId) -> Result<Option<Resident>, RepositoryError> {
        Self::down()
    }

    fn list_residents(&self) -> Result<Vec<Resident>, RepositoryError> {
        Self::down()
    }

    fn passes_for_resident(&self, _id: &ResidentId) -> Result<Vec<VisitorPass>, RepositoryError> {
        Self::down()
    }

    fn list_passes(
        &self,
        _filter: Option<PassStatus>,
    ) -> Result<Vec<PassWithResident>, RepositoryError> {
        Self::down()
    }

    fn list_slots(&self) -> Result<Vec<ParkingSlot>, RepositoryError> {
        Self::down()
    }

    fn slot_counts(&self) -> Result<SlotCounts, RepositoryError> {
        Self::down()
    }

    fn active_visits(&self) -> Result<Vec<ActiveVisit>, RepositoryError> {
        Self::down()
    }

    fn search_active_by_vehicle(
        &self,
        _fragment: &str,
    ) -> Result<Option<ActiveVisit>, RepositoryError> {
        Self::down()
    }

    fn bind_slot_and_activate(
        &self,
        _id: &PassId,
        _now: DateTime<Utc>,
    ) -> Result<EntryOutcome, RepositoryError> {
        Self::down()
    }

    fn release_slot_and_complete(
        &self,
        _id: &PassId,
        _now: DateTime<Utc>,
    ) -> Result<ExitOutcome, RepositoryError> {
        Self::down()
    }

    fn cancel_pending(&self, _id: &PassId) -> Result<CancelOutcome, RepositoryError> {
        Self::down()
    }

    fn expire_pending(&self, _id: &PassId) -> Result<Option<VisitorPass>, RepositoryError> {
        Self::down()
    }

    fn sweep_expired(&self, _now: DateTime<Utc>) -> Result<SweepReport, RepositoryError> {
        Self::down()
    }

    fn settings(&self) -> Result<ParkingSettings, RepositoryError> {
        Self::down()
    }

    fn update_settings(
        &self,
        _settings: ParkingSettings,
    ) -> Result<SlotReconciliation, RepositoryError> {
        Self::down()
    }
}

impl CredentialVerifier for UnavailableStore {
    fn verify_resident(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<Option<Resident>, CredentialError> {
        Err(CredentialError::Unavailable("database offline".to_string()))
    }

    fn verify_operator(&self, _id: &str, _password: &str) -> Result<bool, CredentialError> {
        Err(CredentialError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn build_router(slots: u32) -> (axum::Router, Arc<InMemoryPassStore>, Vec<Resident>) {
    let (service, store, residents) = build_service(slots);
    (pass_router(service), store, residents)
}

pub(super) async fn read_json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn create_request(
    resident: &Resident,
    visitor: &str,
    vehicle: &str,
    duration_hours: u32,
) -> CreatePassRequest {
    CreatePassRequest {
        resident_id: Some(resident.id.0),
        visitor_name: Some(visitor.to_string()),
        vehicle_number: Some(vehicle.to_string()),
        duration_hours: Some(duration_hours),
    }
}

pub(super) fn issue_pass(
    service: &MemoryService,
    resident: &Resident,
    vehicle: &str,
    now: DateTime<Utc>,
) -> VisitorPass {
    service
        .create_pass(create_request(resident, "Visitor", vehicle, 2), now)
        .expect("pass created")
}

/// Insert a pass with an arbitrary expiry, bypassing the duration ceiling,
/// for expiry scenarios.
pub(super) fn insert_pass_expiring_at(
    store: &InMemoryPassStore,
    resident: &Resident,
    vehicle: &str,
    issue_time: DateTime<Utc>,
    expiry_time: DateTime<Utc>,
) -> VisitorPass {
    store
        .insert_pass(NewPass {
            resident_id: resident.id,
            visitor_name: "Visitor".to_string(),
            vehicle_number: vehicle.to_string(),
            issue_time,
            expiry_time,
        })
        .expect("pass inserted")
}

/// Check the structural invariants binding the slot pool to the passes:
/// occupied count equals active count, every occupied slot links exactly one
/// ACTIVE pass, and available slots carry no link.
pub(super) fn assert_pool_invariants(store: &InMemoryPassStore) {
    let slots = store.list_slots().expect("slots listed");
    let rows = store.list_passes(None).expect("passes listed");
    let active: Vec<_> = rows
        .iter()
        .filter(|row| row.pass.status == PassStatus::Active)
        .collect();
    let occupied: Vec<_> = slots
        .iter()
        .filter(|slot| slot.status == SlotStatus::Occupied)
        .collect();

    assert_eq!(
        occupied.len(),
        active.len(),
        "occupied slots must match active passes"
    );

    let mut linked = HashSet::new();
    for slot in &occupied {
        let pass_id = slot.linked_pass_id.expect("occupied slot links a pass");
        assert!(linked.insert(pass_id), "two slots reference the same pass");
        assert!(
            active.iter().any(|row| row.pass.id == pass_id),
            "occupied slot must link an ACTIVE pass"
        );
    }

    for slot in slots.iter().filter(|slot| slot.status == SlotStatus::Available) {
        assert!(
            slot.linked_pass_id.is_none(),
            "available slot must not link a pass"
        );
    }
}
