use chrono::{DateTime, Utc};

use super::domain::{
    ActiveVisit, ParkingSettings, ParkingSlot, PassId, PassStatus, PassWithResident, Resident,
    ResidentId, SlotCounts, SlotId, SlotReconciliation, SweepReport, VisitorPass,
};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Error enumeration for the credential backend.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential backend unavailable: {0}")]
    Unavailable(String),
}

/// Insert payload for a new pass; the store assigns the id and pass code.
#[derive(Debug, Clone)]
pub struct NewPass {
    pub resident_id: ResidentId,
    pub visitor_name: String,
    pub vehicle_number: String,
    pub issue_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
}

/// Outcome of the atomic slot-bind-and-activate transition.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Granted { pass: VisitorPass, slot_id: SlotId },
    NoSlotAvailable,
    NotPending(PassStatus),
    PassMissing,
}

/// Outcome of the atomic complete-and-release transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitOutcome {
    Completed(VisitorPass),
    NotActive(PassStatus),
    PassMissing,
}

/// Outcome of a pre-arrival cancellation.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled(VisitorPass),
    NotPending(PassStatus),
    PassMissing,
}

/// Storage abstraction for the pass/slot tables.
///
/// Every compound state transition is a single trait operation so an adapter
/// can execute it under one transaction or lock. Callers never compose a
/// transition out of separate reads and writes.
pub trait PassRepository: Send + Sync {
    fn insert_pass(&self, pass: NewPass) -> Result<VisitorPass, RepositoryError>;
    fn fetch_pass(&self, id: &PassId) -> Result<Option<VisitorPass>, RepositoryError>;
    fn fetch_pass_by_code(&self, code: &str) -> Result<Option<VisitorPass>, RepositoryError>;
    fn fetch_resident(&self, id: &ResidentId) -> Result<Option<Resident>, RepositoryError>;
    fn list_residents(&self) -> Result<Vec<Resident>, RepositoryError>;
    fn passes_for_resident(&self, id: &ResidentId) -> Result<Vec<VisitorPass>, RepositoryError>;
    fn list_passes(
        &self,
        filter: Option<PassStatus>,
    ) -> Result<Vec<PassWithResident>, RepositoryError>;
    fn list_slots(&self) -> Result<Vec<ParkingSlot>, RepositoryError>;
    fn slot_counts(&self) -> Result<SlotCounts, RepositoryError>;
    fn active_visits(&self) -> Result<Vec<ActiveVisit>, RepositoryError>;
    fn search_active_by_vehicle(
        &self,
        fragment: &str,
    ) -> Result<Option<ActiveVisit>, RepositoryError>;

    /// Atomically pick an AVAILABLE slot, bind it, and activate the pass.
    fn bind_slot_and_activate(
        &self,
        id: &PassId,
        now: DateTime<Utc>,
    ) -> Result<EntryOutcome, RepositoryError>;

    /// Atomically complete an ACTIVE pass and release whichever slot links
    /// to it. Releasing an already-released slot is a no-op.
    fn release_slot_and_complete(
        &self,
        id: &PassId,
        now: DateTime<Utc>,
    ) -> Result<ExitOutcome, RepositoryError>;

    /// Cancel a PENDING pass (to COMPLETED); no slot is ever involved.
    fn cancel_pending(&self, id: &PassId) -> Result<CancelOutcome, RepositoryError>;

    /// Expire a pass iff it is still PENDING; `None` means the pass moved on
    /// before the write and nothing changed.
    fn expire_pending(&self, id: &PassId) -> Result<Option<VisitorPass>, RepositoryError>;

    /// Expire every timed-out PENDING and ACTIVE pass, releasing slots bound
    /// to the latter in the same step. Idempotent for a fixed `now`.
    fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, RepositoryError>;

    fn settings(&self) -> Result<ParkingSettings, RepositoryError>;

    /// Persist settings and reconcile the slot pool toward the new maximum.
    /// Only AVAILABLE slots may be removed on shrink.
    fn update_settings(
        &self,
        settings: ParkingSettings,
    ) -> Result<SlotReconciliation, RepositoryError>;
}

/// Pluggable credential checks so login comparisons never live inside the
/// lifecycle manager.
pub trait CredentialVerifier: Send + Sync {
    fn verify_resident(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Resident>, CredentialError>;

    fn verify_operator(&self, id: &str, password: &str) -> Result<bool, CredentialError>;
}
