//! Visitor pass and parking slot lifecycle.
//!
//! The lifecycle service owns every pass/slot state transition; storage sits
//! behind [`repository::PassRepository`], whose compound operations are the
//! atomic units the state machine relies on. The HTTP router and the expiry
//! sweeper are thin shells around the service.

pub mod domain;
pub mod memory;
pub mod repository;
pub mod router;
pub mod service;
pub mod sweep;

#[cfg(test)]
mod tests;

pub use domain::{
    ActiveVisit, CreatePassRequest, DashboardSnapshot, EntryGrant, OperatorAccount,
    ParkingSettings, ParkingSlot, PassId, PassStatus, PassWithResident, Resident, ResidentId,
    SettingsUpdate, SlotCounts, SlotId, SlotReconciliation, SlotStatus, SweepReport,
    UpdateSettingsRequest, ValidatePassRequest, VisitorPass,
};
pub use memory::InMemoryPassStore;
pub use repository::{
    CredentialError, CredentialVerifier, NewPass, PassRepository, RepositoryError,
};
pub use router::pass_router;
pub use service::{PassLifecycleService, PassServiceError};
pub use sweep::ExpirySweeper;
