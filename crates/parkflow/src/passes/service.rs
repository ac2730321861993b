use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::domain::{
    ActiveVisit, CreatePassRequest, DashboardSnapshot, EntryGrant, ParkingSettings, ParkingSlot,
    PassId, PassStatus, PassWithResident, Resident, ResidentId, SettingsUpdate, SweepReport,
    UpdateSettingsRequest, VisitorPass,
};
use super::repository::{
    CancelOutcome, CredentialError, CredentialVerifier, EntryOutcome, ExitOutcome, NewPass,
    PassRepository, RepositoryError,
};

/// The pass/slot lifecycle manager.
///
/// Owns every state transition for passes and slots; the HTTP layer only
/// extracts arguments and shapes responses. Compound transitions delegate to
/// single repository operations, so a transition either happens whole or not
/// at all.
pub struct PassLifecycleService<R, C> {
    repository: Arc<R>,
    credentials: Arc<C>,
}

impl<R, C> PassLifecycleService<R, C>
where
    R: PassRepository + 'static,
    C: CredentialVerifier + 'static,
{
    pub fn new(repository: Arc<R>, credentials: Arc<C>) -> Self {
        Self {
            repository,
            credentials,
        }
    }

    /// Issue a new PENDING pass. No slot is touched at creation.
    pub fn create_pass(
        &self,
        request: CreatePassRequest,
        now: DateTime<Utc>,
    ) -> Result<VisitorPass, PassServiceError> {
        let resident_id = request
            .resident_id
            .ok_or_else(|| missing_field("resident_id"))?;
        let visitor_name = required_text(request.visitor_name, "visitor_name")?;
        let vehicle_number = required_text(request.vehicle_number, "vehicle_number")?;
        let duration_hours = request
            .duration_hours
            .ok_or_else(|| missing_field("duration_hours"))?;

        if duration_hours == 0 {
            return Err(PassServiceError::Validation(
                "duration_hours must be at least 1".to_string(),
            ));
        }
        let settings = self.repository.settings()?;
        if duration_hours > settings.max_duration_hours {
            return Err(PassServiceError::Validation(format!(
                "duration_hours exceeds the configured maximum of {}",
                settings.max_duration_hours
            )));
        }

        let resident = self
            .repository
            .fetch_resident(&ResidentId(resident_id))?
            .ok_or(PassServiceError::ResidentNotFound)?;

        let pass = self.repository.insert_pass(NewPass {
            resident_id: resident.id,
            visitor_name,
            vehicle_number,
            issue_time: now,
            expiry_time: now + Duration::hours(i64::from(duration_hours)),
        })?;
        Ok(pass)
    }

    /// Look a pass up by numeric id or shareable code for gate validation.
    ///
    /// A PENDING pass discovered past its expiry is expired on the spot and
    /// reported as such; anything no longer PENDING is rejected naming its
    /// current state.
    pub fn validate_pass(
        &self,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<PassWithResident, PassServiceError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(PassServiceError::Validation(
                "pass id or code is required".to_string(),
            ));
        }

        let pass = self.find_pass(value)?;

        if pass.status == PassStatus::Pending && pass.is_expired_at(now) {
            return match self.repository.expire_pending(&pass.id)? {
                Some(expired) => Err(PassServiceError::PassExpired(Box::new(expired))),
                None => {
                    // Lost a race with entry or the sweeper; report the
                    // state the pass actually landed in.
                    let refreshed = self
                        .repository
                        .fetch_pass(&pass.id)?
                        .ok_or(PassServiceError::PassNotFound)?;
                    Err(PassServiceError::InvalidState(refreshed.status))
                }
            };
        }

        if pass.status != PassStatus::Pending {
            return Err(PassServiceError::InvalidState(pass.status));
        }

        let resident = self
            .repository
            .fetch_resident(&pass.resident_id)?
            .ok_or(PassServiceError::ResidentNotFound)?;
        Ok(PassWithResident {
            pass,
            resident_name: resident.name,
            flat_number: resident.flat_number,
        })
    }

    /// Admit the visitor: atomically claim any AVAILABLE slot and activate
    /// the pass.
    pub fn allow_entry(
        &self,
        id: &PassId,
        now: DateTime<Utc>,
    ) -> Result<EntryGrant, PassServiceError> {
        match self.repository.bind_slot_and_activate(id, now)? {
            EntryOutcome::Granted { pass, slot_id } => Ok(EntryGrant { pass, slot_id }),
            EntryOutcome::NoSlotAvailable => Err(PassServiceError::CapacityExhausted),
            EntryOutcome::NotPending(status) => Err(PassServiceError::InvalidState(status)),
            EntryOutcome::PassMissing => Err(PassServiceError::PassNotFound),
        }
    }

    /// Check the visitor out: atomically complete the pass and free its slot.
    pub fn mark_exit(
        &self,
        id: &PassId,
        now: DateTime<Utc>,
    ) -> Result<VisitorPass, PassServiceError> {
        match self.repository.release_slot_and_complete(id, now)? {
            ExitOutcome::Completed(pass) => Ok(pass),
            ExitOutcome::NotActive(status) => Err(PassServiceError::InvalidState(status)),
            ExitOutcome::PassMissing => Err(PassServiceError::PassNotFound),
        }
    }

    /// Cancel a pass before arrival. Only PENDING passes can be cancelled.
    pub fn cancel_pass(&self, id: &PassId) -> Result<VisitorPass, PassServiceError> {
        match self.repository.cancel_pending(id)? {
            CancelOutcome::Cancelled(pass) => Ok(pass),
            CancelOutcome::NotPending(status) => Err(PassServiceError::InvalidState(status)),
            CancelOutcome::PassMissing => Err(PassServiceError::PassNotFound),
        }
    }

    /// Expire every timed-out pass, freeing slots held by expired ACTIVE
    /// ones. Safe to call redundantly and concurrently with entry/exit.
    pub fn sweep_expirations(&self, now: DateTime<Utc>) -> Result<SweepReport, PassServiceError> {
        Ok(self.repository.sweep_expired(now)?)
    }

    /// Case-insensitive substring search over ACTIVE passes' vehicles.
    pub fn search_active(&self, fragment: &str) -> Result<Option<ActiveVisit>, PassServiceError> {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return Err(PassServiceError::Validation(
                "vehicle search text is required".to_string(),
            ));
        }
        Ok(self.repository.search_active_by_vehicle(fragment)?)
    }

    pub fn list_passes(
        &self,
        filter: Option<PassStatus>,
    ) -> Result<Vec<PassWithResident>, PassServiceError> {
        Ok(self.repository.list_passes(filter)?)
    }

    pub fn passes_for_resident(
        &self,
        id: &ResidentId,
    ) -> Result<Vec<VisitorPass>, PassServiceError> {
        Ok(self.repository.passes_for_resident(id)?)
    }

    pub fn list_residents(&self) -> Result<Vec<Resident>, PassServiceError> {
        Ok(self.repository.list_residents()?)
    }

    pub fn list_slots(&self) -> Result<Vec<ParkingSlot>, PassServiceError> {
        Ok(self.repository.list_slots()?)
    }

    pub fn dashboard(&self) -> Result<DashboardSnapshot, PassServiceError> {
        Ok(DashboardSnapshot {
            slots: self.repository.slot_counts()?,
            parked: self.repository.active_visits()?,
        })
    }

    pub fn settings(&self) -> Result<ParkingSettings, PassServiceError> {
        Ok(self.repository.settings()?)
    }

    /// Apply new settings and reconcile the slot pool toward the new
    /// maximum. Shrinking only ever removes AVAILABLE slots.
    pub fn update_settings(
        &self,
        request: UpdateSettingsRequest,
    ) -> Result<SettingsUpdate, PassServiceError> {
        let max_duration_hours = request
            .max_duration_hours
            .ok_or_else(|| missing_field("max_duration_hours"))?;
        let max_active_slots = request
            .max_active_slots
            .ok_or_else(|| missing_field("max_active_slots"))?;
        if max_duration_hours == 0 {
            return Err(PassServiceError::Validation(
                "max_duration_hours must be at least 1".to_string(),
            ));
        }

        let settings = ParkingSettings {
            max_duration_hours,
            max_active_slots,
        };
        let reconciliation = self.repository.update_settings(settings)?;
        Ok(SettingsUpdate {
            settings,
            reconciliation,
        })
    }

    /// Delegated resident credential check; the manager never compares
    /// secrets itself.
    pub fn resident_login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Resident, PassServiceError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(PassServiceError::InvalidCredentials);
        }
        self.credentials
            .verify_resident(email, password)?
            .ok_or(PassServiceError::InvalidCredentials)
    }

    /// Delegated operator (guard/admin) credential check.
    pub fn operator_login(&self, id: &str, password: &str) -> Result<(), PassServiceError> {
        if self.credentials.verify_operator(id.trim(), password)? {
            Ok(())
        } else {
            Err(PassServiceError::InvalidCredentials)
        }
    }

    fn find_pass(&self, value: &str) -> Result<VisitorPass, PassServiceError> {
        if let Ok(id) = value.parse::<i64>() {
            if let Some(pass) = self.repository.fetch_pass(&PassId(id))? {
                return Ok(pass);
            }
        }
        self.repository
            .fetch_pass_by_code(&value.to_ascii_uppercase())?
            .ok_or(PassServiceError::PassNotFound)
    }
}

fn missing_field(field: &str) -> PassServiceError {
    PassServiceError::Validation(format!("{field} is required"))
}

fn required_text(value: Option<String>, field: &str) -> Result<String, PassServiceError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(missing_field(field)),
    }
}

/// Error raised by the lifecycle manager.
#[derive(Debug, thiserror::Error)]
pub enum PassServiceError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("pass not found")]
    PassNotFound,
    #[error("resident not found")]
    ResidentNotFound,
    #[error("pass is already {}", .0.label())]
    InvalidState(PassStatus),
    #[error("no parking slots available")]
    CapacityExhausted,
    #[error("pass has expired")]
    PassExpired(Box<VisitorPass>),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Credentials(#[from] CredentialError),
}
