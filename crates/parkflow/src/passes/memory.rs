use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    generate_pass_code, ActiveVisit, OperatorAccount, ParkingSettings, ParkingSlot, PassId,
    PassStatus, PassWithResident, Resident, ResidentId, SlotCounts, SlotId, SlotReconciliation,
    SlotStatus, SweepReport, VisitorPass,
};
use super::repository::{
    CancelOutcome, CredentialError, CredentialVerifier, EntryOutcome, ExitOutcome, NewPass,
    PassRepository, RepositoryError,
};

#[derive(Debug)]
struct ResidentRecord {
    resident: Resident,
    password: String,
}

#[derive(Debug)]
struct StoreState {
    residents: BTreeMap<i64, ResidentRecord>,
    passes: BTreeMap<i64, VisitorPass>,
    slots: BTreeMap<i64, ParkingSlot>,
    settings: ParkingSettings,
    next_resident_id: i64,
    next_pass_id: i64,
    next_slot_id: i64,
}

/// In-memory storage adapter.
///
/// One mutex guards both tables, so every compound transition the repository
/// trait names runs under a single acquisition and cannot interleave with a
/// racing entry, exit, or sweep.
pub struct InMemoryPassStore {
    inner: Mutex<StoreState>,
    operator: OperatorAccount,
}

impl InMemoryPassStore {
    /// Build a store with the given settings, provisioning the slot pool to
    /// `max_active_slots` AVAILABLE slots.
    pub fn new(settings: ParkingSettings, operator: OperatorAccount) -> Self {
        let mut slots = BTreeMap::new();
        for id in 1..=i64::from(settings.max_active_slots) {
            slots.insert(
                id,
                ParkingSlot {
                    id: SlotId(id),
                    status: SlotStatus::Available,
                    linked_pass_id: None,
                },
            );
        }
        let next_slot_id = i64::from(settings.max_active_slots) + 1;

        Self {
            inner: Mutex::new(StoreState {
                residents: BTreeMap::new(),
                passes: BTreeMap::new(),
                slots,
                settings,
                next_resident_id: 1,
                next_pass_id: 1,
                next_slot_id,
            }),
            operator,
        }
    }

    /// Register a resident with self-service credentials.
    pub fn add_resident(
        &self,
        name: &str,
        email: &str,
        password: &str,
        flat_number: &str,
    ) -> Result<Resident, RepositoryError> {
        let mut state = self.state()?;
        let id = state.next_resident_id;
        state.next_resident_id += 1;
        let resident = Resident {
            id: ResidentId(id),
            name: name.to_string(),
            email: email.to_string(),
            flat_number: flat_number.to_string(),
        };
        state.residents.insert(
            id,
            ResidentRecord {
                resident: resident.clone(),
                password: password.to_string(),
            },
        );
        Ok(resident)
    }

    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.inner
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl StoreState {
    fn resident_view(&self, id: &ResidentId) -> Option<&Resident> {
        self.residents.get(&id.0).map(|record| &record.resident)
    }

    fn visit_for(&self, pass: &VisitorPass) -> Option<ActiveVisit> {
        self.slots
            .values()
            .find(|slot| slot.linked_pass_id == Some(pass.id))
            .map(|slot| ActiveVisit {
                pass: pass.clone(),
                slot_id: slot.id,
            })
    }

    fn unused_pass_code(&self) -> String {
        loop {
            let code = generate_pass_code();
            let taken = self
                .passes
                .values()
                .any(|pass| pass.pass_code.as_deref() == Some(code.as_str()));
            if !taken {
                return code;
            }
        }
    }
}

impl PassRepository for InMemoryPassStore {
    fn insert_pass(&self, pass: NewPass) -> Result<VisitorPass, RepositoryError> {
        let mut state = self.state()?;
        let id = state.next_pass_id;
        state.next_pass_id += 1;
        let code = state.unused_pass_code();
        let stored = VisitorPass {
            id: PassId(id),
            resident_id: pass.resident_id,
            visitor_name: pass.visitor_name,
            vehicle_number: pass.vehicle_number,
            issue_time: pass.issue_time,
            expiry_time: pass.expiry_time,
            status: PassStatus::Pending,
            entry_time: None,
            exit_time: None,
            pass_code: Some(code),
        };
        state.passes.insert(id, stored.clone());
        Ok(stored)
    }

    fn fetch_pass(&self, id: &PassId) -> Result<Option<VisitorPass>, RepositoryError> {
        let state = self.state()?;
        Ok(state.passes.get(&id.0).cloned())
    }

    fn fetch_pass_by_code(&self, code: &str) -> Result<Option<VisitorPass>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .passes
            .values()
            .find(|pass| pass.pass_code.as_deref() == Some(code))
            .cloned())
    }

    fn fetch_resident(&self, id: &ResidentId) -> Result<Option<Resident>, RepositoryError> {
        let state = self.state()?;
        Ok(state.resident_view(id).cloned())
    }

    fn list_residents(&self) -> Result<Vec<Resident>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .residents
            .values()
            .map(|record| record.resident.clone())
            .collect())
    }

    fn passes_for_resident(&self, id: &ResidentId) -> Result<Vec<VisitorPass>, RepositoryError> {
        let state = self.state()?;
        let mut passes: Vec<VisitorPass> = state
            .passes
            .values()
            .filter(|pass| pass.resident_id == *id)
            .cloned()
            .collect();
        passes.sort_by(|a, b| {
            b.issue_time
                .cmp(&a.issue_time)
                .then_with(|| b.id.0.cmp(&a.id.0))
        });
        Ok(passes)
    }

    fn list_passes(
        &self,
        filter: Option<PassStatus>,
    ) -> Result<Vec<PassWithResident>, RepositoryError> {
        let state = self.state()?;
        let mut rows: Vec<PassWithResident> = state
            .passes
            .values()
            .filter(|pass| filter.map_or(true, |wanted| pass.status == wanted))
            .filter_map(|pass| {
                state.resident_view(&pass.resident_id).map(|resident| PassWithResident {
                    pass: pass.clone(),
                    resident_name: resident.name.clone(),
                    flat_number: resident.flat_number.clone(),
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.pass
                .issue_time
                .cmp(&a.pass.issue_time)
                .then_with(|| b.pass.id.0.cmp(&a.pass.id.0))
        });
        Ok(rows)
    }

    fn list_slots(&self) -> Result<Vec<ParkingSlot>, RepositoryError> {
        let state = self.state()?;
        Ok(state.slots.values().copied().collect())
    }

    fn slot_counts(&self) -> Result<SlotCounts, RepositoryError> {
        let state = self.state()?;
        let total = state.slots.len();
        let available = state
            .slots
            .values()
            .filter(|slot| slot.status == SlotStatus::Available)
            .count();
        Ok(SlotCounts {
            total,
            available,
            occupied: total - available,
        })
    }

    fn active_visits(&self) -> Result<Vec<ActiveVisit>, RepositoryError> {
        let state = self.state()?;
        Ok(state
            .passes
            .values()
            .filter(|pass| pass.status == PassStatus::Active)
            .filter_map(|pass| state.visit_for(pass))
            .collect())
    }

    fn search_active_by_vehicle(
        &self,
        fragment: &str,
    ) -> Result<Option<ActiveVisit>, RepositoryError> {
        let needle = fragment.trim().to_ascii_lowercase();
        let state = self.state()?;
        Ok(state
            .passes
            .values()
            .filter(|pass| pass.status == PassStatus::Active)
            .filter(|pass| pass.vehicle_number.to_ascii_lowercase().contains(&needle))
            .find_map(|pass| state.visit_for(pass)))
    }

    fn bind_slot_and_activate(
        &self,
        id: &PassId,
        now: DateTime<Utc>,
    ) -> Result<EntryOutcome, RepositoryError> {
        let mut state = self.state()?;

        let status = match state.passes.get(&id.0) {
            None => return Ok(EntryOutcome::PassMissing),
            Some(pass) => pass.status,
        };
        if status != PassStatus::Pending {
            return Ok(EntryOutcome::NotPending(status));
        }

        let slot_id = {
            let free = state
                .slots
                .values_mut()
                .find(|slot| slot.status == SlotStatus::Available);
            match free {
                None => return Ok(EntryOutcome::NoSlotAvailable),
                Some(slot) => {
                    slot.status = SlotStatus::Occupied;
                    slot.linked_pass_id = Some(*id);
                    slot.id
                }
            }
        };

        let pass = match state.passes.get_mut(&id.0) {
            Some(pass) => {
                pass.status = PassStatus::Active;
                pass.entry_time = Some(now);
                pass.clone()
            }
            None => {
                return Err(RepositoryError::Unavailable(
                    "pass row vanished mid-transition".to_string(),
                ))
            }
        };

        Ok(EntryOutcome::Granted { pass, slot_id })
    }

    fn release_slot_and_complete(
        &self,
        id: &PassId,
        now: DateTime<Utc>,
    ) -> Result<ExitOutcome, RepositoryError> {
        let mut state = self.state()?;

        let pass = match state.passes.get_mut(&id.0) {
            None => return Ok(ExitOutcome::PassMissing),
            Some(pass) if pass.status != PassStatus::Active => {
                return Ok(ExitOutcome::NotActive(pass.status))
            }
            Some(pass) => {
                pass.status = PassStatus::Completed;
                pass.exit_time = Some(now);
                pass.clone()
            }
        };

        for slot in state.slots.values_mut() {
            if slot.linked_pass_id == Some(*id) {
                slot.status = SlotStatus::Available;
                slot.linked_pass_id = None;
            }
        }

        Ok(ExitOutcome::Completed(pass))
    }

    fn cancel_pending(&self, id: &PassId) -> Result<CancelOutcome, RepositoryError> {
        let mut state = self.state()?;
        match state.passes.get_mut(&id.0) {
            None => Ok(CancelOutcome::PassMissing),
            Some(pass) if pass.status != PassStatus::Pending => {
                Ok(CancelOutcome::NotPending(pass.status))
            }
            Some(pass) => {
                pass.status = PassStatus::Completed;
                Ok(CancelOutcome::Cancelled(pass.clone()))
            }
        }
    }

    fn expire_pending(&self, id: &PassId) -> Result<Option<VisitorPass>, RepositoryError> {
        let mut state = self.state()?;
        match state.passes.get_mut(&id.0) {
            Some(pass) if pass.status == PassStatus::Pending => {
                pass.status = PassStatus::Expired;
                Ok(Some(pass.clone()))
            }
            _ => Ok(None),
        }
    }

    fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport, RepositoryError> {
        let mut state = self.state()?;
        let mut report = SweepReport::default();
        let mut released: Vec<PassId> = Vec::new();

        for pass in state.passes.values_mut() {
            if pass.expiry_time >= now {
                continue;
            }
            match pass.status {
                PassStatus::Pending => {
                    pass.status = PassStatus::Expired;
                    report.pending_expired += 1;
                }
                PassStatus::Active => {
                    pass.status = PassStatus::Expired;
                    report.active_expired += 1;
                    released.push(pass.id);
                }
                PassStatus::Completed | PassStatus::Expired => {}
            }
        }

        for slot in state.slots.values_mut() {
            if let Some(linked) = slot.linked_pass_id {
                if released.contains(&linked) {
                    slot.status = SlotStatus::Available;
                    slot.linked_pass_id = None;
                    report.slots_released += 1;
                }
            }
        }

        Ok(report)
    }

    fn settings(&self) -> Result<ParkingSettings, RepositoryError> {
        let state = self.state()?;
        Ok(state.settings)
    }

    fn update_settings(
        &self,
        settings: ParkingSettings,
    ) -> Result<SlotReconciliation, RepositoryError> {
        let mut state = self.state()?;
        state.settings = settings;

        let target = settings.max_active_slots as usize;
        let current = state.slots.len();
        let mut provisioned = 0;
        let mut removed = 0;

        if target > current {
            for _ in current..target {
                let id = state.next_slot_id;
                state.next_slot_id += 1;
                state.slots.insert(
                    id,
                    ParkingSlot {
                        id: SlotId(id),
                        status: SlotStatus::Available,
                        linked_pass_id: None,
                    },
                );
                provisioned += 1;
            }
        } else if target < current {
            // Shrink only the AVAILABLE surplus beyond the new maximum;
            // occupied slots stay and count against the deficit, so the pool
            // may legitimately remain above target while vehicles are parked.
            let available = state
                .slots
                .values()
                .filter(|slot| slot.status == SlotStatus::Available)
                .count();
            let surplus = available.saturating_sub(target);
            let removable: Vec<i64> = state
                .slots
                .values()
                .rev()
                .filter(|slot| slot.status == SlotStatus::Available)
                .take(surplus)
                .map(|slot| slot.id.0)
                .collect();
            for id in &removable {
                state.slots.remove(id);
            }
            removed = removable.len();
        }

        Ok(SlotReconciliation {
            provisioned,
            removed,
            pool_size: state.slots.len(),
        })
    }
}

impl CredentialVerifier for InMemoryPassStore {
    fn verify_resident(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Resident>, CredentialError> {
        let state = self
            .inner
            .lock()
            .map_err(|_| CredentialError::Unavailable("store mutex poisoned".to_string()))?;
        Ok(state
            .residents
            .values()
            .find(|record| {
                record.resident.email.eq_ignore_ascii_case(email) && record.password == password
            })
            .map(|record| record.resident.clone()))
    }

    fn verify_operator(&self, id: &str, password: &str) -> Result<bool, CredentialError> {
        Ok(self.operator.id == id && self.operator.password == password)
    }
}
