use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier wrapper for visitor passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PassId(pub i64);

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for parking slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotId(pub i64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier wrapper for residents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidentId(pub i64);

impl fmt::Display for ResidentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle states of a visitor pass.
///
/// A pass is born PENDING, moves at most once to ACTIVE, and ends in exactly
/// one of COMPLETED or EXPIRED. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PassStatus {
    Pending,
    Active,
    Completed,
    Expired,
}

impl PassStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PassStatus::Pending => "PENDING",
            PassStatus::Active => "ACTIVE",
            PassStatus::Completed => "COMPLETED",
            PassStatus::Expired => "EXPIRED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, PassStatus::Completed | PassStatus::Expired)
    }

    /// Parse a status filter value as sent on the wire (`?status=ACTIVE`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(PassStatus::Pending),
            "ACTIVE" => Some(PassStatus::Active),
            "COMPLETED" => Some(PassStatus::Completed),
            "EXPIRED" => Some(PassStatus::Expired),
            _ => None,
        }
    }
}

/// Occupancy states of a parking slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SlotStatus {
    Available,
    Occupied,
}

impl SlotStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SlotStatus::Available => "AVAILABLE",
            SlotStatus::Occupied => "OCCUPIED",
        }
    }
}

/// A resident of the community; owns zero or more passes.
///
/// Credentials are held by the storage backend and never serialized here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resident {
    pub id: ResidentId,
    pub name: String,
    pub email: String,
    pub flat_number: String,
}

/// A time-bounded authorization for one visitor vehicle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorPass {
    pub id: PassId,
    pub resident_id: ResidentId,
    pub visitor_name: String,
    pub vehicle_number: String,
    pub issue_time: DateTime<Utc>,
    pub expiry_time: DateTime<Utc>,
    pub status: PassStatus,
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_time: Option<DateTime<Utc>>,
    pub pass_code: Option<String>,
}

impl VisitorPass {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_time < now
    }
}

/// A unit of physical parking capacity.
///
/// OCCUPIED iff `linked_pass_id` references an ACTIVE pass; an AVAILABLE
/// slot always carries a cleared link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingSlot {
    pub id: SlotId,
    pub status: SlotStatus,
    pub linked_pass_id: Option<PassId>,
}

/// Singleton configuration the admin can change at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingSettings {
    pub max_duration_hours: u32,
    pub max_active_slots: u32,
}

impl Default for ParkingSettings {
    fn default() -> Self {
        Self {
            max_duration_hours: 4,
            max_active_slots: 3,
        }
    }
}

/// Operator (guard/admin) account checked by the credential port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorAccount {
    pub id: String,
    pub password: String,
}

/// Pass joined with the owning resident's public details.
#[derive(Debug, Clone, Serialize)]
pub struct PassWithResident {
    #[serde(flatten)]
    pub pass: VisitorPass,
    pub resident_name: String,
    pub flat_number: String,
}

/// An ACTIVE pass together with the slot it occupies.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveVisit {
    #[serde(flatten)]
    pub pass: VisitorPass,
    pub slot_id: SlotId,
}

/// Occupancy counters for the guard dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotCounts {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
}

/// Dashboard payload: pool counters plus everyone currently parked.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub slots: SlotCounts,
    pub parked: Vec<ActiveVisit>,
}

/// Result of granting entry: the activated pass and its assigned slot.
#[derive(Debug, Clone, Serialize)]
pub struct EntryGrant {
    pub pass: VisitorPass,
    pub slot_id: SlotId,
}

/// What one expiry sweep actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub pending_expired: usize,
    pub active_expired: usize,
    pub slots_released: usize,
}

impl SweepReport {
    pub fn expired_total(&self) -> usize {
        self.pending_expired + self.active_expired
    }

    pub fn is_empty(&self) -> bool {
        self.expired_total() == 0 && self.slots_released == 0
    }
}

/// How the slot pool moved after a settings write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotReconciliation {
    pub provisioned: usize,
    pub removed: usize,
    pub pool_size: usize,
}

/// Payload for pass creation. Fields stay optional so absent values surface
/// as a validation error instead of a deserialization rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePassRequest {
    #[serde(default)]
    pub resident_id: Option<i64>,
    #[serde(default)]
    pub visitor_name: Option<String>,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub duration_hours: Option<u32>,
}

/// Payload for pass validation at the gate. Accepts either key; the legacy
/// camelCase spellings are honored as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidatePassRequest {
    #[serde(default, alias = "passId")]
    pub pass_id: Option<Value>,
    #[serde(default, alias = "passCode")]
    pub pass_code: Option<String>,
}

impl ValidatePassRequest {
    /// The single lookup value: a numeric or string id wins over a code.
    pub fn lookup_value(&self) -> Option<String> {
        match &self.pass_id {
            Some(Value::Number(number)) => Some(number.to_string()),
            Some(Value::String(raw)) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
            _ => self
                .pass_code
                .as_ref()
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty()),
        }
    }
}

/// Payload for a settings write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub max_duration_hours: Option<u32>,
    #[serde(default)]
    pub max_active_slots: Option<u32>,
}

/// Applied settings plus the slot-pool adjustment they triggered.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsUpdate {
    pub settings: ParkingSettings,
    pub reconciliation: SlotReconciliation,
}

/// Alphabet for shareable pass codes; easily-confused glyphs (0/O/1/I) are
/// excluded.
pub const PASS_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a generated pass code.
pub const PASS_CODE_LENGTH: usize = 8;

/// Generate a shareable pass code from the unambiguous alphabet.
pub fn generate_pass_code() -> String {
    let mut rng = rand::thread_rng();
    (0..PASS_CODE_LENGTH)
        .map(|_| {
            let index = rng.gen_range(0..PASS_CODE_ALPHABET.len());
            PASS_CODE_ALPHABET[index] as char
        })
        .collect()
}
