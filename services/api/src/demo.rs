use crate::infra::seed_store;
use chrono::Utc;
use clap::Args;
use std::sync::Arc;

use parkflow::config::AppConfig;
use parkflow::error::AppError;
use parkflow::passes::domain::{CreatePassRequest, UpdateSettingsRequest};
use parkflow::passes::{PassLifecycleService, PassServiceError};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Number of parking slots to provision for the walkthrough
    #[arg(long)]
    pub(crate) slots: Option<u32>,
    /// Pass duration in hours for the demo visitors
    #[arg(long)]
    pub(crate) duration_hours: Option<u32>,
    /// Skip the capacity reconciliation portion of the demo
    #[arg(long)]
    pub(crate) skip_settings: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        slots,
        duration_hours,
        skip_settings,
    } = args;

    let mut config = AppConfig::load()?;
    if let Some(slots) = slots {
        config.parking.max_active_slots = slots;
    }
    let duration_hours = duration_hours
        .unwrap_or(2)
        .min(config.parking.max_duration_hours);

    let store = Arc::new(seed_store(&config));
    let service = Arc::new(PassLifecycleService::new(store.clone(), store));

    println!("Visitor parking pass demo");
    println!(
        "Pool: {} slots | duration ceiling {} h",
        config.parking.max_active_slots, config.parking.max_duration_hours
    );

    let residents = match service.list_residents() {
        Ok(residents) => residents,
        Err(err) => {
            println!("  Resident directory unavailable: {err}");
            return Ok(());
        }
    };
    println!("\nResident directory");
    for resident in &residents {
        println!("- {} ({}) <{}>", resident.name, resident.flat_number, resident.email);
    }
    let Some(host) = residents.first() else {
        println!("  No residents seeded; nothing to demonstrate");
        return Ok(());
    };

    println!("\nIssue and validate");
    let now = Utc::now();
    let pass = match service.create_pass(
        CreatePassRequest {
            resident_id: Some(host.id.0),
            visitor_name: Some("Dinesh".to_string()),
            vehicle_number: Some("KA01AB1234".to_string()),
            duration_hours: Some(duration_hours),
        },
        now,
    ) {
        Ok(pass) => pass,
        Err(err) => {
            println!("  Pass creation rejected: {err}");
            return Ok(());
        }
    };
    let code = pass.pass_code.clone().unwrap_or_else(|| pass.id.to_string());
    println!(
        "- Pass {} issued for {} -> code {} (expires {})",
        pass.id, pass.vehicle_number, code, pass.expiry_time
    );

    match service.validate_pass(&code, Utc::now()) {
        Ok(view) => println!(
            "- Gate validation: visitor of {} at flat {}",
            view.resident_name, view.flat_number
        ),
        Err(err) => println!("- Gate validation failed: {err}"),
    }

    println!("\nEntry, search, exit");
    let slot_id = match service.allow_entry(&pass.id, Utc::now()) {
        Ok(grant) => {
            println!("- Entry granted: slot {}", grant.slot_id);
            grant.slot_id
        }
        Err(err) => {
            println!("- Entry refused: {err}");
            return Ok(());
        }
    };

    match service.search_active("ka01") {
        Ok(Some(visit)) => println!(
            "- Search 'ka01': {} parked in slot {}",
            visit.pass.vehicle_number, visit.slot_id
        ),
        Ok(None) => println!("- Search 'ka01': no parked vehicle matched"),
        Err(err) => println!("- Search unavailable: {err}"),
    }

    show_occupancy(&service);

    // Fill the rest of the pool so the refusal path is visible.
    let mut overflow_shown = false;
    for (index, resident) in residents.iter().cycle().skip(1).enumerate() {
        let extra = match service.create_pass(
            CreatePassRequest {
                resident_id: Some(resident.id.0),
                visitor_name: Some(format!("Guest {}", index + 2)),
                vehicle_number: Some(format!("MH12CD{:04}", 5678 + index)),
                duration_hours: Some(duration_hours),
            },
            Utc::now(),
        ) {
            Ok(pass) => pass,
            Err(err) => {
                println!("- Additional pass rejected: {err}");
                break;
            }
        };
        match service.allow_entry(&extra.id, Utc::now()) {
            Ok(grant) => println!(
                "- Entry granted: {} -> slot {}",
                extra.vehicle_number, grant.slot_id
            ),
            Err(PassServiceError::CapacityExhausted) => {
                println!(
                    "- Entry refused for {}: no parking slots available",
                    extra.vehicle_number
                );
                overflow_shown = true;
                break;
            }
            Err(err) => {
                println!("- Entry failed: {err}");
                break;
            }
        }
    }
    if !overflow_shown {
        println!("- Pool never filled; raise --slots to see a refusal");
    }

    match service.mark_exit(&pass.id, Utc::now()) {
        Ok(completed) => println!(
            "- Exit marked for pass {} (slot {} released at {})",
            completed.id,
            slot_id,
            completed.exit_time.map_or_else(String::new, |t| t.to_string())
        ),
        Err(err) => println!("- Exit failed: {err}"),
    }

    println!("\nExpiry sweep");
    let overdue = match service.create_pass(
        CreatePassRequest {
            resident_id: Some(host.id.0),
            visitor_name: Some("Late visitor".to_string()),
            vehicle_number: Some("TN07EF9012".to_string()),
            duration_hours: Some(1),
        },
        Utc::now() - chrono::Duration::hours(3),
    ) {
        Ok(pass) => Some(pass),
        Err(err) => {
            println!("- Overdue pass not created: {err}");
            None
        }
    };
    match service.sweep_expirations(Utc::now()) {
        Ok(report) => println!(
            "- Sweep expired {} pending and {} active passes, releasing {} slots",
            report.pending_expired, report.active_expired, report.slots_released
        ),
        Err(err) => println!("- Sweep failed: {err}"),
    }
    if let Some(overdue) = overdue {
        match service.validate_pass(&overdue.id.to_string(), Utc::now()) {
            Err(err) => println!("- Validating the overdue pass now reports: {err}"),
            Ok(_) => println!("- Overdue pass unexpectedly validated"),
        }
    }

    if skip_settings {
        return Ok(());
    }

    println!("\nCapacity reconciliation");
    match service.update_settings(UpdateSettingsRequest {
        max_duration_hours: Some(config.parking.max_duration_hours),
        max_active_slots: Some(1),
    }) {
        Ok(update) => println!(
            "- Target 1 slot: provisioned {}, removed {}, pool now {} (occupied slots are never deleted)",
            update.reconciliation.provisioned,
            update.reconciliation.removed,
            update.reconciliation.pool_size
        ),
        Err(err) => println!("- Settings update failed: {err}"),
    }
    show_occupancy(&service);

    Ok(())
}

fn show_occupancy<R, C>(service: &PassLifecycleService<R, C>)
where
    R: parkflow::passes::repository::PassRepository + 'static,
    C: parkflow::passes::repository::CredentialVerifier + 'static,
{
    match service.dashboard() {
        Ok(snapshot) => {
            println!(
                "- Occupancy: {}/{} slots in use, {} available",
                snapshot.slots.occupied, snapshot.slots.total, snapshot.slots.available
            );
            for visit in &snapshot.parked {
                println!(
                    "  - slot {}: {} ({})",
                    visit.slot_id, visit.pass.vehicle_number, visit.pass.visitor_name
                );
            }
        }
        Err(err) => println!("- Dashboard unavailable: {err}"),
    }
}
