use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::repository::{CredentialVerifier, PassRepository};
use super::service::PassLifecycleService;

/// The single background actor: a periodic task that expires timed-out
/// passes and frees the slots of expired ACTIVE ones.
///
/// Owned by the server process with an explicit spawn/shutdown lifecycle;
/// each tick performs one sweep call and holds no state of its own, so a
/// redundant or overlapping sweep is harmless.
pub struct ExpirySweeper {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ExpirySweeper {
    pub fn spawn<R, C>(service: Arc<PassLifecycleService<R, C>>, period: Duration) -> Self
    where
        R: PassRepository + 'static,
        C: CredentialVerifier + 'static,
    {
        let (stop, mut stopped) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match service.sweep_expirations(Utc::now()) {
                            Ok(report) if !report.is_empty() => info!(
                                pending_expired = report.pending_expired,
                                active_expired = report.active_expired,
                                slots_released = report.slots_released,
                                "expired timed-out passes"
                            ),
                            Ok(_) => debug!("expiry sweep found nothing to do"),
                            Err(err) => error!(error = %err, "expiry sweep failed"),
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self { stop, handle }
    }

    /// Signal the task to stop and wait for it to wind down.
    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.handle.await;
    }
}
