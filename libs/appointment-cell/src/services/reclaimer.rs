use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use shared_config::SchedulingConfig;
use shared_database::{AppState, ClinicStore};

use crate::models::{AppointmentError, ReclaimReport};

/// Periodically deletes appointments left unpaid past the grace period and
/// frees the slots they held.
pub struct UnpaidReclaimer {
    store: Arc<dyn ClinicStore>,
    grace: Duration,
    interval: StdDuration,
    running: Mutex<()>,
}

impl UnpaidReclaimer {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store), &state.config.scheduling)
    }

    pub fn with_store(store: Arc<dyn ClinicStore>, config: &SchedulingConfig) -> Self {
        Self {
            store,
            grace: Duration::minutes(config.unpaid_grace_minutes),
            interval: StdDuration::from_secs(config.reclaim_interval_seconds.max(1)),
            running: Mutex::new(()),
        }
    }

    pub async fn sweep(&self) -> Result<Option<ReclaimReport>, AppointmentError> {
        self.sweep_at(Utc::now()).await
    }

    /// Runs one sweep as of `now`. Returns `None` when another sweep is still
    /// in progress.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<Option<ReclaimReport>, AppointmentError> {
        let _running = match self.running.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Previous unpaid sweep still running, skipping");
                return Ok(None);
            }
        };
        self.reclaim(now).await.map(Some)
    }

    #[instrument(skip(self))]
    async fn reclaim(&self, now: DateTime<Utc>) -> Result<ReclaimReport, AppointmentError> {
        let cutoff = now - self.grace;
        let candidates = self.store.find_stale_unpaid(cutoff).await?;
        if candidates.is_empty() {
            return Ok(ReclaimReport::default());
        }

        let candidate_ids: Vec<Uuid> = candidates.iter().map(|a| a.id).collect();
        let mut tx = self.store.begin().await?;

        // Anything paid since the scan is left alone.
        let stale = tx.lock_unpaid_appointments(&candidate_ids).await?;
        if stale.is_empty() {
            return Ok(ReclaimReport::default());
        }
        let ids: Vec<Uuid> = stale.iter().map(|a| a.id).collect();

        let mut report = ReclaimReport {
            reclaimed: ids.clone(),
            ..ReclaimReport::default()
        };
        for appointment in &stale {
            if tx
                .release_binding(appointment.doctor_id, appointment.slot_id, appointment.id)
                .await?
            {
                report.released_bindings += 1;
            }
        }
        report.deleted_prescriptions = tx.delete_prescriptions(&ids).await?;
        report.deleted_reviews = tx.delete_reviews(&ids).await?;
        report.deleted_payments = tx.delete_payments(&ids).await?;
        tx.delete_appointments(&ids).await?;

        tx.commit().await?;

        info!(
            "Reclaimed {} unpaid appointments, released {} slots",
            report.reclaimed.len(),
            report.released_bindings
        );
        Ok(report)
    }

    /// Starts the periodic sweep on the current runtime. Ticks missed while a
    /// sweep runs are skipped.
    pub fn spawn(self: Arc<Self>) -> ReclaimerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let reclaimer = self;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reclaimer.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("Unpaid reclaimer started, every {:?}", reclaimer.interval);

            loop {
                tokio::select! {
                    // A sweep in flight finishes before shutdown is observed.
                    _ = ticker.tick() => {
                        match reclaimer.sweep().await {
                            Ok(Some(report)) if !report.is_empty() => {
                                debug!("Sweep report: {:?}", report);
                            }
                            Ok(_) => {}
                            Err(e) => error!("Unpaid sweep failed: {}", e),
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Unpaid reclaimer stopped");
        });

        ReclaimerHandle { shutdown, task }
    }
}

pub struct ReclaimerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ReclaimerHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!("Reclaimer task ended abnormally: {}", e);
        }
    }
}
