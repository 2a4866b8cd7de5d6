use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use shared_database::{AppState, ClinicStore, SlotQuery, StoreError};
use shared_models::pagination::Page;
use shared_models::schedule::Slot;

use crate::models::ScheduleError;

/// Reads and administrative removal of stored slots.
pub struct SlotCatalog {
    store: Arc<dyn ClinicStore>,
}

impl SlotCatalog {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn ClinicStore>) -> Self {
        Self { store }
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<Slot, ScheduleError> {
        self.store.find_slot(slot_id).await?.ok_or(ScheduleError::SlotNotFound)
    }

    pub async fn list_slots(&self, query: &SlotQuery) -> Result<Page<Slot>, ScheduleError> {
        Ok(self.store.list_slots(query).await?)
    }

    /// Removes a slot no doctor has booked, together with its free bindings.
    pub async fn delete_slot(&self, slot_id: Uuid) -> Result<Slot, ScheduleError> {
        let slot = self.get_slot(slot_id).await?;

        let mut tx = self.store.begin().await?;
        let bindings = tx.lock_slot_bindings(slot_id).await?;
        if bindings.iter().any(|binding| binding.is_booked) {
            warn!("Refusing to delete booked slot {}", slot_id);
            return Err(ScheduleError::SlotInUse);
        }
        for binding in &bindings {
            tx.delete_binding(binding.doctor_id, binding.slot_id).await?;
        }

        match tx.delete_slot(slot_id).await {
            Ok(true) => {}
            Ok(false) => return Err(ScheduleError::SlotNotFound),
            Err(StoreError::StillReferenced(_)) => return Err(ScheduleError::SlotInUse),
            Err(e) => return Err(e.into()),
        }
        tx.commit().await?;

        info!("Deleted slot {} and {} free bindings", slot_id, bindings.len());
        Ok(slot)
    }
}
