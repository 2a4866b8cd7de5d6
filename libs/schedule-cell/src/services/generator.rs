use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, info, instrument};

use shared_config::SchedulingConfig;
use shared_database::{AppState, ClinicStore};
use shared_models::schedule::Slot;

use crate::models::{CreateScheduleRequest, ScheduleError, ScheduleWindow, DATE_FORMAT, TIME_FORMAT};

/// Width of every slot in the catalog. Fixed so stored ranges never overlap.
pub const SLOT_INTERVAL_MINUTES: i64 = 30;

/// Expands a date range and a daily time window into fixed-width slots.
pub struct SlotGenerator {
    store: Arc<dyn ClinicStore>,
    config: SchedulingConfig,
}

impl SlotGenerator {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store), state.config.scheduling.clone())
    }

    pub fn with_store(store: Arc<dyn ClinicStore>, config: SchedulingConfig) -> Self {
        Self { store, config }
    }

    pub fn parse_window(&self, request: &CreateScheduleRequest) -> Result<ScheduleWindow, ScheduleError> {
        let start_date = parse_date("start_date", &request.start_date)?;
        let end_date = parse_date("end_date", &request.end_date)?;
        let start_time = parse_time("start_time", &request.start_time)?;
        let end_time = parse_time("end_time", &request.end_time)?;

        if end_date < start_date {
            return Err(ScheduleError::Validation("end_date must not be before start_date".to_string()));
        }
        if end_time <= start_time {
            return Err(ScheduleError::Validation("end_time must be after start_time".to_string()));
        }

        let window = ScheduleWindow { start_date, end_date, start_time, end_time };
        if window.days() > self.config.max_schedule_days {
            return Err(ScheduleError::Validation(format!(
                "Date range spans {} days, at most {} allowed",
                window.days(),
                self.config.max_schedule_days
            )));
        }
        Ok(window)
    }

    /// Creates every missing slot of the window in one transaction and returns
    /// the new ones ordered by start. Ranges already stored are skipped.
    #[instrument(skip(self, request))]
    pub async fn generate_slots(&self, request: &CreateScheduleRequest) -> Result<Vec<Slot>, ScheduleError> {
        let window = self.parse_window(request)?;
        let interval = Duration::minutes(SLOT_INTERVAL_MINUTES);

        let mut tx = self.store.begin().await?;
        let mut created = Vec::new();
        let mut skipped = 0usize;

        for day in window.start_date.iter_days().take(window.days() as usize) {
            let mut cursor = day.and_time(window.start_time).and_utc();
            let window_end = day.and_time(window.end_time).and_utc();

            // A trailing partial interval is dropped.
            while cursor + interval <= window_end {
                match tx.insert_slot_if_absent(cursor, cursor + interval).await? {
                    Some(slot) => created.push(slot),
                    None => skipped += 1,
                }
                cursor += interval;
            }
        }

        tx.commit().await?;

        created.sort_by_key(|slot| slot.start_date_time);
        debug!("Skipped {} slots that already existed", skipped);
        info!("Generated {} slots over {} days", created.len(), window.days());
        Ok(created)
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ScheduleError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ScheduleError::Validation(format!("{} must be a YYYY-MM-DD date, got '{}'", field, value)))
}

fn parse_time(field: &str, value: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT)
        .map_err(|_| ScheduleError::Validation(format!("{} must be an HH:MM time, got '{}'", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_database::InMemoryStore;

    fn generator() -> SlotGenerator {
        SlotGenerator::with_store(Arc::new(InMemoryStore::new()), SchedulingConfig::default())
    }

    fn request(start_date: &str, end_date: &str, start_time: &str, end_time: &str) -> CreateScheduleRequest {
        CreateScheduleRequest {
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
        }
    }

    #[test]
    fn parse_window_rejects_bad_input() {
        let generator = generator();
        assert_matches!(
            generator.parse_window(&request("2030-13-01", "2030-13-01", "09:00", "10:00")),
            Err(ScheduleError::Validation(_))
        );
        assert_matches!(
            generator.parse_window(&request("2030-01-02", "2030-01-01", "09:00", "10:00")),
            Err(ScheduleError::Validation(_))
        );
        assert_matches!(
            generator.parse_window(&request("2030-01-01", "2030-01-01", "10:00", "10:00")),
            Err(ScheduleError::Validation(_))
        );
        assert_matches!(
            generator.parse_window(&request("2030-01-01", "2032-01-01", "09:00", "10:00")),
            Err(ScheduleError::Validation(_))
        );
    }

    #[test]
    fn window_counts_days_inclusively() {
        let window = generator()
            .parse_window(&request("2030-01-01", "2030-01-03", "09:00", "10:00"))
            .unwrap();
        assert_eq!(window.days(), 3);
    }
}
