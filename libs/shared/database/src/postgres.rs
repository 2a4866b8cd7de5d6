use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::appointment::{Appointment, AppointmentStatus, Payment, PaymentStatus, Prescription, Review};
use shared_models::pagination::{Page, Pagination};
use shared_models::people::{Doctor, Patient};
use shared_models::schedule::{DoctorSchedule, DoctorSlotBinding, Slot};

use crate::error::StoreError;
use crate::query::{AppointmentQuery, ScheduleQuery, SlotQuery};
use crate::store::{ClinicStore, StoreResult, StoreTransaction};

const APPOINTMENT_COLUMNS: &str =
    "id, patient_id, doctor_id, slot_id, status, payment_status, video_calling_id, created_at, updated_at";
const SLOT_COLUMNS: &str = "id, start_date_time, end_date_time, created_at";
const SLOT_GENERATION_LOCK: i64 = 0x736c_6f74;
const BINDING_COLUMNS: &str = "doctor_id, slot_id, is_booked, appointment_id, created_at";

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => StoreError::UniqueViolation(db.message().to_string()),
                Some("23503") => StoreError::StillReferenced(db.message().to_string()),
                // serialization_failure, deadlock_detected, lock_not_available
                Some("40001") | Some("40P01") | Some("55P03") => StoreError::Transient(db.message().to_string()),
                _ => StoreError::Backend(error.to_string()),
            },
            sqlx::Error::RowNotFound => StoreError::RowNotFound(error.to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Transient(error.to_string())
            }
            _ => StoreError::Backend(error.to_string()),
        }
    }
}

fn decode_err(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

fn slot_from_row(row: &PgRow) -> Result<Slot, sqlx::Error> {
    Ok(Slot {
        id: row.try_get("id")?,
        start_date_time: row.try_get("start_date_time")?,
        end_date_time: row.try_get("end_date_time")?,
        created_at: row.try_get("created_at")?,
    })
}

fn binding_from_row(row: &PgRow) -> Result<DoctorSlotBinding, sqlx::Error> {
    Ok(DoctorSlotBinding {
        doctor_id: row.try_get("doctor_id")?,
        slot_id: row.try_get("slot_id")?,
        is_booked: row.try_get("is_booked")?,
        appointment_id: row.try_get("appointment_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn schedule_from_row(row: &PgRow) -> Result<DoctorSchedule, sqlx::Error> {
    Ok(DoctorSchedule {
        binding: DoctorSlotBinding {
            doctor_id: row.try_get("doctor_id")?,
            slot_id: row.try_get("slot_id")?,
            is_booked: row.try_get("is_booked")?,
            appointment_id: row.try_get("appointment_id")?,
            created_at: row.try_get("binding_created_at")?,
        },
        slot: Slot {
            id: row.try_get("slot_id")?,
            start_date_time: row.try_get("start_date_time")?,
            end_date_time: row.try_get("end_date_time")?,
            created_at: row.try_get("slot_created_at")?,
        },
    })
}

fn appointment_from_row(row: &PgRow) -> Result<Appointment, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    Ok(Appointment {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        doctor_id: row.try_get("doctor_id")?,
        slot_id: row.try_get("slot_id")?,
        status: status.parse().map_err(decode_err)?,
        payment_status: payment_status.parse().map_err(decode_err)?,
        video_calling_id: row.try_get("video_calling_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Payment {
        id: row.try_get("id")?,
        appointment_id: row.try_get("appointment_id")?,
        amount: row.try_get("amount")?,
        transaction_id: row.try_get("transaction_id")?,
        status: status.parse().map_err(decode_err)?,
        gateway_reference: row.try_get("gateway_reference")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn prescription_from_row(row: &PgRow) -> Result<Prescription, sqlx::Error> {
    Ok(Prescription {
        id: row.try_get("id")?,
        appointment_id: row.try_get("appointment_id")?,
        doctor_id: row.try_get("doctor_id")?,
        patient_id: row.try_get("patient_id")?,
        instructions: row.try_get("instructions")?,
        follow_up_date: row.try_get("follow_up_date")?,
        created_at: row.try_get("created_at")?,
    })
}

fn review_from_row(row: &PgRow) -> Result<Review, sqlx::Error> {
    Ok(Review {
        id: row.try_get("id")?,
        appointment_id: row.try_get("appointment_id")?,
        doctor_id: row.try_get("doctor_id")?,
        patient_id: row.try_get("patient_id")?,
        rating: row.try_get("rating")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
    })
}

fn doctor_from_row(row: &PgRow) -> Result<Doctor, sqlx::Error> {
    Ok(Doctor {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        appointment_fee: row.try_get("appointment_fee")?,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
    })
}

fn patient_from_row(row: &PgRow) -> Result<Patient, sqlx::Error> {
    Ok(Patient {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        is_deleted: row.try_get("is_deleted")?,
        created_at: row.try_get("created_at")?,
    })
}

fn push_slot_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &SlotQuery) {
    qb.push(" WHERE TRUE");
    if let Some(from) = query.start_from {
        qb.push(" AND start_date_time >= ").push_bind(from);
    }
    if let Some(until) = query.end_until {
        qb.push(" AND end_date_time <= ").push_bind(until);
    }
    if let Some(doctor_id) = query.exclude_bound_to {
        qb.push(" AND id NOT IN (SELECT slot_id FROM doctor_schedules WHERE doctor_id = ")
            .push_bind(doctor_id)
            .push(")");
    }
}

fn push_schedule_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ScheduleQuery) {
    qb.push(" FROM doctor_schedules b JOIN slots s ON s.id = b.slot_id WHERE b.doctor_id = ")
        .push_bind(query.doctor_id);
    if let Some(is_booked) = query.is_booked {
        qb.push(" AND b.is_booked = ").push_bind(is_booked);
    }
    if let Some(from) = query.start_from {
        qb.push(" AND s.start_date_time >= ").push_bind(from);
    }
    if let Some(until) = query.end_until {
        qb.push(" AND s.end_date_time <= ").push_bind(until);
    }
}

fn push_appointment_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &AppointmentQuery) {
    qb.push(" WHERE TRUE");
    if let Some(patient_id) = query.patient_id {
        qb.push(" AND patient_id = ").push_bind(patient_id);
    }
    if let Some(doctor_id) = query.doctor_id {
        qb.push(" AND doctor_id = ").push_bind(doctor_id);
    }
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(payment_status) = query.payment_status {
        qb.push(" AND payment_status = ").push_bind(payment_status.as_str());
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, pagination: Pagination) {
    qb.push(" LIMIT ")
        .push_bind(pagination.limit as i64)
        .push(" OFFSET ")
        .push_bind(pagination.skip() as i64);
}

/// Postgres-backed store. Bookings serialize on `SELECT ... FOR UPDATE` of the
/// binding row; unique indexes are the backstop.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }
}

#[async_trait]
impl ClinicStore for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        debug!("Postgres transaction opened");
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn find_patient_by_email(&self, email: &str) -> StoreResult<Option<Patient>> {
        let row = sqlx::query("SELECT id, name, email, is_deleted, created_at FROM patients WHERE email = $1 AND is_deleted = false")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(patient_from_row).transpose()?)
    }

    async fn find_doctor(&self, doctor_id: Uuid) -> StoreResult<Option<Doctor>> {
        let row = sqlx::query("SELECT id, name, email, appointment_fee, is_deleted, created_at FROM doctors WHERE id = $1")
            .bind(doctor_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(doctor_from_row).transpose()?)
    }

    async fn find_doctor_by_email(&self, email: &str) -> StoreResult<Option<Doctor>> {
        let row = sqlx::query("SELECT id, name, email, appointment_fee, is_deleted, created_at FROM doctors WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(doctor_from_row).transpose()?)
    }

    async fn find_slot(&self, slot_id: Uuid) -> StoreResult<Option<Slot>> {
        let row = sqlx::query(&format!("SELECT {} FROM slots WHERE id = $1", SLOT_COLUMNS))
            .bind(slot_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(slot_from_row).transpose()?)
    }

    async fn list_slots(&self, query: &SlotQuery) -> StoreResult<Page<Slot>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM slots");
        push_slot_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM slots", SLOT_COLUMNS));
        push_slot_filters(&mut select, query);
        select.push(format!(" ORDER BY {} {}, id", query.sort_by.column(), query.sort_order.as_sql()));
        push_page(&mut select, query.pagination);
        let rows = select.build().fetch_all(&self.pool).await?;
        let slots = rows.iter().map(slot_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(query.pagination, total as u64, slots))
    }

    async fn find_binding(&self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<Option<DoctorSlotBinding>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM doctor_schedules WHERE doctor_id = $1 AND slot_id = $2",
            BINDING_COLUMNS
        ))
        .bind(doctor_id)
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(binding_from_row).transpose()?)
    }

    async fn list_doctor_schedules(&self, query: &ScheduleQuery) -> StoreResult<Page<DoctorSchedule>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*)");
        push_schedule_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT b.doctor_id, b.slot_id, b.is_booked, b.appointment_id, b.created_at AS binding_created_at, \
             s.start_date_time, s.end_date_time, s.created_at AS slot_created_at",
        );
        push_schedule_filters(&mut select, query);
        select.push(format!(" ORDER BY s.{} {}, s.id", query.sort_by.column(), query.sort_order.as_sql()));
        push_page(&mut select, query.pagination);
        let rows = select.build().fetch_all(&self.pool).await?;
        let schedules = rows.iter().map(schedule_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(query.pagination, total as u64, schedules))
    }

    async fn find_appointment(&self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        let row = sqlx::query(&format!("SELECT {} FROM appointments WHERE id = $1", APPOINTMENT_COLUMNS))
            .bind(appointment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(appointment_from_row).transpose()?)
    }

    async fn list_appointments(&self, query: &AppointmentQuery) -> StoreResult<Page<Appointment>> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM appointments");
        push_appointment_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM appointments", APPOINTMENT_COLUMNS));
        push_appointment_filters(&mut select, query);
        select.push(format!(" ORDER BY {} {}, id", query.sort_by.column(), query.sort_order.as_sql()));
        push_page(&mut select, query.pagination);
        let rows = select.build().fetch_all(&self.pool).await?;
        let appointments = rows.iter().map(appointment_from_row).collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(query.pagination, total as u64, appointments))
    }

    async fn find_stale_unpaid(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE payment_status = 'UNPAID' AND created_at <= $1",
            APPOINTMENT_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(appointment_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_payment(&self, appointment_id: Uuid) -> StoreResult<Option<Payment>> {
        let row = sqlx::query(
            "SELECT id, appointment_id, amount, transaction_id, status, gateway_reference, created_at, updated_at \
             FROM payments WHERE appointment_id = $1",
        )
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(payment_from_row).transpose()?)
    }

    async fn find_prescription(&self, appointment_id: Uuid) -> StoreResult<Option<Prescription>> {
        let row = sqlx::query(
            "SELECT id, appointment_id, doctor_id, patient_id, instructions, follow_up_date, created_at \
             FROM prescriptions WHERE appointment_id = $1",
        )
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(prescription_from_row).transpose()?)
    }

    async fn find_review(&self, appointment_id: Uuid) -> StoreResult<Option<Review>> {
        let row = sqlx::query(
            "SELECT id, appointment_id, doctor_id, patient_id, rating, comment, created_at \
             FROM reviews WHERE appointment_id = $1",
        )
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(review_from_row).transpose()?)
    }

    async fn list_patient_prescriptions(&self, patient_id: Uuid, pagination: Pagination) -> StoreResult<Page<Prescription>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM prescriptions WHERE patient_id = $1")
            .bind(patient_id)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query(
            "SELECT id, appointment_id, doctor_id, patient_id, instructions, follow_up_date, created_at \
             FROM prescriptions WHERE patient_id = $1 ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
        )
        .bind(patient_id)
        .bind(pagination.limit as i64)
        .bind(pagination.skip() as i64)
        .fetch_all(&self.pool)
        .await?;
        let prescriptions = rows.iter().map(prescription_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(pagination, total as u64, prescriptions))
    }
}

/// Read committed plus row locks: a second booker blocks on the binding row and
/// then sees the committed `is_booked = true`.
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn insert_slot_if_absent(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> StoreResult<Option<Slot>> {
        // Serializes slot generation for the rest of this transaction.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SLOT_GENERATION_LOCK)
            .execute(&mut *self.tx)
            .await?;

        let row = sqlx::query(&format!(
            "INSERT INTO slots (id, start_date_time, end_date_time, created_at) \
             SELECT $1, $2, $3, $4 \
             WHERE NOT EXISTS (SELECT 1 FROM slots WHERE start_date_time < $3 AND end_date_time > $2) \
             ON CONFLICT (start_date_time, end_date_time) DO NOTHING RETURNING {}",
            SLOT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(start)
        .bind(end)
        .bind(Utc::now())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.as_ref().map(slot_from_row).transpose()?)
    }

    async fn delete_slot(&mut self, slot_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM slots WHERE id = $1")
            .bind(slot_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_binding(&mut self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<DoctorSlotBinding> {
        let row = sqlx::query(&format!(
            "INSERT INTO doctor_schedules (doctor_id, slot_id, is_booked, created_at) VALUES ($1, $2, false, $3) \
             RETURNING {}",
            BINDING_COLUMNS
        ))
        .bind(doctor_id)
        .bind(slot_id)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(binding_from_row(&row)?)
    }

    async fn lock_binding(&mut self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<Option<DoctorSlotBinding>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM doctor_schedules WHERE doctor_id = $1 AND slot_id = $2 FOR UPDATE",
            BINDING_COLUMNS
        ))
        .bind(doctor_id)
        .bind(slot_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.as_ref().map(binding_from_row).transpose()?)
    }

    async fn lock_slot_bindings(&mut self, slot_id: Uuid) -> StoreResult<Vec<DoctorSlotBinding>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM doctor_schedules WHERE slot_id = $1 FOR UPDATE",
            BINDING_COLUMNS
        ))
        .bind(slot_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.iter().map(binding_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn delete_binding(&mut self, doctor_id: Uuid, slot_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM doctor_schedules WHERE doctor_id = $1 AND slot_id = $2")
            .bind(doctor_id)
            .bind(slot_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_binding_booked(&mut self, doctor_id: Uuid, slot_id: Uuid, appointment_id: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE doctor_schedules SET is_booked = true, appointment_id = $3 WHERE doctor_id = $1 AND slot_id = $2",
        )
        .bind(doctor_id)
        .bind(slot_id)
        .bind(appointment_id)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("doctor_schedules ({}, {})", doctor_id, slot_id)));
        }
        Ok(())
    }

    async fn release_binding(&mut self, doctor_id: Uuid, slot_id: Uuid, appointment_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE doctor_schedules SET is_booked = false, appointment_id = NULL \
             WHERE doctor_id = $1 AND slot_id = $2 AND appointment_id = $3",
        )
        .bind(doctor_id)
        .bind(slot_id)
        .bind(appointment_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_appointment(&mut self, appointment: &Appointment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO appointments (id, patient_id, doctor_id, slot_id, status, payment_status, video_calling_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(appointment.id)
        .bind(appointment.patient_id)
        .bind(appointment.doctor_id)
        .bind(appointment.slot_id)
        .bind(appointment.status.as_str())
        .bind(appointment.payment_status.as_str())
        .bind(&appointment.video_calling_id)
        .bind(appointment.created_at)
        .bind(appointment.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn lock_appointment(&mut self, appointment_id: Uuid) -> StoreResult<Option<Appointment>> {
        let row = sqlx::query(&format!("SELECT {} FROM appointments WHERE id = $1 FOR UPDATE", APPOINTMENT_COLUMNS))
            .bind(appointment_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.as_ref().map(appointment_from_row).transpose()?)
    }

    async fn update_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Appointment> {
        let row = sqlx::query(&format!(
            "UPDATE appointments SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .bind(status.as_str())
        .bind(at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::RowNotFound(format!("appointment {}", appointment_id)))?;
        Ok(appointment_from_row(&row)?)
    }

    async fn update_payment_status(
        &mut self,
        appointment_id: Uuid,
        status: PaymentStatus,
        gateway_reference: Option<&str>,
        at: DateTime<Utc>,
    ) -> StoreResult<Appointment> {
        let result = sqlx::query(
            "UPDATE payments SET status = $2, updated_at = $3, gateway_reference = COALESCE($4, gateway_reference) \
             WHERE appointment_id = $1",
        )
        .bind(appointment_id)
        .bind(status.as_str())
        .bind(at)
        .bind(gateway_reference)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound(format!("payment for appointment {}", appointment_id)));
        }

        let row = sqlx::query(&format!(
            "UPDATE appointments SET payment_status = $2, updated_at = $3 WHERE id = $1 RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .bind(status.as_str())
        .bind(at)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| StoreError::RowNotFound(format!("appointment {}", appointment_id)))?;
        Ok(appointment_from_row(&row)?)
    }

    async fn lock_unpaid_appointments(&mut self, appointment_ids: &[Uuid]) -> StoreResult<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE id = ANY($1) AND payment_status = 'UNPAID' FOR UPDATE",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.iter().map(appointment_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payments (id, appointment_id, amount, transaction_id, status, gateway_reference, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(payment.id)
        .bind(payment.appointment_id)
        .bind(payment.amount)
        .bind(&payment.transaction_id)
        .bind(payment.status.as_str())
        .bind(payment.gateway_reference.as_deref())
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_prescription(&mut self, prescription: &Prescription) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO prescriptions (id, appointment_id, doctor_id, patient_id, instructions, follow_up_date, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(prescription.id)
        .bind(prescription.appointment_id)
        .bind(prescription.doctor_id)
        .bind(prescription.patient_id)
        .bind(&prescription.instructions)
        .bind(prescription.follow_up_date)
        .bind(prescription.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_prescriptions(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM prescriptions WHERE appointment_id = ANY($1)")
            .bind(appointment_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_reviews(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM reviews WHERE appointment_id = ANY($1)")
            .bind(appointment_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_payments(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM payments WHERE appointment_id = ANY($1)")
            .bind(appointment_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_appointments(&mut self, appointment_ids: &[Uuid]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM appointments WHERE id = ANY($1)")
            .bind(appointment_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        debug!("Postgres transaction committed");
        Ok(())
    }
}
