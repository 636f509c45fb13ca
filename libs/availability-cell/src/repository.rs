use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use diesel::prelude::{Insertable, Queryable, Selectable};
use diesel::result::DatabaseErrorKind;
use diesel::{ExpressionMethods, OptionalExtension, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    AvailabilityTemplate, Booking, BookingStatus, NewBooking, UnavailabilityException,
};
use crate::schema::{availability_templates, bookings, unavailability_exceptions};
use shared_pool::{PoolError, PoolManager, ResourcePool};

/// Booking statuses that have released their slot.
const RELEASED_STATUSES: [&str; 3] = ["cancelled", "no_show", "rescheduled"];

// ==============================================================================
// DATA ACCESS SEAM
// ==============================================================================

/// The single typed data-access abstraction for the scheduling engine.
/// One interface, parameterized by query, instead of one repository class
/// per table.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    /// The active recurring template for a doctor on a weekday, if any.
    async fn active_template(
        &self,
        doctor_id: Uuid,
        day_of_week: i16,
    ) -> Result<Option<AvailabilityTemplate>, StoreError>;

    async fn exceptions_for(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<UnavailabilityException>, StoreError>;

    /// Bookings still occupying a slot on the given date.
    async fn blocking_bookings_for(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, StoreError>;

    /// Persist a new `scheduled` booking inside one transaction. The
    /// exact-start exclusivity check runs inside the same transaction, so
    /// a lost race rolls back wholly and surfaces `SlotTaken`.
    async fn insert_booking(&self, candidate: NewBooking) -> Result<Booking, StoreError>;

    /// Apply a status transition under the booking state machine. Illegal
    /// moves surface `InvalidTransition` without writing.
    async fn transition_booking(
        &self,
        booking_id: Uuid,
        next: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking, StoreError>;
}

// ==============================================================================
// POSTGRES IMPLEMENTATION
// ==============================================================================

pub struct PgManager {
    database_url: String,
}

impl PgManager {
    pub fn new(database_url: &str) -> Self {
        Self { database_url: database_url.to_string() }
    }
}

#[async_trait]
impl PoolManager for PgManager {
    type Resource = AsyncPgConnection;

    async fn create(&self) -> Result<AsyncPgConnection, PoolError> {
        AsyncPgConnection::establish(&self.database_url)
            .await
            .map_err(|e| PoolError::Resource(format!("postgres connect failed: {}", e)))
    }

    async fn validate(&self, conn: &mut AsyncPgConnection) -> bool {
        diesel::sql_query("SELECT 1").execute(conn).await.is_ok()
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct BookingRow {
    id: Uuid,
    doctor_id: Uuid,
    patient_id: Uuid,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: String,
    rescheduled_to: Option<Uuid>,
    cancel_reason: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::from_str(&row.status)
            .map_err(StoreError::DataIntegrity)?;
        Ok(Booking {
            id: row.id,
            doctor_id: row.doctor_id,
            patient_id: row.patient_id,
            date: row.date,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            rescheduled_to: row.rescheduled_to,
            cancel_reason: row.cancel_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::bookings)]
struct NewBookingRow {
    id: Uuid,
    doctor_id: Uuid,
    patient_id: Uuid,
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    status: String,
}

pub struct PgSchedulingStore {
    pool: ResourcePool<PgManager>,
    call_deadline: Duration,
}

impl PgSchedulingStore {
    pub fn new(pool: ResourcePool<PgManager>, call_deadline: Duration) -> Self {
        Self { pool, call_deadline }
    }

    /// Acquire a connection and run one round-trip under the per-call
    /// deadline, so a stalled backend fails the call instead of pinning a
    /// lock holder. A timed-out connection may carry an abandoned
    /// statement or open transaction, so it is discarded, not reused.
    async fn with_conn<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: for<'c> FnOnce(
            &'c mut AsyncPgConnection,
        )
            -> Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'c>>,
    {
        let mut conn = self.pool.acquire().await?;
        match tokio::time::timeout(self.call_deadline, work(&mut *conn)).await {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!("database call exceeded its deadline, discarding connection");
                conn.discard();
                Err(StoreError::Timeout {
                    deadline_ms: self.call_deadline.as_millis() as u64,
                })
            }
        }
    }
}

#[async_trait]
impl SchedulingStore for PgSchedulingStore {
    async fn active_template(
        &self,
        doctor_id: Uuid,
        day_of_week: i16,
    ) -> Result<Option<AvailabilityTemplate>, StoreError> {
        let template = self
            .with_conn(|conn| {
                Box::pin(async move {
                    availability_templates::table
                        .filter(availability_templates::doctor_id.eq(doctor_id))
                        .filter(availability_templates::day_of_week.eq(day_of_week))
                        .filter(availability_templates::is_active.eq(true))
                        .order(availability_templates::updated_at.desc())
                        .select(AvailabilityTemplate::as_select())
                        .first(conn)
                        .await
                        .optional()
                        .map_err(StoreError::from)
                })
            })
            .await?;

        if let Some(template) = &template {
            if !template.is_well_formed() {
                warn!(
                    %doctor_id, template_id = %template.id,
                    "ignoring malformed availability template"
                );
                return Ok(None);
            }
        }

        Ok(template)
    }

    async fn exceptions_for(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<UnavailabilityException>, StoreError> {
        self.with_conn(|conn| {
            Box::pin(async move {
                unavailability_exceptions::table
                    .filter(unavailability_exceptions::doctor_id.eq(doctor_id))
                    .filter(unavailability_exceptions::date.eq(date))
                    .order(unavailability_exceptions::created_at.asc())
                    .select(UnavailabilityException::as_select())
                    .load(conn)
                    .await
                    .map_err(StoreError::from)
            })
        })
        .await
    }

    async fn blocking_bookings_for(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, StoreError> {
        let rows: Vec<BookingRow> = self
            .with_conn(|conn| {
                Box::pin(async move {
                    bookings::table
                        .filter(bookings::doctor_id.eq(doctor_id))
                        .filter(bookings::date.eq(date))
                        .filter(bookings::status.ne_all(RELEASED_STATUSES.to_vec()))
                        .order(bookings::start_time.asc())
                        .select(BookingRow::as_select())
                        .load(conn)
                        .await
                        .map_err(StoreError::from)
                })
            })
            .await?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, StoreError> {
        let row: Option<BookingRow> = self
            .with_conn(|conn| {
                Box::pin(async move {
                    bookings::table
                        .find(booking_id)
                        .select(BookingRow::as_select())
                        .first(conn)
                        .await
                        .optional()
                        .map_err(StoreError::from)
                })
            })
            .await?;

        row.ok_or(StoreError::BookingNotFound(booking_id))
            .and_then(Booking::try_from)
    }

    async fn insert_booking(&self, candidate: NewBooking) -> Result<Booking, StoreError> {
        let row = self
            .with_conn(|conn| {
                Box::pin(async move {
                    conn.transaction(move |conn| {
                        Box::pin(async move {
                            let taken: i64 = bookings::table
                                .filter(bookings::doctor_id.eq(candidate.doctor_id))
                                .filter(bookings::date.eq(candidate.date))
                                .filter(bookings::start_time.eq(candidate.start_time))
                                .filter(bookings::status.ne_all(RELEASED_STATUSES.to_vec()))
                                .count()
                                .get_result(conn)
                                .await?;
                            if taken > 0 {
                                return Err(StoreError::SlotTaken {
                                    date: candidate.date,
                                    start_time: candidate.start_time,
                                });
                            }

                            let inserted = diesel::insert_into(bookings::table)
                                .values(NewBookingRow {
                                    id: Uuid::new_v4(),
                                    doctor_id: candidate.doctor_id,
                                    patient_id: candidate.patient_id,
                                    date: candidate.date,
                                    start_time: candidate.start_time,
                                    end_time: candidate.end_time,
                                    status: BookingStatus::Scheduled.as_str().to_string(),
                                })
                                .returning(BookingRow::as_returning())
                                .get_result(conn)
                                .await
                                .map_err(|e| match e {
                                    diesel::result::Error::DatabaseError(
                                        DatabaseErrorKind::UniqueViolation,
                                        _,
                                    ) => StoreError::SlotTaken {
                                        date: candidate.date,
                                        start_time: candidate.start_time,
                                    },
                                    other => StoreError::from(other),
                                })?;

                            Ok::<BookingRow, StoreError>(inserted)
                        })
                    })
                    .await
                })
            })
            .await?;

        debug!(booking_id = %row.id, "booking row persisted");
        Booking::try_from(row)
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        next: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking, StoreError> {
        let row = self
            .with_conn(|conn| {
                Box::pin(async move {
                    conn.transaction(move |conn| {
                        Box::pin(async move {
                            let current: Option<BookingRow> = bookings::table
                                .find(booking_id)
                                .for_update()
                                .select(BookingRow::as_select())
                                .first(conn)
                                .await
                                .optional()?;
                            let current =
                                current.ok_or(StoreError::BookingNotFound(booking_id))?;

                            let from = BookingStatus::from_str(&current.status)
                                .map_err(StoreError::DataIntegrity)?;
                            if !from.can_transition_to(&next) {
                                return Err(StoreError::InvalidTransition { from, to: next });
                            }

                            let updated = match reason {
                                Some(reason) => {
                                    diesel::update(bookings::table.find(booking_id))
                                        .set((
                                            bookings::status.eq(next.as_str()),
                                            bookings::cancel_reason.eq(reason),
                                            bookings::updated_at.eq(diesel::dsl::now),
                                        ))
                                        .returning(BookingRow::as_returning())
                                        .get_result(conn)
                                        .await?
                                }
                                None => {
                                    diesel::update(bookings::table.find(booking_id))
                                        .set((
                                            bookings::status.eq(next.as_str()),
                                            bookings::updated_at.eq(diesel::dsl::now),
                                        ))
                                        .returning(BookingRow::as_returning())
                                        .get_result(conn)
                                        .await?
                                }
                            };

                            Ok::<BookingRow, StoreError>(updated)
                        })
                    })
                    .await
                })
            })
            .await?;

        debug!(booking_id = %row.id, status = %row.status, "booking status updated");
        Booking::try_from(row)
    }
}
