use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use availability_cell::{
    day_of_week, generate_slots, Booking, BookingStatus, NewBooking, SchedulingStore,
    SlotQueryResult, StoreError,
};
use coordination_cell::{LockHandle, LockManager, SlotCache};
use shared_config::{AppConfig, CacheSettings, LockSettings, SchedulingPolicy};

use crate::error::SchedulingError;

const READ_RETRIES: u32 = 2;
const READ_RETRY_DELAY: Duration = Duration::from_millis(100);

fn lock_key(doctor_id: Uuid, date: NaiveDate) -> String {
    format!("sched:{}:{}", doctor_id, date)
}

/// Orchestrates slot queries and booking writes over the repository, the
/// distributed lock manager and the availability cache. Within one
/// doctor+date key, booking writes are serialized across the whole fleet
/// by the lock; reads only ever see bounded staleness.
pub struct SchedulingService {
    store: Arc<dyn SchedulingStore>,
    locks: Arc<dyn LockManager>,
    cache: Arc<dyn SlotCache>,
    policy: SchedulingPolicy,
    cache_settings: CacheSettings,
    lock_settings: LockSettings,
}

impl SchedulingService {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        locks: Arc<dyn LockManager>,
        cache: Arc<dyn SlotCache>,
        config: &AppConfig,
    ) -> Self {
        Self {
            store,
            locks,
            cache,
            policy: config.policy.clone(),
            cache_settings: config.cache.clone(),
            lock_settings: config.locks.clone(),
        }
    }

    /// Cache-first slot listing. On a miss the short doctor+date lock
    /// deduplicates the recompute across instances; browsing reads never
    /// need the lock for correctness.
    pub async fn query_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<SlotQueryResult, SchedulingError> {
        match self.cache.get(doctor_id, date).await {
            Ok(Some(hit)) => {
                debug!(%doctor_id, %date, "slot cache hit");
                return Ok(hit);
            }
            Ok(None) => {}
            Err(e) => warn!("slot cache read failed, recomputing: {}", e),
        }

        match self
            .locks
            .try_acquire(&lock_key(doctor_id, date), self.lock_settings.query_ttl)
            .await
        {
            Ok(Some(handle)) => {
                let computed = self.compute_slots(doctor_id, date).await;
                if let Ok(result) = &computed {
                    if let Err(e) = self.cache.put(result, self.cache_settings.slot_ttl).await {
                        warn!("failed to populate slot cache: {}", e);
                    }
                }
                if let Err(e) = self.locks.release(&handle).await {
                    warn!(key = %handle.key, "failed to release query lock: {}", e);
                }
                computed
            }
            Ok(None) => {
                // Another instance is computing the same grid; poll for
                // its result before falling back to an uncached compute.
                for _ in 0..self.lock_settings.busy_retries {
                    tokio::time::sleep(self.lock_settings.busy_retry_delay).await;
                    if let Ok(Some(hit)) = self.cache.get(doctor_id, date).await {
                        return Ok(hit);
                    }
                }
                debug!(%doctor_id, %date, "cache still cold after waiting, computing uncached");
                self.compute_slots(doctor_id, date).await
            }
            Err(e) => {
                warn!("lock tier unavailable for slot query, computing uncached: {}", e);
                self.compute_slots(doctor_id, date).await
            }
        }
    }

    /// Serialized booking write: lock, re-verify against fresh reads
    /// (never the cache), persist transactionally, invalidate, release.
    /// A lost race surfaces as `SlotUnavailable`; writes are never
    /// retried automatically.
    pub async fn book_slot(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Result<Booking, SchedulingError> {
        self.validate_booking_window(date, start_time)?;

        let key = lock_key(doctor_id, date);
        let handle = self.acquire_booking_lock(&key).await?;

        let outcome = self
            .book_slot_locked(doctor_id, patient_id, date, start_time)
            .await;

        if outcome.is_ok() {
            if let Err(e) = self.cache.invalidate(doctor_id, date).await {
                warn!("slot cache invalidation failed after booking: {}", e);
            }
        }
        if let Err(e) = self.locks.release(&handle).await {
            warn!(key = %handle.key, "failed to release booking lock: {}", e);
        }

        outcome
    }

    /// Cancellation needs no lock: it only ever adds availability, so a
    /// stale cache read degrades to conservative, never to overbooking.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        reason: Option<String>,
    ) -> Result<Booking, SchedulingError> {
        let booking = self
            .store
            .transition_booking(booking_id, BookingStatus::Cancelled, reason)
            .await?;

        if let Err(e) = self.cache.invalidate(booking.doctor_id, booking.date).await {
            warn!("slot cache invalidation failed after cancellation: {}", e);
        }

        info!(booking_id = %booking.id, doctor_id = %booking.doctor_id, "booking cancelled");
        Ok(booking)
    }

    pub async fn confirm_booking(&self, booking_id: Uuid) -> Result<Booking, SchedulingError> {
        let booking = self
            .store
            .transition_booking(booking_id, BookingStatus::Confirmed, None)
            .await?;

        info!(booking_id = %booking.id, "booking confirmed");
        Ok(booking)
    }

    pub async fn get_booking(&self, booking_id: Uuid) -> Result<Booking, SchedulingError> {
        Ok(self.store.get_booking(booking_id).await?)
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    async fn book_slot_locked(
        &self,
        doctor_id: Uuid,
        patient_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Result<Booking, SchedulingError> {
        let grid = self.compute_slots(doctor_id, date).await?;
        let slot = grid
            .slots
            .iter()
            .find(|slot| slot.start_time == start_time)
            .filter(|slot| slot.available);
        let Some(slot) = slot else {
            debug!(%doctor_id, %date, %start_time, "requested slot not free at re-verification");
            return Err(SchedulingError::SlotUnavailable);
        };

        let booking = self
            .store
            .insert_booking(NewBooking {
                doctor_id,
                patient_id,
                date,
                start_time: slot.start_time,
                end_time: slot.end_time,
            })
            .await?;

        info!(
            booking_id = %booking.id, %doctor_id, %patient_id, %date, %start_time,
            "booking created"
        );
        Ok(booking)
    }

    async fn acquire_booking_lock(&self, key: &str) -> Result<LockHandle, SchedulingError> {
        for attempt in 0..=self.lock_settings.busy_retries {
            match self
                .locks
                .try_acquire(key, self.lock_settings.booking_ttl)
                .await?
            {
                Some(handle) => return Ok(handle),
                None => {
                    debug!(key, attempt, "booking lock busy, backing off");
                    tokio::time::sleep(self.lock_settings.busy_retry_delay).await;
                }
            }
        }
        Err(SchedulingError::LockBusy)
    }

    async fn compute_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<SlotQueryResult, SchedulingError> {
        let weekday = day_of_week(date);
        let template = self
            .read_with_retry(|| self.store.active_template(doctor_id, weekday))
            .await?;
        let exceptions = self
            .read_with_retry(|| self.store.exceptions_for(doctor_id, date))
            .await?;
        let bookings = self
            .read_with_retry(|| self.store.blocking_bookings_for(doctor_id, date))
            .await?;

        let booked_starts: HashSet<NaiveTime> =
            bookings.iter().map(|booking| booking.start_time).collect();

        Ok(generate_slots(
            doctor_id,
            date,
            template.as_ref(),
            &exceptions,
            &booked_starts,
        ))
    }

    /// Bounded retry for repository reads only; an ambiguous write retry
    /// could double-book, so writes go through exactly once.
    async fn read_with_retry<'a, T>(
        &'a self,
        mut op: impl FnMut() -> Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>,
    ) -> Result<T, SchedulingError> {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Err(e) if e.is_transient() && attempt < READ_RETRIES => {
                    attempt += 1;
                    warn!("transient store error on read (attempt {}): {}", attempt, e);
                    tokio::time::sleep(READ_RETRY_DELAY * attempt).await;
                }
                Err(e) => return Err(e.into()),
                Ok(value) => return Ok(value),
            }
        }
    }

    fn validate_booking_window(
        &self,
        date: NaiveDate,
        start_time: NaiveTime,
    ) -> Result<(), SchedulingError> {
        let now = Utc::now().naive_utc();
        let starts_at = NaiveDateTime::new(date, start_time);

        if starts_at < now + ChronoDuration::hours(self.policy.min_notice_hours) {
            return Err(SchedulingError::Validation(format!(
                "bookings require at least {} hours notice",
                self.policy.min_notice_hours
            )));
        }

        if date > now.date() + ChronoDuration::days(self.policy.max_days_ahead) {
            return Err(SchedulingError::Validation(format!(
                "bookings can be made at most {} days ahead",
                self.policy.max_days_ahead
            )));
        }

        Ok(())
    }
}
