//! Per-user daily usage quotas backed by a shared counter store.
//!
//! Two independent meters are tracked per user and calendar day: approximate
//! completion tokens and whole seconds of transcribed audio. Counters live
//! under date-suffixed keys (`completion:<user>:<YYYY-MM-DD>`) that expire at
//! the end of the day they were written on, so a new day starts fresh with no
//! cleanup job.
//!
//! # Check/record vs. reserve
//!
//! [`QuotaTracker::check_allowance`] and [`QuotaTracker::record_usage`] are
//! the classic two-step protocol: a read-only prediction followed by an
//! unconditional commit. Two concurrent requests from the same user can both
//! pass the check against a not-yet-updated counter, so the daily limit is
//! soft under that protocol; the overage is bounded by the number of
//! in-flight requests times the per-request estimate.
//!
//! [`QuotaTracker::check_and_reserve`] closes that race: the comparison and
//! the increment run as one atomic operation on the store, a denied hold
//! surfaces as [`crate::SavvyError::QuotaExceeded`], and the returned
//! [`Reservation`] is later reconciled with the actual billed amount via
//! [`QuotaTracker::commit`] (or returned via [`QuotaTracker::cancel`] when
//! the billed call failed). Under the reserve protocol the only residual
//! overage is the actual-vs-estimate delta of a single committed call.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use savvybot::quota::{Meter, QuotaLimits, QuotaTracker};
//! use savvybot::quota::store::MemoryCounterStore;
//!
//! # async fn demo() -> savvybot::Result<()> {
//! let tracker = QuotaTracker::new(Arc::new(MemoryCounterStore::new()), QuotaLimits::default());
//!
//! let reservation = tracker.check_and_reserve(Meter::Completion, 42, 5).await?;
//! // ... call the billed API, observe 9 actual tokens ...
//! tracker.commit(reservation, 9).await?;
//! # Ok(())
//! # }
//! ```

pub mod estimate;
pub mod store;

use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveTime};
use tracing::debug;

use crate::error::{Result, SavvyError};
use store::CounterStore;

/// Default daily completion budget in approximate LLM tokens.
pub const DAILY_COMPLETION_TOKEN_LIMIT: u64 = 10_000;

/// Default daily transcription budget in whole seconds of audio.
pub const DAILY_TRANSCRIPTION_SECOND_LIMIT: u64 = 180;

/// One of the two independently tracked resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Meter {
    /// Approximate LLM tokens consumed by chat completions.
    Completion,
    /// Whole seconds of audio sent for transcription.
    Transcription,
}

impl Meter {
    /// Key namespace prefix for this meter.
    pub fn prefix(&self) -> &'static str {
        match self {
            Meter::Completion => "completion",
            Meter::Transcription => "transcription",
        }
    }

    /// Human-readable unit name, used in log lines and error messages.
    pub fn unit(&self) -> &'static str {
        match self {
            Meter::Completion => "tokens",
            Meter::Transcription => "seconds",
        }
    }
}

/// Daily limits for both meters. Configuration may override the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaLimits {
    pub completion_tokens: u64,
    pub transcription_seconds: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            completion_tokens: DAILY_COMPLETION_TOKEN_LIMIT,
            transcription_seconds: DAILY_TRANSCRIPTION_SECOND_LIMIT,
        }
    }
}

impl QuotaLimits {
    /// The daily limit for `meter`.
    pub fn limit(&self, meter: Meter) -> u64 {
        match meter {
            Meter::Completion => self.completion_tokens,
            Meter::Transcription => self.transcription_seconds,
        }
    }
}

/// A hold taken against a meter's daily budget by
/// [`QuotaTracker::check_and_reserve`].
///
/// Must be handed back to the tracker exactly once, either through
/// [`QuotaTracker::commit`] with the actual billed amount or through
/// [`QuotaTracker::cancel`] when the billed call never happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    meter: Meter,
    key: String,
    estimate: u64,
}

impl Reservation {
    pub fn meter(&self) -> Meter {
        self.meter
    }

    /// The estimated amount held by this reservation.
    pub fn estimate(&self) -> u64 {
        self.estimate
    }
}

/// Gates and records per-user, per-day resource consumption.
///
/// The tracker keeps no in-process state (every counter lives in the
/// injected [`CounterStore`]), so it is safe to call from any number of
/// concurrent tasks.
#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn CounterStore>,
    limits: QuotaLimits,
}

impl std::fmt::Debug for QuotaTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaTracker")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn CounterStore>, limits: QuotaLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> QuotaLimits {
        self.limits
    }

    /// Read-only prediction: would spending `requested` stay within the
    /// daily limit? A key that has never been written counts as zero.
    ///
    /// A store failure propagates as [`crate::SavvyError::Store`]; it never
    /// silently decays into an allow or a deny.
    pub async fn check_allowance(&self, meter: Meter, user_id: i64, requested: u64) -> Result<bool> {
        let key = self.today_key(meter, user_id);
        let current = self.store.get(&key).await?.unwrap_or(0);
        Ok(current.saturating_add(requested) <= self.limits.limit(meter))
    }

    /// Unconditionally add `actual` to today's counter and refresh its
    /// expiry to the end of the day.
    ///
    /// This commits even when the result exceeds the limit (soft-limit
    /// semantics). Pair with [`Self::check_allowance`] before
    /// spending budget, or use [`Self::check_and_reserve`] to make the gate
    /// atomic.
    pub async fn record_usage(&self, meter: Meter, user_id: i64, actual: u64) -> Result<()> {
        let today = Local::now().date_naive();
        let key = counter_key(meter, user_id, today);
        let value = self
            .store
            .incr_by(&key, actual as i64, end_of_day_unix(today))
            .await?;
        debug!(
            user_id,
            meter = meter.prefix(),
            recorded = actual,
            total = value,
            "usage recorded"
        );
        Ok(())
    }

    /// Atomically check the allowance and hold `estimate` against it.
    ///
    /// On success the estimate is already counted, so a concurrent request
    /// from the same user sees it immediately. A hold that would push
    /// today's counter past the limit returns
    /// [`crate::SavvyError::QuotaExceeded`] and leaves the counter (and its
    /// expiry) untouched.
    pub async fn check_and_reserve(
        &self,
        meter: Meter,
        user_id: i64,
        estimate: u64,
    ) -> Result<Reservation> {
        let today = Local::now().date_naive();
        let key = counter_key(meter, user_id, today);
        let limit = self.limits.limit(meter);
        let out = self
            .store
            .conditional_incr(&key, estimate, limit, end_of_day_unix(today))
            .await?;
        if !out.applied {
            debug!(
                user_id,
                meter = meter.prefix(),
                requested = estimate,
                used = out.value,
                limit,
                "reservation denied"
            );
            return Err(SavvyError::QuotaExceeded(format!(
                "user {} is over the daily {} limit ({} of {} {} used)",
                user_id,
                meter.prefix(),
                out.value,
                limit,
                meter.unit(),
            )));
        }
        Ok(Reservation {
            meter,
            key,
            estimate,
        })
    }

    /// Reconcile a reservation with the amount the API actually billed.
    ///
    /// Adjusts the counter by `actual - estimate` (in either direction) and
    /// refreshes the expiry. When the estimate was exact there is nothing to
    /// do and no store round trip is made.
    pub async fn commit(&self, reservation: Reservation, actual: u64) -> Result<()> {
        let delta = actual as i64 - reservation.estimate as i64;
        if delta == 0 {
            return Ok(());
        }
        let today = Local::now().date_naive();
        let value = self
            .store
            .incr_by(&reservation.key, delta, end_of_day_unix(today))
            .await?;
        debug!(
            meter = reservation.meter.prefix(),
            delta,
            total = value,
            "reservation committed"
        );
        Ok(())
    }

    /// Return a reservation's full estimate to the budget. Used when the
    /// billed call failed and nothing was consumed.
    pub async fn cancel(&self, reservation: Reservation) -> Result<()> {
        let today = Local::now().date_naive();
        self.store
            .incr_by(
                &reservation.key,
                -(reservation.estimate as i64),
                end_of_day_unix(today),
            )
            .await?;
        debug!(
            meter = reservation.meter.prefix(),
            released = reservation.estimate,
            "reservation cancelled"
        );
        Ok(())
    }

    /// Today's accumulated usage for a meter. Zero when nothing was recorded.
    pub async fn usage(&self, meter: Meter, user_id: i64) -> Result<u64> {
        let key = self.today_key(meter, user_id);
        Ok(self.store.get(&key).await?.unwrap_or(0))
    }

    fn today_key(&self, meter: Meter, user_id: i64) -> String {
        counter_key(meter, user_id, Local::now().date_naive())
    }
}

/// Key for a (meter, user, day) counter: `<meter>:<user_id>:<YYYY-MM-DD>`.
///
/// The date suffix partitions counters by day; combined with the end-of-day
/// expiry there is nothing to clean up when the day rolls over.
pub(crate) fn counter_key(meter: Meter, user_id: i64, date: NaiveDate) -> String {
    format!("{}:{}:{}", meter.prefix(), user_id, date.format("%Y-%m-%d"))
}

/// Unix timestamp of the last representable instant of `date` in host-local
/// time (23:59:59.999999).
pub(crate) fn end_of_day_unix(date: NaiveDate) -> i64 {
    let end = date.and_time(
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).expect("valid end-of-day time"),
    );
    end.and_local_timezone(Local)
        .latest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| end.and_utc().timestamp())
}
