use core::{
    cell::Cell,
    sync::atomic::{AtomicBool, Ordering},
};

use critical_section::Mutex;

use crate::Error;

/// Identifies one arming of a [`DeadlineGuard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AlarmId(u32);

/// A one-shot alarm provided by the platform.
///
/// When an alarm scheduled with `id` runs out, the platform must call
/// [`DeadlineGuard::expire`] with that same `id` from its own context. The guard ignores
/// expiries for ids it no longer considers armed, so cancellation may be best effort.
pub trait Alarm {
    /// Schedule the expiry of `id` in `after_ms` milliseconds.
    ///
    /// Returns [`Error::SchedulingFailure`] when no timer is available.
    fn schedule(&mut self, id: AlarmId, after_ms: u32) -> Result<(), Error>;

    /// De-schedule `id` if it has not fired yet.
    fn cancel(&mut self, id: AlarmId);
}

/// Bounds the wait for an echo.
///
/// At most one deadline is armed at a time and `expired` is raised at most once per arming.
/// The expiry side only ever stores into the flag, which keeps it usable from interrupt
/// context on cores without atomic read-modify-write.
pub struct DeadlineGuard {
    pending: Mutex<Cell<Option<AlarmId>>>,
    next_id: Mutex<Cell<u32>>,
    expired: AtomicBool,
}

impl DeadlineGuard {
    /// Returns a disarmed guard, usable in a `static`.
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(Cell::new(None)),
            next_id: Mutex::new(Cell::new(0)),
            expired: AtomicBool::new(false),
        }
    }

    /// Schedule a deadline `horizon_ms` from now.
    ///
    /// Returns [`Error::AlreadyArmed`] while a deadline is pending, or the alarm's error if it
    /// could not schedule, in which case the guard stays disarmed.
    pub fn arm<A: Alarm>(&self, alarm: &mut A, horizon_ms: u32) -> Result<AlarmId, Error> {
        let id = critical_section::with(|cs| {
            let pending = self.pending.borrow(cs);
            if pending.get().is_some() {
                return Err(Error::AlreadyArmed);
            }
            let next_id = self.next_id.borrow(cs);
            let id = AlarmId(next_id.get());
            next_id.set(id.0.wrapping_add(1));
            self.expired.store(false, Ordering::Release);
            // Pending before scheduling, the alarm may fire before `schedule` returns.
            pending.set(Some(id));
            Ok(id)
        })?;

        if let Err(e) = alarm.schedule(id, horizon_ms) {
            critical_section::with(|cs| self.pending.borrow(cs).set(None));
            return Err(e);
        }
        Ok(id)
    }

    /// Expiry callback. A no-op unless `id` is the deadline currently armed.
    pub fn expire(&self, id: AlarmId) {
        critical_section::with(|cs| {
            let pending = self.pending.borrow(cs);
            if pending.get() == Some(id) {
                pending.set(None);
                self.expired.store(true, Ordering::Release);
            }
        });
    }

    /// Returns whether the armed deadline ran out before it was cancelled.
    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    /// Returns whether a deadline is pending.
    pub fn is_armed(&self) -> bool {
        critical_section::with(|cs| self.pending.borrow(cs).get()).is_some()
    }

    /// Disarm the pending deadline, if any. Idempotent.
    ///
    /// Returns whether a pending deadline was actually disarmed. Once this returns, a late
    /// expiry of the disarmed id can no longer raise the flag.
    pub fn cancel<A: Alarm>(&self, alarm: &mut A) -> bool {
        match critical_section::with(|cs| self.pending.borrow(cs).take()) {
            Some(id) => {
                alarm.cancel(id);
                true
            }
            None => false,
        }
    }

    /// Lower the expired flag so it cannot leak into the next cycle.
    pub fn clear(&self) {
        self.expired.store(false, Ordering::Release);
    }
}

impl Default for DeadlineGuard {
    fn default() -> Self {
        Self::new()
    }
}
