//! In-memory lease engine.
//!
//! One mutex guards the whole pool: the acquire scan has to see every slot at a
//! single instant, and renew's check-then-extend must not interleave with a
//! concurrent acquire reclaiming the same slot.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::clock::{Clock, SystemClock};
use super::record::{LeaseRecord, WORKER_ID_END};
use super::LeaseError;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub lease_duration: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lease_duration: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl EngineConfig {
    pub fn with_lease_duration(mut self, lease_duration: Duration) -> Self {
        self.lease_duration = lease_duration;
        self
    }
}

struct Pool {
    slots: Vec<LeaseRecord>,
    last_granted: usize,
}

/// Authoritative pool of worker-id leases.
pub struct LeaseEngine {
    pool: Mutex<Pool>,
    lease_duration: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl LeaseEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let slots = (0..WORKER_ID_END as u16)
            .map(|id| {
                if id == 0 {
                    LeaseRecord::reserved(id)
                } else {
                    LeaseRecord::unused(id)
                }
            })
            .collect();

        Self {
            pool: Mutex::new(Pool {
                slots,
                last_granted: 0,
            }),
            lease_duration: TimeDelta::from_std(config.lease_duration).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    pub fn lease_duration(&self) -> TimeDelta {
        self.lease_duration
    }

    // Every mutation completes before the guard drops, so a poisoned pool is still consistent.
    fn lock(&self) -> MutexGuard<'_, Pool> {
        self.pool.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Lease pool mutex poisoned - recovering");
            poisoned.into_inner()
        })
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.lease_duration)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Grant the slot whose lease expired longest ago.
    ///
    /// The scan starts just after the previously granted slot and wraps once around
    /// the pool. On ties the first slot in scan order wins.
    pub fn acquire(&self) -> Result<LeaseRecord, LeaseError> {
        let mut pool = self.lock();
        let start = pool.last_granted;

        let mut oldest = (start + 1) % WORKER_ID_END;
        for offset in 2..=WORKER_ID_END {
            let idx = (start + offset) % WORKER_ID_END;
            if pool.slots[idx].expire_at < pool.slots[oldest].expire_at {
                oldest = idx;
            }
        }

        let now = self.clock.now();
        if pool.slots[oldest].expire_at >= now {
            tracing::debug!("All worker ids are leased");
            return Err(LeaseError::PoolExhausted);
        }

        let expire_at = self.expiry_from(now);
        let slot = &mut pool.slots[oldest];
        slot.released_at = now;
        slot.expire_at = expire_at;
        let granted = *slot;
        pool.last_granted = oldest;

        tracing::debug!(id = granted.id, expire_at = %granted.expire_at, "Granted worker id");
        Ok(granted)
    }

    /// Extend a held lease by one lease duration from now.
    pub fn renew(&self, id: i64) -> Result<LeaseRecord, LeaseError> {
        let idx = slot_index(id)?;
        let mut pool = self.lock();

        let now = self.clock.now();
        if pool.slots[idx].expire_at < now {
            tracing::debug!(id, "Renew rejected - lease not held");
            return Err(LeaseError::InvalidLease);
        }

        let expire_at = self.expiry_from(now);
        let slot = &mut pool.slots[idx];
        slot.expire_at = expire_at;
        Ok(*slot)
    }

    /// Return a held lease to the pool immediately.
    pub fn release(&self, id: i64) -> Result<(), LeaseError> {
        let idx = slot_index(id)?;
        let mut pool = self.lock();

        let now = self.clock.now();
        if pool.slots[idx].expire_at < now {
            tracing::debug!(id, "Release rejected - lease not held");
            return Err(LeaseError::InvalidLease);
        }

        pool.slots[idx].expire_at = now
            .checked_sub_signed(TimeDelta::nanoseconds(1))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        tracing::debug!(id, "Released worker id");
        Ok(())
    }

    /// Number of non-reserved ids currently leased.
    pub fn held_count(&self) -> usize {
        let pool = self.lock();
        let now = self.clock.now();
        pool.slots[1..]
            .iter()
            .filter(|slot| slot.is_valid_at(now))
            .count()
    }
}

/// Map a caller-supplied id to a slot index. The reserved slot is never addressable.
fn slot_index(id: i64) -> Result<usize, LeaseError> {
    if id <= 0 || id >= WORKER_ID_END as i64 {
        return Err(LeaseError::InvalidLease);
    }
    Ok(id as usize)
}
