//! the cursor registry: allocates cursor ids, leases cursors exclusively for a reader, tracks
//! per-index counts against a cap, reclaims idle cursors, and disposes abandoned ones.
//!
//! modeled on the teacher's connection pool (`Mutex`-guarded map, RAII checkout guard) rather
//! than the source's manual detach-before-free dance: [`LeasedCursor`]'s `Drop` is the single
//! place a held [`Areq`] is either handed back to the registry or dropped for good, so the
//! request is freed exactly once regardless of which exit path (success, error, explicit
//! dispose, or an unwinding panic) is taken.

use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use crate::{
    areq::Areq,
    error::{CursorBusy, CursorCapExceeded, CursorNotFound, Error},
};

/// registry-wide defaults, analogous to the teacher's `PoolBuilder`.
#[derive(Debug, Clone, Copy)]
pub struct RegistryConfig {
    /// chunk size used when neither `COUNT` nor the request's own `chunk_size` is set.
    pub default_chunk_size: u32,
    /// idle window used when a cursor is reserved without an explicit `MAXIDLE`.
    pub default_max_idle: Duration,
    /// maximum live cursors per index.
    pub per_index_cap: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: 1000,
            default_max_idle: Duration::from_millis(300_000),
            per_index_cap: 128,
        }
    }
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_chunk_size(mut self, n: u32) -> Self {
        self.default_chunk_size = n;
        self
    }

    pub fn default_max_idle(mut self, d: Duration) -> Self {
        self.default_max_idle = d;
        self
    }

    pub fn per_index_cap(mut self, n: u32) -> Self {
        self.per_index_cap = n;
        self
    }
}

struct Slot {
    index: String,
    max_idle: Duration,
    last_used: Instant,
    /// `None` while leased out to a [`LeasedCursor`]; `Some` while `Paused`.
    areq: Option<Areq>,
}

struct Inner {
    slots: HashMap<i64, Slot>,
    counts: HashMap<String, u32>,
    next_id: i64,
}

/// process-wide cursor registry. the map and per-index counters are the only shared state
/// this crate has (§5); everything else is exclusive to whoever holds a lease.
pub struct Registry {
    inner: Mutex<Inner>,
    config: RegistryConfig,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                counts: HashMap::new(),
                next_id: 1,
            }),
            config,
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// reserve a new cursor for `index`, rejecting with [`CursorCapExceeded`] if that index is
    /// already at its configured cap. the returned guard is born leased to the caller.
    pub fn reserve(&self, index: impl Into<String>, areq: Areq, max_idle: Duration) -> Result<LeasedCursor<'_>, Error> {
        let index = index.into();
        let mut inner = self.inner.lock().unwrap();

        let count = inner.counts.get(&index).copied().unwrap_or(0);
        if count >= self.config.per_index_cap {
            return Err(CursorCapExceeded.into());
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.slots.insert(
            id,
            Slot {
                index: index.clone(),
                max_idle,
                last_used: Instant::now(),
                areq: None,
            },
        );
        *inner.counts.entry(index.clone()).or_insert(0) += 1;
        drop(inner);

        tracing::debug!(cursor_id = id, index = %index, "cursor reserved");
        Ok(LeasedCursor {
            registry: self,
            id,
            index,
            areq: Some(areq),
            disposed: false,
        })
    }

    /// atomically transition a `Paused` cursor to `Leased`. contention (the cursor is already
    /// leased to someone else) is a [`CursorBusy`] error, not a wait.
    pub fn take_for_execution(&self, id: i64) -> Result<LeasedCursor<'_>, Error> {
        let mut inner = self.inner.lock().unwrap();
        let slot = inner.slots.get_mut(&id).ok_or(CursorNotFound)?;
        let areq = slot.areq.take().ok_or(CursorBusy)?;
        let index = slot.index.clone();
        Ok(LeasedCursor {
            registry: self,
            id,
            index,
            areq: Some(areq),
            disposed: false,
        })
    }

    /// dispose a cursor on demand (`CURSOR DEL`). a cursor currently leased to another reader
    /// refuses with [`CursorBusy`] rather than blocking the caller (§5's documented policy
    /// choice, recorded in DESIGN.md).
    pub fn purge(&self, id: i64) -> Result<(), Error> {
        let mut inner = self.inner.lock().unwrap();
        match inner.slots.get(&id) {
            None => Err(CursorNotFound.into()),
            Some(slot) if slot.areq.is_none() => Err(CursorBusy.into()),
            Some(_) => {
                let slot = inner.slots.remove(&id).unwrap();
                decrement(&mut inner.counts, &slot.index);
                drop(inner);
                tracing::debug!(cursor_id = id, "cursor purged");
                Ok(())
            }
        }
    }

    /// dispose every `Paused` cursor whose idle window has expired. returns the count freed.
    pub fn collect_idle(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let now = Instant::now();
        let expired: Vec<i64> = inner
            .slots
            .iter()
            .filter(|(_, slot)| slot.areq.is_some() && now.duration_since(slot.last_used) >= slot.max_idle)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(slot) = inner.slots.remove(id) {
                decrement(&mut inner.counts, &slot.index);
            }
        }
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "idle cursors reclaimed");
        }
        expired.len()
    }

    /// live cursor count for `index`, for tests and diagnostics.
    pub fn count(&self, index: &str) -> u32 {
        self.inner.lock().unwrap().counts.get(index).copied().unwrap_or(0)
    }
}

fn decrement(counts: &mut HashMap<String, u32>, index: &str) {
    if let Some(c) = counts.get_mut(index) {
        *c = c.saturating_sub(1);
        if *c == 0 {
            counts.remove(index);
        }
    }
}

/// exclusive, single-threaded access grant to a leased cursor's [`Areq`] (§3's "Lease").
///
/// dropping this without calling [`LeasedCursor::dispose`] pauses the cursor (returns it to
/// the registry, `last_used` refreshed). calling `dispose` removes it from the registry and
/// drops the request once `self` itself drops.
pub struct LeasedCursor<'a> {
    registry: &'a Registry,
    id: i64,
    index: String,
    areq: Option<Areq>,
    disposed: bool,
}

impl LeasedCursor<'_> {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn areq(&self) -> &Areq {
        self.areq.as_ref().expect("areq present while leased")
    }

    pub fn areq_mut(&mut self) -> &mut Areq {
        self.areq.as_mut().expect("areq present while leased")
    }

    /// mark this cursor for removal; the registry slot and counter are updated when this
    /// guard drops.
    pub fn dispose(mut self) {
        self.disposed = true;
    }
}

impl Drop for LeasedCursor<'_> {
    fn drop(&mut self) {
        let mut inner = self.registry.inner.lock().unwrap();
        if self.disposed {
            if inner.slots.remove(&self.id).is_some() {
                decrement(&mut inner.counts, &self.index);
            }
            tracing::debug!(cursor_id = self.id, "cursor disposed");
            // self.areq drops here (or already did, if dispose() was called after taking it),
            // freeing the request exactly once.
        } else if let Some(areq) = self.areq.take() {
            if let Some(slot) = inner.slots.get_mut(&self.id) {
                slot.areq = Some(areq);
                slot.last_used = Instant::now();
            }
            // if the slot vanished underneath us (shouldn't happen: only this guard or
            // `purge`/`collect_idle` remove slots, and both require the areq to be present,
            // i.e. not leased), the request is simply dropped here instead of leaking.
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{flags::RequestFlags, index::VecIndexReader, row::RLookup};

    fn dummy_areq() -> Areq {
        crate::areq::AreqBuilder::new(RequestFlags::IS_SEARCH)
            .build(RLookup::new(), Box::new(VecIndexReader::new([])))
            .unwrap()
    }

    #[test]
    fn reserve_then_pause_then_take_again() {
        let reg = Registry::new(RegistryConfig::default());
        let cursor = reg.reserve("idx", dummy_areq(), Duration::from_secs(60)).unwrap();
        let id = cursor.id();
        assert_eq!(reg.count("idx"), 1);
        drop(cursor); // pauses

        let taken = reg.take_for_execution(id).unwrap();
        assert_eq!(taken.id(), id);
        drop(taken); // pauses again
        assert_eq!(reg.count("idx"), 1);
    }

    #[test]
    fn take_while_leased_is_busy() {
        let reg = Registry::new(RegistryConfig::default());
        let cursor = reg.reserve("idx", dummy_areq(), Duration::from_secs(60)).unwrap();
        let id = cursor.id();
        let err = reg.take_for_execution(id).unwrap_err();
        assert!(err.downcast_ref::<CursorBusy>().is_some());
        drop(cursor);
    }

    #[test]
    fn dispose_frees_the_slot_and_decrements_count() {
        let reg = Registry::new(RegistryConfig::default());
        let cursor = reg.reserve("idx", dummy_areq(), Duration::from_secs(60)).unwrap();
        let id = cursor.id();
        cursor.dispose();
        assert_eq!(reg.count("idx"), 0);
        let err = reg.take_for_execution(id).unwrap_err();
        assert!(err.downcast_ref::<CursorNotFound>().is_some());
    }

    #[test]
    fn purge_disposes_a_paused_cursor() {
        let reg = Registry::new(RegistryConfig::default());
        let cursor = reg.reserve("idx", dummy_areq(), Duration::from_secs(60)).unwrap();
        let id = cursor.id();
        drop(cursor);
        reg.purge(id).unwrap();
        assert_eq!(reg.count("idx"), 0);
        assert!(reg.purge(id).unwrap_err().downcast_ref::<CursorNotFound>().is_some());
    }

    #[test]
    fn purge_on_leased_cursor_is_busy_not_removed() {
        let reg = Registry::new(RegistryConfig::default());
        let cursor = reg.reserve("idx", dummy_areq(), Duration::from_secs(60)).unwrap();
        let id = cursor.id();
        assert!(reg.purge(id).unwrap_err().downcast_ref::<CursorBusy>().is_some());
        drop(cursor);
    }

    #[test]
    fn cap_exceeded_leaves_count_unchanged() {
        let reg = Registry::new(RegistryConfig::default().per_index_cap(1));
        let _c1 = reg.reserve("idx", dummy_areq(), Duration::from_secs(60)).unwrap();
        let err = reg.reserve("idx", dummy_areq(), Duration::from_secs(60)).unwrap_err();
        assert!(err.downcast_ref::<CursorCapExceeded>().is_some());
        assert_eq!(reg.count("idx"), 1);
    }

    #[test]
    fn idle_collection_reclaims_expired_paused_cursors() {
        let reg = Registry::new(RegistryConfig::default());
        let cursor = reg.reserve("idx", dummy_areq(), Duration::from_millis(1)).unwrap();
        drop(cursor);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(reg.collect_idle(), 1);
        assert_eq!(reg.collect_idle(), 0);
        assert_eq!(reg.count("idx"), 0);
    }
}
