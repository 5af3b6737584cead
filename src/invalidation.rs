//! Per-control cache state, batched invalidation and the render guard.
//!
//! Property setters call `request_invalidation`. Requests accumulate in a
//! queue and a short coalescing timer drains them in one pass, so a burst
//! of mutations from a single input tick produces one notification per
//! distinct parent rather than one per mutation.
//!
//! Rendering goes through `with_cache_protection`: a non-blocking
//! try-acquire on the control's render guard. A caller that loses the race
//! gets its fallback immediately. The guard is an RAII value, so it is
//! released on success, on error and while unwinding from a panic.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use ratatui::buffer::Buffer;

use crate::dirty::{DirtyScope, DirtyTracker};
use crate::error::{CoreError, CoreResult};
use crate::ids::{ControlId, Owner, WindowId};

bitflags! {
    /// Why a control's cached content went stale.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InvalidationReason: u16 {
        const CONTENT = 1 << 0;
        const LAYOUT = 1 << 1;
        const STYLE = 1 << 2;
        const FOCUS = 1 << 3;
        const SELECTION = 1 << 4;
        /// A child changed and this container must recompose.
        const CHILDREN = 1 << 5;
        const VISIBILITY = 1 << 6;
    }
}

/// Point-in-time copy of a control's cache flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSnapshot {
    pub is_valid: bool,
    pub is_rendering: bool,
    pub reasons: InvalidationReason,
    pub last_invalidated: Option<Instant>,
}

#[derive(Debug, Default)]
struct CacheCell {
    valid: bool,
    rendering: bool,
    reasons: InvalidationReason,
    last_invalidated: Option<Instant>,
    /// Bumped on every invalidation so a render that started before an
    /// invalidation does not mark the newer state valid.
    generation: u64,
    content: Option<Arc<Buffer>>,
}

#[derive(Debug, Default)]
pub struct CacheState {
    cell: RwLock<CacheCell>,
}

impl CacheState {
    fn snapshot(&self) -> CacheSnapshot {
        let cell = self.cell.read();
        CacheSnapshot {
            is_valid: cell.valid,
            is_rendering: cell.rendering,
            reasons: cell.reasons,
            last_invalidated: cell.last_invalidated,
        }
    }

    fn invalidate(&self, reasons: InvalidationReason) {
        let mut cell = self.cell.write();
        cell.valid = false;
        cell.reasons |= reasons;
        cell.last_invalidated = Some(Instant::now());
        cell.generation = cell.generation.wrapping_add(1);
    }

    fn valid_content(&self) -> Option<Arc<Buffer>> {
        let cell = self.cell.read();
        if cell.valid {
            cell.content.clone()
        } else {
            None
        }
    }

    fn content(&self) -> Option<Arc<Buffer>> {
        self.cell.read().content.clone()
    }

    fn generation(&self) -> u64 {
        self.cell.read().generation
    }

    fn store(&self, content: Arc<Buffer>, generation: u64) {
        let mut cell = self.cell.write();
        cell.content = Some(content);
        if cell.generation == generation {
            cell.valid = true;
            cell.reasons = InvalidationReason::empty();
        }
    }

    fn mark_valid(&self) {
        let mut cell = self.cell.write();
        cell.valid = true;
        cell.reasons = InvalidationReason::empty();
    }

    /// Compare-and-set `rendering` from false to true.
    fn try_begin_render(&self) -> bool {
        let mut cell = self.cell.write();
        if cell.rendering {
            return false;
        }
        cell.rendering = true;
        true
    }

    fn end_render(&self) {
        self.cell.write().rendering = false;
    }
}

/// Held for the duration of one render attempt.
struct RenderGuard<'a> {
    cache: &'a CacheState,
}

impl<'a> RenderGuard<'a> {
    /// `None` when someone else holds the guard. No guard value exists on
    /// that path, so nothing is dropped and the holder keeps its claim.
    fn acquire(cache: &'a CacheState) -> Option<Self> {
        if cache.try_begin_render() {
            Some(Self { cache })
        } else {
            None
        }
    }
}

impl Drop for RenderGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.cache.invalidate(InvalidationReason::all());
        }
        self.cache.end_render();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationRequest {
    pub control: ControlId,
    pub reasons: InvalidationReason,
    pub propagate_to_parent: bool,
    pub requested_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidationStats {
    pub requests: u64,
    pub batches: u64,
    pub parents_notified: u64,
}

#[derive(Debug, Default)]
struct InvalidationTable {
    caches: HashMap<ControlId, Arc<CacheState>>,
    /// Explicit child -> parent registrations.
    hierarchy: HashMap<ControlId, Owner>,
    pending: Vec<InvalidationRequest>,
    timer_armed: bool,
    stats: InvalidationStats,
}

impl InvalidationTable {
    fn cache(&self, control: ControlId) -> CoreResult<Arc<CacheState>> {
        self.caches
            .get(&control)
            .cloned()
            .ok_or(CoreError::UnknownControl(control))
    }

    /// Walk up the hierarchy until a window is reached.
    fn root_window(&self, owner: Owner) -> Option<WindowId> {
        let mut cursor = owner;
        for _ in 0..=self.hierarchy.len() {
            match cursor {
                Owner::Window(window) => return Some(window),
                Owner::Control(control) => cursor = *self.hierarchy.get(&control)?,
            }
        }
        None
    }
}

#[derive(Debug)]
struct Inner {
    table: Mutex<InvalidationTable>,
    dirty: Arc<DirtyTracker>,
    coalesce_delay: Duration,
    disposed: AtomicBool,
}

impl Inner {
    fn ensure_live(&self) -> CoreResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(CoreError::Disposed("invalidation coordinator"));
        }
        Ok(())
    }

    fn drain(&self) -> usize {
        if self.disposed.load(Ordering::Acquire) {
            return 0;
        }
        let mut table = self.table.lock();
        table.timer_armed = false;
        if table.pending.is_empty() {
            return 0;
        }
        let requests = std::mem::take(&mut table.pending);

        let mut merged: BTreeMap<ControlId, (InvalidationReason, bool)> = BTreeMap::new();
        for request in &requests {
            let entry = merged
                .entry(request.control)
                .or_insert((InvalidationReason::empty(), false));
            entry.0 |= request.reasons;
            entry.1 |= request.propagate_to_parent;
        }

        let parents: BTreeSet<Owner> = merged
            .iter()
            .filter(|(_, (_, propagate))| *propagate)
            .filter_map(|(control, _)| table.hierarchy.get(control).copied())
            .collect();

        let mut scopes = Vec::with_capacity(parents.len() * 2);
        for parent in &parents {
            if let Owner::Control(container) = parent {
                // Container goes stale but is not re-queued; that would
                // let one burst cascade into further batches.
                if let Some(cache) = table.caches.get(container) {
                    cache.invalidate(InvalidationReason::CHILDREN);
                }
                scopes.push(DirtyScope::Control(*container));
            }
            if let Some(window) = table.root_window(*parent) {
                scopes.push(DirtyScope::Window(window));
            }
        }

        table.stats.batches += 1;
        table.stats.parents_notified += parents.len() as u64;
        let controls = merged.len();
        drop(table);

        self.dirty.mark_all(scopes);
        tracing::debug!(
            requests = requests.len(),
            controls,
            parents = parents.len(),
            "drained invalidation batch"
        );
        controls
    }
}

#[derive(Debug, Clone)]
pub struct InvalidationCoordinator {
    inner: Arc<Inner>,
}

impl InvalidationCoordinator {
    pub fn new(dirty: Arc<DirtyTracker>, coalesce_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(InvalidationTable::default()),
                dirty,
                coalesce_delay,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Create cache state for `control` and record its parent.
    pub fn register_control(&self, control: ControlId, parent: Owner) -> CoreResult<()> {
        self.inner.ensure_live()?;
        if parent == Owner::Control(control) {
            return Err(CoreError::InvalidArgument("a control cannot contain itself"));
        }
        let mut table = self.inner.table.lock();
        let cache = Arc::new(CacheState::default());
        cache.invalidate(InvalidationReason::all());
        table.caches.insert(control, cache);
        table.hierarchy.insert(control, parent);
        Ok(())
    }

    /// Re-parent a control, e.g. when it moves to another container.
    pub fn set_parent(&self, control: ControlId, parent: Owner) -> CoreResult<()> {
        self.inner.ensure_live()?;
        if parent == Owner::Control(control) {
            return Err(CoreError::InvalidArgument("a control cannot contain itself"));
        }
        let mut table = self.inner.table.lock();
        if !table.caches.contains_key(&control) {
            return Err(CoreError::UnknownControl(control));
        }
        table.hierarchy.insert(control, parent);
        Ok(())
    }

    pub fn parent_of(&self, control: ControlId) -> CoreResult<Option<Owner>> {
        self.inner.ensure_live()?;
        Ok(self.inner.table.lock().hierarchy.get(&control).copied())
    }

    pub fn unregister_control(&self, control: ControlId) -> CoreResult<()> {
        self.inner.ensure_live()?;
        let mut table = self.inner.table.lock();
        table.caches.remove(&control);
        table.hierarchy.remove(&control);
        table.pending.retain(|request| request.control != control);
        Ok(())
    }

    pub fn request_invalidation(
        &self,
        control: ControlId,
        reasons: InvalidationReason,
        propagate_to_parent: bool,
    ) -> CoreResult<()> {
        self.inner.ensure_live()?;
        let arm = {
            let mut table = self.inner.table.lock();
            let cache = table.cache(control)?;
            cache.invalidate(reasons);
            table.pending.push(InvalidationRequest {
                control,
                reasons,
                propagate_to_parent,
                requested_at: Instant::now(),
            });
            table.stats.requests += 1;
            let arm = !table.timer_armed;
            table.timer_armed = true;
            arm
        };
        if arm {
            self.arm_timer();
        }
        Ok(())
    }

    fn arm_timer(&self) {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let delay = self.inner.coalesce_delay;
        let spawned = thread::Builder::new()
            .name("term-wm-coalesce".to_string())
            .spawn(move || {
                thread::sleep(delay);
                if let Some(inner) = weak.upgrade() {
                    inner.drain();
                }
            });
        if let Err(err) = spawned {
            tracing::warn!(error = %err, "coalescing timer unavailable; draining inline");
            self.inner.drain();
        }
    }

    /// Drain the pending queue now instead of waiting for the timer.
    /// Returns the number of distinct controls processed.
    pub fn flush(&self) -> CoreResult<usize> {
        self.inner.ensure_live()?;
        Ok(self.inner.drain())
    }

    pub fn pending_len(&self) -> CoreResult<usize> {
        self.inner.ensure_live()?;
        Ok(self.inner.table.lock().pending.len())
    }

    pub fn stats(&self) -> CoreResult<InvalidationStats> {
        self.inner.ensure_live()?;
        Ok(self.inner.table.lock().stats)
    }

    pub fn cache_state(&self, control: ControlId) -> CoreResult<CacheSnapshot> {
        self.inner.ensure_live()?;
        let cache = self.inner.table.lock().cache(control)?;
        Ok(cache.snapshot())
    }

    pub fn is_valid(&self, control: ControlId) -> CoreResult<bool> {
        Ok(self.cache_state(control)?.is_valid)
    }

    pub fn mark_valid(&self, control: ControlId) -> CoreResult<()> {
        self.inner.ensure_live()?;
        let cache = self.inner.table.lock().cache(control)?;
        cache.mark_valid();
        Ok(())
    }

    /// Run `render` while holding the control's render guard.
    ///
    /// Returns `fallback` without waiting if another caller already holds
    /// the guard. If `render` fails, the cache is invalidated with every
    /// reason before the error is handed back, so the next access retries.
    pub fn with_cache_protection<T, E, F>(
        &self,
        control: ControlId,
        render: F,
        fallback: T,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: From<CoreError>,
    {
        self.inner.ensure_live()?;
        let cache = self.inner.table.lock().cache(control)?;
        protect(&cache, render, fallback)
    }

    /// Return the cached buffer when valid, otherwise render through the
    /// guard. A caller that loses the guard race gets the last (possibly
    /// stale) buffer, or `None` if the control never rendered.
    pub fn get_or_render<E, F>(&self, control: ControlId, render: F) -> Result<Option<Arc<Buffer>>, E>
    where
        F: FnOnce() -> Result<Buffer, E>,
        E: From<CoreError>,
    {
        self.inner.ensure_live()?;
        let cache = self.inner.table.lock().cache(control)?;
        if let Some(content) = cache.valid_content() {
            return Ok(Some(content));
        }
        let stale = cache.content();
        protect(
            &cache,
            || {
                // Someone else may have finished a render between the fast
                // path and acquiring the guard.
                if let Some(content) = cache.valid_content() {
                    return Ok(Some(content));
                }
                let generation = cache.generation();
                let content = Arc::new(render()?);
                cache.store(Arc::clone(&content), generation);
                Ok(Some(content))
            },
            stale,
        )
    }

    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        let mut table = self.inner.table.lock();
        *table = InvalidationTable::default();
    }
}

fn protect<T, E, F>(cache: &CacheState, render: F, fallback: T) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let Some(_guard) = RenderGuard::acquire(cache) else {
        return Ok(fallback);
    };
    match render() {
        Ok(value) => Ok(value),
        Err(err) => {
            cache.invalidate(InvalidationReason::all());
            Err(err)
        }
    }
}
