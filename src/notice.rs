//! Transient toast notifications that dismiss themselves.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use ratatui::prelude::Rect;

use crate::dirty::{DirtyScope, DirtyTracker};
use crate::error::{CoreError, CoreResult};
use crate::events::{CoreEvent, EventDispatcher};

const NOTICE_HEIGHT: u16 = 3;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NoticeId(u64);

impl fmt::Display for NoticeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: NoticeId,
    pub text: String,
    pub area: Rect,
    pub shown_at: Instant,
    pub lifetime: Duration,
}

#[derive(Debug, Default)]
struct NoticeTable {
    notices: BTreeMap<NoticeId, Notice>,
    screen: Rect,
}

impl NoticeTable {
    /// Bottom-right corner, in the lowest band no showing notice occupies.
    /// Once the bands reach the top of the screen the last one is reused.
    fn place(&self, text: &str) -> Rect {
        let screen = self.screen;
        let width = u16::try_from(text.chars().count().saturating_add(4))
            .unwrap_or(u16::MAX)
            .min(screen.width);
        let mut bottom = screen.bottom();
        let y = loop {
            let top = bottom.saturating_sub(NOTICE_HEIGHT).max(screen.y);
            let blocked_at = self
                .notices
                .values()
                .filter(|n| n.area.y < bottom && top < n.area.bottom())
                .map(|n| n.area.y)
                .min();
            match blocked_at {
                Some(next) if top > screen.y => bottom = next.min(top),
                _ => break top,
            }
        };
        Rect {
            x: screen.right().saturating_sub(width),
            y,
            width,
            height: NOTICE_HEIGHT.min(screen.height),
        }
    }
}

#[derive(Debug)]
struct Inner {
    table: Mutex<NoticeTable>,
    next: AtomicU64,
    dirty: Arc<DirtyTracker>,
    events: Arc<EventDispatcher>,
    lifetime: Duration,
    disposed: AtomicBool,
}

impl Inner {
    fn dismiss(&self, id: NoticeId) -> bool {
        let removed = self.table.lock().notices.remove(&id);
        let Some(notice) = removed else {
            return false;
        };
        self.dirty.mark(DirtyScope::Region(notice.area));
        self.events.emit(CoreEvent::NoticeDismissed(id));
        tracing::debug!(notice = %id, "notice dismissed");
        true
    }
}

#[derive(Debug, Clone)]
pub struct NoticeBoard {
    inner: Arc<Inner>,
}

impl NoticeBoard {
    pub fn new(
        dirty: Arc<DirtyTracker>,
        events: Arc<EventDispatcher>,
        lifetime: Duration,
        screen: Rect,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(NoticeTable {
                    notices: BTreeMap::new(),
                    screen,
                }),
                next: AtomicU64::new(1),
                dirty,
                events,
                lifetime,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    fn ensure_live(&self) -> CoreResult<()> {
        if self.inner.disposed.load(Ordering::Acquire) {
            return Err(CoreError::Disposed("notice board"));
        }
        Ok(())
    }

    pub fn show(&self, text: impl Into<String>) -> CoreResult<NoticeId> {
        self.show_for(text, self.inner.lifetime)
    }

    /// Show `text` for `lifetime`, after which a timer dismisses it.
    pub fn show_for(&self, text: impl Into<String>, lifetime: Duration) -> CoreResult<NoticeId> {
        self.ensure_live()?;
        let text = text.into();
        let id = NoticeId(self.inner.next.fetch_add(1, Ordering::Relaxed));
        let area = {
            let mut table = self.inner.table.lock();
            let area = table.place(&text);
            table.notices.insert(
                id,
                Notice {
                    id,
                    text,
                    area,
                    shown_at: Instant::now(),
                    lifetime,
                },
            );
            area
        };
        self.inner.dirty.mark(DirtyScope::Region(area));
        self.inner.events.emit(CoreEvent::NoticeShown(id));

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let spawned = thread::Builder::new()
            .name("term-wm-notice".to_string())
            .spawn(move || {
                thread::sleep(lifetime);
                // the notice may already be gone; dismiss re-checks
                if let Some(inner) = weak.upgrade()
                    && !inner.disposed.load(Ordering::Acquire)
                {
                    inner.dismiss(id);
                }
            });
        if let Err(err) = spawned {
            tracing::warn!(notice = %id, error = %err, "notice timer unavailable; it stays until dismissed");
        }
        Ok(id)
    }

    /// Dismiss early. Returns whether the notice was still showing.
    pub fn dismiss(&self, id: NoticeId) -> CoreResult<bool> {
        self.ensure_live()?;
        Ok(self.inner.dismiss(id))
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.inner.table.lock().notices.values().cloned().collect()
    }

    pub fn is_showing(&self, id: NoticeId) -> bool {
        self.inner.table.lock().notices.contains_key(&id)
    }

    pub fn set_screen(&self, screen: Rect) {
        self.inner.table.lock().screen = screen;
    }

    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        self.inner.table.lock().notices.clear();
    }
}
