//! State-change notifications and the worker that delivers them.
//!
//! Coordinators never call listeners inline. They hand a `CoreEvent` to the
//! `EventDispatcher`, which queues it for a single background worker. The
//! worker delivers events in FIFO order and swallows anything a listener
//! throws at it (errors and panics alike), so a misbehaving listener can
//! neither stall a state mutation nor take the worker down.

use std::error::Error;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::focus::FocusState;
use crate::ids::{ControlId, WindowId};
use crate::notice::NoticeId;
use crate::window::WindowState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEvent {
    WindowRegistered(WindowId),
    WindowActivated {
        previous: Option<WindowId>,
        current: WindowId,
    },
    WindowDeactivated(WindowId),
    WindowStateChanged {
        window: WindowId,
        state: WindowState,
    },
    WindowClosed(WindowId),
    /// Activation of `requested` was redirected to `blocking`.
    ActivationBlocked {
        requested: WindowId,
        blocking: WindowId,
    },
    ControlBlurred {
        window: WindowId,
        control: ControlId,
    },
    ControlFocused {
        window: WindowId,
        control: ControlId,
    },
    FocusChanged(FocusState),
    NoticeShown(NoticeId),
    NoticeDismissed(NoticeId),
}

pub type ListenerResult = Result<(), Box<dyn Error + Send + Sync>>;
pub type Listener = Arc<dyn Fn(&CoreEvent) -> ListenerResult + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ListenerId(u64);

enum Job {
    Deliver(CoreEvent),
    Barrier(mpsc::Sender<()>),
}

type ListenerTable = Arc<Mutex<Vec<(ListenerId, Listener)>>>;

const FLUSH_RETRY: Duration = Duration::from_millis(1);

pub struct EventDispatcher {
    listeners: ListenerTable,
    sender: Mutex<Option<SyncSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_thread: Option<ThreadId>,
    next_listener: AtomicU64,
    dropped: AtomicUsize,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.lock().len())
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}

impl EventDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let listeners: ListenerTable = Arc::new(Mutex::new(Vec::new()));
        let worker_listeners = Arc::clone(&listeners);
        let worker = thread::Builder::new()
            .name("term-wm-dispatch".to_string())
            .spawn(move || dispatch_loop(receiver, worker_listeners));
        let (worker, worker_thread) = match worker {
            Ok(handle) => {
                let id = handle.thread().id();
                (Some(handle), Some(id))
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to spawn dispatch worker; events disabled");
                (None, None)
            }
        };
        Self {
            listeners,
            sender: Mutex::new(worker.as_ref().map(|_| sender)),
            worker: Mutex::new(worker),
            worker_thread,
            next_listener: AtomicU64::new(1),
            dropped: AtomicUsize::new(0),
        }
    }

    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&CoreEvent) -> ListenerResult + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Queue `event` for delivery. Never blocks.
    pub fn emit(&self, event: CoreEvent) {
        let sender = self.sender.lock();
        let Some(sender) = sender.as_ref() else {
            return;
        };
        match sender.try_send(Job::Deliver(event)) {
            Ok(()) => {}
            Err(TrySendError::Full(Job::Deliver(event))) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(?event, "dispatch queue full; dropping event");
            }
            Err(_) => {}
        }
    }

    /// Number of events dropped because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Block until every event queued before this call has been delivered,
    /// or `timeout` elapses. Returns whether the queue drained in time.
    pub fn flush(&self, timeout: Duration) -> bool {
        if self.is_worker_thread() {
            return false;
        }
        let sender = self.sender.lock().clone();
        let Some(sender) = sender else {
            return true;
        };
        let started = Instant::now();
        let (done_tx, done_rx) = mpsc::channel();
        // A full queue must not hold the caller past `timeout`.
        let mut barrier = Job::Barrier(done_tx);
        loop {
            match sender.try_send(barrier) {
                Ok(()) => break,
                Err(TrySendError::Disconnected(_)) => return true,
                Err(TrySendError::Full(job)) => {
                    if started.elapsed() >= timeout {
                        return false;
                    }
                    barrier = job;
                    thread::sleep(FLUSH_RETRY);
                }
            }
        }
        done_rx
            .recv_timeout(timeout.saturating_sub(started.elapsed()))
            .is_ok()
    }

    /// Stop the worker after it finishes whatever is already queued.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        if self.is_worker_thread() {
            return;
        }
        if let Some(handle) = self.worker.lock().take()
            && handle.join().is_err()
        {
            tracing::warn!("dispatch worker exited with a panic");
        }
    }

    fn is_worker_thread(&self) -> bool {
        self.worker_thread == Some(thread::current().id())
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn dispatch_loop(receiver: Receiver<Job>, listeners: ListenerTable) {
    while let Ok(job) = receiver.recv() {
        match job {
            Job::Deliver(event) => deliver(&event, &listeners),
            Job::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }
}

fn deliver(event: &CoreEvent, listeners: &ListenerTable) {
    // Snapshot so listeners may (un)subscribe from inside a callback.
    let snapshot: Vec<(ListenerId, Listener)> = listeners.lock().clone();
    for (id, listener) in snapshot {
        match catch_unwind(AssertUnwindSafe(|| listener(event))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::warn!(listener = ?id, error = %err, ?event, "listener failed");
            }
            Err(_) => {
                tracing::warn!(listener = ?id, ?event, "listener panicked");
            }
        }
    }
}
