//! One-shot completion signals that bridge background network work into the synchronous
//! validation pass.
//!
//! A [`PendingOperation`] starts unfinished and is flipped exactly once by
//! [`PendingOperation::signal_completed`]. Other parties obtain their own handle on the same
//! eventual completion with [`PendingOperation::attach`]; signalling the root signals every
//! attached handle, recursively. Attaching to an operation that already finished returns a
//! pre-completed sentinel, so no waiter is ever left behind.
//!
//! ```rust
//! use xref_core::pending::PendingOperation;
//!
//! let root = PendingOperation::new();
//! let first = root.attach();
//! let second = root.attach();
//! root.signal_completed();
//! assert!(first.is_finished() && second.is_finished());
//! assert!(root.attach().is_finished());
//! ```

use parking_lot::{Condvar, Mutex};
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// How long callers are told to wait before polling again when an operation is outstanding.
pub const DEFAULT_SUGGESTED_WAIT: Duration = Duration::from_millis(100);

#[derive(Default)]
struct PendingState {
    finished: bool,
    dependents: Vec<PendingOperation>,
}

struct PendingInner {
    state: Mutex<PendingState>,
    signal: Condvar,
    suggested_wait: Duration,
}

#[derive(Clone)]
pub struct PendingOperation {
    inner: Arc<PendingInner>,
}

impl PendingOperation {
    pub fn new() -> Self {
        PendingOperation::with_suggested_wait(DEFAULT_SUGGESTED_WAIT)
    }

    pub fn with_suggested_wait(suggested_wait: Duration) -> Self {
        PendingOperation {
            inner: Arc::new(PendingInner {
                state: Mutex::new(PendingState::default()),
                signal: Condvar::new(),
                suggested_wait,
            }),
        }
    }

    /// A sentinel that is already finished.
    pub fn completed() -> Self {
        let op = PendingOperation::new();
        op.inner.state.lock().finished = true;
        op
    }

    /// Obtain a new handle that finishes when this one does.
    pub fn attach(&self) -> PendingOperation {
        let mut state = self.inner.state.lock();
        if state.finished {
            return PendingOperation::completed();
        }
        let dependent = PendingOperation::with_suggested_wait(self.inner.suggested_wait);
        state.dependents.push(dependent.clone());
        dependent
    }

    /// Mark finished, wake every waiter and signal all attached handles. Idempotent.
    pub fn signal_completed(&self) {
        let dependents = {
            let mut state = self.inner.state.lock();
            if state.finished {
                return;
            }
            state.finished = true;
            self.inner.signal.notify_all();
            std::mem::take(&mut state.dependents)
        };
        for dependent in dependents {
            dependent.signal_completed();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.state.lock().finished
    }

    pub fn suggested_wait(&self) -> Duration {
        self.inner.suggested_wait
    }

    /// Block until finished.
    pub fn wait(&self) {
        let mut state = self.inner.state.lock();
        while !state.finished {
            self.inner.signal.wait(&mut state);
        }
    }

    /// Block until finished or `timeout` elapses. Returns whether the operation finished.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        while !state.finished {
            if self
                .inner
                .signal
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                return state.finished;
            }
        }
        true
    }

    /// Block until finished, giving up once `token` is cancelled or its deadline passes. Returns
    /// whether the operation finished.
    pub fn wait_cancellable(&self, token: Option<&CancellationToken>) -> bool {
        let Some(token) = token else {
            self.wait();
            return true;
        };

        // Registered before the first check, so a concurrent cancel() either is seen by the
        // check or notifies this wait.
        token.add_waiter(&self.inner);
        let finished = {
            let mut state = self.inner.state.lock();
            loop {
                if state.finished {
                    break true;
                }
                if token.is_cancelled() {
                    break false;
                }
                match token.state.deadline {
                    Some(deadline) => {
                        self.inner.signal.wait_until(&mut state, deadline);
                    }
                    None => self.inner.signal.wait(&mut state),
                }
            }
        };
        token.remove_waiter(&self.inner);
        finished
    }

    pub fn ptr_eq(&self, other: &PendingOperation) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for PendingOperation {
    fn default() -> Self {
        PendingOperation::new()
    }
}

impl fmt::Debug for PendingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("PendingOperation")
            .field("finished", &state.finished)
            .field("dependents", &state.dependents.len())
            .field("suggested_wait", &self.inner.suggested_wait)
            .finish()
    }
}

struct CancellationState {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
    /// Operations blocked in [`PendingOperation::wait_cancellable`] on this token
    waiters: Mutex<Vec<Arc<PendingInner>>>,
}

/// Cooperative cancellation flag, cheap to clone. Only affects the waits it is passed to.
///
/// Cancelling wakes those waits immediately; a deadline is honored by the waits themselves.
#[derive(Clone)]
pub struct CancellationToken {
    state: Arc<CancellationState>,
}

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken::with_deadline(None)
    }

    /// A token that cancels itself once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        CancellationToken::with_deadline(Some(Instant::now() + timeout))
    }

    fn with_deadline(deadline: Option<Instant>) -> Self {
        CancellationToken {
            state: Arc::new(CancellationState {
                cancelled: AtomicBool::new(false),
                deadline,
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        let waiters = std::mem::take(&mut *self.state.waiters.lock());
        for waiter in waiters {
            // taking the lock orders this notify after the waiter's last check
            let _state = waiter.state.lock();
            waiter.signal.notify_all();
        }
    }

    fn add_waiter(&self, waiter: &Arc<PendingInner>) {
        self.state.waiters.lock().push(waiter.clone());
    }

    fn remove_waiter(&self, waiter: &Arc<PendingInner>) {
        self.state
            .waiters
            .lock()
            .retain(|other| !Arc::ptr_eq(other, waiter));
    }

    pub fn is_cancelled(&self) -> bool {
        if self.state.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        match self.state.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.state.cancelled.store(true, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.state.cancelled.load(Ordering::SeqCst))
            .field("deadline", &self.state.deadline)
            .finish()
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        CancellationToken::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn completed_sentinel_is_finished() {
        let op = PendingOperation::completed();
        assert!(op.is_finished());
        assert!(op.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn fan_out_signals_every_attached_handle() {
        let root = PendingOperation::new();
        let handles: Vec<_> = (0..8).map(|_| root.attach()).collect();
        let nested = handles[3].attach();
        assert!(handles.iter().all(|h| !h.is_finished()));

        root.signal_completed();
        assert!(root.is_finished());
        assert!(handles.iter().all(|h| h.is_finished()));
        assert!(nested.is_finished());
    }

    #[test]
    fn attach_after_completion_returns_sentinel() {
        let root = PendingOperation::new();
        root.signal_completed();
        let late = root.attach();
        assert!(late.is_finished());
        assert!(!late.ptr_eq(&root));
        assert!(root.inner.state.lock().dependents.is_empty());
    }

    #[test]
    fn signal_is_idempotent() {
        let root = PendingOperation::new();
        let child = root.attach();
        root.signal_completed();
        root.signal_completed();
        assert!(child.is_finished());
    }

    #[test]
    fn wait_unblocks_on_signal_from_other_thread() {
        let root = PendingOperation::new();
        let handle = root.attach();
        let signaller = {
            let root = root.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                root.signal_completed();
            })
        };
        handle.wait();
        assert!(handle.is_finished());
        signaller.join().unwrap();
    }

    #[test]
    fn cancellable_wait_gives_up() {
        let op = PendingOperation::new();
        let token = CancellationToken::new();
        token.cancel();
        assert!(!op.wait_cancellable(Some(&token)));
        assert!(!op.is_finished());

        let token = CancellationToken::with_timeout(Duration::from_millis(20));
        assert!(!op.wait_cancellable(Some(&token)));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_wakes_a_blocked_wait() {
        let op = PendingOperation::new();
        let token = CancellationToken::new();
        let waiter = {
            let op = op.clone();
            let token = token.clone();
            thread::spawn(move || {
                let started = Instant::now();
                (op.wait_cancellable(Some(&token)), started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        token.cancel();

        let (finished, waited) = waiter.join().unwrap();
        assert!(!finished);
        assert!(waited < Duration::from_secs(5));
        assert!(token.state.waiters.lock().is_empty());
    }

    #[test]
    fn cancellable_wait_sees_the_signal() {
        let op = PendingOperation::new();
        let token = CancellationToken::with_timeout(Duration::from_secs(30));
        let signaller = {
            let op = op.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                op.signal_completed();
            })
        };
        assert!(op.wait_cancellable(Some(&token)));
        assert!(!token.is_cancelled());
        signaller.join().unwrap();
    }

    #[test]
    fn timed_wait_reports_unfinished() {
        let op = PendingOperation::new();
        assert!(!op.wait_timeout(Duration::from_millis(5)));
    }
}
