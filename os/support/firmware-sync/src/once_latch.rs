use core::sync::atomic::{AtomicU8, Ordering};

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;

/// Observable phase of a [`OnceLatch`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LatchState {
    /// The guarded action has not started.
    Pending,
    /// A caller won the latch and is running the action.
    Running,
    /// The action has completed; the latch never leaves this state.
    Done,
}

/// Guards an action that may run at most once over the latch's lifetime.
///
/// Unlike a once-cell, losing callers do not wait for the winner: a second
/// [`run_once`](Self::run_once) returns `None` immediately, whether the first run
/// is still in progress or already finished.
pub struct OnceLatch {
    state: AtomicU8,
}

impl Default for OnceLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl OnceLatch {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(PENDING),
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> LatchState {
        match self.state.load(Ordering::Acquire) {
            PENDING => LatchState::Pending,
            RUNNING => LatchState::Running,
            _ => LatchState::Done,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// Run `action` if no one has before, returning its result.
    ///
    /// Writes performed by `action` happen-before any later observation of
    /// [`LatchState::Done`].
    pub fn run_once<R>(&self, action: impl FnOnce() -> R) -> Option<R> {
        // Fast path
        if self.state.load(Ordering::Acquire) != PENDING {
            return None;
        }

        if self
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        // Publish even if `action` unwinds; a half-run action is still the one run.
        let guard = Finish(&self.state);
        let result = action();
        drop(guard);
        Some(result)
    }
}

struct Finish<'a>(&'a AtomicU8);

impl Drop for Finish<'_> {
    fn drop(&mut self) {
        self.0.store(DONE, Ordering::Release);
    }
}

impl core::fmt::Debug for OnceLatch {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OnceLatch")
            .field("state", &self.state())
            .finish()
    }
}
