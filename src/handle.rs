use super::{
    errors::SpawnError,
    result::SpawnResult,
};
use std::{
    any::Any,
    fmt,
    future::Future,
    mem,
    panic::{self, AssertUnwindSafe},
    pin::Pin,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
    time::Duration,
};
use futures::task::AtomicWaker;


pub(crate) enum TaskOutcome {
    Completed,
    Panicked,
}

/// Type-erased unit of work as stored in the pool queue.
pub(crate) type Task = Box<dyn FnOnce() -> TaskOutcome + Send + 'static>;

enum SlotState<T> {
    Pending,
    Ready(SpawnResult<T>),
    Taken,
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condvar,
    waker: AtomicWaker,
}

impl<T> Slot<T> {
    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, result: SpawnResult<T>) {
        {
            let mut state = self.lock();
            if matches!(*state, SlotState::Pending) {
                *state = SlotState::Ready(result);
            }
        }
        self.ready.notify_all();
        self.waker.wake();
    }
}

fn take_ready<T>(state: &mut SlotState<T>) -> Option<SpawnResult<T>> {
    match mem::replace(state, SlotState::Taken) {
        SlotState::Ready(result) => Some(result),
        SlotState::Pending => {
            *state = SlotState::Pending;
            None
        }
        SlotState::Taken => panic!("JoinHandle result was already taken"),
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

pub(crate) fn pair<T>() -> (Promise<T>, JoinHandle<T>) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Pending),
        ready: Condvar::new(),
        waker: AtomicWaker::new(),
    });
    (
        Promise { slot: Some(slot.clone()) },
        JoinHandle { slot },
    )
}


/// Write-once producer side. Dropping it unfulfilled resolves the paired
/// handle with [`SpawnError::Abandoned`].
pub(crate) struct Promise<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> Promise<T> {
    fn fulfill(mut self, result: SpawnResult<T>) {
        if let Some(slot) = self.slot.take() {
            slot.resolve(result);
        }
    }

    /// Runs `f`, storing its value or its panic in the slot.
    pub(crate) fn complete_with<F>(self, f: F) -> TaskOutcome
    where
        F: FnOnce() -> T,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => {
                self.fulfill(Ok(value));
                TaskOutcome::Completed
            }
            Err(payload) => {
                self.fulfill(Err(SpawnError::Panic(panic_message(payload.as_ref()))));
                TaskOutcome::Panicked
            }
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.resolve(Err(SpawnError::Abandoned));
        }
    }
}


/// Caller-side handle to the result of a submitted task.
///
/// Supports blocking ([`wait`](Self::wait)), bounded ([`wait_for`](Self::wait_for),
/// [`wait_timeout`](Self::wait_timeout)) and non-blocking ([`try_wait`](Self::try_wait))
/// retrieval, and can be `.await`ed.
pub struct JoinHandle<T> {
    slot: Arc<Slot<T>>,
}

impl<T> JoinHandle<T> {
    #[inline]
    pub fn is_finished(&self) -> bool {
        !matches!(*self.slot.lock(), SlotState::Pending)
    }

    pub fn wait(self) -> SpawnResult<T> {
        let mut state = self.slot.lock();
        loop {
            if let Some(result) = take_ready(&mut state) {
                return result;
            }
            state = self
                .slot
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Blocks for at most `timeout`. Returns `true` once the result is ready.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let state = self.slot.lock();
        let (state, _) = self
            .slot
            .ready
            .wait_timeout_while(state, timeout, |s| matches!(s, SlotState::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        !matches!(*state, SlotState::Pending)
    }

    pub fn wait_timeout(self, timeout: Duration) -> SpawnResult<T> {
        if self.wait_for(timeout) {
            self.wait()
        } else {
            Err(SpawnError::Timeout)
        }
    }

    /// Takes the result if it is ready, otherwise hands the handle back.
    pub fn try_wait(self) -> Result<SpawnResult<T>, Self> {
        let ready = take_ready(&mut self.slot.lock());
        match ready {
            Some(result) => Ok(result),
            None => Err(self),
        }
    }

    /// Must be called within a tokio runtime with the time driver enabled.
    pub async fn await_timeout(self, timeout: Duration) -> SpawnResult<T> {
        match tokio::time::timeout(timeout, self).await {
            Ok(result) => result,
            Err(_) => Err(SpawnError::Timeout),
        }
    }
}

impl<T> Future for JoinHandle<T> {
    type Output = SpawnResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.slot.waker.register(cx.waker());
        let ready = take_ready(&mut this.slot.lock());
        match ready {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for JoinHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}
