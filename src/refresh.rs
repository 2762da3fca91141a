use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time;

/// Trailing-edge debounce around a callback.
///
/// Every `call` stores the argument and restarts the delay window; when the
/// window elapses undisturbed the stored call fires once. `flush` fires the
/// stored call immediately, `cancel` drops it. The stored argument doubles
/// as the pending token: it is present exactly between scheduling and
/// firing.
pub struct DebouncedTrigger<T: Clone + Send + 'static> {
    delay: Duration,
    handle: Handle,
    action: Arc<dyn Fn(T) + Send + Sync>,
    state: Arc<Mutex<TriggerState<T>>>,
}

struct TriggerState<T> {
    pending: Option<T>,
    epoch: u64,
}

impl<T: Clone + Send + 'static> DebouncedTrigger<T> {
    /// Must be created from within a Tokio runtime; timer tasks are spawned
    /// on it, so `call` itself may come from any thread.
    pub fn new(delay: Duration, action: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self {
            delay,
            handle: Handle::current(),
            action: Arc::new(action),
            state: Arc::new(Mutex::new(TriggerState {
                pending: None,
                epoch: 0,
            })),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The argument scheduled to fire, if any.
    pub fn pending(&self) -> Option<T> {
        self.state.lock().pending.clone()
    }

    /// Store `arg` and restart the delay window.
    pub fn call(&self, arg: T) {
        let epoch = {
            let mut state = self.state.lock();
            state.pending = Some(arg);
            state.epoch += 1;
            state.epoch
        };
        let state = Arc::clone(&self.state);
        let action = Arc::clone(&self.action);
        let delay = self.delay;
        self.handle.spawn(async move {
            time::sleep(delay).await;
            let fired = {
                let mut state = state.lock();
                if state.epoch == epoch {
                    state.pending.take()
                } else {
                    None
                }
            };
            if let Some(arg) = fired {
                action(arg);
            }
        });
    }

    /// Fire the stored call now instead of waiting out the delay.
    pub fn flush(&self) {
        let fired = {
            let mut state = self.state.lock();
            state.epoch += 1;
            state.pending.take()
        };
        if let Some(arg) = fired {
            (self.action)(arg);
        }
    }

    /// Drop the stored call without firing.
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.epoch += 1;
        state.pending = None;
    }
}
