//! Cancelable scheduled-task primitive.
//! Arming replaces any previously armed task (last writer wins), which is
//! exactly the cancellation semantics the debounce and show/hide timers need.

use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// A single re-armable delayed action. `arm` cancels whatever was armed
/// before; `disarm` cancels without rescheduling.
pub struct ScheduledTask {
    token: Mutex<Option<CancellationToken>>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self {
            token: Mutex::new(None),
        }
    }

    /// Schedule `action` to run after `delay`, replacing any armed task.
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&self, delay: Duration, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        {
            let mut slot = self.token.lock();
            if let Some(old) = slot.replace(token.clone()) {
                old.cancel();
            }
        }
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => action(),
                _ = token.cancelled() => {}
            }
        });
    }

    /// Cancel the armed task, if any.
    pub fn disarm(&self) {
        if let Some(token) = self.token.lock().take() {
            token.cancel();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.token
            .lock()
            .as_ref()
            .map(|t| !t.is_cancelled())
            .unwrap_or(false)
    }
}

impl Default for ScheduledTask {
    fn default() -> Self {
        Self::new()
    }
}
