use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::text::query_len;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// A dispatch is armed and fires after the delay unless superseded.
    Pending,
    /// The query is under the minimum length; nothing was scheduled and any
    /// pending or in-flight work was cancelled.
    BelowMinimum,
}

/// Coalesces keystrokes into one dispatch per quiet period and keeps at most
/// one dispatched request alive. Must be used inside a Tokio runtime.
pub struct Debouncer {
    delay: Duration,
    min_chars: usize,
    timer: Mutex<Option<CancellationToken>>,
    in_flight: Arc<Mutex<Option<CancellationToken>>>,
}

impl Debouncer {
    pub fn new(delay: Duration, min_chars: usize) -> Self {
        Self {
            delay,
            min_chars,
            timer: Mutex::new(None),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arms (or re-arms) the timer for `query`. When it elapses, the previous
    /// dispatch's token is cancelled and `run` is called with the trimmed
    /// query and a fresh token.
    pub fn schedule<F, Fut>(&self, query: &str, run: F) -> Schedule
    where
        F: FnOnce(String, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if let Some(previous) = self.timer.lock().take() {
            previous.cancel();
        }
        if query_len(query) < self.min_chars {
            self.cancel_in_flight();
            return Schedule::BelowMinimum;
        }

        let timer = CancellationToken::new();
        *self.timer.lock() = Some(timer.clone());

        let delay = self.delay;
        let in_flight = Arc::clone(&self.in_flight);
        let query = query.trim().to_string();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {
                    trace!(query = %query, "debounced query superseded");
                    return;
                }
                _ = sleep(delay) => {}
            }

            let token = {
                let mut slot = in_flight.lock();
                if timer.is_cancelled() {
                    return;
                }
                let token = CancellationToken::new();
                if let Some(previous) = slot.replace(token.clone()) {
                    previous.cancel();
                }
                token
            };
            run(query, token).await;
        });
        Schedule::Pending
    }

    pub fn cancel_in_flight(&self) {
        if let Some(token) = self.in_flight.lock().take() {
            token.cancel();
        }
    }

    /// Cancels the pending timer and the in-flight request.
    pub fn cancel_all(&self) {
        if let Some(timer) = self.timer.lock().take() {
            timer.cancel();
        }
        self.cancel_in_flight();
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
