// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Timer module
//!
//! One-shot timeout supervision. A [`TimeoutSupervisor`] wraps a callback and a
//! [`Timeout`]; once armed it fires the callback exactly once unless it is
//! disarmed first. Timers run on a tokio runtime reached through a [`Timer`].
//!

use crate::Error;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

/// Amount of time an interaction is allowed to take.
#[derive(
    Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Timeout(Duration);

impl Timeout {
    pub fn of_millis(millis: u64) -> Self {
        Timeout(Duration::from_millis(millis))
    }

    pub fn of_secs(secs: u64) -> Self {
        Timeout(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn as_millis(&self) -> u128 {
        self.0.as_millis()
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Timeout(duration)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.as_millis())
    }
}

/// Callback slot shared by the armed task and the supervisor.
type CallbackSlot = Arc<Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>>;

/// Entry point for timer facilities bound to a tokio runtime.
#[derive(Clone, Debug)]
pub struct Timer {
    handle: Handle,
}

impl Timer {
    /// Timer backed by the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Timer backed by the runtime of the current thread.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] outside of a tokio runtime.
    pub fn current() -> Result<Self, Error> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| Error::NoRuntime(e.to_string()))
    }

    /// Creates a supervisor that will call `callback` once `timeout` elapses.
    pub fn supervisor<F>(&self, timeout: Timeout, callback: F) -> TimeoutSupervisor
    where
        F: FnOnce() + Send + 'static,
    {
        TimeoutSupervisor {
            timeout,
            handle: self.handle.clone(),
            token: CancellationToken::new(),
            callback: Arc::new(Mutex::new(Some(Box::new(callback)))),
            started: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Blocks the current thread for the timeout duration.
    pub fn sleep(timeout: Timeout) {
        std::thread::sleep(timeout.as_duration());
    }
}

/// One-shot timer around a callback.
///
/// Clones share the same timer, so stopping any clone disarms all of them.
#[derive(Clone)]
pub struct TimeoutSupervisor {
    timeout: Timeout,
    handle: Handle,
    token: CancellationToken,
    callback: CallbackSlot,
    started: Arc<AtomicBool>,
}

impl TimeoutSupervisor {
    pub fn timeout(&self) -> Timeout {
        self.timeout
    }

    /// Arms the timer. Calling it again has no effect.
    pub fn start_supervision(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("Starting timeout supervision for {}.", self.timeout);
        let token = self.token.clone();
        let callback = self.callback.clone();
        let duration = self.timeout.as_duration();
        self.handle.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Timeout supervision cancelled.");
                }
                _ = tokio::time::sleep(duration) => {
                    let callback = callback.lock().take();
                    if let Some(callback) = callback {
                        debug!("Timeout elapsed, firing callback.");
                        // Callbacks may run actor code inline.
                        tokio::task::spawn_blocking(callback);
                    }
                }
            }
        });
    }

    /// Disarms the timer permanently. Safe to call at any time, repeatedly.
    pub fn stop_supervision(&self) {
        self.token.cancel();
        let disarmed = self.callback.lock().take();
        if disarmed.is_some() {
            debug!("Timeout supervision stopped before firing.");
        }
    }

    /// True once the callback has either fired or been disarmed.
    pub fn is_completed(&self) -> bool {
        self.callback.lock().is_none()
    }
}

impl fmt::Debug for TimeoutSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeoutSupervisor")
            .field("timeout", &self.timeout)
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("completed", &self.is_completed())
            .finish()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    use std::sync::atomic::AtomicUsize;

    fn counting_supervisor(
        timer: &Timer,
        timeout: Timeout,
    ) -> (TimeoutSupervisor, Arc<AtomicUsize>) {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let supervisor = timer.supervisor(timeout, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (supervisor, fired)
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(Timeout::of_secs(1).to_string(), "1000ms");
        assert_eq!(
            Error::Timeout(Timeout::of_millis(1000)).to_string(),
            "The response waiting time is over. Timeout is 1000ms."
        );
    }

    #[test]
    fn test_sleep_blocks_for_timeout() {
        let start = std::time::Instant::now();
        Timer::sleep(Timeout::of_millis(30));
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_no_runtime() {
        assert!(matches!(Timer::current(), Err(Error::NoRuntime(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_stopped_before_timeout() {
        let timer = Timer::current().unwrap();
        let (supervisor, fired) =
            counting_supervisor(&timer, Timeout::of_millis(100));
        supervisor.start_supervision();
        tokio::time::sleep(Duration::from_millis(30)).await;
        supervisor.stop_supervision();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fires_once_and_stop_after_is_harmless() {
        let timer = Timer::current().unwrap();
        let (supervisor, fired) =
            counting_supervisor(&timer, Timeout::of_millis(30));
        supervisor.start_supervision();
        supervisor.start_supervision();
        tokio::time::sleep(Duration::from_millis(150)).await;
        supervisor.stop_supervision();
        supervisor.stop_supervision();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(supervisor.is_completed());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_not_started_never_fires() {
        let timer = Timer::current().unwrap();
        let (supervisor, fired) =
            counting_supervisor(&timer, Timeout::of_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!supervisor.is_completed());
    }
}
