//! Interval timer driving auto-refresh.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// Calls `tick` every `interval` on its own thread until stopped or until
/// `tick` returns `false`.
pub struct AutoRefreshTimer {
    stop_tx: Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
    interval: Duration,
}

impl AutoRefreshTimer {
    pub fn start<F>(interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let join_handle = thread::Builder::new()
            .name("docscope-auto-refresh".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if !tick() {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("Auto-refresh timer stopped");
            })
            .map_err(Error::from)?;

        log::info!("Auto-refresh enabled every {}s", interval.as_secs());
        Ok(Self { stop_tx, join_handle: Some(join_handle), interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(join_handle) = self.join_handle.take()
            && join_handle.thread().id() != thread::current().id()
        {
            let _ = join_handle.join();
        }
    }
}

impl Drop for AutoRefreshTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
