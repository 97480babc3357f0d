//! Cooperative cancellation of a sweep.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use tracing::{error, warn};

/// A flag shared between the interrupt listener and the driver.
///
/// The driver checks it between problems only, so work already submitted always drains.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Cancel `token` when the process receives Ctrl+C.
///
/// The listener runs on its own thread with a single-threaded runtime and keeps listening after
/// the first signal, so repeated interrupts don't kill the process mid-drain.
///
/// # Errors
///
/// Returns an error if the runtime or the listener thread can't be created.
pub fn install_interrupt_handler(token: CancelToken) -> io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    thread::Builder::new()
        .name("interrupt".to_string())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => {
                            warn!("interrupt received, stopping after the current problem");
                            token.cancel();
                        }
                        Err(err) => {
                            error!(%err, "failed to listen for interrupts");
                            break;
                        }
                    }
                }
            });
        })?;
    Ok(())
}
