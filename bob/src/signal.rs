//! Ctrl-C handling
//!
//! The first Ctrl-C trips the shared [`CancelToken`], which makes a running
//! child get killed and its node fail. A second Ctrl-C exits right away.

use crate::defaults::INTERRUPTED_EXIT_CODE;
use convenient_launch::CancelToken;
use std::io;
use std::thread;
use tracing::{debug, warn};

/// Watch for Ctrl-C on a helper thread
///
/// # Errors
///
/// When the helper thread can't be started.
pub fn watch(cancel: CancelToken) -> io::Result<()> {
    let _ = thread::Builder::new()
        .name("bob-signal".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Ctrl-C handling unavailable: {e}");
                    return;
                }
            };
            runtime.block_on(async move {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        debug!("Stopped listening for Ctrl-C: {e}");
                        return;
                    }
                    if cancel.is_cancelled() {
                        std::process::exit(i32::from(INTERRUPTED_EXIT_CODE));
                    }
                    warn!("Interrupted, stopping the build (press Ctrl-C again to exit immediately)");
                    cancel.cancel();
                }
            });
        })?;
    Ok(())
}
