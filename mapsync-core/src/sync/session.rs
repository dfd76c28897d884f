//! Driving an engine from its inbox
//!
//! The transport delivers JSON text frames; these helpers hand them to the
//! engine one at a time, in arrival order.

use super::engine::SyncEngine;
use super::errors::SyncResult;
use crate::shutdown::ShutdownSignal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Handle one frame, deciding whether the session can go on
///
/// Non-fatal errors are logged and the session continues.
fn handle_frame(engine: &mut SyncEngine, frame: &str) -> SyncResult<()> {
    match engine.receive_json(frame) {
        Ok(()) => Ok(()),
        Err(e) if e.is_fatal() => {
            error!(error = %e, "Fatal error while handling message");
            Err(e)
        }
        Err(e) => {
            warn!(error = %e, "Error while handling message, continuing");
            Ok(())
        }
    }
}

/// Handle every frame already queued, without waiting for more
///
/// Returns how many frames were handled. Stops at the first fatal error.
pub fn drain(engine: &mut SyncEngine, inbox: &mut mpsc::UnboundedReceiver<String>) -> SyncResult<usize> {
    let mut handled = 0;
    while let Ok(frame) = inbox.try_recv() {
        handle_frame(engine, &frame)?;
        handled += 1;
    }
    Ok(handled)
}

/// Feed `inbox` to `engine` until the inbox closes or shutdown is signalled
///
/// The engine is stopped on the way out in every case. A fatal error ends
/// the session and is returned.
pub async fn run_session(
    engine: &mut SyncEngine,
    inbox: &mut mpsc::UnboundedReceiver<String>,
    shutdown: &mut broadcast::Receiver<ShutdownSignal>,
) -> SyncResult<()> {
    let outcome = loop {
        tokio::select! {
            frame = inbox.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = handle_frame(engine, &frame) {
                        break Err(e);
                    }
                }
                None => {
                    info!("Inbox closed, ending session");
                    break Ok(());
                }
            },
            signal = shutdown.recv() => {
                match signal {
                    Ok(ShutdownSignal::Graceful) => {
                        let handled = drain(engine, inbox);
                        debug!(handled = ?handled, "Drained inbox before leaving");
                        break handled.map(|_| ());
                    }
                    Ok(ShutdownSignal::Immediate) => warn!("Immediate shutdown, leaving room"),
                    Err(e) => warn!(error = %e, "Shutdown channel error, leaving room"),
                }
                break Ok(());
            }
        }
    };

    engine.stop();
    outcome
}
