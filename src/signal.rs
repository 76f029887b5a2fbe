// Global shutdown flag
//
// Spec §5 / §9: "the only legitimate process-wide state. Set a flag;
// do not call into the core from the handler. The event loop polls
// the flag." SIGINT and SIGTERM both just flip an AtomicBool; nothing
// else in the process touches compositor/output/coordinator state
// from signal context.

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, Ordering};

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_signum: i32) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT/SIGTERM handlers. Call once at startup, before
/// the event loop begins polling.
pub fn install() -> squall_utils::Result<()> {
    let action = SigAction::new(SigHandler::Handler(on_signal), SaFlags::empty(), SigSet::empty());
    unsafe {
        signal::sigaction(Signal::SIGINT, &action)?;
        signal::sigaction(Signal::SIGTERM, &action)?;
    }
    Ok(())
}

/// Polled once per event-loop tick (spec §5 Cancellation): "the
/// current tick completes, and on loop entry the core proceeds to
/// shutdown".
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}
