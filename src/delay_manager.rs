use std::thread;
use std::time::Duration;

use log::debug;

/// Blocks for a fixed interval so asynchronously rendered content can settle.
/// The page gives no completion signal, so time is the only rendezvous.
pub fn settle(duration: Duration, reason: &str) {
    if duration.is_zero() {
        return;
    }
    debug!("Waiting for {:.1} seconds ({})...", duration.as_secs_f64(), reason);
    thread::sleep(duration);
}
