//! # Mining Start Gate
//!
//! Every role process spin-waits for a sentinel file
//! ([`nova_protocol::config::MINE_LOCK_FILENAME`]) before it starts
//! mining, so a demo orchestrator can launch every process independently
//! and still have them all begin at once by dropping the file last
//! (§6.3).

use std::path::Path;
use std::thread;
use std::time::Duration;

use nova_protocol::config::{MINE_LOCK_FILENAME, MINE_LOCK_POLL_INTERVAL_MS};

/// Block the current thread until [`MINE_LOCK_FILENAME`] exists in the
/// current working directory.
pub fn wait_for_mine_lock() {
    let path = Path::new(MINE_LOCK_FILENAME);
    while !path.exists() {
        thread::sleep(Duration::from_millis(MINE_LOCK_POLL_INTERVAL_MS));
    }
    tracing::info!("mine_lock observed, starting mining");
}
