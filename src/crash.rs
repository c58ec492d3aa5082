#![forbid(unsafe_code)]
#![deny(warnings)]
#![warn(clippy::pedantic)]

use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, warn};

pub fn crash_message(delay: Duration) -> String {
    format!(
        "simulated application crash triggered after {} seconds",
        delay.as_secs()
    )
}

/// Aborts the whole process once `delay` has elapsed. Nothing catches this,
/// no cleanup runs.
pub fn arm_crash(delay: Duration) -> JoinHandle<()> {
    warn!(seconds = delay.as_secs(), "crash simulation armed");
    tokio::spawn(async move {
        sleep(delay).await;
        let msg = crash_message(delay);
        error!(%msg, "triggering crash simulation");
        eprintln!("\n{msg}");
        std::process::abort();
    })
}
