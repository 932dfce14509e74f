use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};

use crate::use_cases::expiration::ExpirationUseCases;

/// Runs the expiration sweep now and then every `every_secs` seconds.
pub async fn run_expiration_loop(expiration: Arc<ExpirationUseCases>, every_secs: u64) {
    // The first tick fires immediately, which gives the start-up sweep.
    let mut ticker = interval(Duration::from_secs(every_secs.max(1)));

    info!(
        "Expiration sweep started (running every {}s)",
        every_secs
    );

    loop {
        ticker.tick().await;

        if let Err(e) = expiration.run_sweep().await {
            error!(error = %e, "Expiration sweep failed to list overdue subscriptions");
        }
    }
}
