use std::sync::Arc;

use tokio::time::interval;
use tracing::{debug, error, info};

use crate::bot::data::Data;
use crate::constants::timeouts::{CALLBACK_SWEEP_INTERVAL, LOG_RETENTION_INTERVAL};
use crate::services::audit::log::RELOAD_LOG;
use crate::services::lifecycle::source::{ComponentClass, CALLBACK_SWEEPER, LOG_RETENTION};

fn is_loaded(data: &Data, handler: &str) -> bool {
    data.lifecycle.is_active(ComponentClass::Handlers, handler)
}

/// Drop expired button callbacks every 30 seconds
pub fn spawn_callback_sweeper(data: Arc<Data>) {
    tokio::spawn(async move {
        let mut ticker = interval(CALLBACK_SWEEP_INTERVAL);

        loop {
            ticker.tick().await;

            if !is_loaded(&data, CALLBACK_SWEEPER) {
                continue;
            }

            data.callbacks.sweep_expired();
        }
    });
}

/// Purge old reload log entries once a day
pub fn spawn_log_retention(data: Arc<Data>) {
    tokio::spawn(async move {
        let mut ticker = interval(LOG_RETENTION_INTERVAL);

        loop {
            ticker.tick().await;

            if !is_loaded(&data, LOG_RETENTION) {
                debug!("Log retention handler unloaded, skipping run");
                continue;
            }

            let days = data.settings.log_retention_days;
            match data.audit.purge_older_than(RELOAD_LOG, days).await {
                Ok(0) => {}
                Ok(removed) => info!("Log retention removed {} reload entries", removed),
                Err(e) => error!("Log retention failed: {:?}", e),
            }
        }
    });
}
