pub mod alarm;
pub mod app;
pub mod clock;
pub mod config;
pub mod db;
pub mod medications;
pub mod models;
pub mod reminders;
pub mod schedule;
pub mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::alarm::TokioAlarmPort;
use crate::app::{App, AppError};
use crate::clock::{Clock, SystemClock};
use crate::config::ReminderSettings;
use crate::reminders::{LoggingSink, ReminderEvent};

/// Install the global subscriber. `RUST_LOG` wins over `fallback_filter`.
/// Later calls are no-ops.
pub fn init_tracing(fallback_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter)),
        )
        .try_init();
}

/// Desktop daemon: reconcile on start, forward fired alarms to the worker,
/// exit on Ctrl-C.
pub fn run() -> Result<(), AppError> {
    let settings = ReminderSettings::load(&config::settings_path());
    init_tracing(
        settings
            .as_ref()
            .map(|s| s.log_filter.as_str())
            .unwrap_or(config::default_log_filter()),
    );
    let settings = settings?;

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (port, mut delivered_rx) = TokioAlarmPort::new(runtime.handle().clone(), clock.clone());
    let sink = Arc::new(LoggingSink::new(settings.notification_channel_name.as_str()));
    let app = App::build(&settings, Arc::new(port), clock, sink)?;
    app.submit(ReminderEvent::ColdStart)?;

    let events = app.events();
    runtime.block_on(async move {
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        loop {
            tokio::select! {
                delivered = delivered_rx.recv() => {
                    let Some(delivered) = delivered else { break };
                    tracing::debug!(alarm_id = %delivered.alarm_id, "Alarm fired");
                    if let Err(e) = events.submit(ReminderEvent::AlarmDelivered(delivered)) {
                        tracing::error!(error = %e, "Dropping fired alarm");
                        break;
                    }
                }
                _ = &mut ctrl_c => {
                    tracing::info!("Interrupt received");
                    break;
                }
            }
        }
    });

    app.shutdown();
    Ok(())
}
