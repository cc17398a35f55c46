use anyhow::Context;
use clap::Parser;
use doorstat::{
    api::{self, AppState},
    config::Cli,
    dispatch::NotificationQueue,
    notifier::SmtpNotifier,
    state_actor::StatusLogHandle,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let capacity = usize::try_from(cli.log_capacity).context("Log capacity is too large")?;
    let log = StatusLogHandle::new(capacity, 32);

    let notifications = match cli.mail.smtp_config()? {
        Some(smtp) => {
            info!(host = %smtp.host, port = smtp.port, to = %smtp.to, "Mail notifications enabled");
            let notifier = SmtpNotifier::new(&smtp).context("Invalid mail settings")?;
            NotificationQueue::spawn(
                Arc::new(notifier),
                log.clone(),
                cli.mail.retry_policy(),
                cli.mail.attempt_timeout(),
                cli.mail.mail_queue_capacity,
            )
        }
        None => {
            warn!("Mail is not configured, status changes will not be emailed");
            NotificationQueue::disabled(log.clone())
        }
    };

    let app = api::router(AppState { log, notifications }).layer(TraceLayer::new_for_http());

    info!("Binding to {}", cli.address);
    let listener = tokio::net::TcpListener::bind(&cli.address)
        .await
        .with_context(|| format!("Couldn't bind to {}", cli.address))?;
    info!("Starting API server");
    axum::serve(listener, app)
        .await
        .context("API server stopped")?;

    Ok(())
}
