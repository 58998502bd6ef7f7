use ticker_desk::{AppError, DashboardSession, FeedEvent, StartFeedArgs};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Terminal display sink: subscribes to the session bus and renders ticks,
/// status transitions and headlines to stdout until Ctrl-C.
#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = StartFeedArgs {
        base_url: std::env::var("TICKER_DESK_URL").ok(),
        ..StartFeedArgs::default()
    };

    let session = DashboardSession::new();
    let mut events = session.subscribe();
    let config = session.start_feed(args).await?;
    info!(base_url = %config.base_url, "ticker desk started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(FeedEvent::Tick(update)) => {
                    println!(
                        "{:>12.2}  {:>8}  [{} pts]",
                        update.price,
                        update.change_label,
                        update.chart.len()
                    );
                }
                Ok(FeedEvent::Status(status)) => {
                    println!(
                        "-- {:?}: {}",
                        status.state,
                        status.reason.as_deref().unwrap_or("")
                    );
                }
                Ok(FeedEvent::News(items)) => {
                    for item in &items {
                        println!("** [{}] {} ({})", item.category, item.title, item.time);
                    }
                }
                Ok(FeedEvent::ChartBootstrap(points)) => {
                    info!(points = points.len(), "chart seeded from history");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "display sink lagged behind the feed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    session.stop_feed().await;
    info!("ticker desk stopped");
    Ok(())
}
