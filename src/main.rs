use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use onboard_feed::bus::RefreshSignalBus;
use onboard_feed::config::{Config, RouteParams};
use onboard_feed::controller::FeedController;
use onboard_feed::service::rest::RestOnboardingService;
use onboard_feed::service::OnboardingService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load(Path::new("config.toml"))?;
    let service: Arc<dyn OnboardingService> = Arc::new(RestOnboardingService::new(
        &config.service.base_url,
        config.service.request_timeout_ms,
    ));
    let bus = Arc::new(RefreshSignalBus::new());

    let mut controller = FeedController::new(
        config.entry.to_direct_args(),
        RouteParams::new(),
        service,
        bus,
        false,
    )?;
    controller.activate();

    let outcome = controller.setup().await?;
    info!(
        ?outcome,
        program = %controller.params().program_id,
        organizer = controller.params().organizer,
        "feed loaded"
    );
    for item in controller.items() {
        info!(
            id = %item.id,
            name = %item.display_name,
            program = %item.program.display_name(),
            status = ?item.status,
            "item"
        );
    }

    controller.deactivate();
    Ok(())
}
