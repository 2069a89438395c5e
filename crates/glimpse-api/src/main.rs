use glimpse_api::setup;
use glimpse_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let (state, app) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, app).await?;

    state.queue.shutdown().await;
    glimpse_api::telemetry::shutdown_telemetry().await;

    Ok(())
}
