use cutroom_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize the application (content store, cleanup, routes)
    let (state, router) = cutroom_api::setup::initialize_app(config.clone()).await?;

    // Serve until SIGINT/SIGTERM, then flush logs
    cutroom_api::setup::server::start_server(&config, state, router).await?;

    Ok(())
}
