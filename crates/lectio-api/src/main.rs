use lectio_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = lectio_api::setup::initialize_app(config.clone()).await?;

    lectio_api::setup::server::start_server(&config, app.router, app.task_queue).await?;

    Ok(())
}
