use anyhow::Context;

use proventory_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    proventory_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    if config.uses_dev_secret() {
        tracing::warn!("JWT_SECRET not set; using insecure dev default");
    }

    let app = proventory_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
