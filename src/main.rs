use anyhow::Context;
use turfbook_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load turfbook settings")?;
    turfbook_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        database = %settings.database.name,
        "turfbook bootstrap starting"
    );

    turfbook_app::run(settings).await
}
