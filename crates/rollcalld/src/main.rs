use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod announcer;
mod config;
mod dbus_interface;
mod engine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = config::Config::load()?;
    let store = rollcall_store::AttendanceStore::open(&config.storage.db_path).await?;
    tracing::info!(db = %config.storage.db_path.display(), "attendance store opened");

    let announcer =
        announcer::Announcer::new(&config.announcer.command, config.announcer.enabled);
    let service = dbus_interface::AttendanceService::new(config, store, announcer);

    let _conn = zbus::connection::Builder::session()?
        .name("org.rollcall.Attendance1")?
        .serve_at("/org/rollcall/Attendance1", service)?
        .build()
        .await?;

    tracing::info!("rollcalld ready on org.rollcall.Attendance1");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");

    Ok(())
}
