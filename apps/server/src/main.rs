use anyhow::Context;
use quanx_engine::{Engine, FileConfigLoader};
use quanx_kernel::config::{DEFAULT_CONFIG_PATH, load_optional_config};
use quanx_logger::Logger;
use quanx_registry::global;
use quanx_registry::nacos::NacosRegistry;
use quanx_server::{AppSettings, HttpServer};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log = Logger::builder().name(env!("CARGO_PKG_NAME")).init()?;

    let settings: AppSettings = load_optional_config(Some(DEFAULT_CONFIG_PATH))
        .context("Critical: Configuration is malformed")?;

    if let Some(nacos) = settings.nacos {
        let registry = NacosRegistry::connect(nacos).context("Failed to create the Nacos client")?;
        global::init(Arc::new(registry))?;
    } else {
        info!("No Nacos settings, running without a registry");
    }

    let http = match global::active() {
        Some(registry) => HttpServer::new().with_registry(registry),
        None => HttpServer::new(),
    };

    let report = Engine::builder()
        .loader(FileConfigLoader::optional(DEFAULT_CONFIG_PATH))
        .server(http)
        .build()
        .run()
        .await?;

    global::close().await?;

    for failure in report.failures() {
        warn!(server = %failure.server, timed_out = failure.timed_out, reason = %failure.reason, "Unclean server shutdown");
    }
    Ok(())
}
