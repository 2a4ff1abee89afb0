use anyhow::Context;
use jasper_config::JasperConfig;
use jasper_engine::JasperEngine;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => JasperConfig::load(path.as_str())
            .with_context(|| format!("loading config from {path}"))?,
        None => JasperConfig::default(),
    };

    // RUST_LOG wins over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let engine = JasperEngine::new(config).context("failed to start jasper engine")?;
    info!(node = engine.node_name(), "JASPER: device ready");

    let report = engine.run().context("fifo workload failed")?;
    info!(
        clients = report.clients,
        written = report.bytes_written,
        write_only_written = report.write_only_bytes_written,
        read = report.bytes_read,
        rejected = report.rejected_writes,
        "JASPER: run complete"
    );

    engine.shutdown();
    Ok(())
}
