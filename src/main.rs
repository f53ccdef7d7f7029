//! `azure-openai-proxy` binary.

// crates.io
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
// self
use azure_openai_proxy::{config::ProxyConfig, server};

fn init_telemetry(config: &ProxyConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

	if config.json_logs {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json().with_target(true).with_thread_ids(false))
			.init();
	} else {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().with_target(false).with_thread_ids(false))
			.init();
	}
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let config = ProxyConfig::parse();

	init_telemetry(&config);
	server::serve(config).await?;

	Ok(())
}
