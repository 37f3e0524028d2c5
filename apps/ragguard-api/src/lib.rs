pub mod routes;
pub mod state;

use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use color_eyre::eyre;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(
	version = ragguard_cli::VERSION,
	rename_all = "kebab",
	styles = ragguard_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = ragguard_config::load(&args.config)?;

	init_tracing(&config)?;

	let http_addr: SocketAddr = config.service.http_bind.parse()?;
	let admin_addr: SocketAddr = config.service.admin_bind.parse()?;

	check_binds(&config, http_addr, admin_addr)?;

	let state = AppState::new(config, Some(args.config))?;
	let app = routes::router(state.clone());
	let admin_app = routes::admin_router(state);
	let http_listener = TcpListener::bind(http_addr).await?;

	tracing::info!(%http_addr, "HTTP server listening.");

	let http_server = axum::serve(http_listener, app).with_graceful_shutdown(shutdown_signal());
	let admin_listener = TcpListener::bind(admin_addr).await?;

	tracing::info!(%admin_addr, "Admin server listening.");

	let admin_server =
		axum::serve(admin_listener, admin_app).with_graceful_shutdown(shutdown_signal());

	tokio::try_join!(http_server, admin_server)?;

	Ok(())
}

/// The admin listener is always loopback. The query listener is loopback unless
/// `security.bind_localhost_only` is off.
pub fn check_binds(
	config: &ragguard_config::Config,
	http_addr: SocketAddr,
	admin_addr: SocketAddr,
) -> color_eyre::Result<()> {
	if config.security.bind_localhost_only && !http_addr.ip().is_loopback() {
		return Err(eyre::eyre!(
			"http_bind must be a loopback address when bind_localhost_only is true."
		));
	}
	if !admin_addr.ip().is_loopback() {
		return Err(eyre::eyre!("admin_bind must be a loopback address."));
	}

	Ok(())
}

fn init_tracing(config: &ragguard_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	Ok(())
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::warn!(error = %err, "Failed to listen for shutdown signal.");

		std::future::pending::<()>().await;
	}
}
