use crate::{config::AppConfig, metrics, routes, state};
use anyhow::Result;
use std::{fs::OpenOptions, sync::Arc};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

pub async fn start() -> Result<()> {
	let cfg = AppConfig::new()?;
	cfg.validate()?;

	init_tracing_subscriber(
		cfg.server.log.file.clone(),
		cfg.server.log.filter_directives.as_str(),
	);

	let metrics_handle = metrics::setup_metrcis();
	let app_state =
		state::build_state(Arc::new(cfg.clone()), Arc::new(metrics_handle));

	let app = routes::new_router(app_state);

	let listener = tokio::net::TcpListener::bind(cfg.server.listen_addr.clone())
		.await?;
	info!("Listening on: {}", cfg.server.listen_addr);
	axum::serve(listener, app).await?;
	Ok(())
}

fn init_tracing_subscriber(file: String, filter_directives: &str) {
	tracing_subscriber::registry()
		.with(tracing_subscriber::EnvFilter::new(filter_directives))
		.with(
			tracing_subscriber::fmt::layer()
				.json()
				.with_writer(move || get_writer(file.clone())),
		)
		.init();
}

fn get_writer(file: String) -> Box<dyn std::io::Write> {
	if file.as_str().eq_ignore_ascii_case("stdout") {
		Box::new(std::io::stdout())
	} else if file.as_str().eq_ignore_ascii_case("stderr") {
		Box::new(std::io::stderr())
	} else {
		Box::new(
			OpenOptions::new()
				.append(true)
				.create(true)
				.open(file)
				.unwrap(),
		)
	}
}
