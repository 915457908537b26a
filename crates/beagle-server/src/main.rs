use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use clap::Parser;
use tracing::{error, info};

use beagle_api::{BuildServiceAdapter, HttpApi};
use beagle_core::{BuildService, MetricsHandle};
use beagle_exec::DockerRuntime;
use beagle_observe::{Subscriber, logger_init};
use beagle_prometheus::{Encoder, PrometheusMetrics, TextEncoder};

mod args;
use args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // 1) Logger
    logger_init(&args.logger()).context("failed to initialise logger")?;
    info!(version = env!("CARGO_PKG_VERSION"), "Beagle -- Project Ysondre");

    // 2) Runtime + metrics
    let runtime = DockerRuntime::new(args.docker()).context("invalid docker config")?;
    info!(program = %runtime.config().program, "using container engine");
    let metrics = PrometheusMetrics::new().context("failed to register metrics")?;
    let handle: MetricsHandle = Arc::new(metrics.clone());

    // 3) Build service
    let service = Arc::new(
        BuildService::builder(Arc::new(runtime))
            .with_config(args.pipeline())
            .with_metrics(handle)
            .start()?,
    );
    let _sink = service.notifier().attach(Arc::new(Subscriber));
    info!(
        consumers = service.notifier().consumer_count(),
        notify_capacity = service.config().notify_capacity,
        "completion sink attached"
    );

    // 4) HTTP
    let api = HttpApi::new(Arc::new(BuildServiceAdapter::new(service.clone())))
        .with_body_limit(args.max_archive_bytes)
        .router();
    let app = api.merge(metrics_router(metrics));

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(listen = %args.listen, "http gateway listening");

    let fatal = service.fatal();
    let stop = fatal.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        error!(error = %e, "failed to listen for ctrl-c");
                    }
                    info!("shutting down...");
                }
                _ = stop.cancelled() => error!("build service failed; shutting down"),
            }
        })
        .await
        .context("http server failed")?;

    service.shutdown().await;

    if fatal.is_cancelled() {
        anyhow::bail!("build service stopped after an unrecoverable error");
    }
    Ok(())
}

fn metrics_router(metrics: PrometheusMetrics) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}

/// GET /metrics
async fn render_metrics(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        ),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain".to_string())],
                e.to_string(),
            )
        }
    }
}
