//! Merchant service: connect to Postgres, repair the stale index, serve HTTP, register with
//! Consul, and leave in reverse order on SIGINT/SIGTERM.
use std::process::ExitCode;

use common_metrics::setup_metrics_routes;
use envconfig::Envconfig;
use eyre::{Result, WrapErr};
use lifecycle::{Orchestrator, ReadinessHandler, ShutdownReport, ShutdownSignal, SignalHandler};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use merchant_service::config::Config;
use merchant_service::handlers::{app, AppState};
use merchant_service::listener::HttpListener;
use merchant_service::migration::PgIndexGuard;
use merchant_service::registry::ConsulClient;
use merchant_service::store::PgStoreConnector;

fn setup_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "merchant_service=info,lifecycle=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn run() -> Result<ShutdownReport> {
    let config = Config::init_from_env().wrap_err("invalid configuration")?;

    let shutdown = ShutdownSignal::new();
    let _signal_task = SignalHandler::new(shutdown.clone())
        .install()
        .wrap_err("failed to install signal handlers")?;

    let router = app(AppState::new(
        &config.service_name,
        ReadinessHandler::new(shutdown.clone()),
    ));
    let router = if config.export_prometheus {
        setup_metrics_routes(router).wrap_err("failed to install metrics recorder")?
    } else {
        router
    };

    let store = PgStoreConnector::new(config.max_pg_connections, config.store_timeout_ms.0);
    let guard = PgIndexGuard::new(config.store_timeout_ms.0);
    let listener = HttpListener::new(config.bind(), router, config.shutdown_drain_ms.0);
    let registry = ConsulClient::new(
        &config.consul.consul_url,
        config.consul.consul_token.clone(),
        config.consul.registry_timeout_ms.0,
    )
    .wrap_err("invalid registry configuration")?;

    let options = config.orchestrator_options();
    info!(
        service_id = %options.identity.id(),
        bind = %config.bind(),
        consul = %config.consul.consul_url,
        "starting merchant service"
    );

    let report = Orchestrator::new(options, store, guard, listener, registry, shutdown)
        .run()
        .await?;
    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_tracing();

    match run().await {
        Ok(report) => {
            info!(
                reached = %report.reached,
                clean = report.is_clean(),
                "merchant service exited"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("merchant service failed to start: {e:?}");
            ExitCode::FAILURE
        }
    }
}
