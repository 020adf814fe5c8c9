use std::{process, sync::Arc};

use native_render::{
    application::{
        error::AppError,
        native::{NativeRenderer, RenderConfiguration, SdkAssets},
        ports::{QueryExecutor, RenderLogger, SdkVersionManager, TrackingSink},
        sdk::SdkVersionResolver,
    },
    config,
    domain::types::{FundingSource, RenderMode},
    infra::{
        error::InfraError,
        graphql::GraphqlClient,
        http,
        sdk::PackageCacheVersionManager,
        telemetry,
        tracking::{
            BeaconTrackingSink, FanoutTrackingSink, TracingRenderLogger, TracingTrackingSink,
        },
    },
};
use tokio::task::JoinHandle;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::SdkVersion(_) => run_sdk_version(settings).await,
    }
}

async fn open_sdk_manager(
    settings: &config::SdkSettings,
) -> Result<Arc<PackageCacheVersionManager>, AppError> {
    let manager = PackageCacheVersionManager::open(
        settings.cache_dir.clone(),
        settings.package.clone(),
        settings.live_version.clone(),
        settings.cdn_base_url.clone(),
        settings.install_timeout,
    )
    .await?;
    Ok(Arc::new(manager))
}

async fn run_sdk_version(settings: config::Settings) -> Result<(), AppError> {
    let manager = open_sdk_manager(&settings.sdk).await?;
    let resolver = SdkVersionResolver::new(manager, settings.sdk.package.clone());
    let version = resolver.resolve().await?;
    println!("{} {}", resolver.package(), version);
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let manager = open_sdk_manager(&settings.sdk).await?;
    let renderers = build_renderers(&settings, manager.clone())?;
    let refresh_handle = spawn_sdk_refresh(manager, settings.sdk.refresh_interval);

    let result = serve_http(&settings, renderers).await;

    refresh_handle.abort();
    let _ = refresh_handle.await;

    result
}

fn build_renderers(
    settings: &config::Settings,
    manager: Arc<PackageCacheVersionManager>,
) -> Result<Vec<NativeRenderer>, AppError> {
    let query: Arc<dyn QueryExecutor> = Arc::new(GraphqlClient::new(
        settings.graphql.endpoint.clone(),
        settings.graphql.timeout,
    )?);
    let logger: Arc<dyn RenderLogger> = Arc::new(TracingRenderLogger);
    let tracking: Arc<dyn TrackingSink> = match settings.tracking.endpoint.clone() {
        Some(endpoint) => Arc::new(FanoutTrackingSink::new(vec![
            Box::new(TracingTrackingSink),
            Box::new(BeaconTrackingSink::new(endpoint, settings.tracking.timeout)?),
        ])),
        None => Arc::new(TracingTrackingSink),
    };
    let sdk_versions: Arc<dyn SdkVersionManager> = manager;
    let assets = SdkAssets::new(&settings.sdk.cdn_base_url, settings.sdk.package.clone());

    let mut renderers = Vec::new();
    for funding_source in FundingSource::ALL {
        let configuration = RenderConfiguration {
            query: query.clone(),
            logger: logger.clone(),
            tracking: tracking.clone(),
            funding_source,
            sdk_versions: sdk_versions.clone(),
        };
        for mode in [RenderMode::Popup, RenderMode::Fallback] {
            renderers.push(NativeRenderer::with_assets(
                mode,
                configuration.clone(),
                assets.clone(),
            ));
        }
    }
    Ok(renderers)
}

fn spawn_sdk_refresh(
    manager: Arc<PackageCacheVersionManager>,
    every: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            if let Err(err) = manager.refresh().await {
                warn!(target = "native::sdk", error = %err, "sdk cache refresh failed");
            }
        }
    })
}

async fn serve_http(
    settings: &config::Settings,
    renderers: Vec<NativeRenderer>,
) -> Result<(), AppError> {
    let router = http::build_router(renderers);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "native::serve",
        addr = %settings.server.addr,
        "listening"
    );

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    // Bound the drain: after the signal, in-flight renders get `grace` to finish.
    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(target = "native::serve", "graceful shutdown timed out");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "native::serve", error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "native::serve", "shutdown signal received");
}
