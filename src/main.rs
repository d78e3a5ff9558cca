use std::{process, sync::Arc};

use reelview::{
    application::{
        catalog::CatalogService,
        error::AppError,
        format::ImageUrls,
    },
    cache::{CacheConfig, CacheStore, ReadThrough},
    config::{self, ProbeArgs, ProbeResource},
    domain::catalog::{MediaType, MovieList, Page, SearchQuery, TimeWindow, TvList},
    infra::{
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        upstream::{TmdbClient, TmdbClientConfig},
    },
};
use serde::Serialize;
use tokio::sync::Notify;
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
        config::Command::Probe(args) => run_probe(settings, args).await,
    }
}

fn build_catalog(settings: &config::Settings) -> Result<Arc<CatalogService>, AppError> {
    let cache_config = CacheConfig::from(&settings.cache);
    let store = Arc::new(CacheStore::new(&cache_config));
    let cache = Arc::new(ReadThrough::new(store, &cache_config));

    if settings.upstream.api_key.is_none() {
        warn!("no metadata API key configured; catalog requests will fail until one is set");
    }
    let client = TmdbClient::new(TmdbClientConfig::from(&settings.upstream))
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        cache_enabled = cache_config.enabled,
        max_entries = cache_config.max_entries,
        upstream = %settings.upstream.base_url,
        language = %settings.upstream.language,
        "catalog initialised"
    );

    Ok(Arc::new(CatalogService::new(Arc::new(client), cache)))
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let catalog = build_catalog(&settings)?;
    let state = HttpState::new(
        catalog,
        ImageUrls::new(settings.upstream.image_base_url.as_str()),
    );
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(addr = %settings.server.addr, "listening");

    let shutdown = Arc::new(Notify::new());
    let drain = Arc::clone(&shutdown);
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move { drain.notified().await })
            .await
    });

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        () = shutdown_signal() => {}
    }

    info!(
        grace_seconds = settings.server.graceful_shutdown.as_secs(),
        "shutdown signal received; draining connections"
    );
    shutdown.notify_one();

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!("graceful shutdown timed out; exiting with open connections");
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::from(InfraError::from(err))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

async fn run_probe(settings: config::Settings, args: ProbeArgs) -> Result<(), AppError> {
    let catalog = build_catalog(&settings)?;
    let page = Page::from_query(args.page)?;

    match args.resource {
        ProbeResource::Trending => {
            let media = parse_or_default::<MediaType>(args.kind.as_deref())?;
            let window = parse_or_default::<TimeWindow>(args.window.as_deref())?;
            print_json(catalog.trending(media, window).await?.as_ref(), args.compact)
        }
        ProbeResource::Movies => {
            let list = args
                .kind
                .as_deref()
                .map_or(Ok(MovieList::Popular), str::parse::<MovieList>)?;
            print_json(catalog.movies(list, page).await?.as_ref(), args.compact)
        }
        ProbeResource::Tv => {
            let list = args
                .kind
                .as_deref()
                .map_or(Ok(TvList::Popular), str::parse::<TvList>)?;
            print_json(catalog.tv_shows(list, page).await?.as_ref(), args.compact)
        }
        ProbeResource::Search => {
            let query = SearchQuery::parse(args.query.as_deref().unwrap_or_default())?;
            print_json(
                catalog.search_multi(&query, page).await?.as_ref(),
                args.compact,
            )
        }
    }
}

fn parse_or_default<T>(value: Option<&str>) -> Result<T, AppError>
where
    T: Default + std::str::FromStr<Err = reelview::domain::error::DomainError>,
{
    match value {
        Some(value) => Ok(value.parse()?),
        None => Ok(T::default()),
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<(), AppError> {
    let rendered = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
