mod api;
mod artist_images;
mod assets;
mod auth;
mod config;
mod external;
mod fixer;
mod recommend;
mod state;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use api::api_router;
use assets::{serve_asset, serve_frontend};
use auth::AuthStore;
use config::{
    apply_env_overrides, config_dir, config_path_from_env, load_or_create_config, resolve_path,
    FrontendPaths,
};
use external::{ArtistSearch, DeezerSearch, GeminiModel, TextModel};
use fixer::{start_metadata_fixer, MetadataFixer, TokioPacer};
use library::Catalog;
use reqwest::Client;
use state::AppState;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = config_path_from_env();
    let (mut config, created) = load_or_create_config(&config_path)?;
    if created {
        info!("Created default config at {:?}", config_path);
    } else {
        info!("Loaded config from {:?}", config_path);
    }
    apply_env_overrides(&mut config);

    let frontend = FrontendPaths::resolve(&resolve_path(&config_path, &config.frontend_dir));
    if frontend.production() {
        info!("Serving built frontend from {:?}", frontend.dist_dir);
    } else {
        info!("Frontend not built; assets served from {:?}", frontend.assets_dir);
    }

    let catalog = match Catalog::open_url(&config.database_url, &config_dir(&config_path)) {
        Ok(catalog) => catalog,
        Err(err) => {
            error!("Failed to open database {:?}: {}", config.database_url, err);
            return Err(err.into());
        }
    };
    if let Err(err) = catalog.init_tables() {
        warn!("Failed to create tables: {}", err);
    }
    match catalog.ensure_profile_pic_column() {
        Ok(true) => info!("Added profile_pic column to users"),
        Ok(false) => {}
        Err(err) => warn!("Profile picture migration skipped: {}", err),
    }

    let auth = AuthStore::new(catalog.clone(), Duration::from_secs(config.session_ttl_secs));
    match auth.purge_expired_sessions() {
        Ok(0) => {}
        Ok(count) => info!("Purged {} expired sessions", count),
        Err(err) => warn!("Failed to purge sessions: {}", err),
    }
    info!("Sessions expire after {}s", auth.session_ttl().as_secs());

    let client = Client::builder().user_agent("rhymic/0.1").build()?;
    let model: Option<Arc<dyn TextModel>> = if config.ai.enabled() {
        let gemini = GeminiModel::new(
            client.clone(),
            &config.ai.base_url,
            &config.ai.model,
            &config.ai.api_key,
            Duration::from_secs(config.ai.timeout_secs),
        );
        info!("AI model {} configured", gemini.model());
        Some(Arc::new(gemini))
    } else {
        info!("No AI key configured; recommendations fall back to random picks");
        None
    };
    let artist_search: Arc<dyn ArtistSearch> = Arc::new(DeezerSearch::new(
        client,
        &config.artist_search_url,
        Duration::from_secs(config.artist_search_timeout_secs),
    ));

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let state = AppState {
        catalog: catalog.clone(),
        auth,
        config: Arc::new(config),
        frontend,
        model,
        artist_search,
        shutdown: CancellationToken::new(),
    };

    let scan_catalog = catalog.clone();
    let assets_dir = state.frontend.assets_dir.clone();
    let scanned = match tokio::task::spawn_blocking(move || scan_catalog.scan_library(&assets_dir))
        .await
    {
        Ok(Ok(_)) => true,
        Ok(Err(err)) => {
            warn!("Library scan failed: {}", err);
            false
        }
        Err(err) => {
            warn!("Library scan task failed: {}", err);
            false
        }
    };

    let fixer_task = match &state.model {
        Some(model) if scanned => {
            let fixer = MetadataFixer::new(
                catalog,
                Arc::clone(model),
                Arc::new(TokioPacer),
                state.config.fixer.clone(),
            );
            Some(start_metadata_fixer(fixer, state.shutdown.clone()))
        }
        Some(_) => {
            warn!("Metadata fixer not started because the library scan failed");
            None
        }
        None => None,
    };

    let app = Router::new()
        .route("/assets/*path", get(serve_asset))
        .fallback(serve_frontend)
        .with_state(state.clone())
        .nest("/api", api_router(state.clone()))
        .layer(CorsLayer::permissive())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    if let Some(task) = fixer_task {
        if let Err(err) = task.await {
            warn!("Metadata fixer ended abnormally: {}", err);
        }
    }
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
    shutdown.cancel();
}
