//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{blob::FsBlobStore, db::DbAdapter},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        comments::{add_comment_handler, delete_comment_handler, list_comments_handler},
        live::live_ratings_handler,
        middleware::require_auth,
        parties::{
            create_party_handler, delete_party_handler, join_party_handler, list_parties_handler,
            party_detail_handler, rate_party_handler, upload_cover_handler, upload_media_handler,
            ApiDoc,
        },
        profile::{get_me_handler, update_me_handler, user_stats_handler},
        state::AppState,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Adapters & Build the Shared AppState ---
    let blob_store = Arc::new(FsBlobStore::new(
        config.blob_root.clone(),
        config.public_base_url.clone(),
    ));

    let app_state = Arc::new(AppState {
        parties: db_adapter.clone(),
        comments: db_adapter.clone(),
        profiles: db_adapter.clone(),
        identity: db_adapter,
        blobs: blob_store,
        config: config.clone(),
    });

    // --- 4. CORS for the browser front-end ---
    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .nest_service("/blobs", ServeDir::new(&config.blob_root));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/parties",
            post(create_party_handler).get(list_parties_handler),
        )
        .route(
            "/parties/{party_id}",
            get(party_detail_handler).delete(delete_party_handler),
        )
        .route("/parties/{party_id}/rating", put(rate_party_handler))
        .route("/parties/{party_id}/join", post(join_party_handler))
        .route("/parties/{party_id}/cover", post(upload_cover_handler))
        .route("/parties/{party_id}/media", post(upload_media_handler))
        .route(
            "/parties/{party_id}/comments",
            post(add_comment_handler).get(list_comments_handler),
        )
        .route("/comments/{comment_id}", delete(delete_comment_handler))
        .route("/parties/{party_id}/live", get(live_ratings_handler))
        .route("/me", get(get_me_handler).put(update_me_handler))
        .route("/users/{user_id}/stats", get(user_stats_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
