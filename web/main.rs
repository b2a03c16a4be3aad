mod auth;
mod categories;
mod comments;
mod error;
mod extract;
mod favorites;
mod history;
mod images;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{
        HeaderValue, Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, InvalidHeaderValue},
    },
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
};
use gallery::{
    app::{accounts, categories as category_service},
    prelude::*,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub storage: Arc<Storage>,
    pub upstream: Arc<UpstreamClient>,
    pub keys: Arc<TokenKeys>,
    pub config: Arc<AppConfig>,
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/signin", post(auth::signin))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/signout", post(auth::signout))
        .route("/images", get(images::list_images))
        .route("/images/search", get(images::search_images))
        .route("/images/local", get(images::search_local))
        .route("/images/mine", get(images::my_images))
        .route("/images/by-url", get(images::get_image_by_url))
        .route(
            "/images/upload",
            post(images::upload_image).layer(DefaultBodyLimit::max(images::MAX_UPLOAD_BYTES)),
        )
        .route("/images/uploads/{file}", get(images::serve_upload))
        .route("/images/external", post(images::save_external))
        .route(
            "/images/{id}",
            get(images::get_image).delete(images::delete_image),
        )
        .route("/images/{id}/like", post(images::like_image))
        .route("/images/{id}/privacy", put(images::set_privacy))
        .route(
            "/images/{id}/comments",
            post(comments::add_comment).get(comments::image_comments),
        )
        .route("/users/{id}/comments", get(comments::user_comments))
        .route("/favorites", get(favorites::list_favorites))
        .route("/favorites/batch", post(favorites::batch_add_favorites))
        .route("/favorites/check/{image_id}", get(favorites::check_favorite))
        .route(
            "/favorites/{image_id}",
            post(favorites::add_favorite).delete(favorites::remove_favorite),
        )
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/initialize",
            post(categories::initialize_categories),
        )
        // GET takes a name, DELETE an id.
        .route(
            "/categories/{key}",
            get(categories::get_category).delete(categories::delete_category),
        )
        .route("/search-history/save", post(history::save_search))
        .route("/search-history/user", get(history::list_searches))
        .route("/search-history/clear", delete(history::clear_searches))
        .layer(from_fn_with_state(state.clone(), extract::resolve_principal));

    Router::new().nest("/api", api).with_state(state)
}

fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    Ok(CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
        .expose_headers([AUTHORIZATION]))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(?config, "loaded configuration");

    let db = Database::connect(&config.database_url).await?;

    category_service::initialize_defaults(&db).await?;
    if let Some(password) = &config.admin_password {
        accounts::ensure_admin(&db, config.bcrypt_cost, password).await?;
    }

    let upstream = UpstreamClient::new(
        config.image_api_url.clone(),
        config.image_api_key.clone(),
        config.image_api_timeout,
    )?;
    let keys = TokenKeys::new(config.jwt_secret.as_bytes(), config.jwt_expiration);
    let storage = Storage::new(config.upload_dir.clone());
    let cors = cors_layer(&config.cors_origin)?;
    let bind_addr = config.bind_addr;

    let state = AppState {
        db: Arc::new(db),
        storage: Arc::new(storage),
        upstream: Arc::new(upstream),
        keys: Arc::new(keys),
        config: Arc::new(config),
    };

    let app = router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
