mod auth;
mod chat;
mod comments;
mod config;
mod db;
mod error;
mod metadata;
mod posts;
mod reports;
mod votes;

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::auth::Authorizer;

pub type DbPool = r2d2::Pool<r2d2_sqlite::SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub jwt_secret: String,
    pub authorizer: Authorizer,
    pub metadata_base_url: String,
    pub metadata_token: String,
    pub post_cooldown: chrono::Duration,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = config::Config::load();

    let manager = r2d2_sqlite::SqliteConnectionManager::file(&cfg.database_path);
    let pool = r2d2::Pool::new(manager).expect("Failed to create DB pool");

    db::run_migrations(&pool).expect("Failed to run migrations");

    let state = AppState {
        db: pool,
        jwt_secret: cfg.jwt_secret,
        authorizer: Authorizer::new(cfg.admin_emails),
        metadata_base_url: cfg.metadata_base_url,
        metadata_token: cfg.metadata_token,
        post_cooldown: chrono::Duration::seconds(cfg.post_cooldown_secs),
    };

    let cors = CorsLayer::new()
        .allow_origin(
            cfg.cors_origin
                .parse::<axum::http::HeaderValue>()
                .expect("Invalid CORS_ORIGIN"),
        )
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any());

    let app = Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/me", get(auth::me))
        // Posts
        .route("/api/posts", get(posts::list_posts).post(posts::create_post))
        .route(
            "/api/posts/{id}",
            get(posts::get_post)
                .patch(posts::edit_post)
                .delete(posts::delete_post),
        )
        .route("/api/posts/{id}/pin", put(posts::set_pinned))
        // Comments & replies
        .route("/api/posts/{id}/comments", post(comments::create_comment))
        .route(
            "/api/posts/{id}/comments/{cid}/replies",
            post(comments::create_reply),
        )
        .route(
            "/api/posts/{id}/content/{content_id}",
            patch(comments::edit_content).delete(comments::delete_content),
        )
        // Votes
        .route("/api/posts/{id}/votes", post(votes::cast_vote))
        // Chat
        .route(
            "/api/chat",
            get(chat::list_messages).post(chat::create_message),
        )
        // Reports & tickets
        .route("/api/reports", post(reports::create_report))
        .route("/api/tickets", post(reports::create_ticket))
        .route("/api/admin/inbox", get(reports::admin_inbox))
        .route(
            "/api/admin/inbox/{kind}/{id}/resolve",
            post(reports::resolve_inbox_item),
        )
        // Metadata
        .route("/api/metadata/search", get(metadata::search_titles))
        .route("/api/metadata/titles/{id}", get(metadata::get_title))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("0.0.0.0:{}", cfg.port);
    info!("API server listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await.expect("bind failed");
    axum::serve(listener, app).await.expect("server error");
}
