use axum::{
    Router,
    routing::{get, post, put},
};
use bb8_redis::{RedisConnectionManager, bb8, redis};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;

use crate::configuration::get_configuration;
use crate::routes::auth::{authorize_handler, register_handler};
use crate::routes::links::{
    collection_method_not_allowed, create_link, delete_link, link_method_not_allowed, list_links,
    update_link,
};
use crate::routes::qr::link_qr;
use crate::routes::redirect::redirect;
use crate::services::{AuthService, LinkService, ProjectService};
use crate::store::{LinkStore, ProjectRepository, UserRepository};

#[derive(Clone)]
pub struct AppState {
    pub link_service: LinkService,
    pub project_service: ProjectService,
    pub auth_service: AuthService,
}

pub async fn run() -> anyhow::Result<()> {
    let cfg = get_configuration()?;

    let manager = RedisConnectionManager::new(cfg.redis.url.clone())?;
    let redis_pool = bb8::Pool::builder().build(manager).await?;
    {
        // ping the store before accepting traffic
        let mut conn = redis_pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
    }

    let pg_pool = PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(cfg.database.with_db());

    let link_service = LinkService::new(LinkStore::new(redis_pool));
    let project_service = ProjectService::new(ProjectRepository::new(pg_pool.clone()));
    let auth_service = AuthService::new(UserRepository::new(pg_pool));

    let app_state = AppState {
        link_service,
        project_service,
        auth_service,
    };

    let app = Router::new()
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/authorize", post(authorize_handler))
        .route(
            "/api/projects/{slug}/links",
            get(list_links)
                .post(create_link)
                .fallback(collection_method_not_allowed),
        )
        .route(
            "/api/projects/{slug}/links/{key}",
            put(update_link)
                .delete(delete_link)
                .fallback(link_method_not_allowed),
        )
        .route("/api/projects/{slug}/links/{key}/qr", get(link_qr))
        .route("/{key}", get(redirect))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let address = format!("{}:{}", cfg.application.host, cfg.application.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Listening on {}", address);
    axum::serve(listener, app).await?;
    Ok(())
}
