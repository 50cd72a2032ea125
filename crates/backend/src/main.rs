use std::sync::Arc;

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod calendar_client;
mod config;
mod db;
pub mod error;
mod handlers;
mod models;
mod schema;
mod services;

use crate::auth::AuthConfig;
use crate::calendar_client::{CalendarGateway, GoogleCalendarClient};
use crate::config::AppConfig;
use crate::db::DbPool;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<AppConfig>,
    pub auth_config: AuthConfig,
    pub gateway: Arc<dyn CalendarGateway>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,meeting_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let auth_config = AuthConfig::from_env().map_err(anyhow::Error::msg)?;

    let pool = db::establish_connection_pool(&config.database_url)?;
    tracing::info!("Database connection pool initialized");

    let gateway = GoogleCalendarClient::new(
        &config.calendar_base_url,
        config.calendar_timeout,
        config.calendar_patch_timeout,
    )?;
    tracing::info!(
        "Calendar gateway at {} (calendar {}, zone {})",
        config.calendar_base_url,
        config.calendar_id,
        config.timezone
    );

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        pool,
        config: Arc::new(config),
        auth_config,
        gateway: Arc::new(gateway),
    };
    let app = build_router(state);

    tracing::info!("Server listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Meeting routes
        .route("/meetings", post(handlers::create_meeting))
        .route("/meetings/:id", get(handlers::get_meeting))
        .route("/meetings/:id/start", post(handlers::start_recording))
        .route("/meetings/:id/finish", post(handlers::finish_meeting))
        .route("/meetings/:id/recording", post(handlers::attach_recording))
        .route("/meetings/:id/result", patch(handlers::update_meeting_result))
        .route("/meetings/:id/ai-summary", put(handlers::apply_ai_summary))
        // Calendar routes
        .route(
            "/calendar/events",
            get(handlers::list_calendar_events).post(handlers::create_calendar_event),
        )
        .route(
            "/calendar/events/:event_id",
            put(handlers::update_calendar_event).delete(handlers::delete_calendar_event),
        )
        .route(
            "/calendar/events/:event_id/importance",
            patch(handlers::toggle_event_importance),
        )
        .route(
            "/calendar/events/:event_id/completion",
            patch(handlers::set_event_completion),
        )
        // Maintenance
        .route("/admin/keywords/sweep", post(handlers::sweep_keywords))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let cors = build_cors_layer(state.config.cors_allowed_origins.as_deref());

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Only the listed origins when `CORS_ALLOWED_ORIGINS` is set, permissive
/// otherwise.
fn build_cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    match allowed_origins {
        Some(origins) => {
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();

            if origins.is_empty() {
                tracing::warn!(
                    "CORS_ALLOWED_ORIGINS is set but empty, using permissive CORS (not recommended for production)"
                );
                CorsLayer::permissive()
            } else {
                tracing::info!("CORS configured for origins: {:?}", origins);
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::PATCH,
                        Method::DELETE,
                        Method::OPTIONS,
                    ])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
                    .allow_credentials(true)
            }
        }
        None => {
            tracing::warn!(
                "CORS_ALLOWED_ORIGINS not set, using permissive CORS (not recommended for production)"
            );
            CorsLayer::permissive()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar_client::fake::FakeGateway;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let config = AppConfig::from_lookup(|key| {
            (key == "DATABASE_URL").then(|| "postgres://localhost/meeting_test".to_string())
        })
        .unwrap();
        let auth_config = AuthConfig {
            jwt_secret: "router-test-secret".to_string(),
            allowed_emails: vec![],
            token_duration_days: 7,
            cookie_name: "auth_token".to_string(),
        };
        AppState {
            pool: db::establish_connection_pool(&config.database_url).unwrap(),
            config: Arc::new(config),
            auth_config,
            gateway: Arc::new(FakeGateway::default()),
        }
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::get("/api/meetings/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_date_range_is_rejected() {
        let state = test_state();
        let token =
            auth::jwt::create_token(&state.auth_config, "host@example.com", None).unwrap();
        let app = build_router(state);

        let response = app
            .oneshot(
                Request::get("/api/calendar/events?start_date=03-01-2024&end_date=2024-03-02")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
