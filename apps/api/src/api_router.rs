use axum::Router;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use jobgate_core::AppError;
use jobgate_domain::ThrottleCategory;
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::state::AppState;
use crate::{auth, handlers, middleware};

mod cors;


use cors::build_cors_layer;

pub fn build_router<S>(
    app_state: AppState,
    frontend_origin: &str,
    session_layer: SessionManagerLayer<S>,
) -> Result<Router, AppError>
where
    S: SessionStore + Clone,
{
    let login_routes = throttled(
        Router::new().route("/api/auth/login", post(auth::login_handler)),
        ThrottleCategory::Auth,
        &app_state,
    );

    let register_routes = throttled(
        Router::new().route("/api/auth/register", post(auth::register_handler)),
        ThrottleCategory::Register,
        &app_state,
    );

    let password_reset_routes = throttled(
        Router::new()
            .route(
                "/api/auth/forgot-password",
                post(auth::forgot_password_handler),
            )
            .route("/api/auth/reset-password", post(auth::reset_password_handler)),
        ThrottleCategory::PasswordReset,
        &app_state,
    );

    let application_routes = authenticated(throttled(
        Router::new().route(
            "/api/jobs/{job_id}/applications",
            post(handlers::intake::submit_application_handler),
        ),
        ThrottleCategory::Application,
        &app_state,
    ));

    let message_routes = authenticated(throttled(
        Router::new().route("/api/messages", post(handlers::intake::send_message_handler)),
        ThrottleCategory::Message,
        &app_state,
    ));

    let upload_routes = authenticated(throttled(
        Router::new().route(
            "/api/uploads",
            post(handlers::intake::upload_handler)
                .layer(DefaultBodyLimit::max(app_state.upload_max_bytes)),
        ),
        ThrottleCategory::Upload,
        &app_state,
    ));

    // Admin checks run before the admin throttle so other roles never
    // consume admin budget.
    let admin_routes = Router::new()
        .route(
            "/api/admin/throttle/buckets/{category}/{identity}",
            get(handlers::throttle::get_bucket_handler)
                .delete(handlers::throttle::reset_bucket_handler),
        )
        .route_layer(from_fn_with_state(app_state.clone(), middleware::throttle))
        .route_layer(from_fn(middleware::require_admin))
        .route_layer(from_fn(middleware::require_auth))
        .layer(Extension(ThrottleCategory::Admin));

    let session_routes = Router::new()
        .route("/api/auth/me", get(auth::me_handler))
        .route_layer(from_fn(middleware::require_auth));

    let api_routes = Router::new()
        .route("/api/health", get(handlers::health::health_handler))
        .route(
            "/api/throttle/policies",
            get(handlers::throttle::list_policies_handler),
        )
        .route("/api/auth/logout", post(auth::logout_handler))
        .merge(session_routes)
        .merge(login_routes)
        .merge(register_routes)
        .merge(password_reset_routes)
        .merge(application_routes)
        .merge(message_routes)
        .merge(upload_routes)
        .merge(admin_routes);

    Ok(throttled(api_routes, ThrottleCategory::General, &app_state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(frontend_origin)?)
        .layer(session_layer)
        .with_state(app_state))
}

/// Guards every route currently in `routes` with the category's throttle.
fn throttled(
    routes: Router<AppState>,
    category: ThrottleCategory,
    app_state: &AppState,
) -> Router<AppState> {
    routes
        .route_layer(from_fn_with_state(app_state.clone(), middleware::throttle))
        .layer(Extension(category))
}

/// Requires a session before any throttle on `routes` counts the request.
fn authenticated(routes: Router<AppState>) -> Router<AppState> {
    routes.route_layer(from_fn(middleware::require_auth))
}
