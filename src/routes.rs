use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config;
use crate::handlers::{protected, public};
use crate::middleware::{ensure_profile_middleware, jwt_auth_middleware};

/// Full application router: public routes plus everything behind the bearer gate
pub fn app() -> Router {
    let cfg = config::config();

    let mut app = Router::new()
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(protected_routes());

    if cfg.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    if cfg.security.enable_cors {
        app = app.layer(cors_layer(&cfg.security.cors_origins));
    }
    app
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") || origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

/// Routes requiring a valid JWT; the caller's profile row is created on first use
fn protected_routes() -> Router {
    Router::new()
        .merge(profile_routes())
        .merge(sharing_routes())
        .merge(content_routes())
        .merge(household_routes())
        .merge(photo_routes())
        .merge(push_routes())
        .route_layer(middleware::from_fn(ensure_profile_middleware))
        .route_layer(middleware::from_fn(jwt_auth_middleware))
}

fn profile_routes() -> Router {
    use protected::profile;

    Router::new()
        .route("/api/profile", get(profile::get).put(profile::update))
        .route("/api/profile/tiles", get(profile::tiles))
        .route("/api/profile/tiles/:tile", put(profile::set_tile))
        .route("/api/profile/tiles/:tile/toggle", post(profile::toggle_tile))
}

fn sharing_routes() -> Router {
    use protected::{groups, partners, topics};

    Router::new()
        // Partner links
        .route("/api/partners", get(partners::list).post(partners::link))
        .route("/api/partners/lookup", get(partners::lookup))
        .route("/api/partners/:id", delete(partners::unlink))
        // Groups and membership
        .route("/api/groups", get(groups::list).post(groups::create))
        .route("/api/groups/:id", put(groups::rename).delete(groups::delete))
        .route(
            "/api/groups/:id/members",
            get(groups::members).post(groups::add_member),
        )
        .route(
            "/api/groups/:id/members/:user_id",
            put(groups::change_role).delete(groups::remove_member),
        )
        // Topics
        .route("/api/topics", get(topics::list).post(topics::create))
        .route("/api/topics/:id", put(topics::rename).delete(topics::delete))
}

fn content_routes() -> Router {
    use protected::{events, notes, shopping, todos};

    Router::new()
        .route("/api/notes", get(notes::list).post(notes::create))
        .route(
            "/api/notes/:id",
            get(notes::get).put(notes::update).delete(notes::delete),
        )
        .route("/api/todos", get(todos::list).post(todos::create))
        .route("/api/todos/:id", put(todos::update).delete(todos::delete))
        .route("/api/shopping", get(shopping::list).post(shopping::create))
        .route("/api/shopping/checked", delete(shopping::clear_checked))
        .route("/api/shopping/:id", put(shopping::update).delete(shopping::delete))
        .route("/api/events", get(events::list).post(events::create))
        .route("/api/events/:id", put(events::update).delete(events::delete))
}

fn household_routes() -> Router {
    use protected::{dogs, recipes, routines};

    Router::new()
        // Recipes and pantry
        .route("/api/recipes", get(recipes::catalog))
        .route("/api/recipes/matches", get(recipes::matches))
        .route("/api/recipes/:id", get(recipes::detail))
        .route("/api/pantry", get(recipes::pantry).post(recipes::add_to_pantry))
        .route("/api/pantry/:ingredient", delete(recipes::remove_from_pantry))
        // Dogs
        .route("/api/dogs", get(dogs::list).post(dogs::create))
        .route("/api/dogs/:id", put(dogs::update).delete(dogs::delete))
        .route("/api/dogs/:id/meals", get(dogs::meals))
        .route("/api/dogs/:id/meals/toggle", post(dogs::toggle_meal))
        // Routines
        .route("/api/routines", get(routines::list).post(routines::create))
        .route("/api/routines/today", get(routines::scheduled))
        .route("/api/routines/:id", put(routines::update).delete(routines::delete))
        .route("/api/routines/:id/progress", get(routines::progress))
        .route("/api/routines/:id/toggle", post(routines::toggle_item))
}

fn photo_routes() -> Router {
    use protected::photos;

    let max_upload = config::config().api.max_upload_bytes;
    Router::new()
        .route(
            "/api/photos",
            get(photos::list)
                .post(photos::upload)
                .layer(DefaultBodyLimit::max(max_upload)),
        )
        .route("/api/photos/:id", delete(photos::delete))
        .route("/api/photo-slots", get(photos::slots))
        .route("/api/photo-slots/:slot", put(photos::assign).delete(photos::clear_slot))
}

fn push_routes() -> Router {
    use protected::push;

    Router::new()
        .route("/api/config/push", get(push::client_config))
        .route("/api/push/devices", post(push::register))
        .route("/api/push/devices/:player_id", delete(push::unregister))
        .route("/functions/send-push", post(push::send))
}
