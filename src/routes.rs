use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::config;
use crate::handlers::{elevated, protected, public};
use crate::middleware::{jwt_auth_middleware, require_module, require_permission};
use crate::state::AppState;

/// Full application router
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(event_routes())
        .merge(crew_routes())
        .merge(warehouse_routes())
        .merge(offer_routes())
        .merge(self_routes())
        .merge(elevated_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_auth_middleware));

    let mut app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(api)
        .layer(DefaultBodyLimit::max(config().api.max_request_size_bytes))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer() {
        app = app.layer(cors);
    }

    app.with_state(state)
}

fn cors_layer() -> Option<CorsLayer> {
    let security = &config().security;
    if !security.enable_cors {
        return None;
    }
    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

fn event_routes() -> Router<AppState> {
    use protected::{calendar, events};

    Router::new()
        .route("/api/events", get(events::list).post(events::create))
        .route(
            "/api/events/:id",
            get(events::get).patch(events::update).delete(events::delete),
        )
        .route("/api/events/:id/calendar", post(calendar::push))
        .route("/api/events/:id/folder", post(events::folder))
        .route("/api/calendar/sync", post(calendar::sync))
        .route_layer(from_fn_with_state("events", require_module))
}

fn crew_routes() -> Router<AppState> {
    use protected::crew;

    Router::new()
        .route(
            "/api/events/:id/positions",
            get(crew::positions_list).post(crew::positions_create),
        )
        .route("/api/events/:id/conflicts", get(crew::conflicts))
        .route(
            "/api/positions/:id",
            patch(crew::position_update).delete(crew::position_delete),
        )
        .route("/api/positions/:id/assignments", post(crew::assign))
        .route_layer(from_fn_with_state("crew", require_module))
}

fn warehouse_routes() -> Router<AppState> {
    use protected::warehouse;

    Router::new()
        .route(
            "/api/warehouse/items",
            get(warehouse::items_list).post(warehouse::item_create),
        )
        .route(
            "/api/warehouse/items/:id",
            get(warehouse::item_get)
                .patch(warehouse::item_update)
                .delete(warehouse::item_delete),
        )
        .route(
            "/api/warehouse/kits",
            get(warehouse::kits_list).post(warehouse::kit_create),
        )
        .route(
            "/api/warehouse/kits/:id",
            get(warehouse::kit_get)
                .patch(warehouse::kit_update)
                .delete(warehouse::kit_delete),
        )
        .route("/api/warehouse/kits/:id/items", put(warehouse::kit_items_replace))
        .route(
            "/api/warehouse/reservations",
            get(warehouse::reservations_list).post(warehouse::reservation_create),
        )
        .route(
            "/api/warehouse/reservations/:id",
            patch(warehouse::reservation_update).delete(warehouse::reservation_delete),
        )
        .route("/api/warehouse/availability", get(warehouse::availability))
        .route("/api/events/:id/picklist.xlsx", get(warehouse::picklist))
        .route_layer(from_fn_with_state("warehouse", require_module))
}

fn offer_routes() -> Router<AppState> {
    use protected::offers;

    Router::new()
        .route("/api/offers", get(offers::list).post(offers::create))
        .route(
            "/api/offers/:id",
            get(offers::get).patch(offers::update).delete(offers::delete),
        )
        .route(
            "/api/offers/:id/items",
            get(offers::items_list).post(offers::item_create),
        )
        .route(
            "/api/offers/:id/items/:item_id",
            patch(offers::item_update).delete(offers::item_delete),
        )
        .route("/api/offers/:id/recalculate", post(offers::recalculate))
        .route("/api/offers/:id/pdf", get(offers::pdf))
        .route_layer(from_fn_with_state("offers", require_module))
}

/// Routes every authenticated user reaches; handlers check what they need
fn self_routes() -> Router<AppState> {
    use protected::{crew, users};

    Router::new()
        .route("/api/users/me", get(users::me))
        .route("/api/users", get(users::list))
        .route("/api/users/:id", get(users::get))
        .route("/api/assignments/mine", get(crew::mine))
        .route(
            "/api/assignments/:id",
            patch(crew::assignment_update).delete(crew::assignment_delete),
        )
        .route("/api/modules", get(users::modules))
        .route("/api/permissions", get(users::permissions))
}

/// Shares `/api/users` and `/api/users/:id` with `self_routes`; merging keeps
/// the guard on these methods only.
fn elevated_routes() -> Router<AppState> {
    use elevated::users;

    Router::new()
        .route("/api/users", post(users::create))
        .route("/api/users/:id", patch(users::update).delete(users::deactivate))
        .route(
            "/api/users/:id/modules",
            get(users::grants).put(users::modules_replace),
        )
        .route(
            "/api/users/:id/permissions",
            get(users::grants).put(users::permissions_replace),
        )
        .route_layer(from_fn_with_state(elevated::USERS_MANAGE, require_permission))
}
