mod auth;
mod dashboard;
mod drivers;
mod health;
mod races;
mod resources;
mod users;

#[cfg(test)]
mod testing;

pub use health::{health_check, ping, root};
pub use resources::{detail_route, find_by_id, get_table_record, list_route, list_table, Page};

use crate::pool::Store;
use crate::registry::SchemaRegistry;
use crate::security::TokenCodec;
use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

/// Tables served read-only through the generic handlers alone
const READ_ONLY_TABLES: &[&str] = &["circuits", "constructors", "results", "status"];

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub registry: Arc<SchemaRegistry>,
    pub tokens: Arc<TokenCodec>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Store, registry: SchemaRegistry, tokens: TokenCodec) -> Self {
        Self {
            store: Arc::new(store),
            registry: Arc::new(registry),
            tokens: Arc::new(tokens),
            started_at: Instant::now(),
        }
    }
}

impl FromRef<AppState> for Arc<Store> {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<TokenCodec> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

/// All routes. Cross-cutting layers (tracing, CORS) are added by the binary.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        // Drivers
        .route("/drivers", list_route("drivers").post(drivers::create_driver))
        .route(
            "/drivers/:id",
            detail_route("drivers")
                .put(drivers::update_driver)
                .delete(drivers::delete_driver),
        )
        // Races
        .route("/races", list_route("races"))
        .route("/races/:id", detail_route("races"))
        .route("/races/:id/circuit", get(races::race_circuit))
        .route("/races/:id/drivers", get(races::race_drivers))
        .route("/races/:id/constructors", get(races::race_constructors))
        .route("/races/:id/details", get(races::race_details))
        // Dashboard reports
        .route("/dashboard/top_drivers_by_wins", get(dashboard::top_drivers_by_wins))
        .route(
            "/dashboard/constructor_championships",
            get(dashboard::constructor_championships),
        )
        .route("/dashboard/circuits_race_count", get(dashboard::circuits_race_count))
        .route(
            "/dashboard/driver_nationality_stats",
            get(dashboard::driver_nationality_stats),
        )
        .route(
            "/dashboard/season_results_overview",
            get(dashboard::season_results_overview),
        )
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        // User management
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        );

    for &table in READ_ONLY_TABLES {
        router = router
            .route(&format!("/{}", table), list_route(table))
            .route(&format!("/{}/:id", table), detail_route(table));
    }

    router.with_state(state)
}
