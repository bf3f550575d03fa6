use axum::Router;

use crate::state::SharedState;

pub mod announcements;
pub mod docs;
pub mod floor;
pub mod health;
pub mod sse;
pub mod stations;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(stations::router())
        .merge(announcements::router())
        .merge(floor::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
