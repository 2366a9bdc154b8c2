use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    bulk_create_handler, create_link_handler, delete_link_handler, get_link_handler,
    health_handler, link_clicks_handler, link_stats_handler, link_timeseries_handler,
    list_links_handler, overview_handler, qr_redirect_handler, redirect_handler, update_link_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .route("/stats", get(overview_handler))
            .route("/links", post(create_link_handler).get(list_links_handler))
            .route("/links/bulk", post(bulk_create_handler))
            .route(
                "/links/{code}",
                get(get_link_handler)
                    .patch(update_link_handler)
                    .delete(delete_link_handler),
            )
            .route("/links/{code}/stats", get(link_stats_handler))
            .route("/links/{code}/clicks", get(link_clicks_handler))
            .route("/links/{code}/timeseries", get(link_timeseries_handler))
            .route("/qr/{code}", get(qr_redirect_handler))
            .route("/{code}", get(redirect_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
