mod handlers;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;

pub fn create_router(db: Database) -> Router {
    let api = Router::new()
        // Feeds
        .route("/feeds", get(handlers::list_feeds).post(handlers::create_feed))
        .route("/feeds/{id}", get(handlers::get_feed))
        .route("/feeds/{id}/details", put(handlers::update_feed_details))
        // Dependency edges
        .route("/feeds/{id}/dependents", get(handlers::list_dependent_feeds))
        .route(
            "/feeds/{id}/dependents/{other}",
            post(handlers::add_dependent_feed).delete(handlers::remove_dependent_feed),
        )
        .route("/feeds/{id}/used-by", get(handlers::list_used_by_feeds))
        // SLA references
        .route(
            "/feeds/{id}/slas",
            get(handlers::list_feed_slas).put(handlers::set_feed_slas),
        )
        .route(
            "/feeds/{id}/slas/{sla_id}",
            post(handlers::add_feed_sla).delete(handlers::remove_feed_sla),
        )
        // Endpoints
        .route(
            "/feeds/{id}/sources",
            get(handlers::list_sources)
                .post(handlers::add_source)
                .delete(handlers::remove_sources),
        )
        .route("/feeds/{id}/sources/{datasource_id}", delete(handlers::remove_source))
        .route(
            "/feeds/{id}/destinations",
            get(handlers::list_destinations)
                .post(handlers::add_destination)
                .delete(handlers::remove_destinations),
        )
        .route(
            "/feeds/{id}/destinations/{datasource_id}",
            delete(handlers::remove_destination),
        )
        // Precondition
        .route(
            "/feeds/{id}/precondition",
            get(handlers::get_precondition).post(handlers::create_precondition),
        )
        // Shared objects
        .route(
            "/datasources",
            get(handlers::list_datasources).post(handlers::create_datasource),
        )
        .route("/slas", get(handlers::list_slas).post(handlers::create_sla))
        .route("/templates", post(handlers::create_template))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(db)
}
