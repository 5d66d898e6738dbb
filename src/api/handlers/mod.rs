use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::db::Database;
use crate::feed::{Endpoint, Feed, FeedDetails, FeedError, FeedProvider};
use crate::models::*;
use crate::store::NodeId;

type ApiError = (StatusCode, String);

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
/// The full error is logged server-side for debugging, but clients only
/// see a generic message to avoid leaking internal details.
fn internal_error(e: impl std::fmt::Display) -> ApiError {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Map feed errors to responses. Contention on a version root is a 409,
/// rule violations are a 400; those messages are safe to expose.
fn feed_error(e: FeedError) -> ApiError {
    if e.is_conflict() {
        tracing::warn!("Conflict: {}", e);
        return (StatusCode::CONFLICT, e.to_string());
    }

    match e {
        FeedError::SelfDependency(_)
        | FeedError::ForeignEndpoint { .. }
        | FeedError::UnsharedSla { .. }
        | FeedError::DuplicateFeed { .. } => {
            tracing::warn!("Validation error: {}", e);
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        other => internal_error(other),
    }
}

fn not_found(what: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("{} not found", what))
}

fn provider(db: &Database) -> FeedProvider<Database> {
    FeedProvider::new(db.clone())
}

fn load_feed(db: &Database, id: NodeId) -> Result<Feed<Database>, ApiError> {
    provider(db)
        .find_feed(id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Feed"))
}

fn load_details(db: &Database, id: NodeId) -> Result<FeedDetails<Database>, ApiError> {
    load_feed(db, id)?.details().map_err(feed_error)
}

fn summarize(feeds: Vec<Feed<Database>>) -> Result<Vec<FeedSummary>, ApiError> {
    feeds
        .iter()
        .map(Feed::to_summary)
        .collect::<Result<Vec<_>, _>>()
        .map_err(feed_error)
}

fn summarize_endpoints(endpoints: Vec<Endpoint<Database>>) -> Result<Vec<EndpointSummary>, ApiError> {
    endpoints
        .iter()
        .map(Endpoint::to_summary)
        .collect::<Result<Vec<_>, _>>()
        .map_err(internal_error)
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Feeds
// ============================================================

pub async fn list_feeds(State(db): State<Database>) -> Result<Json<Vec<FeedSummary>>, ApiError> {
    let feeds = provider(&db).list_feeds().map_err(internal_error)?;
    summarize(feeds).map(Json)
}

pub async fn create_feed(
    State(db): State<Database>,
    Json(input): Json<CreateFeedInput>,
) -> Result<(StatusCode, Json<FeedSummary>), ApiError> {
    let feed = provider(&db)
        .create_feed(&input.category, &input.system_name)
        .map_err(feed_error)?;
    let summary = feed.to_summary().map_err(feed_error)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn get_feed(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<Json<FeedDetailsView>, ApiError> {
    load_details(&db, id)?.to_view().map(Json).map_err(feed_error)
}

pub async fn update_feed_details(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
    Json(input): Json<UpdateFeedDetailsInput>,
) -> Result<Json<FeedDetailsView>, ApiError> {
    let details = load_details(&db, id)?;

    if let Some(json) = input.json.as_deref() {
        details.set_json(Some(json)).map_err(feed_error)?;
    }
    if let Some(process_group_id) = input.process_group_id.as_deref() {
        details
            .set_process_group_id(Some(process_group_id))
            .map_err(feed_error)?;
    }
    if let Some(template_id) = input.template_id {
        let template = provider(&db)
            .find_template(template_id)
            .map_err(internal_error)?
            .ok_or_else(|| not_found("Template"))?;
        details.set_template(Some(&template)).map_err(feed_error)?;
    }

    details.to_view().map(Json).map_err(feed_error)
}

// ============================================================
// Dependency edges
// ============================================================

pub async fn list_dependent_feeds(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<Json<Vec<FeedSummary>>, ApiError> {
    let feeds = load_details(&db, id)?
        .get_dependent_feeds()
        .map_err(feed_error)?;
    summarize(feeds).map(Json)
}

pub async fn list_used_by_feeds(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<Json<Vec<FeedSummary>>, ApiError> {
    let feeds = load_details(&db, id)?
        .get_used_by_feeds()
        .map_err(feed_error)?;
    summarize(feeds).map(Json)
}

pub async fn add_dependent_feed(
    State(db): State<Database>,
    Path((id, other)): Path<(NodeId, NodeId)>,
) -> Result<Json<ChangeResponse>, ApiError> {
    let details = load_details(&db, id)?;
    let dependent = load_feed(&db, other)?;
    let changed = details
        .add_dependent_feed(&dependent)
        .map_err(feed_error)?;
    Ok(Json(ChangeResponse { changed }))
}

pub async fn remove_dependent_feed(
    State(db): State<Database>,
    Path((id, other)): Path<(NodeId, NodeId)>,
) -> Result<Json<ChangeResponse>, ApiError> {
    let details = load_details(&db, id)?;
    let dependent = load_feed(&db, other)?;
    let changed = details
        .remove_dependent_feed(&dependent)
        .map_err(feed_error)?;
    Ok(Json(ChangeResponse { changed }))
}

// ============================================================
// SLA references
// ============================================================

pub async fn list_feed_slas(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<Json<Vec<ServiceLevelAgreement>>, ApiError> {
    load_details(&db, id)?
        .get_service_level_agreements()
        .map(Json)
        .map_err(feed_error)
}

pub async fn set_feed_slas(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
    Json(input): Json<SetSlasInput>,
) -> Result<Json<Vec<ServiceLevelAgreement>>, ApiError> {
    let details = load_details(&db, id)?;
    let provider = provider(&db);

    let mut slas = Vec::with_capacity(input.sla_ids.len());
    for sla_id in input.sla_ids {
        let sla = provider
            .find_sla(sla_id)
            .map_err(internal_error)?
            .ok_or_else(|| not_found("SLA"))?;
        slas.push(sla);
    }

    details
        .set_service_level_agreements(&slas)
        .map_err(feed_error)?;
    details
        .get_service_level_agreements()
        .map(Json)
        .map_err(feed_error)
}

pub async fn add_feed_sla(
    State(db): State<Database>,
    Path((id, sla_id)): Path<(NodeId, NodeId)>,
) -> Result<Json<ChangeResponse>, ApiError> {
    let details = load_details(&db, id)?;
    let sla = provider(&db)
        .find_sla(sla_id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("SLA"))?;
    let changed = details
        .add_service_level_agreement(&sla)
        .map_err(feed_error)?;
    Ok(Json(ChangeResponse { changed }))
}

pub async fn remove_feed_sla(
    State(db): State<Database>,
    Path((id, sla_id)): Path<(NodeId, String)>,
) -> Result<Json<ChangeResponse>, ApiError> {
    let changed = load_details(&db, id)?
        .remove_service_level_agreement(&sla_id)
        .map_err(feed_error)?;
    Ok(Json(ChangeResponse { changed }))
}

// ============================================================
// Endpoints
// ============================================================

fn list_endpoints(
    db: &Database,
    id: NodeId,
    kind: EndpointKind,
) -> Result<Json<Vec<EndpointSummary>>, ApiError> {
    let details = load_details(db, id)?;
    let endpoints = match kind {
        EndpointKind::Source => details.get_sources(),
        EndpointKind::Destination => details.get_destinations(),
    }
    .map_err(feed_error)?;
    summarize_endpoints(endpoints).map(Json)
}

fn add_endpoint(
    db: &Database,
    id: NodeId,
    kind: EndpointKind,
    input: AttachEndpointInput,
) -> Result<(StatusCode, Json<EndpointSummary>), ApiError> {
    let details = load_details(db, id)?;
    let datasource = provider(db)
        .find_datasource(input.datasource_id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Datasource"))?;

    let endpoint = match kind {
        EndpointKind::Source => details.ensure_feed_source(&datasource),
        EndpointKind::Destination => details.ensure_feed_destination(&datasource),
    }
    .map_err(feed_error)?;

    let summary = endpoint.to_summary().map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

fn remove_endpoint(
    db: &Database,
    id: NodeId,
    datasource_id: NodeId,
    kind: EndpointKind,
) -> Result<StatusCode, ApiError> {
    let details = load_details(db, id)?;
    match kind {
        EndpointKind::Source => {
            let source = details
                .get_source(datasource_id)
                .map_err(feed_error)?
                .ok_or_else(|| not_found("Source"))?;
            details.remove_feed_source(&source).map_err(feed_error)?;
        }
        EndpointKind::Destination => {
            let dest = details
                .get_destination(datasource_id)
                .map_err(feed_error)?
                .ok_or_else(|| not_found("Destination"))?;
            details.remove_feed_destination(&dest).map_err(feed_error)?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

fn remove_all_endpoints(
    db: &Database,
    id: NodeId,
    kind: EndpointKind,
) -> Result<Json<RemovalReport>, ApiError> {
    let details = load_details(db, id)?;
    let report = match kind {
        EndpointKind::Source => details.remove_feed_sources(),
        EndpointKind::Destination => details.remove_feed_destinations(),
    }
    .map_err(feed_error)?;
    Ok(Json(report))
}

pub async fn list_sources(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<Json<Vec<EndpointSummary>>, ApiError> {
    list_endpoints(&db, id, EndpointKind::Source)
}

pub async fn add_source(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
    Json(input): Json<AttachEndpointInput>,
) -> Result<(StatusCode, Json<EndpointSummary>), ApiError> {
    add_endpoint(&db, id, EndpointKind::Source, input)
}

pub async fn remove_source(
    State(db): State<Database>,
    Path((id, datasource_id)): Path<(NodeId, NodeId)>,
) -> Result<StatusCode, ApiError> {
    remove_endpoint(&db, id, datasource_id, EndpointKind::Source)
}

pub async fn remove_sources(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<Json<RemovalReport>, ApiError> {
    remove_all_endpoints(&db, id, EndpointKind::Source)
}

pub async fn list_destinations(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<Json<Vec<EndpointSummary>>, ApiError> {
    list_endpoints(&db, id, EndpointKind::Destination)
}

pub async fn add_destination(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
    Json(input): Json<AttachEndpointInput>,
) -> Result<(StatusCode, Json<EndpointSummary>), ApiError> {
    add_endpoint(&db, id, EndpointKind::Destination, input)
}

pub async fn remove_destination(
    State(db): State<Database>,
    Path((id, datasource_id)): Path<(NodeId, NodeId)>,
) -> Result<StatusCode, ApiError> {
    remove_endpoint(&db, id, datasource_id, EndpointKind::Destination)
}

pub async fn remove_destinations(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<Json<RemovalReport>, ApiError> {
    remove_all_endpoints(&db, id, EndpointKind::Destination)
}

// ============================================================
// Precondition
// ============================================================

pub async fn get_precondition(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<Json<PreconditionSummary>, ApiError> {
    let precondition = load_details(&db, id)?
        .get_precondition()
        .map_err(feed_error)?
        .ok_or_else(|| not_found("Precondition"))?;
    precondition.to_summary().map(Json).map_err(internal_error)
}

pub async fn create_precondition(
    State(db): State<Database>,
    Path(id): Path<NodeId>,
) -> Result<(StatusCode, Json<PreconditionSummary>), ApiError> {
    let precondition = load_details(&db, id)?
        .create_new_precondition()
        .map_err(feed_error)?;
    let summary = precondition.to_summary().map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

// ============================================================
// Shared objects
// ============================================================

pub async fn list_datasources(
    State(db): State<Database>,
) -> Result<Json<Vec<DatasourceSummary>>, ApiError> {
    provider(&db)
        .list_datasources()
        .map_err(internal_error)?
        .iter()
        .map(|d| d.to_summary())
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
        .map_err(internal_error)
}

pub async fn create_datasource(
    State(db): State<Database>,
    Json(input): Json<CreateDatasourceInput>,
) -> Result<(StatusCode, Json<DatasourceSummary>), ApiError> {
    let datasource = provider(&db)
        .create_datasource(&input.name)
        .map_err(internal_error)?;
    let summary = datasource.to_summary().map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(summary)))
}

pub async fn list_slas(
    State(db): State<Database>,
) -> Result<Json<Vec<ServiceLevelAgreement>>, ApiError> {
    provider(&db).list_slas().map(Json).map_err(internal_error)
}

pub async fn create_sla(
    State(db): State<Database>,
    Json(input): Json<CreateSlaInput>,
) -> Result<(StatusCode, Json<ServiceLevelAgreement>), ApiError> {
    provider(&db)
        .create_sla(&input.name, input.description.as_deref())
        .map(|sla| (StatusCode::CREATED, Json(sla)))
        .map_err(internal_error)
}

pub async fn create_template(
    State(db): State<Database>,
    Json(input): Json<CreateTemplateInput>,
) -> Result<(StatusCode, Json<FeedTemplate>), ApiError> {
    provider(&db)
        .create_template(&input.name)
        .map(|template| (StatusCode::CREATED, Json(template)))
        .map_err(internal_error)
}
