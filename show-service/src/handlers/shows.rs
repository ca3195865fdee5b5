use crate::dtos::{CreateShowRequest, ShowResponse};
use crate::error::ShowError;
use crate::models::ShowFilter;
use crate::services::record_show_created;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use mongodb::bson::oid::ObjectId;
use service_core::error::AppError;
use validator::Validate;

#[tracing::instrument(skip(state, payload))]
pub async fn add_show(
    State(state): State<AppState>,
    payload: Result<Json<CreateShowRequest>, JsonRejection>,
) -> Result<Json<ShowResponse>, AppError> {
    let Json(request) = payload.map_err(|e| ShowError::MalformedBody(e.body_text()))?;
    request.validate().map_err(ShowError::from)?;

    let show = request.into_show();

    // Not isolated from the insert; the store's unique index catches races
    if state.store.release_date_exists(show.release_date).await? {
        tracing::warn!(release_date = %show.release_date, "Show with same release date exists");
        return Err(ShowError::DuplicateReleaseDate.into());
    }

    let stored = state.store.insert(show).await?;
    record_show_created();

    let response = ShowResponse::from(stored);
    tracing::info!(
        show_id = %response.id,
        release_date = %response.release_date,
        "Show created"
    );

    Ok(Json(response))
}

#[tracing::instrument(skip(state))]
pub async fn list_shows(State(state): State<AppState>) -> Result<Json<Vec<ShowResponse>>, AppError> {
    list_matching(&state, ShowFilter::All).await
}

#[tracing::instrument(skip(state))]
pub async fn get_show(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ShowResponse>, AppError> {
    let object_id =
        ObjectId::parse_str(&id).map_err(|_| ShowError::InvalidIdentifier(id.clone()))?;

    let show = state
        .store
        .find_by_id(object_id)
        .await?
        .ok_or(ShowError::NotFound(id))?;

    Ok(Json(ShowResponse::from(show)))
}

#[tracing::instrument(skip(state))]
pub async fn list_accepted_shows(
    State(state): State<AppState>,
) -> Result<Json<Vec<ShowResponse>>, AppError> {
    list_matching(&state, ShowFilter::Accepted).await
}

#[tracing::instrument(skip(state))]
pub async fn list_unaccepted_shows(
    State(state): State<AppState>,
) -> Result<Json<Vec<ShowResponse>>, AppError> {
    list_matching(&state, ShowFilter::Unaccepted).await
}

async fn list_matching(
    state: &AppState,
    filter: ShowFilter,
) -> Result<Json<Vec<ShowResponse>>, AppError> {
    let shows = state.store.list(filter).await?;
    tracing::debug!(filter = filter.as_str(), count = shows.len(), "Listed shows");

    Ok(Json(shows.into_iter().map(ShowResponse::from).collect()))
}
