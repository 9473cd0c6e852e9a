use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use tales::TalesService;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::dto::*;
use crate::error::ApiError;
use crate::monitoring::{metrics_handler, track_metrics};

/// Default amount converted by the explicit exchange endpoint (0.5 SUI)
const DEFAULT_EXCHANGE_AMOUNT_MIST: u64 = 500_000_000;

const DEFAULT_PAGE_LIMIT: u64 = 20;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TalesService>,
}

/// The REST surface under /api, plus /metrics
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/tales", post(create_tale).get(list_tales))
        .route("/api/tales/initiate-publication", post(initiate_publication))
        .route("/api/tales/record-publication", post(record_publication))
        .route(
            "/api/tales/record-batch-publication",
            post(record_batch_publication),
        )
        .route("/api/tales/upload/cover", post(upload_cover))
        .route(
            "/api/tales/{id}",
            get(get_tale).put(update_tale).delete(delete_tale),
        )
        .route("/api/tales/{id}/full", get(get_full_tale))
        .route(
            "/api/files/upload-cover-to-walrus",
            post(upload_cover_to_walrus),
        )
        .route("/api/walrus/exchange-sui-for-wal", post(exchange_sui_for_wal))
        .route("/api/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(middleware::from_fn(track_metrics))
        .layer(cors)
        .with_state(state)
}

async fn create_tale(
    State(state): State<AppState>,
    Json(dto): Json<CreateTaleDto>,
) -> Result<(StatusCode, Json<TaleDto>), ApiError> {
    let tale = state.service.create_tale(dto.into()).await?;
    Ok((StatusCode::CREATED, Json(tale.into())))
}

async fn list_tales(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<TaleDto>>, ApiError> {
    let page = query.page.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let tales = state.service.list_tales(page, limit).await?;
    Ok(Json(tales.into_iter().map(TaleDto::from).collect()))
}

async fn get_tale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaleDto>, ApiError> {
    let tale = state.service.get_tale(&id).await?;
    Ok(Json(tale.into()))
}

async fn get_full_tale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FullTaleDto>, ApiError> {
    let full = state.service.get_full_tale(&id).await?;
    Ok(Json(full.into()))
}

async fn update_tale(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(dto): Json<UpdateTaleDto>,
) -> Result<Json<TaleDto>, ApiError> {
    let tale = state.service.update_tale(&id, dto.into()).await?;
    Ok(Json(tale.into()))
}

async fn delete_tale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_tale(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn initiate_publication(
    State(state): State<AppState>,
    Json(dto): Json<InitiatePublicationDto>,
) -> Result<Json<PreparedPublicationDto>, ApiError> {
    info!(
        "Publication initiated by {} for '{}'",
        dto.user_address, dto.title
    );
    let prepared = state.service.prepare_tale_publication(dto.into()).await?;
    Ok(Json(prepared.into()))
}

async fn record_publication(
    State(state): State<AppState>,
    Json(dto): Json<RecordPublicationDto>,
) -> Result<(StatusCode, Json<TaleDto>), ApiError> {
    let tale = state.service.record_tale_publication(dto.into()).await?;
    Ok((StatusCode::CREATED, Json(tale.into())))
}

async fn record_batch_publication(
    State(state): State<AppState>,
    Json(dto): Json<RecordBatchPublicationDto>,
) -> Result<(StatusCode, Json<TaleDto>), ApiError> {
    let tale = state.service.record_batch_publication(dto.into()).await?;
    Ok((StatusCode::CREATED, Json(tale.into())))
}

async fn upload_cover(
    State(state): State<AppState>,
    Query(query): Query<CoverUploadQuery>,
    body: Bytes,
) -> Result<Json<CoverUploadDto>, ApiError> {
    let (blob_id, url) = state
        .service
        .upload_cover(body.to_vec(), query.epochs)
        .await?;
    Ok(Json(CoverUploadDto { blob_id, url }))
}

/// Same operation as `upload_cover`, kept at its historical path for
/// clients that upload before running the batch flow
async fn upload_cover_to_walrus(
    State(state): State<AppState>,
    Query(query): Query<CoverUploadQuery>,
    body: Bytes,
) -> Result<Json<CoverUploadDto>, ApiError> {
    let (blob_id, url) = state
        .service
        .upload_cover(body.to_vec(), query.epochs)
        .await?;
    Ok(Json(CoverUploadDto { blob_id, url }))
}

async fn exchange_sui_for_wal(
    State(state): State<AppState>,
    Json(dto): Json<ExchangeDto>,
) -> Result<Json<ExchangeResultDto>, ApiError> {
    let amount = dto.amount_mist.unwrap_or(DEFAULT_EXCHANGE_AMOUNT_MIST);
    let tx_digest = state.service.exchange_sui_for_wal(amount).await?;
    Ok(Json(ExchangeResultDto { tx_digest }))
}

async fn health() -> Json<HealthDto> {
    Json(HealthDto { status: "ok" })
}
