use crate::errors::Error;
use crate::ingest::{parse_field_keys, IngestionGateway};
use crate::model::{Channel, ChannelCreate, DataPoint, Field, UpdateResponse};
use crate::store::ChannelStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
struct AppState {
    store: Arc<ChannelStore>,
    gateway: Arc<IngestionGateway>,
}

pub fn create_router(store: Arc<ChannelStore>, gateway: Arc<IngestionGateway>) -> Router {
    let state = AppState { store, gateway };

    Router::new()
        .route("/health", get(health))
        .route("/update", get(update_positional))
        .route("/api/v1/channels", post(create_channel))
        .route("/api/v1/channels/:channel_id", get(get_channel))
        .route(
            "/api/v1/channels/:channel_id/fields/:field_id",
            get(get_field),
        )
        .route(
            "/api/v1/channels/:channel_id/fields/:field_id/data",
            get(get_field_data),
        )
        .route(
            "/api/v1/channels/:channel_id/update/:api_key",
            post(update_bulk),
        )
        .with_state(state)
}

async fn create_channel(
    State(state): State<AppState>,
    Json(body): Json<ChannelCreate>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    let channel = state
        .gateway
        .create_channel(&body.name, &body.description, &body.field_names)?;
    Ok((StatusCode::CREATED, Json(channel)))
}

async fn get_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
) -> Result<Json<Channel>, ApiError> {
    Ok(Json(state.store.get_channel(&channel_id)?))
}

async fn get_field(
    State(state): State<AppState>,
    Path((channel_id, field_id)): Path<(String, u8)>,
) -> Result<Json<Field>, ApiError> {
    Ok(Json(state.store.get_field(&channel_id, field_id)?))
}

#[derive(Debug, Deserialize)]
struct FieldDataQuery {
    results: Option<usize>,
}

async fn get_field_data(
    State(state): State<AppState>,
    Path((channel_id, field_id)): Path<(String, u8)>,
    Query(params): Query<FieldDataQuery>,
) -> Result<Json<Vec<DataPoint>>, ApiError> {
    let results = params.results.unwrap_or(10);
    Ok(Json(state.store.recent(&channel_id, field_id, results)?))
}

/// ThingSpeak-style positional update; devices send only the slots they
/// have, the rest stay absent.
#[derive(Debug, Deserialize)]
struct UpdateQuery {
    channel_id: String,
    api_key: String,
    field1: Option<f64>,
    field2: Option<f64>,
    field3: Option<f64>,
    field4: Option<f64>,
    field5: Option<f64>,
    field6: Option<f64>,
    field7: Option<f64>,
    field8: Option<f64>,
}

async fn update_positional(
    State(state): State<AppState>,
    Query(params): Query<UpdateQuery>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let slots = [
        params.field1,
        params.field2,
        params.field3,
        params.field4,
        params.field5,
        params.field6,
        params.field7,
        params.field8,
    ];

    let mut values = BTreeMap::new();
    for (i, value) in slots.iter().enumerate() {
        if let Some(value) = value {
            values.insert((i + 1) as u8, *value);
        }
    }

    let entry_id = state
        .gateway
        .update_fields(&params.channel_id, &params.api_key, &values)?;

    Ok(Json(UpdateResponse {
        success: true,
        entry_id,
    }))
}

async fn update_bulk(
    State(state): State<AppState>,
    Path((channel_id, api_key)): Path<(String, String)>,
    Json(body): Json<HashMap<String, f64>>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let values = parse_field_keys(&body);
    let entry_id = state.gateway.update_fields(&channel_id, &api_key, &values)?;

    Ok(Json(UpdateResponse {
        success: true,
        entry_id,
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "channels_count": state.store.channel_count(),
    }))
}

struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => {
                error!("API error: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}
