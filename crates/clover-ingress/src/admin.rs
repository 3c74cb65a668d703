//! Admin endpoints: whole-configuration replace and sticky mappings

use axum::{
    Json,
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use clover_core::{
    ChannelId, Error as CoreError, Interchange, InterchangeConfig, InterchangeId, Urn,
    model::parse_config,
};
use tracing::{info, warn};

use crate::form::FormFields;
use crate::server::AppState;
use crate::types::{AdminView, ApiResult, DataResponse};

fn render(interchanges: &[Interchange]) -> Result<String, CoreError> {
    let configs: Vec<InterchangeConfig> = interchanges.iter().map(InterchangeConfig::from).collect();
    Ok(serde_json::to_string_pretty(&configs)?)
}

fn rejected(submitted: String, err: &CoreError) -> Response {
    warn!("Rejected configuration: {}", err);
    (
        StatusCode::BAD_REQUEST,
        Json(AdminView {
            config: submitted,
            message: None,
            error: Some(err.to_string()),
        }),
    )
        .into_response()
}

/// `GET /admin`
pub async fn view_config(State(state): State<AppState>) -> ApiResult<Json<AdminView>> {
    let interchanges = state.engine.cache().get_all().await?;
    Ok(Json(AdminView {
        config: render(&interchanges)?,
        ..Default::default()
    }))
}

/// `POST /admin` with form field `config`
///
/// Malformed or invalid submissions are echoed back with the error and leave
/// the stored configuration untouched.
pub async fn update_config(State(state): State<AppState>, req: Request) -> ApiResult<Response> {
    let (parts, body) = req.into_parts();
    let form = FormFields::from_parts(parts.uri.query(), &parts.headers, body).await?;
    let submitted = form
        .get("config")
        .ok_or(CoreError::MissingField("config"))?
        .to_string();

    let configs = match parse_config(&submitted) {
        Ok(configs) => configs,
        Err(err) => return Ok(rejected(submitted, &err)),
    };

    let stored = match state.engine.cache().replace_config(&configs).await {
        Ok(stored) => stored,
        Err(err @ CoreError::Validation(_)) => return Ok(rejected(submitted, &err)),
        Err(err) => return Err(err.into()),
    };

    info!("Configuration saved ({} interchanges)", stored.len());

    Ok(Json(AdminView {
        config: render(&stored)?,
        message: Some("configuration saved".to_string()),
        error: None,
    })
    .into_response())
}

async fn load_interchange(state: &AppState, id: &str) -> ApiResult<Interchange> {
    let id = InterchangeId::from_string(id)?;
    state
        .engine
        .cache()
        .store()
        .get(id)
        .await?
        .ok_or_else(|| CoreError::InterchangeNotFound(id.to_string()).into())
}

/// `POST /admin/{id}/map?urn=..&channel=..`
pub async fn set_mapping(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Request,
) -> ApiResult<Json<DataResponse<()>>> {
    let interchange = load_interchange(&state, &id).await?;

    let (parts, body) = req.into_parts();
    let form = FormFields::from_parts(parts.uri.query(), &parts.headers, body).await?;
    let urn = form
        .non_empty("urn")
        .map(Urn::from_raw)
        .ok_or(CoreError::MissingField("urn"))?;
    let channel_param = form
        .non_empty("channel")
        .ok_or(CoreError::MissingField("channel"))?;

    let channel_id = ChannelId::from_string(channel_param)
        .map_err(|_| CoreError::ChannelNotFound(channel_param.to_string()))?;

    let channel = match interchange.channel(channel_id) {
        Some(channel) => channel.clone(),
        // a channel owned by another interchange fails the ownership check
        None => state
            .engine
            .cache()
            .get_all()
            .await?
            .into_iter()
            .flat_map(|other| other.channels)
            .find(|channel| channel.id == channel_id)
            .ok_or_else(|| CoreError::ChannelNotFound(channel_id.to_string()))?,
    };

    state
        .engine
        .mappings()
        .set_mapping(&interchange, &channel, &urn)
        .await?;

    info!(
        interchange_id = %interchange.id,
        channel_id = %channel.id,
        urn = %urn,
        "Mapping set by admin"
    );

    Ok(Json(DataResponse::new("mapping created", ())))
}

/// `DELETE /admin/{id}/map?urn=..`
pub async fn clear_mapping(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req: Request,
) -> ApiResult<Json<DataResponse<()>>> {
    let interchange = load_interchange(&state, &id).await?;

    let (parts, body) = req.into_parts();
    let form = FormFields::from_parts(parts.uri.query(), &parts.headers, body).await?;
    let urn = form
        .non_empty("urn")
        .map(Urn::from_raw)
        .ok_or(CoreError::MissingField("urn"))?;

    state
        .engine
        .mappings()
        .clear_mapping(interchange.id, &urn)
        .await?;

    info!(
        interchange_id = %interchange.id,
        urn = %urn,
        "Mapping cleared by admin"
    );

    Ok(Json(DataResponse::new("mapping removed", ())))
}
