use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ws::WebSocketUpgrade, State as AxumState},
    http::{header::AUTHORIZATION, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{error::AppError, identity::Identity, realtime::serve_observer, state::State, tally::Tally};

#[derive(Deserialize)]
pub struct LoginRequest {
    name: Option<String>,
}

#[derive(Serialize)]
pub struct LoginResponse {
    message: &'static str,
    credential: String,
    token: String,
    user: String,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    option: Option<String>,
}

#[derive(Serialize)]
pub struct VoteResponse {
    message: String,
    votes: Tally,
}

#[derive(Serialize)]
pub struct ResultsResponse {
    votes: Tally,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    observers: usize,
    votes: u64,
}

pub async fn login_handler(
    AxumState(state): AxumState<Arc<State>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload.map_err(|_| AppError::InvalidInput)?;
    let name = payload.name.ok_or(AppError::InvalidInput)?;

    let issued = state.issuer.issue(&name)?;

    info!(
        "Login: {} ({})",
        issued.identity.display_name, issued.identity.credential_id
    );

    Ok(Json(LoginResponse {
        message: "Login successful",
        token: issued.credential.clone(),
        credential: issued.credential,
        user: issued.identity.display_name,
    }))
}

pub async fn vote_handler(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
    payload: Result<Json<VoteRequest>, JsonRejection>,
) -> Result<Json<VoteResponse>, AppError> {
    let credential = bearer(&headers)?;
    let Json(payload) = payload.map_err(|_| AppError::InvalidInput)?;
    let option = payload.option.unwrap_or_default();

    let admitted = state.admission.submit_vote(credential, &option)?;

    Ok(Json(VoteResponse {
        message: format!("Vote casted for {}", admitted.option),
        votes: admitted.votes,
    }))
}

pub async fn results_handler(
    AxumState(state): AxumState<Arc<State>>,
    headers: HeaderMap,
) -> Result<Json<ResultsResponse>, AppError> {
    if state.config.results_require_auth {
        authenticate(&state, &headers)?;
    }

    Ok(Json(ResultsResponse {
        votes: state.query.get_tally(),
    }))
}

pub async fn health_handler(AxumState(state): AxumState<Arc<State>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        observers: state.hub.observer_count(),
        votes: state.query.get_tally().total(),
    })
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    AxumState(state): AxumState<Arc<State>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_observer(socket, state))
}

fn authenticate(state: &State, headers: &HeaderMap) -> Result<Identity, AppError> {
    let credential = bearer(headers)?;

    state.issuer.verify(credential).map_err(|e| {
        debug!("Rejected credential: {e}");
        e
    })
}

/// Token part of `Authorization: Bearer <credential>`.
fn bearer(headers: &HeaderMap) -> Result<&str, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Err(AppError::MissingCredential);
    };

    let value = value.to_str().map_err(|_| AppError::InvalidCredential)?;

    match value.trim().split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AppError::MissingCredential),
    }
}
