use super::extract::{CurrentUser, MaybeUser};
use crate::app::complaints::{self, ComplaintInput};
use crate::app::newsletter;
use crate::error::Result;
use crate::state::AppState;
use crate::types::{Complaint, Subscriber};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub token: String,
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<Json<Subscriber>> {
    newsletter::subscribe(&state, &request.email).await.map(Json)
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(request): Json<UnsubscribeRequest>,
) -> Result<Json<Value>> {
    newsletter::unsubscribe(&state, &request.token)?;
    Ok(Json(json!({ "unsubscribed": true })))
}

/// Target of the link in every newsletter email.
pub async fn unsubscribe_link(
    State(state): State<AppState>,
    Query(request): Query<UnsubscribeRequest>,
) -> Result<Json<Value>> {
    newsletter::unsubscribe(&state, &request.token)?;
    Ok(Json(json!({ "unsubscribed": true })))
}

pub async fn submit_complaint(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Json(input): Json<ComplaintInput>,
) -> Result<(StatusCode, Json<Complaint>)> {
    let complaint = complaints::submit(&state, user.as_ref(), &input).await?;
    Ok((StatusCode::CREATED, Json(complaint)))
}

pub async fn my_complaints(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Complaint>>> {
    complaints::list_mine(&state, &user).map(Json)
}
