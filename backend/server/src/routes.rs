use std::sync::Arc;

use axum::{
    Json,
    extract::{State as Shared, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::{
    error::AppError,
    payment::{self, Payment, PaymentProofRequest},
    state::State,
    user::{self, RegisterRequest, User},
    utils::malformed,
};

#[derive(Serialize)]
pub struct Registered {
    success: bool,
    user: User,
}

#[derive(Serialize)]
pub struct Submitted {
    success: bool,
    payment: Payment,
}

pub async fn register_handler(
    Shared(state): Shared<Arc<State>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<Registered>, AppError> {
    let Json(request) = payload.map_err(malformed)?;
    let user = user::register(state.store.as_ref(), request).await?;

    Ok(Json(Registered {
        success: true,
        user,
    }))
}

pub async fn users_handler(Shared(state): Shared<Arc<State>>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(user::list_users(state.store.as_ref()).await?))
}

pub async fn payment_proof_handler(
    Shared(state): Shared<Arc<State>>,
    payload: Result<Json<PaymentProofRequest>, JsonRejection>,
) -> Result<Json<Submitted>, AppError> {
    let Json(request) = payload.map_err(malformed)?;
    let payment = payment::submit(state.store.as_ref(), request).await?;

    Ok(Json(Submitted {
        success: true,
        payment,
    }))
}

pub async fn payments_handler(
    Shared(state): Shared<Arc<State>>,
) -> Result<Json<Vec<Payment>>, AppError> {
    Ok(Json(payment::list_payments(state.store.as_ref()).await?))
}

pub async fn health_handler(Shared(state): Shared<Arc<State>>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(e) => {
            warn!("Health check failed: {e}");

            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}
