use super::AppState;
use crate::application::purchase::{PurchaseOutcome, PurchaseRequest};
use crate::domain::stats::PresaleSnapshot;
use crate::error::{PresaleError, PurchaseError};
use crate::infrastructure::nowpayments::SIGNATURE_HEADER;
use axum::{
    Json,
    body::Bytes,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error};

pub async fn health_handler() -> &'static str {
    "ok"
}

pub async fn presale_handler(State(state): State<AppState>) -> Json<PresaleSnapshot> {
    Json(state.query.get_presale_data().await)
}

pub async fn purchase_handler(
    State(state): State<AppState>,
    payload: Result<Json<PurchaseRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            debug!(error = %rejection, "malformed purchase request");
            let outcome = PurchaseOutcome {
                success: false,
                payment_url: None,
                error: Some("Invalid purchase request".to_string()),
            };
            return (StatusCode::BAD_REQUEST, Json(outcome)).into_response();
        }
    };

    let result = state
        .purchases
        .try_create_payment(&request.wallet_address, request.token_amount, request.stage_id)
        .await;
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(reason) => purchase_status(*reason),
    };
    (status, Json(PurchaseOutcome::from(result))).into_response()
}

fn purchase_status(reason: PurchaseError) -> StatusCode {
    match reason {
        PurchaseError::MissingWallet | PurchaseError::InvalidAmount | PurchaseError::InvalidStage => {
            StatusCode::BAD_REQUEST
        }
        PurchaseError::StageUnavailable => StatusCode::CONFLICT,
        PurchaseError::PaymentNotCreated => StatusCode::BAD_GATEWAY,
        PurchaseError::TransactionNotCreated
        | PurchaseError::PaymentNotRecorded
        | PurchaseError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Processor webhook. Duplicates and non-final statuses are acknowledged like
/// successes so the processor stops retrying them.
pub async fn payment_callback_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match state.reconciliation.handle_signed(&body, signature).await {
        Ok(outcome) => {
            debug!(?outcome, "payment notification processed");
            (StatusCode::OK, Json(json!({ "success": true }))).into_response()
        }
        Err(PresaleError::AuthenticationError(_)) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Invalid signature" })),
        )
            .into_response(),
        Err(PresaleError::MalformedNotification(detail)) => {
            debug!(%detail, "malformed payment notification");
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Malformed notification" })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "Payment callback error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}
