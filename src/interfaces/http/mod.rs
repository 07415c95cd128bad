//! HTTP entry points: presale query, purchase initiation and the processor
//! webhook.

pub mod handlers;

use crate::application::purchase::PurchaseOrchestrator;
use crate::application::query::PresaleQueryService;
use crate::application::reconciliation::ReconciliationHandler;
use crate::domain::payment::IPN_CALLBACK_PATH;
use axum::{
    Router,
    routing::{get, post},
};
use handlers::{health_handler, payment_callback_handler, presale_handler, purchase_handler};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

const MAX_REQUEST_BODY_SIZE: usize = 64 * 1024;

/// Services shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub query: Arc<PresaleQueryService>,
    pub purchases: Arc<PurchaseOrchestrator>,
    pub reconciliation: Arc<ReconciliationHandler>,
}

impl AppState {
    pub fn new(
        query: PresaleQueryService,
        purchases: PurchaseOrchestrator,
        reconciliation: ReconciliationHandler,
    ) -> Self {
        Self {
            query: Arc::new(query),
            purchases: Arc::new(purchases),
            reconciliation: Arc::new(reconciliation),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/presale", get(presale_handler))
        .route("/api/purchase", post(purchase_handler))
        .route(IPN_CALLBACK_PATH, post(payment_callback_handler))
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(MAX_REQUEST_BODY_SIZE))
        .with_state(state)
}

/// Binds `addr` and serves until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "presale API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
