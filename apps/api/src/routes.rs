//! # HTTP Routes
//!
//! Thin axum handlers over the service layer: decode the request, call the
//! workflow, encode the response. No business logic lives here.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use meridian_core::{
    NewRefund, NewRefundLine, NewSale, NewSaleLine, Refund, RefundLine, Sale, SaleLine,
    SaleStatus, TaxRate,
};
use meridian_db::Database;

use crate::error::ApiError;
use crate::invalidation::InvalidationSink;
use crate::services::{RefundService, RefundWithLines, SaleService, SaleWithLines, StockService};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sales: SaleService,
    pub refunds: RefundService,
    pub stock: StockService,
    pub db: Database,
}

impl AppState {
    /// Wires the services over one database handle and invalidation sink.
    pub fn new(db: Database, invalidator: Arc<dyn InvalidationSink>, tax_rate: TaxRate) -> Self {
        AppState {
            sales: SaleService::new(db.clone(), invalidator.clone(), tax_rate),
            refunds: RefundService::new(db.clone(), invalidator.clone()),
            stock: StockService::new(db.clone(), invalidator),
            db,
        }
    }
}

/// Builds the application router.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sales", post(create_sale))
        .route("/sales/{id}", get(get_sale))
        .route("/sales/{id}/complete", post(complete_sale))
        .route("/sales/{id}/cancel", post(cancel_sale))
        .route("/refunds", post(create_refund))
        .route("/refunds/{id}", get(get_refund))
        .route("/stock/{store_id}/{product_id}", get(get_stock).put(set_stock))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub store_id: i64,
    pub customer_id: i64,
    pub lines: Vec<CreateSaleLineRequest>,
    /// Optional client-computed total, checked against the server's
    pub declared_total_cents: Option<i64>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleLineRequest {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefundRequest {
    pub sale_id: String,
    pub reason: String,
    /// Omitted = refund everything still refundable
    pub lines: Option<Vec<CreateRefundLineRequest>>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefundLineRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetStockRequest {
    pub quantity: i64,
}

impl From<CreateSaleRequest> for NewSale {
    fn from(req: CreateSaleRequest) -> Self {
        NewSale {
            store_id: req.store_id,
            customer_id: req.customer_id,
            lines: req
                .lines
                .into_iter()
                .map(|line| NewSaleLine {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price_cents,
                })
                .collect(),
            declared_total_cents: req.declared_total_cents,
            idempotency_key: req.idempotency_key,
        }
    }
}

impl From<CreateRefundRequest> for NewRefund {
    fn from(req: CreateRefundRequest) -> Self {
        NewRefund {
            sale_id: req.sale_id,
            reason: req.reason,
            lines: req.lines.map(|lines| {
                lines
                    .into_iter()
                    .map(|line| NewRefundLine {
                        product_id: line.product_id,
                        quantity: line.quantity,
                    })
                    .collect()
            }),
            idempotency_key: req.idempotency_key,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleResponse {
    pub id: String,
    pub date: DateTime<Utc>,
    pub status: SaleStatus,
    pub store_id: i64,
    pub customer_id: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub lines: Vec<SaleLineResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLineResponse {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub id: String,
    pub date: DateTime<Utc>,
    pub sale_id: String,
    pub reason: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub lines: Vec<RefundLineResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundLineResponse {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetailResponse {
    #[serde(flatten)]
    pub sale: SaleResponse,
    pub refunds: Vec<RefundResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockResponse {
    pub store_id: i64,
    pub product_id: i64,
    pub quantity: i64,
}

fn sale_response(sale: Sale, lines: Vec<SaleLine>) -> SaleResponse {
    SaleResponse {
        id: sale.id,
        date: sale.created_at,
        status: sale.status,
        store_id: sale.store_id,
        customer_id: sale.customer_id,
        subtotal_cents: sale.subtotal_cents,
        tax_cents: sale.tax_cents,
        total_cents: sale.total_cents,
        lines: lines
            .into_iter()
            .map(|line| SaleLineResponse {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                line_total_cents: line.line_total_cents,
            })
            .collect(),
    }
}

fn refund_response(refund: Refund, lines: Vec<RefundLine>) -> RefundResponse {
    RefundResponse {
        id: refund.id,
        date: refund.created_at,
        sale_id: refund.sale_id,
        reason: refund.reason,
        subtotal_cents: refund.subtotal_cents,
        tax_cents: refund.tax_cents,
        total_cents: refund.total_cents,
        lines: lines
            .into_iter()
            .map(|line| RefundLineResponse {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                line_total_cents: line.line_total_cents,
            })
            .collect(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /health
async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.db.health_check().await {
        return Err(ApiError::internal("database unavailable"));
    }
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// POST /sales
async fn create_sale(
    State(state): State<AppState>,
    Json(req): Json<CreateSaleRequest>,
) -> Result<(StatusCode, Json<SaleResponse>), ApiError> {
    let SaleWithLines { sale, lines } = state.sales.create_sale(req.into()).await?;
    Ok((StatusCode::CREATED, Json(sale_response(sale, lines))))
}

/// GET /sales/{id}
async fn get_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaleDetailResponse>, ApiError> {
    let detail = state.sales.get_sale(&id).await?;
    Ok(Json(SaleDetailResponse {
        sale: sale_response(detail.sale, detail.lines),
        refunds: detail
            .refunds
            .into_iter()
            .map(|(refund, lines)| refund_response(refund, lines))
            .collect(),
    }))
}

/// POST /sales/{id}/complete
async fn complete_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaleResponse>, ApiError> {
    let sale = state.sales.complete_sale(&id).await?;
    let lines = state.db.sales().get_lines(&id).await?;
    Ok(Json(sale_response(sale, lines)))
}

/// POST /sales/{id}/cancel
async fn cancel_sale(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SaleResponse>, ApiError> {
    let sale = state.sales.cancel_sale(&id).await?;
    let lines = state.db.sales().get_lines(&id).await?;
    Ok(Json(sale_response(sale, lines)))
}

/// POST /refunds
async fn create_refund(
    State(state): State<AppState>,
    Json(req): Json<CreateRefundRequest>,
) -> Result<(StatusCode, Json<RefundResponse>), ApiError> {
    let RefundWithLines { refund, lines } = state.refunds.create_refund(req.into()).await?;
    Ok((StatusCode::CREATED, Json(refund_response(refund, lines))))
}

/// GET /refunds/{id}
async fn get_refund(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RefundResponse>, ApiError> {
    let RefundWithLines { refund, lines } = state.refunds.get_refund(&id).await?;
    Ok(Json(refund_response(refund, lines)))
}

/// GET /stock/{store_id}/{product_id}
async fn get_stock(
    State(state): State<AppState>,
    Path((store_id, product_id)): Path<(i64, i64)>,
) -> Result<Json<StockResponse>, ApiError> {
    let quantity = state.stock.get_level(store_id, product_id).await?;
    Ok(Json(StockResponse {
        store_id,
        product_id,
        quantity,
    }))
}

/// PUT /stock/{store_id}/{product_id}
async fn set_stock(
    State(state): State<AppState>,
    Path((store_id, product_id)): Path<(i64, i64)>,
    Json(req): Json<SetStockRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let quantity = state
        .stock
        .set_level(store_id, product_id, req.quantity)
        .await?;
    Ok(Json(StockResponse {
        store_id,
        product_id,
        quantity,
    }))
}
