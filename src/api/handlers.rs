use crate::models::{OfferTotals, ReconcileDiff, RemovalSummary, ReplacedCounts, SyncOutcome};
use crate::service::{PricingService, ReconcileService, SyncService};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 请求体: 报价单ID
#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub offer_id: i64,
}

/// 请求体: 同步 (删除项存在时必须 confirmed=true)
#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    pub offer_id: i64,
    #[serde(default)]
    pub confirmed: bool,
}

/// 响应体: 重算合计
#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    pub success: bool,
    pub message: String,
    pub totals: Option<OfferTotals>,
}

/// 响应体: 比对结果
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub message: String,
    pub synced: Option<bool>,
    pub diff: Option<ReconcileDiff>,
}

/// 响应体: 同步结果
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub executed: bool,
    pub requires_confirmation: bool,
    pub message: String,
    pub removal_summary: Option<RemovalSummary>,
    pub counts: Option<ReplacedCounts>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 重算并持久化报价单合计
pub async fn recompute_totals(
    State(service): State<Arc<PricingService>>,
    Json(req): Json<OfferRequest>,
) -> Response {
    match service.recompute_offer(req.offer_id).await {
        Ok(totals) => {
            let response = TotalsResponse {
                success: true,
                message: format!("Offer {} totals recomputed", req.offer_id),
                totals: Some(totals),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = TotalsResponse {
                success: false,
                message: format!("Error: {}", e),
                totals: None,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// 比对报价单与实际预定 (状态徽标 + diff 提示用)
pub async fn reconcile_offer(
    State(service): State<Arc<ReconcileService>>,
    Json(req): Json<OfferRequest>,
) -> Response {
    match service.check_offer(req.offer_id).await {
        Ok(report) => {
            let response = ReconcileResponse {
                success: true,
                message: if report.synced {
                    "Synced".to_string()
                } else {
                    "Not synced".to_string()
                },
                synced: Some(report.synced),
                diff: Some(report.diff),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = ReconcileResponse {
                success: false,
                message: format!("Error: {}", e),
                synced: None,
                diff: None,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// 按报价单整体替换 job 预定
/// 快照刷新失败会整体中止并返回可重试错误, 不产生部分写入
pub async fn sync_offer(
    State(service): State<Arc<SyncService>>,
    Json(req): Json<SyncRequest>,
) -> Response {
    match service.sync_offer(req.offer_id, req.confirmed).await {
        Ok(SyncOutcome::NeedsConfirmation(plan)) => {
            let response = SyncResponse {
                success: true,
                executed: false,
                requires_confirmation: true,
                message: "Sync would remove existing bookings, confirmation required"
                    .to_string(),
                removal_summary: Some(plan.removal_summary),
                counts: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(SyncOutcome::Replaced(counts)) => {
            let response = SyncResponse {
                success: true,
                executed: true,
                requires_confirmation: false,
                message: format!("Offer {} synced to live bookings", req.offer_id),
                removal_summary: None,
                counts: Some(counts),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = SyncResponse {
                success: false,
                executed: false,
                requires_confirmation: false,
                message: format!("Error: {}", e),
                removal_summary: None,
                counts: None,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}
