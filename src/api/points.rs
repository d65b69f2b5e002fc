use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::engine::{AccountSummary, Adjustment};
use crate::store::LedgerStore;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

const DEFAULT_HISTORY: u32 = 20;
const MAX_HISTORY: u32 = 200;

#[derive(Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Number of most recent history entries to include (default 20, max 200)
    pub history: Option<u32>,
}

#[derive(Deserialize, ToSchema)]
pub struct AdjustPoints {
    #[schema(example = 1000)]
    pub user_id: u64,
    /// Signed amount; negative values deduct.
    #[schema(example = 25)]
    pub delta: i64,
    #[schema(example = "Hackathon winner")]
    pub reason: String,
}

/// Balance, streaks, recent history and badges of the caller
#[utoipa::path(
    get,
    path = "/api/points/me",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Caller's points account", body = AccountSummary),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Points"
)]
pub async fn my_points<S: LedgerStore>(
    auth: AuthUser,
    state: web::Data<AppState<S>>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let limit = query.history.unwrap_or(DEFAULT_HISTORY).clamp(1, MAX_HISTORY);
    let summary = state.ledger.summary(auth.user_id, limit).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Manually credit or debit a user's balance (admin)
#[utoipa::path(
    post,
    path = "/api/points/adjust",
    request_body(
        content = AdjustPoints,
        description = "Adjustment with mandatory audit reason",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Balance adjusted", body = Adjustment),
        (status = 400, description = "Missing reason or zero amount"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 422, description = "Adjustment would make the balance negative"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Points"
)]
pub async fn adjust_points<S: LedgerStore>(
    auth: AuthUser,
    state: web::Data<AppState<S>>,
    payload: web::Json<AdjustPoints>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let adjustment = state
        .ledger
        .adjust_points(
            payload.user_id,
            payload.delta,
            &payload.reason,
            auth.user_id,
            state.now(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(adjustment))
}
