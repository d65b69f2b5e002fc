use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::model::reward::{RedemptionStatus, Reward, RewardRedemption};
use crate::store::LedgerStore;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct RewardFilter {
    /// Include inactive rewards (managers only)
    pub include_inactive: Option<bool>,
}

#[derive(Deserialize, IntoParams)]
pub struct RedemptionFilter {
    /// Filter by user; employees always see only their own redemptions
    pub user_id: Option<u64>,
    /// Filter by status
    pub status: Option<RedemptionStatus>,
}

#[derive(Deserialize, ToSchema)]
pub struct StockAdjustment {
    /// Positive to restock, negative to write off.
    #[schema(example = 10)]
    pub delta: i32,
    #[schema(example = "Quarterly restock")]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ProcessRedemption {
    pub status: RedemptionStatus,
    #[schema(example = "Handed over at front desk")]
    pub notes: Option<String>,
}

/// Reward catalog
#[utoipa::path(
    get,
    path = "/api/rewards",
    params(RewardFilter),
    responses(
        (status = 200, description = "Rewards", body = [Reward]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Rewards"
)]
pub async fn list_rewards<S: LedgerStore>(
    auth: AuthUser,
    state: web::Data<AppState<S>>,
    query: web::Query<RewardFilter>,
) -> actix_web::Result<impl Responder> {
    let active_only = !(auth.is_manager() && query.include_inactive.unwrap_or(false));
    let rewards = state.rewards.catalog(active_only).await?;
    Ok(HttpResponse::Ok().json(rewards))
}

/// Redeem a reward with the caller's points
#[utoipa::path(
    post,
    path = "/api/rewards/{id}/redeem",
    params(
        ("id" = u64, Path, description = "Reward id")
    ),
    responses(
        (status = 201, description = "Redemption created as PENDING", body = RewardRedemption),
        (status = 404, description = "Reward not found"),
        (status = 409, description = "OUT_OF_STOCK, REWARD_INACTIVE or PER_USER_LIMIT_REACHED"),
        (status = 422, description = "INSUFFICIENT_POINTS", body = Object, example = json!({
            "error": "INSUFFICIENT_POINTS",
            "message": "Insufficient points: 300 required, 120 available"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Rewards"
)]
pub async fn redeem<S: LedgerStore>(
    auth: AuthUser,
    state: web::Data<AppState<S>>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let redemption = state
        .rewards
        .redeem(auth.user_id, path.into_inner(), state.now())
        .await?;
    Ok(HttpResponse::Created().json(redemption))
}

/// Restock or write off a finite-stock reward (admin)
#[utoipa::path(
    post,
    path = "/api/rewards/{id}/stock",
    params(
        ("id" = u64, Path, description = "Reward id")
    ),
    request_body(
        content = StockAdjustment,
        description = "Stock change with mandatory audit reason",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Stock adjusted", body = Reward),
        (status = 400, description = "Missing reason, unlimited stock or negative result"),
        (status = 404, description = "Reward not found"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Rewards"
)]
pub async fn adjust_stock<S: LedgerStore>(
    auth: AuthUser,
    state: web::Data<AppState<S>>,
    path: web::Path<u64>,
    payload: web::Json<StockAdjustment>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let reward = state
        .rewards
        .adjust_stock(
            path.into_inner(),
            payload.delta,
            &payload.reason,
            auth.user_id,
            state.now(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(reward))
}

/// List redemptions
#[utoipa::path(
    get,
    path = "/api/redemptions",
    params(RedemptionFilter),
    responses(
        (status = 200, description = "Redemptions, newest first", body = [RewardRedemption]),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Rewards"
)]
pub async fn list_redemptions<S: LedgerStore>(
    auth: AuthUser,
    state: web::Data<AppState<S>>,
    query: web::Query<RedemptionFilter>,
) -> actix_web::Result<impl Responder> {
    let user_id = if auth.is_manager() {
        query.user_id
    } else {
        Some(auth.user_id)
    };
    let redemptions = state.rewards.redemptions(user_id, query.status).await?;
    Ok(HttpResponse::Ok().json(redemptions))
}

/// Approve, deliver or reject a redemption (admin)
#[utoipa::path(
    put,
    path = "/api/redemptions/{id}",
    params(
        ("id" = u64, Path, description = "Redemption id")
    ),
    request_body(
        content = ProcessRedemption,
        description = "Target status; rejecting refunds points and stock",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Redemption updated", body = RewardRedemption),
        (status = 404, description = "Redemption not found"),
        (status = 409, description = "INVALID_TRANSITION"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Rewards"
)]
pub async fn process_redemption<S: LedgerStore>(
    auth: AuthUser,
    state: web::Data<AppState<S>>,
    path: web::Path<u64>,
    payload: web::Json<ProcessRedemption>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let payload = payload.into_inner();
    let redemption = state
        .rewards
        .process(
            path.into_inner(),
            payload.status,
            payload.notes,
            auth.user_id,
            state.now(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(redemption))
}
