use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::engine::{LeaderboardEntry, Period};
use crate::store::LedgerStore;
use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct LeaderboardQuery {
    /// all-time (default), monthly, weekly or daily
    pub period: Option<Period>,
    /// Page size (default 10)
    pub limit: Option<u32>,
    /// Entries to skip (default 0)
    pub offset: Option<u32>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub period: Period,
    pub data: Vec<LeaderboardEntry>,
    #[schema(example = 10)]
    pub limit: u32,
    #[schema(example = 0)]
    pub offset: u32,
}

/// Ranked points leaderboard
///
/// Periods other than all-time include accounts whose last activity falls in the
/// window, ranked by their overall balance.
#[utoipa::path(
    get,
    path = "/api/leaderboard",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Leaderboard page", body = LeaderboardResponse),
        (status = 400, description = "Limit out of range"),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Leaderboard"
)]
pub async fn leaderboard<S: LedgerStore>(
    _auth: AuthUser,
    state: web::Data<AppState<S>>,
    query: web::Query<LeaderboardQuery>,
) -> actix_web::Result<impl Responder> {
    let period = query.period.unwrap_or_default();
    let limit = query.limit.unwrap_or(10);
    let offset = query.offset.unwrap_or(0);

    let data = state
        .leaderboard
        .rank(period, limit, offset, state.now())
        .await?;

    Ok(HttpResponse::Ok().json(LeaderboardResponse {
        period,
        data,
        limit,
        offset,
    }))
}
