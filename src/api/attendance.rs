use crate::api::AppState;
use crate::auth::auth::AuthUser;
use crate::engine::AttendanceCommand;
use crate::model::attendance::AttendanceRecord;
use crate::model::role::Role;
use crate::store::LedgerStore;
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct AttendanceRequest {
    #[schema(example = 23.8103)]
    pub lat: f64,
    #[schema(example = 90.4125)]
    pub lng: f64,
    /// Face descriptor captured by the client at check-in time.
    #[schema(example = json!([0.12, -0.03, 0.44]))]
    pub face_descriptor: Vec<f32>,
    /// Kiosk accounts record on behalf of an employee; everyone else records for themselves.
    #[schema(example = 1000)]
    pub user_id: Option<u64>,
}

#[derive(Serialize, ToSchema)]
pub struct AttendanceResponse {
    pub record: AttendanceRecord,
    /// True when a points award was queued for this record.
    pub points_pending: bool,
    #[schema(example = 12.5)]
    pub distance_meters: f64,
    #[schema(example = 0.31)]
    pub face_score: Option<f64>,
}

/// Record the next check-in or check-out of the day
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body(
        content = AttendanceRequest,
        description = "Location and face descriptor of the attempt",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Attendance recorded", body = AttendanceResponse),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 409, description = "ALREADY_EXCUSED, TOO_EARLY_FOR_CHECKOUT or ALREADY_CHECKED_OUT", body = Object, example = json!({
            "error": "TOO_EARLY_FOR_CHECKOUT",
            "message": "Check-out is not allowed before 17:00:00 (observed 16:30:00)"
        })),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn record_attendance<S: LedgerStore>(
    auth: AuthUser,
    state: web::Data<AppState<S>>,
    payload: web::Json<AttendanceRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let user_id = match payload.user_id {
        Some(id) if id != auth.user_id => {
            if auth.role != Role::System {
                return Err(actix_web::error::ErrorForbidden(
                    "Only kiosk accounts may record for another user",
                ));
            }
            id
        }
        _ => auth.user_id,
    };

    let now = state.now();
    let oracles = &state.oracles;
    let geo = oracles.geo.check(payload.lat, payload.lng);
    let face = match oracles.enrollment.enrolled_descriptor(user_id).await? {
        Some(enrolled) => Some(oracles.face.check(&payload.face_descriptor, &enrolled)),
        None => None,
    };
    let leave = oracles.leave.is_excused(user_id, now.date()).await?;

    let outcome = state
        .recorder
        .record(AttendanceCommand {
            user_id,
            observed_at: now,
            geo_valid: geo.valid,
            face_valid: face.is_some_and(|f| f.matched),
            excused_today: leave.excused,
        })
        .await?;

    let points_pending = match outcome.points_event {
        Some(event) => {
            state.dispatcher.dispatch(event);
            true
        }
        None => false,
    };

    Ok(HttpResponse::Created().json(AttendanceResponse {
        record: outcome.record,
        points_pending,
        distance_meters: geo.distance_meters,
        face_score: face.map(|f| f.score),
    }))
}

/// Delete every attendance record of one user on one day (admin)
#[utoipa::path(
    delete,
    path = "/api/attendance/{user_id}/{date}",
    params(
        ("user_id" = u64, Path, description = "User whose day is reset"),
        ("date" = String, Path, description = "Calendar day, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Day reset", body = Object, example = json!({
            "removed": 2
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn reset_day<S: LedgerStore>(
    auth: AuthUser,
    state: web::Data<AppState<S>>,
    path: web::Path<(u64, NaiveDate)>,
) -> actix_web::Result<impl Responder> {
    auth.require_manager()?;
    let (user_id, date) = path.into_inner();

    let removed = state.recorder.reset_day(user_id, date, auth.user_id).await?;
    info!(user_id, %date, removed, actor = auth.user_id, "Attendance day reset by admin");

    Ok(HttpResponse::Ok().json(json!({ "removed": removed })))
}
