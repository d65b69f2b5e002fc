use crate::{
    api::{attendance, leaderboard, points, rewards},
    auth::middleware::auth_middleware,
    config::Config,
    store::LedgerStore,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / requests_per_min as u64).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure<S: LedgerStore>(cfg: &mut web::ServiceConfig, config: Config) {
    let attendance_limiter = Arc::new(build_limiter(config.rate_attendance_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(protected_limiter) // rate limiting
            .service(
                web::scope("/attendance")
                    // /attendance
                    .service(
                        web::resource("")
                            .wrap(attendance_limiter)
                            .route(web::post().to(attendance::record_attendance::<S>)),
                    )
                    // /attendance/{user_id}/{date}
                    .service(
                        web::resource("/{user_id}/{date}")
                            .route(web::delete().to(attendance::reset_day::<S>)),
                    ),
            )
            .service(
                web::scope("/points")
                    .service(web::resource("/me").route(web::get().to(points::my_points::<S>)))
                    .service(
                        web::resource("/adjust").route(web::post().to(points::adjust_points::<S>)),
                    ),
            )
            .service(
                web::scope("/rewards")
                    // /rewards
                    .service(web::resource("").route(web::get().to(rewards::list_rewards::<S>)))
                    // /rewards/{id}/redeem
                    .service(
                        web::resource("/{id}/redeem").route(web::post().to(rewards::redeem::<S>)),
                    )
                    // /rewards/{id}/stock
                    .service(
                        web::resource("/{id}/stock")
                            .route(web::post().to(rewards::adjust_stock::<S>)),
                    ),
            )
            .service(
                web::scope("/redemptions")
                    .service(
                        web::resource("").route(web::get().to(rewards::list_redemptions::<S>)),
                    )
                    .service(
                        web::resource("/{id}")
                            .route(web::put().to(rewards::process_redemption::<S>)),
                    ),
            )
            .service(
                web::resource("/leaderboard")
                    .route(web::get().to(leaderboard::leaderboard::<S>)),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{SECRET, config, state};
    use crate::auth::jwt::issue_for_tests;
    use crate::store::MemoryStore;
    use actix_web::{App, http::StatusCode, test};

    #[actix_web::test]
    async fn protected_routes_need_a_bearer_token() {
        let store = MemoryStore::new();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .app_data(web::Data::new(state(&store, false)))
                .configure(|cfg| configure::<MemoryStore>(cfg, config())),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/leaderboard")
            .peer_addr("127.0.0.1:4000".parse().unwrap())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/points/me")
            .peer_addr("127.0.0.1:4000".parse().unwrap())
            .insert_header(("Authorization", format!("Bearer {}", issue_for_tests(5, 3, SECRET))))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
