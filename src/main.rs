use std::str::FromStr;
use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use dotenvy::dotenv;

use attendance_ledger::api::{AppState, Oracles};
use attendance_ledger::config::Config;
use attendance_ledger::db::init_db;
use attendance_ledger::docs::ApiDoc;
use attendance_ledger::oracle::{
    CachedTimeSettings, DescriptorMatcher, Geofence, MySqlFaceEnrollment, MySqlLeaveOracle,
};
use attendance_ledger::routes;
use attendance_ledger::store::MySqlStore;
use tracing::info;
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "Attendance points service"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let level = tracing::Level::from_str(&config.log_level).unwrap_or(tracing::Level::DEBUG);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await?;

    let oracles = Oracles {
        geo: Arc::new(Geofence::new(
            config.office_lat,
            config.office_lng,
            config.office_radius_meters,
        )),
        face: Arc::new(DescriptorMatcher::new(config.face_match_threshold)),
        enrollment: Arc::new(MySqlFaceEnrollment::new(pool.clone())),
        leave: Arc::new(MySqlLeaveOracle::new(pool.clone())),
        times: Arc::new(CachedTimeSettings::new(
            pool.clone(),
            config.default_times,
            config.settings_cache_ttl_secs,
        )),
    };

    let state = Data::new(AppState::new(
        MySqlStore::new(pool),
        &config.engine,
        config.dispatch.clone(),
        oracles,
    ));

    // Reconcile awards that failed after a successful check-in
    let _backfill = state.dispatcher.spawn_backfill();

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(state.clone())
            .app_data(Data::new(config.clone()))
            .service(index)
            .configure(|cfg| routes::configure::<MySqlStore>(cfg, config_data.clone()))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
