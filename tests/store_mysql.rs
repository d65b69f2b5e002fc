//! MySQL store integration tests using testcontainers.
//!
//! Run with: cargo test --test store_mysql -- --ignored --nocapture
//!
//! Each test starts its own MySQL 8 container, loads `db/schema.sql` and
//! drives `MySqlStore` through real row locks and unique keys.

use std::time::Duration;

use attendance_ledger::engine::{EngineError, RewardDesk, RuleViolation, rules};
use attendance_ledger::model::badge::UserBadge;
use attendance_ledger::model::points::{ActivityCode, NewHistoryEntry};
use attendance_ledger::store::{LedgerStore, LedgerTx, MySqlStore};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

const SCHEMA: &str = include_str!("../db/schema.sql");

/// Start MySQL and return the container with its connection URL.
async fn start_mysql() -> (ContainerAsync<GenericImage>, String) {
    // The entrypoint's temporary init server reports "port: 0"; the real one
    // reports the listening port.
    let image = GenericImage::new("mysql", "8.0")
        .with_exposed_port(3306.tcp())
        .with_wait_for(WaitFor::message_on_stderr("port: 3306"));

    let container = image
        .with_env_var("MYSQL_ROOT_PASSWORD", "ledger")
        .with_env_var("MYSQL_DATABASE", "ledger")
        .with_startup_timeout(Duration::from_secs(120))
        .start()
        .await
        .expect("Failed to start mysql container");

    let host_port = container
        .get_host_port_ipv4(3306)
        .await
        .expect("Failed to get mapped port");
    let host = container
        .get_host()
        .await
        .expect("Failed to get container host");

    let url = format!("mysql://root:ledger@{}:{}/ledger", host, host_port);
    println!("MySQL available at: {}", url);

    (container, url)
}

/// Connect with retries; the server may still be settling after the log line.
async fn connect(url: &str, lock_wait_secs: Option<u32>) -> MySqlPool {
    let mut last_error = None;
    for _ in 0..30 {
        let mut options = MySqlPoolOptions::new().max_connections(8);
        if let Some(secs) = lock_wait_secs {
            options = options.after_connect(move |conn, _meta| {
                Box::pin(async move {
                    let sql = format!("SET SESSION innodb_lock_wait_timeout = {secs}");
                    sqlx::query(&sql)
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            });
        }
        match options.connect(url).await {
            Ok(pool) => return pool,
            Err(e) => {
                last_error = Some(e);
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
    panic!("MySQL never accepted connections: {:?}", last_error);
}

async fn apply_schema(pool: &MySqlPool) {
    // Comment lines may contain ';', so drop them before splitting.
    let script: String = SCHEMA
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");

    for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .unwrap_or_else(|e| panic!("schema statement failed: {e}\n{statement}"));
    }
}

async fn setup(lock_wait_secs: Option<u32>) -> (ContainerAsync<GenericImage>, MySqlPool) {
    let (container, url) = start_mysql().await;
    let pool = connect(&url, lock_wait_secs).await;
    apply_schema(&pool).await;
    (container, pool)
}

async fn seed_user(pool: &MySqlPool, name: &str, points: i64) -> u64 {
    let user_id = sqlx::query("INSERT INTO users (username, role_id) VALUES (?, 3)")
        .bind(name)
        .execute(pool)
        .await
        .expect("insert user")
        .last_insert_id();

    sqlx::query(
        "INSERT INTO user_points (user_id, points, total_earned, last_updated) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(points)
    .bind(points)
    .bind(at(8, 0))
    .execute(pool)
    .await
    .expect("insert account");

    user_id
}

async fn seed_reward(pool: &MySqlPool, cost: i64, quantity: i32) -> u64 {
    sqlx::query(
        "INSERT INTO rewards (name, points_cost, quantity, max_per_user, is_active) VALUES (?, ?, ?, -1, TRUE)",
    )
    .bind("Coffee voucher")
    .bind(cost)
    .bind(quantity)
    .execute(pool)
    .await
    .expect("insert reward")
    .last_insert_id()
}

fn at(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 8)
        .and_then(|d| d.and_hms_opt(hour, minute, 0))
        .expect("valid timestamp")
}

fn perfect_week_entry(user_id: u64, run_start: NaiveDate) -> NewHistoryEntry {
    NewHistoryEntry {
        user_id,
        points: 50,
        reason: ActivityCode::PerfectWeek.description().to_string(),
        activity_code: ActivityCode::PerfectWeek,
        metadata: serde_json::json!({ "run_start": run_start.to_string() }),
        attendance_id: None,
        idempotency_key: Some(rules::perfect_week_key(user_id, run_start)),
        date: at(9, 0),
    }
}

async fn count(pool: &MySqlPool, sql: &str, id: u64) -> i64 {
    sqlx::query_scalar::<_, i64>(sql)
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("count query")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "requires Docker"]
async fn concurrent_redeems_share_a_single_unit() {
    let (_container, pool) = setup(None).await;
    let alice = seed_user(&pool, "alice", 100).await;
    let bob = seed_user(&pool, "bob", 100).await;
    let reward = seed_reward(&pool, 40, 1).await;

    let desk = RewardDesk::new(MySqlStore::new(pool.clone()), false);
    let (first, second) = tokio::join!(
        desk.redeem(alice, reward, at(10, 0)),
        desk.redeem(bob, reward, at(10, 0)),
    );

    let outcomes = [first, second];
    let granted = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(granted, 1, "exactly one redeem wins: {:?}", outcomes);
    assert!(outcomes.iter().any(|r| matches!(
        r,
        Err(EngineError::Rule(RuleViolation::OutOfStock))
    )));

    let quantity = sqlx::query_scalar::<_, i32>("SELECT quantity FROM rewards WHERE id = ?")
        .bind(reward)
        .fetch_one(&pool)
        .await
        .expect("read quantity");
    assert_eq!(quantity, 0);
    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM reward_redemptions WHERE reward_id = ?", reward).await,
        1
    );

    let balances: i64 =
        sqlx::query_scalar("SELECT CAST(SUM(points) AS SIGNED) FROM user_points")
            .fetch_one(&pool)
            .await
            .expect("sum balances");
    assert_eq!(balances, 160, "only the winner paid");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "requires Docker"]
async fn perfect_week_key_is_paid_once() {
    let (_container, pool) = setup(None).await;
    let user = seed_user(&pool, "carol", 0).await;
    let store = MySqlStore::new(pool.clone());
    let run_start = NaiveDate::from_ymd_opt(2024, 3, 4).expect("valid date");
    let entry = perfect_week_entry(user, run_start);

    let mut first = store.begin().await.expect("begin first");
    assert!(first.insert_history(entry.clone()).await.expect("first insert").is_some());

    // The second writer blocks on the unique key until the first commits.
    let racing = {
        let store = store.clone();
        let entry = entry.clone();
        tokio::spawn(async move {
            let mut tx = store.begin().await.expect("begin second");
            let inserted = tx.insert_history(entry).await.expect("second insert");
            tx.commit().await.expect("commit second");
            inserted
        })
    };
    tokio::time::sleep(Duration::from_millis(300)).await;
    first.commit().await.expect("commit first");

    assert!(racing.await.expect("join").is_none());

    let mut replay = store.begin().await.expect("begin replay");
    assert!(replay.insert_history(entry).await.expect("replay insert").is_none());
    replay.commit().await.expect("commit replay");

    let key = rules::perfect_week_key(user, run_start);
    let rows: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM point_history WHERE idempotency_key = ?")
            .bind(&key)
            .fetch_one(&pool)
            .await
            .expect("count history");
    assert_eq!(rows, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "requires Docker"]
async fn badge_is_granted_once() {
    let (_container, pool) = setup(None).await;
    let user = seed_user(&pool, "dave", 0).await;
    let store = MySqlStore::new(pool.clone());

    let mut tx = store.begin().await.expect("begin");
    let catalog = tx.badge_catalog().await.expect("catalog");
    let perfect_week = catalog
        .iter()
        .find(|b| b.name == "Perfect Week")
        .expect("seeded badge");
    let grant = UserBadge {
        user_id: user,
        badge_id: perfect_week.id,
        earned_at: at(9, 0),
    };

    assert!(tx.insert_user_badge(&grant).await.expect("first grant"));
    assert!(!tx.insert_user_badge(&grant).await.expect("same tx grant"));
    tx.commit().await.expect("commit");

    let mut again = store.begin().await.expect("begin again");
    assert!(!again.insert_user_badge(&grant).await.expect("later grant"));
    assert_eq!(again.user_badge_ids(user).await.expect("ids"), vec![perfect_week.id]);
    again.commit().await.expect("commit again");

    assert_eq!(
        count(&pool, "SELECT COUNT(*) FROM user_badges WHERE user_id = ?", user).await,
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[ignore = "requires Docker"]
async fn lock_wait_timeout_is_a_retryable_conflict() {
    let (_container, pool) = setup(Some(1)).await;
    let user = seed_user(&pool, "erin", 10).await;
    let store = MySqlStore::new(pool.clone());

    let mut holder = store.begin().await.expect("begin holder");
    assert!(holder.lock_account(user).await.expect("lock").is_some());

    let mut waiter = store.begin().await.expect("begin waiter");
    let err = waiter
        .lock_account(user)
        .await
        .expect_err("second lock must time out");
    assert!(matches!(err, EngineError::Conflict(_)), "got {err:?}");
    assert!(err.is_retryable());

    drop(waiter);
    holder.commit().await.expect("commit holder");
}
