use chrono::{DateTime, SubsecRound, TimeDelta, Utc};
use jobgate_application::ThrottleStore;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::PostgresThrottleStore;
use crate::MIGRATOR;

async fn test_pool() -> Option<PgPool> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        return None;
    };

    let pool = match PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url.as_str())
        .await
    {
        Ok(pool) => pool,
        Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
    };

    if let Err(error) = MIGRATOR.run(&pool).await {
        panic!("failed to run migrations for throttle store tests: {error}");
    }

    Some(pool)
}

fn unique_key(prefix: &str) -> String {
    format!("{prefix}:user:{}", jobgate_domain::UserId::new())
}

// Postgres stores microseconds.
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[tokio::test]
async fn hits_share_a_window_until_it_closes() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresThrottleStore::new(pool);
    let key = unique_key("register");
    let window = TimeDelta::hours(1);
    let now = now_micros();

    for expected in 1..=3 {
        let snapshot = store.record_hit(&key, window, now).await;
        let Ok(snapshot) = snapshot else {
            panic!("record_hit failed: {snapshot:?}");
        };
        assert_eq!(snapshot.count, expected);
        assert_eq!(snapshot.window_started_at, now);
    }

    let reopened = store.record_hit(&key, window, now + window).await;
    assert!(matches!(reopened, Ok(snapshot) if snapshot.count == 1 && snapshot.window_started_at == now + window));
}

#[tokio::test]
async fn release_is_scoped_to_the_recorded_window() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresThrottleStore::new(pool);
    let key = unique_key("auth");
    let window = TimeDelta::minutes(15);
    let now = now_micros();

    let Ok(first) = store.record_hit(&key, window, now).await else {
        panic!("record_hit failed");
    };
    assert!(store.record_hit(&key, window, now).await.is_ok());
    assert!(store.release_hit(&key, first.window_started_at).await.is_ok());
    assert!(
        store
            .release_hit(&key, first.window_started_at - TimeDelta::seconds(1))
            .await
            .is_ok()
    );

    let peeked = store.peek(&key, window, now).await;
    assert!(matches!(peeked, Ok(Some(snapshot)) if snapshot.count == 1));
    assert!(matches!(store.peek(&key, window, now + window).await, Ok(None)));
}

#[tokio::test]
async fn sweep_and_reset_delete_rows() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresThrottleStore::new(pool);
    let short_key = unique_key("message");
    let long_key = unique_key("application");
    let now = now_micros();

    assert!(store.record_hit(&short_key, TimeDelta::minutes(1), now).await.is_ok());
    assert!(store.record_hit(&long_key, TimeDelta::hours(1), now).await.is_ok());

    let swept = store.sweep_expired(now + TimeDelta::minutes(1)).await;
    assert!(matches!(swept, Ok(count) if count >= 1));
    assert!(matches!(store.peek(&short_key, TimeDelta::minutes(1), now).await, Ok(None)));

    assert!(matches!(store.reset(&long_key).await, Ok(true)));
    assert!(matches!(store.reset(&long_key).await, Ok(false)));
}

#[tokio::test]
async fn peek_uses_the_requested_window() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let store = PostgresThrottleStore::new(pool);
    let key = unique_key("register");
    let now = now_micros();
    let later = now + TimeDelta::minutes(2);

    assert!(store.record_hit(&key, TimeDelta::hours(1), now).await.is_ok());
    assert!(matches!(
        store.peek(&key, TimeDelta::hours(1), later).await,
        Ok(Some(snapshot)) if snapshot.count == 1
    ));
    assert!(matches!(
        store.peek(&key, TimeDelta::minutes(1), later).await,
        Ok(None)
    ));
}
