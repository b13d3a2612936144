//! Daily metric counter properties, including increment atomicity under
//! concurrent webhook invocations

mod common;

use pretty_assertions::assert_eq;

use botforge::storage::{get_connection, metrics};
use botforge::telemetry::{self, InboundUser};
use common::TestEnvironment;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn fifty_concurrent_increments_sum_to_fifty() {
    let env = TestEnvironment::new().await;
    env.seed_project("p1", common::TEST_TOKEN, "active");
    let today = metrics::today();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let db = std::sync::Arc::clone(&env.db);
        let date = today.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let conn = get_connection(&db).unwrap();
            metrics::increment(&conn, "p1", "total_messages", &date, 1).unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(env.metric("p1", "total_messages"), 50);
}

#[tokio::test]
async fn unique_users_count_once_each() {
    let env = TestEnvironment::new().await;
    env.seed_project("p1", common::TEST_TOKEN, "active");

    let ada = InboundUser { id: "1001".into(), ..Default::default() };
    let bob = InboundUser { id: "1002".into(), ..Default::default() };

    telemetry::record_message(&env.db, "p1", &ada, "hi", "hello", false, 5);
    telemetry::record_message(&env.db, "p1", &ada, "again", "hello", false, 5);
    telemetry::record_message(&env.db, "p1", &bob, "hey", "hello", false, 5);

    assert_eq!(env.metric("p1", "total_users"), 2);
    assert_eq!(env.metric("p1", "total_messages"), 3);
    assert_eq!(env.event_count("p1", "message"), 3);
}

#[tokio::test]
async fn per_command_counters_use_dynamic_names() {
    let env = TestEnvironment::new().await;
    env.seed_project("p1", common::TEST_TOKEN, "active");

    telemetry::record_command_execution(&env.db, "p1", "1001", "/start");
    telemetry::record_command_execution(&env.db, "p1", "1001", "/help");
    telemetry::record_command_execution(&env.db, "p1", "1001", "/start");

    assert_eq!(env.metric("p1", "command_/start"), 2);
    assert_eq!(env.metric("p1", "command_/help"), 1);
}
