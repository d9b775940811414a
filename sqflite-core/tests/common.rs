//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use sqflite_core::{initialize, ApiVersion, Bridge, BridgeConfig, Value};

/// Returns a ready bridge serving `version`, with an empty database open.
pub async fn open_bridge(version: ApiVersion) -> Bridge {
    let config = BridgeConfig::default().with_api_version(version);
    let mut bridge = initialize(config).await.expect("initialize");
    bridge.create().expect("create");
    bridge
}

/// Creates `users(id, name)` holding `count` rows named `user-<id>`.
pub fn seed_users(bridge: &mut Bridge, count: i64) {
    bridge
        .run(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
            None,
        )
        .expect("create table");
    for id in 1..=count {
        bridge
            .run(
                "INSERT INTO users (id, name) VALUES (?, ?)",
                Some(&vec![Value::Integer(id), Value::Text(format!("user-{id}"))].into()),
            )
            .expect("insert user");
    }
}

/// Reads every user row ordered by id.
pub fn all_users(bridge: &mut Bridge) -> Vec<Vec<Value>> {
    bridge
        .execute("SELECT id, name FROM users ORDER BY id")
        .expect("select users")
        .map(|set| set.values)
        .unwrap_or_default()
}
