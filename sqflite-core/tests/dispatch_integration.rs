//! Integration tests for JSON call dispatch.

mod common;

use serde_json::json;
use sqflite_core::{ApiVersion, Bridge, BridgeError, Call, Reply, StatementId, Value};
use test_case::test_case;

/// Parses a host call and dispatches it.
fn call_json(bridge: &mut Bridge, call: serde_json::Value) -> Result<Reply, BridgeError> {
    let call: Call = serde_json::from_value(call).expect("valid call json");
    bridge.call(&call)
}

fn reply_json(reply: &Reply) -> serde_json::Value {
    serde_json::to_value(reply).expect("reply serializes")
}

#[test_case(ApiVersion::V1, "prepare" ; "v1 prepare")]
#[test_case(ApiVersion::V1, "getColumnNames" ; "v1 column names")]
#[test_case(ApiVersion::V2, "runParams" ; "v2 run params")]
#[test_case(ApiVersion::V2, "stmt_run" ; "v2 statement run")]
#[test_case(ApiVersion::V2, "executeScalar" ; "v2 execute scalar")]
#[test_case(ApiVersion::V1, "export" ; "v1 export")]
fn test_version_serves_name(version: ApiVersion, name: &str) {
    assert!(version.method(name).is_some());
}

#[test_case(ApiVersion::V1, "stmt_prepare" ; "v1 rejects v2 prepare")]
#[test_case(ApiVersion::V1, "runParams" ; "v1 rejects run params")]
#[test_case(ApiVersion::V2, "step" ; "v2 rejects v1 step")]
#[test_case(ApiVersion::V2, "free" ; "v2 rejects v1 free")]
#[test_case(ApiVersion::V2, "exec" ; "unknown name")]
fn test_version_rejects_name(version: ApiVersion, name: &str) {
    assert_eq!(version.method(name), None);
}

#[tokio::test]
async fn test_unknown_method_is_reported_with_version() {
    let mut bridge = common::open_bridge(ApiVersion::V2).await;
    let err = call_json(&mut bridge, json!({"method": "step", "statement": 1})).unwrap_err();
    assert_eq!(
        err,
        BridgeError::UnknownMethod {
            method: "step".to_string(),
            version: ApiVersion::V2,
        }
    );
}

#[tokio::test]
async fn test_missing_arguments_are_reported() {
    let mut bridge = common::open_bridge(ApiVersion::V2).await;
    assert_eq!(
        call_json(&mut bridge, json!({"method": "execute"})),
        Err(BridgeError::MissingArgument("sql"))
    );
    assert_eq!(
        call_json(&mut bridge, json!({"method": "stmt_step"})),
        Err(BridgeError::MissingArgument("statement"))
    );
    assert_eq!(
        call_json(&mut bridge, json!({"method": "runParams", "sql": "SELECT 1"})),
        Err(BridgeError::MissingArgument("params"))
    );
    assert_eq!(
        call_json(&mut bridge, json!({"method": "open"})),
        Err(BridgeError::MissingArgument("data"))
    );
}

#[tokio::test]
async fn test_v1_session() {
    let mut bridge = common::open_bridge(ApiVersion::V1).await;

    call_json(
        &mut bridge,
        json!({"method": "run", "sql": "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)"}),
    )
    .unwrap();
    // v1 `run` binds its parameters.
    call_json(
        &mut bridge,
        json!({"method": "run", "sql": "INSERT INTO notes (body) VALUES (?)", "params": ["hello"]}),
    )
    .unwrap();
    call_json(
        &mut bridge,
        json!({"method": "run", "sql": "INSERT INTO notes (body) VALUES ($body)", "params": {"$body": "world"}}),
    )
    .unwrap();

    let modified = call_json(&mut bridge, json!({"method": "getRowsModified"})).unwrap();
    assert_eq!(modified, Reply::Count(1));

    // v1 `executeScalar` returns the raw value.
    let scalar = call_json(
        &mut bridge,
        json!({"method": "executeScalar", "sql": "SELECT body FROM notes WHERE id = 2"}),
    )
    .unwrap();
    assert_eq!(scalar, Reply::Value(Value::from("world")));

    let prepared = call_json(
        &mut bridge,
        json!({"method": "prepare", "sql": "SELECT id, body FROM notes ORDER BY id"}),
    )
    .unwrap();
    let Reply::Statement(id) = prepared else {
        panic!("expected a statement id, got {prepared:?}");
    };

    let columns = call_json(
        &mut bridge,
        json!({"method": "getColumnNames", "statement": id}),
    )
    .unwrap();
    assert_eq!(reply_json(&columns), json!(["id", "body"]));

    let mut rows = Vec::new();
    while call_json(&mut bridge, json!({"method": "step", "statement": id})).unwrap()
        == Reply::Bool(true)
    {
        let row = call_json(&mut bridge, json!({"method": "get", "statement": id})).unwrap();
        rows.push(reply_json(&row));
    }
    assert_eq!(rows, vec![json!([1, "hello"]), json!([2, "world"])]);

    assert_eq!(
        call_json(&mut bridge, json!({"method": "free", "statement": id})).unwrap(),
        Reply::Bool(true)
    );
    assert_eq!(
        call_json(&mut bridge, json!({"method": "step", "statement": id})),
        Err(BridgeError::UnknownStatement(id))
    );
}

#[tokio::test]
async fn test_v2_session() {
    let mut bridge = common::open_bridge(ApiVersion::V2).await;

    call_json(
        &mut bridge,
        json!({"method": "run", "sql": "CREATE TABLE scores (player TEXT, points REAL)"}),
    )
    .unwrap();
    call_json(
        &mut bridge,
        json!({"method": "runParams", "sql": "INSERT INTO scores VALUES (?, ?)", "params": ["ann", 7.5]}),
    )
    .unwrap();

    let insert = call_json(
        &mut bridge,
        json!({"method": "stmt_prepare", "sql": "INSERT INTO scores VALUES (:player, :points)"}),
    )
    .unwrap();
    let Reply::Statement(insert) = insert else {
        panic!("expected a statement id, got {insert:?}");
    };
    for (player, points) in [("bob", 3), ("cid", 12)] {
        call_json(
            &mut bridge,
            json!({
                "method": "stmt_run",
                "statement": insert,
                "params": {"player": player, "points": points},
            }),
        )
        .unwrap();
    }
    call_json(&mut bridge, json!({"method": "stmt_free", "statement": insert})).unwrap();

    // v2 `executeScalar` coerces to an integer.
    let total = call_json(
        &mut bridge,
        json!({"method": "executeScalar", "sql": "SELECT sum(points) FROM scores"}),
    )
    .unwrap();
    assert_eq!(total, Reply::Integer(22));

    let result = call_json(
        &mut bridge,
        json!({"method": "execute", "sql": "SELECT player FROM scores WHERE points > 5 ORDER BY player"}),
    )
    .unwrap();
    assert_eq!(
        reply_json(&result),
        json!({"columns": ["player"], "values": [["ann"], ["cid"]]})
    );

    let lookup = call_json(
        &mut bridge,
        json!({"method": "stmt_prepare", "sql": "SELECT points FROM scores WHERE player = ?"}),
    )
    .unwrap();
    let Reply::Statement(lookup) = lookup else {
        panic!("expected a statement id, got {lookup:?}");
    };
    let row = call_json(
        &mut bridge,
        json!({"method": "stmt_get", "statement": lookup, "params": ["bob"]}),
    )
    .unwrap();
    assert_eq!(reply_json(&row), json!([3.0]));

    let bound = call_json(
        &mut bridge,
        json!({"method": "stmt_bind", "statement": lookup, "params": ["ann"]}),
    )
    .unwrap();
    assert_eq!(bound, Reply::Bool(true));
    assert_eq!(
        call_json(&mut bridge, json!({"method": "stmt_step", "statement": lookup})).unwrap(),
        Reply::Bool(true)
    );
    let row = call_json(&mut bridge, json!({"method": "stmt_get", "statement": lookup})).unwrap();
    assert_eq!(reply_json(&row), json!([7.5]));
}

#[tokio::test]
async fn test_v2_run_ignores_params() {
    let mut bridge = common::open_bridge(ApiVersion::V2).await;
    call_json(
        &mut bridge,
        json!({"method": "run", "sql": "CREATE TABLE t (x); INSERT INTO t VALUES (1); INSERT INTO t VALUES (2);", "params": [99]}),
    )
    .unwrap();
    let count = call_json(
        &mut bridge,
        json!({"method": "executeScalar", "sql": "SELECT count(*) FROM t"}),
    )
    .unwrap();
    assert_eq!(count, Reply::Integer(2));
}

#[tokio::test]
async fn test_export_then_open_by_name() {
    let mut source = common::open_bridge(ApiVersion::V2).await;
    common::seed_users(&mut source, 4);
    let Reply::Bytes(image) = call_json(&mut source, json!({"method": "export"})).unwrap() else {
        panic!("expected bytes");
    };

    let mut copy = common::open_bridge(ApiVersion::V2).await;
    let open = Call::new("open").with_data(image.clone());
    assert_eq!(copy.call(&open).unwrap(), Reply::Unit);
    assert_eq!(common::all_users(&mut copy), common::all_users(&mut source));

    // The same image sent as a JSON byte list.
    let mut third = common::open_bridge(ApiVersion::V2).await;
    call_json(&mut third, json!({"method": "open", "data": image})).unwrap();
    assert_eq!(common::all_users(&mut third).len(), 4);

    assert_eq!(
        call_json(&mut third, json!({"method": "close"})).unwrap(),
        Reply::Unit
    );
    assert_eq!(
        call_json(&mut third, json!({"method": "execute", "sql": "SELECT 1"})),
        Err(BridgeError::NotOpen)
    );
}

#[tokio::test]
async fn test_execute_without_rows_replies_null() {
    let mut bridge = common::open_bridge(ApiVersion::V1).await;
    let reply = call_json(
        &mut bridge,
        json!({"method": "execute", "sql": "CREATE TABLE empty (x)"}),
    )
    .unwrap();
    assert_eq!(reply, Reply::Rows(None));
    assert_eq!(reply_json(&reply), serde_json::Value::Null);
}

#[tokio::test]
async fn test_statement_ids_are_not_reused() {
    let mut bridge = common::open_bridge(ApiVersion::V2).await;
    let first = bridge.call(&Call::new("stmt_prepare").with_sql("SELECT 1")).unwrap();
    let Reply::Statement(first) = first else {
        panic!("expected a statement id");
    };
    bridge
        .call(&Call::new("stmt_free").with_statement(first))
        .unwrap();
    let second = bridge.call(&Call::new("stmt_prepare").with_sql("SELECT 1")).unwrap();
    let Reply::Statement(second) = second else {
        panic!("expected a statement id");
    };
    assert_ne!(first, second);
    assert!(second.get() > first.get());
    assert_ne!(second, StatementId::from(first.get()));
}
