//! JSON-lines call scripts.
//!
//! Each input line is one [`Call`], e.g.
//! `{"method": "stmt_prepare", "sql": "SELECT * FROM notes"}`. Each output
//! line is the JSON reply, or `{"error": "..."}` when the line could not be
//! parsed or the call failed. A failing call does not stop the script.

use std::io::{BufRead, Write};

use eyre::Result;
use serde::Serialize;
use sqflite_core::{Bridge, Call};

/// Counts of a finished script run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub calls: usize,
    pub failed: usize,
}

#[derive(Serialize)]
struct ErrorLine<'a> {
    error: &'a str,
}

/// Replays every call of `input` on `bridge`, writing one line per call to
/// `output`. Blank lines are skipped.
pub fn run<R: BufRead, W: Write>(bridge: &mut Bridge, input: R, mut output: W) -> Result<Summary> {
    let mut summary = Summary::default();
    for (index, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        summary.calls += 1;

        let outcome = serde_json::from_str::<Call>(&line)
            .map_err(|e| format!("invalid call: {e}"))
            .and_then(|call| bridge.call(&call).map_err(|e| e.to_string()));
        match outcome {
            Ok(reply) => serde_json::to_writer(&mut output, &reply)?,
            Err(error) => {
                summary.failed += 1;
                tracing::warn!(line = index + 1, %error, "call failed");
                serde_json::to_writer(&mut output, &ErrorLine { error: &error })?;
            }
        }
        writeln!(output)?;
    }
    output.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value as Json};
    use sqflite_core::{initialize, ApiVersion, BridgeConfig};

    use super::*;

    async fn bridge(version: ApiVersion) -> Bridge {
        let config = BridgeConfig::default().with_api_version(version);
        let mut bridge = initialize(config).await.unwrap();
        bridge.create().unwrap();
        bridge
    }

    fn replay(bridge: &mut Bridge, script: &str) -> (Summary, Vec<Json>) {
        let mut output = Vec::new();
        let summary = run(bridge, script.as_bytes(), &mut output).unwrap();
        let lines = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        (summary, lines)
    }

    #[tokio::test]
    async fn test_replays_v2_calls() {
        let mut bridge = bridge(ApiVersion::V2).await;
        let script = r#"
{"method": "run", "sql": "CREATE TABLE t (x INTEGER)"}
{"method": "runParams", "sql": "INSERT INTO t VALUES (?)", "params": [5]}
{"method": "getRowsModified"}
{"method": "stmt_prepare", "sql": "SELECT x FROM t"}
{"method": "stmt_step", "statement": 1}
{"method": "stmt_get", "statement": 1}
{"method": "stmt_free", "statement": 1}
"#;
        let (summary, lines) = replay(&mut bridge, script);
        assert_eq!(summary, Summary { calls: 7, failed: 0 });
        assert_eq!(
            lines,
            vec![
                Json::Null,
                Json::Null,
                json!(1),
                json!(1),
                json!(true),
                json!([5]),
                json!(true),
            ]
        );
    }

    #[tokio::test]
    async fn test_failures_are_reported_inline() {
        let mut bridge = bridge(ApiVersion::V1).await;
        let script = r#"{"method": "stmt_step", "statement": 1}
not json
{"method": "step", "statement": 9}
{"method": "executeScalar", "sql": "SELECT 'x'"}
"#;
        let (summary, lines) = replay(&mut bridge, script);
        assert_eq!(summary, Summary { calls: 4, failed: 3 });
        assert!(lines[0]["error"].as_str().unwrap().contains("stmt_step"));
        assert!(lines[1]["error"].as_str().unwrap().starts_with("invalid call"));
        assert!(lines[2]["error"].as_str().unwrap().contains("#9"));
        // v1 returns the raw value.
        assert_eq!(lines[3], json!("x"));
    }
}
