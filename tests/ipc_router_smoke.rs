use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rfidd");
    let mut child = Command::new(exe)
        .env_remove("RFIDD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rfidd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn read_response(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let value = read_response(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("rfidd-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(
        health.pointer("/result/version").and_then(|v| v.as_str()),
        Some(env!("CARGO_PKG_VERSION"))
    );
    assert!(health.pointer("/result/workspacePath").unwrap().is_null());

    // Pickers are empty rather than failing before a workspace exists.
    let classes = request(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(classes.pointer("/result/items"), Some(&json!([])));

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    for (i, method) in [
        "sections.list",
        "sessions.list",
        "assign.state",
        "assign.close",
    ]
    .iter()
    .enumerate()
    {
        let id = format!("m{}", i);
        let _ = request(&mut stdin, &mut reader, &id, method, json!({}));
    }

    let unknown = {
        writeln!(
            stdin,
            "{}",
            json!({ "id": "u1", "method": "reports.export", "params": {} })
        )
        .expect("write request");
        stdin.flush().expect("flush request");
        read_response(&mut reader)
    };
    assert_eq!(unknown.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        unknown.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    writeln!(stdin, "this is not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let bad = read_response(&mut reader);
    assert_eq!(
        bad.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_json")
    );

    drop(stdin);
    let _ = child.wait();
}
