mod backend;
mod config;
mod db;
mod ipc;
mod logging;
mod sequencer;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

fn main() {
    logging::init();
    let mut state = ipc::AppState::new();

    if let Some(path) = std::env::var_os(config::WORKSPACE_ENV).map(PathBuf::from) {
        // A bad preselected workspace is not fatal; the UI can still pick one.
        if let Err((code, message)) = ipc::select_workspace(&mut state, &path) {
            tracing::warn!(code, %message, "could not open {}", path.display());
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request");
                // Can't reply without id.
                let payload = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", payload);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
}
