use crate::config;
use crate::db::SqliteBackend;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match select_workspace(state, &path) {
        Ok(()) => ok(
            &req.id,
            json!({
                "workspacePath": path.to_string_lossy(),
                "noticeDismissMs": state.config.notices.dismiss_after_ms,
            }),
        ),
        Err((code, message)) => err(&req.id, code, message, None),
    }
}

/// Opens the workspace database and config. A failure leaves the previously
/// selected workspace in place.
pub fn select_workspace(state: &mut AppState, path: &Path) -> Result<(), (&'static str, String)> {
    let cfg = config::load_for_workspace(path).map_err(|e| ("config_invalid", e.to_string()))?;
    let backend = SqliteBackend::open(path).map_err(|e| ("db_open_failed", format!("{e:?}")))?;

    state.workspace = Some(path.to_path_buf());
    state.backend = Some(backend);
    state.config = cfg;
    state.clear_selection();
    tracing::info!(workspace = %path.display(), "workspace selected");
    Ok(())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
