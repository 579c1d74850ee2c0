use crate::backend::AssignmentBackend;
use crate::db::{CatalogKind, NewStudent, SqliteBackend};
use crate::ipc::error::{get_required_str, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn backend_mut(state: &mut AppState) -> Result<&mut SqliteBackend, HandlerErr> {
    state
        .backend
        .as_mut()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn catalog_list(
    state: &mut AppState,
    kind: CatalogKind,
) -> Result<serde_json::Value, HandlerErr> {
    // Without a workspace the pickers are simply empty.
    let Some(backend) = state.backend.as_mut() else {
        return Ok(json!({ "items": [] }));
    };
    let items = match kind {
        CatalogKind::Class => backend.fetch_classes()?,
        CatalogKind::Section => backend.fetch_sections()?,
        CatalogKind::Session => backend.fetch_sessions()?,
    };
    Ok(json!({ "items": items }))
}

fn catalog_create(
    state: &mut AppState,
    kind: CatalogKind,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let backend = backend_mut(state)?;
    let entry = backend
        .create_catalog_entry(kind, &name)
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({ "id": entry.id, "name": entry.name }))
}

fn students_list(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let section_id = get_required_str(params, "sectionId")?;
    let session_id = get_required_str(params, "sessionId")?;
    let backend = backend_mut(state)?;
    let students = backend.fetch_students(&class_id, &section_id, &session_id)?;
    Ok(json!({ "students": students }))
}

fn students_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let section_id = get_required_str(params, "sectionId")?;
    let session_id = get_required_str(params, "sessionId")?;
    let name = get_required_str(params, "name")?;
    let roll = params
        .get("roll")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let backend = backend_mut(state)?;
    let student_id = backend
        .create_student(NewStudent {
            class_id: &class_id,
            section_id: &section_id,
            session_id: &session_id,
            name: &name,
            roll: &roll,
        })
        .map_err(|e| {
            HandlerErr::new("db_insert_failed", format!("{e:#}"))
                .with_details(json!({ "table": "students" }))
        })?;
    Ok(json!({ "studentId": student_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => catalog_list(state, CatalogKind::Class),
        "sections.list" => catalog_list(state, CatalogKind::Section),
        "sessions.list" => catalog_list(state, CatalogKind::Session),
        "classes.create" => catalog_create(state, CatalogKind::Class, &req.params),
        "sections.create" => catalog_create(state, CatalogKind::Section, &req.params),
        "sessions.create" => catalog_create(state, CatalogKind::Session, &req.params),
        "students.list" => students_list(state, &req.params),
        "students.create" => students_create(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
