use crate::ipc::error::{get_optional_str, get_required_str, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::sequencer::{AssignmentSequencer, OperatorContext, Selection};
use serde_json::json;

fn state_view(ctx: &OperatorContext, seq: &AssignmentSequencer) -> serde_json::Value {
    let cursor = seq.cursor();
    let students: Vec<serde_json::Value> = seq
        .roster()
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            json!({
                "index": idx,
                "id": s.id,
                "name": s.name,
                "roll": s.roll,
                "class": s.class,
                "section": s.section,
                "rfid": s.rfid,
                "assigned": s.assigned,
                "isCurrent": idx == cursor,
            })
        })
        .collect();
    json!({
        "selection": ctx.selection,
        "busy": ctx.is_busy(),
        "cursor": cursor,
        "current": seq.current(),
        "stats": seq.stats(),
        "progressPercent": seq.progress_percent(),
        "codesInUse": seq.assigned_code_count(),
        "students": students,
    })
}

fn notice(state: &AppState, message: String) -> serde_json::Value {
    json!({
        "kind": "success",
        "message": message,
        "dismissAfterMs": state.config.notices.dismiss_after_ms,
    })
}

fn require_selection(state: &AppState) -> Result<(), HandlerErr> {
    if state.ctx.selection.is_none() {
        return Err(HandlerErr::new(
            "no_selection",
            "select class, section and session first",
        ));
    }
    Ok(())
}

fn no_workspace() -> HandlerErr {
    HandlerErr::new("no_workspace", "select a workspace first")
}

fn assign_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let selection = Selection {
        class_id: get_required_str(params, "classId")?,
        section_id: get_required_str(params, "sectionId")?,
        session_id: get_required_str(params, "sessionId")?,
    };
    let AppState {
        backend, ctx, sequencer, ..
    } = state;
    let backend = backend.as_mut().ok_or_else(no_workspace)?;

    // A new selection never merges with the old one.
    let mut fresh = AssignmentSequencer::new();
    fresh.open(ctx, backend, selection)?;
    *sequencer = fresh;
    Ok(state_view(ctx, sequencer))
}

fn assign_scan(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    require_selection(state)?;
    let code = get_optional_str(params, "code")?.unwrap_or_default();
    let AppState {
        backend, ctx, sequencer, ..
    } = state;
    let backend = backend.as_mut().ok_or_else(no_workspace)?;

    let assigned = sequencer.assign(ctx, backend, &code)?;
    let message = format!("RFID {} assigned to {}", assigned.code, assigned.student.name);
    Ok(json!({
        "studentId": assigned.student.id,
        "index": assigned.index,
        "rfid": assigned.code,
        "notice": notice(state, message),
        "state": state_view(&state.ctx, &state.sequencer),
    }))
}

fn assign_remove(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    require_selection(state)?;
    let student_id = get_required_str(params, "studentId")?;
    let requested = get_optional_str(params, "code")?;
    // The card to drop is always the one the roster holds for this student.
    let code = match state.sequencer.find(&student_id) {
        None => {
            return Err(HandlerErr::new("bad_params", "student is not in the current roster")
                .with_details(json!({ "studentId": student_id })))
        }
        Some((_, s)) if s.rfid.is_empty() => {
            return Err(HandlerErr::new("bad_params", "student has no RFID to remove")
                .with_details(json!({ "studentId": student_id })))
        }
        Some((_, s)) => s.rfid.clone(),
    };
    if let Some(requested) = requested.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        if requested != code {
            return Err(HandlerErr::new(
                "bad_params",
                format!("RFID {} does not belong to this student", requested),
            )
            .with_details(json!({ "studentId": student_id, "rfid": requested })));
        }
    }
    let AppState {
        backend, ctx, sequencer, ..
    } = state;
    let backend = backend.as_mut().ok_or_else(no_workspace)?;

    let removed = sequencer.remove(ctx, backend, &student_id, &code)?;
    let message = format!("RFID {} removed from student", removed.code);
    Ok(json!({
        "studentId": student_id,
        "index": removed.index,
        "rfid": removed.code,
        "notice": notice(state, message),
        "state": state_view(&state.ctx, &state.sequencer),
    }))
}

fn assign_state(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(state_view(&state.ctx, &state.sequencer))
}

fn assign_close(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    state.clear_selection();
    Ok(json!({ "closed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assign.open" => assign_open(state, &req.params),
        "assign.scan" => assign_scan(state, &req.params),
        "assign.remove" => assign_remove(state, &req.params),
        "assign.state" => assign_state(state),
        "assign.close" => assign_close(state),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
