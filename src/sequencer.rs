//! Card assignment sequencing for one class/section/session roster.
//!
//! The sequencer owns the roster, the cursor (next student to receive a scanned
//! card) and the set of codes already bound. It never talks to presentation
//! state; the caller passes an [`OperatorContext`] into each operation.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::backend::{AssignmentBackend, Student};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub class_id: String,
    pub section_id: String,
    pub session_id: String,
}

/// Caller-owned state that outlives a single operation.
#[derive(Debug, Default)]
pub struct OperatorContext {
    pub selection: Option<Selection>,
    busy: bool,
}

impl OperatorContext {
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    fn begin(&mut self) -> Result<BusyGuard<'_>, AssignError> {
        if self.busy {
            return Err(AssignError::Busy);
        }
        self.busy = true;
        Ok(BusyGuard { flag: &mut self.busy })
    }
}

/// Clears the busy flag when the backend round trip finishes, on every path.
struct BusyGuard<'a> {
    flag: &'a mut bool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        *self.flag = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssignError {
    #[error("no code supplied")]
    Validation,
    #[error("code already assigned: {code}")]
    Conflict { code: String },
    #[error("no unassigned student remains")]
    Exhausted,
    #[error("another operation is in progress")]
    Busy,
    #[error("{0}")]
    Backend(String),
}

impl AssignError {
    pub fn code(&self) -> &'static str {
        match self {
            AssignError::Validation => "validation_failed",
            AssignError::Conflict { .. } => "conflict",
            AssignError::Exhausted => "exhausted",
            AssignError::Busy => "busy",
            AssignError::Backend(_) => "backend_failed",
        }
    }

    /// Text shown to the operator in the transient notice.
    pub fn notice(&self) -> String {
        match self {
            AssignError::Validation => "Please scan RFID first".to_string(),
            AssignError::Conflict { code } => format!("RFID {code} is already assigned"),
            AssignError::Exhausted => "All students are already assigned".to_string(),
            AssignError::Busy => "Please wait for the current operation to finish".to_string(),
            AssignError::Backend(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub assigned: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assigned {
    pub index: usize,
    pub student: Student,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub index: Option<usize>,
    pub code: String,
}

const ASSIGN_FAILED: &str = "Failed to assign RFID";
const REMOVE_FAILED: &str = "Failed to remove RFID";

#[derive(Debug, Default)]
pub struct AssignmentSequencer {
    roster: Vec<Student>,
    cursor: usize,
    assigned_codes: HashSet<String>,
}

impl AssignmentSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetches the roster for `selection` and loads it. A fetch failure leaves
    /// the previous state untouched.
    pub fn open(
        &mut self,
        ctx: &mut OperatorContext,
        backend: &mut dyn AssignmentBackend,
        selection: Selection,
    ) -> Result<(), AssignError> {
        let roster = {
            let _busy = ctx.begin()?;
            backend
                .fetch_students(
                    &selection.class_id,
                    &selection.section_id,
                    &selection.session_id,
                )
                .map_err(|e| {
                    tracing::warn!(error = %e, "roster fetch failed");
                    AssignError::Backend(non_empty_or(e.message, "Failed to load students"))
                })?
        };
        self.load(roster);
        ctx.selection = Some(selection);
        Ok(())
    }

    pub fn load(&mut self, roster: Vec<Student>) {
        self.roster = roster
            .into_iter()
            .map(|mut s| {
                s.assigned = s.has_code();
                s
            })
            .collect();
        self.assigned_codes = self
            .roster
            .iter()
            .filter(|s| s.has_code())
            .map(|s| s.rfid.clone())
            .collect();
        self.cursor = self
            .roster
            .iter()
            .position(|s| !s.assigned)
            .unwrap_or(self.roster.len());
        tracing::info!(
            total = self.roster.len(),
            assigned = self.assigned_codes.len(),
            cursor = self.cursor,
            "roster loaded"
        );
    }

    pub fn assign(
        &mut self,
        ctx: &mut OperatorContext,
        backend: &mut dyn AssignmentBackend,
        code: &str,
    ) -> Result<Assigned, AssignError> {
        if ctx.is_busy() {
            return Err(AssignError::Busy);
        }
        let code = code.trim();
        if code.is_empty() {
            return Err(AssignError::Validation);
        }
        if self.assigned_codes.contains(code) {
            return Err(AssignError::Conflict {
                code: code.to_string(),
            });
        }
        let index = self.cursor;
        let Some(target) = self.roster.get(index) else {
            return Err(AssignError::Exhausted);
        };

        {
            let _busy = ctx.begin()?;
            if let Err(e) = backend.bind_code(&target.id, code) {
                tracing::warn!(student = %target.id, code, error = %e, "bind failed");
                return Err(AssignError::Backend(non_empty_or(e.message, ASSIGN_FAILED)));
            }
        }

        let student = &mut self.roster[index];
        student.rfid = code.to_string();
        student.assigned = true;
        let student = student.clone();
        self.assigned_codes.insert(code.to_string());

        self.cursor = self.roster[index + 1..]
            .iter()
            .position(|s| !s.assigned)
            .map(|offset| index + 1 + offset)
            .unwrap_or(self.roster.len());

        tracing::info!(student = %student.id, code, cursor = self.cursor, "code assigned");
        Ok(Assigned {
            index,
            student,
            code: code.to_string(),
        })
    }

    /// Unbinds `code` from `student_id`. The code is not cross-checked
    /// against the student's current card; that is the caller's job.
    pub fn remove(
        &mut self,
        ctx: &mut OperatorContext,
        backend: &mut dyn AssignmentBackend,
        student_id: &str,
        code: &str,
    ) -> Result<Removed, AssignError> {
        {
            let _busy = ctx.begin()?;
            if let Err(e) = backend.unbind_code(student_id) {
                tracing::warn!(student = student_id, error = %e, "unbind failed");
                return Err(AssignError::Backend(non_empty_or(e.message, REMOVE_FAILED)));
            }
        }

        let index = self.roster.iter().position(|s| s.id == student_id);
        if let Some(idx) = index {
            let student = &mut self.roster[idx];
            student.rfid.clear();
            student.assigned = false;
            self.cursor = idx;
        }
        self.assigned_codes.remove(code);

        tracing::info!(student = student_id, code, cursor = self.cursor, "code removed");
        Ok(Removed {
            index,
            code: code.to_string(),
        })
    }

    pub fn stats(&self) -> Stats {
        let total = self.roster.len();
        let assigned = self.roster.iter().filter(|s| s.assigned).count();
        Stats {
            total,
            assigned,
            pending: total - assigned,
        }
    }

    pub fn progress_percent(&self) -> u32 {
        let stats = self.stats();
        if stats.total == 0 {
            return 0;
        }
        (stats.assigned as f64 * 100.0 / stats.total as f64).round() as u32
    }

    pub fn roster(&self) -> &[Student] {
        &self.roster
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Student> {
        self.roster.get(self.cursor)
    }

    pub fn find(&self, student_id: &str) -> Option<(usize, &Student)> {
        self.roster
            .iter()
            .enumerate()
            .find(|(_, s)| s.id == student_id)
    }

    pub fn assigned_code_count(&self) -> usize {
        self.assigned_codes.len()
    }
}

fn non_empty_or(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}
