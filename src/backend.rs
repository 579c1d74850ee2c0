use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A `{id, name}` row for the class, section and session pickers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll: String,
    pub class: String,
    pub section: String,
    /// Empty when no card is bound.
    #[serde(default)]
    pub rfid: String,
    #[serde(default)]
    pub assigned: bool,
}

impl Student {
    pub fn has_code(&self) -> bool {
        !self.rfid.is_empty()
    }
}

/// Failure reported by the backend, either explicitly or by the transport.
/// Both cases look the same to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    pub message: String,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// The remote side of the assignment workflow: catalog lookups, roster fetch,
/// and binding/unbinding cards.
pub trait AssignmentBackend {
    fn fetch_classes(&mut self) -> BackendResult<Vec<CatalogEntry>>;
    fn fetch_sections(&mut self) -> BackendResult<Vec<CatalogEntry>>;
    fn fetch_sessions(&mut self) -> BackendResult<Vec<CatalogEntry>>;
    fn fetch_students(
        &mut self,
        class_id: &str,
        section_id: &str,
        session_id: &str,
    ) -> BackendResult<Vec<Student>>;
    fn bind_code(&mut self, student_id: &str, code: &str) -> BackendResult<()>;
    fn unbind_code(&mut self, student_id: &str) -> BackendResult<()>;
}
