use crate::backend::{AssignmentBackend, BackendError, BackendResult, CatalogEntry, Student};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "rfid.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("failed to create workspace {}", workspace.to_string_lossy()))?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    for table in CatalogKind::ALL.iter().map(|k| k.table()) {
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {table}(
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL
                )"
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            section_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            name TEXT NOT NULL,
            roll TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            rfid TEXT,
            rfid_assigned_at TEXT,
            updated_at TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(section_id) REFERENCES sections(id),
            FOREIGN KEY(session_id) REFERENCES sessions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_selection
         ON students(class_id, section_id, session_id, sort_order)",
        [],
    )?;
    // One card, one student, across every selection.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_students_rfid
         ON students(rfid) WHERE rfid IS NOT NULL",
        [],
    )?;

    Ok(conn)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Class,
    Section,
    Session,
}

impl CatalogKind {
    const ALL: [CatalogKind; 3] = [CatalogKind::Class, CatalogKind::Section, CatalogKind::Session];

    fn table(self) -> &'static str {
        match self {
            CatalogKind::Class => "classes",
            CatalogKind::Section => "sections",
            CatalogKind::Session => "sessions",
        }
    }
}

pub struct NewStudent<'a> {
    pub class_id: &'a str,
    pub section_id: &'a str,
    pub session_id: &'a str,
    pub name: &'a str,
    pub roll: &'a str,
}

/// Assignment backend over the workspace database.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: open_db(workspace)?,
        })
    }

    pub fn create_catalog_entry(&self, kind: CatalogKind, name: &str) -> anyhow::Result<CatalogEntry> {
        let id = Uuid::new_v4().to_string();
        self.conn
            .execute(
                &format!("INSERT INTO {}(id, name) VALUES(?, ?)", kind.table()),
                (&id, name),
            )
            .with_context(|| format!("failed to insert into {}", kind.table()))?;
        Ok(CatalogEntry {
            id,
            name: name.to_string(),
        })
    }

    pub fn create_student(&self, new: NewStudent<'_>) -> anyhow::Result<String> {
        let id = Uuid::new_v4().to_string();
        let next_sort: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students
             WHERE class_id = ? AND section_id = ? AND session_id = ?",
            (new.class_id, new.section_id, new.session_id),
            |r| r.get(0),
        )?;
        self.conn
            .execute(
                "INSERT INTO students(id, class_id, section_id, session_id, name, roll, sort_order, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &id,
                    new.class_id,
                    new.section_id,
                    new.session_id,
                    new.name,
                    new.roll,
                    next_sort,
                    now_rfc3339(),
                ),
            )
            .context("failed to insert student")?;
        Ok(id)
    }

    fn list_catalog(&self, kind: CatalogKind) -> BackendResult<Vec<CatalogEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, name FROM {} ORDER BY name", kind.table()))
            .map_err(query_failed)?;
        stmt.query_map([], |r| {
            Ok(CatalogEntry {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_failed)
    }

    fn student_exists(&self, student_id: &str) -> BackendResult<bool> {
        self.conn
            .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
                r.get::<_, i64>(0)
            })
            .optional()
            .map(|v| v.is_some())
            .map_err(query_failed)
    }
}

impl AssignmentBackend for SqliteBackend {
    fn fetch_classes(&mut self) -> BackendResult<Vec<CatalogEntry>> {
        self.list_catalog(CatalogKind::Class)
    }

    fn fetch_sections(&mut self) -> BackendResult<Vec<CatalogEntry>> {
        self.list_catalog(CatalogKind::Section)
    }

    fn fetch_sessions(&mut self) -> BackendResult<Vec<CatalogEntry>> {
        self.list_catalog(CatalogKind::Session)
    }

    fn fetch_students(
        &mut self,
        class_id: &str,
        section_id: &str,
        session_id: &str,
    ) -> BackendResult<Vec<Student>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT s.id, s.name, s.roll, c.name, sec.name, s.rfid
                 FROM students s
                 JOIN classes c ON c.id = s.class_id
                 JOIN sections sec ON sec.id = s.section_id
                 WHERE s.class_id = ? AND s.section_id = ? AND s.session_id = ?
                 ORDER BY s.sort_order, s.name",
            )
            .map_err(query_failed)?;
        stmt.query_map((class_id, section_id, session_id), |r| {
            let rfid: Option<String> = r.get(5)?;
            let rfid = rfid.unwrap_or_default();
            Ok(Student {
                id: r.get(0)?,
                name: r.get(1)?,
                roll: r.get(2)?,
                class: r.get(3)?,
                section: r.get(4)?,
                assigned: !rfid.is_empty(),
                rfid,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(query_failed)
    }

    fn bind_code(&mut self, student_id: &str, code: &str) -> BackendResult<()> {
        if !self.student_exists(student_id)? {
            return Err(BackendError::new("student not found"));
        }
        let holder: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM students WHERE rfid = ? AND id <> ?",
                (code, student_id),
                |r| r.get(0),
            )
            .optional()
            .map_err(query_failed)?;
        if holder.is_some() {
            return Err(BackendError::new(format!(
                "RFID {code} is already assigned to another student"
            )));
        }
        let now = now_rfc3339();
        self.conn
            .execute(
                "UPDATE students SET rfid = ?, rfid_assigned_at = ?, updated_at = ? WHERE id = ?",
                (code, &now, &now, student_id),
            )
            .map_err(|e| BackendError::new(format!("failed to store RFID: {e}")))?;
        Ok(())
    }

    fn unbind_code(&mut self, student_id: &str) -> BackendResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE students SET rfid = NULL, rfid_assigned_at = NULL, updated_at = ? WHERE id = ?",
                (now_rfc3339(), student_id),
            )
            .map_err(|e| BackendError::new(format!("failed to clear RFID: {e}")))?;
        if changed == 0 {
            return Err(BackendError::new("student not found"));
        }
        Ok(())
    }
}

fn query_failed(e: rusqlite::Error) -> BackendError {
    BackendError::new(format!("database query failed: {e}"))
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
