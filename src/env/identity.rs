use crate::database::models::{Student, Teacher};
use crate::database::Db;
use crate::error::ActionError;

/// The principal issuing an action request. The role is derived by probing
/// the store - a client can assert an id, never a role.
#[derive(Debug, Clone)]
pub enum Caller {
    Teacher(Teacher),
    Student(Student),
    /// No matching record. `id: Some(..)` is a not-yet-registered principal,
    /// distinct from `id: None` (no id supplied at all).
    Unknown { id: Option<String> },
}

impl Caller {
    pub fn id(&self) -> Option<&str> {
        match self {
            Caller::Teacher(t) => Some(&t.id),
            Caller::Student(s) => Some(&s.id),
            Caller::Unknown { id } => id.as_deref(),
        }
    }

    pub fn as_teacher(&self) -> Option<&Teacher> {
        match self {
            Caller::Teacher(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_student(&self) -> Option<&Student> {
        match self {
            Caller::Student(s) => Some(s),
            _ => None,
        }
    }
}

/// Resolve an opaque caller id against the store: teachers first, then
/// students. Read-only; storage failures propagate as faults.
pub async fn resolve(db: &mut Db, userid: Option<&str>) -> Result<Caller, ActionError> {
    let Some(id) = userid else {
        return Ok(Caller::Unknown { id: None });
    };

    let teacher =
        sqlx::query_as::<_, Teacher>("SELECT id, name, is_admin FROM teachers WHERE id = $1")
            .bind(id)
            .fetch_optional(db.conn())
            .await?;
    if let Some(teacher) = teacher {
        return Ok(Caller::Teacher(teacher));
    }

    let student =
        sqlx::query_as::<_, Student>("SELECT id, teacher_id, name FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(db.conn())
            .await?;
    if let Some(student) = student {
        return Ok(Caller::Student(student));
    }

    Ok(Caller::Unknown {
        id: Some(id.to_string()),
    })
}
