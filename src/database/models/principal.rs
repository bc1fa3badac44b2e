use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Row in `teachers`. Ids are opaque identifiers assigned by the platform
/// that fronts the bus, not generated here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub is_admin: bool,
}

/// Row in `students`; every student belongs to exactly one teacher
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Student {
    pub id: String,
    pub teacher_id: String,
    pub name: String,
}
