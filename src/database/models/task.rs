use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

use crate::files::FileMap;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskType {
    pub id: i64,
    pub name: String,
}

/// Task listing row for the owning teacher, including how many students
/// have handed in a solution
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskOverview {
    pub id: i64,
    pub type_id: i64,
    pub name: String,
    pub solved_count: i64,
}

/// Task listing row as students see it
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskRef {
    pub id: i64,
    pub type_id: i64,
    pub name: String,
}

/// Full task record. `files` maps logical field names to permanent storage
/// keys; keys are expanded to retrieval links on read, never stored as URLs.
#[derive(Debug, Clone, FromRow)]
pub struct TaskDetail {
    pub name: String,
    pub files: Json<FileMap>,
    pub other_info: Json<Value>,
}

/// A student's stored solution for one task
#[derive(Debug, Clone, FromRow)]
pub struct SolutionDetail {
    pub files: Json<FileMap>,
    pub other_info: Json<Value>,
}
