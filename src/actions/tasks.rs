use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::types::Json;

use crate::bus::dispatch::ActionResult;
use crate::database::models::{SolutionDetail, TaskDetail, TaskOverview, TaskRef, TaskType};
use crate::database::Db;
use crate::env::{Caller, Environment};
use crate::error::ActionError;
use crate::files::{self, FileMap};

fn empty_info() -> Value {
    json!({})
}

/// Catalog of task types
pub async fn get_task_types(env: &mut Environment, _params: Value) -> ActionResult {
    let types = sqlx::query_as::<_, TaskType>("SELECT id, name FROM task_types")
        .fetch_all(env.db.conn())
        .await?;

    Ok(serde_json::to_value(types)?)
}

/// Teachers see their own tasks with solved counts; students see the task
/// list their teacher has issued.
pub async fn get_teacher_tasks(env: &mut Environment, _params: Value) -> ActionResult {
    match &env.caller {
        Caller::Teacher(t) => {
            let teacher_id = t.id.clone();
            let tasks = sqlx::query_as::<_, TaskOverview>(
                "SELECT \
                     tasks.id, \
                     tasks.type_id, \
                     tasks.name, \
                     coalesce(solved.count, 0) AS solved_count \
                 FROM tasks \
                 LEFT JOIN ( \
                     SELECT task_id, count(*) \
                     FROM solved_tasks \
                     GROUP BY task_id \
                 ) AS solved \
                 ON tasks.id = solved.task_id \
                 WHERE teacher_id = $1",
            )
            .bind(&teacher_id)
            .fetch_all(env.db.conn())
            .await?;

            Ok(serde_json::to_value(tasks)?)
        }
        Caller::Student(s) => {
            let teacher_id = s.teacher_id.clone();
            let tasks = sqlx::query_as::<_, TaskRef>(
                "SELECT id, type_id, name FROM tasks WHERE teacher_id = $1",
            )
            .bind(&teacher_id)
            .fetch_all(env.db.conn())
            .await?;

            Ok(serde_json::to_value(tasks)?)
        }
        Caller::Unknown { .. } => Err(ActionError::AccessDenied),
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskIdParams {
    pub id: i64,
}

/// One task, scoped to the caller's teacher; stored file keys are expanded
/// to retrieval links on the way out.
pub async fn get_teacher_task(env: &mut Environment, params: TaskIdParams) -> ActionResult {
    let teacher_id = match &env.caller {
        Caller::Teacher(t) => t.id.clone(),
        Caller::Student(s) => s.teacher_id.clone(),
        Caller::Unknown { .. } => return Err(ActionError::AccessDenied),
    };

    let task = sqlx::query_as::<_, TaskDetail>(
        "SELECT name, files, other_info FROM tasks WHERE id = $1 AND teacher_id = $2",
    )
    .bind(params.id)
    .bind(&teacher_id)
    .fetch_optional(env.db.conn())
    .await?
    .ok_or(ActionError::AccessDenied)?;

    let links = files::expand_links(env.bus.as_ref(), &task.files).await?;

    Ok(json!({
        "name": task.name,
        "files": links,
        "other_info": task.other_info.0,
    }))
}

/// Students may only act for themselves; teachers only for students on
/// their own roster.
async fn resolve_student_scope(
    env: &mut Environment,
    requested: Option<String>,
) -> Result<String, ActionError> {
    match &env.caller {
        Caller::Student(s) => Ok(s.id.clone()),
        Caller::Teacher(t) => {
            let teacher_id = t.id.clone();
            let student_id =
                requested.ok_or_else(|| ActionError::bad_params("id is required"))?;

            let on_roster: Option<(String,)> =
                sqlx::query_as("SELECT id FROM students WHERE id = $1 AND teacher_id = $2")
                    .bind(&student_id)
                    .bind(&teacher_id)
                    .fetch_optional(env.db.conn())
                    .await?;

            match on_roster {
                Some(_) => Ok(student_id),
                None => Err(ActionError::AccessDenied),
            }
        }
        Caller::Unknown { .. } => Err(ActionError::AccessDenied),
    }
}

#[derive(Debug, Deserialize)]
pub struct StudentTasksParams {
    pub id: Option<String>,
}

/// Tasks a student has handed in solutions for
pub async fn get_student_tasks(env: &mut Environment, params: StudentTasksParams) -> ActionResult {
    let student_id = resolve_student_scope(env, params.id).await?;

    let tasks = sqlx::query_as::<_, TaskRef>(
        "SELECT \
             tasks.id, \
             tasks.type_id, \
             tasks.name \
         FROM solved_tasks INNER JOIN tasks ON solved_tasks.task_id = tasks.id \
         WHERE solved_tasks.student_id = $1",
    )
    .bind(&student_id)
    .fetch_all(env.db.conn())
    .await?;

    Ok(serde_json::to_value(tasks)?)
}

#[derive(Debug, Deserialize)]
pub struct StudentTaskParams {
    pub task_id: i64,
    pub student_id: Option<String>,
}

/// One stored solution, links expanded
pub async fn get_student_task(env: &mut Environment, params: StudentTaskParams) -> ActionResult {
    let student_id = resolve_student_scope(env, params.student_id).await?;

    let solution = sqlx::query_as::<_, SolutionDetail>(
        "SELECT files, other_info FROM solved_tasks WHERE task_id = $1 AND student_id = $2",
    )
    .bind(params.task_id)
    .bind(&student_id)
    .fetch_optional(env.db.conn())
    .await?
    .ok_or_else(|| ActionError::not_found("Task not found"))?;

    let links = files::expand_links(env.bus.as_ref(), &solution.files).await?;

    Ok(json!({
        "files": links,
        "other_info": solution.other_info.0,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskParams {
    pub type_id: i64,
    pub name: String,
    #[serde(default)]
    pub files: FileMap,
    #[serde(default = "empty_info")]
    pub other_info: Value,
}

/// Create a task. Token redemption runs inside the same transaction as the
/// insert, so a bad token leaves no trace.
pub async fn create_task(env: &mut Environment, params: CreateTaskParams) -> ActionResult {
    let teacher_id = env
        .caller
        .as_teacher()
        .ok_or(ActionError::AccessDenied)?
        .id
        .clone();
    let CreateTaskParams {
        type_id,
        name,
        files: tokens,
        other_info,
    } = params;

    env.db
        .transaction(move |db: &mut Db| {
            Box::pin(async move {
                let keys = files::redeem_tokens(db, &tokens).await?;

                sqlx::query(
                    "INSERT INTO tasks (type_id, teacher_id, name, files, other_info) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(type_id)
                .bind(&teacher_id)
                .bind(&name)
                .bind(Json(keys))
                .bind(other_info)
                .execute(db.conn())
                .await?;

                Ok::<_, ActionError>(())
            })
        })
        .await?;

    Ok(Value::Null)
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskParams {
    pub id: i64,
    pub name: Option<String>,
    #[serde(default)]
    pub files: FileMap,
    #[serde(default)]
    pub other_info: Value,
}

/// Update a task. Fields absent from the request keep their stored values:
/// new file keys are overlaid on the old map, and so is the metadata object.
pub async fn update_task(env: &mut Environment, params: UpdateTaskParams) -> ActionResult {
    let teacher_id = env
        .caller
        .as_teacher()
        .ok_or(ActionError::AccessDenied)?
        .id
        .clone();
    let UpdateTaskParams {
        id,
        name,
        files: tokens,
        other_info,
    } = params;

    env.db
        .transaction(move |db: &mut Db| {
            Box::pin(async move {
                let task = sqlx::query_as::<_, TaskDetail>(
                    "SELECT name, files, other_info FROM tasks WHERE id = $1 AND teacher_id = $2",
                )
                .bind(id)
                .bind(&teacher_id)
                .fetch_optional(db.conn())
                .await?
                .ok_or(ActionError::AccessDenied)?;

                let redeemed = files::redeem_tokens(db, &tokens).await?;
                let name = name.unwrap_or(task.name);
                let merged_files = files::merge(task.files.0, redeemed);
                let merged_info = files::merge_info(task.other_info.0, other_info);

                sqlx::query("UPDATE tasks SET name = $1, files = $2, other_info = $3 WHERE id = $4")
                    .bind(&name)
                    .bind(Json(merged_files))
                    .bind(merged_info)
                    .bind(id)
                    .execute(db.conn())
                    .await?;

                Ok::<_, ActionError>(())
            })
        })
        .await?;

    Ok(Value::Null)
}

/// Delete one of the caller's own tasks; deleting an id outside the
/// caller's scope is a no-op.
pub async fn delete_task(env: &mut Environment, params: TaskIdParams) -> ActionResult {
    let teacher_id = env
        .caller
        .as_teacher()
        .ok_or(ActionError::AccessDenied)?
        .id
        .clone();

    sqlx::query("DELETE FROM tasks WHERE id = $1 AND teacher_id = $2")
        .bind(params.id)
        .bind(&teacher_id)
        .execute(env.db.conn())
        .await?;

    Ok(Value::Null)
}

#[derive(Debug, Deserialize)]
pub struct SolveTaskParams {
    pub task_id: i64,
    #[serde(default)]
    pub files: FileMap,
    #[serde(default = "empty_info")]
    pub other_info: Value,
}

/// Hand in a solution. Only tasks issued by the student's own teacher may
/// be solved; re-submitting replaces the stored solution.
pub async fn solve_task(env: &mut Environment, params: SolveTaskParams) -> ActionResult {
    let student = env.caller.as_student().ok_or(ActionError::AccessDenied)?;
    let student_id = student.id.clone();
    let teacher_id = student.teacher_id.clone();
    let SolveTaskParams {
        task_id,
        files: tokens,
        other_info,
    } = params;

    env.db
        .transaction(move |db: &mut Db| {
            Box::pin(async move {
                let issued: Option<(i64,)> =
                    sqlx::query_as("SELECT id FROM tasks WHERE id = $1 AND teacher_id = $2")
                        .bind(task_id)
                        .bind(&teacher_id)
                        .fetch_optional(db.conn())
                        .await?;
                if issued.is_none() {
                    return Err(ActionError::AccessDenied);
                }

                let keys = files::redeem_tokens(db, &tokens).await?;

                sqlx::query(
                    "INSERT INTO solved_tasks (task_id, student_id, files, other_info) \
                     VALUES ($1, $2, $3, $4) \
                     ON CONFLICT (task_id, student_id) \
                     DO UPDATE SET files = EXCLUDED.files, other_info = EXCLUDED.other_info",
                )
                .bind(task_id)
                .bind(&student_id)
                .bind(Json(keys))
                .bind(other_info)
                .execute(db.conn())
                .await?;

                Ok::<_, ActionError>(())
            })
        })
        .await?;

    Ok(Value::Null)
}
