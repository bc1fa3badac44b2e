use serde::Deserialize;
use serde_json::{json, Value};

use crate::bus::client::BusError;
use crate::bus::dispatch::ActionResult;
use crate::config;
use crate::database::models::Student;
use crate::database::Db;
use crate::env::{Caller, Environment};
use crate::error::ActionError;

/// Liveness probe
pub async fn ping(_env: &mut Environment, _params: Value) -> ActionResult {
    Ok(Value::String("pong".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserParams {
    pub name: String,
    #[serde(default)]
    pub is_student: bool,
}

/// Invite a new user. Teachers invite students onto their own roster;
/// only admins may invite other teachers. The invite payload is sealed by
/// the auth collaborator and carried opaquely inside the registration URL.
pub async fn create_user(env: &mut Environment, params: CreateUserParams) -> ActionResult {
    let teacher = env.caller.as_teacher().ok_or(ActionError::AccessDenied)?;
    if !params.is_student && !teacher.is_admin {
        return Err(ActionError::AccessDenied);
    }

    let cfg = config::config();
    let invite = env
        .bus
        .ask(
            &cfg.services.auth,
            "encrypt",
            json!({
                "data": {
                    "teacher_id": teacher.id,
                    "name": params.name,
                    "is_student": params.is_student,
                }
            }),
        )
        .await?;

    let url = env
        .bus
        .ask(
            &cfg.services.auth,
            "geturl",
            json!({
                "appl": cfg.apps.registration,
                "params": {
                    "service": cfg.service_name,
                    "action": "register_user",
                    "params": invite,
                }
            }),
        )
        .await?;

    Ok(url)
}

/// Sealed invite contents, produced by `create_user`
#[derive(Debug, Deserialize)]
struct InvitePayload {
    teacher_id: String,
    name: String,
    #[serde(default)]
    is_student: bool,
}

/// Complete a registration handoff: unseal the invite and persist the
/// caller as a student or teacher. Idempotent for already-registered
/// callers. Returns the application entry URL.
pub async fn register_user(env: &mut Environment, params: Value) -> ActionResult {
    let Some(id) = env.caller.id().map(str::to_string) else {
        return Err(ActionError::AccessDenied);
    };

    let cfg = config::config();
    let unsealed = env
        .bus
        .ask(&cfg.services.auth, "decrypt", json!({ "data": params }))
        .await?;
    let invite: InvitePayload = serde_json::from_value(unsealed)
        .map_err(|e| BusError::InvalidResponse(format!("invite payload: {e}")))?;

    env.db
        .transaction(move |db: &mut Db| {
            Box::pin(async move {
                // Identity was resolved when the environment was built, but a
                // concurrent registration may have landed since; re-check on
                // this transaction's snapshot.
                let registered: Option<(String,)> =
                    sqlx::query_as("SELECT id FROM students WHERE id = $1")
                        .bind(&id)
                        .fetch_optional(db.conn())
                        .await?;
                if registered.is_some() {
                    return Ok(());
                }

                let registered: Option<(String,)> =
                    sqlx::query_as("SELECT id FROM teachers WHERE id = $1")
                        .bind(&id)
                        .fetch_optional(db.conn())
                        .await?;
                if registered.is_some() {
                    return Ok(());
                }

                if invite.is_student {
                    sqlx::query(
                        "INSERT INTO students (id, teacher_id, name) VALUES ($1, $2, $3) \
                         ON CONFLICT (id) DO NOTHING",
                    )
                    .bind(&id)
                    .bind(&invite.teacher_id)
                    .bind(&invite.name)
                    .execute(db.conn())
                    .await?;
                } else {
                    sqlx::query(
                        "INSERT INTO teachers (id, name) VALUES ($1, $2) \
                         ON CONFLICT (id) DO NOTHING",
                    )
                    .bind(&id)
                    .bind(&invite.name)
                    .execute(db.conn())
                    .await?;
                }

                Ok::<_, ActionError>(())
            })
        })
        .await?;

    let url = env
        .bus
        .ask(
            &cfg.services.auth,
            "getapplurl",
            json!({ "name": cfg.apps.classwork }),
        )
        .await?;

    Ok(url)
}

/// Role and display name of the caller; teachers also see their admin flag
pub async fn get_user_info(env: &mut Environment, _params: Value) -> ActionResult {
    match &env.caller {
        Caller::Teacher(t) => Ok(json!({
            "type": "teacher",
            "name": t.name,
            "is_admin": t.is_admin,
        })),
        Caller::Student(s) => Ok(json!({
            "type": "student",
            "name": s.name,
        })),
        Caller::Unknown { .. } => Err(ActionError::AccessDenied),
    }
}

/// The caller's roster
pub async fn get_students(env: &mut Environment, _params: Value) -> ActionResult {
    let teacher_id = env
        .caller
        .as_teacher()
        .ok_or(ActionError::AccessDenied)?
        .id
        .clone();

    let students = sqlx::query_as::<_, Student>(
        "SELECT id, teacher_id, name FROM students WHERE teacher_id = $1",
    )
    .bind(&teacher_id)
    .fetch_all(env.db.conn())
    .await?;

    Ok(serde_json::to_value(students)?)
}
