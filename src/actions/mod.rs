pub mod files;
pub mod tasks;
pub mod users;

use serde_json::Value;

use crate::bus::dispatch::{boxed, parse_params, Registry};
use crate::env::{Environment, RequiredRole};

/// Wrap an action body for registration. `raw` bodies take the envelope
/// params verbatim; the default arm deserializes them into the body's
/// declared parameter struct first.
macro_rules! action {
    (raw $body:path) => {
        Box::new(|env: &mut Environment, params: Value| boxed($body(env, params)))
    };
    ($body:path) => {
        Box::new(|env: &mut Environment, params: Value| {
            boxed(async move {
                let params = parse_params(params)?;
                $body(env, params).await
            })
        })
    };
}

/// Every action this service exposes, registered once at startup.
/// Required roles declared here are the single authorization source;
/// handlers only refine scope (ownership checks), never role.
pub fn registry() -> Registry {
    use RequiredRole::{Any, Student, Teacher};

    let mut registry = Registry::new();

    registry.register("ping", None, action!(raw users::ping));

    // registration handoff
    registry.register("create_user", Some(Teacher), action!(users::create_user));
    registry.register("register_user", None, action!(raw users::register_user));

    // uploads
    registry.register("create_file", Some(Any), action!(files::create_file));

    // user info
    registry.register("get_user_info", Some(Any), action!(raw users::get_user_info));
    registry.register("get_students", Some(Teacher), action!(raw users::get_students));

    // tasks
    registry.register("get_task_types", Some(Any), action!(raw tasks::get_task_types));
    registry.register("get_teacher_tasks", Some(Any), action!(raw tasks::get_teacher_tasks));
    registry.register("get_teacher_task", Some(Any), action!(tasks::get_teacher_task));
    registry.register("get_student_tasks", Some(Any), action!(tasks::get_student_tasks));
    registry.register("get_student_task", Some(Any), action!(tasks::get_student_task));
    registry.register("create_task", Some(Teacher), action!(tasks::create_task));
    registry.register("update_task", Some(Teacher), action!(tasks::update_task));
    registry.register("delete_task", Some(Teacher), action!(tasks::delete_task));
    registry.register("solve_task", Some(Student), action!(tasks::solve_task));

    registry
}
