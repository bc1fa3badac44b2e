use crate::env::Caller;
use crate::error::ActionError;

/// Role an action declares at registration. Actions registered without one
/// impose no restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredRole {
    Teacher,
    Student,
    /// Any known caller; still rejects unresolved principals
    Any,
}

/// Gate an invocation on the caller's resolved role. Runs strictly before
/// the action body observes the environment.
pub fn authorize(caller: &Caller, required: Option<RequiredRole>) -> Result<(), ActionError> {
    let allowed = match required {
        None => true,
        Some(RequiredRole::Any) => !matches!(caller, Caller::Unknown { .. }),
        Some(RequiredRole::Teacher) => matches!(caller, Caller::Teacher(_)),
        Some(RequiredRole::Student) => matches!(caller, Caller::Student(_)),
    };

    if allowed {
        Ok(())
    } else {
        Err(ActionError::AccessDenied)
    }
}
