use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::bus::client::ServiceBus;
use crate::bus::Envelope;
use crate::env::{authorize, Environment, RequiredRole};
use crate::error::ActionError;

pub type ActionResult = Result<Value, ActionError>;

/// Boxed action body. Borrows the environment for the duration of the call;
/// exclusive access is guaranteed by the per-invocation ownership of `Environment`.
pub type Handler =
    Box<dyn for<'a> Fn(&'a mut Environment, Value) -> BoxFuture<'a, ActionResult> + Send + Sync>;

/// Pin an action body future; keeps handler registration free of
/// lifetime annotations at the call sites.
pub fn boxed<'a, F>(fut: F) -> BoxFuture<'a, ActionResult>
where
    F: Future<Output = ActionResult> + Send + 'a,
{
    Box::pin(fut)
}

/// Deserialize action parameters out of the envelope
pub fn parse_params<P: serde::de::DeserializeOwned>(params: Value) -> Result<P, ActionError> {
    serde_json::from_value(params).map_err(|e| ActionError::bad_params(e.to_string()))
}

/// A named, role-gated operation exposed to the bus.
/// `required_role: None` imposes no restriction at all, unlike
/// `Some(RequiredRole::Any)` which still demands a known caller.
pub struct ActionDescriptor {
    pub name: &'static str,
    pub required_role: Option<RequiredRole>,
    handler: Handler,
}

/// Immutable action table, populated once at startup
#[derive(Default)]
pub struct Registry {
    actions: HashMap<&'static str, ActionDescriptor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &'static str,
        required_role: Option<RequiredRole>,
        handler: Handler,
    ) {
        let previous = self.actions.insert(
            name,
            ActionDescriptor {
                name,
                required_role,
                handler,
            },
        );
        debug_assert!(previous.is_none(), "action registered twice: {name}");
    }

    pub fn get(&self, name: &str) -> Option<&ActionDescriptor> {
        self.actions.get(name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Drives the per-invocation lifecycle:
/// create environment -> authorize -> run body -> unconditional teardown.
pub struct Dispatcher {
    registry: Registry,
    pool: PgPool,
    bus: Arc<dyn ServiceBus>,
}

impl Dispatcher {
    pub fn new(registry: Registry, pool: PgPool, bus: Arc<dyn ServiceBus>) -> Self {
        Self {
            registry,
            pool,
            bus,
        }
    }

    pub async fn dispatch(&self, action: &str, envelope: Envelope) -> ActionResult {
        let Some(descriptor) = self.registry.get(action) else {
            return Err(ActionError::UnknownAction(action.to_string()));
        };

        let request_id = Uuid::new_v4();
        tracing::debug!(action, %request_id, "dispatching");

        let Envelope {
            caller,
            params,
            file,
        } = envelope;

        // Created: storage handle opened, identity resolved. A failure here
        // drops the half-built environment, which releases the handle.
        let mut env = Environment::create(
            &self.pool,
            Arc::clone(&self.bus),
            caller.userid.as_deref(),
            file,
        )
        .await?;

        // Authorized -> Executing. The rejection edge skips the body but
        // never the teardown below.
        let outcome = match authorize(&env.caller, descriptor.required_role) {
            Ok(()) => (descriptor.handler)(&mut env, params).await,
            Err(denied) => Err(denied),
        };

        // TornDown: unconditional, regardless of the outcome
        env.teardown().await;

        match &outcome {
            Ok(_) => tracing::debug!(action, %request_id, "completed"),
            Err(err) if err.is_fault() => {
                tracing::error!(action, %request_id, "fault: {}", err);
            }
            Err(err) => tracing::info!(action, %request_id, "rejected: {}", err),
        }

        outcome
    }
}
