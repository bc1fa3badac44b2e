pub mod authorize;
pub mod identity;

pub use authorize::{authorize, RequiredRole};
pub use identity::Caller;

use std::sync::Arc;

use sqlx::PgPool;

use crate::bus::client::ServiceBus;
use crate::bus::UploadedFile;
use crate::database::Db;
use crate::error::ActionError;

/// Per-request aggregate threaded through every action body by parameter,
/// never ambient state. Owned exclusively by the single in-flight invocation.
pub struct Environment {
    pub caller: Caller,
    pub db: Db,
    pub bus: Arc<dyn ServiceBus>,
    /// Upload metadata, when file bytes accompanied the request
    pub file: Option<UploadedFile>,
}

impl Environment {
    /// Open the storage handle and resolve the caller's identity.
    ///
    /// On failure the half-built environment is dropped, which releases the
    /// handle; no partial environment ever reaches an action body.
    pub async fn create(
        pool: &PgPool,
        bus: Arc<dyn ServiceBus>,
        userid: Option<&str>,
        file: Option<UploadedFile>,
    ) -> Result<Self, ActionError> {
        let mut db = Db::connect(pool).await?;
        let caller = identity::resolve(&mut db, userid).await?;

        Ok(Self {
            caller,
            db,
            bus,
            file,
        })
    }

    /// Release the storage handle. Consuming `self` makes a double release
    /// unrepresentable; the connection returns to the pool. An unwinding
    /// panic in an action body takes the same path through `Drop`.
    pub async fn teardown(self) {
        drop(self.db);
        tracing::debug!("environment torn down");
    }
}
