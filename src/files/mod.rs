//! File reference resolution: upload-token registration, at-most-once token
//! redemption, and on-read expansion of storage keys into retrieval links.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::bus::client::{expect_str, ServiceBus};
use crate::config;
use crate::database::Db;
use crate::error::ActionError;

/// Logical field name -> temporary token (inbound) or permanent key (stored)
pub type FileMap = BTreeMap<String, String>;

/// Record a received upload so a later action can redeem its token.
/// Called when a file is physically received, before any domain record
/// references it.
pub async fn register_upload(db: &mut Db, temp_id: &str, key: &str) -> Result<(), ActionError> {
    sqlx::query("INSERT INTO temp_files (temp_id, id) VALUES ($1, $2)")
        .bind(temp_id)
        .bind(key)
        .execute(db.conn())
        .await?;
    Ok(())
}

/// Exchange temporary upload tokens for permanent storage keys.
///
/// Delete-and-return enforces at-most-one redemption per token; a missing
/// row means the token was never registered or already consumed. Callers
/// run this inside the same transaction as the insert that stores the keys,
/// so a mid-way failure rolls the whole exchange back.
pub async fn redeem_tokens(db: &mut Db, tokens: &FileMap) -> Result<FileMap, ActionError> {
    let mut keys = FileMap::new();

    for (field, temp_id) in tokens {
        let row: Option<(String,)> =
            sqlx::query_as("DELETE FROM temp_files WHERE temp_id = $1 RETURNING id")
                .bind(temp_id)
                .fetch_optional(db.conn())
                .await?;

        match row {
            Some((key,)) => {
                keys.insert(field.clone(), key);
            }
            None => return Err(ActionError::InvalidUploadToken(temp_id.clone())),
        }
    }

    Ok(keys)
}

/// Expand stored permanent keys into short-lived retrieval links.
///
/// One storage-collaborator call per field, issued concurrently; any single
/// failure fails the whole expansion. Links are generated fresh on every
/// read and never persisted.
pub async fn expand_links(bus: &dyn ServiceBus, files: &FileMap) -> Result<FileMap, ActionError> {
    let storage = &config::config().services.storage;

    let lookups = files.iter().map(|(field, key)| async move {
        let result = bus.ask(storage, "getUrl", json!({ "key": key })).await?;
        let url = expect_str(result)?;
        Ok::<_, ActionError>((field.clone(), url))
    });

    let links = futures::future::try_join_all(lookups).await?;
    Ok(links.into_iter().collect())
}

/// Overlay `updates` onto `stored`: fields absent from the update keep their
/// previously stored values.
pub fn merge(stored: FileMap, updates: FileMap) -> FileMap {
    let mut merged = stored;
    merged.extend(updates);
    merged
}

/// Same overlay policy for the free-form metadata object. Non-object updates
/// leave the stored value untouched.
pub fn merge_info(stored: Value, updates: Value) -> Value {
    let Value::Object(incoming) = updates else {
        return stored;
    };

    let mut merged = match stored {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    merged.extend(incoming);
    Value::Object(merged)
}
