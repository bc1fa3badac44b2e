use serde::Deserialize;
use serde_json::json;

use crate::bus::dispatch::ActionResult;
use crate::env::Environment;
use crate::files;

#[derive(Debug, Deserialize)]
pub struct CreateFileParams {
    /// Client-chosen token the upload will later be redeemed under
    pub temp_id: String,
}

/// Register a received upload: map the client's temporary token to the
/// storage key the transport handed over. When no key accompanied the
/// request, answer with the upload-access challenge instead.
pub async fn create_file(env: &mut Environment, params: CreateFileParams) -> ActionResult {
    let Some(file) = env.file.take() else {
        return Ok(json!({ "checkAccessUploadFile": true }));
    };

    files::register_upload(&mut env.db, &params.temp_id, &file.key).await?;

    Ok(json!({ "name": file.original_name }))
}
