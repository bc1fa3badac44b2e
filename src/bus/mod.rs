pub mod client;
pub mod dispatch;

use serde::Deserialize;
use serde_json::Value;

/// Caller context attached to every inbound envelope by the transport.
/// The id is opaque here; the role is always derived by probing the store.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallerContext {
    pub userid: Option<String>,
}

/// Upload metadata handed over by the transport when file bytes accompanied
/// the request. The bytes themselves never reach this service.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadedFile {
    pub key: String,
    #[serde(rename = "originalname")]
    pub original_name: String,
}

/// Inbound action envelope as delivered by the bus
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub caller: CallerContext,
    #[serde(default = "empty_params")]
    pub params: Value,
    #[serde(default)]
    pub file: Option<UploadedFile>,
}

fn empty_params() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Envelope {
    pub fn new(userid: Option<&str>, params: Value) -> Self {
        Self {
            caller: CallerContext {
                userid: userid.map(str::to_string),
            },
            params,
            file: None,
        }
    }
}
