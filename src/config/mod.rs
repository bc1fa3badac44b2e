use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name this service registers under on the message bus
    pub service_name: String,
    pub bus: BusConfig,
    pub services: ServicesConfig,
    pub apps: AppsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// HTTP gateway used for outbound collaborator calls
    pub gateway_url: String,
}

/// Bus names of the collaborator services we call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub auth: String,
    pub storage: String,
}

/// Application names handed to the auth collaborator when building links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppsConfig {
    /// Frontend that completes a registration handoff
    pub registration: String,
    /// Main application users land on after registering
    pub classwork: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::defaults().with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("CLASSWORK_SERVICE_NAME") {
            self.service_name = v;
        }
        if let Ok(v) = env::var("CLASSWORK_BUS_GATEWAY_URL") {
            self.bus.gateway_url = v;
        }
        if let Ok(v) = env::var("CLASSWORK_AUTH_SERVICE") {
            self.services.auth = v;
        }
        if let Ok(v) = env::var("CLASSWORK_STORAGE_SERVICE") {
            self.services.storage = v;
        }
        if let Ok(v) = env::var("CLASSWORK_REGISTRATION_APP") {
            self.apps.registration = v;
        }
        if let Ok(v) = env::var("CLASSWORK_APP") {
            self.apps.classwork = v;
        }
        self
    }

    fn defaults() -> Self {
        Self {
            service_name: "classwork".to_string(),
            bus: BusConfig {
                gateway_url: "http://localhost:8500".to_string(),
            },
            services: ServicesConfig {
                auth: "auth".to_string(),
                storage: "s3".to_string(),
            },
            apps: AppsConfig {
                registration: "register".to_string(),
                classwork: "classwork".to_string(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
