//! Capability registry - a fixed name → action mapping with a uniform result

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::files::{ReadResource, WriteResource};
use super::logs::ClassifyLog;
use super::report::RenderReport;
use super::service::RestartService;
use super::validation::RunValidationSuite;
use super::{Capability, Workspace};
use crate::config::Config;
use crate::error::MenderError;

/// Uniform capability outcome: never raised, failure is always a value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityResult {
    pub success: bool,
    /// Capability-specific fields
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapabilityResult {
    /// Successful result carrying the serialized fields of `output`
    pub fn ok<T: Serialize>(output: &T) -> eyre::Result<Self> {
        Self::with_status(true, output)
    }

    /// Result with explicit status (e.g. a suite that ran but failed)
    pub fn with_status<T: Serialize>(success: bool, output: &T) -> eyre::Result<Self> {
        let fields = match serde_json::to_value(output)? {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Ok(Self {
            success,
            fields,
            error: None,
        })
    }

    /// Failed result with an error message and no fields
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            fields: Map::new(),
            error: Some(error.into()),
        }
    }

    /// Decode the capability-specific fields into a typed view
    pub fn decode<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(Value::Object(self.fields.clone())).ok()
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Compact JSON for trace lines, without bulky payload fields
    pub fn brief(&self) -> String {
        let mut map = Map::new();
        map.insert("success".to_string(), Value::Bool(self.success));
        for (key, value) in &self.fields {
            if !matches!(key.as_str(), "content" | "raw_output") {
                map.insert(key.clone(), value.clone());
            }
        }
        if let Some(error) = &self.error {
            map.insert("error".to_string(), Value::String(error.clone()));
        }
        Value::Object(map).to_string()
    }
}

/// Manages capability registration and invocation
pub struct CapabilityRegistry {
    capabilities: HashMap<String, Arc<dyn Capability>>,
    workspace: Workspace,
}

impl CapabilityRegistry {
    /// Create an empty registry (for custom capability sets)
    pub fn new(workspace: Workspace) -> Self {
        Self {
            capabilities: HashMap::new(),
            workspace,
        }
    }

    /// Create registry with the six built-in capabilities
    pub fn standard(workspace: Workspace, config: &Config) -> Self {
        let mut registry = Self::new(workspace);

        // Resources
        registry.register(Arc::new(ReadResource));
        registry.register(Arc::new(WriteResource));

        // Diagnosis and validation
        registry.register(Arc::new(ClassifyLog));
        registry.register(Arc::new(RunValidationSuite::from_config(&config.validation)));

        // Operations
        registry.register(Arc::new(RestartService::new(config.repair.restart_delay_ms)));
        registry.register(Arc::new(RenderReport));

        registry
    }

    /// Add or replace a capability
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities.insert(capability.name().to_string(), capability);
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Invoke a capability by name; errors come back as failed results
    pub async fn invoke(&self, name: &str, input: Value) -> CapabilityResult {
        match self.capabilities.get(name) {
            Some(capability) => match capability.invoke(input, &self.workspace).await {
                Ok(result) => result,
                Err(e) => {
                    log::debug!("Capability {} failed: {:#}", name, e);
                    CapabilityResult::failure(e.to_string())
                }
            },
            None => {
                let err = MenderError::Capability(format!("Unknown capability: {}", name));
                log::warn!("{}", err);
                CapabilityResult::failure(err.to_string())
            }
        }
    }

    /// Check if a capability exists
    pub fn has(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    /// Registered capability names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}
