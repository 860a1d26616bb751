//! Running application identity.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One running application instance, as reported by the enumeration layer.
///
/// Two identities with the same `bundle_id` are the same logical target for
/// whitelist and protection purposes, even if their PIDs differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "ProcessIdentityJson", rename_all = "camelCase")]
pub struct ProcessIdentity {
    bundle_id: String,
    pid: u32,
    name: String,
    is_regular: bool,
}

impl ProcessIdentity {
    /// Create a regular GUI application identity.
    pub fn new(bundle_id: impl Into<String>, pid: u32, name: impl Into<String>) -> Result<Self> {
        Self::with_activation(bundle_id, pid, name, true)
    }

    /// Create an identity with an explicit "regular GUI application" flag.
    pub fn with_activation(
        bundle_id: impl Into<String>,
        pid: u32,
        name: impl Into<String>,
        is_regular: bool,
    ) -> Result<Self> {
        let bundle_id = bundle_id.into().trim().to_string();
        if bundle_id.is_empty() {
            return Err(Error::InvalidIdentity(format!(
                "empty bundle identifier for PID {}",
                pid
            )));
        }

        let name = name.into();
        let name = if name.trim().is_empty() {
            bundle_id.clone()
        } else {
            name
        };

        Ok(Self {
            bundle_id,
            pid,
            name,
            is_regular,
        })
    }

    /// Reverse-domain bundle identifier.
    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    /// OS process handle.
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_regular(&self) -> bool {
        self.is_regular
    }
}

impl std::fmt::Display for ProcessIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}, PID {})", self.name, self.bundle_id, self.pid)
    }
}

/// Wire form of [`ProcessIdentity`], validated on conversion.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessIdentityJson {
    bundle_id: String,
    pid: u32,
    #[serde(default)]
    name: String,
    #[serde(default = "default_true")]
    is_regular: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<ProcessIdentityJson> for ProcessIdentity {
    type Error = Error;

    fn try_from(json: ProcessIdentityJson) -> Result<Self> {
        Self::with_activation(json.bundle_id, json.pid, json.name, json.is_regular)
    }
}
