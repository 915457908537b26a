use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Launch metadata of an uploaded image archive.
///
/// Immutable once built; [`ImageSpec::new`] is the only way to get one with
/// non-empty name and tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSpec {
    name: String,
    tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ports: Vec<u16>,
}

impl ImageSpec {
    pub fn new(
        name: impl Into<String>,
        tag: impl Into<String>,
        ports: Vec<u16>,
    ) -> Result<Self, ModelError> {
        let spec = Self {
            name: name.into().trim().to_string(),
            tag: tag.into().trim().to_string(),
            ports,
        };
        spec.validate()?;
        Ok(spec)
    }

    /// Check required fields; deserialized values bypass [`ImageSpec::new`].
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyField("name"));
        }
        if self.tag.trim().is_empty() {
            return Err(ModelError::EmptyField("tag"));
        }
        if let Some(port) = self.ports.iter().find(|p| **p == 0) {
            return Err(ModelError::InvalidPort(port.to_string()));
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Image reference as understood by the runtime: `name:tag`.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }
}

/// Parse a comma-separated port list such as `"80, 443,8080"`.
///
/// A blank input means "no ports". Duplicates are dropped, first occurrence wins.
pub fn parse_ports(raw: &str) -> Result<Vec<u16>, ModelError> {
    let mut ports = Vec::new();
    if raw.trim().is_empty() {
        return Ok(ports);
    }

    for part in raw.split(',') {
        let part = part.trim();
        let port = part
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ModelError::InvalidPort(part.to_string()))?;
        if !ports.contains(&port) {
            ports.push(port);
        }
    }
    Ok(ports)
}
