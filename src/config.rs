use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{MirrorError, Result};
use crate::ident::{is_plain_identifier, IdentifierPolicy};
use crate::replicate::Termination;

pub const DEFAULT_STRIDE: i64 = 50_000;
pub const DEFAULT_CEILING: i64 = 20_000_000;
pub const DEFAULT_ARITY: usize = 2;
pub const DEFAULT_ATTACH_ALIAS: &str = "diskdb";

/// Mirror configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MirrorConfig {
    /// Width of each replication window, in row-ids
    pub stride: i64,
    /// Exclusive upper bound on replicated row-ids
    pub ceiling: i64,
    /// When replication stops scanning windows
    pub termination: Termination,
    /// Columns per replicated or written row
    pub arity: usize,
    /// Schema name the disk database is attached under during replication
    pub attach_alias: String,
    pub identifiers: IdentifierPolicy,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            stride: DEFAULT_STRIDE,
            ceiling: DEFAULT_CEILING,
            termination: Termination::default(),
            arity: DEFAULT_ARITY,
            attach_alias: DEFAULT_ATTACH_ALIAS.to_string(),
            identifiers: IdentifierPolicy::default(),
        }
    }
}

impl MirrorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stride(mut self, stride: i64) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_ceiling(mut self, ceiling: i64) -> Self {
        self.ceiling = ceiling;
        self
    }

    pub fn with_termination(mut self, termination: Termination) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    pub fn with_identifiers(mut self, identifiers: IdentifierPolicy) -> Self {
        self.identifiers = identifiers;
        self
    }

    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stride <= 0 {
            return Err(MirrorError::Config(format!(
                "stride must be positive, got {}",
                self.stride
            )));
        }
        if self.ceiling <= 0 {
            return Err(MirrorError::Config(format!(
                "ceiling must be positive, got {}",
                self.ceiling
            )));
        }
        if self.arity == 0 {
            return Err(MirrorError::Config("arity must be at least 1".into()));
        }
        if !is_plain_identifier(&self.attach_alias) {
            return Err(MirrorError::Config(format!(
                "attach alias {:?} is not a plain identifier",
                self.attach_alias
            )));
        }
        Ok(())
    }
}
