// Environment variable loading

use crate::{ConfigError, Result};
use std::env;

/// Environment variable loader
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    fn full_key(&self, key: &str) -> String {
        match self.prefix {
            Some(ref prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }

    /// Load a specific environment variable
    pub fn load_var(&self, key: &str) -> Result<String> {
        env::var(self.full_key(key)).map_err(ConfigError::EnvError)
    }

    /// Look up a variable, `None` when unset or not unicode
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.load_var(key).ok()
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
