use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::core::manifest::Platform;

/// An API token. `Debug` and `Display` never reveal the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token, for building request headers only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Per-platform tokens, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    tokens: HashMap<Platform, Secret>,
}

impl Credentials {
    /// Read tokens from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read tokens through an environment-style lookup. Blank values count
    /// as missing.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut tokens = HashMap::new();
        for platform in Platform::ALL {
            let found = platform.credential_keys().iter().find_map(|key| {
                lookup(key)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .map(|v| (*key, v))
            });
            if let Some((key, value)) = found {
                debug!("Credential for {} found in {}", platform, key);
                tokens.insert(platform, Secret::new(value));
            }
        }
        Self { tokens }
    }

    pub fn with_token(mut self, platform: Platform, token: impl Into<String>) -> Self {
        self.tokens.insert(platform, Secret::new(token));
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&Secret> {
        self.tokens.get(&platform)
    }

    pub fn has(&self, platform: Platform) -> bool {
        self.tokens.contains_key(&platform)
    }
}
