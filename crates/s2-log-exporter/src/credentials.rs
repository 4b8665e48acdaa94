// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt::Debug;

use crate::constants::ACCESS_TOKEN_ENV_VAR;
use crate::error::ConfigError;

/// Bearer token for the S2 account. Read from the environment only, never
/// from the configuration file.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: &str) -> Self {
        Self(token.to_string())
    }

    /// Reads `S2_ACCESS_TOKEN`. The variable must be present; an empty value
    /// is accepted and left for the backend to reject.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        lookup(ACCESS_TOKEN_ENV_VAR)
            .map(Self)
            .ok_or(ConfigError::MissingCredential(ACCESS_TOKEN_ENV_VAR))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccessToken(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_token() {
        let result = AccessToken::from_lookup(|_| None);
        assert!(matches!(
            result,
            Err(ConfigError::MissingCredential("S2_ACCESS_TOKEN"))
        ));
    }

    #[test]
    fn test_empty_token_is_accepted() {
        let token = AccessToken::from_lookup(|_| Some(String::new())).unwrap();
        assert_eq!(token.as_str(), "");
    }

    #[test]
    fn test_token_is_read_from_expected_key() {
        let token = AccessToken::from_lookup(|key| {
            assert_eq!(key, "S2_ACCESS_TOKEN");
            Some("secret".to_string())
        })
        .unwrap();
        assert_eq!(token.as_str(), "secret");
    }

    #[test]
    fn test_debug_is_redacted() {
        let token = AccessToken::new("secret");
        assert!(!format!("{token:?}").contains("secret"));
    }
}
