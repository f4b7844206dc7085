// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Session names.
//!
//! A session partitions discovery between independent deployments sharing a
//! network. Publishers advertise their session; subscribers bound to a
//! session ignore publishers advertising a different one.

use crate::error::{Error, Result};

/// Session of publishers that do not announce themselves at all.
/// Not a valid subscriber session.
pub const NULL_SESSION: &str = "__eqbus_null_session__";

/// Environment variable overriding the default session.
pub const SESSION_ENV: &str = "EQBUS_SESSION";

/// Session used when neither the environment nor the user name is known.
pub const FALLBACK_SESSION: &str = "eqbus";

/// Default session: `$EQBUS_SESSION`, else the user name, else `"eqbus"`.
pub fn default_session() -> String {
    from_env(|key| std::env::var(key).ok())
}

fn from_env(lookup: impl Fn(&str) -> Option<String>) -> String {
    [SESSION_ENV, "USER", "USERNAME"]
        .iter()
        .find_map(|key| lookup(key).filter(|value| !value.is_empty()))
        .unwrap_or_else(|| FALLBACK_SESSION.to_string())
}

/// Resolve a requested subscriber session (`None` = default).
pub(crate) fn resolve_subscriber(session: Option<&str>) -> Result<String> {
    let session = match session {
        Some(session) => session.to_string(),
        None => default_session(),
    };
    if session.is_empty() || session == NULL_SESSION {
        return Err(Error::Config(
            "Invalid session name for subscriber".to_string(),
        ));
    }
    Ok(session)
}

/// Resolve a requested publisher session (`None` = default).
/// `NULL_SESSION` is allowed and disables announcement.
pub(crate) fn resolve_publisher(session: Option<&str>) -> Result<String> {
    match session {
        Some("") => Err(Error::Config(
            "Invalid session name for publisher".to_string(),
        )),
        Some(session) => Ok(session.to_string()),
        None => Ok(default_session()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_precedence() {
        let session = from_env(|key| match key {
            SESSION_ENV => Some("lab".into()),
            "USER" => Some("alice".into()),
            _ => None,
        });
        assert_eq!(session, "lab");

        let session = from_env(|key| (key == "USER").then(|| "alice".to_string()));
        assert_eq!(session, "alice");

        let session = from_env(|key| (key == SESSION_ENV).then(String::new));
        assert_eq!(session, FALLBACK_SESSION);
    }

    #[test]
    fn test_subscriber_rejects_empty_and_null() {
        assert!(resolve_subscriber(Some("")).is_err());
        assert!(resolve_subscriber(Some(NULL_SESSION)).is_err());
        assert_eq!(resolve_subscriber(Some("alpha")).unwrap(), "alpha");
        assert!(!resolve_subscriber(None).unwrap().is_empty());
    }

    #[test]
    fn test_publisher_accepts_null_session() {
        assert_eq!(resolve_publisher(Some(NULL_SESSION)).unwrap(), NULL_SESSION);
        assert!(resolve_publisher(Some("")).is_err());
    }
}
