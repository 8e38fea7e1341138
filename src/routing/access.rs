//! Permission gate in front of the pattern store

use crate::config::{validate_caller_id, AccessSection};
use crate::error::{RouterError, RouterResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identity of whoever asks for a routing decision
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Identity used by the CLI when no `--caller` is given
    pub fn local() -> Self {
        Self("local".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decides whether a caller may read the pattern store
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed_callers: Vec<String>,
    pattern_store: Option<PathBuf>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::allow_all()
    }
}

impl AccessPolicy {
    pub fn new(allowed_callers: Vec<String>, pattern_store: Option<PathBuf>) -> Self {
        Self {
            allowed_callers,
            pattern_store,
        }
    }

    pub fn from_config(access: &AccessSection, pattern_store: PathBuf) -> Self {
        Self::new(access.allowed_callers.clone(), Some(pattern_store))
    }

    /// Any caller, no store file check
    pub fn allow_all() -> Self {
        Self::new(vec!["*".to_string()], None)
    }

    pub fn check(&self, caller: &CallerIdentity) -> RouterResult<()> {
        validate_caller_id(caller.as_str())
            .map_err(|e| RouterError::permission_denied(caller.as_str(), e.to_string()))?;

        let listed = self
            .allowed_callers
            .iter()
            .any(|allowed| allowed == "*" || allowed == caller.as_str());
        if !listed {
            return Err(RouterError::permission_denied(
                caller.as_str(),
                "caller is not in the allowed callers list",
            ));
        }

        if let Some(ref path) = self.pattern_store {
            std::fs::File::open(path).map_err(|e| {
                RouterError::permission_denied(
                    caller.as_str(),
                    format!("pattern store {} is not readable: {e}", path.display()),
                )
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_wildcard_allows_any_valid_caller() {
        let policy = AccessPolicy::allow_all();
        assert!(policy.check(&CallerIdentity::new("coordinator")).is_ok());
    }

    #[test]
    fn test_unlisted_caller_denied() {
        let policy = AccessPolicy::new(vec!["coordinator".to_string()], None);
        let result = policy.check(&CallerIdentity::new("intruder"));
        assert!(matches!(result, Err(RouterError::PermissionDenied { .. })));
    }

    #[test]
    fn test_malformed_caller_denied() {
        let policy = AccessPolicy::allow_all();
        let result = policy.check(&CallerIdentity::new("bad caller/../"));
        assert!(matches!(result, Err(RouterError::PermissionDenied { .. })));
    }

    #[test]
    fn test_unreadable_store_denied() {
        let policy = AccessPolicy::new(
            vec!["*".to_string()],
            Some(PathBuf::from("/nonexistent/expert_patterns.json")),
        );
        let result = policy.check(&CallerIdentity::local());
        assert!(matches!(result, Err(RouterError::PermissionDenied { .. })));
    }

    #[test]
    fn test_readable_store_allowed() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{}}").unwrap();

        let policy = AccessPolicy::new(
            vec!["local".to_string()],
            Some(file.path().to_path_buf()),
        );
        assert!(policy.check(&CallerIdentity::local()).is_ok());
    }
}
