use std::collections::HashSet;
use crate::models::endpoint::Endpoint;
use crate::models::error::ConfigError;

/// Probe ids must be non-empty and unique across the whole probe set.
pub(crate) fn check_endpoints_ids(endpoints: &[Endpoint]) -> Result<(), ConfigError> {
    let mut ids = HashSet::new();
    for endpoint in endpoints {
        if endpoint.id.is_empty() {
            return Err(ConfigError::EmptyId(endpoint.path.clone()));
        }
        if !ids.insert(endpoint.id.as_str()) {
            return Err(ConfigError::DuplicateId(endpoint.id.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_duplicate_ids() {
        let ok = [Endpoint::new("a", "GET", "/a"), Endpoint::new("b", "GET", "/b")];
        assert!(check_endpoints_ids(&ok).is_ok());

        let empty = [Endpoint::new("", "GET", "/a")];
        assert!(matches!(check_endpoints_ids(&empty), Err(ConfigError::EmptyId(p)) if p == "/a"));

        let dup = [Endpoint::new("a", "GET", "/a"), Endpoint::new("a", "POST", "/a")];
        assert!(matches!(check_endpoints_ids(&dup), Err(ConfigError::DuplicateId(id)) if id == "a"));
    }
}
