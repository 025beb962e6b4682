use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use crate::core::check_endpoints_ids::check_endpoints_ids;
use crate::models::backend::BackendTarget;
use crate::models::config::{ConfigFile, Settings, DEFAULT_AUTH_PATH};
use crate::models::endpoint::{Endpoint, DEFAULT_GROUP};
use crate::models::error::ConfigError;
use crate::models::variable_store::VariableStore;

/// Prefix marking a value as the name of an environment variable.
pub const ENV_MARKER: char = '$';

/// Reads `path`, follows its `include` chain and resolves the result.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let config = load_config_file(path)?;
    resolve_settings(config)
}

/// Reads one configuration file with its includes merged underneath it.
pub fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let mut seen = HashSet::new();
    load_layered(path, &mut seen)
}

fn load_layered(path: &Path, seen: &mut HashSet<PathBuf>) -> Result<ConfigFile, ConfigError> {
    let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !seen.insert(key.clone()) {
        return Err(ConfigError::IncludeCycle(key));
    }
    let mut config = parse_config_file(path)?;
    let Some(include) = config.include.take() else {
        return Ok(config);
    };
    let include = resolve_env(&include);
    let include_path = match path.parent() {
        Some(dir) if Path::new(&include).is_relative() => dir.join(&include),
        _ => PathBuf::from(&include),
    };
    debug!(config = %path.display(), include = %include_path.display(), "merging included config");
    let base = load_layered(&include_path, seen)?;
    Ok(ConfigFile::merge(base, config))
}

/// Parses a single file, JSON when the extension says so, TOML otherwise.
pub fn parse_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str(&text).map_err(|e| e.to_string())
    } else {
        toml::from_str(&text).map_err(|e| e.to_string())
    };
    parsed.map_err(|detail| ConfigError::Parse {
        path: path.to_path_buf(),
        detail,
    })
}

/// Follows a `$NAME` reference to the environment. A missing or empty
/// variable keeps the literal value.
pub fn resolve_env(value: &str) -> String {
    let Some(name) = value.strip_prefix(ENV_MARKER) else {
        return value.to_string();
    };
    match env::var(name) {
        Ok(resolved) if !resolved.is_empty() => resolved,
        _ => {
            warn!(variable = name, "environment variable does not exist or is empty, using raw input instead: {value}");
            value.to_string()
        }
    }
}

fn resolve_opt(value: Option<String>) -> Option<String> {
    value.map(|v| resolve_env(&v)).filter(|v| !v.is_empty())
}

/// Applies defaults and environment indirection to a merged config.
pub fn resolve_settings(config: ConfigFile) -> Result<Settings, ConfigError> {
    let url = resolve_opt(config.url).ok_or(ConfigError::MissingBackendUrl)?;
    let contract_source = resolve_opt(config.openapi).ok_or(ConfigError::MissingContract)?;
    let mut target = BackendTarget::new(url);
    if let Some(version) = resolve_opt(config.backendversion) {
        target = target.with_version(version);
    }

    let variables: VariableStore = config
        .variables
        .into_iter()
        .map(|(name, value)| {
            let value = resolve_env(&value);
            (name, value)
        })
        .collect();

    let mut endpoints = Vec::with_capacity(config.endpoints.0.len());
    for (name, ep) in config.endpoints.0 {
        let path = resolve_opt(ep.url).ok_or_else(|| ConfigError::MissingUrl(name.clone()))?;
        let id = match ep.id {
            Some(id) => resolve_env(&id),
            None => name.clone(),
        };
        endpoints.push(Endpoint {
            id,
            path,
            method: resolve_opt(ep.request_type).unwrap_or_else(|| "GET".to_string()),
            body_source: resolve_opt(ep.body),
            optional: ep.optional.unwrap_or(false),
            group: resolve_opt(ep.group).unwrap_or_else(|| DEFAULT_GROUP.to_string()),
            timeout_secs: ep.timeout,
            order: ep.order,
            extract: ep.extract.unwrap_or_default(),
        });
    }
    check_endpoints_ids(&endpoints)?;

    Ok(Settings {
        target,
        contract_source,
        username: resolve_opt(config.username),
        password: resolve_opt(config.password),
        auth_path: Some(resolve_opt(config.authurl).unwrap_or_else(|| DEFAULT_AUTH_PATH.to_string())),
        token_prefix: config.token_prefix.map(|p| resolve_env(&p)).unwrap_or_default(),
        default_timeout: config.timeout,
        output: resolve_opt(config.output).map(PathBuf::from),
        variables,
        endpoints,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn toml_defaults_are_applied() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "be.toml", r#"
url = "https://be.example/"
openapi = "openapi.json"

[endpoints.capabilities]
url = "/"

[endpoints.jobs]
url = "/jobs"
request_type = "POST"
group = "batch"
optional = true
timeout = 5
"#);
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.target.base_url, "https://be.example");
        assert_eq!(settings.auth_path.as_deref(), Some(DEFAULT_AUTH_PATH));
        assert_eq!(settings.token_prefix, "");
        assert_eq!(settings.endpoints.len(), 2);
        let caps = &settings.endpoints[0];
        assert_eq!(caps.id, "capabilities");
        assert_eq!(caps.method, "GET");
        assert_eq!(caps.group, DEFAULT_GROUP);
        let jobs = &settings.endpoints[1];
        assert_eq!(jobs.method, "POST");
        assert!(jobs.optional);
        assert_eq!(jobs.timeout_secs, Some(5));
    }

    #[test]
    fn json_config_is_parsed_by_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "be.json", r#"{
            "url": "https://be.example",
            "openapi": "https://contract.example/openapi.json",
            "variables": {"collection": "S2"},
            "endpoints": {"coll": {"url": "/collections/{collection}", "id": "collection-detail"}}
        }"#);
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.variables.get("collection"), Some("S2"));
        assert_eq!(settings.endpoints[0].id, "collection-detail");
    }

    #[test]
    fn include_is_merged_underneath() {
        let dir = TempDir::new().unwrap();
        write(&dir, "base.toml", r#"
url = "https://base.example"
openapi = "base.json"
username = "base-user"

[variables]
job_id = "none"

[endpoints.caps]
url = "/"
"#);
        let path = write(&dir, "child.toml", r#"
include = "base.toml"
url = "https://child.example"

[endpoints.jobs]
url = "/jobs/{job_id}"
"#);
        let settings = load_settings(&path).unwrap();
        assert_eq!(settings.target.base_url, "https://child.example");
        assert_eq!(settings.contract_source, "base.json");
        assert_eq!(settings.username.as_deref(), Some("base-user"));
        assert_eq!(settings.variables.get("job_id"), Some("none"));
        let ids: Vec<&str> = settings.endpoints.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["caps", "jobs"]);
    }

    #[test]
    fn include_cycle_is_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.toml", "include = \"b.toml\"\n");
        let path = write(&dir, "b.toml", "include = \"a.toml\"\n");
        assert!(matches!(load_config_file(&path), Err(ConfigError::IncludeCycle(_))));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = load_settings(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "dup.toml", r#"
url = "https://be.example"
openapi = "x.json"
[endpoints.a]
url = "/a"
id = "same"
[endpoints.b]
url = "/b"
id = "same"
"#);
        assert!(matches!(load_settings(&path), Err(ConfigError::DuplicateId(id)) if id == "same"));
    }

    #[test]
    fn env_reference_resolves_or_falls_back() {
        env::set_var("COMPLIANCE_ENGINE_TEST_USER", "alice");
        assert_eq!(resolve_env("$COMPLIANCE_ENGINE_TEST_USER"), "alice");
        assert_eq!(resolve_env("$COMPLIANCE_ENGINE_SURELY_UNSET"), "$COMPLIANCE_ENGINE_SURELY_UNSET");
        assert_eq!(resolve_env("plain"), "plain");
    }
}
