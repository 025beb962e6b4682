use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::models::backend::BackendTarget;
use crate::models::endpoint::{Endpoint, JsonpathExtract};
use crate::models::variable_store::VariableStore;

/// Auth endpoint used when the configuration does not name one.
pub const DEFAULT_AUTH_PATH: &str = "/credentials/basic";

/// One `[endpoints.<name>]` table as written. Every field may be absent so
/// that an including file can override single keys.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<Vec<JsonpathExtract>>,
}

impl EndpointConfig {
    /// Field-wise merge, `child` wins wherever it is set.
    pub fn merge(base: EndpointConfig, child: EndpointConfig) -> EndpointConfig {
        EndpointConfig {
            id: child.id.or(base.id),
            url: child.url.or(base.url),
            request_type: child.request_type.or(base.request_type),
            body: child.body.or(base.body),
            optional: child.optional.or(base.optional),
            group: child.group.or(base.group),
            timeout: child.timeout.or(base.timeout),
            order: child.order.or(base.order),
            extract: child.extract.or(base.extract),
        }
    }
}

/// `[endpoints]` keyed by name, in document order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndpointTable(pub Vec<(String, EndpointConfig)>);

impl EndpointTable {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn insert(&mut self, name: String, config: EndpointConfig) {
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = EndpointConfig::merge(std::mem::take(slot), config),
            None => self.0.push((name, config)),
        }
    }
}

impl<'de> Deserialize<'de> for EndpointTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = EndpointTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a table of endpoint definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut table = EndpointTable::default();
                while let Some((name, config)) = access.next_entry::<String, EndpointConfig>()? {
                    table.insert(name, config);
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

impl Serialize for EndpointTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, config) in &self.0 {
            map.serialize_entry(name, config)?;
        }
        map.end()
    }
}

/// A configuration file as written, before includes and defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openapi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authurl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backendversion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "EndpointTable::is_empty")]
    pub endpoints: EndpointTable,
}

impl ConfigFile {
    /// Applies `child` over `base`: set fields win, variables merge by name,
    /// endpoints merge by key with new keys appended after the base's.
    pub fn merge(base: ConfigFile, child: ConfigFile) -> ConfigFile {
        let mut variables = base.variables;
        variables.extend(child.variables);
        let mut endpoints = base.endpoints;
        for (name, config) in child.endpoints.0 {
            endpoints.insert(name, config);
        }
        ConfigFile {
            include: child.include.or(base.include),
            url: child.url.or(base.url),
            openapi: child.openapi.or(base.openapi),
            username: child.username.or(base.username),
            password: child.password.or(base.password),
            authurl: child.authurl.or(base.authurl),
            backendversion: child.backendversion.or(base.backendversion),
            output: child.output.or(base.output),
            timeout: child.timeout.or(base.timeout),
            token_prefix: child.token_prefix.or(base.token_prefix),
            variables,
            endpoints,
        }
    }
}

/// Fully resolved run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub target: BackendTarget,
    pub contract_source: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_path: Option<String>,
    pub token_prefix: String,
    /// Default deadline in seconds for every call without its own override.
    pub default_timeout: Option<u64>,
    pub output: Option<PathBuf>,
    pub variables: VariableStore,
    /// Probes in declared order.
    pub endpoints: Vec<Endpoint>,
}
