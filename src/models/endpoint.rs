use serde::{Deserialize, Serialize};

/// Bucket for probes that do not name a group.
pub const DEFAULT_GROUP: &str = "nogroup";

/// Pulls a value out of a JSON response body into the variable store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonpathExtract {
    pub key: String,
    pub jsonpath: String,
}

/// One declared probe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub id: String,
    /// Request path, may hold `{name}` placeholders.
    pub path: String,
    /// Matched exactly against POST/PUT/PATCH/DELETE, anything else is GET.
    pub method: String,
    /// File whose bytes become the request body.
    pub body_source: Option<String>,
    pub optional: bool,
    pub group: String,
    pub timeout_secs: Option<u64>,
    pub order: Option<i64>,
    pub extract: Vec<JsonpathExtract>,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, method: impl Into<String>, path: impl Into<String>) -> Self {
        Endpoint {
            id: id.into(),
            path: path.into(),
            method: method.into(),
            body_source: None,
            optional: false,
            group: DEFAULT_GROUP.to_string(),
            timeout_secs: None,
            order: None,
            extract: Vec::new(),
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_body(mut self, body_source: impl Into<String>) -> Self {
        self.body_source = Some(body_source.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Method + path, the way diagnostics name a probe.
    pub fn label(&self) -> String {
        format!("{}  {}", self.method, self.path)
    }
}
