/// Marker for the well-known discovery document, always served from the root.
pub const WELL_KNOWN_MARKER: &str = "/.well-known/";

/// The service under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    pub base_url: String,
    /// Base for relative probe paths; differs from `base_url` once version
    /// discovery picked a version-specific root.
    pub resolved_url: String,
    pub declared_version: Option<String>,
}

impl BackendTarget {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = trim_base(base_url.into());
        BackendTarget {
            resolved_url: base_url.clone(),
            base_url,
            declared_version: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.declared_version = Some(version.into());
        self
    }

    pub fn set_resolved(&mut self, url: impl Into<String>) {
        self.resolved_url = trim_base(url.into());
    }

    /// Absolute address for `path`: metadata paths go to the unversioned root,
    /// everything else to the resolved base.
    pub fn absolute(&self, path: &str) -> String {
        if path.contains(WELL_KNOWN_MARKER) {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}{}", self.resolved_url, path)
        }
    }
}

fn trim_base(url: String) -> String {
    match url.strip_suffix('/') {
        Some(trimmed) => trimmed.to_string(),
        None => url,
    }
}
