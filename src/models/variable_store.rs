use std::collections::HashMap;

/// Named values shared by every probe of a run.
///
/// Seeded from configuration and written to after probes that create
/// resources. It is never reset during a run: a probe that references
/// `{job_id}` relies on the creating probe having run before it, so the
/// declared probe order is part of the contract.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableStore {
    values: HashMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Resolves the first `{name}` placeholder in `template`.
    ///
    /// Only that one occurrence is replaced. An unknown name, or no
    /// placeholder at all, returns the template untouched.
    pub fn substitute(&self, template: &str) -> String {
        let Some((start, end, name)) = first_placeholder(template) else {
            return template.to_string();
        };
        match self.values.get(name) {
            Some(value) => {
                let mut out = String::with_capacity(template.len() + value.len());
                out.push_str(&template[..start]);
                out.push_str(value);
                out.push_str(&template[end..]);
                out
            }
            None => template.to_string(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        VariableStore {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

// Byte span of the first `{...}` holding a non-empty name without nested braces.
fn first_placeholder(template: &str) -> Option<(usize, usize, &str)> {
    let mut search_from = 0;
    while let Some(rel_open) = template[search_from..].find('{') {
        let open = search_from + rel_open;
        let rest = &template[open + 1..];
        match rest.find(['{', '}']) {
            Some(i) if rest.as_bytes()[i] == b'}' && i > 0 => {
                return Some((open, open + 1 + i + 1, &rest[..i]));
            }
            Some(i) if rest.as_bytes()[i] == b'}' => {
                // "{}" is literal text
                search_from = open + 2;
            }
            Some(i) => search_from = open + 1 + i,
            None => return None,
        }
    }
    None
}
