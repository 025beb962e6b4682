use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use crate::models::error::AuthenticationError;
use crate::models::verdict::{State, Verdict};

/// Final record of one probe, with the values it actually ran with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRecord {
    pub id: String,
    pub group: String,
    pub path: String,
    pub method: String,
    pub verdict: Verdict,
}

impl Serialize for ProbeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ProbeRecord", 4)?;
        s.serialize_field("state", &self.verdict.state())?;
        s.serialize_field("message", &self.verdict.message())?;
        s.serialize_field("url", &self.path)?;
        s.serialize_field("type", &self.method)?;
        s.end()
    }
}

/// Probes of one group in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    pub name: String,
    pub endpoints: Vec<ProbeRecord>,
}

impl GroupReport {
    /// `Invalid` as soon as one member ended `Invalid` or `Error`.
    pub fn summary(&self) -> State {
        if self.endpoints.iter().any(|record| record.verdict.fails_group()) {
            State::Invalid
        } else {
            State::Valid
        }
    }
}

struct OrderedEndpoints<'a>(&'a [ProbeRecord]);

impl Serialize for OrderedEndpoints<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for record in self.0 {
            map.serialize_entry(&record.id, record)?;
        }
        map.end()
    }
}

impl Serialize for GroupReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("GroupReport", 2)?;
        s.serialize_field("group_summary", &self.summary())?;
        s.serialize_field("endpoints", &OrderedEndpoints(&self.endpoints))?;
        s.end()
    }
}

/// Group name -> group report, in the order groups first ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    pub groups: Vec<GroupReport>,
}

impl Report {
    pub fn record(&mut self, record: ProbeRecord) {
        match self.groups.iter_mut().find(|g| g.name == record.group) {
            Some(group) => group.endpoints.push(record),
            None => self.groups.push(GroupReport {
                name: record.group.clone(),
                endpoints: vec![record],
            }),
        }
    }

    pub fn group(&self, name: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn probe(&self, id: &str) -> Option<&ProbeRecord> {
        self.groups
            .iter()
            .flat_map(|g| g.endpoints.iter())
            .find(|r| r.id == id)
    }

    pub fn records(&self) -> impl Iterator<Item = &ProbeRecord> {
        self.groups.iter().flat_map(|g| g.endpoints.iter())
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for group in &self.groups {
            map.serialize_entry(&group.name, group)?;
        }
        map.end()
    }
}

/// Everything a run produces: the report plus the deferred auth failure.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    pub auth_error: Option<AuthenticationError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::verdict::Diagnostic;

    fn record(id: &str, group: &str, verdict: Verdict) -> ProbeRecord {
        ProbeRecord {
            id: id.to_string(),
            group: group.to_string(),
            path: format!("/{id}"),
            method: "GET".to_string(),
            verdict,
        }
    }

    #[test]
    fn missing_members_keep_group_valid() {
        let mut report = Report::default();
        report.record(record("a", "g", Verdict::Valid(None)));
        report.record(record("b", "g", Verdict::Missing(Diagnostic::new("/b", "Endpoint was not found", "Response Code 404"))));
        assert_eq!(report.group("g").map(GroupReport::summary), Some(State::Valid));
    }

    #[test]
    fn error_member_flips_group() {
        let mut report = Report::default();
        report.record(record("a", "g", Verdict::Valid(None)));
        report.record(record("b", "g", Verdict::Error(Diagnostic::new("/b", "x", "y"))));
        report.record(record("c", "other", Verdict::Valid(None)));
        assert_eq!(report.group("g").map(GroupReport::summary), Some(State::Invalid));
        assert_eq!(report.group("other").map(GroupReport::summary), Some(State::Valid));
    }

    #[test]
    fn serializes_nested_by_group_then_id() {
        let mut report = Report::default();
        report.record(record("caps", "general", Verdict::Valid(None)));
        report.record(record("jobs", "batch", Verdict::Invalid(Diagnostic::new("GET  /jobs", "bad", "no \"route\""))));
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["general"]["group_summary"], "Valid");
        assert_eq!(value["general"]["endpoints"]["caps"]["state"], "Valid");
        assert_eq!(value["general"]["endpoints"]["caps"]["message"], "");
        assert_eq!(value["batch"]["group_summary"], "Invalid");
        assert_eq!(value["batch"]["endpoints"]["jobs"]["url"], "/jobs");
        assert_eq!(value["batch"]["endpoints"]["jobs"]["type"], "GET");
        assert_eq!(
            value["batch"]["endpoints"]["jobs"]["message"],
            "Input: GET  /jobs; Error: bad; Details: no 'route'"
        );
    }
}
