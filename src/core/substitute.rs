use crate::models::endpoint::Endpoint;
use crate::models::variable_store::VariableStore;

/// Resolves one placeholder in each mutable field of `endpoint`, using the
/// store as it is right now.
pub fn substitute_endpoint(endpoint: &Endpoint, variables: &VariableStore) -> Endpoint {
    Endpoint {
        id: variables.substitute(&endpoint.id),
        path: variables.substitute(&endpoint.path),
        method: variables.substitute(&endpoint.method),
        body_source: endpoint.body_source.as_deref().map(|b| variables.substitute(b)),
        group: variables.substitute(&endpoint.group),
        ..endpoint.clone()
    }
}
