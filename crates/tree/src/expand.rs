use std::collections::HashMap;

/// Keyed by span id so it survives forest rebuilds; entries are never
/// pruned.
#[derive(Debug, Clone)]
pub struct ExpansionState {
    default_expanded: bool,
    overrides: HashMap<String, bool>,
}

impl ExpansionState {
    pub fn new(default_expanded: bool) -> Self {
        Self {
            default_expanded,
            overrides: HashMap::new(),
        }
    }

    pub fn is_expanded(&self, span_id: &str) -> bool {
        self.overrides
            .get(span_id)
            .copied()
            .unwrap_or(self.default_expanded)
    }

    pub fn toggle(&mut self, span_id: &str) {
        let next = !self.is_expanded(span_id);
        self.overrides.insert(span_id.to_string(), next);
    }

    pub fn set(&mut self, span_id: &str, expanded: bool) {
        self.overrides.insert(span_id.to_string(), expanded);
    }
}
