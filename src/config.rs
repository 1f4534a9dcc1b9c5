//! Exploration budgets.

/// Configuration for an [`Explorer`][crate::explorer::Explorer].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExplorationConfig {
    /// How many times one path may pass through the same program point.
    pub max_per_point_visits: usize,
    /// Maximum number of distinct `(point, state)` pairs explored.
    pub max_states: usize,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        ExplorationConfig {
            max_per_point_visits: 2,
            max_states: 1000,
        }
    }
}

impl ExplorationConfig {
    pub fn with_max_per_point_visits(mut self, max_per_point_visits: usize) -> Self {
        self.max_per_point_visits = max_per_point_visits;
        self
    }

    pub fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = max_states;
        self
    }
}
