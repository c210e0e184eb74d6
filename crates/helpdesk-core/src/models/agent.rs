use serde::{Deserialize, Serialize};

/// Roster entry for an agent of the organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Persisted presence flag as of the fetch
    #[serde(default)]
    pub online: bool,
}

impl Agent {
    /// Case-insensitive match on name or email, used by the assignment picker.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.email.to_lowercase().contains(&query)
    }
}
