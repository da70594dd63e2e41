use serde::{Deserialize, Serialize};

/// Most recent successful send target for one messenger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastRecipient {
    pub id: String,
    pub name: String,
    pub username: Option<String>,
}
