use serde::{Deserialize, Serialize};

/// What to do when a class name is indexed a second time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateClassPolicy {
    /// Fail with [`crate::IndexError::DuplicateClass`].
    #[default]
    Reject,
    /// The later class wins.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub duplicate_classes: DuplicateClassPolicy,
    /// Index `RuntimeInvisible*` (class-retention) annotations too.
    pub invisible_annotations: bool,
    /// Compute the known-users table.
    pub known_users: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            duplicate_classes: DuplicateClassPolicy::Reject,
            invisible_annotations: true,
            known_users: true,
        }
    }
}
