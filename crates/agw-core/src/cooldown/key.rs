use std::fmt;

/// Key used to index cooldown entries.
///
/// Cooldowns apply to a whole quota family, so the model is normalised to its
/// group before it becomes part of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CooldownKey {
    pub token_id: String,
    pub model_group: String,
}

impl CooldownKey {
    pub fn new(token_id: &str, model_group: &str) -> Self {
        Self {
            token_id: token_id.to_string(),
            model_group: model_group.to_string(),
        }
    }
}

impl fmt::Display for CooldownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.token_id, self.model_group)
    }
}
