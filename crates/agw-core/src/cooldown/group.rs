use super::ModelGrouper;

/// Default model grouping by family name.
///
/// Models that share an upstream quota map to one key, so a cooldown on one
/// of them covers its siblings.
#[derive(Debug, Clone, Copy, Default)]
pub struct FamilyGrouper;

impl ModelGrouper for FamilyGrouper {
    fn group_key_of(&self, model_id: &str) -> String {
        let id = model_id.trim().to_ascii_lowercase();
        let id = id.strip_prefix("models/").unwrap_or(&id);
        if id.starts_with("claude") {
            return "claude".to_string();
        }
        if id.starts_with("gemini") {
            let family = if id.contains("image") {
                "gemini-image"
            } else if id.contains("flash") {
                "gemini-flash"
            } else if id.contains("pro") {
                "gemini-pro"
            } else {
                "gemini"
            };
            return family.to_string();
        }
        id.to_string()
    }
}
