//! Descriptive plugin metadata.

use serde::{Deserialize, Serialize};

use crate::entity::{CommandAttrs, CommandKind, KindMap};
use crate::extras::{Extras, ExtrasKey};

/// Extras key holding a plugin's category.
pub const CATEGORY: ExtrasKey<String> = ExtrasKey::new("category");

/// Name, extras, and per-kind command defaults of a plugin.
///
/// Deserializable, so a plugin can be described in a config table:
///
/// ```toml
/// name = "moderation"
///
/// [extras]
/// category = "admin"
///
/// [command_attrs.slash]
/// dm_permission = false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,

    #[serde(default)]
    pub extras: Extras,

    /// Attributes applied to every command of a kind when it is attached,
    /// unless the command sets them itself.
    #[serde(default)]
    pub command_attrs: KindMap<CommandAttrs>,
}

impl PluginMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn category(&self) -> Option<String> {
        CATEGORY.get(&self.extras)
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        CATEGORY.insert(&mut self.extras, category.into());
    }

    pub fn command_attrs(&self, kind: CommandKind) -> &CommandAttrs {
        self.command_attrs.get(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_partial_table() {
        let meta: PluginMetadata = serde_json::from_value(json!({
            "name": "moderation",
            "extras": { "category": "admin" },
            "command_attrs": { "slash": { "dm_permission": false } }
        }))
        .unwrap();

        assert_eq!(meta.category().as_deref(), Some("admin"));
        assert_eq!(
            meta.command_attrs(CommandKind::Slash).get("dm_permission"),
            Some(&json!(false))
        );
        assert!(meta.command_attrs(CommandKind::Prefix).is_empty());
    }

    #[test]
    fn test_set_category() {
        let mut meta = PluginMetadata::new("fun");
        assert_eq!(meta.category(), None);
        meta.set_category("games");
        assert_eq!(meta.category().as_deref(), Some("games"));
    }
}
