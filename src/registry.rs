//! Per-device tool registry

use crate::config::ToolConfig;
use crate::error::{DeviceError, Result};
use crate::sample::Sample;
use crate::tool::Tool;
use std::collections::BTreeMap;

/// Tools of one device keyed by identifier
#[derive(Debug)]
pub struct ToolRegistry<S: Sample> {
    tools: BTreeMap<String, Tool<S>>,
}

impl<S: Sample> Default for ToolRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sample> ToolRegistry<S> {
    pub fn new() -> Self {
        ToolRegistry {
            tools: BTreeMap::new(),
        }
    }

    /// Check that `config` could be added without touching the registry
    pub fn check_insert(&self, config: &ToolConfig) -> Result<()> {
        if config.id.is_empty() {
            return Err(DeviceError::ToolRejected {
                tool: String::new(),
                reason: "empty tool identifier".to_string(),
            });
        }
        if self.tools.contains_key(&config.id) {
            return Err(DeviceError::DuplicateTool(config.id.clone()));
        }
        if config.is_reference {
            if let Some(existing) = self.reference_id() {
                return Err(DeviceError::MultipleReferenceTools {
                    tool: config.id.clone(),
                    existing: existing.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn add(&mut self, tool: Tool<S>) -> Result<()> {
        self.check_insert(tool.config())?;
        self.tools.insert(tool.id().to_string(), tool);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<Tool<S>> {
        self.tools
            .remove(id)
            .ok_or_else(|| DeviceError::ToolNotFound(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&Tool<S>> {
        self.tools.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Tool<S>> {
        self.tools.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tools.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn configs(&self) -> Vec<ToolConfig> {
        self.tools.values().map(|t| t.config().clone()).collect()
    }

    pub fn reference_id(&self) -> Option<&str> {
        self.tools
            .values()
            .find(|t| t.is_reference())
            .map(|t| t.id())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tool<S>> {
        self.tools.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tool<S>> {
        self.tools.values_mut()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Remove every tool, returning them detached
    pub fn clear(&mut self) -> Vec<Tool<S>> {
        let mut tools: Vec<Tool<S>> = std::mem::take(&mut self.tools).into_values().collect();
        for tool in &mut tools {
            tool.detach();
        }
        tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transform;

    fn registry() -> ToolRegistry<Transform> {
        ToolRegistry::new()
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let mut reg = registry();
        reg.add(Tool::new(ToolConfig::port("T1", 0))).unwrap();
        let err = reg.add(Tool::new(ToolConfig::port("T1", 1))).unwrap_err();
        assert!(matches!(err, DeviceError::DuplicateTool(ref id) if id == "T1"));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("T1").unwrap().config().port_number(), Some(0));
    }

    #[test]
    fn test_single_reference() {
        let mut reg = registry();
        reg.add(Tool::new(ToolConfig::port("Ref", 0).as_reference())).unwrap();
        assert_eq!(reg.reference_id(), Some("Ref"));
        assert!(matches!(
            reg.add(Tool::new(ToolConfig::port("Other", 1).as_reference())),
            Err(DeviceError::MultipleReferenceTools { .. })
        ));
        reg.add(Tool::new(ToolConfig::port("Other", 1))).unwrap();
        assert_eq!(reg.ids(), vec!["Other".to_string(), "Ref".to_string()]);
    }

    #[test]
    fn test_remove_and_lookup() {
        let mut reg = registry();
        reg.add(Tool::new(ToolConfig::port("T1", 0))).unwrap();
        assert!(reg.get("missing").is_none());
        assert!(matches!(reg.remove("missing"), Err(DeviceError::ToolNotFound(_))));
        let tool = reg.remove("T1").unwrap();
        assert_eq!(tool.id(), "T1");
        assert!(reg.is_empty());
    }

    #[test]
    fn test_clear_detaches() {
        let mut reg = registry();
        let mut tool = Tool::new(ToolConfig::port("T1", 0));
        tool.attach("dev");
        reg.add(tool).unwrap();
        let removed = reg.clear();
        assert_eq!(removed.len(), 1);
        assert!(!removed[0].is_attached());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let reg = registry();
        assert!(reg.check_insert(&ToolConfig::port("", 0)).is_err());
    }
}
