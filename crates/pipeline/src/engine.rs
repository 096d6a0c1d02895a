//! Mapping engine: ordered rule set with first-match topic lookup.

use std::collections::HashMap;
use std::sync::Arc;

use i3x_core::config::MappingConfig;
use i3x_core::{Error, Result};

use crate::topic::TopicPattern;

/// A mapping rule with its compiled topic pattern.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub config: MappingConfig,
    pub pattern: TopicPattern,
}

impl CompiledRule {
    fn compile(config: MappingConfig) -> Result<Self> {
        let pattern = TopicPattern::compile(&config.topic_pattern)?;
        Ok(Self { config, pattern })
    }
}

/// Rules in admin insertion order; the first matching rule wins.
#[derive(Default)]
pub struct MappingEngine {
    rules: Vec<Arc<CompiledRule>>,
}

impl MappingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule. Duplicate ids are refused.
    pub fn add_rule(&mut self, config: MappingConfig) -> Result<Arc<CompiledRule>> {
        if self.rules.iter().any(|r| r.config.id == config.id) {
            return Err(Error::conflict(format!(
                "mapping rule '{}' already exists",
                config.id
            )));
        }
        let rule = Arc::new(CompiledRule::compile(config)?);
        self.rules.push(rule.clone());
        Ok(rule)
    }

    /// Replace a rule in place, keeping its position in the match order.
    pub fn update_rule(&mut self, config: MappingConfig) -> Result<Arc<CompiledRule>> {
        let position = self
            .rules
            .iter()
            .position(|r| r.config.id == config.id)
            .ok_or_else(|| Error::not_found(format!("mapping rule '{}'", config.id)))?;
        let rule = Arc::new(CompiledRule::compile(config)?);
        self.rules[position] = rule.clone();
        Ok(rule)
    }

    /// Remove a rule by id. Returns false when it was not present.
    pub fn remove_rule(&mut self, id: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.config.id != id);
        self.rules.len() != before
    }

    pub fn get_rule(&self, id: &str) -> Option<Arc<CompiledRule>> {
        self.rules.iter().find(|r| r.config.id == id).cloned()
    }

    pub fn list_rules(&self) -> Vec<MappingConfig> {
        self.rules.iter().map(|r| r.config.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First matching rule with its captures. First-inserted wins.
    pub fn match_first(&self, topic: &str) -> Option<(Arc<CompiledRule>, HashMap<String, String>)> {
        self.rules
            .iter()
            .find_map(|rule| rule.pattern.matches(topic).map(|caps| (rule.clone(), caps)))
    }

    /// Every matching rule, in insertion order.
    pub fn match_all(&self, topic: &str) -> Vec<(Arc<CompiledRule>, HashMap<String, String>)> {
        self.rules
            .iter()
            .filter_map(|rule| rule.pattern.matches(topic).map(|caps| (rule.clone(), caps)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, pattern: &str) -> MappingConfig {
        MappingConfig {
            id: id.to_string(),
            topic_pattern: pattern.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_first_match_wins_by_insertion_order() {
        let mut engine = MappingEngine::new();
        engine.add_rule(rule("broad", "{site}/temp")).unwrap();
        engine.add_rule(rule("narrow", "f1/temp")).unwrap();

        let (matched, captures) = engine.match_first("f1/temp").unwrap();
        assert_eq!(matched.config.id, "broad");
        assert_eq!(captures["site"], "f1");

        assert_eq!(engine.match_all("f1/temp").len(), 2);
    }

    #[test]
    fn test_duplicate_id_refused() {
        let mut engine = MappingEngine::new();
        engine.add_rule(rule("r1", "a/{x}")).unwrap();
        assert!(matches!(
            engine.add_rule(rule("r1", "b/{x}")),
            Err(Error::Conflict(_))
        ));
    }

    #[test]
    fn test_update_keeps_position() {
        let mut engine = MappingEngine::new();
        engine.add_rule(rule("r1", "a/{x}")).unwrap();
        engine.add_rule(rule("r2", "{any}/{x}")).unwrap();
        engine.update_rule(rule("r1", "{any}/{x}")).unwrap();

        // r1 still precedes r2 after the update.
        let (matched, _) = engine.match_first("q/z").unwrap();
        assert_eq!(matched.config.id, "r1");
    }

    #[test]
    fn test_remove_rule() {
        let mut engine = MappingEngine::new();
        engine.add_rule(rule("r1", "a/{x}")).unwrap();
        assert!(engine.remove_rule("r1"));
        assert!(!engine.remove_rule("r1"));
        assert!(engine.match_first("a/b").is_none());
    }

    #[test]
    fn test_no_match_yields_none() {
        let mut engine = MappingEngine::new();
        engine.add_rule(rule("r1", "a/{x}/c")).unwrap();
        assert!(engine.match_first("a/b").is_none());
    }
}
