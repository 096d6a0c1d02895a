//! Topic patterns: literal strings punctuated by `{name}` placeholders.
//!
//! Compilation escapes every literal character, replaces each placeholder by
//! a capturing group matching one topic segment, and anchors the pattern.
//! Patterns deliberately support nothing beyond that: no `+`, no `#`, no
//! MQTT wildcards (the broker-side subscription string is derived
//! separately).

use std::collections::HashMap;

use regex::Regex;

use i3x_core::{Error, Result};

/// A compiled topic pattern.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    pattern: String,
    regex: Regex,
    param_names: Vec<String>,
}

/// Pieces of a pattern, in order: literal runs and named placeholders.
enum Piece<'a> {
    Literal(&'a str),
    Param(&'a str),
}

fn split_pieces(pattern: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        if let Some(close_rel) = rest[open..].find('}') {
            let close = open + close_rel;
            let name = &rest[open + 1..close];
            if open > 0 {
                pieces.push(Piece::Literal(&rest[..open]));
            }
            pieces.push(Piece::Param(name));
            rest = &rest[close + 1..];
        } else {
            break;
        }
    }
    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    pieces
}

impl TopicPattern {
    /// Compile a pattern. Placeholder order is preserved in `param_names`.
    pub fn compile(pattern: &str) -> Result<Self> {
        let pieces = split_pieces(pattern);
        let mut source = String::from("^");
        let mut param_names = Vec::new();
        for piece in &pieces {
            match piece {
                Piece::Literal(text) => source.push_str(&regex::escape(text)),
                Piece::Param(name) => {
                    if name.is_empty() {
                        return Err(Error::Validation(format!(
                            "empty placeholder in topic pattern '{}'",
                            pattern
                        )));
                    }
                    param_names.push(name.to_string());
                    // One topic segment: one or more non-slash characters.
                    source.push_str("([^/]+)");
                }
            }
        }
        source.push('$');
        let regex = Regex::new(&source)
            .map_err(|e| Error::Validation(format!("bad topic pattern '{}': {}", pattern, e)))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
            param_names,
        })
    }

    /// The original pattern text.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Placeholder names in order of appearance.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Match a topic, yielding the capture mapping on success.
    pub fn matches(&self, topic: &str) -> Option<HashMap<String, String>> {
        let caps = self.regex.captures(topic)?;
        let mut captures = HashMap::with_capacity(self.param_names.len());
        for (i, name) in self.param_names.iter().enumerate() {
            if let Some(m) = caps.get(i + 1) {
                captures.insert(name.clone(), m.as_str().to_string());
            }
        }
        Some(captures)
    }

    /// The broker-side subscription string: each `{x}` replaced by `+`.
    pub fn mqtt_subscription_topic(&self) -> String {
        let mut out = String::new();
        for piece in split_pieces(&self.pattern) {
            match piece {
                Piece::Literal(text) => out.push_str(text),
                Piece::Param(_) => out.push('+'),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern_matches_itself() {
        let pattern = TopicPattern::compile("plant/line1/temp").unwrap();
        let captures = pattern.matches("plant/line1/temp").unwrap();
        assert!(captures.is_empty());
        assert!(pattern.matches("plant/line1/temp/extra").is_none());
    }

    #[test]
    fn test_placeholders_capture_single_segments() {
        let pattern = TopicPattern::compile("{site}/sensors/temp/{id}").unwrap();
        assert_eq!(pattern.param_names(), ["site", "id"]);

        let captures = pattern.matches("f1/sensors/temp/s01").unwrap();
        assert_eq!(captures["site"], "f1");
        assert_eq!(captures["id"], "s01");

        // A placeholder never spans a slash.
        assert!(pattern.matches("f1/extra/sensors/temp/s01").is_none());
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let pattern = TopicPattern::compile("a+b/{x}/c.d").unwrap();
        assert!(pattern.matches("a+b/seg/c.d").is_some());
        assert!(pattern.matches("aab/seg/cxd").is_none());
    }

    #[test]
    fn test_capture_substitution_round_trip() {
        // R2: substituting captures back into the pattern recovers the topic.
        let pattern = TopicPattern::compile("{a}/mid/{b}").unwrap();
        let topic = "left/mid/right";
        let captures = pattern.matches(topic).unwrap();
        let rebuilt = crate::mapper::render_template("{a}/mid/{b}", &captures);
        assert_eq!(rebuilt, topic);
    }

    #[test]
    fn test_mqtt_subscription_topic() {
        let pattern = TopicPattern::compile("{site}/sensors/temp/{id}").unwrap();
        assert_eq!(pattern.mqtt_subscription_topic(), "+/sensors/temp/+");

        let literal = TopicPattern::compile("plant/temp").unwrap();
        assert_eq!(literal.mqtt_subscription_topic(), "plant/temp");
    }

    #[test]
    fn test_unclosed_brace_is_literal() {
        let pattern = TopicPattern::compile("a/{x}/b{oops").unwrap();
        assert!(pattern.matches("a/seg/b{oops").is_some());
        assert_eq!(pattern.param_names(), ["x"]);
    }
}
