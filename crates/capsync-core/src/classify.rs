//! Keyword-based event classification.
//!
//! The classifier holds an ordered table of `(type, keywords)` rules. The
//! table is data, so configuration can replace any row without touching the
//! matching code.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::event::EventType;

/// One row of the keyword table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub event_type: EventType,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new<I, S>(event_type: EventType, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_type,
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

/// Returns the built-in keyword table.
pub fn default_rules() -> Vec<KeywordRule> {
    vec![
        KeywordRule::new(EventType::Holiday, ["holiday", "bank holiday"]),
        KeywordRule::new(EventType::Pto, ["vacation", "pto", "out of office", "ooo"]),
        KeywordRule::new(EventType::Travel, ["travel", "flight", "trip"]),
        KeywordRule::new(EventType::Focus, ["focus", "deep work", "heads down"]),
        KeywordRule::new(EventType::Training, ["training", "learning", "workshop"]),
    ]
}

/// Maps event titles to an [`EventType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventClassifier {
    // Always in EventType::CLASSIFIED order, keywords lower-cased.
    rules: Vec<KeywordRule>,
}

impl Default for EventClassifier {
    fn default() -> Self {
        Self::from_rules(default_rules())
    }
}

impl EventClassifier {
    /// Builds a classifier from the default table with the given rows
    /// replacing the defaults for their event type.
    ///
    /// Precedence stays fixed (holiday, pto, travel, focus, training) no
    /// matter the order of `overrides`.
    ///
    /// # Errors
    ///
    /// Fails if an override targets `meeting` (the fallback) or names the
    /// same type twice.
    pub fn with_overrides(overrides: &[KeywordRule]) -> Result<Self, ConfigError> {
        let mut rules = default_rules();
        let mut seen = Vec::with_capacity(overrides.len());

        for rule in overrides {
            if rule.event_type == EventType::Meeting {
                return Err(ConfigError::MeetingKeywords);
            }
            if seen.contains(&rule.event_type) {
                return Err(ConfigError::DuplicateEventType(rule.event_type));
            }
            seen.push(rule.event_type);

            if let Some(slot) = rules.iter_mut().find(|r| r.event_type == rule.event_type) {
                slot.keywords = rule.keywords.clone();
            }
        }

        Ok(Self::from_rules(rules))
    }

    fn from_rules(rules: Vec<KeywordRule>) -> Self {
        let mut rules: Vec<KeywordRule> = rules
            .into_iter()
            .map(|rule| KeywordRule {
                event_type: rule.event_type,
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
            })
            .collect();
        rules.sort_by_key(|r| r.event_type);
        Self { rules }
    }

    /// Classifies a title; the first rule with a keyword contained in the
    /// lower-cased title wins, otherwise [`EventType::Meeting`].
    pub fn classify(&self, title: &str) -> EventType {
        let title = title.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| title.contains(k.as_str())))
            .map(|rule| rule.event_type)
            .unwrap_or(EventType::Meeting)
    }

    /// The effective table in precedence order.
    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_category_titles() {
        let classifier = EventClassifier::default();
        assert_eq!(classifier.classify("Bank Holiday"), EventType::Holiday);
        assert_eq!(classifier.classify("OOO - dentist"), EventType::Pto);
        assert_eq!(classifier.classify("Flight to Berlin"), EventType::Travel);
        assert_eq!(classifier.classify("Heads Down block"), EventType::Focus);
        assert_eq!(classifier.classify("Rust workshop"), EventType::Training);
    }

    #[test]
    fn unmatched_titles_are_meetings() {
        let classifier = EventClassifier::default();
        assert_eq!(classifier.classify("1:1 sync"), EventType::Meeting);
        assert_eq!(classifier.classify(""), EventType::Meeting);
        assert_eq!(classifier.classify("Sprint planning"), EventType::Meeting);
    }

    #[test]
    fn earlier_category_wins() {
        let classifier = EventClassifier::default();
        // travel is checked before training
        assert_eq!(classifier.classify("Training trip"), EventType::Travel);
        // holiday before pto
        assert_eq!(classifier.classify("Holiday vacation"), EventType::Holiday);
        assert_eq!(classifier.classify("Team Offsite Trip"), EventType::Travel);
    }

    #[test]
    fn overrides_replace_keywords_but_not_precedence() {
        let classifier = EventClassifier::with_overrides(&[
            KeywordRule::new(EventType::Training, ["Offsite"]),
            KeywordRule::new(EventType::Holiday, ["festivo"]),
        ])
        .unwrap();

        assert_eq!(classifier.classify("Team offsite"), EventType::Training);
        assert_eq!(classifier.classify("Festivo nacional"), EventType::Holiday);
        // default holiday keywords were replaced
        assert_eq!(classifier.classify("Bank holiday"), EventType::Meeting);
        // untouched rows keep defaults
        assert_eq!(classifier.classify("PTO"), EventType::Pto);

        let order: Vec<_> = classifier.rules().iter().map(|r| r.event_type).collect();
        assert_eq!(order, EventType::CLASSIFIED.to_vec());
    }

    #[test]
    fn invalid_overrides_rejected() {
        let meeting = EventClassifier::with_overrides(&[KeywordRule::new(
            EventType::Meeting,
            ["sync"],
        )]);
        assert!(matches!(meeting, Err(ConfigError::MeetingKeywords)));

        let duplicate = EventClassifier::with_overrides(&[
            KeywordRule::new(EventType::Focus, ["a"]),
            KeywordRule::new(EventType::Focus, ["b"]),
        ]);
        assert!(matches!(
            duplicate,
            Err(ConfigError::DuplicateEventType(EventType::Focus))
        ));
    }

    #[test]
    fn blank_keywords_never_match() {
        let classifier =
            EventClassifier::with_overrides(&[KeywordRule::new(EventType::Focus, ["", "  "])])
                .unwrap();
        assert_eq!(classifier.classify("anything"), EventType::Meeting);
    }
}
