//! Rule registry: compiled keyword rules, one typed family per signal category.
//!
//! A `RuleSet` is built once from static tables (see `patterns`) and shared by
//! the extractor and the crisis detector. It holds no mutable state, so rules
//! can be unit-tested on their own and a new locale is just another table.

use regex::{Regex, RegexBuilder};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use solace_core::{
    CognitiveDistortion, Concern, CoreValue, CrisisSeverity, DefenseMechanism, Emotion,
    GoalCategory, LifeEventType, MotivationTrigger, Need, RelationType, RiskFlag,
    WellnessIndicator,
};

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid pattern in rule '{rule}': {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

// ============================================================================
// KeywordMatcher
// ============================================================================

/// Whole-word matcher over a keyword list. Multi-word keywords tolerate any
/// run of whitespace between words. Input is expected to be lower-cased.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
    regex: Option<Regex>,
}

impl KeywordMatcher {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, regex::Error> {
        let keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            return Ok(Self { keywords, regex: None });
        }
        let alternation = keywords
            .iter()
            .map(|k| {
                k.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");
        let regex = Regex::new(&format!(r"\b(?:{})\b", alternation))?;
        Ok(Self {
            keywords,
            regex: Some(regex),
        })
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }

    /// First keyword occurrence in the text.
    pub fn first_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.regex
            .as_ref()
            .and_then(|r| r.find(text))
            .map(|m| m.as_str())
    }

    /// Number of non-overlapping keyword occurrences.
    pub fn count(&self, text: &str) -> usize {
        self.regex
            .as_ref()
            .map(|r| r.find_iter(text).count())
            .unwrap_or(0)
    }

    /// Distinct keywords present, in order of first appearance.
    pub fn distinct(&self, text: &str) -> Vec<String> {
        let Some(regex) = &self.regex else {
            return Vec::new();
        };
        let mut seen = Vec::new();
        for m in regex.find_iter(text) {
            let normalized = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            if !seen.contains(&normalized) {
                seen.push(normalized);
            }
        }
        seen
    }
}

// ============================================================================
// PatternRule
// ============================================================================

/// A keyword rule that emits `tag` when it fires.
#[derive(Debug, Clone)]
pub struct PatternRule<T> {
    pub tag: T,
    matcher: KeywordMatcher,
}

impl<T: fmt::Display> PatternRule<T> {
    pub fn new(tag: T, keywords: &[&str]) -> Result<Self, RuleError> {
        let matcher = KeywordMatcher::new(keywords).map_err(|source| RuleError::InvalidPattern {
            rule: tag.to_string(),
            source,
        })?;
        Ok(Self { tag, matcher })
    }
}

impl<T> PatternRule<T> {
    pub fn matcher(&self) -> &KeywordMatcher {
        &self.matcher
    }

    pub fn fires(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }

    /// The keyword that made this rule fire (first match wins).
    pub fn trigger<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.matcher.first_match(text)
    }

    pub fn hits(&self, text: &str) -> usize {
        self.matcher.count(text)
    }
}

pub type EmotionRule = PatternRule<Emotion>;
pub type NeedRule = PatternRule<Need>;
pub type DefenseRule = PatternRule<DefenseMechanism>;
pub type DistortionRule = PatternRule<CognitiveDistortion>;
pub type ValueRule = PatternRule<CoreValue>;
pub type ConcernRule = PatternRule<Concern>;
pub type RiskRule = PatternRule<RiskFlag>;
pub type WellnessRule = PatternRule<WellnessIndicator>;
pub type LifeEventRule = PatternRule<LifeEventType>;
pub type MotivationRule = PatternRule<MotivationTrigger>;
pub type GoalCategoryRule = PatternRule<GoalCategory>;
pub type RelationRule = PatternRule<RelationType>;
pub type CrisisTierRule = PatternRule<CrisisSeverity>;

/// Tags of every rule in `rules` that fires on `text`, in rule order.
pub fn fired_tags<T: Copy>(rules: &[PatternRule<T>], text: &str) -> Vec<T> {
    rules.iter().filter(|r| r.fires(text)).map(|r| r.tag).collect()
}

// ============================================================================
// Relationship and goal phrase matchers
// ============================================================================

/// Captures "my <relation> <Name>" and "<Name>, my <relation>".
#[derive(Debug, Clone)]
pub struct RelationMatcher {
    /// Group 1: relation word, group 2: candidate name.
    relation_then_name: Regex,
    /// Bare "my <relation>" mentions.
    relation_only: Regex,
    /// Group 1: capitalized name, group 2: relation word.
    name_then_relation: Regex,
}

impl RelationMatcher {
    pub fn new(relations: &[RelationRule]) -> Result<Self, RuleError> {
        let mut terms: Vec<&str> = relations
            .iter()
            .flat_map(|r| r.matcher().keywords().iter().map(String::as_str))
            .collect();
        // Longest first so "best friend" wins over "friend"
        terms.sort_by_key(|t| std::cmp::Reverse(t.len()));
        let alternation = terms
            .iter()
            .map(|t| t.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+"))
            .collect::<Vec<_>>()
            .join("|");

        let build = |pattern: String, case_insensitive: bool| {
            RegexBuilder::new(&pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|source| RuleError::InvalidPattern {
                    rule: "relationship".to_string(),
                    source,
                })
        };

        Ok(Self {
            relation_then_name: build(
                format!(r"\bmy\s+({alternation})\b,?\s+([A-Za-z][A-Za-z'\-]*)"),
                true,
            )?,
            relation_only: build(format!(r"\bmy\s+({alternation})\b"), true)?,
            name_then_relation: build(
                format!(r"\b([A-Z][a-z]+),\s+(?i:my)\s+((?i:{alternation}))\b"),
                false,
            )?,
        })
    }

    /// (relation word, name candidate) pairs, in text order.
    pub fn named(&self, text: &str) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for caps in self.relation_then_name.captures_iter(text) {
            if let (Some(rel), Some(name)) = (caps.get(1), caps.get(2)) {
                out.push((rel.as_str().to_lowercase(), name.as_str().to_string()));
            }
        }
        for caps in self.name_then_relation.captures_iter(text) {
            if let (Some(name), Some(rel)) = (caps.get(1), caps.get(2)) {
                out.push((rel.as_str().to_lowercase(), name.as_str().to_string()));
            }
        }
        out
    }

    /// Every "my <relation>" mention, named or not.
    pub fn mentions(&self, text: &str) -> Vec<String> {
        self.relation_only
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .collect()
    }
}

/// Captures goal statements and goal-progress reports.
#[derive(Debug, Clone)]
pub struct GoalMatcher {
    /// Group 1: goal clause.
    intent: Regex,
    /// Group 1: verb, group 2: object clause.
    progress: Regex,
}

impl GoalMatcher {
    pub fn new(intent_phrases: &[&str], progress_verbs: &[&str]) -> Result<Self, RuleError> {
        let join = |items: &[&str]| {
            items
                .iter()
                .map(|p| p.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"\s+"))
                .collect::<Vec<_>>()
                .join("|")
        };
        let build = |pattern: String| {
            RegexBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .map_err(|source| RuleError::InvalidPattern {
                    rule: "goal".to_string(),
                    source,
                })
        };
        Ok(Self {
            intent: build(format!(r"\b(?:{})\s+([^.!?\n]+)", join(intent_phrases)))?,
            progress: build(format!(
                r"\bi\s+(?:finally\s+|just\s+)?({})\s+([^.!?\n]+)",
                join(progress_verbs)
            ))?,
        })
    }

    pub fn intents<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.intent
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .collect()
    }

    pub fn progress<'t>(&self, text: &'t str) -> Vec<(String, &'t str)> {
        self.progress
            .captures_iter(text)
            .filter_map(|c| match (c.get(1), c.get(2)) {
                (Some(verb), Some(object)) => Some((
                    verb.as_str().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase(),
                    object.as_str().trim(),
                )),
                _ => None,
            })
            .collect()
    }
}

// ============================================================================
// RuleSet
// ============================================================================

/// The complete, versioned rule registry for one locale.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub version: &'static str,
    pub locale: &'static str,
    pub emotions: Vec<EmotionRule>,
    pub needs: Vec<NeedRule>,
    pub defenses: Vec<DefenseRule>,
    pub distortions: Vec<DistortionRule>,
    pub values: Vec<ValueRule>,
    pub concerns: Vec<ConcernRule>,
    pub risks: Vec<RiskRule>,
    pub wellness: Vec<WellnessRule>,
    pub life_events: Vec<LifeEventRule>,
    pub motivators: Vec<MotivationRule>,
    pub goal_categories: Vec<GoalCategoryRule>,
    pub relations: Vec<RelationRule>,
    /// Ordered most severe first.
    pub crisis_tiers: Vec<CrisisTierRule>,
    pub intensity_markers: KeywordMatcher,
    pub hedges: KeywordMatcher,
    pub analytic_markers: KeywordMatcher,
    pub feeling_markers: KeywordMatcher,
    pub low_energy: KeywordMatcher,
    pub high_energy: KeywordMatcher,
    pub ongoing_markers: KeywordMatcher,
    pub relation_matcher: RelationMatcher,
    pub goal_matcher: GoalMatcher,
    /// Lower-cased words that can never be a person's name.
    pub name_stoplist: HashSet<String>,
}

impl RuleSet {
    /// Crisis tier rules ordered critical → low.
    pub fn crisis_tiers(&self) -> &[CrisisTierRule] {
        &self.crisis_tiers
    }

    /// Relation type for a matched relation word.
    pub fn relation_for(&self, word: &str) -> Option<RelationType> {
        let word = word.split_whitespace().collect::<Vec<_>>().join(" ");
        self.relations
            .iter()
            .find(|r| r.matcher().keywords().iter().any(|k| *k == word))
            .map(|r| r.tag)
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.name_stoplist.contains(&word.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_matcher_word_boundaries() {
        let m = KeywordMatcher::new(&["cutting", "mad", "kill myself"]).unwrap();
        assert!(m.is_match("i keep cutting"));
        assert!(!m.is_match("we are recruiting"));
        assert!(!m.is_match("a new cuttingboard"));
        assert!(!m.is_match("flying to madrid"));
        assert!(m.is_match("i want to kill   myself"));
    }

    #[test]
    fn test_keyword_matcher_counts() {
        let m = KeywordMatcher::new(&["happy", "glad"]).unwrap();
        assert_eq!(m.count("happy happy and glad"), 3);
        assert_eq!(m.distinct("happy happy and glad"), vec!["happy", "glad"]);
        assert_eq!(m.first_match("so glad, so happy"), Some("glad"));
    }

    #[test]
    fn test_empty_matcher_never_matches() {
        let m = KeywordMatcher::new::<&str>(&[]).unwrap();
        assert!(!m.is_match("anything"));
        assert_eq!(m.count(""), 0);
    }

    #[test]
    fn test_pattern_rule_first_match_wins() {
        let rule = NeedRule::new(Need::Rest, &["need a break", "exhausted"]).unwrap();
        assert_eq!(rule.trigger("exhausted, i need a break"), Some("exhausted"));
        assert_eq!(fired_tags(std::slice::from_ref(&rule), "exhausted"), vec![Need::Rest]);
    }

    #[test]
    fn test_relation_matcher_captures_names() {
        let rules = vec![
            RelationRule::new(RelationType::Spouse, &["wife", "husband"]).unwrap(),
            RelationRule::new(RelationType::Friend, &["friend", "best friend"]).unwrap(),
        ];
        let m = RelationMatcher::new(&rules).unwrap();
        assert_eq!(
            m.named("My wife Sarah and I"),
            vec![("wife".to_string(), "Sarah".to_string())]
        );
        assert_eq!(
            m.named("I called Tom, my best friend."),
            vec![("best friend".to_string(), "Tom".to_string())]
        );
        assert_eq!(m.mentions("my husband is away"), vec!["husband".to_string()]);
    }

    #[test]
    fn test_goal_matcher() {
        let m = GoalMatcher::new(&["i want to", "my goal is to"], &["finished", "gave up on"]).unwrap();
        assert_eq!(m.intents("I want to run a marathon. Soon."), vec!["run a marathon"]);
        assert_eq!(
            m.progress("I finally finished my thesis!"),
            vec![("finished".to_string(), "my thesis")]
        );
    }
}
