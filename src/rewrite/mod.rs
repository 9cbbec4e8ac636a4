//! Pure text rewriting.
//!
//! A [`RuleSet`] applies an ordered list of word-boundary, case-insensitive
//! replacement rules to a string. Multi-word phrases always apply before
//! any single-word rule contained in them, so overlapping rules cannot
//! double-fire or leave partial replacements. The rewriter has no tree
//! awareness and no side effects; because the replacement vocabulary is
//! disjoint from the matched vocabulary, applying it to its own output is
//! a no-op.

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("invalid rule pattern: {0}")]
    BadPattern(#[from] regex::Error),
}

/// One replacement rule. `pattern` is plain text (a word or a multi-word
/// phrase); matching is case-insensitive and respects word boundaries.
#[derive(Debug, Clone)]
pub struct Rule {
    pub pattern: String,
    pub replacement: String,
}

impl Rule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

struct CompiledRule {
    regex: Regex,
    replacement: String,
    /// Continuations after a match that suppress it: a single-word rule
    /// must not fire on the leading word of a longer configured phrase.
    forbidden_continuations: Vec<Regex>,
}

/// An ordered, compiled rule list.
pub struct RuleSet {
    compiled: Vec<CompiledRule>,
}

impl RuleSet {
    /// Compile rules, ordering phrases before the single words they
    /// contain (longest phrase first; original relative order otherwise).
    pub fn compile(rules: &[Rule]) -> Result<Self, RewriteError> {
        let mut indexed: Vec<(usize, &Rule)> = rules.iter().enumerate().collect();
        indexed.sort_by_key(|(i, r)| (std::cmp::Reverse(word_count(&r.pattern)), *i));

        let mut compiled = Vec::with_capacity(rules.len());
        for (_, rule) in &indexed {
            let words: Vec<&str> = rule.pattern.split_whitespace().collect();
            let body = words
                .iter()
                .map(|w| regex::escape(w))
                .collect::<Vec<_>>()
                .join(r"\s+");
            let regex = Regex::new(&format!(r"(?i)\b{body}\b"))?;

            // If this is a single word that leads a longer phrase in the
            // same rule list, a match followed by the rest of that phrase
            // belongs to the phrase rule and must be left alone.
            let mut forbidden_continuations = Vec::new();
            if words.len() == 1 {
                for (_, other) in &indexed {
                    let other_words: Vec<&str> = other.pattern.split_whitespace().collect();
                    if other_words.len() > 1
                        && other_words[0].eq_ignore_ascii_case(words[0])
                    {
                        let rest = other_words[1..]
                            .iter()
                            .map(|w| regex::escape(w))
                            .collect::<Vec<_>>()
                            .join(r"\s+");
                        forbidden_continuations
                            .push(Regex::new(&format!(r"(?i)^\s+{rest}\b"))?);
                    }
                }
            }

            compiled.push(CompiledRule {
                regex,
                replacement: rule.replacement.clone(),
                forbidden_continuations,
            });
        }
        Ok(Self { compiled })
    }

    /// Apply every rule in order. Returns the resulting string and whether
    /// anything changed.
    pub fn apply(&self, text: &str) -> (String, bool) {
        let mut current = text.to_string();
        let mut changed = false;
        for rule in &self.compiled {
            let (next, rule_changed) = apply_rule(&current, rule);
            if rule_changed {
                current = next;
                changed = true;
            }
        }
        (current, changed)
    }

    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}

fn apply_rule(text: &str, rule: &CompiledRule) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut changed = false;
    for m in rule.regex.find_iter(text) {
        let rest = &text[m.end()..];
        if rule
            .forbidden_continuations
            .iter()
            .any(|c| c.is_match(rest))
        {
            continue;
        }
        out.push_str(&text[last..m.start()]);
        out.push_str(&rule.replacement);
        last = m.end();
        changed = true;
    }
    if !changed {
        return (text.to_string(), false);
    }
    out.push_str(&text[last..]);
    (out, true)
}

fn word_count(pattern: &str) -> usize {
    pattern.split_whitespace().count()
}
