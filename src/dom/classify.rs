//! Heuristic node classification.
//!
//! An ordered cascade of structural/textual rules assigns each node a
//! semantic [`Role`], first match wins. Misses return
//! [`Role::Unrecognized`], which callers treat as "skip", never as an
//! error. Results are recomputed every pass and never cached, since the
//! host tree mutates underneath the engine.

use regex::Regex;

use crate::config::EngineConfig;
use crate::dom::{NodeHandle, Rect};

/// Tags whose subtrees carry no rewritable content. Nothing under these is
/// ever classified past `Unrecognized`, regardless of its text.
const NON_CONTENT_TAGS: &[&str] = &[
    "script", "style", "noscript", "meta", "link", "title", "head", "svg", "canvas",
];

/// Framework mount-point ids that warrant extra caution.
const FRAMEWORK_ROOT_IDS: &[&str] = &["root", "__next", "app"];

/// Container tags a framework root may safely be.
const CONTENT_CONTAINER_TAGS: &[&str] = &["div", "main", "article", "section"];

/// Tags that can hold a single numeric value worth classifying.
const VALUE_CELL_TAGS: &[&str] = &["td", "th", "div", "span"];

/// Kinds of decorative marker the engine recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    /// A winner/result triangle next to a fixture score.
    Winner,
}

/// Semantic role of a node, as judged by the heuristic cascade.
#[derive(Debug, Clone, PartialEq)]
pub enum Role {
    Unrecognized,
    /// A standings table: many rows plus metric column headers.
    AggregateTable {
        row_count: usize,
        has_metric_columns: bool,
    },
    /// A competitor's row, identified by its descriptive label attribute.
    EntityRow { label: String },
    /// A small integer inside a confirmed standings table.
    RankCell { value: u32 },
    /// A small integer outside any standings table: a candidate score,
    /// carrying its rendered position when the host laid it out.
    PairedValueCell {
        value: u32,
        position: Option<Rect>,
    },
    /// A decorative result marker.
    DecorativeIndicator { kind: IndicatorKind },
}

/// The classifier: compiled header patterns plus the thresholds they are
/// calibrated against.
///
/// The same raw shape ("a small integer") reads as a rank counter inside a
/// standings table and as a score candidate outside one, so the enclosing
/// table is always checked first and score matching is skipped entirely
/// inside a confirmed table.
pub struct Classifier {
    min_table_rows: usize,
    counter_max: u32,
    score_max: u32,
    max_ancestor_depth: usize,
    metric_tokens: Regex,
    metric_concat: Regex,
    metric_triple: Regex,
    small_integer: Regex,
}

impl Classifier {
    pub fn new(config: &EngineConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            min_table_rows: config.min_table_rows,
            counter_max: config.counter_max,
            score_max: config.score_max,
            max_ancestor_depth: config.max_ancestor_depth,
            // The host renders the same semantic header two ways depending
            // on viewport/locale: isolated abbreviations, or abbreviations
            // glued to their spelled-out labels.
            metric_tokens: Regex::new(r"(?i)\b(MP|W|D|L|GF|GA|GD|Pts)\b")?,
            metric_concat: Regex::new(
                r"(?i)(MP|W|D|L|GF|GA|GD|Pts)(Matches|Wins|Draws|Losses|Goals|Points)",
            )?,
            metric_triple: Regex::new(r"(?i)Rank.*Club.*MP")?,
            small_integer: Regex::new(r"^\d{1,2}$")?,
        })
    }

    /// Classify one node against the cascade.
    pub fn classify(&self, node: &NodeHandle) -> Role {
        if self.is_excluded(node) {
            return Role::Unrecognized;
        }
        if let Some(role) = self.classify_aggregate_table(node) {
            return role;
        }
        if let Some(role) = classify_entity_row(node) {
            return role;
        }
        if let Some(role) = self.classify_numeric_cell(node) {
            return role;
        }
        if let Some(role) = classify_indicator(node) {
            return role;
        }
        Role::Unrecognized
    }

    /// Whether this node sits under a non-content subtree (script, style,
    /// metadata, vector graphics) or a suspicious framework mount point.
    pub fn is_excluded(&self, node: &NodeHandle) -> bool {
        for (depth, ancestor) in node.ancestors().into_iter().enumerate() {
            if depth >= self.max_ancestor_depth {
                break;
            }
            if !ancestor.is_element() {
                continue;
            }
            let tag = ancestor.tag();
            if NON_CONTENT_TAGS.contains(&tag.as_str()) {
                return true;
            }
            if let Some(id) = ancestor.attr("id") {
                if FRAMEWORK_ROOT_IDS.contains(&id.as_str())
                    && !CONTENT_CONTAINER_TAGS.contains(&tag.as_str())
                {
                    return true;
                }
            }
        }
        false
    }

    /// A standings table: row-heavy and carrying metric column headers.
    fn classify_aggregate_table(&self, node: &NodeHandle) -> Option<Role> {
        if !node.is_element() || node.tag() != "table" {
            return None;
        }
        let row_count = node
            .find_all(|n| n.is_element() && n.data().tag == "tr")
            .len();
        if row_count < self.min_table_rows {
            return None;
        }
        let text = node.collect_text();
        let has_metric_columns = self.metric_tokens.is_match(&text)
            || self.metric_concat.is_match(&text)
            || self.metric_triple.is_match(&text);
        if !has_metric_columns {
            return None;
        }
        Some(Role::AggregateTable {
            row_count,
            has_metric_columns,
        })
    }

    /// The nearest enclosing standings table, if any.
    pub fn enclosing_aggregate_table(&self, node: &NodeHandle) -> Option<NodeHandle> {
        node.ancestors()
            .into_iter()
            .find(|a| self.classify_aggregate_table(a).is_some())
    }

    fn classify_numeric_cell(&self, node: &NodeHandle) -> Option<Role> {
        if !node.is_element() || !VALUE_CELL_TAGS.contains(&node.tag().as_str()) {
            return None;
        }
        let text = node.collect_text();
        let trimmed = text.trim();
        if !self.small_integer.is_match(trimmed) {
            return None;
        }
        let value: u32 = trimmed.parse().ok()?;

        // Inside a confirmed standings table only counter semantics apply;
        // score-style matching is skipped entirely. This is the main
        // false-positive guard: MP values and scores share the same shape.
        if self.enclosing_aggregate_table(node).is_some() {
            if value <= self.counter_max {
                return Some(Role::RankCell { value });
            }
            return None;
        }

        if value <= self.score_max {
            return Some(Role::PairedValueCell {
                value,
                position: node.layout(),
            });
        }
        None
    }
}

/// A row carrying a descriptive label attribute and no header cell.
fn classify_entity_row(node: &NodeHandle) -> Option<Role> {
    if !node.is_element() || node.tag() != "tr" {
        return None;
    }
    let label = node.attr("aria-label")?;
    if label.trim().is_empty() {
        return None;
    }
    let has_header_cell = node
        .find_first(|n| n.is_element() && n.data().tag == "th")
        .is_some();
    if has_header_cell {
        return None;
    }
    Some(Role::EntityRow { label })
}

/// A small vector-graphic winner/result marker.
fn classify_indicator(node: &NodeHandle) -> Option<Role> {
    if !node.is_element() || node.tag() != "svg" {
        return None;
    }
    let by_class = node
        .attr("class")
        .is_some_and(|c| c.to_lowercase().contains("triangle"));
    let by_label = node
        .attr("aria-label")
        .is_some_and(|l| l.eq_ignore_ascii_case("winner"));
    if by_class || by_label {
        Some(Role::DecorativeIndicator {
            kind: IndicatorKind::Winner,
        })
    } else {
        None
    }
}
