use std::time::Duration;

use crate::dom::NodeHandle;
use crate::engine::pairing::Entity;
use crate::rewrite::Rule;

/// Tuning parameters for the engine.
///
/// Every numeric threshold here is a calibration against one specific host
/// layout; defaults carry the values the heuristics were tuned with, and
/// deployments can override any of them.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum `tr` descendants for a table to count as a standings table.
    pub min_table_rows: usize,
    /// Upper bound for a matches-played-style counter cell.
    pub counter_max: u32,
    /// Upper bound for a head-to-head score cell.
    pub score_max: u32,
    /// A pairing by distance must beat the opponent by more than this
    /// (Manhattan pixels) or the resolver refuses to choose.
    pub pairing_margin: f32,
    /// Quiet window after the last qualifying mutation before a re-scan.
    pub debounce: Duration,
    /// Delay after startup before the first pass, letting the host's
    /// framework finish rendering.
    pub settle_delay: Duration,
    /// Upward search limit when checking for non-content ancestors.
    pub max_ancestor_depth: usize,
    /// Upward search limit when locating a row container.
    pub max_row_search_depth: usize,
    /// Longest text run still considered an entity label.
    pub max_label_len: usize,
    /// Class-name fragments that mark a fixture/match container.
    pub fixture_class_markers: Vec<String>,
    /// Class-name fragments that mark a row-like div container.
    pub row_class_markers: Vec<String>,
    /// Versus-style separator tokens, tried in order.
    pub versus_separators: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_table_rows: 8,
            counter_max: 38,
            score_max: 10,
            pairing_margin: 50.0,
            debounce: Duration::from_millis(300),
            settle_delay: Duration::from_millis(3500),
            max_ancestor_depth: 20,
            max_row_search_depth: 10,
            max_label_len: 50,
            fixture_class_markers: vec![
                "match".into(),
                "fixture".into(),
                "imspo_mt".into(),
                "result".into(),
            ],
            row_class_markers: vec![
                "row".into(),
                "match".into(),
                "imspo_mt".into(),
                "L5Kkcd".into(),
            ],
            versus_separators: vec![" vs ".into(), " v. ".into(), " v ".into()],
        }
    }
}

/// Matcher for a decorative donor element (e.g. a qualification banner),
/// by substring on class, inline style, or contained text. Empty spec
/// matches nothing.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSpec {
    pub class_contains: Option<String>,
    pub style_contains: Option<String>,
    pub text_contains: Option<String>,
}

impl IndicatorSpec {
    pub fn matches(&self, node: &NodeHandle) -> bool {
        if !node.is_element() {
            return false;
        }
        let mut any = false;
        if let Some(ref frag) = self.class_contains {
            if !node.attr("class").is_some_and(|c| c.contains(frag.as_str())) {
                return false;
            }
            any = true;
        }
        if let Some(ref frag) = self.style_contains {
            if !node.attr("style").is_some_and(|s| s.contains(frag.as_str())) {
                return false;
            }
            any = true;
        }
        if let Some(ref frag) = self.text_contains {
            if !node.collect_text().contains(frag.as_str()) {
                return false;
            }
            any = true;
        }
        any
    }
}

/// How to derive one rewritten stat cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatValue {
    /// Write this literal value.
    Fixed(u32),
    /// Write the row's matches-played count.
    Matches,
    /// Write matches-played multiplied by this factor (e.g. 3 points a win).
    PerMatch(u32),
}

impl StatValue {
    pub fn resolve(&self, matches_played: u32) -> u32 {
        match *self {
            StatValue::Fixed(v) => v,
            StatValue::Matches => matches_played,
            StatValue::PerMatch(f) => matches_played.saturating_mul(f),
        }
    }
}

/// Values to write into an entity row's stat cells, addressed by fixed
/// column offsets from the matches-played cell
/// (W, D, L, GF, GA, GD, Pts in host column order).
#[derive(Debug, Clone)]
pub struct StatLine {
    pub wins: StatValue,
    pub draws: StatValue,
    pub losses: StatValue,
    pub goals_for: StatValue,
    pub goals_against: StatValue,
    pub goal_diff: StatValue,
    pub points: StatValue,
}

impl StatLine {
    /// The unbeaten season: every match won, maximal goal difference.
    pub fn perfect() -> Self {
        Self {
            wins: StatValue::Matches,
            draws: StatValue::Fixed(0),
            losses: StatValue::Fixed(0),
            goals_for: StatValue::Fixed(100),
            goals_against: StatValue::Fixed(0),
            goal_diff: StatValue::Fixed(100),
            points: StatValue::PerMatch(3),
        }
    }

    /// (offset from the matches-played cell, value) pairs in column order.
    pub fn offsets(&self) -> [(usize, StatValue); 7] {
        [
            (1, self.wins),
            (2, self.draws),
            (3, self.losses),
            (4, self.goals_for),
            (5, self.goals_against),
            (6, self.goal_diff),
            (7, self.points),
        ]
    }
}

/// The deployment vocabulary: which words to rewrite, which entity to
/// favor, and which optional structural embellishments to apply. The
/// engine itself carries none of this.
#[derive(Debug, Clone)]
pub struct RewritePlan {
    /// Ordered text replacement rules.
    pub rules: Vec<Rule>,
    /// The entity whose rows/scores the structural stages target.
    pub target: Entity,
    /// Replace the target's fixture scores with this value, bolded.
    pub boosted_score: Option<u32>,
    /// Move the target's standings row to the top and renumber.
    pub promote_target: bool,
    /// Clone this decorative element from whichever row carries it into
    /// the target's row when promoting.
    pub donor_indicator: Option<IndicatorSpec>,
    /// Rewrite the target row's stat cells after promotion.
    pub stat_line: Option<StatLine>,
}

impl RewritePlan {
    /// A plan that only rewrites text.
    pub fn text_only(rules: Vec<Rule>, target: Entity) -> Self {
        Self {
            rules,
            target,
            boosted_score: None,
            promote_target: false,
            donor_indicator: None,
            stat_line: None,
        }
    }
}
