//! Entity-value pairing resolution.
//!
//! Given a target entity's row and two or more candidate score cells,
//! decide which score belongs to the target. Signals are tried in strict
//! priority order (shared row structure, then rendered-position distance,
//! then text order around a versus separator), short-circuiting on the
//! first confident answer. When no signal yields a unique confident
//! answer the resolver returns `None` and nothing is mutated: a wrong
//! guess here corrupts the *opponent's* data, which is worse than doing
//! nothing.

use crate::config::EngineConfig;
use crate::dom::{NodeHandle, Rect};

/// A logical competitor, identified by a canonical name plus the display
/// aliases a prior text-rewrite pass may already have substituted in.
#[derive(Debug, Clone)]
pub struct Entity {
    pub canonical: String,
    pub aliases: Vec<String>,
}

impl Entity {
    pub fn new(canonical: impl Into<String>, aliases: Vec<String>) -> Self {
        Self {
            canonical: canonical.into(),
            aliases,
        }
    }

    /// All names this entity may appear under.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.canonical.as_str()).chain(self.aliases.iter().map(String::as_str))
    }

    /// Case-insensitive containment match against free text.
    pub fn matches_text(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.names().any(|name| lower.contains(&name.to_lowercase()))
    }
}

/// One candidate paired value, as produced by classification.
#[derive(Debug, Clone)]
pub struct ScoreCandidate {
    pub node: NodeHandle,
    pub value: u32,
    pub position: Option<Rect>,
}

/// Everything the resolver needs for one pairing decision.
pub struct PairingInput<'a> {
    pub target: &'a Entity,
    pub target_row: &'a NodeHandle,
    pub opponent_row: Option<&'a NodeHandle>,
    pub container: &'a NodeHandle,
    pub candidates: &'a [ScoreCandidate],
}

/// Nearest row-like ancestor: a `tr`, or a div whose class marks it as a
/// row/match container.
pub fn row_container(node: &NodeHandle, config: &EngineConfig) -> Option<NodeHandle> {
    for (depth, ancestor) in node.ancestors().into_iter().enumerate() {
        if depth >= config.max_row_search_depth {
            break;
        }
        if !ancestor.is_element() {
            continue;
        }
        let tag = ancestor.tag();
        if tag == "tr" {
            return Some(ancestor);
        }
        if tag == "div" {
            if let Some(class) = ancestor.attr("class") {
                if config
                    .row_class_markers
                    .iter()
                    .any(|marker| class.contains(marker.as_str()))
                {
                    return Some(ancestor);
                }
            }
        }
    }
    None
}

/// Resolve which candidate belongs to the target. `Some(index)` into
/// `input.candidates`, or `None` for "no confident match".
pub fn resolve(input: &PairingInput<'_>, config: &EngineConfig) -> Option<usize> {
    if input.candidates.is_empty() {
        return None;
    }

    if let Some(index) = shared_row_test(input, config) {
        return Some(index);
    }

    let geometry_available = input.candidates.iter().any(|c| c.position.is_some());
    if geometry_available {
        // Geometry exists: decide by distance or refuse. Falling through
        // to text order here would re-open the near-tie ambiguity the
        // margin check just rejected.
        return relative_distance_test(input, config);
    }

    text_order_fallback(input, config)
}

/// Signal 1: exactly one candidate lives inside the target's row
/// structure (and not also inside the opponent's).
fn shared_row_test(input: &PairingInput<'_>, config: &EngineConfig) -> Option<usize> {
    let in_target: Vec<bool> = input
        .candidates
        .iter()
        .map(|c| in_row(&c.node, input.target_row, config))
        .collect();

    let hits = in_target.iter().filter(|&&b| b).count();
    if hits != 1 {
        return None;
    }
    let index = in_target.iter().position(|&b| b)?;

    if let Some(opponent_row) = input.opponent_row {
        if in_row(&input.candidates[index].node, opponent_row, config) {
            return None;
        }
    }
    Some(index)
}

fn in_row(node: &NodeHandle, row: &NodeHandle, config: &EngineConfig) -> bool {
    if node.is_within(row) {
        return true;
    }
    row_container(node, config).is_some_and(|r| r.ptr_eq(row))
}

/// Signal 2: Manhattan distance between rendered positions. The winner
/// must be strictly closer to the target than to the opponent, closer to
/// the target than every other candidate is, and ahead of the opponent
/// distance by more than the safety margin.
fn relative_distance_test(input: &PairingInput<'_>, config: &EngineConfig) -> Option<usize> {
    let target_rect = anchor_rect(input.target_row)?;
    let opponent_rect = input.opponent_row.and_then(anchor_rect)?;

    let mut distances = Vec::with_capacity(input.candidates.len());
    for candidate in input.candidates {
        let rect = candidate.position?;
        distances.push((
            rect.manhattan_distance(&target_rect),
            rect.manhattan_distance(&opponent_rect),
        ));
    }

    let (best, &(d_target, d_opponent)) = distances
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.0.total_cmp(&b.0))?;

    // Unique closest-to-target.
    let unique = distances
        .iter()
        .enumerate()
        .all(|(i, &(d, _))| i == best || d > d_target);
    if !unique {
        return None;
    }
    if d_target >= d_opponent {
        return None;
    }
    // Near-tie layouts are rejected rather than guessed at.
    if d_opponent - d_target <= config.pairing_margin {
        return None;
    }
    Some(best)
}

fn anchor_rect(node: &NodeHandle) -> Option<Rect> {
    if let Some(rect) = node.layout() {
        return Some(rect);
    }
    node.descendants().into_iter().find_map(|n| n.layout())
}

/// Signal 3 (only when no candidate has rendered geometry): split the
/// container text on a versus separator and assign candidates
/// positionally: first candidate to the side holding the target.
fn text_order_fallback(input: &PairingInput<'_>, config: &EngineConfig) -> Option<usize> {
    let text = input.container.collect_text().to_lowercase();
    let separator_at = config
        .versus_separators
        .iter()
        .find_map(|sep| text.find(sep.as_str()).map(|at| (at, sep.len())))?;

    let (before, after_with_sep) = text.split_at(separator_at.0);
    let after = &after_with_sep[separator_at.1..];

    let target_before = input.target.matches_text(before);
    let target_after = input.target.matches_text(after);

    match (target_before, target_after) {
        (true, false) => Some(0),
        (false, true) if input.candidates.len() >= 2 => Some(1),
        // On both sides or neither: no confident assignment.
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeHandle;
    use std::collections::HashMap;

    fn elem(tag: &str) -> NodeHandle {
        NodeHandle::element(tag, HashMap::new())
    }

    fn entity() -> Entity {
        Entity::new(
            "Liverpool",
            vec!["King of Merseyside".into(), "Liverpool FC".into()],
        )
    }

    fn candidate(node: &NodeHandle, value: u32, position: Option<Rect>) -> ScoreCandidate {
        if let Some(rect) = position {
            node.set_layout(rect);
        }
        ScoreCandidate {
            node: node.clone(),
            value,
            position,
        }
    }

    /// container > [row_a > (label, score_a), row_b > (label, score_b)]
    struct Fixture {
        container: NodeHandle,
        row_a: NodeHandle,
        row_b: NodeHandle,
        score_a: NodeHandle,
        score_b: NodeHandle,
    }

    fn fixture(label_a: &str, label_b: &str) -> Fixture {
        let container = elem("div");
        container.set_attr("class", "imspo_mt_match");
        let make_row = |label: &str| {
            let row = elem("tr");
            let name_cell = elem("td");
            name_cell.append_child(&NodeHandle::text(label));
            let score_cell = elem("td");
            row.append_child(&name_cell);
            row.append_child(&score_cell);
            container.append_child(&row);
            (row, score_cell)
        };
        let (row_a, score_a) = make_row(label_a);
        let (row_b, score_b) = make_row(label_b);
        Fixture {
            container,
            row_a,
            row_b,
            score_a,
            score_b,
        }
    }

    #[test]
    fn entity_alias_matching_is_case_insensitive() {
        let e = entity();
        assert!(e.matches_text("KING OF MERSEYSIDE lead 2-0"));
        assert!(e.matches_text("liverpool fc"));
        assert!(!e.matches_text("Everton"));
    }

    #[test]
    fn shared_row_wins_before_any_geometry() {
        let config = EngineConfig::default();
        let f = fixture("Liverpool", "Everton");
        let score_a = candidate(&f.score_a, 2, None);
        let score_b = candidate(&f.score_b, 1, None);

        let chosen = resolve(
            &PairingInput {
                target: &entity(),
                target_row: &f.row_a,
                opponent_row: Some(&f.row_b),
                container: &f.container,
                candidates: &[score_a, score_b],
            },
            &config,
        );
        assert_eq!(chosen, Some(0));
    }

    #[test]
    fn distance_picks_the_clearly_closer_candidate() {
        let config = EngineConfig::default();
        // Scores live outside either row, so only geometry can decide.
        let f = fixture("Liverpool", "Everton");
        f.row_a.set_layout(Rect::new(0.0, 0.0, 200.0, 20.0));
        f.row_b.set_layout(Rect::new(0.0, 100.0, 200.0, 20.0));
        let left = elem("div");
        let right = elem("div");
        f.container.append_child(&left);
        f.container.append_child(&right);

        let near_target = candidate(&left, 3, Some(Rect::new(220.0, 0.0, 20.0, 20.0)));
        let near_opponent = candidate(&right, 0, Some(Rect::new(220.0, 100.0, 20.0, 20.0)));

        let chosen = resolve(
            &PairingInput {
                target: &entity(),
                target_row: &f.row_a,
                opponent_row: Some(&f.row_b),
                container: &f.container,
                candidates: &[near_target, near_opponent],
            },
            &config,
        );
        assert_eq!(chosen, Some(0));
    }

    #[test]
    fn near_tie_distances_abort_without_choice() {
        let config = EngineConfig::default();
        let f = fixture("Liverpool", "Everton");
        f.row_a.set_layout(Rect::new(0.0, 0.0, 200.0, 20.0));
        f.row_b.set_layout(Rect::new(0.0, 60.0, 200.0, 20.0));
        let a = elem("div");
        let b = elem("div");
        f.container.append_child(&a);
        f.container.append_child(&b);

        // Both candidates sit halfway between the rows: equidistant within
        // the safety margin, so the resolver must refuse to guess.
        let mid_a = candidate(&a, 1, Some(Rect::new(220.0, 30.0, 20.0, 20.0)));
        let mid_b = candidate(&b, 2, Some(Rect::new(260.0, 30.0, 20.0, 20.0)));

        let chosen = resolve(
            &PairingInput {
                target: &entity(),
                target_row: &f.row_a,
                opponent_row: Some(&f.row_b),
                container: &f.container,
                candidates: &[mid_a, mid_b],
            },
            &config,
        );
        assert_eq!(chosen, None);
    }

    #[test]
    fn candidate_closer_to_opponent_is_rejected() {
        let config = EngineConfig::default();
        let f = fixture("Liverpool", "Everton");
        f.row_a.set_layout(Rect::new(0.0, 0.0, 200.0, 20.0));
        f.row_b.set_layout(Rect::new(0.0, 100.0, 200.0, 20.0));
        let only = elem("div");
        f.container.append_child(&only);

        let near_opponent = candidate(&only, 4, Some(Rect::new(220.0, 100.0, 20.0, 20.0)));

        let chosen = resolve(
            &PairingInput {
                target: &entity(),
                target_row: &f.row_a,
                opponent_row: Some(&f.row_b),
                container: &f.container,
                candidates: &[near_opponent],
            },
            &config,
        );
        assert_eq!(chosen, None);
    }

    #[test]
    fn geometry_present_never_falls_back_to_text_order() {
        let config = EngineConfig::default();
        // Container text would let the versus fallback pick index 0, but a
        // candidate carries geometry while the target row has none: the
        // distance test cannot run and the resolver must abort, not guess.
        let container = elem("div");
        container.append_child(&NodeHandle::text("Liverpool vs Everton"));
        let target_row = elem("tr");
        let a = elem("div");
        let b = elem("div");
        container.append_child(&a);
        container.append_child(&b);

        let with_rect = candidate(&a, 2, Some(Rect::new(10.0, 10.0, 20.0, 20.0)));
        let without_rect = candidate(&b, 1, None);

        let chosen = resolve(
            &PairingInput {
                target: &entity(),
                target_row: &target_row,
                opponent_row: None,
                container: &container,
                candidates: &[with_rect, without_rect],
            },
            &config,
        );
        assert_eq!(chosen, None);
    }

    #[test]
    fn text_order_assigns_by_versus_side_when_headless() {
        let config = EngineConfig::default();
        let container = elem("div");
        container.append_child(&NodeHandle::text("Liverpool vs Everton 2 1"));
        let target_row = elem("tr");
        let a = elem("span");
        let b = elem("span");
        container.append_child(&a);
        container.append_child(&b);
        let candidates = [candidate(&a, 2, None), candidate(&b, 1, None)];

        let chosen = resolve(
            &PairingInput {
                target: &entity(),
                target_row: &target_row,
                opponent_row: None,
                container: &container,
                candidates: &candidates,
            },
            &config,
        );
        assert_eq!(chosen, Some(0));

        let flipped = elem("div");
        flipped.append_child(&NodeHandle::text("Everton v Liverpool 1 2"));
        let c = elem("span");
        let d = elem("span");
        flipped.append_child(&c);
        flipped.append_child(&d);
        let candidates = [candidate(&c, 1, None), candidate(&d, 2, None)];
        let chosen = resolve(
            &PairingInput {
                target: &entity(),
                target_row: &target_row,
                opponent_row: None,
                container: &flipped,
                candidates: &candidates,
            },
            &config,
        );
        assert_eq!(chosen, Some(1));
    }

    #[test]
    fn target_on_both_sides_of_versus_aborts() {
        let config = EngineConfig::default();
        let container = elem("div");
        container.append_child(&NodeHandle::text("Liverpool vs Liverpool reserves"));
        let target_row = elem("tr");
        let a = elem("span");
        container.append_child(&a);
        let candidates = [candidate(&a, 2, None), candidate(&a, 1, None)];

        let chosen = resolve(
            &PairingInput {
                target: &entity(),
                target_row: &target_row,
                opponent_row: None,
                container: &container,
                candidates: &candidates,
            },
            &config,
        );
        assert_eq!(chosen, None);
    }

    #[test]
    fn row_container_prefers_tr_then_marked_divs() {
        let config = EngineConfig::default();
        let tr = elem("tr");
        let cell = elem("td");
        let text = elem("span");
        tr.append_child(&cell);
        cell.append_child(&text);
        assert!(row_container(&text, &config).unwrap().ptr_eq(&tr));

        let div = elem("div");
        div.set_attr("class", "L5Kkcd");
        let inner = elem("span");
        div.append_child(&inner);
        assert!(row_container(&inner, &config).unwrap().ptr_eq(&div));

        let plain = elem("div");
        let orphan = elem("span");
        plain.append_child(&orphan);
        assert!(row_container(&orphan, &config).is_none());
    }
}
