//! Structural rewrite operations.
//!
//! Small tree-editing primitives built on the classifier's roles. Each
//! operation either succeeds or returns an [`OpError`] the pipeline
//! catches and skips; a failed edit is never fatal, and the tracker is
//! only marked on success so a later pass may retry.

use thiserror::Error;

use crate::config::{IndicatorSpec, StatLine};
use crate::dom::classify::{Classifier, Role};
use crate::dom::NodeHandle;

#[derive(Debug, Error)]
pub enum OpError {
    #[error("node is detached from the host tree")]
    Detached,
    #[error("expected a text node")]
    NotTextNode,
    #[error("no numeric text run found in cell")]
    MissingNumericRun,
    #[error("no matching indicator in donor row")]
    MissingIndicator,
    #[error("target row has no cell at index {0}")]
    MissingCell(usize),
    #[error("no matches-played cell found in row")]
    MissingCounterCell,
}

const CELL_TAGS: &[&str] = &["td", "th"];

/// Cells of a row, in document order.
pub fn row_cells(row: &NodeHandle) -> Vec<NodeHandle> {
    row.find_all(|n| n.is_element() && CELL_TAGS.contains(&n.data().tag.as_str()))
}

/// Swap a text node's payload in place. With `emphasis`, the text node is
/// replaced by a single `strong` element carrying the new text, the one
/// structural change rewriting is allowed to make. Sibling structure and
/// unrelated attributes are never touched.
pub fn replace_text(node: &NodeHandle, new_text: &str, emphasis: bool) -> Result<(), OpError> {
    if !node.is_text() {
        return Err(OpError::NotTextNode);
    }
    if !emphasis {
        node.set_text(new_text);
        return Ok(());
    }
    if node.parent().is_none() {
        return Err(OpError::Detached);
    }
    let wrapper = NodeHandle::element("strong", Default::default());
    wrapper.append_child(&NodeHandle::text(new_text));
    if !node.replace_with(&wrapper) {
        return Err(OpError::Detached);
    }
    Ok(())
}

/// Detach `row` and reinsert it immediately before the sibling currently
/// at `target_index`. If that anchor is gone (or the index is stale), the
/// row goes to the start of the sibling list instead.
pub fn move_row_to_rank(row: &NodeHandle, target_index: usize) -> Result<(), OpError> {
    let parent = row.parent().ok_or(OpError::Detached)?;
    let anchor = parent
        .children()
        .get(target_index)
        .filter(|a| !a.ptr_eq(row))
        .cloned();

    row.detach();
    match anchor.and_then(|a| a.index_in_parent().map(|i| (a, i))) {
        Some((_, index)) => parent.insert_child(index, row),
        None => parent.insert_child(0, row),
    }
    Ok(())
}

/// Locate the donor's decorative element, compute its cell-relative
/// position, and clone it into the target row's cell at the equivalent
/// slot, replacing whatever occupied it. Returns `false` (without
/// cloning) when the target already carries an equivalent indicator.
pub fn clone_indicator(
    donor_row: &NodeHandle,
    target_row: &NodeHandle,
    spec: &IndicatorSpec,
) -> Result<bool, OpError> {
    if target_row
        .find_first(|n| spec.matches(n))
        .is_some()
    {
        return Ok(false);
    }

    let indicator = donor_row
        .find_first(|n| spec.matches(n))
        .ok_or(OpError::MissingIndicator)?;

    let donor_cells = row_cells(donor_row);
    let cell_index = donor_cells
        .iter()
        .position(|cell| indicator.is_within(cell))
        .ok_or(OpError::MissingIndicator)?;

    let target_cells = row_cells(target_row);
    let target_cell = target_cells
        .get(cell_index)
        .ok_or(OpError::MissingCell(cell_index))?;

    // The slot is the indicator's top-level container within the donor
    // cell; replicate the clone at the same child index.
    let donor_cell = &donor_cells[cell_index];
    let slot = donor_cell
        .children()
        .into_iter()
        .position(|child| indicator.is_within(&child))
        .unwrap_or(0);

    let clone = indicator.deep_clone();
    let existing = target_cell.children();
    if let Some(occupant) = existing.get(slot) {
        occupant.replace_with(&clone);
    } else {
        target_cell.insert_child(slot, &clone);
    }
    Ok(true)
}

/// Strip winner markers from a fixture container. A marker whose
/// enclosing cell holds nothing else takes the cell with it; a cell that
/// also carries text (the score) keeps everything but the marker. Returns
/// the number of markers removed.
pub fn remove_indicators(container: &NodeHandle, classifier: &Classifier) -> usize {
    let markers = container.find_all(|n| {
        matches!(
            classifier.classify(n),
            Role::DecorativeIndicator { .. }
        )
    });
    let mut removed = 0;
    for marker in markers {
        let enclosing_cell = marker
            .ancestors()
            .into_iter()
            .find(|a| a.is_element() && CELL_TAGS.contains(&a.data().tag.as_str()));
        let marker_only = |cell: &NodeHandle| {
            cell.collect_text().trim().is_empty()
                || (cell.child_count() == 1 && cell.children()[0].ptr_eq(&marker))
        };
        match enclosing_cell {
            Some(cell) if marker_only(&cell) => cell.detach(),
            _ => marker.detach(),
        }
        removed += 1;
    }
    removed
}

/// Write `value` into the innermost numeric text run of `cell`, leaving
/// the wrapping structure (and its styling hooks) untouched.
pub fn set_numeric_cell(cell: &NodeHandle, value: u32) -> Result<(), OpError> {
    let numeric_run = cell
        .find_first(|n| n.is_text() && is_small_integer(n.own_text().trim()))
        .ok_or(OpError::MissingNumericRun)?;
    numeric_run.set_text(value.to_string());
    Ok(())
}

/// Assign rank 1 to `pinned` and 2..=N to the remaining rows in their
/// current order, writing each numeral into the row's rank cell only.
/// Rows with no recognizable rank cell are skipped without consuming a
/// rank, so the written sequence stays contiguous. Returns how many rows
/// were renumbered.
pub fn renumber_rows(rows: &[NodeHandle], pinned: &NodeHandle) -> usize {
    let mut next_rank = 2u32;
    let mut updated = 0;
    for row in rows {
        if row.ptr_eq(pinned) {
            match update_rank_in_row(row, 1) {
                Ok(()) => updated += 1,
                Err(err) => log::debug!("renumber skipped the pinned row: {err}"),
            }
            continue;
        }
        match update_rank_in_row(row, next_rank) {
            Ok(()) => {
                next_rank += 1;
                updated += 1;
            }
            Err(err) => log::debug!("renumber skipped a row: {err}"),
        }
    }
    updated
}

fn update_rank_in_row(row: &NodeHandle, rank: u32) -> Result<(), OpError> {
    for cell in row_cells(row) {
        if set_numeric_cell(&cell, rank).is_ok() {
            return Ok(());
        }
    }
    Err(OpError::MissingNumericRun)
}

/// Rewrite a row's stat cells from fixed offsets relative to its
/// matches-played cell. Cells past the end of the row are skipped.
pub fn apply_stat_line(
    row: &NodeHandle,
    stat_line: &StatLine,
    counter_max: u32,
) -> Result<usize, OpError> {
    let cells = row_cells(row);
    let (mp_index, mp_value) =
        find_matches_played(&cells, counter_max).ok_or(OpError::MissingCounterCell)?;

    let mut updated = 0;
    for (offset, value) in stat_line.offsets() {
        let Some(cell) = cells.get(mp_index + offset) else {
            continue;
        };
        match set_numeric_cell(cell, value.resolve(mp_value)) {
            Ok(()) => updated += 1,
            Err(err) => log::debug!("stat cell at offset {offset} skipped: {err}"),
        }
    }
    Ok(updated)
}

/// The matches-played cell. The host renders a hidden leading cell and
/// the rank before it, so the scan starts past both; the rank column is
/// never a valid hit.
fn find_matches_played(cells: &[NodeHandle], counter_max: u32) -> Option<(usize, u32)> {
    let readable = |i: usize| -> Option<u32> {
        let cell = cells.get(i)?;
        if cell.attr("aria-hidden").is_some() {
            return None;
        }
        let text = cell.collect_text();
        let trimmed = text.trim();
        if !is_small_integer(trimmed) {
            return None;
        }
        let value: u32 = trimmed.parse().ok()?;
        (value <= counter_max).then_some(value)
    };

    (2..cells.len()).find_map(|i| readable(i).map(|v| (i, v)))
}

fn is_small_integer(text: &str) -> bool {
    !text.is_empty() && text.len() <= 2 && text.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, StatValue};
    use crate::dom::classify::Classifier;
    use crate::dom::parser::parse_html;
    use crate::dom::NodeHandle;
    use std::collections::HashMap;

    fn elem(tag: &str) -> NodeHandle {
        NodeHandle::element(tag, HashMap::new())
    }

    fn row_with_cells(texts: &[&str]) -> NodeHandle {
        let row = elem("tr");
        for t in texts {
            let cell = elem("td");
            if !t.is_empty() {
                cell.append_child(&NodeHandle::text(*t));
            }
            row.append_child(&cell);
        }
        row
    }

    #[test]
    fn replace_text_in_place_keeps_siblings() {
        let cell = elem("td");
        let before = elem("span");
        let text = NodeHandle::text("Tottenham");
        let after = elem("span");
        cell.append_child(&before);
        cell.append_child(&text);
        cell.append_child(&after);

        replace_text(&text, "King of London", false).unwrap();
        assert_eq!(cell.child_count(), 3);
        assert_eq!(text.own_text(), "King of London");
    }

    #[test]
    fn replace_text_with_emphasis_wraps_once() {
        let cell = elem("td");
        let text = NodeHandle::text("3");
        cell.append_child(&text);

        replace_text(&text, "10", true).unwrap();
        let children = cell.children();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].tag(), "strong");
        assert_eq!(children[0].collect_text(), "10");
    }

    #[test]
    fn replace_text_rejects_elements() {
        let div = elem("div");
        assert!(matches!(
            replace_text(&div, "x", false),
            Err(OpError::NotTextNode)
        ));
    }

    #[test]
    fn emphasis_on_detached_text_fails_cleanly() {
        let loose = NodeHandle::text("3");
        assert!(matches!(
            replace_text(&loose, "10", true),
            Err(OpError::Detached)
        ));
    }

    #[test]
    fn move_row_to_front() {
        let tbody = elem("tbody");
        let rows: Vec<NodeHandle> = (0..4).map(|_| elem("tr")).collect();
        for row in &rows {
            tbody.append_child(row);
        }

        move_row_to_rank(&rows[3], 0).unwrap();
        let order = tbody.children();
        assert!(order[0].ptr_eq(&rows[3]));
        assert!(order[1].ptr_eq(&rows[0]));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn move_row_falls_back_to_start_on_stale_anchor() {
        let tbody = elem("tbody");
        let a = elem("tr");
        let b = elem("tr");
        tbody.append_child(&a);
        tbody.append_child(&b);

        // Target index past the end: anchor missing, row goes first.
        move_row_to_rank(&b, 7).unwrap();
        assert!(tbody.children()[0].ptr_eq(&b));
    }

    #[test]
    fn detached_row_cannot_move() {
        let loose = elem("tr");
        assert!(matches!(
            move_row_to_rank(&loose, 0),
            Err(OpError::Detached)
        ));
    }

    fn banner_spec() -> IndicatorSpec {
        IndicatorSpec {
            class_contains: Some("Xne9qe".into()),
            style_contains: None,
            text_contains: Some("Champions League".into()),
        }
    }

    fn row_with_banner() -> NodeHandle {
        let row = row_with_cells(&["1", "Arsenal", "12"]);
        let banner = elem("div");
        banner.set_attr("class", "Xne9qe");
        banner.append_child(&NodeHandle::text("UEFA Champions League"));
        row.children()[1].append_child(&banner);
        row
    }

    #[test]
    fn clone_indicator_lands_in_equivalent_cell() {
        let donor = row_with_banner();
        let target = row_with_cells(&["5", "Tottenham", "12"]);

        let cloned = clone_indicator(&donor, &target, &banner_spec()).unwrap();
        assert!(cloned);
        let target_cell = &row_cells(&target)[1];
        assert!(target_cell
            .find_first(|n| banner_spec().matches(n))
            .is_some());
        // Donor keeps its own banner.
        assert!(donor.find_first(|n| banner_spec().matches(n)).is_some());
    }

    #[test]
    fn clone_indicator_is_a_no_op_when_already_present() {
        let donor = row_with_banner();
        let target = row_with_banner();
        let cloned = clone_indicator(&donor, &target, &banner_spec()).unwrap();
        assert!(!cloned);
        // Still exactly one banner in the target.
        assert_eq!(target.find_all(|n| banner_spec().matches(n)).len(), 1);
    }

    #[test]
    fn clone_indicator_without_donor_marker_errors() {
        let donor = row_with_cells(&["1", "Arsenal", "12"]);
        let target = row_with_cells(&["5", "Tottenham", "12"]);
        assert!(matches!(
            clone_indicator(&donor, &target, &banner_spec()),
            Err(OpError::MissingIndicator)
        ));
    }

    #[test]
    fn remove_indicators_takes_empty_cells_with_them() {
        let html = r#"<html><body><table>
            <tr><td>Liverpool</td><td><svg class="imspo_mt_triangle"></svg></td><td>2</td></tr>
        </table></body></html>"#;
        let tree = parse_html(html);
        let classifier = Classifier::new(&EngineConfig::default()).unwrap();
        let row = tree
            .root
            .find_first(|n| n.is_element() && n.data().tag == "tr")
            .unwrap();

        assert_eq!(remove_indicators(&row, &classifier), 1);
        // Marker-only cell removed entirely.
        assert_eq!(row_cells(&row).len(), 2);
    }

    #[test]
    fn marker_sharing_a_cell_with_the_score_leaves_the_score() {
        let html = r#"<html><body><table>
            <tr><td>Everton</td><td><span>2<svg class="imspo_mt_triangle"></svg></span></td></tr>
        </table></body></html>"#;
        let tree = parse_html(html);
        let classifier = Classifier::new(&EngineConfig::default()).unwrap();
        let row = tree
            .root
            .find_first(|n| n.is_element() && n.data().tag == "tr")
            .unwrap();

        assert_eq!(remove_indicators(&row, &classifier), 1);
        // Only the marker goes; the cell and its score survive.
        assert_eq!(row_cells(&row).len(), 2);
        assert!(row.collect_text().contains('2'));
        assert!(row
            .find_first(|n| n.is_element() && n.data().tag == "svg")
            .is_none());
    }

    #[test]
    fn set_numeric_cell_updates_innermost_run_only() {
        let cell = elem("td");
        let wrapper = elem("div");
        wrapper.set_attr("class", "iU5t0d");
        wrapper.append_child(&NodeHandle::text("6"));
        cell.append_child(&wrapper);

        set_numeric_cell(&cell, 1).unwrap();
        assert_eq!(wrapper.collect_text(), "1");
        assert_eq!(wrapper.attr("class").as_deref(), Some("iU5t0d"));
        assert_eq!(cell.child_count(), 1);
    }

    #[test]
    fn renumber_pins_target_first_and_stays_contiguous() {
        let rows: Vec<NodeHandle> = (1..=5)
            .map(|i| row_with_cells(&[&i.to_string(), "Club", "12"]))
            .collect();
        // Pinned row currently shows rank 4 and sits first.
        let mut ordered = vec![rows[3].clone()];
        ordered.extend(rows.iter().enumerate().filter_map(|(i, r)| {
            (i != 3).then_some(r.clone())
        }));

        let updated = renumber_rows(&ordered, &rows[3]);
        assert_eq!(updated, 5);
        let ranks: Vec<String> = ordered
            .iter()
            .map(|r| row_cells(r)[0].collect_text().trim().to_string())
            .collect();
        assert_eq!(ranks, vec!["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn stat_line_rewrites_offsets_from_matches_played() {
        // Columns: (hidden), rank, MP, W, D, L, GF, GA, GD, Pts
        let row = row_with_cells(&["", "6", "12", "5", "4", "3", "20", "15", "5", "19"]);
        row_cells(&row)[0].set_attr("aria-hidden", "true");

        let updated = apply_stat_line(&row, &StatLine::perfect(), 38).unwrap();
        assert_eq!(updated, 7);
        let texts: Vec<String> = row_cells(&row)
            .iter()
            .map(|c| c.collect_text().trim().to_string())
            .collect();
        // MP untouched, W = MP, D = L = 0, Pts = 3 * MP.
        assert_eq!(
            texts[1..],
            ["6", "12", "12", "0", "0", "100", "0", "100", "36"]
        );
    }

    #[test]
    fn stat_line_with_custom_values() {
        let row = row_with_cells(&["", "1", "10", "9", "1", "0", "30", "5", "25", "28"]);
        let line = StatLine {
            wins: StatValue::Fixed(0),
            draws: StatValue::Fixed(0),
            losses: StatValue::Matches,
            goals_for: StatValue::Fixed(0),
            goals_against: StatValue::Fixed(99),
            goal_diff: StatValue::Fixed(0),
            points: StatValue::PerMatch(0),
        };
        apply_stat_line(&row, &line, 38).unwrap();
        let texts: Vec<String> = row_cells(&row)
            .iter()
            .map(|c| c.collect_text().trim().to_string())
            .collect();
        assert_eq!(texts[3..], ["0", "0", "10", "0", "99", "0", "0"]);
    }

    #[test]
    fn stat_line_requires_a_counter_cell() {
        let row = row_with_cells(&["Club only", "no numbers here"]);
        assert!(matches!(
            apply_stat_line(&row, &StatLine::perfect(), 38),
            Err(OpError::MissingCounterCell)
        ));
    }

    #[test]
    fn rank_cell_is_never_read_as_matches_played() {
        // Rank at index 1 is numeric but the counter columns hold text:
        // the scan must fail rather than misread the rank.
        let row = row_with_cells(&["", "7", "Club", "WWDLW"]);
        assert!(matches!(
            apply_stat_line(&row, &StatLine::perfect(), 38),
            Err(OpError::MissingCounterCell)
        ));
        assert_eq!(row_cells(&row)[1].collect_text(), "7");
    }

    #[test]
    fn unnumberable_row_does_not_gap_the_rank_sequence() {
        let pinned = row_with_cells(&["4", "Tottenham", "12"]);
        let no_rank_cell = row_with_cells(&["Advert"]);
        let trailing = row_with_cells(&["2", "Chelsea", "12"]);
        let rows = vec![pinned.clone(), no_rank_cell, trailing.clone()];

        assert_eq!(renumber_rows(&rows, &pinned), 2);
        assert_eq!(row_cells(&pinned)[0].collect_text(), "1");
        assert_eq!(row_cells(&trailing)[0].collect_text(), "2");
    }
}
