//! The rewrite pass and its orchestration.
//!
//! [`RewriteEngine::pass`] runs the four stages over a snapshot of the
//! tree: text rewriting, fixture score boosting, standings-row promotion,
//! and the stat-line rewrite. Stages are independent; a stage that finds
//! nothing to do (or fails a precondition) leaves the tree untouched and
//! the later stages still run. [`Orchestrator`] wraps the engine with the
//! debounced scheduler and the user-facing enable switch.

use std::time::Instant;

use thiserror::Error;

use crate::config::{EngineConfig, RewritePlan};
use crate::dom::classify::{Classifier, Role};
use crate::dom::{DomTree, NodeHandle};
use crate::engine::ops;
use crate::engine::pairing::{self, PairingInput, ScoreCandidate};
use crate::engine::scheduler::{MutationBatch, Scheduler};
use crate::engine::tracker::ProcessedSet;
use crate::rewrite::{RewriteError, RuleSet};
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    #[error("classifier pattern failed to compile: {0}")]
    Classifier(#[from] regex::Error),
}

/// What one pass actually changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub text_rewrites: usize,
    pub scores_boosted: usize,
    pub indicators_removed: usize,
    pub rows_promoted: usize,
    pub rows_renumbered: usize,
    pub stat_cells_updated: usize,
}

impl PassStats {
    pub fn changed_anything(&self) -> bool {
        *self != PassStats::default()
    }
}

pub struct RewriteEngine {
    config: EngineConfig,
    plan: RewritePlan,
    classifier: Classifier,
    rules: RuleSet,
    tracker: ProcessedSet,
}

impl RewriteEngine {
    pub fn new(config: EngineConfig, plan: RewritePlan) -> Result<Self, EngineError> {
        let classifier = Classifier::new(&config)?;
        let rules = RuleSet::compile(&plan.rules)?;
        Ok(Self {
            config,
            plan,
            classifier,
            rules,
            tracker: ProcessedSet::new(),
        })
    }

    /// Run one full pass over the tree. Already-processed nodes are
    /// skipped, so calling this repeatedly on a stable tree settles after
    /// the first pass.
    pub fn pass(&mut self, tree: &DomTree) -> PassStats {
        let scope = tree.body().unwrap_or_else(|| tree.root.clone());
        let mut stats = PassStats::default();

        self.rewrite_text(&scope, &mut stats);
        if self.plan.boosted_score.is_some() {
            self.boost_fixtures(&scope, &mut stats);
        }
        if self.plan.promote_target {
            self.promote_standings(&scope, &mut stats);
        }

        self.tracker.compact();
        log::debug!(
            "pass done: {} text rewrites, {} scores, {} rows promoted",
            stats.text_rewrites,
            stats.scores_boosted,
            stats.rows_promoted
        );
        stats
    }

    pub fn reset(&mut self) {
        self.tracker.reset();
    }

    /// Stage 1: apply the text rules to every eligible text run.
    fn rewrite_text(&mut self, scope: &NodeHandle, stats: &mut PassStats) {
        if self.rules.is_empty() {
            return;
        }
        for node in scope.find_all(|n| n.is_text()) {
            if self.tracker.is_marked(&node) || self.classifier.is_excluded(&node) {
                continue;
            }
            let original = node.own_text();
            if original.trim().is_empty() {
                continue;
            }
            let (rewritten, changed) = self.rules.apply(&original);
            if !changed {
                continue;
            }
            if ops::replace_text(&node, &rewritten, false).is_ok() {
                self.tracker.mark(&node);
                stats.text_rewrites += 1;
            }
        }
    }

    /// Stage 2: find head-to-head fixture containers and rewrite the
    /// target's score. A container where pairing cannot produce a unique
    /// confident answer is left alone entirely.
    fn boost_fixtures(&mut self, scope: &NodeHandle, stats: &mut PassStats) {
        let Some(boosted) = self.plan.boosted_score else {
            return;
        };
        for container in self.fixture_containers(scope) {
            if self.tracker.is_marked(&container) {
                continue;
            }
            let Some((target_row, opponent_row)) = self.fixture_rows(&container) else {
                continue;
            };
            let candidates = self.score_candidates(&container);
            let input = PairingInput {
                target: &self.plan.target,
                target_row: &target_row,
                opponent_row: opponent_row.as_ref(),
                container: &container,
                candidates: &candidates,
            };
            let Some(chosen) = pairing::resolve(&input, &self.config) else {
                log::debug!("fixture skipped: no confident score pairing");
                continue;
            };

            match boost_score_cell(&candidates[chosen].node, boosted) {
                Ok(()) => stats.scores_boosted += 1,
                Err(err) => {
                    log::debug!("score boost failed: {err}");
                    continue;
                }
            }
            stats.indicators_removed += ops::remove_indicators(&container, &self.classifier);
            self.tracker.mark(&container);
        }
    }

    /// Stage 3 (and 4): promote the target's row in every standings table,
    /// renumber ranks, and rewrite the stat line.
    fn promote_standings(&mut self, scope: &NodeHandle, stats: &mut PassStats) {
        let tables = scope.find_all(|n| {
            matches!(
                self.classifier.classify(n),
                Role::AggregateTable { .. }
            )
        });
        for table in tables {
            if self.tracker.is_marked(&table) {
                continue;
            }
            self.promote_in_table(&table, stats);
        }
    }

    fn promote_in_table(&mut self, table: &NodeHandle, stats: &mut PassStats) {
        let rows = self.entity_rows(table);
        let Some(target_row) = rows
            .iter()
            .find(|row| self.row_names_target(row))
            .cloned()
        else {
            return;
        };

        if let Some(spec) = self.plan.donor_indicator.clone() {
            let donor = rows
                .iter()
                .find(|row| !row.ptr_eq(&target_row) && row.find_first(|n| spec.matches(n)).is_some());
            match donor {
                Some(donor) => match ops::clone_indicator(donor, &target_row, &spec) {
                    Ok(_) => {}
                    Err(err) => log::debug!("indicator clone failed: {err}"),
                },
                None => log::warn!("no row carries the donor indicator; skipping clone"),
            }
        }

        // Move the target above the current top entity row, provided both
        // share a parent (split tbodies would make the index meaningless).
        let top = &rows[0];
        if !top.ptr_eq(&target_row) {
            let same_parent = target_row
                .parent()
                .zip(top.parent())
                .is_some_and(|(a, b)| a.ptr_eq(&b));
            if let Some(anchor_index) = top.index_in_parent().filter(|_| same_parent) {
                match ops::move_row_to_rank(&target_row, anchor_index) {
                    Ok(()) => stats.rows_promoted += 1,
                    Err(err) => {
                        log::debug!("row promotion failed: {err}");
                        return;
                    }
                }
            }
        }

        // Rank numerals follow the new document order.
        let reordered = self.entity_rows(table);
        stats.rows_renumbered += ops::renumber_rows(&reordered, &target_row);

        if let Some(line) = self.plan.stat_line.clone() {
            match ops::apply_stat_line(&target_row, &line, self.config.counter_max) {
                Ok(updated) => stats.stat_cells_updated += updated,
                Err(err) => log::debug!("stat line skipped: {err}"),
            }
        }

        self.tracker.mark(table);
    }

    /// Outermost elements whose class carries a fixture marker, outside
    /// any standings table.
    fn fixture_containers(&self, scope: &NodeHandle) -> Vec<NodeHandle> {
        let matches_marker = |node: &NodeHandle| {
            node.is_element()
                && node.attr("class").is_some_and(|class| {
                    let class = class.to_lowercase();
                    self.config
                        .fixture_class_markers
                        .iter()
                        .any(|marker| class.contains(marker.as_str()))
                })
        };
        let all = scope.find_all(|n| {
            matches_marker(n) && self.classifier.enclosing_aggregate_table(n).is_none()
        });
        all.iter()
            .filter(|candidate| {
                !all.iter()
                    .any(|other| !other.ptr_eq(candidate) && candidate.is_within(other))
            })
            .cloned()
            .collect()
    }

    /// The target's row inside a fixture container, plus the first other
    /// row as the opponent.
    fn fixture_rows(&self, container: &NodeHandle) -> Option<(NodeHandle, Option<NodeHandle>)> {
        let rows = container.find_all(|n| {
            if !n.is_element() {
                return false;
            }
            let tag = n.tag();
            if tag == "tr" {
                return true;
            }
            tag == "div"
                && n.attr("class").is_some_and(|class| {
                    self.config
                        .row_class_markers
                        .iter()
                        .any(|marker| class.contains(marker.as_str()))
                })
        });
        let target_row = rows.iter().find(|row| self.row_names_target(row))?.clone();
        let opponent_row = rows
            .iter()
            .find(|row| !row.ptr_eq(&target_row) && !self.row_names_target(row))
            .cloned();
        Some((target_row, opponent_row))
    }

    /// Whether a row belongs to the target. Runs of prose that merely
    /// mention the target are rejected by the label-length cap; a row's
    /// identifying text is short.
    fn row_names_target(&self, row: &NodeHandle) -> bool {
        if let Some(label) = row.attr("aria-label") {
            if label.len() < self.config.max_label_len && self.plan.target.matches_text(&label) {
                return true;
            }
        }
        let text = row.collect_text();
        text.len() < self.config.max_label_len && self.plan.target.matches_text(&text)
    }

    fn entity_rows(&self, table: &NodeHandle) -> Vec<NodeHandle> {
        table.find_all(|n| matches!(self.classifier.classify(n), Role::EntityRow { .. }))
    }

    /// Candidate score cells in a container, nearest the top of the page
    /// first where geometry exists, document order otherwise. A wrapper
    /// and its inner element both classify when the score is nested, so
    /// only the innermost of any ancestor chain is kept.
    fn score_candidates(&self, container: &NodeHandle) -> Vec<ScoreCandidate> {
        let all: Vec<ScoreCandidate> = container
            .descendants()
            .into_iter()
            .filter_map(|node| match self.classifier.classify(&node) {
                Role::PairedValueCell { value, position } => Some(ScoreCandidate {
                    node,
                    value,
                    position,
                }),
                _ => None,
            })
            .collect();
        let mut candidates: Vec<ScoreCandidate> = all
            .iter()
            .filter(|c| {
                !all.iter()
                    .any(|inner| !inner.node.ptr_eq(&c.node) && inner.node.is_within(&c.node))
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| match (a.position, b.position) {
            (Some(pa), Some(pb)) => pa.y.total_cmp(&pb.y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        candidates
    }
}

/// Replace a score cell's numeric run with the boosted value, bolded.
fn boost_score_cell(cell: &NodeHandle, value: u32) -> Result<(), ops::OpError> {
    let run = cell
        .find_first(|n| {
            n.is_text() && {
                let text = n.own_text();
                let trimmed = text.trim();
                !trimmed.is_empty()
                    && trimmed.len() <= 2
                    && trimmed.chars().all(|c| c.is_ascii_digit())
            }
        })
        .ok_or(ops::OpError::MissingNumericRun)?;
    ops::replace_text(&run, &value.to_string(), true)
}

/// The engine plus its scheduling and the user-facing switch: the full
/// lifecycle a host embeds.
pub struct Orchestrator {
    engine: RewriteEngine,
    scheduler: Scheduler,
    enabled: bool,
}

impl Orchestrator {
    pub fn new(engine: RewriteEngine) -> Self {
        let scheduler = Scheduler::new(engine.config.debounce);
        Self {
            engine,
            scheduler,
            enabled: false,
        }
    }

    /// Arm the first pass. Nothing runs before the settle delay elapses,
    /// and nothing ever runs when settings disable the engine.
    pub fn start(&mut self, now: Instant, settings: &Settings) {
        self.enabled = settings.enabled();
        if !self.enabled {
            log::info!("rewriting disabled by settings");
            return;
        }
        self.scheduler.schedule_at(now + self.engine.config.settle_delay);
    }

    /// Feed a host mutation report into the scheduler.
    pub fn on_mutations(&mut self, batch: &MutationBatch, now: Instant) {
        if self.enabled {
            self.scheduler.notify(batch, now);
        }
    }

    /// Run a pass if one is due. The host calls this from its main loop.
    pub fn tick(&mut self, tree: &DomTree, now: Instant) -> Option<PassStats> {
        if !self.enabled || !self.scheduler.poll(now) {
            return None;
        }
        let stats = self.engine.pass(tree);
        self.scheduler.complete(now);
        Some(stats)
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.scheduler.reset();
        self.enabled = false;
    }
}
