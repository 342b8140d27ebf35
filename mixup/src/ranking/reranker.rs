//! Windowed grouping re-ranker
//!
//! Interleaves the top of a result list across a grouping key (seller,
//! company, domain, ...) while keeping score order inside each group.
//!
//! Given a score-descending list, the re-ranker works on the first
//! `window_size` hits only:
//!
//! ```text
//! resolve group keys → sort by (group, score) → assign positions
//!     → score *= decline(position) → sort by score → reconcile tail
//! ```
//!
//! Hits after the window keep their order; their scores are shifted down
//! when needed so the whole list stays score-descending.

use crate::candidate::{score_order, Candidate, FieldValues, GroupKey};
use crate::config::RerankConfig;
use crate::error::Error;
use crate::metrics;
use crate::ranking::decline::DeclineInput;
use crate::ranking::resolver::FieldResolver;
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Summary of one re-rank call
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RerankStats {
    /// Number of hits that were rescored
    pub window: usize,
    /// Number of distinct groups inside the window
    pub groups: usize,
    /// Window hits without a group value
    pub ungrouped: usize,
    /// Amount subtracted from every tail score, if a shift was needed
    pub tail_shift: Option<f32>,
}

/// Per-hit working state for the current window
#[derive(Debug)]
struct WindowEntry {
    /// Index into the window slice
    index: usize,
    key: GroupKey,
    position: usize,
    fields: FieldValues,
}

/// Re-ranks candidate lists according to a compiled [`RerankConfig`].
pub struct GroupingReranker<'a> {
    config: &'a RerankConfig,
}

impl<'a> GroupingReranker<'a> {
    pub fn new(config: &'a RerankConfig) -> Self {
        Self { config }
    }

    /// Re-rank `hits` in place.
    ///
    /// On error `hits` is left exactly as it was passed in.
    pub fn rerank(
        &self,
        hits: &mut [Candidate],
        resolver: &dyn FieldResolver,
    ) -> Result<RerankStats> {
        let window = self.config.effective_window(hits.len());
        if window == 0 {
            return Ok(RerankStats::default());
        }

        let start = Instant::now();
        match self.rerank_window(hits, window, resolver) {
            Ok(stats) => {
                metrics::record_rerank(&stats, start.elapsed());
                debug!(
                    "Re-ranked window of {} hits ({} groups, {} ungrouped, {} total), tail shift {:?}",
                    stats.window,
                    stats.groups,
                    stats.ungrouped,
                    hits.len(),
                    stats.tail_shift
                );
                Ok(stats)
            }
            Err(e) => {
                metrics::record_rerank_error(e.error_type());
                Err(e)
            }
        }
    }

    fn rerank_window(
        &self,
        hits: &mut [Candidate],
        window: usize,
        resolver: &dyn FieldResolver,
    ) -> Result<RerankStats> {
        let mut entries = self.resolve_window(&hits[..window], resolver)?;

        group_sort(&mut entries, hits);
        let groups = assign_positions(&mut entries);
        let ungrouped = entries.iter().filter(|e| e.key.is_absent()).count();

        // Every multiplier is computed before the first score is written.
        let mut new_scores = vec![0.0_f32; window];
        for entry in &entries {
            let hit = &hits[entry.index];
            let multiplier = self.config.decline.multiplier(&DeclineInput {
                position: entry.position,
                score: hit.score,
                fields: &entry.fields,
            })?;
            if !multiplier.is_finite() || multiplier < 0.0 {
                return Err(Error::Config(format!(
                    "Decline function [{}] returned {} for hit '{}' at position {} of group {}",
                    self.config.decline.name(),
                    multiplier,
                    hit.id,
                    entry.position,
                    entry.key
                )));
            }
            let score = hit.score * multiplier as f32;
            if !score.is_finite() {
                return Err(Error::Config(format!(
                    "Rescored value for hit '{}' is not finite",
                    hit.id
                )));
            }
            new_scores[entry.index] = score;
        }

        for (hit, score) in hits[..window].iter_mut().zip(new_scores) {
            hit.score = score;
        }
        hits[..window].sort_by(score_order);

        Ok(RerankStats {
            window,
            groups,
            ungrouped,
            tail_shift: reconcile_tail(hits, window),
        })
    }

    fn resolve_window(
        &self,
        window: &[Candidate],
        resolver: &dyn FieldResolver,
    ) -> Result<Vec<WindowEntry>> {
        let required = self.config.decline.required_fields();

        window
            .iter()
            .enumerate()
            .map(|(index, hit)| {
                let group_values = resolver.resolve(hit, &self.config.group_field)?;
                let key = GroupKey::from_values(group_values.as_deref());

                let mut fields = FieldValues::new();
                for name in &self.config.fields {
                    if let Some(values) = resolver.resolve(hit, name)? {
                        fields.insert(name.clone(), values);
                    }
                }
                if let Some(missing) = required.iter().find(|f| !fields.contains_key(*f)) {
                    return Err(Error::FieldResolution(format!(
                        "Field '{}' required by decline function [{}] is missing on hit '{}'",
                        missing,
                        self.config.decline.name(),
                        hit.id
                    )));
                }

                Ok(WindowEntry {
                    index,
                    key,
                    position: 0,
                    fields,
                })
            })
            .collect()
    }
}

/// Stable sort of the window by group key, then score order inside each group
fn group_sort(entries: &mut [WindowEntry], hits: &[Candidate]) {
    entries.sort_by(|a, b| {
        a.key
            .cmp(&b.key)
            .then_with(|| score_order(&hits[a.index], &hits[b.index]))
    });
}

/// Walk a group-sorted window and number the members of each group 0, 1, 2, ...
///
/// Returns the number of distinct groups.
fn assign_positions(entries: &mut [WindowEntry]) -> usize {
    let mut seen: HashMap<GroupKey, usize> = HashMap::new();
    for entry in entries.iter_mut() {
        let count = seen.entry(entry.key.clone()).or_insert(0);
        entry.position = *count;
        *count += 1;
    }
    seen.len()
}

/// Shift tail scores down when the best tail hit outranks the worst rescored one.
///
/// The shift preserves the tail's internal order and is only applied when
/// there is an actual violation.
fn reconcile_tail(hits: &mut [Candidate], window: usize) -> Option<f32> {
    if hits.len() <= window {
        return None;
    }
    let min_rescored = hits[window - 1].score;
    let max_tail = hits[window].score;
    if max_tail <= min_rescored {
        return None;
    }

    let delta = max_tail as f64 - min_rescored as f64;
    for hit in &mut hits[window..] {
        // min() guards against rounding pushing the boundary hit above the window
        hit.score = ((hit.score as f64 - delta) as f32).min(min_rescored);
    }
    metrics::record_tail_shift();
    Some(delta as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupingMixupConfig;
    use crate::ranking::decline::{DeclineFunction, DeclineRegistry, DeclineSpec};
    use crate::ranking::resolver::StoredFields;
    use serde_json::json;
    use std::sync::Arc;

    fn hit(id: &str, score: f32, group: Option<&str>) -> Candidate {
        let candidate = Candidate::new(id, score);
        match group {
            Some(g) => candidate.with_field("group", g),
            None => candidate,
        }
    }

    fn config(window_size: i64, decline: DeclineSpec) -> RerankConfig {
        GroupingMixupConfig::new("group", decline)
            .with_window_size(window_size)
            .compile(&DeclineRegistry::new())
            .unwrap()
    }

    fn recip(window_size: i64) -> RerankConfig {
        config(window_size, DeclineSpec::new("position_recip"))
    }

    fn ids(hits: &[Candidate]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    fn assert_scores(hits: &[Candidate], expected: &[f32]) {
        assert_eq!(hits.len(), expected.len());
        for (hit, want) in hits.iter().zip(expected) {
            assert!(
                (hit.score - want).abs() < 1e-5,
                "hit {} has score {}, expected {}",
                hit.id,
                hit.score,
                want
            );
        }
    }

    fn entries(keys: &[&str]) -> Vec<WindowEntry> {
        keys.iter()
            .enumerate()
            .map(|(index, key)| WindowEntry {
                index,
                key: GroupKey::from_value(&json!(key)),
                position: 0,
                fields: FieldValues::new(),
            })
            .collect()
    }

    #[test]
    fn test_interleaves_two_groups() {
        let mut hits = vec![
            hit("A", 1.0, Some("G1")),
            hit("B", 0.9, Some("G2")),
            hit("C", 0.8, Some("G1")),
            hit("D", 0.7, Some("G2")),
        ];
        let config = recip(4);
        let stats = GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();

        assert_eq!(ids(&hits), vec!["A", "B", "C", "D"]);
        assert_scores(&hits, &[1.0, 0.9, 0.4, 0.35]);
        assert_eq!(stats.window, 4);
        assert_eq!(stats.groups, 2);
        assert_eq!(stats.tail_shift, None);
    }

    #[test]
    fn test_dominant_group_is_pushed_down() {
        let mut hits = vec![
            hit("a1", 1.0, Some("A")),
            hit("a2", 0.95, Some("A")),
            hit("a3", 0.9, Some("A")),
            hit("b1", 0.6, Some("B")),
        ];
        let config = recip(4);
        GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();

        // a2 -> 0.475, a3 -> 0.3
        assert_eq!(ids(&hits), vec!["a1", "b1", "a2", "a3"]);
        assert_scores(&hits, &[1.0, 0.6, 0.475, 0.3]);
    }

    #[test]
    fn test_window_smaller_than_list() {
        let mut hits = vec![
            hit("A", 1.0, Some("G1")),
            hit("B", 0.9, Some("G2")),
            hit("C", 0.8, Some("G1")),
            hit("D", 0.7, Some("G2")),
        ];
        let config = recip(2);
        let stats = GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();

        assert_eq!(ids(&hits), vec!["A", "B", "C", "D"]);
        assert_scores(&hits, &[1.0, 0.9, 0.8, 0.7]);
        assert_eq!(stats.window, 2);
        assert_eq!(stats.tail_shift, None);
    }

    #[test]
    fn test_tail_shift_on_boundary_violation() {
        let mut hits = vec![
            hit("A", 1.0, Some("G1")),
            hit("B", 0.9, Some("G1")),
            hit("C", 0.85, Some("G2")),
            hit("D", 0.5, Some("G2")),
        ];
        // B drops to 0.45, below the untouched C
        let config = recip(2);
        let stats = GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();

        assert_eq!(ids(&hits), vec!["A", "B", "C", "D"]);
        assert_scores(&hits, &[1.0, 0.45, 0.45, 0.1]);
        assert!(hits[1].score >= hits[2].score);
        let shift = stats.tail_shift.unwrap();
        assert!((shift - 0.4).abs() < 1e-5);
    }

    #[test]
    fn test_no_upward_shift_when_tail_is_below() {
        let mut hits = vec![
            hit("A", 1.0, Some("G1")),
            hit("B", 0.9, Some("G2")),
            hit("C", 0.2, Some("G1")),
        ];
        let config = recip(2);
        let stats = GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();

        // minRescored (0.9) > maxTail (0.2): the tail must not be raised
        assert_scores(&hits, &[1.0, 0.9, 0.2]);
        assert_eq!(stats.tail_shift, None);
    }

    #[test]
    fn test_boundary_tie_keeps_window_first() {
        let mut hits = vec![hit("B", 0.5, Some("G1")), hit("A", 0.5, Some("G2"))];
        let config = recip(1);
        GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();

        assert_eq!(ids(&hits), vec!["B", "A"]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_absent_group_forms_own_group() {
        let mut hits = vec![
            hit("x", 1.0, None),
            hit("y", 0.9, None),
            hit("g", 0.8, Some("G")),
        ];
        let config = recip(3);
        let stats = GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();

        assert_eq!(ids(&hits), vec!["x", "g", "y"]);
        assert_scores(&hits, &[1.0, 0.8, 0.45]);
        assert_eq!(stats.groups, 2);
        assert_eq!(stats.ungrouped, 2);
    }

    #[test]
    fn test_single_group_is_straight_rescore() {
        let mut hits = vec![
            hit("a", 1.0, Some("G")),
            hit("b", 0.9, Some("G")),
            hit("c", 0.8, Some("G")),
        ];
        let config = recip(3);
        GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();

        assert_eq!(ids(&hits), vec!["a", "b", "c"]);
        assert_scores(&hits, &[1.0, 0.45, 0.8 / 3.0]);
    }

    #[test]
    fn test_empty_and_disabled_are_noops() {
        let config = recip(10);
        let mut empty: Vec<Candidate> = Vec::new();
        let stats = GroupingReranker::new(&config)
            .rerank(&mut empty, &StoredFields)
            .unwrap();
        assert_eq!(stats, RerankStats::default());

        for window_size in [0, -5] {
            let original = vec![hit("a", 1.0, Some("G")), hit("b", 0.9, Some("G"))];
            let mut hits = original.clone();
            let config = recip(window_size);
            GroupingReranker::new(&config)
                .rerank(&mut hits, &StoredFields)
                .unwrap();
            assert_eq!(hits, original);
        }
    }

    #[test]
    fn test_equal_scores_tie_break_by_id() {
        let mut hits = vec![
            hit("c", 1.0, Some("G2")),
            hit("a", 1.0, Some("G1")),
            hit("b", 1.0, Some("G3")),
        ];
        let config = recip(3);
        GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();
        assert_eq!(ids(&hits), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_required_field_missing_leaves_hits_untouched() {
        let original = vec![
            hit("a", 1.0, Some("G")).with_field("rank", 2.0),
            hit("b", 0.9, Some("G")),
        ];
        let mut hits = original.clone();
        let config = GroupingMixupConfig::new(
            "group",
            DeclineSpec::expression("rank > 1 ? 1 / (_pos + 1) : 1"),
        )
        .with_fields(["rank"])
        .compile(&DeclineRegistry::new())
        .unwrap();

        let err = GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap_err();
        assert!(matches!(err, Error::FieldResolution(_)));
        assert_eq!(hits, original);
    }

    #[test]
    fn test_non_finite_multiplier_is_config_error() {
        let original = vec![hit("a", 1.0, Some("G")), hit("b", 0.9, Some("G"))];
        let mut hits = original.clone();
        let config = config(10, DeclineSpec::expression("1 / _pos"));

        let err = GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(hits, original);
    }

    #[test]
    fn test_negative_multiplier_is_config_error() {
        let mut hits = vec![hit("a", 1.0, Some("G")), hit("b", 0.9, Some("G"))];
        let config = config(10, DeclineSpec::expression("0.5 - _pos"));

        let err = GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("for hit 'b' at position 1 of group G"));
    }

    #[test]
    fn test_resolver_failure_propagates() {
        let mut hits = vec![hit("a", 1.0, Some("G"))];
        let config = recip(10);
        let failing = |_: &Candidate, _: &str| -> Result<Option<Vec<serde_json::Value>>> {
            Err(Error::FieldResolution("field data unavailable".to_string()))
        };

        let err = GroupingReranker::new(&config)
            .rerank(&mut hits, &failing)
            .unwrap_err();
        assert!(matches!(err, Error::FieldResolution(_)));
    }

    #[test]
    fn test_decline_receives_original_score_and_fields() {
        #[derive(Debug)]
        struct ScoreEcho;

        impl DeclineFunction for ScoreEcho {
            fn name(&self) -> &str {
                "score_echo"
            }

            fn multiplier(&self, input: &DeclineInput<'_>) -> Result<f64> {
                let boost = input
                    .fields
                    .get("boost")
                    .and_then(|v| v.first())
                    .and_then(|v| v.as_f64())
                    .unwrap_or(1.0);
                Ok(boost / input.score as f64)
            }
        }

        let mut registry = DeclineRegistry::empty();
        registry.register("score_echo", |_| {
            Ok(Arc::new(ScoreEcho) as Arc<dyn DeclineFunction>)
        });
        let config = GroupingMixupConfig::new("group", DeclineSpec::new("score_echo"))
            .with_fields(["boost"])
            .compile(&registry)
            .unwrap();

        let mut hits = vec![
            hit("a", 2.0, Some("G")),
            hit("b", 1.0, Some("G")).with_field("boost", 3.0),
        ];
        GroupingReranker::new(&config)
            .rerank(&mut hits, &StoredFields)
            .unwrap();

        // score * boost / score == boost
        assert_eq!(ids(&hits), vec!["b", "a"]);
        assert_scores(&hits, &[3.0, 1.0]);
    }

    #[test]
    fn test_assign_positions_dense_per_group() {
        let mut window = entries(&["a", "a", "a", "b", "c", "c"]);
        let groups = assign_positions(&mut window);
        let positions: Vec<usize> = window.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 0, 0, 1]);
        assert_eq!(groups, 3);
    }

    #[test]
    fn test_grouping_passes_are_idempotent() {
        let hits = vec![
            hit("a", 1.0, Some("G1")),
            hit("b", 0.9, Some("G2")),
            hit("c", 0.8, Some("G1")),
            hit("d", 0.8, Some("G2")),
            hit("e", 0.5, None),
        ];
        let mut window = entries(&["G1", "G2", "G1", "G2", ""]);

        group_sort(&mut window, &hits);
        assign_positions(&mut window);
        let first: Vec<(usize, usize)> = window.iter().map(|e| (e.index, e.position)).collect();

        group_sort(&mut window, &hits);
        assign_positions(&mut window);
        let second: Vec<(usize, usize)> = window.iter().map(|e| (e.index, e.position)).collect();

        assert_eq!(first, second);
        assert_eq!(first, vec![(4, 0), (0, 0), (2, 1), (1, 0), (3, 1)]);
    }

    #[test]
    fn test_reconcile_tail_preserves_tail_order() {
        let mut hits = vec![
            Candidate::new("w", 0.1),
            Candidate::new("t1", 0.9),
            Candidate::new("t2", 0.9),
            Candidate::new("t3", 0.3),
        ];
        let shift = reconcile_tail(&mut hits, 1).unwrap();
        assert!((shift - 0.8).abs() < 1e-6);
        assert_eq!(ids(&hits), vec!["w", "t1", "t2", "t3"]);
        assert!(hits[0].score >= hits[1].score);
        assert!(hits[1].score >= hits[2].score);
        assert!(hits[2].score >= hits[3].score);
    }
}
