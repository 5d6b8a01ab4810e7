//! Matching utilities for frame-to-frame deduplication.
//!
//! Rows of every matrix here are previous-frame candidates, columns are the
//! detections of the frame being processed.

use ndarray::Array2;
use serde::Deserialize;

use crate::tracker::rect::{Rect, iou_batch};

/// How current detections are paired with previous-frame candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Each detection, in frame order, takes the first unclaimed candidate in
    /// recorded order that clears the threshold.
    #[default]
    FirstMatch,
    /// Each detection, in frame order, takes the unclaimed candidate with the
    /// highest IoU. Ties go to the earliest recorded candidate.
    BestMatch,
    /// Global minimum-cost assignment on `1 - IoU`.
    Optimal,
}

/// Something that can be matched: a label and a box.
pub trait Matchable {
    fn label(&self) -> &str;
    fn bbox(&self) -> Rect;
}

/// IoU matrix with cross-label pairs forced to 0.
pub fn label_iou<P: Matchable, C: Matchable>(previous: &[P], current: &[C]) -> Array2<f32> {
    let prev_rects: Vec<Rect> = previous.iter().map(|p| p.bbox()).collect();
    let cur_rects: Vec<Rect> = current.iter().map(|c| c.bbox()).collect();
    let mut ious = iou_batch(&prev_rects, &cur_rects);
    for (i, p) in previous.iter().enumerate() {
        for (j, c) in current.iter().enumerate() {
            if p.label() != c.label() {
                ious[[i, j]] = 0.0;
            }
        }
    }
    ious
}

/// Compute IoU distance matrix from an IoU matrix.
pub fn iou_distance(ious: &Array2<f32>) -> Array2<f32> {
    ious.mapv(|iou| 1.0 - iou)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    /// `(candidate, detection)` pairs, ordered by detection index
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl AssignmentResult {
    fn from_matches(mut matches: Vec<(usize, usize)>, num_rows: usize, num_cols: usize) -> Self {
        matches.sort_by_key(|&(_, det)| det);
        let mut row_used = vec![false; num_rows];
        let mut col_used = vec![false; num_cols];
        for &(row, col) in &matches {
            row_used[row] = true;
            col_used[col] = true;
        }
        Self {
            matches,
            unmatched_tracks: unused(&row_used),
            unmatched_detections: unused(&col_used),
        }
    }

    /// Candidate index assigned to each detection, if any.
    pub fn by_detection(&self, num_detections: usize) -> Vec<Option<usize>> {
        let mut out = vec![None; num_detections];
        for &(row, col) in &self.matches {
            out[col] = Some(row);
        }
        out
    }
}

fn unused(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &used)| if used { None } else { Some(i) })
        .collect()
}

/// Pair candidates with detections under `policy`.
///
/// A pair is only ever accepted when its IoU is at least `iou_threshold`, so
/// the threshold is inclusive. Each candidate and each detection appear in at
/// most one pair.
pub fn assign(policy: MatchPolicy, ious: &Array2<f32>, iou_threshold: f32) -> AssignmentResult {
    let (num_rows, num_cols) = ious.dim();
    let matches = match policy {
        MatchPolicy::FirstMatch => greedy(ious, iou_threshold, false),
        MatchPolicy::BestMatch => greedy(ious, iou_threshold, true),
        MatchPolicy::Optimal => {
            let cost = iou_distance(ious);
            linear_assignment(&cost, |row, col| ious[[row, col]] >= iou_threshold).matches
        }
    };
    AssignmentResult::from_matches(matches, num_rows, num_cols)
}

fn greedy(ious: &Array2<f32>, iou_threshold: f32, best: bool) -> Vec<(usize, usize)> {
    let (num_rows, num_cols) = ious.dim();
    let mut claimed = vec![false; num_rows];
    let mut matches = Vec::new();

    for col in 0..num_cols {
        let mut chosen: Option<(usize, f32)> = None;
        for row in 0..num_rows {
            if claimed[row] {
                continue;
            }
            let iou = ious[[row, col]];
            if iou < iou_threshold {
                continue;
            }
            match chosen {
                Some((_, best_iou)) if iou <= best_iou => {}
                _ => chosen = Some((row, iou)),
            }
            if !best {
                break;
            }
        }
        if let Some((row, _)) = chosen {
            claimed[row] = true;
            matches.push((row, col));
        }
    }
    matches
}

/// Solve the rectangular assignment problem with `lapjv`, keeping only the
/// pairs `accept` approves.
pub fn linear_assignment(
    cost_matrix: &Array2<f32>,
    accept: impl Fn(usize, usize) -> bool,
) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 || num_cols == 0 {
        return AssignmentResult::from_matches(vec![], num_rows, num_cols);
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), 1e6);

    for i in 0..num_rows {
        for j in 0..num_cols {
            padded[[i, j]] = cost_matrix[[i, j]] as f64;
        }
    }

    let mut matches = vec![];
    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                if col_idx < num_cols && accept(row_idx, col_idx) {
                    matches.push((row_idx, col_idx));
                }
            }
        }
        Err(_) => {
            log::warn!("linear assignment failed, leaving {num_cols} detections unmatched");
        }
    }

    AssignmentResult::from_matches(matches, num_rows, num_cols)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Boxed(&'static str, Rect);

    impl Matchable for Boxed {
        fn label(&self) -> &str {
            self.0
        }
        fn bbox(&self) -> Rect {
            self.1
        }
    }

    #[test]
    fn test_label_iou_masks_other_labels() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0);
        let ious = label_iou(&[Boxed("chair", r)], &[Boxed("person", r), Boxed("chair", r)]);
        assert_eq!(ious[[0, 0]], 0.0);
        assert!((ious[[0, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_first_match_takes_first_candidate() {
        // Both candidates clear the threshold, the second one overlaps more.
        let ious = array![[0.4f32], [0.9]];
        let res = assign(MatchPolicy::FirstMatch, &ious, 0.3);
        assert_eq!(res.matches, vec![(0, 0)]);
        assert_eq!(res.unmatched_tracks, vec![1]);
    }

    #[test]
    fn test_best_match_takes_highest_iou() {
        let ious = array![[0.4f32], [0.9]];
        let res = assign(MatchPolicy::BestMatch, &ious, 0.3);
        assert_eq!(res.matches, vec![(1, 0)]);
        assert_eq!(res.unmatched_tracks, vec![0]);
    }

    #[test]
    fn test_best_match_tie_goes_to_earliest() {
        let ious = array![[0.5f32], [0.5]];
        let res = assign(MatchPolicy::BestMatch, &ious, 0.3);
        assert_eq!(res.matches, vec![(0, 0)]);
    }

    #[test]
    fn test_greedy_is_one_to_one() {
        let ious = array![[0.8f32, 0.7]];
        for policy in [MatchPolicy::FirstMatch, MatchPolicy::BestMatch, MatchPolicy::Optimal] {
            let res = assign(policy, &ious, 0.3);
            assert_eq!(res.matches.len(), 1, "{policy:?}");
            assert_eq!(res.matches[0].0, 0);
            assert_eq!(res.unmatched_detections.len(), 1);
        }
    }

    #[test]
    fn test_optimal_beats_greedy_on_crossed_pairs() {
        // Greedy best-match gives detection 0 candidate 0 (0.6) and leaves
        // detection 1 without a partner; the global assignment pairs both.
        let ious = array![[0.6f32, 0.5], [0.55, 0.0]];
        let greedy = assign(MatchPolicy::BestMatch, &ious, 0.3);
        assert_eq!(greedy.matches, vec![(0, 0)]);

        let optimal = assign(MatchPolicy::Optimal, &ious, 0.3);
        assert_eq!(optimal.matches, vec![(1, 0), (0, 1)]);
        assert!(optimal.unmatched_detections.is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let ious = array![[0.3f32]];
        for policy in [MatchPolicy::FirstMatch, MatchPolicy::BestMatch, MatchPolicy::Optimal] {
            assert_eq!(assign(policy, &ious, 0.3).matches, vec![(0, 0)], "{policy:?}");
        }
        let ious = array![[0.29999f32]];
        for policy in [MatchPolicy::FirstMatch, MatchPolicy::BestMatch, MatchPolicy::Optimal] {
            assert!(assign(policy, &ious, 0.3).matches.is_empty(), "{policy:?}");
        }
    }

    #[test]
    fn test_empty_inputs() {
        let res = assign(MatchPolicy::Optimal, &Array2::zeros((0, 3)), 0.3);
        assert_eq!(res.unmatched_detections, vec![0, 1, 2]);
        let res = assign(MatchPolicy::FirstMatch, &Array2::zeros((2, 0)), 0.3);
        assert_eq!(res.unmatched_tracks, vec![0, 1]);
    }

    #[test]
    fn test_by_detection() {
        let res = AssignmentResult::from_matches(vec![(2, 1)], 3, 2);
        assert_eq!(res.by_detection(2), vec![None, Some(2)]);
    }
}
