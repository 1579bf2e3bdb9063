//! Anytime branch-and-bound triangle search.
//!
//! The raw search space is every chronologically ordered vertex triple
//! `(a, b, c)` of the track, `O(n^3)` at native GPS sampling rates. The
//! search partitions the index space into boxes `[a] × [b] × [c]`, bounds
//! each box's achievable scored distance from the geographic bounding
//! boxes of its index ranges, and explores boxes best-bound-first:
//!
//! ```text
//! pop box ──► bound ≤ best? ──► discard (and everything below it)
//!        └──► small enough? ──► evaluate every triple, raise best
//!        └──► otherwise     ──► split widest range, push halves
//! ```
//!
//! The search is resumable: each [`TriangleSearch::advance`] call
//! processes a bounded number of boxes and yields the best-so-far, a
//! monotonically non-decreasing lower bound. Once no remaining box can
//! beat the incumbent the result is marked optimal. [`solve`] drives
//! `advance` until optimality or a fixed cap, whichever comes first, so
//! worst-case latency stays bounded on pathological tracks at the cost of
//! a potentially non-optimal (but valid, flagged) result.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use super::rules::{ScoringRule, ACTIVE_RULES, FLAT_TRIANGLE};
use crate::fix::Fix;
use crate::geo::{distance_m, GeoBounds, LatLon};

/// Maximum number of `advance` calls the driver performs per track.
pub const MAX_ADVANCES: usize = 100;

/// Boxes processed per `advance` call.
const BOXES_PER_ADVANCE: usize = 512;

/// Index ranges at or below this width are evaluated exhaustively.
const LEAF_RANGE_LEN: usize = 16;

/// A scored vertex triple. Vertices are indices into the fix sequence and
/// occur in chronological order (`a < b < c`).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateTriangle {
    pub a: usize,
    pub b: usize,
    pub c: usize,
    /// Sum of the three legs in meters.
    pub distance_m: f64,
    /// Start and end gaps to the nearest vertices, summed, in meters.
    pub closing_gap_m: f64,
}

/// Best triangle found for a track, with the rule that scored it.
#[derive(Clone, Debug)]
pub struct TriangleSolution {
    /// The winning triangle, or `None` when no admissible triangle exists.
    pub triangle: Option<CandidateTriangle>,
    /// The rule the winning triangle was scored under.
    pub rule: ScoringRule,
    /// Whether the search proved no unexplored region can beat this.
    pub optimal: bool,
}

impl TriangleSolution {
    /// Triangle distance in meters, zero for the null triangle.
    pub fn distance_m(&self) -> f64 {
        self.triangle.map_or(0.0, |t| t.distance_m)
    }

    /// Closing penalty in meters, zero for the null triangle.
    pub fn penalty_m(&self) -> f64 {
        self.triangle.map_or(0.0, |t| t.closing_gap_m)
    }

    /// Rule-selection metric: `(distance − 2 × gap) × multiplier`.
    pub fn metric_m(&self) -> f64 {
        match self.triangle {
            Some(t) => (t.distance_m - 2.0 * t.closing_gap_m) * self.rule.multiplier,
            None => 0.0,
        }
    }
}

/// One region of the `(a, b, c)` index space, with inclusive ranges.
#[derive(Clone, Debug)]
struct SearchBox {
    a: (usize, usize),
    b: (usize, usize),
    c: (usize, usize),
    /// Upper bound on the metric of any triple inside this box, meters.
    bound_m: f64,
}

impl SearchBox {
    fn is_leaf(&self) -> bool {
        range_len(self.a) <= LEAF_RANGE_LEN
            && range_len(self.b) <= LEAF_RANGE_LEN
            && range_len(self.c) <= LEAF_RANGE_LEN
    }
}

fn range_len(range: (usize, usize)) -> usize {
    range.1 - range.0 + 1
}

// Heap ordering: best bound first.
impl Ord for SearchBox {
    fn cmp(&self, other: &Self) -> Ordering {
        self.bound_m.total_cmp(&other.bound_m)
    }
}

impl PartialOrd for SearchBox {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SearchBox {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SearchBox {}

/// Resumable optimal-triangle search over one track.
pub struct TriangleSearch {
    points: Vec<LatLon>,
    start: LatLon,
    end: LatLon,
    rules: Vec<ScoringRule>,
    max_multiplier: f64,
    heap: BinaryHeap<SearchBox>,
    best: TriangleSolution,
    best_metric: f64,
}

impl TriangleSearch {
    /// Prepares a search over the given fixes and rules.
    ///
    /// Fewer than three fixes (or no rules) yields an immediately optimal
    /// null-triangle solution.
    pub fn new(fixes: &[Fix], rules: &[ScoringRule]) -> Self {
        let points: Vec<LatLon> = fixes.iter().map(Fix::position).collect();
        let fallback = rules.first().copied().unwrap_or(FLAT_TRIANGLE);
        let degenerate = points.len() < 3 || rules.is_empty();

        let mut search = Self {
            start: points.first().copied().unwrap_or(LatLon::new(0.0, 0.0)),
            end: points.last().copied().unwrap_or(LatLon::new(0.0, 0.0)),
            points,
            rules: rules.to_vec(),
            max_multiplier: rules.iter().map(|r| r.multiplier).fold(0.0, f64::max),
            heap: BinaryHeap::new(),
            best: TriangleSolution {
                triangle: None,
                rule: fallback,
                optimal: degenerate,
            },
            best_metric: 0.0,
        };

        if !degenerate {
            let n = search.points.len();
            if let Some(root) = search.make_box((0, n - 3), (1, n - 2), (2, n - 1)) {
                search.heap.push(root);
            } else {
                search.best.optimal = true;
            }
        }
        search
    }

    /// The best solution found so far.
    pub fn best(&self) -> &TriangleSolution {
        &self.best
    }

    /// Processes the next batch of boxes.
    ///
    /// Either tightens the search space (possibly raising the best-so-far)
    /// or proves the incumbent globally optimal. Returns the best-so-far.
    pub fn advance(&mut self) -> &TriangleSolution {
        if self.best.optimal {
            return &self.best;
        }

        let mut processed = 0;
        while processed < BOXES_PER_ADVANCE {
            let Some(current) = self.heap.pop() else {
                break;
            };
            processed += 1;

            // The heap is bound-ordered: once the top cannot beat the
            // incumbent, nothing below it can either
            if current.bound_m <= self.best_metric {
                self.heap.clear();
                break;
            }

            if current.is_leaf() {
                self.solve_leaf(&current);
            } else {
                self.split(current);
            }
        }

        let exhausted = match self.heap.peek() {
            None => true,
            Some(top) => top.bound_m <= self.best_metric,
        };
        if exhausted {
            self.heap.clear();
            self.best.optimal = true;
        }
        &self.best
    }

    /// Builds a box with its metric upper bound, rejecting regions that
    /// cannot contain a chronological triple.
    fn make_box(
        &self,
        a: (usize, usize),
        b: (usize, usize),
        c: (usize, usize),
    ) -> Option<SearchBox> {
        if a.0 > a.1 || b.0 > b.1 || c.0 > c.1 {
            return None;
        }
        // A valid triple needs some b with a.0 < b < c.1
        if b.0.max(a.0 + 1) > b.1.min(c.1.saturating_sub(1)) {
            return None;
        }

        let bounds_a = GeoBounds::from_points(&self.points[a.0..=a.1])?;
        let bounds_b = GeoBounds::from_points(&self.points[b.0..=b.1])?;
        let bounds_c = GeoBounds::from_points(&self.points[c.0..=c.1])?;

        let perimeter = bounds_a.max_distance_m(&bounds_b)
            + bounds_b.max_distance_m(&bounds_c)
            + bounds_c.max_distance_m(&bounds_a);

        Some(SearchBox {
            a,
            b,
            c,
            bound_m: perimeter * self.max_multiplier,
        })
    }

    /// Splits a box along its widest index range and enqueues both halves.
    fn split(&mut self, current: SearchBox) {
        let widths = [
            range_len(current.a),
            range_len(current.b),
            range_len(current.c),
        ];
        let widest = (0..3).max_by_key(|&i| widths[i]).unwrap_or(0);

        let (lo, hi) = [current.a, current.b, current.c][widest];
        let mid = lo + (hi - lo) / 2;

        for half in [(lo, mid), (mid + 1, hi)] {
            let (a, b, c) = match widest {
                0 => (half, current.b, current.c),
                1 => (current.a, half, current.c),
                _ => (current.a, current.b, half),
            };
            if let Some(child) = self.make_box(a, b, c) {
                if child.bound_m > self.best_metric {
                    self.heap.push(child);
                }
            }
        }
    }

    /// Evaluates every chronological triple inside a leaf box.
    fn solve_leaf(&mut self, leaf: &SearchBox) {
        let mut local_best: Option<(CandidateTriangle, ScoringRule, f64)> = None;

        for a in leaf.a.0..=leaf.a.1 {
            for b in leaf.b.0.max(a + 1)..=leaf.b.1 {
                for c in leaf.c.0.max(b + 1)..=leaf.c.1 {
                    if let Some(candidate) = self.evaluate_triple(a, b, c) {
                        let better = match &local_best {
                            Some((_, _, best)) => candidate.2 > *best,
                            None => true,
                        };
                        if better {
                            local_best = Some(candidate);
                        }
                    }
                }
            }
        }

        if let Some((triangle, rule, metric)) = local_best {
            if metric > self.best_metric {
                self.best_metric = metric;
                self.best.triangle = Some(triangle);
                self.best.rule = rule;
            }
        }
    }

    /// Scores one triple under every rule, returning the best admissible
    /// candidate with its metric.
    fn evaluate_triple(
        &self,
        a: usize,
        b: usize,
        c: usize,
    ) -> Option<(CandidateTriangle, ScoringRule, f64)> {
        let (pa, pb, pc) = (self.points[a], self.points[b], self.points[c]);
        let legs = [
            distance_m(pa, pb),
            distance_m(pb, pc),
            distance_m(pc, pa),
        ];
        let total = legs[0] + legs[1] + legs[2];
        if total <= 0.0 {
            return None;
        }

        let gap_start = vertex_gap(self.start, pa, pb, pc);
        let gap_end = vertex_gap(self.end, pa, pb, pc);
        let gap = gap_start + gap_end;

        let mut best: Option<(CandidateTriangle, ScoringRule, f64)> = None;
        for rule in &self.rules {
            if !rule.legs_admissible(legs, total) {
                continue;
            }
            let limit = rule.closing_limit_m(total);
            if gap_start > limit || gap_end > limit {
                continue;
            }
            let metric = (total - 2.0 * gap) * rule.multiplier;
            let better = match &best {
                Some((_, _, current)) => metric > *current,
                None => true,
            };
            if better {
                best = Some((
                    CandidateTriangle {
                        a,
                        b,
                        c,
                        distance_m: total,
                        closing_gap_m: gap,
                    },
                    *rule,
                    metric,
                ));
            }
        }
        best
    }
}

/// Distance from a track endpoint to its nearest triangle vertex.
#[inline]
fn vertex_gap(point: LatLon, pa: LatLon, pb: LatLon, pc: LatLon) -> f64 {
    distance_m(point, pa)
        .min(distance_m(point, pb))
        .min(distance_m(point, pc))
}

/// Finds the best triangle under the active rules.
///
/// Drives the search until it proves optimality or the advance cap is
/// reached. A capped result carries `optimal = false` and remains valid.
pub fn solve(fixes: &[Fix]) -> TriangleSolution {
    let mut search = TriangleSearch::new(fixes, &ACTIVE_RULES);
    let mut advances = 0;
    while !search.best().optimal && advances < MAX_ADVANCES {
        search.advance();
        advances += 1;
    }
    search.best().clone()
}
