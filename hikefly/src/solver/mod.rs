//! Optimal-triangle search
//!
//! Finds the scoring-optimal closed triangle within a fix sequence under
//! the active competition rules. The search is an anytime branch-and-bound
//! over vertex index ranges; see [`search`] for the algorithm and
//! [`rules`] for the rule parameters.

mod rules;
mod search;

pub use rules::{RuleKind, ScoringRule, ACTIVE_RULES, FAI_TRIANGLE, FLAT_TRIANGLE};
pub use search::{solve, CandidateTriangle, TriangleSearch, TriangleSolution, MAX_ADVANCES};
