//! Result types produced by the Test Runner: per-test status and the
//! aggregated outcome of a whole suite run.

use crate::analyzer::Suggestion;
use crate::pattern::Mismatch;

/// Outcome of a single `it` case.
#[derive(Debug, Clone, PartialEq)]
pub enum TestStatus {
    Pass,
    /// A well-formed comparison that did not hold; one entry per mismatch
    /// actually recorded (the engine short-circuits on the first, so this
    /// is almost always a single-element vector, never empty).
    Fail(Vec<Mismatch>),
    /// The test could not be evaluated at all: a transport failure, a
    /// malformed pattern, or the server dying mid-request.
    Error { kind: String, message: String },
}

impl TestStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, TestStatus::Pass)
    }
}

#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    /// Advisory hints from the Failure Analyzer: a likely operator typo or
    /// a string/number type mismatch. Empty for passing tests.
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone)]
pub struct SuiteResult {
    pub description: String,
    pub results: Vec<TestResult>,
    /// Set when the suite stopped short of running every declared test,
    /// e.g. the server died or the pattern engine rejected a pattern.
    pub aborted: Option<String>,
}

impl SuiteResult {
    pub fn all_passed(&self) -> bool {
        self.aborted.is_none() && self.results.iter().all(|r| r.status.is_pass())
    }

    pub fn pass_count(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_pass()).count()
    }
}
