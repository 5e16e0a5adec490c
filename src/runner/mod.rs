//! Test Runner: drives one suite against one long-lived server process,
//! isolating stderr per test and classifying each result as pass, fail, or
//! error.

pub mod outcome;

use crate::analyzer::{self, Suggestion};
use crate::error::{Error, Result};
use crate::pattern::{self, Mismatch, Outcome as PatternOutcome, PatternError};
use crate::protocol::ProtocolDriver;
use crate::types::{ServerDescriptor, Suite, TestCase};
use outcome::{SuiteResult, TestResult, TestStatus};
use serde_json::json;
use std::time::Duration;
use tracing::{error, warn};

const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TestRunner {
    driver: ProtocolDriver,
}

impl Default for TestRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRunner {
    pub fn new() -> Self {
        Self { driver: ProtocolDriver::new() }
    }

    /// Starts `descriptor`, runs every test in `suite` against it in order,
    /// and stops it again. A suite-fatal error (the server dying, a
    /// malformed pattern, a failed handshake) aborts the remaining tests;
    /// everything else is recorded and the suite continues.
    pub async fn run_suite(&self, descriptor: &ServerDescriptor, suite: &Suite) -> SuiteResult {
        if let Err(e) = self.driver.connect(descriptor).await {
            error!("failed to start '{}': {e}", descriptor.name);
            return SuiteResult {
                description: suite.description.clone(),
                results: Vec::new(),
                aborted: Some(format!("could not start server: {e}")),
            };
        }

        let mut results = Vec::with_capacity(suite.tests.len());
        let mut aborted = None;

        for (i, test) in suite.tests.iter().enumerate() {
            let cursor = self.driver.clear_stderr().await;
            match self.run_test(test, cursor).await {
                Ok((status, suggestions)) => {
                    results.push(TestResult { name: test.it.clone(), status, suggestions })
                }
                Err(e) => {
                    let fatal = e.is_suite_fatal();
                    let kind = error_kind(&e).to_string();
                    let message = e.to_string();
                    let suggestions = pattern_error_from(&e)
                        .and_then(|pe| analyzer::suggest_for_pattern_error(&pe))
                        .into_iter()
                        .collect();
                    results.push(TestResult {
                        name: test.it.clone(),
                        status: TestStatus::Error { kind, message: message.clone() },
                        suggestions,
                    });
                    if fatal {
                        warn!("suite '{}' aborted: {message}", suite.description);
                        for remaining in &suite.tests[i + 1..] {
                            results.push(TestResult {
                                name: remaining.it.clone(),
                                status: TestStatus::Error {
                                    kind: "serverDied".to_string(),
                                    message: "not run: suite aborted by a prior fatal error".to_string(),
                                },
                                suggestions: Vec::new(),
                            });
                        }
                        aborted = Some(message);
                        break;
                    }
                }
            }
        }

        self.driver.disconnect().await;
        SuiteResult { description: suite.description.clone(), results, aborted }
    }

    async fn run_test(&self, test: &TestCase, stderr_cursor: usize) -> Result<(TestStatus, Vec<Suggestion>)> {
        let response = self.driver.send_message(test.request.clone(), DEFAULT_TEST_TIMEOUT).await?;
        let mut diffs: Vec<Mismatch> = Vec::new();

        if let Some(expected_response) = &test.expect.response {
            let actual = serde_json::to_value(&response)?;
            match evaluate_pattern(expected_response, &actual)? {
                PatternOutcome::Match => {}
                PatternOutcome::Mismatch(m) => diffs.push(m),
            }
        }

        if let Some(stderr_expect) = &test.expect.stderr {
            let (bytes, _) = self.driver.stderr_since(stderr_cursor).await;
            let text = String::from_utf8_lossy(&bytes).into_owned();

            if stderr_expect.is_empty_token() {
                if !text.trim().is_empty() {
                    diffs.push(Mismatch {
                        path: "$.stderr".to_string(),
                        expected: json!("toBeEmpty"),
                        actual: json!(text),
                        reason: "expected empty stderr output".to_string(),
                    });
                }
            } else if stderr_expect.is_pattern() {
                let pattern_value = json!(stderr_expect.0);
                let actual_value = json!(text);
                match evaluate_pattern(&pattern_value, &actual_value)? {
                    PatternOutcome::Match => {}
                    PatternOutcome::Mismatch(m) => diffs.push(m),
                }
            } else if text.trim() != stderr_expect.0.trim() {
                diffs.push(Mismatch {
                    path: "$.stderr".to_string(),
                    expected: json!(stderr_expect.0),
                    actual: json!(text),
                    reason: "stderr did not equal expected literal text".to_string(),
                });
            }
        }

        if diffs.is_empty() {
            Ok((TestStatus::Pass, Vec::new()))
        } else {
            let suggestions = diffs.iter().filter_map(analyzer::suggest_for_mismatch).collect();
            Ok((TestStatus::Fail(diffs), suggestions))
        }
    }
}

fn evaluate_pattern(pattern_value: &serde_json::Value, actual: &serde_json::Value) -> Result<PatternOutcome> {
    pattern::evaluate(pattern_value, actual).map_err(|e| Error::Pattern { path: e.path, reason: e.reason })
}

/// Recovers the [`PatternError`] beneath an [`Error::Pattern`] so the
/// Failure Analyzer can look for an operator-name typo, for a test that
/// failed with `error{malformedPattern}` rather than `Fail`.
fn pattern_error_from(e: &Error) -> Option<PatternError> {
    match e {
        Error::Pattern { path, reason } => Some(PatternError { path: path.clone(), reason: reason.clone() }),
        _ => None,
    }
}

fn error_kind(e: &Error) -> &'static str {
    match e {
        Error::ServerDied => "serverDied",
        Error::ReadTimeout(_) => "timeout",
        Error::Pattern { .. } => "malformedPattern",
        Error::Handshake(_) => "handshake",
        Error::StartupTimeout(_) => "startupTimeout",
        Error::EarlyExit { .. } => "earlyExit",
        Error::Cancelled => "cancelled",
        _ => "error",
    }
}
