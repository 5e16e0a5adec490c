//! Shape validation for loaded descriptors and suites.

use crate::error::{Error, Result};
use crate::types::{ServerDescriptor, Suite};
use std::collections::HashSet;

pub fn validate_descriptor(descriptor: &ServerDescriptor) -> Result<()> {
    if descriptor.command.is_empty() {
        return Err(Error::Config("descriptor command must not be empty".into()));
    }
    if descriptor.startup_timeout_ms == 0 {
        return Err(Error::Config("startupTimeout must be non-zero".into()));
    }
    if let Some(pattern) = &descriptor.ready_pattern {
        regex::Regex::new(pattern)
            .map_err(|e| Error::Config(format!("invalid readyPattern: {e}")))?;
    }
    Ok(())
}

pub fn validate_suite(suite: &Suite) -> Result<()> {
    if suite.tests.is_empty() {
        tracing::warn!("suite '{}' declares no tests", suite.description);
    }

    let mut seen_ids = HashSet::new();
    for test in &suite.tests {
        if test.it.is_empty() {
            return Err(Error::Config("test 'it' name must not be empty".into()));
        }
        if test.request.id.is_none() {
            return Err(Error::Config(format!(
                "test '{}': request.id must be present",
                test.it
            )));
        }
        if let Some(id) = &test.request.id {
            if !seen_ids.insert(id.clone()) {
                tracing::warn!(
                    "test '{}': request.id {} reused within suite '{}' (permitted but discouraged)",
                    test.it,
                    id,
                    suite.description
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{McpRequest, TestCase};

    #[test]
    fn rejects_empty_command() {
        let descriptor = ServerDescriptor {
            name: "x".into(),
            command: "".into(),
            args: vec![],
            cwd: None,
            env: Default::default(),
            startup_timeout_ms: 1000,
            ready_pattern: None,
        };
        assert!(validate_descriptor(&descriptor).is_err());
    }

    #[test]
    fn rejects_missing_request_id() {
        let suite = Suite {
            description: "s".into(),
            tests: vec![TestCase {
                it: "t".into(),
                request: McpRequest::notification("tools/list", None),
                expect: Default::default(),
            }],
        };
        assert!(validate_suite(&suite).is_err());
    }
}
