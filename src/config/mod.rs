//! Single-file loading of launch descriptors and test suites.
//!
//! Unlike a long-running server's configuration layer, the harness never
//! hot-reloads: a suite run loads its descriptor and its test file once,
//! validates their shape, and then treats both as immutable for the rest
//! of the run.

use crate::error::{Error, Result};
use crate::types::{ServerDescriptor, Suite};
use std::path::Path;

pub mod validation;

/// Load a [`ServerDescriptor`] from a YAML (or JSON, which is a YAML
/// subset) file on disk.
pub fn load_descriptor(path: impl AsRef<Path>) -> Result<ServerDescriptor> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;

    let deserializer = serde_yaml::Deserializer::from_str(&text);
    let descriptor: ServerDescriptor = serde_path_to_error::deserialize(deserializer)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

    validation::validate_descriptor(&descriptor)?;
    Ok(descriptor)
}

/// Load a [`Suite`] from a YAML (or JSON) test file on disk.
pub fn load_suite(path: impl AsRef<Path>) -> Result<Suite> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("reading {}: {e}", path.display())))?;

    let deserializer = serde_yaml::Deserializer::from_str(&text);
    let suite: Suite = serde_path_to_error::deserialize(deserializer)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

    validation::validate_suite(&suite)?;
    Ok(suite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_descriptor() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name: echo\ncommand: node\nargs: [\"server.js\"]\nstartupTimeout: 2000\n"
        )
        .unwrap();

        let descriptor = load_descriptor(file.path()).unwrap();
        assert_eq!(descriptor.name, "echo");
        assert_eq!(descriptor.command, "node");
        assert_eq!(descriptor.startup_timeout_ms, 2000);
    }

    #[test]
    fn loads_minimal_suite() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
description: basic suite
tests:
  - it: lists tools
    request:
      jsonrpc: "2.0"
      id: "t1"
      method: tools/list
    expect:
      response:
        result:
          tools: "match:arrayLength:1"
"#
        )
        .unwrap();

        let suite = load_suite(file.path()).unwrap();
        assert_eq!(suite.tests.len(), 1);
        assert_eq!(suite.tests[0].it, "lists tools");
    }

    #[test]
    fn missing_file_is_config_error() {
        let result = load_descriptor("/nonexistent/descriptor.yaml");
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
