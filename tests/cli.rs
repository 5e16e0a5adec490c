//! CLI smoke tests driving the built `mcp-aegis` binary end to end against
//! the fixture server.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn fixture_script_path() -> String {
    format!("{}/tests/fixtures/fake_server.sh", env!("CARGO_MANIFEST_DIR"))
}

#[test]
fn cli_exits_zero_when_every_test_passes() {
    let mut descriptor = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        descriptor,
        "name: fake\ncommand: bash\nargs: [\"{}\"]\nstartupTimeout: 2000\nreadyPattern: \"READY\"\n",
        fixture_script_path()
    )
    .unwrap();

    let mut suite = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        suite,
        r#"
description: cli smoke test
tests:
  - it: lists exactly one tool
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

    Command::cargo_bin("mcp-aegis")
        .unwrap()
        .arg("--config")
        .arg(descriptor.path())
        .arg(suite.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("PASS"))
        .stdout(predicate::str::contains("1/1 tests passed"));
}

#[test]
fn cli_exits_nonzero_on_mismatch() {
    let mut descriptor = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        descriptor,
        "name: fake\ncommand: bash\nargs: [\"{}\"]\nstartupTimeout: 2000\nreadyPattern: \"READY\"\n",
        fixture_script_path()
    )
    .unwrap();

    let mut suite = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        suite,
        r#"
description: cli failure smoke test
tests:
  - it: wrongly expects two tools
    request:
      jsonrpc: "2.0"
      id: "t1"
      method: tools/list
    expect:
      response:
        result:
          tools: "match:arrayLength:2"
"#
    )
    .unwrap();

    Command::cargo_bin("mcp-aegis")
        .unwrap()
        .arg("--config")
        .arg(descriptor.path())
        .arg(suite.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("FAIL"));
}
