//! Integration tests for charmkit

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const EXAMPLE_UNIT: &str = r#"
from charmkit import *


class ExampleUnit(Unit):
    name = 'my-charm'

    db_relation = require(name='db', interface='interface')
    ingress_relation = provide(name='ingress', interface='ingress-per-cookie')

    thing = config(string('my description', default='foo'))
    other_thing = config(float_('my description', default=1.2))

    get_data = action(name='get_data', params=dict(
            foo=string(default='2'),
            bar=integer(default=2),
            baz=float_(default=2.2)
    ))

    @get_data.handler
    def _handle_get_data(self, evt):
        return {'a response': 'this is'}
"#;

/// A command isolated from the user's home and config.
fn charmkit_cmd(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("charmkit");
    cmd.env("HOME", home)
        .env("CHARMKIT_CONFIG", home.join("charmkit.toml"))
        .env_remove("RUST_LOG");
    cmd
}

fn write_source(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("unit.py");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_version() {
    let home = TempDir::new().unwrap();
    charmkit_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("charmkit"));
}

#[test]
fn test_help() {
    let home = TempDir::new().unwrap();
    charmkit_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("unpack"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_invalid_command() {
    let home = TempDir::new().unwrap();
    charmkit_cmd(home.path()).arg("invalid").assert().failure();
}

#[test]
fn test_unpack_writes_manifests_and_source() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let source = write_source(work.path(), EXAMPLE_UNIT);
    let root = work.path().join("charm");

    charmkit_cmd(home.path())
        .arg("unpack")
        .arg(&source)
        .arg("--root")
        .arg(&root)
        .args(["--license", "# Copyright 2022\n\n"])
        .assert()
        .success();

    let metadata = fs::read_to_string(root.join("metadata.yaml")).unwrap();
    assert!(metadata.starts_with("# Copyright 2022\n\nname: my-charm\n"));
    assert!(metadata.contains("interface: ingress-per-cookie"));

    let actions = fs::read_to_string(root.join("actions.yaml")).unwrap();
    assert!(actions.contains("get_data:"));

    let config = fs::read_to_string(root.join("config.yaml")).unwrap();
    assert!(config.contains("other_thing:"));
    assert!(config.contains("default: 1.2"));

    let charmcraft = fs::read_to_string(root.join("charmcraft.yaml")).unwrap();
    assert!(charmcraft.contains("type: charm"));
    assert!(charmcraft.contains("run-on:"));

    assert_eq!(
        fs::read_to_string(root.join("src").join("charm.py")).unwrap(),
        EXAMPLE_UNIT
    );
}

#[test]
fn test_unpack_uses_configured_license_header() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let source = write_source(work.path(), EXAMPLE_UNIT);
    let root = work.path().join("charm");

    charmkit_cmd(home.path())
        .args(["config", "set", "license-header", "# configured header"])
        .assert()
        .success();

    charmkit_cmd(home.path())
        .arg("unpack")
        .arg(&source)
        .arg("--root")
        .arg(&root)
        .assert()
        .success();

    let config = fs::read_to_string(root.join("config.yaml")).unwrap();
    assert!(config.starts_with("# configured header\noptions:"));
}

#[test]
fn test_unpack_refuses_to_overwrite_charm() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let source = write_source(work.path(), EXAMPLE_UNIT);
    let root = work.path().join("charm");
    let charm = root.join("src").join("charm.py");
    fs::create_dir_all(charm.parent().unwrap()).unwrap();
    fs::write(&charm, "# mine\n").unwrap();

    charmkit_cmd(home.path())
        .arg("unpack")
        .arg(&source)
        .arg("--root")
        .arg(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("--overwrite"));
    assert_eq!(fs::read_to_string(&charm).unwrap(), "# mine\n");

    charmkit_cmd(home.path())
        .arg("unpack")
        .arg(&source)
        .arg("--root")
        .arg(&root)
        .arg("--overwrite")
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&charm).unwrap(), EXAMPLE_UNIT);
}

#[test]
fn test_unpack_copies_includes() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let source = write_source(work.path(), EXAMPLE_UNIT);
    let root = work.path().join("charm");
    let notes = work.path().join("notes.txt");
    fs::write(&notes, "notes").unwrap();
    let lib = work.path().join("lib");
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join("helper.py"), "x = 1\n").unwrap();

    charmkit_cmd(home.path())
        .arg("unpack")
        .arg(&source)
        .arg("--root")
        .arg(&root)
        .arg("--include")
        .arg(format!("{};{}", notes.display(), lib.display()))
        .assert()
        .success();

    assert!(root.join("src").join("notes.txt").is_file());
    assert!(root.join("src").join("lib").join("helper.py").is_file());
}

#[test]
fn test_unpack_without_unit_base_fails() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let source = write_source(work.path(), "class Foo:\n    pass\n");

    charmkit_cmd(home.path())
        .arg("unpack")
        .arg(&source)
        .arg("--root")
        .arg(work.path().join("charm"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not define or import"));
}

#[test]
fn test_unpack_with_two_units_fails() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let source = write_source(
        work.path(),
        "from charmkit import Unit\n\nclass A(Unit):\n    name = 'a'\n\nclass B(Unit):\n    name = 'b'\n",
    );

    charmkit_cmd(home.path())
        .arg("unpack")
        .arg(&source)
        .arg("--root")
        .arg(work.path().join("charm"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("A, B"));
}

#[test]
fn test_unpack_custom_base_class() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let source = write_source(
        work.path(),
        "from jinx import *\n\nclass MyJinx(Jinx):\n    name = 'jinxed'\n",
    );
    let root = work.path().join("charm");

    charmkit_cmd(home.path())
        .arg("unpack")
        .arg(&source)
        .arg("--root")
        .arg(&root)
        .args(["--base-class", "Jinx", "--base-module", "jinx"])
        .assert()
        .success();

    let metadata = fs::read_to_string(root.join("metadata.yaml")).unwrap();
    assert!(metadata.contains("name: jinxed"));
}

#[test]
fn test_config_show() {
    let home = TempDir::new().unwrap();
    charmkit_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration:"));
}

#[test]
fn test_config_set_then_show() {
    let home = TempDir::new().unwrap();
    charmkit_cmd(home.path())
        .args(["config", "set", "base-class", "CharmUnit"])
        .assert()
        .success();

    charmkit_cmd(home.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("base-class"))
        .stdout(predicate::str::contains("CharmUnit"));
}

#[test]
fn test_config_set_unknown_key_fails() {
    let home = TempDir::new().unwrap();
    charmkit_cmd(home.path())
        .args(["config", "set", "nope", "value"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_config_path() {
    let home = TempDir::new().unwrap();
    charmkit_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("charmkit.toml"));
}
