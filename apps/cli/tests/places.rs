use std::error::Error;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cli(dir: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("places-cli")?;
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    Ok(cmd)
}

/// `P/{src/{a.txt}, readme.md}`
fn sample_project(base: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(base.join("P").join("src"))?;
    fs::write(base.join("P").join("src").join("a.txt"), "a")?;
    fs::write(base.join("P").join("readme.md"), "# readme")?;
    Ok(())
}

#[test]
fn tree_lists_containers_first() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    sample_project(workspace.path())?;

    cli(workspace.path())?
        .args(["tree", "P"])
        .assert()
        .success()
        .stdout("P/\n  src/\n    a.txt\n  readme.md\n");
    Ok(())
}

#[test]
fn tree_filter_keeps_ancestors() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    sample_project(workspace.path())?;

    cli(workspace.path())?
        .args(["tree", "P", "--filter", "a."])
        .assert()
        .success()
        .stdout("P/\n  src/\n    a.txt\n");
    Ok(())
}

#[test]
fn scm_private_entries_are_hidden() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    sample_project(workspace.path())?;
    fs::write(workspace.path().join("P").join("build.log"), "noise")?;
    fs::write(workspace.path().join("P").join(".scmprivate"), "build.log\n")?;

    cli(workspace.path())?
        .args(["tree", "P"])
        .assert()
        .success()
        .stdout(predicate::str::contains("readme.md"))
        .stdout(predicate::str::contains("build.log").not());
    Ok(())
}

#[test]
fn drop_onto_own_folder_is_none() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    sample_project(workspace.path())?;

    cli(workspace.path())?
        .args(["drop", "P", "--drag", "P/src", "--onto", "P/src"])
        .assert()
        .success()
        .stdout("none\n");

    cli(workspace.path())?
        .args(["drop", "P", "--drag", "P/readme.md", "--onto", "P/src"])
        .assert()
        .success()
        .stdout("move\n");
    Ok(())
}

#[test]
fn drop_across_projects_is_copy() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    fs::create_dir_all(workspace.path().join("P1"))?;
    fs::create_dir_all(workspace.path().join("P2"))?;
    fs::write(workspace.path().join("P1").join("notes.txt"), "notes")?;

    cli(workspace.path())?
        .args(["drop", "P1", "P2", "--drag", "P1/notes.txt", "--onto", "P2"])
        .assert()
        .success()
        .stdout("copy\n");

    cli(workspace.path())?
        .args(["drop", "P1", "P2", "--drag", "P1/notes.txt", "--onto-root"])
        .assert()
        .success()
        .stdout("none\n");
    Ok(())
}

#[test]
fn external_drop_requires_a_container() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    sample_project(workspace.path())?;
    fs::write(workspace.path().join("outside.txt"), "x")?;

    cli(workspace.path())?
        .args([
            "drop",
            "P",
            "--external",
            "--drag",
            "outside.txt",
            "--onto",
            "P/src",
        ])
        .assert()
        .success()
        .stdout("copy\n");

    cli(workspace.path())?
        .args([
            "drop",
            "P",
            "--external",
            "--drag",
            "outside.txt",
            "--onto",
            "P/readme.md",
        ])
        .assert()
        .success()
        .stdout("none\n");
    Ok(())
}

#[test]
fn dragging_unknown_path_fails() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    sample_project(workspace.path())?;
    fs::write(workspace.path().join("outside.txt"), "x")?;

    cli(workspace.path())?
        .args(["drop", "P", "--drag", "outside.txt", "--onto", "P/src"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not inside any scanned root"));
    Ok(())
}

#[test]
fn preferences_import_and_export() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    let import_path = workspace.path().join("prefs.json");
    fs::write(
        &import_path,
        r#"{
            "version": 1,
            "explorer": {
                "row_height": 28,
                "hide_scm_private": false
            }
        }"#,
    )?;

    cli(workspace.path())?
        .args(["preferences", "import", "prefs.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported preferences"));
    assert!(workspace
        .path()
        .join(".places")
        .join("preferences.json")
        .exists());

    let export_path = workspace.path().join("prefs-export.json");
    cli(workspace.path())?
        .args(["preferences", "export", "--output", "prefs-export.json"])
        .assert()
        .success();

    let exported: serde_json::Value = serde_json::from_str(&fs::read_to_string(export_path)?)?;
    assert_eq!(exported["explorer"]["row_height"], 28);
    assert_eq!(exported["explorer"]["hide_scm_private"], false);
    assert_eq!(
        exported["explorer"]["expanded_state_key"],
        "places.tree.expanded"
    );
    Ok(())
}

#[test]
fn preferences_can_reveal_private_entries() -> Result<(), Box<dyn Error>> {
    let workspace = tempdir()?;
    sample_project(workspace.path())?;
    fs::write(workspace.path().join("P").join("build.log"), "noise")?;
    fs::write(workspace.path().join("P").join(".scmprivate"), "build.log\n")?;
    let prefs = workspace.path().join("custom.json");
    fs::write(&prefs, r#"{ "explorer": { "hide_scm_private": false } }"#)?;

    cli(workspace.path())?
        .args(["--preferences", "custom.json", "tree", "P"])
        .assert()
        .success()
        .stdout(predicate::str::contains("build.log"));
    Ok(())
}
