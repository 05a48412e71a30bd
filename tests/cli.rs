use assert_cmd::prelude::*;
use color_eyre::Result;
use std::path::Path;
use std::process::{Command, Output};

fn write_manifest(dir: &Path, text: &str) -> Result<std::path::PathBuf> {
    let path = dir.join("image.yaml");
    std::fs::write(&path, text)?;
    Ok(path)
}

fn oic(args: &[&str]) -> Result<Output> {
    let output = Command::cargo_bin("oic")?.args(args).output()?;
    println!("-- oic stderr --\n{}", String::from_utf8_lossy(&output.stderr));
    Ok(output)
}

fn build(manifest: &Path, workspace: &Path, extra: &[&str]) -> Result<Output> {
    let manifest = manifest.to_string_lossy();
    // Artifacts land next to the build directories
    let workspace = workspace.to_string_lossy();
    let mut args = vec!["build", &*manifest, "--workspace", &*workspace, "--output", &*workspace];
    args.extend_from_slice(extra);
    oic(&args)
}

fn build_dirs(workspace: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(workspace)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with("oic-") {
            names.push(name);
        }
    }
    Ok(names)
}

#[test]
fn test_resolve_prints_expanded_manifest() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let manifest = write_manifest(
        temp.path(),
        "actions:\n  - action: run\n    command: echo {{ architecture }}\n",
    )?;

    let path = manifest.to_string_lossy();
    let output = oic(&["resolve", &*path, "--arch", "aarch64"])?;

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "actions:\n  - action: run\n    command: echo aarch64\n"
    );
    Ok(())
}

#[test]
fn test_resolve_rejects_unknown_action() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let manifest = write_manifest(temp.path(), "actions:\n  - action: frobnicate\n")?;

    let path = manifest.to_string_lossy();
    let output = oic(&["resolve", &*path])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("frobnicate"));
    Ok(())
}

#[test]
fn test_build_runs_command_in_manifest_directory() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = temp.path().join("ws");
    let manifest = write_manifest(
        temp.path(),
        "actions:\n  - action: run\n    name: Say hello\n    command: echo hello > out.txt\n",
    )?;

    let output = build(&manifest, &workspace, &[])?;

    assert!(output.status.success());
    assert_eq!(std::fs::read_to_string(temp.path().join("out.txt"))?, "hello\n");
    assert!(build_dirs(&workspace)?.is_empty(), "build directory was not removed");
    Ok(())
}

#[test]
fn test_build_failure_exits_with_one() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = temp.path().join("ws");
    let manifest = write_manifest(
        temp.path(),
        "actions:\n  - action: run\n    command: exit 3\n  - action: run\n    command: touch never\n",
    )?;

    let output = build(&manifest, &workspace, &[])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(!temp.path().join("never").exists());
    assert!(build_dirs(&workspace)?.is_empty());
    Ok(())
}

#[test]
fn test_build_validation_failure_runs_nothing() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = temp.path().join("ws");
    let manifest = write_manifest(
        temp.path(),
        "actions:\n  - action: run\n    command: touch ran\n  - action: copy\n    to: rootfs\n",
    )?;

    let output = build(&manifest, &workspace, &[])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(!temp.path().join("ran").exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("\"from\" is mandatory"));
    Ok(())
}

#[test]
fn test_build_unknown_action_creates_no_build_directory() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = temp.path().join("ws");
    let manifest = write_manifest(
        temp.path(),
        "actions:\n  - action: run\n    command: touch ran\n  - action: frobnicate\n",
    )?;

    let output = build(&manifest, &workspace, &[])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("frobnicate"));
    assert!(!temp.path().join("ran").exists());
    assert!(workspace.is_dir());
    assert!(build_dirs(&workspace)?.is_empty());
    Ok(())
}

#[test]
fn test_build_keep_leaves_build_directory() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = temp.path().join("ws");
    let manifest = write_manifest(
        temp.path(),
        "actions:\n  - action: run\n    command: \"true\"\n",
    )?;

    let output = build(&manifest, &workspace, &["--keep"])?;

    assert!(output.status.success());
    let dirs = build_dirs(&workspace)?;
    assert_eq!(dirs.len(), 1);
    assert!(workspace.join(&dirs[0]).join("scrap").is_dir());
    assert!(workspace.join(&dirs[0]).join("downloads").is_dir());
    Ok(())
}

#[test]
fn test_build_missing_manifest() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let workspace = temp.path().join("ws");

    let output = build(&temp.path().join("missing.yaml"), &workspace, &[])?;

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing.yaml"));
    Ok(())
}
