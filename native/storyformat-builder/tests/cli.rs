use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli() -> Command {
    Command::cargo_bin("storyformat-build").unwrap()
}

#[test]
fn help_lists_options() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("SOURCE_MAP_PREFIX"))
        .stdout(predicate::str::contains("--out-dir"));
}

#[test]
fn missing_manifest_fails() {
    let dir = TempDir::new().unwrap();
    cli()
        .arg("--root")
        .arg(dir.path())
        .arg("--quiet")
        .assert()
        .failure()
        .stderr(predicate::str::contains("package.json"));
}

#[test]
fn builds_minimal_project() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let files = [
        ("package.json", r#"{"name":"cli-format","version":"1.0.0","icon":"icon.png"}"#),
        ("icon.png", "not really a png"),
        ("src/editor/hydrate.ts", "export const ok = true;\n"),
        ("src/player/index.ts", "console.log(PACKAGE.name);\n"),
        ("src/player/index.html", "<p>{{STORY_DATA}}</p>"),
        ("src/format.ts", "(window as any).storyFormat({ hydrate: HYDRATE, source: SOURCE });\n"),
    ];
    for (rel, contents) in files {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    cli()
        .arg("--root")
        .arg(root)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::contains("format.js"))
        .stdout(predicate::str::contains("icon.png"));
    assert!(root.join("build/format.js").is_file());
    assert!(!root.join("build/player.js").exists());
}
