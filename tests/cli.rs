use std::path::Path;
use std::process::{Command, Output};

fn vistos(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vistos"))
        .args(args)
        .env("VISTOS_DATA_DIR", data_dir)
        .env_remove("VISTOS_PLAYER_BIN")
        .output()
        .expect("run vistos")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("stdout utf8")
}

#[test]
fn prints_version() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = vistos(dir.path(), &["--version"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "stdout was: {}",
        stdout.trim()
    );
}

#[test]
fn prints_help_with_subcommands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = vistos(dir.path(), &["--help"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    for name in ["series", "list", "mark", "resolve", "play", "open", "--catalog"] {
        assert!(stdout.contains(name), "missing {name} in: {stdout}");
    }
}

#[test]
fn resolve_prints_candidates_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = vistos(dir.path(), &["resolve", "digimon", "1"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("Identifier: digimon-adventure-01"));
    let first = stdout
        .find("Candidate 1: https://drive.usercontent.google.com/")
        .expect("first candidate");
    let third = stdout
        .find("Candidate 3: https://lh3.googleusercontent.com/")
        .expect("third candidate");
    assert!(first < third);
    assert!(stdout.contains("https://drive.google.com/file/d/digimon-adventure-01/preview"));
}

#[test]
fn marked_episode_shows_up_in_listing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mark = vistos(dir.path(), &["mark", "digimon", "2"]);
    assert!(mark.status.success());
    assert!(stdout_of(&mark).contains("1 / 8 episodios vistos"));

    let list = vistos(dir.path(), &["list", "digimon"]);
    assert!(list.status.success());
    let stdout = stdout_of(&list);
    assert!(stdout.contains("1 / 8 episodios vistos"));
    assert!(stdout.contains("✓"));
    assert!(dir.path().join("vistos.db").exists());
}

#[test]
fn missing_episode_is_reported_without_failing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = vistos(dir.path(), &["mark", "beyblade", "99"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("Episodio no encontrado"));
}

#[test]
fn unknown_series_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = vistos(dir.path(), &["list", "pokemon"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown series"));
}
