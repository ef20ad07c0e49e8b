// redacto-cli/tests/cli_integration.rs
//
// Exit codes and error output of the compiled binary. None of these reach
// ffmpeg: every run fails during validation.

use assert_cmd::Command;
use predicates::str::contains;
use std::error::Error;
use tempfile::tempdir;

fn redacto_cmd() -> Command {
    let mut cmd = Command::cargo_bin("redacto").expect("Failed to find redacto binary");
    cmd.env_remove("REDACTO_DETECTOR").env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_redact_non_existent_input() -> Result<(), Box<dyn Error>> {
    let output_dir = tempdir()?;

    redacto_cmd()
        .args(["redact", "-i", "surely/this/does/not/exist/input.mp4", "-o"])
        .arg(output_dir.path().join("out.mp4"))
        .arg("--detector-cmd")
        .arg("python3 serve.py")
        .assert()
        .code(1)
        .stderr(contains("does not exist"));

    Ok(())
}

#[test]
fn test_redact_unsupported_extension() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("clip.gif");
    std::fs::write(&input, "dummy content")?;

    redacto_cmd()
        .arg("redact")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(dir.path().join("out.mp4"))
        .args(["--detector-cmd", "python3 serve.py"])
        .assert()
        .code(1)
        .stderr(contains("not a supported video"));

    Ok(())
}

#[test]
fn test_redact_requires_a_detector() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("clip.mp4");
    std::fs::write(&input, "dummy content")?;
    let output = dir.path().join("out.mp4");

    redacto_cmd()
        .arg("redact")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .assert()
        .code(1)
        .stderr(contains("No detector configured"));

    assert!(!output.exists());
    Ok(())
}

#[test]
fn test_redact_empty_input_creates_no_output() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let input = dir.path().join("empty.mp4");
    std::fs::write(&input, "")?;
    let detections = dir.path().join("detections.json");
    std::fs::write(&detections, r#"{"frames": {}}"#)?;
    let output = dir.path().join("out.mp4");
    let scratch = dir.path().join("scratch");

    redacto_cmd()
        .arg("redact")
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--detections")
        .arg(&detections)
        .arg("--temp-dir")
        .arg(&scratch)
        .assert()
        .code(1)
        .stderr(contains("empty"));

    assert!(!output.exists());
    assert_eq!(std::fs::read_dir(&scratch)?.count(), 0);
    Ok(())
}

#[test]
fn test_invalid_codec_is_rejected_by_parser() {
    redacto_cmd()
        .args(["redact", "-i", "a.mp4", "-o", "b.mp4", "--codec", "vp9"])
        .assert()
        .failure()
        .stderr(contains("unknown output codec"));
}

#[test]
fn test_log_dir_receives_run_log() -> Result<(), Box<dyn Error>> {
    let dir = tempdir()?;
    let logs = dir.path().join("logs");

    redacto_cmd()
        .args(["probe", "-i"])
        .arg(dir.path().join("missing.mp4"))
        .arg("--log-dir")
        .arg(&logs)
        .assert()
        .code(1);

    let names: Vec<String> = std::fs::read_dir(&logs)?
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("redacto_run_") && names[0].ends_with(".log"));
    Ok(())
}
