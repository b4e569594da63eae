use std::fs;
use std::io::Cursor;
use std::path::Path;

use assert_cmd::Command;
use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use predicates::prelude::*;

fn mediavault() -> Command {
    let mut cmd = Command::cargo_bin("mediavault").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn jpeg_with_date_time_original(value: &str) -> Vec<u8> {
    let field = Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![value.as_bytes().to_vec()]),
    };
    let mut writer = Writer::new();
    writer.push_field(&field);
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

fn write(root: &Path, name: &str, contents: &[u8]) {
    fs::write(root.join(name), contents).unwrap();
}

#[test]
fn test_whatsapp_export_is_renamed() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "IMG-20190921-WA0064.jpg", b"a");
    write(tmp.path(), "IMG-20190921-WA0065.jpg", b"b");

    mediavault()
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Renamed 2 file(s)"));

    assert_eq!(fs::read(tmp.path().join("2019/2019.09.21.jpg")).unwrap(), b"a");
    assert_eq!(fs::read(tmp.path().join("2019/2019.09.21 (1).jpg")).unwrap(), b"b");
    assert!(tmp.path().join("_mediavault_log.md").exists());
}

#[test]
fn test_exif_time_in_name_and_bucket_folder() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "DSC0001.jpg", &jpeg_with_date_time_original("2021:01:14 15:30:00"));
    write(tmp.path(), "DSC0002.jpg", &jpeg_with_date_time_original("2021:01:15 02:00:00"));

    mediavault()
        .arg(tmp.path())
        .args(["--day-boundary", "4", "--bucket-threshold", "2", "--monthly"])
        .assert()
        .success();

    let day = tmp.path().join("2021/01/2021.01.14");
    assert!(day.join("2021.01.14 (15h30m00s).jpg").exists());
    assert!(day.join("2021.01.15 (02h00m00s).jpg").exists());
}

#[test]
fn test_existing_log_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "_mediavault_log.md", b"previous run");
    write(tmp.path(), "IMG-20190921-WA0064.jpg", b"a");

    mediavault()
        .arg(tmp.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("already exists"));

    assert!(tmp.path().join("IMG-20190921-WA0064.jpg").exists());
}

#[test]
fn test_nothing_to_process_has_its_own_exit_code() {
    let tmp = tempfile::tempdir().unwrap();
    mediavault().arg(tmp.path()).assert().code(3);
}

#[test]
fn test_no_guess_leaves_undated_files_alone() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "IMG-20190921-WA0064.jpg", b"no metadata");

    mediavault()
        .arg(tmp.path())
        .args(["--no-guess", "--json"])
        .assert()
        .code(3)
        .stdout(predicate::str::contains("\"skipped\": 1"));

    assert!(tmp.path().join("IMG-20190921-WA0064.jpg").exists());
    assert!(!tmp.path().join("2019").exists());
}

#[test]
fn test_day_boundary_out_of_range_is_a_usage_error() {
    let tmp = tempfile::tempdir().unwrap();
    mediavault()
        .arg(tmp.path())
        .args(["--day-boundary", "24"])
        .assert()
        .code(2);
}

#[test]
fn test_revert_rejects_organize_only_flags() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "IMG-20190921-WA0064.jpg", b"a");
    for flag in ["--dry-run", "--recursive", "--monthly", "--touch"] {
        mediavault()
            .arg(tmp.path())
            .args(["--revert", flag])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("cannot be used with"));
    }
    assert!(tmp.path().join("IMG-20190921-WA0064.jpg").exists());
}

#[test]
fn test_organize_then_revert() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "IMG-20190921-WA0064.jpg", b"a");
    write(tmp.path(), "IMG_20200101_120000.jpg", b"b");
    write(tmp.path(), "notes.jpg", b"c");

    mediavault()
        .arg(tmp.path())
        .args(["--unprocessed", "_unprocessed"])
        .assert()
        .success();
    assert!(tmp.path().join("_unprocessed/notes.jpg").exists());
    assert!(tmp.path().join("2020/2020.01.01 (12h00m00s).jpg").exists());

    // A file the user moved away in the meantime is skipped, the rest come back.
    fs::remove_file(tmp.path().join("2019/2019.09.21.jpg")).unwrap();

    mediavault()
        .arg(tmp.path())
        .arg("--revert")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reverted 2 file(s), 1 no longer present, 0 failed"));

    assert_eq!(fs::read(tmp.path().join("IMG_20200101_120000.jpg")).unwrap(), b"b");
    assert_eq!(fs::read(tmp.path().join("notes.jpg")).unwrap(), b"c");
    assert!(!tmp.path().join("2020/2020.01.01 (12h00m00s).jpg").exists());
}

#[test]
fn test_rerun_on_output_changes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "IMG-20190921-WA0064.jpg", b"a");
    write(tmp.path(), "Screenshot_20200910-123045.png", b"b");

    mediavault().arg(tmp.path()).assert().success();

    let second_log = tmp.path().join("second.md");
    mediavault()
        .arg(tmp.path())
        .arg("--recursive")
        .arg("--log")
        .arg(&second_log)
        .assert()
        .success()
        .stdout(predicate::str::contains("Renamed 0 file(s), 2 already in place"));

    assert!(tmp.path().join("2019/2019.09.21.jpg").exists());
    assert!(tmp.path().join("2020/2020.09.10 (12h30m45s).png").exists());
    assert!(!second_log.exists());
}

#[test]
fn test_dry_run_reports_without_renaming() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "IMG-20190921-WA0064.jpg", b"a");

    mediavault()
        .arg(tmp.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Would rename 1 file(s)"))
        .stderr(predicate::str::contains("2019.09.21.jpg"));

    assert!(tmp.path().join("IMG-20190921-WA0064.jpg").exists());
    assert!(!tmp.path().join("_mediavault_log.md").exists());
}
