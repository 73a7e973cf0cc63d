//! Loading settings from real files

use settings::Settings;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_file() {
    let file = write_config(
        r#"
        [status]
        interval_secs = 0

        [[sites]]
        name = "Porch"
        width = 144
        fps = 30

        [[sites.strips]]
        host = "porch.local"
        name = "Rail"
        length = 144
        "#,
    );

    let settings = Settings::load(Some(file.path())).unwrap();
    assert_eq!(settings.status.interval_secs, 0);
    assert_eq!(settings.sites.len(), 1);
    assert_eq!(settings.sites[0].fps, 30);
    assert_eq!(settings.sites[0].strips[0].host, "porch.local");
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");
    let err = Settings::load(Some(&missing)).unwrap_err();
    assert!(format!("{err:#}").contains("Failed to build configuration"));
}

#[test]
fn test_invalid_site_is_rejected_with_context() {
    let file = write_config(
        r#"
        [[sites]]
        name = "Empty"
        width = 0
        "#,
    );

    let err = Settings::load(Some(file.path())).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("Invalid configuration"), "{message}");
    assert!(message.contains("zero pixels"), "{message}");
}
