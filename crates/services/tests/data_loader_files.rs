use std::sync::Arc;

use services::{DataLoadError, DataLoader, FileDataSource};

const DATA: &str = r#"{
  "sections": [
    { "title": "Networking", "commands": [
      { "description": "Show interfaces", "syntax": "ip a" },
      { "description": "Test reachability", "syntax": "ping host" }
    ] },
    { "title": "Processes", "commands": [
      { "description": "List processes", "syntax": "ps aux" }
    ] }
  ]
}"#;

#[tokio::test]
async fn file_source_lists_sections_and_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("data.json");
    std::fs::write(&path, DATA).expect("write");

    let loader = DataLoader::new(Arc::new(FileDataSource::new(&path)));
    let sections = loader.get_sections().await.expect("sections");
    let titles: Vec<_> = sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["Networking", "Processes"]);
    assert_eq!(sections[0].command_count, 2);

    let commands = loader
        .get_commands_by_section("Processes")
        .await
        .expect("commands");
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].syntax(), "ps aux");
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let loader = DataLoader::new(Arc::new(FileDataSource::new(dir.path().join("absent.json"))));
    assert!(matches!(
        loader.get_sections().await,
        Err(DataLoadError::Io { .. })
    ));
}

#[tokio::test]
async fn malformed_file_is_a_dataset_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("data.json");
    std::fs::write(&path, "{ \"sections\": [ { \"title\": 3 } ] }").expect("write");

    let loader = DataLoader::new(Arc::new(FileDataSource::new(path)));
    assert!(matches!(
        loader.get_sections().await,
        Err(DataLoadError::Dataset(_))
    ));
}

#[tokio::test]
async fn memo_survives_file_removal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("data.json");
    std::fs::write(&path, DATA).expect("write");

    let loader = DataLoader::new(Arc::new(FileDataSource::new(&path)));
    loader.get_sections().await.expect("first load");
    std::fs::remove_file(&path).expect("remove");
    assert_eq!(loader.get_sections().await.expect("memoized").len(), 2);

    loader.clear_cache().await;
    assert!(loader.get_sections().await.is_err());
}
