//! End-to-end persistence: teach, reopen, corrupt documents, failed writes.

use pretty_assertions::assert_eq;
use rgl_engine::persistence;
use rgl_engine::{ArrowExtractor, Engine, EngineConfig, Error, TeachStatus};

async fn open(config: &EngineConfig) -> rgl_engine::Result<Engine<ArrowExtractor>> {
    Engine::open(config.clone(), ArrowExtractor::default()).await
}

#[tokio::test]
async fn test_reopen_restores_graph_and_registry() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default().with_state_path(dir.path().join("rgl.json"));

    let first = open(&config).await.unwrap();
    first
        .teach("justiça > justiça distributiva > necessidade (p0.9, crise)\namor > afeto > cuidado (p0.55, família)")
        .await
        .unwrap();
    let saved = first.document();
    drop(first);

    let second = open(&config).await.unwrap();
    assert_eq!(second.document(), saved);
    assert_eq!(second.snapshot().as_str(), "1:2>3(p0.90,4);5:6>7(p0.55,8);");

    // The registry keeps counting from where it stopped.
    second.teach("amor > afeto > ternura (p0.4, família)").await.unwrap();
    assert_eq!(second.rules().last().map(String::as_str), Some("5:6>9(p0.40,8)"));
}

#[tokio::test]
async fn test_document_json_roundtrip_is_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgl.json");
    let config = EngineConfig::default().with_state_path(&path);

    let engine = open(&config).await.unwrap();
    engine.teach("a > b > c (p0.5, d)\ne > f (g)").await.unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let document = persistence::from_json(&text).unwrap();
    assert!(document.saved_at.is_some());

    let (store, report) = persistence::load(&document, config.store.clone()).unwrap();
    assert_eq!(report.dropped, 0);
    let mut resaved = persistence::save(&store);
    resaved.saved_at = document.saved_at;
    assert_eq!(persistence::to_json(&resaved).unwrap(), text);
}

#[tokio::test]
async fn test_missing_document_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::default().with_state_path(dir.path().join("nested").join("rgl.json"));
    let engine = open(&config).await.unwrap();
    assert!(engine.rules().is_empty());
    assert_eq!(engine.document().next_token, 1);
}

#[tokio::test]
async fn test_corrupt_document_refuses_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgl.json");
    let config = EngineConfig::default().with_state_path(&path);

    std::fs::write(&path, r#"{"text_graph": "1:2>3(p0.50,4);", "token_dict": {}}"#).unwrap();
    assert!(matches!(open(&config).await, Err(Error::CorruptState(_))));

    std::fs::write(
        &path,
        r#"{"text_graph": "", "token_dict": {"a": 1}, "reverse_token_dict": {"1": "a"}, "next_token": 7}"#,
    )
    .unwrap();
    assert!(matches!(open(&config).await, Err(Error::CorruptState(_))));
}

#[tokio::test]
async fn test_malformed_records_are_dropped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgl.json");
    std::fs::write(
        &path,
        r#"{
            "text_graph": "1:2>3(p0.50,4);garbage;1:2>3(p1.50,4);",
            "token_dict": {"a": 1, "b": 2, "c": 3, "d": 4},
            "reverse_token_dict": {"1": "a", "2": "b", "3": "c", "4": "d"},
            "next_token": 5
        }"#,
    )
    .unwrap();

    let engine = open(&EngineConfig::default().with_state_path(&path)).await.unwrap();
    assert_eq!(engine.resolved_rules(), vec!["a:b>c(p0.50,d)"]);
}

#[tokio::test]
async fn test_failed_write_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let blocked = dir.path().join("blocked");
    let config = EngineConfig::default().with_state_path(blocked.join("rgl.json"));

    let engine = open(&config).await.unwrap();
    let outcome = engine.teach("a > b > c (p0.5, d)").await.unwrap();
    assert_eq!(outcome.status, TeachStatus::Learned);
    let before = engine.document();

    // A plain file where the state directory should be.
    std::fs::remove_dir_all(&blocked).unwrap();
    std::fs::write(&blocked, "not a directory").unwrap();

    let outcome = engine.teach("x > y > z (p0.7, w)").await.unwrap();
    assert_eq!(outcome.status, TeachStatus::Unsaved);
    assert_eq!(outcome.old_graph, before.text_graph);
    assert_eq!(outcome.new_graph, before.text_graph);
    assert!(outcome.diagnostic.is_some());
    assert_eq!(engine.document(), before);
    assert_eq!(engine.rules(), vec!["1:2>3(p0.50,4)"]);
}

#[tokio::test]
async fn test_record_with_unallocated_token_refuses_to_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgl.json");
    std::fs::write(
        &path,
        r#"{
            "text_graph": "1:2>5(p0.50,2);",
            "token_dict": {"a": 1, "b": 2},
            "reverse_token_dict": {"1": "a", "2": "b"},
            "next_token": 3
        }"#,
    )
    .unwrap();

    let result = open(&EngineConfig::default().with_state_path(&path)).await;
    assert!(matches!(result, Err(Error::CorruptState(_))));
}

/// Fan-out violation on node 1 plus a byte-identical duplicate.
const UNCOMPACTED: &str = r#"{
    "text_graph": "1:2>3(p0.50,4);1:2>3(p0.50,4);1:5>3(p0.90,4);6:2>3(p0.30,4);",
    "token_dict": {"a": 1, "b": 2, "c": 3, "d": 4, "e": 5, "f": 6},
    "reverse_token_dict": {"1": "a", "2": "b", "3": "c", "4": "d", "5": "e", "6": "f"},
    "next_token": 7
}"#;

#[tokio::test]
async fn test_compact_dedups_prunes_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rgl.json");
    std::fs::write(&path, UNCOMPACTED).unwrap();
    let config = EngineConfig::default()
        .with_state_path(&path)
        .with_max_edges_per_node(1);

    let engine = open(&config).await.unwrap();
    assert_eq!(engine.rules().len(), 4);
    assert_eq!(engine.validate().unwrap().violations.len(), 1);

    assert_eq!(engine.compact().await.unwrap(), 2);
    assert_eq!(engine.rules(), vec!["1:5>3(p0.90,4)", "6:2>3(p0.30,4)"]);
    assert!(engine.validate().unwrap().violations.is_empty());

    let on_disk = persistence::from_json(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk.text_graph.as_str(), "1:5>3(p0.90,4);6:2>3(p0.30,4);");
    assert_eq!(on_disk.next_token, 7);

    // Already compact: nothing to remove, nothing rewritten.
    assert_eq!(engine.compact().await.unwrap(), 0);
}

#[tokio::test]
async fn test_compact_rolls_back_when_save_fails() {
    let dir = tempfile::tempdir().unwrap();
    let blocked = dir.path().join("blocked");
    std::fs::create_dir(&blocked).unwrap();
    std::fs::write(blocked.join("rgl.json"), UNCOMPACTED).unwrap();
    let config = EngineConfig::default()
        .with_state_path(blocked.join("rgl.json"))
        .with_max_edges_per_node(1);

    let engine = open(&config).await.unwrap();
    let before = engine.rules();

    std::fs::remove_dir_all(&blocked).unwrap();
    std::fs::write(&blocked, "not a directory").unwrap();

    assert!(engine.compact().await.is_err());
    assert_eq!(engine.rules(), before);
}
