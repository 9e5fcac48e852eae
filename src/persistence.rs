//! State persistence — the graph and its registry as one JSON document.
//!
//! ```text
//! GraphStore → save() → StateDocument → to_json() → file
//! file → from_json() → StateDocument → load() → GraphStore
//! ```
//!
//! The four fields `text_graph`, `token_dict`, `reverse_token_dict` and
//! `next_token` are all required. A document missing one, or whose maps and
//! counter disagree, is rejected with `Error::CorruptState`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{PersistenceConfig, StoreConfig};
use crate::model::{TextGraph, Token, TokenRegistry};
use crate::storage::{GraphStore, RestoreReport};
use crate::{Error, Result};

/// The persisted form of one engine instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub text_graph: TextGraph,
    /// term → token id
    pub token_dict: BTreeMap<String, u64>,
    /// token id → term; the exact inverse of `token_dict`
    pub reverse_token_dict: BTreeMap<u64, String>,
    /// `1 + max(token id)`, or 1 for an empty registry
    pub next_token: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

/// Capture the store (graph text and registry) as a document.
pub fn save(store: &GraphStore) -> StateDocument {
    let registry = store.registry();
    StateDocument {
        text_graph: store.snapshot(),
        token_dict: registry.forward().iter().map(|(term, t)| (term.clone(), t.0)).collect(),
        reverse_token_dict: registry.reverse().iter().map(|(t, term)| (t.0, term.clone())).collect(),
        next_token: registry.next_token(),
        saved_at: None,
    }
}

/// Rebuild a store from a document. Inverse of `save`.
///
/// Malformed records are dropped, but a well-formed record naming a token
/// the registry never allocated makes the whole document `CorruptState`:
/// the counter would otherwise hand that id to an unrelated term.
pub fn load(document: &StateDocument, config: StoreConfig) -> Result<(GraphStore, RestoreReport)> {
    let registry = registry_from(document)?;
    let mut store = GraphStore::with_registry(config, registry);
    let report = store.restore(&document.text_graph);

    for s in store.statements() {
        for token in [s.main, s.sub, s.variable, s.condition] {
            if !store.registry().contains(token) {
                return Err(Error::CorruptState(format!(
                    "record {s} uses token {token}, which is not in reverse_token_dict"
                )));
            }
        }
    }
    Ok((store, report))
}

fn registry_from(document: &StateDocument) -> Result<TokenRegistry> {
    let forward = &document.token_dict;
    let reverse = &document.reverse_token_dict;

    if forward.len() != reverse.len() {
        return Err(Error::CorruptState(format!(
            "token_dict has {} entries but reverse_token_dict has {}",
            forward.len(),
            reverse.len()
        )));
    }
    for (term, id) in forward {
        if *id == 0 {
            return Err(Error::CorruptState(format!("term '{term}' has token id 0")));
        }
        if reverse.get(id) != Some(term) {
            return Err(Error::CorruptState(format!(
                "reverse_token_dict does not map {id} back to '{term}'"
            )));
        }
    }

    let expected_next = match reverse.keys().next_back() {
        None => 1,
        Some(max) => max.checked_add(1).ok_or_else(|| {
            Error::CorruptState(format!("token id {max} leaves no room for a next token"))
        })?,
    };
    if document.next_token != expected_next {
        return Err(Error::CorruptState(format!(
            "next_token is {} but must be {expected_next}",
            document.next_token
        )));
    }

    let forward: HashMap<String, Token> =
        forward.iter().map(|(term, id)| (term.clone(), Token(*id))).collect();
    let reverse: HashMap<Token, String> =
        reverse.iter().map(|(id, term)| (Token(*id), term.clone())).collect();
    Ok(TokenRegistry::from_parts(forward, reverse, document.next_token))
}

/// Parse a document. Malformed JSON and missing fields are `CorruptState`.
pub fn from_json(text: &str) -> Result<StateDocument> {
    serde_json::from_str(text).map_err(|e| Error::CorruptState(e.to_string()))
}

pub fn to_json(document: &StateDocument) -> Result<String> {
    serde_json::to_string_pretty(document).map_err(|e| Error::CorruptState(e.to_string()))
}

// ============================================================================
// PersistenceManager
// ============================================================================

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Reads and writes the state document at a fixed path, with every I/O
/// call bounded by a timeout.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    path: PathBuf,
    timeout: Duration,
}

impl PersistenceManager {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self { path: path.into(), timeout }
    }

    /// `None` when no state path is configured.
    pub fn from_config(config: &PersistenceConfig) -> Option<Self> {
        config.path.as_ref().map(|p| Self::new(p, config.timeout()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the document, stamping `saved_at`. The file is replaced
    /// atomically via a temporary sibling.
    pub async fn write(&self, document: &StateDocument) -> Result<()> {
        let mut document = document.clone();
        document.saved_at = Some(Utc::now());
        let json = to_json(&document)?;

        let tmp = self.temp_path();
        let written = self
            .bounded("state write", async {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&tmp, json.as_bytes()).await?;
                tokio::fs::rename(&tmp, &self.path).await?;
                Ok::<(), Error>(())
            })
            .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp.display(), error = %cleanup, "could not remove temporary state file");
                }
            }
            return Err(e);
        }

        debug!(path = %self.path.display(), bytes = json.len(), "state written");
        Ok(())
    }

    /// Read the document. A missing file is `Ok(None)` (fresh state).
    pub async fn read(&self) -> Result<Option<StateDocument>> {
        let text = self
            .bounded("state read", async {
                match tokio::fs::read_to_string(&self.path).await {
                    Ok(text) => Ok(Some(text)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                    Err(e) => Err(Error::Io(e)),
                }
            })
            .await?;

        match text {
            Some(text) => {
                let document = from_json(&text)?;
                info!(
                    path = %self.path.display(),
                    tokens = document.token_dict.len(),
                    "state document read"
                );
                Ok(Some(document))
            }
            None => {
                info!(path = %self.path.display(), "no state document, starting empty");
                Ok(None)
            }
        }
    }

    /// Sibling `<path>.<n>.tmp`, unique per write so an abandoned write
    /// never shares a file with the next one.
    fn temp_path(&self) -> PathBuf {
        let n = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}.{n}.tmp", std::process::id()));
        PathBuf::from(name)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        io: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, io).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                operation,
                millis: self.timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Relation;
    use pretty_assertions::assert_eq;

    fn seeded() -> GraphStore {
        let mut g = GraphStore::new(StoreConfig::default());
        g.ingest(&[
            Relation::new("justiça", "justiça distributiva", "necessidade", "0.9", "crise"),
            Relation::new("amor", "afeto", "cuidado", "0.55", "família"),
        ])
        .unwrap();
        g
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = seeded();
        let doc = save(&store);
        let (loaded, report) = load(&doc, StoreConfig::default()).unwrap();

        assert_eq!(report, RestoreReport { restored: 2, dropped: 0 });
        assert_eq!(loaded.snapshot(), store.snapshot());
        assert_eq!(loaded.registry(), store.registry());
        assert_eq!(save(&loaded), doc);
    }

    #[test]
    fn test_json_roundtrip() {
        let doc = save(&seeded());
        let parsed = from_json(&to_json(&doc).unwrap()).unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_empty_store_document() {
        let doc = save(&GraphStore::new(StoreConfig::default()));
        assert_eq!(doc.next_token, 1);
        assert!(doc.text_graph.is_empty());
        assert!(load(&doc, StoreConfig::default()).is_ok());
    }

    #[test]
    fn test_missing_field_is_corrupt() {
        for field in ["text_graph", "token_dict", "reverse_token_dict", "next_token"] {
            let mut value = serde_json::to_value(save(&seeded())).unwrap();
            value.as_object_mut().unwrap().remove(field);
            let err = from_json(&value.to_string()).unwrap_err();
            assert!(matches!(err, Error::CorruptState(_)), "missing {field} accepted");
        }
    }

    #[test]
    fn test_inconsistent_maps_are_corrupt() {
        let mut doc = save(&seeded());
        doc.reverse_token_dict.insert(1, "outra coisa".into());
        assert!(matches!(load(&doc, StoreConfig::default()), Err(Error::CorruptState(_))));
    }

    #[test]
    fn test_wrong_counter_is_corrupt() {
        let mut doc = save(&seeded());
        doc.next_token = 3;
        assert!(matches!(load(&doc, StoreConfig::default()), Err(Error::CorruptState(_))));
    }

    #[test]
    fn test_hand_written_document() {
        let text = r#"{
            "text_graph": "1:2>3(p0.84,3);",
            "token_dict": {"justiça": 1, "priorizar recursos": 2, "crise": 3},
            "reverse_token_dict": {"1": "justiça", "2": "priorizar recursos", "3": "crise"},
            "next_token": 4
        }"#;
        let (store, _) = load(&from_json(text).unwrap(), StoreConfig::default()).unwrap();
        assert_eq!(store.resolved_records(), vec!["justiça:priorizar recursos>crise(p0.84,crise)"]);
        assert_eq!(store.snapshot().as_str(), "1:2>3(p0.84,3);");
    }

    #[test]
    fn test_unknown_token_in_record_is_corrupt() {
        let text = r#"{
            "text_graph": "1:2>5(p0.50,2);",
            "token_dict": {"a": 1, "b": 2},
            "reverse_token_dict": {"1": "a", "2": "b"},
            "next_token": 3
        }"#;
        let err = load(&from_json(text).unwrap(), StoreConfig::default()).unwrap_err();
        match err {
            Error::CorruptState(reason) => assert!(reason.contains("token 5")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_max_token_id_is_corrupt_not_overflow() {
        let text = r#"{
            "text_graph": "",
            "token_dict": {"a": 18446744073709551615},
            "reverse_token_dict": {"18446744073709551615": "a"},
            "next_token": 0
        }"#;
        assert!(matches!(
            load(&from_json(text).unwrap(), StoreConfig::default()),
            Err(Error::CorruptState(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the document should go makes the rename fail.
        let path = dir.path().join("rgl.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let manager = PersistenceManager::new(&path, Duration::from_secs(2));
        assert!(manager.write(&save(&seeded())).await.is_err());

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["rgl.json".to_string()]);
    }

    #[tokio::test]
    async fn test_manager_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::new(dir.path().join("state").join("rgl.json"), Duration::from_secs(2));

        assert_eq!(manager.read().await.unwrap(), None);

        let doc = save(&seeded());
        manager.write(&doc).await.unwrap();
        let read = manager.read().await.unwrap().unwrap();

        assert!(read.saved_at.is_some());
        assert_eq!(read.text_graph, doc.text_graph);
        assert_eq!(read.token_dict, doc.token_dict);
        assert_eq!(read.reverse_token_dict, doc.reverse_token_dict);
        assert_eq!(read.next_token, doc.next_token);
    }

    #[tokio::test]
    async fn test_manager_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgl.json");
        std::fs::write(&path, "{\"text_graph\": \"\"}").unwrap();
        let manager = PersistenceManager::new(&path, Duration::from_secs(2));
        assert!(matches!(manager.read().await, Err(Error::CorruptState(_))));
    }
}
