use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::{fs, io::AsyncWriteExt, sync::RwLock};
use tracing::info;

use crate::dao::{
    models::SaveEntity,
    save_store::SaveStore,
    storage::{StorageError, StorageResult},
};

/// Save history kept in memory, optionally mirrored to an append-only JSON-lines journal.
#[derive(Clone, Default)]
pub struct MemorySaveStore {
    saves: Arc<RwLock<Vec<SaveEntity>>>,
    journal: Option<Arc<Path>>,
}

impl MemorySaveStore {
    /// Volatile store: history is lost when the process exits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store backed by a journal file, replaying any history it already holds.
    pub async fn with_journal(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path: PathBuf = path.into();
        let saves = match fs::read_to_string(&path).await {
            Ok(contents) => parse_journal(&path, &contents)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(StorageError::journal(path, err)),
        };

        info!(path = %path.display(), count = saves.len(), "replayed save journal");

        Ok(Self {
            saves: Arc::new(RwLock::new(saves)),
            journal: Some(Arc::from(path)),
        })
    }

    async fn append_to_journal(path: &Path, save: &SaveEntity) -> StorageResult<()> {
        let mut line = serde_json::to_string(save).map_err(StorageError::Encode)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| StorageError::journal(path, source))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|source| StorageError::journal(path, source))?;
        file.flush()
            .await
            .map_err(|source| StorageError::journal(path, source))
    }
}

fn parse_journal(path: &Path, contents: &str) -> StorageResult<Vec<SaveEntity>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|source| StorageError::Corrupted {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })
        })
        .collect()
}

impl SaveStore for MemorySaveStore {
    fn insert(&self, save: SaveEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            // Hold the write lock across the journal append so both stay in the same order.
            let mut saves = store.saves.write().await;
            if let Some(path) = store.journal.as_deref() {
                Self::append_to_journal(path, &save).await?;
            }
            saves.push(save);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'static, StorageResult<Vec<SaveEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let saves = store.saves.read().await;
            Ok(saves.iter().rev().cloned().collect())
        })
    }

    fn last(&self) -> BoxFuture<'static, StorageResult<Option<SaveEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let saves = store.saves.read().await;
            Ok(saves.last().cloned())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let Some(path) = store.journal.as_deref() else {
                return Ok(());
            };
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            fs::metadata(&dir)
                .await
                .map(|_| ())
                .map_err(|source| StorageError::journal(dir, source))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::game_state::{GameState, Proposition};

    fn state(text: &str) -> GameState {
        GameState {
            players: Vec::new(),
            propositions: vec![Proposition {
                id: "1".into(),
                text: text.into(),
            }],
        }
    }

    #[tokio::test]
    async fn list_is_most_recent_first() {
        let store = MemorySaveStore::new();
        assert!(store.last().await.unwrap().is_none());

        store.insert(SaveEntity::new(state("first"))).await.unwrap();
        store.insert(SaveEntity::new(state("second"))).await.unwrap();

        let saves = store.list().await.unwrap();
        assert_eq!(saves.len(), 2);
        assert_eq!(saves[0].data.propositions[0].text, "second");
        assert_eq!(
            store.last().await.unwrap().unwrap().data.propositions[0].text,
            "second"
        );
        store.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn journal_is_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves.jsonl");

        let store = MemorySaveStore::with_journal(&path).await.unwrap();
        store.insert(SaveEntity::new(state("kept"))).await.unwrap();
        store.health_check().await.unwrap();

        let reopened = MemorySaveStore::with_journal(&path).await.unwrap();
        let last = reopened.last().await.unwrap().unwrap();
        assert_eq!(last.data.propositions[0].text, "kept");
    }

    #[tokio::test]
    async fn corrupted_journal_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saves.jsonl");
        tokio::fs::write(&path, "{oops\n").await.unwrap();

        match MemorySaveStore::with_journal(&path).await {
            Err(StorageError::Corrupted { line, .. }) => assert_eq!(line, 1),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("corrupted journal accepted"),
        }
    }
}
