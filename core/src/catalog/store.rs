use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{CatalogError, Title, TitleDraft, TitlePatch, search};

/// Persistence for catalog titles
pub trait CatalogStore {
    /// All titles, ordered by id
    fn list(&self) -> Vec<Title>;
    fn get(&self, id: i64) -> Option<Title>;
    fn create(&mut self, draft: TitleDraft) -> Result<Title, CatalogError>;
    fn update(&mut self, id: i64, patch: TitlePatch) -> Result<Title, CatalogError>;
    fn delete(&mut self, id: i64) -> Result<(), CatalogError>;

    fn search(&self, query: &str) -> Vec<Title> {
        search(&self.list(), query)
    }
}

/// In-memory catalog; ids start at 1 and are never reused
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryCatalog {
    #[serde(default)]
    next_id: i64,
    #[serde(default)]
    titles: Vec<Title>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> i64 {
        let highest = self.titles.iter().map(|t| t.id).max().unwrap_or(0);
        self.next_id = self.next_id.max(highest) + 1;
        self.next_id
    }

    fn position(&self, id: i64) -> Result<usize, CatalogError> {
        self.titles
            .iter()
            .position(|t| t.id == id)
            .ok_or(CatalogError::NotFound(id))
    }
}

impl CatalogStore for MemoryCatalog {
    fn list(&self) -> Vec<Title> {
        let mut titles = self.titles.clone();
        titles.sort_by_key(|t| t.id);
        titles
    }

    fn get(&self, id: i64) -> Option<Title> {
        self.titles.iter().find(|t| t.id == id).cloned()
    }

    fn create(&mut self, draft: TitleDraft) -> Result<Title, CatalogError> {
        // validate before burning an id
        draft.validate(0)?;
        let id = self.allocate_id();
        let title = draft.validate(id)?;
        debug!("Created title {} '{}'", id, title.title);
        self.titles.push(title.clone());
        Ok(title)
    }

    fn update(&mut self, id: i64, patch: TitlePatch) -> Result<Title, CatalogError> {
        let pos = self.position(id)?;
        let updated = patch.apply(&self.titles[pos])?;
        self.titles[pos] = updated.clone();
        debug!("Updated title {}", id);
        Ok(updated)
    }

    fn delete(&mut self, id: i64) -> Result<(), CatalogError> {
        let pos = self.position(id)?;
        self.titles.remove(pos);
        debug!("Deleted title {}", id);
        Ok(())
    }
}

/// Catalog persisted to a JSON file, rewritten after every change
#[derive(Debug)]
pub struct JsonCatalog {
    path: PathBuf,
    inner: MemoryCatalog,
}

impl JsonCatalog {
    /// Open the catalog at `path`; a missing file is an empty catalog
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let inner = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => MemoryCatalog::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No catalog at {}, starting empty", path.display());
                MemoryCatalog::new()
            }
            Err(e) => return Err(e.into()),
        };
        debug!("Opened catalog {} with {} titles", path.display(), inner.titles.len());
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&self.inner)?;
        // write then rename so a crash never leaves a half-written catalog
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, content)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    /// Run a mutation, persisting only if it succeeded
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut MemoryCatalog) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let before = self.inner.clone();
        let result = change(&mut self.inner)?;
        if let Err(e) = self.persist() {
            self.inner = before;
            return Err(e);
        }
        Ok(result)
    }
}

impl CatalogStore for JsonCatalog {
    fn list(&self) -> Vec<Title> {
        self.inner.list()
    }

    fn get(&self, id: i64) -> Option<Title> {
        self.inner.get(id)
    }

    fn create(&mut self, draft: TitleDraft) -> Result<Title, CatalogError> {
        self.commit(|catalog| catalog.create(draft))
    }

    fn update(&mut self, id: i64, patch: TitlePatch) -> Result<Title, CatalogError> {
        self.commit(|catalog| catalog.update(id, patch))
    }

    fn delete(&mut self, id: i64) -> Result<(), CatalogError> {
        self.commit(|catalog| catalog.delete(id))
    }
}
