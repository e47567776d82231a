use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dashmap::DashMap;
use doctemplate_core::{Property, PropertyStore, TemplateError};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

fn to_properties(map: &BTreeMap<String, String>) -> Vec<Property> {
    map.iter()
        .map(|(name, value)| Property {
            name: name.clone(),
            value: value.clone(),
        })
        .collect()
}

/// In-memory property store.
///
/// Properties: document_id -> (name -> value)
#[derive(Debug, Default)]
pub struct MemoryPropertyStore {
    documents: DashMap<String, BTreeMap<String, String>>,
}

impl MemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyStore for MemoryPropertyStore {
    async fn list(&self, document_id: &str) -> Result<Vec<Property>, TemplateError> {
        Ok(self
            .documents
            .get(document_id)
            .map(|entry| to_properties(&entry))
            .unwrap_or_default())
    }

    async fn get(&self, document_id: &str, name: &str) -> Result<Option<String>, TemplateError> {
        Ok(self
            .documents
            .get(document_id)
            .and_then(|entry| entry.get(name).cloned()))
    }

    async fn set(&self, document_id: &str, name: &str, value: &str) -> Result<(), TemplateError> {
        self.documents
            .entry(document_id.to_string())
            .or_default()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, document_id: &str, name: &str) -> Result<(), TemplateError> {
        if let Some(mut entry) = self.documents.get_mut(document_id) {
            entry.remove(name);
        }
        Ok(())
    }
}

/// Property store keeping one JSON object per document.
///
/// Layout:
/// ```text
/// {base_dir}/
///   properties/
///     {document_id}.json
/// ```
#[derive(Debug)]
pub struct FilePropertyStore {
    base_dir: PathBuf,
    /// Serializes read-modify-write cycles on the property files.
    write_lock: Mutex<()>,
}

impl FilePropertyStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    fn properties_dir(&self) -> PathBuf {
        self.base_dir.join("properties")
    }

    fn properties_path(&self, document_id: &str) -> Result<PathBuf, TemplateError> {
        if document_id.is_empty()
            || !document_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(TemplateError::InvalidDocumentId(document_id.to_string()));
        }
        Ok(self.properties_dir().join(format!("{}.json", document_id)))
    }

    async fn load(&self, document_id: &str) -> Result<BTreeMap<String, String>, TemplateError> {
        let path = self.properties_path(document_id)?;
        match fs::read_to_string(&path).await {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(TemplateError::Io(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn store(
        &self,
        document_id: &str,
        properties: &BTreeMap<String, String>,
    ) -> Result<(), TemplateError> {
        let path = self.properties_path(document_id)?;
        fs::create_dir_all(self.properties_dir())
            .await
            .map_err(|e| TemplateError::Io(format!("Failed to create properties dir: {}", e)))?;
        let json = serde_json::to_vec_pretty(properties)?;
        // Readers see either the old or the new file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json)
            .await
            .map_err(|e| TemplateError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path).await.map_err(|e| {
            TemplateError::Io(format!("Failed to replace {}: {}", path.display(), e))
        })?;
        debug!("Wrote {} properties for {}", properties.len(), document_id);
        Ok(())
    }
}

#[async_trait]
impl PropertyStore for FilePropertyStore {
    #[instrument(skip(self), level = "debug")]
    async fn list(&self, document_id: &str) -> Result<Vec<Property>, TemplateError> {
        Ok(to_properties(&self.load(document_id).await?))
    }

    #[instrument(skip(self), level = "debug")]
    async fn get(&self, document_id: &str, name: &str) -> Result<Option<String>, TemplateError> {
        Ok(self.load(document_id).await?.remove(name))
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set(&self, document_id: &str, name: &str, value: &str) -> Result<(), TemplateError> {
        let _guard = self.write_lock.lock().await;
        let mut properties = self.load(document_id).await?;
        properties.insert(name.to_string(), value.to_string());
        self.store(document_id, &properties).await?;
        debug!("Set property {} on document {}", name, document_id);
        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, document_id: &str, name: &str) -> Result<(), TemplateError> {
        let _guard = self.write_lock.lock().await;
        let mut properties = self.load(document_id).await?;
        if properties.remove(name).is_some() {
            self.store(document_id, &properties).await?;
            debug!("Deleted property {} from document {}", name, document_id);
        }
        Ok(())
    }
}
