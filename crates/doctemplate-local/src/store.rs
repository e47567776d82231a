use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use doctemplate_core::{
    DocumentStore, DocumentTree, TemplateError, UpdateRequest, NAMED_RANGE_ID_PREFIX,
};
use tokio::fs;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::document::MemoryDocument;

/// Document store keeping one JSON file per document.
///
/// Layout:
/// ```text
/// {base_dir}/
///   documents/
///     {document_id}.json
/// ```
#[derive(Debug, Clone)]
pub struct LocalDocumentStore {
    base_dir: PathBuf,
}

impl LocalDocumentStore {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn documents_dir(&self) -> PathBuf {
        self.base_dir.join("documents")
    }

    fn document_path(&self, id: &str) -> Result<PathBuf, TemplateError> {
        validate_document_id(id)?;
        Ok(self.documents_dir().join(format!("{}.json", id)))
    }

    /// Store a document. An empty id is replaced by a fresh one.
    ///
    /// # Returns
    /// Id under which the document was stored
    #[instrument(skip(self, document), level = "debug")]
    pub async fn import(&self, mut document: MemoryDocument) -> Result<String, TemplateError> {
        document.validate()?;
        if document.id().is_empty() {
            document.set_id(new_document_id());
        }
        self.write(&document).await?;
        info!("Imported document {} ({})", document.id(), document.name());
        Ok(document.id().to_string())
    }

    /// Whether a document with this id is stored.
    pub async fn exists(&self, id: &str) -> Result<bool, TemplateError> {
        let path = self.document_path(id)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    async fn read(&self, id: &str) -> Result<MemoryDocument, TemplateError> {
        let path = self.document_path(id)?;
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TemplateError::DocumentNotFound(id.to_string()))
            }
            Err(e) => {
                return Err(TemplateError::Io(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        MemoryDocument::from_json(&json)
    }

    /// Write through a temp file so readers never see a partial document.
    async fn write(&self, document: &MemoryDocument) -> Result<(), TemplateError> {
        let path = self.document_path(document.id())?;
        fs::create_dir_all(self.documents_dir()).await.map_err(|e| {
            TemplateError::Io(format!("Failed to create documents dir: {}", e))
        })?;
        let json = serde_json::to_vec_pretty(document)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json)
            .await
            .map_err(|e| TemplateError::Io(format!("Failed to write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| {
                TemplateError::Io(format!("Failed to replace {}: {}", path.display(), e))
            })?;
        debug!("Wrote document {} ({} bytes)", document.id(), json.len());
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for LocalDocumentStore {
    type Document = MemoryDocument;

    #[instrument(skip(self), level = "debug")]
    async fn open(&self, id: &str) -> Result<MemoryDocument, TemplateError> {
        self.read(id).await
    }

    #[instrument(skip(self, document), level = "debug", fields(id = document.id()))]
    async fn save(&self, document: &MemoryDocument) -> Result<(), TemplateError> {
        self.write(document).await
    }

    #[instrument(skip(self), level = "debug")]
    async fn make_copy(&self, id: &str, name: &str) -> Result<String, TemplateError> {
        let source = self.read(id).await?;
        let copy = source.copied_as(new_document_id(), name);
        self.write(&copy).await?;
        info!("Copied document {} to {} ({})", id, copy.id(), name);
        Ok(copy.id().to_string())
    }

    #[instrument(skip(self, requests), level = "debug", fields(count = requests.len()))]
    async fn batch_update(
        &self,
        id: &str,
        requests: &[UpdateRequest],
    ) -> Result<(), TemplateError> {
        let mut document = self.read(id).await?;
        for request in requests {
            match request {
                UpdateRequest::ReplaceNamedRangeContent(replace) => {
                    let range_id = replace
                        .named_range_id
                        .strip_prefix(NAMED_RANGE_ID_PREFIX)
                        .unwrap_or(&replace.named_range_id);
                    document.replace_named_range_content(range_id, &replace.text)?;
                }
            }
        }
        self.write(&document).await?;
        info!("Applied {} update request(s) to document {}", requests.len(), id);
        Ok(())
    }
}

fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// Document ids become file names, so only a conservative alphabet is accepted.
fn validate_document_id(id: &str) -> Result<(), TemplateError> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TemplateError::InvalidDocumentId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doctemplate_core::RangeElement;
    use tempfile::TempDir;

    fn setup() -> (LocalDocumentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalDocumentStore::new(temp_dir.path());
        (store, temp_dir)
    }

    fn letter() -> MemoryDocument {
        let mut doc = MemoryDocument::new("letter", "Letter");
        let paragraph = doc.append_paragraph("Hello NAME");
        let text = doc.first_text(paragraph).unwrap();
        doc.add_named_range("[F]name", vec![RangeElement::partial(text, 6, 9)])
            .unwrap();
        doc
    }

    #[tokio::test]
    async fn test_import_and_open() {
        let (store, _temp_dir) = setup();
        let id = store.import(letter()).await.unwrap();
        assert_eq!(id, "letter");
        assert!(store.exists(&id).await.unwrap());

        let opened = store.open(&id).await.unwrap();
        let expected = letter();
        assert_eq!(opened.body_texts(), expected.body_texts());
        assert_eq!(opened.named_ranges().len(), 1);
        assert_eq!(opened.named_ranges()[0].name, "[F]name");
    }

    #[tokio::test]
    async fn test_import_assigns_id_when_empty() {
        let (store, _temp_dir) = setup();
        let mut doc = letter();
        doc.set_id("");
        let id = store.import(doc).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(store.open(&id).await.unwrap().id(), id);
    }

    #[tokio::test]
    async fn test_open_missing_document() {
        let (store, _temp_dir) = setup();
        let err = store.open("nope").await.unwrap_err();
        assert!(matches!(err, TemplateError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_path_like_ids() {
        let (store, _temp_dir) = setup();
        let err = store.open("../etc/passwd").await.unwrap_err();
        assert!(matches!(err, TemplateError::InvalidDocumentId(_)));
    }

    #[tokio::test]
    async fn test_make_copy_keeps_range_ids() {
        let (store, _temp_dir) = setup();
        let id = store.import(letter()).await.unwrap();
        let source = store.open(&id).await.unwrap();

        let copy_id = store.make_copy(&id, "Test Case of Letter").await.unwrap();
        assert_ne!(copy_id, id);

        let copy = store.open(&copy_id).await.unwrap();
        assert_eq!(copy.name(), "Test Case of Letter");
        assert_eq!(copy.named_ranges(), source.named_ranges());
    }

    #[tokio::test]
    async fn test_batch_update_replaces_range_content() {
        let (store, _temp_dir) = setup();
        let id = store.import(letter()).await.unwrap();
        let range_id = store.open(&id).await.unwrap().named_ranges()[0].id.clone();

        store
            .batch_update(&id, &[UpdateRequest::replace_named_range_content(&range_id, "Alice")])
            .await
            .unwrap();

        let updated = store.open(&id).await.unwrap();
        assert_eq!(updated.body_texts(), vec!["Hello Alice".to_string()]);
    }

    #[tokio::test]
    async fn test_batch_update_is_all_or_nothing() {
        let (store, _temp_dir) = setup();
        let id = store.import(letter()).await.unwrap();
        let range_id = store.open(&id).await.unwrap().named_ranges()[0].id.clone();

        let err = store
            .batch_update(
                &id,
                &[
                    UpdateRequest::replace_named_range_content(&range_id, "Alice"),
                    UpdateRequest::replace_named_range_content("missing", "x"),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TemplateError::NamedRangeNotFound(_)));

        let untouched = store.open(&id).await.unwrap();
        assert_eq!(untouched.body_texts(), vec!["Hello NAME".to_string()]);
    }
}
