use std::path::Path;
use std::sync::Arc;

use doctemplate_core::PropertyStore;

use crate::properties::FilePropertyStore;
use crate::store::LocalDocumentStore;

/// Create the file-backed document and property stores under one base directory.
/// Shared between the HTTP server and tests that want on-disk persistence.
pub fn create_backends(storage_dir: &Path) -> (Arc<LocalDocumentStore>, Arc<dyn PropertyStore>) {
    let documents = Arc::new(LocalDocumentStore::new(storage_dir));
    let properties: Arc<dyn PropertyStore> = Arc::new(FilePropertyStore::new(storage_dir));
    (documents, properties)
}
