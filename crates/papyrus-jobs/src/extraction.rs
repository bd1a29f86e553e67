//! Extraction adapter registry for dispatching file processing.

use std::collections::HashMap;
use std::sync::Arc;

use papyrus_core::{Error, ExtractionAdapter, FileType, RawExtraction, Result};

use crate::adapters::{OfficeConvertAdapter, PdfTextAdapter, TextNativeAdapter};

/// Registry mapping document formats to their adapter implementations.
pub struct ExtractionRegistry {
    adapters: HashMap<FileType, Arc<dyn ExtractionAdapter>>,
}

impl ExtractionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with the built-in adapters for txt, pdf and docx.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextNativeAdapter));
        registry.register(Arc::new(PdfTextAdapter));
        registry.register(Arc::new(OfficeConvertAdapter));
        registry
    }

    /// Register an adapter. Replaces any existing adapter for the same format.
    pub fn register(&mut self, adapter: Arc<dyn ExtractionAdapter>) {
        self.adapters.insert(adapter.file_type(), adapter);
    }

    /// Extract text using the adapter registered for the given format.
    pub async fn extract(
        &self,
        file_type: FileType,
        data: &[u8],
        filename: &str,
    ) -> Result<RawExtraction> {
        let adapter = self.adapters.get(&file_type).ok_or_else(|| {
            Error::Extraction(format!(
                "No extraction adapter registered for file type: {}",
                file_type
            ))
        })?;
        adapter.extract(data, filename).await
    }

    /// List all formats that have registered adapters.
    pub fn available_types(&self) -> Vec<FileType> {
        self.adapters.keys().copied().collect()
    }

    /// Check if an adapter is registered for the given format.
    pub fn has_adapter(&self, file_type: FileType) -> bool {
        self.adapters.contains_key(&file_type)
    }

    /// Run health checks on all registered adapters.
    pub async fn health_check_all(&self) -> HashMap<FileType, bool> {
        let mut results = HashMap::new();
        for (file_type, adapter) in &self.adapters {
            let healthy = adapter.health_check().await.unwrap_or(false);
            results.insert(*file_type, healthy);
        }
        results
    }
}

impl Default for ExtractionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_new_is_empty() {
        let registry = ExtractionRegistry::new();
        assert!(registry.available_types().is_empty());
        assert!(!registry.has_adapter(FileType::Txt));
    }

    #[test]
    fn test_registry_defaults_cover_supported_types() {
        let registry = ExtractionRegistry::with_defaults();
        assert!(registry.has_adapter(FileType::Txt));
        assert!(registry.has_adapter(FileType::Pdf));
        assert!(registry.has_adapter(FileType::Docx));
        assert_eq!(registry.available_types().len(), 3);
    }

    #[tokio::test]
    async fn test_registry_extract_missing_adapter() {
        let registry = ExtractionRegistry::new();
        let result = registry.extract(FileType::Pdf, b"data", "test.pdf").await;
        assert!(matches!(result, Err(Error::Extraction(_))));
    }

    #[tokio::test]
    async fn test_registry_extract_with_adapter() {
        let mut registry = ExtractionRegistry::new();
        registry.register(Arc::new(TextNativeAdapter));

        let extraction = registry
            .extract(FileType::Txt, b"hello world", "test.txt")
            .await
            .unwrap();
        assert_eq!(extraction.text, "hello world");
    }

    #[tokio::test]
    async fn test_registry_health_check_all() {
        let mut registry = ExtractionRegistry::new();
        registry.register(Arc::new(TextNativeAdapter));

        let results = registry.health_check_all().await;
        assert_eq!(results.len(), 1);
        assert!(results[&FileType::Txt]);
    }
}
