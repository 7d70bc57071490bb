//! JSON file store: one `<company_id>.json` plant document per company.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{validate_company_id, PlantRepository, StoreError};
use crate::domain::PlantDetails;

const EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, company_id: &str) -> Result<PathBuf, StoreError> {
        validate_company_id(company_id)?;
        Ok(self.dir.join(format!("{company_id}.{EXTENSION}")))
    }
}

#[async_trait]
impl PlantRepository for JsonFileStore {
    async fn load(&self, company_id: &str) -> Result<Option<PlantDetails>, StoreError> {
        let path = self.document_path(company_id)?;
        let json = match fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    async fn save(&self, plant: &PlantDetails) -> Result<(), StoreError> {
        let path = self.document_path(&plant.company_id)?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));

        let json = serde_json::to_vec_pretty(plant)?;
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &path).await?;

        debug!(company_id = %plant.company_id, path = %path.display(), "plant document saved");
        Ok(())
    }

    async fn delete(&self, company_id: &str) -> Result<bool, StoreError> {
        let path = self.document_path(company_id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut companies = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_company_id(stem).is_ok() {
                    companies.push(stem.to_string());
                }
            }
        }

        companies.sort();
        Ok(companies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn temp_store() -> JsonFileStore {
        let dir = std::env::temp_dir().join(format!("ssm-store-{}", Uuid::new_v4()));
        JsonFileStore::open(dir).await.unwrap()
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = temp_store().await;
        assert!(store.load("acme").await.unwrap().is_none());

        let plant = PlantDetails::new("acme");
        store.save(&plant).await.unwrap();
        let loaded = store.load("acme").await.unwrap().unwrap();
        assert_eq!(loaded, plant);

        assert!(store.delete("acme").await.unwrap());
        assert!(!store.delete("acme").await.unwrap());
        assert!(store.load("acme").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_skips_foreign_files() {
        let store = temp_store().await;
        store.save(&PlantDetails::new("beta")).await.unwrap();
        store.save(&PlantDetails::new("alpha")).await.unwrap();
        fs::write(store.dir().join("notes.txt"), "hello").await.unwrap();
        fs::write(store.dir().join("bad name.json"), "{}").await.unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let store = temp_store().await;
        let err = store.load("../outside").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidCompanyId(_)));
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let store = temp_store().await;
        fs::write(store.dir().join("broken.json"), "{ not json")
            .await
            .unwrap();
        let err = store.load("broken").await.unwrap_err();
        assert!(matches!(err, StoreError::Json(_)));
    }
}
