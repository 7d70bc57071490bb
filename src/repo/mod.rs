pub mod json_store;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::domain::PlantDetails;

pub use json_store::JsonFileStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid company id: {0:?}")]
    InvalidCompanyId(String),
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt plant document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence of plant-details documents, one per company
#[async_trait]
pub trait PlantRepository: Send + Sync {
    async fn load(&self, company_id: &str) -> Result<Option<PlantDetails>, StoreError>;
    /// Replace the whole document atomically
    async fn save(&self, plant: &PlantDetails) -> Result<(), StoreError>;
    /// Returns false if there was nothing to delete
    async fn delete(&self, company_id: &str) -> Result<bool, StoreError>;
    async fn list(&self) -> Result<Vec<String>, StoreError>;
}

pub struct Repositories {
    pub plants: Arc<dyn PlantRepository>,
}

impl Repositories {
    pub async fn new(cfg: &Config) -> Result<Self> {
        let store = JsonFileStore::open(&cfg.storage.data_dir).await?;
        Ok(Self {
            plants: Arc::new(store),
        })
    }
}

/// Company ids become file names, so only a conservative alphabet is accepted
pub fn validate_company_id(company_id: &str) -> Result<(), StoreError> {
    let valid = !company_id.is_empty()
        && company_id.len() <= 64
        && company_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCompanyId(company_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_id_validation() {
        assert!(validate_company_id("acme-solar_01").is_ok());
        assert!(validate_company_id("").is_err());
        assert!(validate_company_id("../etc/passwd").is_err());
        assert!(validate_company_id("a b").is_err());
        assert!(validate_company_id(&"x".repeat(65)).is_err());
    }
}
