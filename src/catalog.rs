//! Built-in prompt catalog, embedded at compile time.

use crate::error::EngineError;
use crate::lifecycle::catalog_text_key;
use serde::{Deserialize, Serialize};

const CATALOG_TOML: &str = include_str!("../catalog/prompts.toml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCategory {
    pub name: String,
    pub prompts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub category: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    #[serde(rename = "category", default)]
    categories: Vec<CatalogCategory>,
}

impl Catalog {
    pub fn builtin() -> Result<Self, EngineError> {
        Self::from_toml(CATALOG_TOML)
    }

    pub fn from_toml(source: &str) -> Result<Self, EngineError> {
        toml::from_str(source)
            .map_err(|e| EngineError::Config(format!("Invalid prompt catalog: {}", e)))
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Entries, optionally restricted to one category (case-insensitive)
    pub fn entries(&self, category: Option<&str>) -> Vec<CatalogEntry> {
        self.categories
            .iter()
            .filter(|c| category.map_or(true, |wanted| c.name.eq_ignore_ascii_case(wanted)))
            .flat_map(|c| {
                c.prompts.iter().map(move |text| CatalogEntry {
                    category: c.name.clone(),
                    text: text.clone(),
                })
            })
            .collect()
    }

    /// Look up an entry by text, ignoring case and spacing
    pub fn find(&self, text: &str) -> Option<CatalogEntry> {
        let key = catalog_text_key(text);
        self.entries(None)
            .into_iter()
            .find(|entry| catalog_text_key(&entry.text) == key)
    }
}
