//! Alias table mapping short names to local root directories
//!
//! An argument such as `photos/2024/img.jpg` resolves against the alias `photos` when one is
//! configured; anything else is taken as a plain path.

use std::collections::BTreeMap;

use anyhow::Context;

use crate::url::join_path;

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct AliasTable {
    roots: BTreeMap<String, String>,
}

impl AliasTable {
    pub fn insert(&mut self, alias: impl Into<String>, root: impl Into<String>) {
        self.roots.insert(alias.into(), root.into());
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let table: Self = serde_json::from_str(json).context("invalid alias table")?;
        if let Some(alias) = table.roots.keys().find(|alias| alias.is_empty() || alias.contains('/'))
        {
            return Err(anyhow::anyhow!("invalid alias name {alias:?}"));
        }
        Ok(table)
    }

    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading alias table {path:?}"))?;
        Self::from_json(&json).with_context(|| format!("failed loading alias table {path:?}"))
    }

    /// Splits `url` into `(alias, resolved path)`; the alias is empty for plain paths.
    pub fn expand(&self, url: &str) -> (String, String) {
        let (first, rest) = url.split_once('/').unwrap_or((url, ""));
        match self.roots.get(first) {
            Some(root) if rest.is_empty() => (first.to_string(), root.clone()),
            Some(root) => (first.to_string(), join_path(root, rest)),
            None => (String::new(), url.to_string()),
        }
    }
}
