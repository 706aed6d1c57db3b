//! Fixture-backed config source: one directory per namespace holding
//! `config.json` and `validations.json`. Stands in for the real transport
//! when driving the pipeline from the command line.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use meshview_api::{ConfigSource, SourceError, SourceResult};
use meshview_core::{Namespace, NamespaceValidations, RawNamespaceConfig};

pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // Missing files read as empty payloads; a namespace directory does not
    // have to carry both.
    fn read_json<T>(path: &Path, wrap: fn(String) -> SourceError) -> SourceResult<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| wrap(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(wrap(format!("{}: {e}", path.display()))),
        }
    }
}

#[async_trait]
impl ConfigSource for FileSource {
    async fn fetch_namespaces(&self) -> SourceResult<Vec<Namespace>> {
        let entries = std::fs::read_dir(&self.root)
            .map_err(|e| SourceError::Namespaces(format!("{}: {e}", self.root.display())))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SourceError::Namespaces(e.to_string()))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| SourceError::Namespaces(e.to_string()))?
                .is_dir();
            if is_dir {
                out.push(Namespace { name: entry.file_name().to_string_lossy().into_owned() });
            }
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn fetch_config(
        &self,
        namespace: &str,
        type_filters: &[String],
    ) -> SourceResult<RawNamespaceConfig> {
        let path = self.root.join(namespace).join("config.json");
        let mut cfg: RawNamespaceConfig = Self::read_json(&path, SourceError::Config)?;
        // The real server scopes the response by the requested categories.
        if !type_filters.is_empty() {
            cfg.retain(|category, _| type_filters.iter().any(|t| t == category));
        }
        Ok(cfg)
    }

    async fn fetch_validations(&self, namespace: &str) -> SourceResult<NamespaceValidations> {
        let path = self.root.join(namespace).join("validations.json");
        Self::read_json(&path, SourceError::Validations)
    }
}
