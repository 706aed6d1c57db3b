//! Meshview source seams.
//!
//! This crate defines the traits the aggregation pipeline consumes: the
//! config/validation transport, the error sink, and the navigation
//! collaborator. Implementations can be remote (HTTP) or in-memory; the
//! in-memory `MockSource` ships here for tests and demos.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::error;

use meshview_core::{Namespace, NamespaceValidations, ObjectRef, RawNamespaceConfig};

/// Transport/upstream failures, one variant per fetch surface.
/// Validation absence is data, never an error.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceError {
    #[error("namespace list: {0}")]
    Namespaces(String),
    #[error("config objects: {0}")]
    Config(String),
    #[error("validations: {0}")]
    Validations(String),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Black-box transport returning raw per-namespace payloads.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn fetch_namespaces(&self) -> SourceResult<Vec<Namespace>>;

    /// Fetch raw config for one namespace. `type_filters` carries wire type
    /// ids the server scopes the response by; empty means all categories.
    async fn fetch_config(
        &self,
        namespace: &str,
        type_filters: &[String],
    ) -> SourceResult<RawNamespaceConfig>;

    async fn fetch_validations(&self, namespace: &str) -> SourceResult<NamespaceValidations>;
}

/// One-way error sink for the surrounding presentation layer. Must not panic.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, message: &str);
}

/// Reporter that forwards to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, message: &str) {
        error!(%message, "upstream error");
    }
}

/// Reporter that records messages; used by tests.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    messages: Mutex<Vec<String>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("reporter lock").clone()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, message: &str) {
        if let Ok(mut m) = self.messages.lock() {
            m.push(message.to_string());
        }
    }
}

/// Produces a destination reference for an item identity triple. The
/// orchestrator only supplies the triple; it never navigates itself.
pub trait Navigator: Send + Sync {
    fn destination(&self, target: &ObjectRef) -> String;
}

/// Default path scheme matching the console routes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathNavigator;

impl Navigator for PathNavigator {
    fn destination(&self, target: &ObjectRef) -> String {
        format!(
            "/namespaces/{}/istio/{}/{}",
            target.namespace,
            target.config_type.wire_id(),
            target.name
        )
    }
}

// ----------------- Mock implementation -----------------

#[derive(Debug, Default)]
struct MockData {
    namespaces: Vec<Namespace>,
    configs: HashMap<String, RawNamespaceConfig>,
    validations: HashMap<String, NamespaceValidations>,
    fail_namespaces: bool,
    fail_configs: bool,
    fail_validations: bool,
}

/// In-memory `ConfigSource` for tests and demos.
///
/// Beyond canned payloads it supports failure injection per fetch surface and
/// a gate that holds validation responses open until released, which is how
/// tests drive the stale-cycle guard deterministically.
pub struct MockSource {
    data: Mutex<MockData>,
    hold_tx: watch::Sender<bool>,
    hold_rx: watch::Receiver<bool>,
}

impl Default for MockSource {
    fn default() -> Self {
        let (hold_tx, hold_rx) = watch::channel(false);
        Self { data: Mutex::new(MockData::default()), hold_tx, hold_rx }
    }
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a namespace together with its config and validation payloads.
    pub fn with_namespace(
        self,
        namespace: &str,
        config: RawNamespaceConfig,
        validations: NamespaceValidations,
    ) -> Self {
        {
            let mut d = self.data.lock().expect("mock lock");
            d.namespaces.push(Namespace { name: namespace.to_string() });
            d.configs.insert(namespace.to_string(), config);
            d.validations.insert(namespace.to_string(), validations);
        }
        self
    }

    pub fn set_config(&self, namespace: &str, config: RawNamespaceConfig) {
        let mut d = self.data.lock().expect("mock lock");
        if !d.namespaces.iter().any(|n| n.name == namespace) {
            d.namespaces.push(Namespace { name: namespace.to_string() });
        }
        d.configs.insert(namespace.to_string(), config);
    }

    pub fn set_validations(&self, namespace: &str, validations: NamespaceValidations) {
        let mut d = self.data.lock().expect("mock lock");
        d.validations.insert(namespace.to_string(), validations);
    }

    pub fn fail_namespaces(&self, on: bool) {
        self.data.lock().expect("mock lock").fail_namespaces = on;
    }

    pub fn fail_configs(&self, on: bool) {
        self.data.lock().expect("mock lock").fail_configs = on;
    }

    pub fn fail_validations(&self, on: bool) {
        self.data.lock().expect("mock lock").fail_validations = on;
    }

    /// While on, `fetch_validations` blocks until the gate is released.
    pub fn hold_validations(&self, on: bool) {
        let _ = self.hold_tx.send(on);
    }
}

#[async_trait]
impl ConfigSource for MockSource {
    async fn fetch_namespaces(&self) -> SourceResult<Vec<Namespace>> {
        let d = self.data.lock().expect("mock lock");
        if d.fail_namespaces {
            return Err(SourceError::Namespaces("mock transport down".into()));
        }
        Ok(d.namespaces.clone())
    }

    async fn fetch_config(
        &self,
        namespace: &str,
        type_filters: &[String],
    ) -> SourceResult<RawNamespaceConfig> {
        let d = self.data.lock().expect("mock lock");
        if d.fail_configs {
            return Err(SourceError::Config("mock transport down".into()));
        }
        let mut cfg = d.configs.get(namespace).cloned().unwrap_or_default();
        // The real server scopes the response by the requested categories.
        if !type_filters.is_empty() {
            cfg.retain(|category, _| type_filters.iter().any(|t| t == category));
        }
        Ok(cfg)
    }

    async fn fetch_validations(&self, namespace: &str) -> SourceResult<NamespaceValidations> {
        let mut rx = self.hold_rx.clone();
        while *rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
        let d = self.data.lock().expect("mock lock");
        if d.fail_validations {
            return Err(SourceError::Validations("mock transport down".into()));
        }
        Ok(d.validations.get(namespace).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::{ConfigType, RawConfigObject};

    #[tokio::test]
    async fn mock_scopes_config_by_type_filter() {
        let mut cfg = RawNamespaceConfig::new();
        cfg.insert("gateway".into(), vec![RawConfigObject::named("gw")]);
        cfg.insert("virtualservice".into(), vec![RawConfigObject::named("vs")]);
        let src = MockSource::new().with_namespace("ns1", cfg, NamespaceValidations::new());

        let scoped = src
            .fetch_config("ns1", &["gateway".to_string()])
            .await
            .expect("fetch");
        assert!(scoped.contains_key("gateway"));
        assert!(!scoped.contains_key("virtualservice"));

        let all = src.fetch_config("ns1", &[]).await.expect("fetch");
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn navigator_builds_console_path() {
        let target = ObjectRef {
            namespace: "bookinfo".into(),
            config_type: ConfigType::VirtualService,
            name: "reviews".into(),
        };
        assert_eq!(
            PathNavigator.destination(&target),
            "/namespaces/bookinfo/istio/virtualservice/reviews"
        );
    }
}
