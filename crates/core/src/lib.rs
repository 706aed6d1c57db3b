//! Meshview core types: config categories, items, validation, list state.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Fixed set of mesh config categories served by the upstream source.
///
/// Variants map bidirectionally to the lowercase wire identifier the source
/// uses and to the display label shown in lists. Categories the source adds
/// later simply fail `from_wire` and are dropped during normalization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    Gateway,
    VirtualService,
    DestinationRule,
    ServiceEntry,
    Rule,
    QuotaSpec,
    QuotaSpecBinding,
}

impl ConfigType {
    pub const ALL: [ConfigType; 7] = [
        ConfigType::Gateway,
        ConfigType::VirtualService,
        ConfigType::DestinationRule,
        ConfigType::ServiceEntry,
        ConfigType::Rule,
        ConfigType::QuotaSpec,
        ConfigType::QuotaSpecBinding,
    ];

    /// Lowercase identifier used by the upstream source.
    pub fn wire_id(self) -> &'static str {
        match self {
            ConfigType::Gateway => "gateway",
            ConfigType::VirtualService => "virtualservice",
            ConfigType::DestinationRule => "destinationrule",
            ConfigType::ServiceEntry => "serviceentry",
            ConfigType::Rule => "rule",
            ConfigType::QuotaSpec => "quotaspec",
            ConfigType::QuotaSpecBinding => "quotaspecbinding",
        }
    }

    /// Human-readable label; the type sort orders by this.
    pub fn label(self) -> &'static str {
        match self {
            ConfigType::Gateway => "Gateway",
            ConfigType::VirtualService => "VirtualService",
            ConfigType::DestinationRule => "DestinationRule",
            ConfigType::ServiceEntry => "ServiceEntry",
            ConfigType::Rule => "Rule",
            ConfigType::QuotaSpec => "QuotaSpec",
            ConfigType::QuotaSpecBinding => "QuotaSpecBinding",
        }
    }

    pub fn from_wire(id: &str) -> Option<Self> {
        match id {
            "gateway" => Some(ConfigType::Gateway),
            "virtualservice" => Some(ConfigType::VirtualService),
            "destinationrule" => Some(ConfigType::DestinationRule),
            "serviceentry" => Some(ConfigType::ServiceEntry),
            "rule" => Some(ConfigType::Rule),
            "quotaspec" => Some(ConfigType::QuotaSpec),
            "quotaspecbinding" => Some(ConfigType::QuotaSpecBinding),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a validation pass over one object.
///
/// Variants are declared in severity order; `rank` relies on it.
/// `NotValidated` is an explicit upstream verdict and is distinct from an
/// item that never received a result at all (`ConfigItem.validation == None`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    NotValid,
    Warning,
    Valid,
    NotValidated,
}

impl ValidationStatus {
    pub const ALL: [ValidationStatus; 4] = [
        ValidationStatus::NotValid,
        ValidationStatus::Warning,
        ValidationStatus::Valid,
        ValidationStatus::NotValidated,
    ];

    /// Severity rank used by the validation sort:
    /// NotValid(0) < Warning(1) < Valid(2) < NotValidated(3).
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn wire_id(self) -> &'static str {
        match self {
            ValidationStatus::NotValid => "notvalid",
            ValidationStatus::Warning => "warning",
            ValidationStatus::Valid => "valid",
            ValidationStatus::NotValidated => "notvalidated",
        }
    }

    pub fn from_wire(id: &str) -> Option<Self> {
        match id {
            "notvalid" => Some(ValidationStatus::NotValid),
            "warning" => Some(ValidationStatus::Warning),
            "valid" => Some(ValidationStatus::Valid),
            "notvalidated" => Some(ValidationStatus::NotValidated),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_id())
    }
}

/// One finding attached to a validation result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationCheck {
    pub severity: String,
    #[serde(default)]
    pub path: String,
    pub message: String,
}

/// Validation verdict for one object, as supplied by the validation source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationResult {
    pub status: ValidationStatus,
    #[serde(default)]
    pub checks: Vec<ValidationCheck>,
}

impl ValidationResult {
    pub fn new(status: ValidationStatus) -> Self {
        Self { status, checks: Vec::new() }
    }
}

/// One config object in the aggregated list.
///
/// Identity is the (namespace, type, name) triple; it is unique within a
/// published list. `validation` stays `None` until the merger attaches a
/// result; the filter/sort/pagination stages never mutate items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigItem {
    pub namespace: String,
    #[serde(rename = "type")]
    pub config_type: ConfigType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

impl ConfigItem {
    pub fn new(namespace: impl Into<String>, config_type: ConfigType, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), config_type, name: name.into(), validation: None }
    }

    /// Status category used by the validation filter; an item that never
    /// received a result counts as `NotValidated`.
    pub fn filter_status(&self) -> ValidationStatus {
        self.validation.as_ref().map(|v| v.status).unwrap_or(ValidationStatus::NotValidated)
    }

    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            namespace: self.namespace.clone(),
            config_type: self.config_type,
            name: self.name.clone(),
        }
    }
}

/// Identity triple handed to the navigation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectRef {
    pub namespace: String,
    #[serde(rename = "type")]
    pub config_type: ConfigType,
    pub name: String,
}

/// Namespace entry as returned by the source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Namespace {
    pub name: String,
}

/// Raw object as returned by the source. Everything beyond the name is
/// carried opaquely so payload growth upstream does not break parsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawConfigObject {
    pub name: String,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

impl RawConfigObject {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), rest: serde_json::Map::new() }
    }
}

/// Raw per-namespace config payload: wire category -> objects. Unknown
/// categories survive deserialization; the normalizer skips them.
pub type RawNamespaceConfig = BTreeMap<String, Vec<RawConfigObject>>;

/// Per-namespace validation payload: type -> object name -> result.
pub type NamespaceValidations = BTreeMap<ConfigType, BTreeMap<String, ValidationResult>>;

/// Active filter selection. Sets are deduplicated by construction; an empty
/// set means "no restriction" for its category. Matching is OR within a
/// category and AND across categories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub namespaces: BTreeSet<String>,
    pub types: BTreeSet<ConfigType>,
    pub names: BTreeSet<String>,
    pub statuses: BTreeSet<ValidationStatus>,
}

/// Field the list is ordered by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Namespace,
    Type,
    Name,
    ValidationStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SortState {
    pub field: SortField,
    pub ascending: bool,
}

impl Default for SortState {
    fn default() -> Self {
        Self { field: SortField::Namespace, ascending: true }
    }
}

/// Page sizes offered to the presentation layer.
pub const PAGE_SIZES: [usize; 3] = [5, 10, 15];
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Pagination metadata published alongside the list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

impl Pagination {
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE, total: 0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_ids_round_trip() {
        for t in ConfigType::ALL {
            assert_eq!(ConfigType::from_wire(t.wire_id()), Some(t));
        }
        assert_eq!(ConfigType::from_wire("handler"), None);
    }

    #[test]
    fn status_rank_is_severity_order() {
        let ranks: Vec<u8> = ValidationStatus::ALL.iter().map(|s| s.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
    }

    #[test]
    fn absent_validation_counts_as_notvalidated() {
        let item = ConfigItem::new("ns", ConfigType::Gateway, "gw");
        assert_eq!(item.filter_status(), ValidationStatus::NotValidated);
    }
}
