//! Meshview list pipeline: pure stages over `ConfigItem` sequences.
//!
//! The orchestrator wires these together per fetch cycle:
//! normalize -> name filter -> sort -> (validation merge) -> status filter
//! -> page slice. Every stage is total; none of them touches shared state.

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::BTreeSet;

use rustc_hash::FxHashMap;
use tracing::debug;

use meshview_core::{
    ConfigItem, ConfigType, NamespaceValidations, RawNamespaceConfig, SortField, SortState,
    ValidationResult, ValidationStatus,
};

/// Flatten one namespace's raw payload into items with no validation attached.
/// Categories the type table does not know are dropped silently so newer
/// servers keep working against older clients.
pub fn normalize_namespace(namespace: &str, raw: &RawNamespaceConfig) -> Vec<ConfigItem> {
    let mut out = Vec::new();
    for (category, objects) in raw {
        let Some(config_type) = ConfigType::from_wire(category) else {
            debug!(namespace, category = %category, "dropping unknown config category");
            continue;
        };
        for obj in objects {
            out.push(ConfigItem::new(namespace, config_type, obj.name.as_str()));
        }
    }
    out
}

/// Keep items whose name contains at least one of the given substrings.
/// Case-sensitive plain substring match; an empty set keeps everything.
pub fn filter_by_name(items: Vec<ConfigItem>, names: &BTreeSet<String>) -> Vec<ConfigItem> {
    if names.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| names.iter().any(|n| item.name.contains(n.as_str())))
        .collect()
}

/// Keep items whose status category is in the given set; an empty set keeps
/// everything. Items with no validation result fall into the `notvalidated`
/// category.
pub fn filter_by_validation(
    items: Vec<ConfigItem>,
    statuses: &BTreeSet<ValidationStatus>,
) -> Vec<ConfigItem> {
    if statuses.is_empty() {
        return items;
    }
    items
        .into_iter()
        .filter(|item| statuses.contains(&item.filter_status()))
        .collect()
}

// Validation sort key. Items that never received a result sort after every
// explicit status, one past NotValidated.
fn status_sort_rank(item: &ConfigItem) -> u8 {
    match &item.validation {
        Some(v) => v.status.rank(),
        None => ValidationStatus::NotValidated.rank() + 1,
    }
}

/// Stable in-place sort over the selected field.
///
/// Namespace and name compare lexicographically; type compares on the display
/// label so the list orders the way it reads. The validation sort orders by
/// severity rank (NotValid < Warning < Valid < NotValidated < no result) with
/// namespace-then-name tie-breaks that stay ascending in both directions, so
/// equal-status runs are deterministic.
pub fn sort_items(items: &mut [ConfigItem], sort: SortState) {
    let dir = |ord: Ordering| if sort.ascending { ord } else { ord.reverse() };
    items.sort_by(|a, b| match sort.field {
        SortField::Namespace => dir(a.namespace.cmp(&b.namespace)),
        SortField::Name => dir(a.name.cmp(&b.name)),
        SortField::Type => dir(a.config_type.label().cmp(b.config_type.label())),
        SortField::ValidationStatus => dir(status_sort_rank(a).cmp(&status_sort_rank(b)))
            .then_with(|| a.namespace.cmp(&b.namespace))
            .then_with(|| a.name.cmp(&b.name)),
    });
}

/// Validation results keyed namespace -> type -> name, assembled from the
/// per-namespace validation responses of one fetch cycle.
#[derive(Debug, Clone, Default)]
pub struct ValidationTree {
    by_namespace: FxHashMap<String, NamespaceValidations>,
}

impl ValidationTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one namespace's response. A later response for the same
    /// namespace replaces that namespace's subtree only.
    pub fn insert(&mut self, namespace: impl Into<String>, validations: NamespaceValidations) {
        self.by_namespace.insert(namespace.into(), validations);
    }

    pub fn lookup(
        &self,
        namespace: &str,
        config_type: ConfigType,
        name: &str,
    ) -> Option<&ValidationResult> {
        self.by_namespace
            .get(namespace)?
            .get(&config_type)?
            .get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.by_namespace.is_empty()
    }
}

/// Attach validation results to matching items. Items without an entry keep
/// `validation: None` ("never validated", distinct from an explicit verdict).
/// Order-independent across items and idempotent for a given tree.
pub fn merge_validations(items: &mut [ConfigItem], tree: &ValidationTree) {
    for item in items.iter_mut() {
        if let Some(v) = tree.lookup(&item.namespace, item.config_type, &item.name) {
            item.validation = Some(v.clone());
        }
    }
}

/// Visible window for the given 1-based page. A start index past the end
/// yields an empty slice rather than panicking; callers reset the page on
/// list-identity changes, this just refuses to make it worse.
pub fn page_slice(items: &[ConfigItem], page: usize, page_size: usize) -> &[ConfigItem] {
    if page_size == 0 {
        return &[];
    }
    let start = page.saturating_sub(1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}
