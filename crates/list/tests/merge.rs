use std::collections::BTreeMap;

use meshview_core::{ConfigItem, ConfigType, NamespaceValidations, ValidationResult, ValidationStatus};
use meshview_list::{merge_validations, ValidationTree};

fn item(ns: &str, t: ConfigType, name: &str) -> ConfigItem {
    ConfigItem::new(ns, t, name)
}

fn validations_for(
    t: ConfigType,
    entries: &[(&str, ValidationStatus)],
) -> NamespaceValidations {
    let mut by_name = BTreeMap::new();
    for (name, status) in entries {
        by_name.insert(name.to_string(), ValidationResult::new(*status));
    }
    let mut v = NamespaceValidations::new();
    v.insert(t, by_name);
    v
}

#[test]
fn merge_attaches_matching_results_only() {
    let mut items = vec![
        item("ns1", ConfigType::VirtualService, "reviews"),
        item("ns1", ConfigType::VirtualService, "ratings"),
        item("ns2", ConfigType::VirtualService, "reviews"),
    ];
    let mut tree = ValidationTree::new();
    tree.insert(
        "ns1",
        validations_for(ConfigType::VirtualService, &[("reviews", ValidationStatus::Warning)]),
    );
    merge_validations(&mut items, &tree);

    assert_eq!(items[0].filter_status(), ValidationStatus::Warning);
    assert!(items[1].validation.is_none());
    // Same type and name in another namespace stays untouched.
    assert!(items[2].validation.is_none());
}

#[test]
fn merge_is_idempotent() {
    let mut items = vec![item("ns1", ConfigType::Gateway, "gw")];
    let mut tree = ValidationTree::new();
    tree.insert(
        "ns1",
        validations_for(ConfigType::Gateway, &[("gw", ValidationStatus::Valid)]),
    );
    merge_validations(&mut items, &tree);
    let once = items.clone();
    merge_validations(&mut items, &tree);
    assert_eq!(items, once);
}

#[test]
fn later_namespace_response_replaces_that_namespace_only() {
    let mut tree = ValidationTree::new();
    tree.insert(
        "ns1",
        validations_for(ConfigType::Gateway, &[("gw", ValidationStatus::Valid)]),
    );
    tree.insert(
        "ns2",
        validations_for(ConfigType::Gateway, &[("gw", ValidationStatus::Warning)]),
    );
    // Second response for ns1 supersedes its earlier subtree.
    tree.insert(
        "ns1",
        validations_for(ConfigType::Gateway, &[("gw", ValidationStatus::NotValid)]),
    );

    let v1 = tree.lookup("ns1", ConfigType::Gateway, "gw").expect("ns1 entry");
    let v2 = tree.lookup("ns2", ConfigType::Gateway, "gw").expect("ns2 entry");
    assert_eq!(v1.status, ValidationStatus::NotValid);
    assert_eq!(v2.status, ValidationStatus::Warning);
}

#[test]
fn lookup_misses_leave_validation_absent() {
    let mut items = vec![
        item("ns1", ConfigType::Gateway, "gw"),
        item("ns9", ConfigType::Gateway, "gw"),
        item("ns1", ConfigType::Rule, "gw"),
    ];
    let mut tree = ValidationTree::new();
    tree.insert(
        "ns1",
        validations_for(ConfigType::Gateway, &[("other", ValidationStatus::Valid)]),
    );
    merge_validations(&mut items, &tree);
    assert!(items.iter().all(|i| i.validation.is_none()));
}

#[test]
fn empty_tree_is_a_no_op() {
    let mut items = vec![item("ns1", ConfigType::Gateway, "gw")];
    let tree = ValidationTree::new();
    assert!(tree.is_empty());
    merge_validations(&mut items, &tree);
    assert!(items[0].validation.is_none());
}
