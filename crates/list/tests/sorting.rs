use meshview_core::{ConfigItem, ConfigType, SortField, SortState, ValidationResult, ValidationStatus};
use meshview_list::sort_items;

fn item(ns: &str, t: ConfigType, name: &str) -> ConfigItem {
    ConfigItem::new(ns, t, name)
}

fn validated(ns: &str, t: ConfigType, name: &str, status: ValidationStatus) -> ConfigItem {
    let mut i = ConfigItem::new(ns, t, name);
    i.validation = Some(ValidationResult::new(status));
    i
}

fn by(field: SortField, ascending: bool) -> SortState {
    SortState { field, ascending }
}

#[test]
fn namespace_ascending_orders_merged_namespaces() {
    // Two namespaces each contributing one VirtualService of the same name.
    let mut items = vec![
        item("ns2", ConfigType::VirtualService, "reviews"),
        item("ns1", ConfigType::VirtualService, "reviews"),
    ];
    sort_items(&mut items, by(SortField::Namespace, true));
    let order: Vec<&str> = items.iter().map(|i| i.namespace.as_str()).collect();
    assert_eq!(order, vec!["ns1", "ns2"]);
}

#[test]
fn sort_is_stable_on_ties() {
    let mut items = vec![
        item("ns1", ConfigType::Gateway, "b"),
        item("ns1", ConfigType::Gateway, "a"),
        item("ns1", ConfigType::Gateway, "c"),
    ];
    sort_items(&mut items, by(SortField::Namespace, true));
    // All namespaces equal: input order preserved.
    let order: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(order, vec!["b", "a", "c"]);
}

#[test]
fn sort_is_idempotent() {
    let mut once = vec![
        item("ns2", ConfigType::Rule, "z"),
        item("ns1", ConfigType::Gateway, "a"),
        item("ns1", ConfigType::Rule, "m"),
    ];
    sort_items(&mut once, by(SortField::Name, true));
    let mut twice = once.clone();
    sort_items(&mut twice, by(SortField::Name, true));
    assert_eq!(once, twice);
}

#[test]
fn descending_reverses_when_no_ties() {
    let mut asc = vec![
        item("ns1", ConfigType::Gateway, "c"),
        item("ns1", ConfigType::Gateway, "a"),
        item("ns1", ConfigType::Gateway, "b"),
    ];
    let mut desc = asc.clone();
    sort_items(&mut asc, by(SortField::Name, true));
    sort_items(&mut desc, by(SortField::Name, false));
    let reversed: Vec<ConfigItem> = asc.into_iter().rev().collect();
    assert_eq!(reversed, desc);
}

#[test]
fn type_sorts_by_display_label() {
    let mut items = vec![
        item("ns1", ConfigType::VirtualService, "x"),
        item("ns1", ConfigType::QuotaSpecBinding, "x"),
        item("ns1", ConfigType::DestinationRule, "x"),
        item("ns1", ConfigType::QuotaSpec, "x"),
        item("ns1", ConfigType::Gateway, "x"),
    ];
    sort_items(&mut items, by(SortField::Type, true));
    let labels: Vec<&str> = items.iter().map(|i| i.config_type.label()).collect();
    assert_eq!(
        labels,
        vec!["DestinationRule", "Gateway", "QuotaSpec", "QuotaSpecBinding", "VirtualService"]
    );
}

#[test]
fn validation_sort_orders_by_severity_rank() {
    let mut items = vec![
        validated("ns1", ConfigType::Gateway, "a", ValidationStatus::Valid),
        validated("ns1", ConfigType::Gateway, "b", ValidationStatus::NotValid),
        validated("ns1", ConfigType::Gateway, "c", ValidationStatus::NotValidated),
        validated("ns1", ConfigType::Gateway, "d", ValidationStatus::Warning),
    ];
    sort_items(&mut items, by(SortField::ValidationStatus, true));
    let order: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(order, vec!["b", "d", "a", "c"]);
}

#[test]
fn unvalidated_items_sort_after_every_status_ascending() {
    let mut items = vec![
        item("ns1", ConfigType::Gateway, "never"),
        validated("ns1", ConfigType::Gateway, "flagged", ValidationStatus::NotValidated),
        validated("ns1", ConfigType::Gateway, "ok", ValidationStatus::Valid),
    ];
    sort_items(&mut items, by(SortField::ValidationStatus, true));
    let order: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(order, vec!["ok", "flagged", "never"]);

    // Direction flips the primary key: never-validated first.
    sort_items(&mut items, by(SortField::ValidationStatus, false));
    let order: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(order, vec!["never", "flagged", "ok"]);
}

#[test]
fn validation_ties_break_by_namespace_then_name_in_both_directions() {
    let mut items = vec![
        validated("ns2", ConfigType::Gateway, "a", ValidationStatus::Valid),
        validated("ns1", ConfigType::Gateway, "b", ValidationStatus::Valid),
        validated("ns1", ConfigType::Gateway, "a", ValidationStatus::Valid),
    ];
    sort_items(&mut items, by(SortField::ValidationStatus, true));
    let order: Vec<(&str, &str)> = items.iter().map(|i| (i.namespace.as_str(), i.name.as_str())).collect();
    assert_eq!(order, vec![("ns1", "a"), ("ns1", "b"), ("ns2", "a")]);

    // Equal ranks everywhere: direction does not disturb the tie-break order.
    sort_items(&mut items, by(SortField::ValidationStatus, false));
    let order: Vec<(&str, &str)> = items.iter().map(|i| (i.namespace.as_str(), i.name.as_str())).collect();
    assert_eq!(order, vec![("ns1", "a"), ("ns1", "b"), ("ns2", "a")]);
}
