use meshview_core::{ConfigType, RawConfigObject, RawNamespaceConfig};
use meshview_list::normalize_namespace;

fn payload(categories: &[(&str, &[&str])]) -> RawNamespaceConfig {
    let mut raw = RawNamespaceConfig::new();
    for (category, names) in categories {
        raw.insert(
            category.to_string(),
            names.iter().map(|n| RawConfigObject::named(*n)).collect(),
        );
    }
    raw
}

#[test]
fn items_are_tagged_with_their_category() {
    let raw = payload(&[
        ("gateway", &["gw"]),
        ("virtualservice", &["reviews", "ratings"]),
    ]);
    let items = normalize_namespace("bookinfo", &raw);
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i.namespace == "bookinfo"));
    assert!(items.iter().all(|i| i.validation.is_none()));
    assert_eq!(
        items.iter().filter(|i| i.config_type == ConfigType::VirtualService).count(),
        2
    );
}

#[test]
fn unknown_categories_are_dropped_silently() {
    let raw = payload(&[
        ("gateway", &["gw"]),
        ("handler", &["future-kind"]),
    ]);
    let items = normalize_namespace("ns1", &raw);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].config_type, ConfigType::Gateway);
}

#[test]
fn empty_payload_yields_no_items() {
    assert!(normalize_namespace("ns1", &RawNamespaceConfig::new()).is_empty());
}
