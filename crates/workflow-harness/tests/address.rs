// crates/workflow-harness/tests/address.rs
// ============================================================================
// Module: Resource Address Tests
// Description: Parsing, rendering and ordering of resource addresses.
// ============================================================================
//! ## Overview
//! Validates the address grammar, instance keys and module path conversions.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use workflow_harness::InstanceKey;
use workflow_harness::ModulePath;
use workflow_harness::ResourceAddress;
use workflow_harness::ResourceMode;
use workflow_harness::address::AddressError;

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn managed_address_parses_type_and_name() {
    let address: ResourceAddress = "null_resource.test".parse().unwrap();
    assert_eq!(address.mode(), ResourceMode::Managed);
    assert_eq!(address.type_name(), "null_resource");
    assert_eq!(address.name(), "test");
    assert_eq!(address.key(), None);
    assert_eq!(address, ResourceAddress::managed("null_resource", "test").unwrap());
}

#[test]
fn data_prefix_selects_data_mode() {
    let address: ResourceAddress = "data.template_file.test".parse().unwrap();
    assert_eq!(address.mode(), ResourceMode::Data);
    assert_eq!(address, ResourceAddress::data("template_file", "test").unwrap());
    assert_eq!(address.to_string(), "data.template_file.test");
}

#[test]
fn bracketed_and_legacy_index_keys_are_equivalent() {
    let bracketed: ResourceAddress = "null_resource.web[2]".parse().unwrap();
    let legacy: ResourceAddress = "null_resource.web.2".parse().unwrap();
    assert_eq!(bracketed, legacy);
    assert_eq!(bracketed.key(), Some(&InstanceKey::Int(2)));
    assert_eq!(legacy.to_string(), "null_resource.web[2]");
}

#[test]
fn string_keys_render_quoted() {
    let address: ResourceAddress = "null_resource.web[\"blue\"]".parse().unwrap();
    assert_eq!(address.key(), Some(&InstanceKey::Str("blue".to_string())));
    assert_eq!(address.to_string(), "null_resource.web[\"blue\"]");
}

#[test]
fn string_keys_with_quotes_and_brackets_round_trip() {
    for key in ["a[b", "a\"b", "a\\b", "]", "\"", "\\", "", "x\"]\\["] {
        let address = ResourceAddress::managed("null_resource", "web")
            .unwrap()
            .with_key(InstanceKey::Str(key.to_string()));
        let text = address.to_string();
        let back: ResourceAddress = text.parse().unwrap();
        assert_eq!(back, address, "{text}");
    }
    let address =
        ResourceAddress::data("template_file", "t").unwrap().with_key(InstanceKey::Str("a\"b".to_string()));
    assert_eq!(address.to_string(), "data.template_file.t[\"a\\\"b\"]");
}

#[test]
fn malformed_addresses_are_rejected() {
    assert_eq!("".parse::<ResourceAddress>(), Err(AddressError::Empty));
    for input in [
        "null_resource",
        "a.b.c.d",
        "null_resource.",
        ".test",
        "null resource.test",
        "null_resource.test[",
        "null_resource.test[x]",
        "null_resource.test[\"a\"b\"]",
        "null_resource.test[\"a\\\"]",
        "null_resource.test[\"a\\n\"]",
        "null_resource[0].test",
        "data.only",
    ] {
        let err = input.parse::<ResourceAddress>().unwrap_err();
        assert!(
            matches!(err, AddressError::InvalidAddress { .. }),
            "expected invalid address for {input}, got {err}"
        );
    }
}

#[test]
fn from_parts_validates_identifiers() {
    let address =
        ResourceAddress::from_parts(ResourceMode::Data, "template_file", "x", Some(InstanceKey::Int(0)))
            .unwrap();
    assert_eq!(address.to_string(), "data.template_file.x[0]");
    assert!(ResourceAddress::from_parts(ResourceMode::Managed, "", "x", None).is_err());
    assert!(ResourceAddress::from_parts(ResourceMode::Managed, "t", "a.b", None).is_err());
    assert!(ResourceAddress::managed("a.b", "c").is_err());
    assert!(ResourceAddress::data("template_file", "").is_err());
}

// ============================================================================
// SECTION: Ordering And Serde
// ============================================================================

#[test]
fn ordering_is_mode_then_type_then_name_then_key() {
    let mut addresses: Vec<ResourceAddress> = [
        "null_resource.b",
        "data.template_file.a",
        "null_resource.a[1]",
        "aws_instance.z",
        "null_resource.a[0]",
        "null_resource.a",
    ]
    .iter()
    .map(|text| text.parse().unwrap())
    .collect();
    addresses.sort();
    let rendered: Vec<String> = addresses.iter().map(ToString::to_string).collect();
    assert_eq!(
        rendered,
        vec![
            "aws_instance.z",
            "null_resource.a",
            "null_resource.a[0]",
            "null_resource.a[1]",
            "null_resource.b",
            "data.template_file.a",
        ]
    );
}

#[test]
fn addresses_serialize_as_strings() {
    let address: ResourceAddress = "data.template_file.test".parse().unwrap();
    let json = serde_json::to_string(&address).unwrap();
    assert_eq!(json, "\"data.template_file.test\"");
    let back: ResourceAddress = serde_json::from_str(&json).unwrap();
    assert_eq!(back, address);
    assert!(serde_json::from_str::<ResourceAddress>("\"not-an-address\"").is_err());
}

// ============================================================================
// SECTION: Module Paths
// ============================================================================

#[test]
fn legacy_module_paths_start_at_root() {
    let root = ModulePath::from_legacy_path(&["root".to_string()]).unwrap();
    assert!(root.is_root());
    assert_eq!(root.to_string(), "root");

    let nested =
        ModulePath::from_legacy_path(&["root".to_string(), "network".to_string()]).unwrap();
    assert_eq!(nested, ModulePath::root().child("network"));
    assert_eq!(nested.to_legacy_path(), vec!["root".to_string(), "network".to_string()]);

    assert!(ModulePath::from_legacy_path(&[]).is_err());
    assert!(ModulePath::from_legacy_path(&["network".to_string()]).is_err());
    assert!(ModulePath::from_legacy_path(&["root".to_string(), String::new()]).is_err());
}

#[test]
fn qualified_module_paths_use_module_keyword_pairs() {
    assert_eq!(ModulePath::parse_qualified("").unwrap(), ModulePath::root());
    let nested = ModulePath::parse_qualified("module.network.module.subnets").unwrap();
    assert_eq!(nested.segments(), ["network".to_string(), "subnets".to_string()]);
    assert_eq!(nested.to_string(), "module.network.module.subnets");
    assert!(ModulePath::parse_qualified("network").is_err());
    assert!(ModulePath::parse_qualified("module.").is_err());
    assert!(ModulePath::parse_qualified("mod.network").is_err());
}
