use serde_json::{Value, json};

use tfcheck::{
    expectation::{AttributeFormat, RawResourceAttribute, parse_attributes},
    matcher::{
        MismatchKind, SubsetError, match_plan_tree, match_raw_attribute, matches,
        verify_expectations,
    },
    plan::PlanTree,
};

fn azure_plan(group_name: &str) -> PlanTree {
    let mut tree = PlanTree::new();
    tree.insert(
        "azurerm_resource_group.rg".into(),
        json!({ "location": "centralus", "name": group_name, "id": null, "tags": null }),
    );
    tree.insert(
        "azurerm_network_security_group.nsg".into(),
        json!({
            "location": "centralus",
            "name": "MyTestResourceNSG",
            "resource_group_name": group_name,
            "security_rule": []
        }),
    );
    tree.insert(
        "azurerm_virtual_network.vnet".into(),
        json!({
            "resource_group_name": group_name,
            "name": "virtualNetwork1",
            "location": "centralus",
            "tags": { "environment": "production", "owner": "platform" },
            "address_space": ["10.0.0.0/16"],
            "dns_servers": ["10.0.0.4", "10.0.0.5"],
            "subnet": [
                { "address_prefix": "10.0.1.0/24", "name": "MyTestSubnet1", "security_group": "" },
                { "address_prefix": "10.0.3.0/24", "name": "MyTestSubnet2", "security_group": "" }
            ]
        }),
    );
    tree
}

fn azure_expectation() -> PlanTree {
    let mut tree = PlanTree::new();
    tree.insert(
        "azurerm_resource_group.rg".into(),
        json!({ "location": "centralus", "name": "MyTestResourceGroup" }),
    );
    tree.insert(
        "azurerm_network_security_group.nsg".into(),
        json!({
            "location": "centralus",
            "name": "MyTestResourceNSG",
            "resource_group_name": "MyTestResourceGroup"
        }),
    );
    tree.insert(
        "azurerm_virtual_network.vnet".into(),
        json!({
            "resource_group_name": "MyTestResourceGroup",
            "name": "virtualNetwork1",
            "tags": { "environment": "production" },
            "address_space": ["10.0.0.0/16"],
            "dns_servers": ["10.0.0.4", "10.0.0.5"],
            "subnet": [
                { "address_prefix": "10.0.1.0/24", "name": "MyTestSubnet1" },
                { "address_prefix": "10.0.3.0/24", "name": "MyTestSubnet2" }
            ]
        }),
    );
    tree
}

#[test]
fn azure_expectation_matches_its_plan() {
    assert_eq!(
        match_plan_tree(&azure_plan("MyTestResourceGroup"), &azure_expectation()),
        Ok(())
    );
}

#[test]
fn azure_expectation_names_the_wrong_group_name() {
    let mismatch =
        match_plan_tree(&azure_plan("OtherGroup"), &azure_expectation()).unwrap_err();

    assert_eq!(mismatch.path, "azurerm_resource_group.rg.name");
    assert_eq!(mismatch.kind, MismatchKind::ValueMismatch);
    assert_eq!(mismatch.actual, Some(json!("OtherGroup")));
    assert_eq!(mismatch.expected, json!("MyTestResourceGroup"));
}

#[test]
fn mismatch_message_carries_path_actual_and_expected() {
    let mismatch =
        match_plan_tree(&azure_plan("OtherGroup"), &azure_expectation()).unwrap_err();
    insta::assert_snapshot!(
        mismatch.to_string(),
        @r#"value mismatch at azurerm_resource_group.rg.name: actual="OtherGroup", expected="MyTestResourceGroup""#
    );

    let missing = matches(&json!({}), &json!({ "tags": { "env": "prod" } }), "").unwrap();
    insta::assert_snapshot!(
        missing.to_string(),
        @r#"missing key at tags: actual=<absent>, expected={"env":"prod"}"#
    );
}

#[test]
fn missing_resource_is_reported_at_its_address() {
    let mut expected = azure_expectation();
    expected.insert("azurerm_subnet.extra".into(), json!({ "name": "x" }));

    let mismatch =
        match_plan_tree(&azure_plan("MyTestResourceGroup"), &expected).unwrap_err();
    assert_eq!(mismatch.path, "azurerm_subnet.extra");
    assert_eq!(mismatch.kind, MismatchKind::MissingKey);
    assert_eq!(mismatch.actual, None);
}

#[test]
fn extra_actual_keys_are_ignored() {
    let actual = json!({ "a": 1, "b": { "c": 2, "d": 3 }, "e": [1, 2] });
    assert_eq!(matches(&actual, &json!({ "b": { "d": 3 } }), ""), None);
    assert_eq!(matches(&actual, &json!({}), ""), None);
}

#[test]
fn missing_nested_key_names_full_path() {
    let actual = json!({ "tags": { "environment": "production" } });
    let mismatch = matches(&actual, &json!({ "tags": { "owner": "me" } }), "vnet").unwrap();

    assert_eq!(mismatch.path, "vnet.tags.owner");
    assert_eq!(mismatch.kind, MismatchKind::MissingKey);
    assert_eq!(mismatch.expected, json!("me"));
}

#[test]
fn sequences_are_positional() {
    let actual = json!([{ "name": "b" }, { "name": "a" }]);
    let expected = json!([{ "name": "a" }, { "name": "b" }]);

    let mismatch = matches(&actual, &expected, "subnet").unwrap();
    assert_eq!(mismatch.path, "subnet[0].name");
    assert_eq!(mismatch.actual, Some(json!("b")));
    assert_eq!(mismatch.expected, json!("a"));
}

#[test]
fn sequence_elements_are_subset_matched() {
    let actual = json!([{ "name": "a", "id": 1 }, { "name": "b", "id": 2 }]);
    assert_eq!(
        matches(&actual, &json!([{ "name": "a" }, { "name": "b" }]), "s"),
        None
    );
}

#[test]
fn sequence_length_must_match() {
    let mismatch = matches(&json!([1, 2, 3]), &json!([1, 2]), "dns").unwrap();
    assert_eq!(mismatch.path, "dns");
    assert_eq!(mismatch.kind, MismatchKind::LengthMismatch);
    assert_eq!(mismatch.actual, Some(json!([1, 2, 3])));
}

#[test]
fn numbers_compare_by_value() {
    assert_eq!(matches(&json!(16), &json!(16.0), "n"), None);
    assert_eq!(matches(&json!(16.0), &json!(16u64), "n"), None);
    assert_eq!(matches(&json!(-4), &json!(-4.0), "n"), None);

    let mismatch = matches(&json!(16), &json!(15), "n").unwrap();
    assert_eq!(mismatch.kind, MismatchKind::ValueMismatch);
}

#[test]
fn scalars_are_type_aware() {
    let cases: Vec<(Value, Value)> = vec![
        (json!("16"), json!(16)),
        (json!(16), json!("16")),
        (json!(true), json!("true")),
        (json!(null), json!(false)),
        (json!("x"), json!(null)),
        (json!({ "a": 1 }), json!([1])),
        (json!([1]), json!({ "a": 1 })),
    ];

    for (actual, expected) in cases {
        let mismatch = matches(&actual, &expected, "attr").unwrap();
        assert_eq!(mismatch.kind, MismatchKind::TypeMismatch, "{actual} vs {expected}");
        assert_eq!(mismatch.path, "attr");
    }

    assert_eq!(matches(&json!(null), &json!(null), "attr"), None);
    assert_eq!(
        matches(&json!(true), &json!(false), "attr").unwrap().kind,
        MismatchKind::ValueMismatch
    );
}

fn file_plan() -> PlanTree {
    let document = json!({ "length": 16, "nested": { "value": 16 }, "extra": "ignored" });
    let mut tree = PlanTree::new();
    tree.insert(
        "local_file.json".into(),
        json!({ "filename": "out.json", "content": serde_json::to_string(&document).unwrap() }),
    );
    tree.insert(
        "local_file.yaml".into(),
        json!({ "filename": "out.yaml", "content": serde_yaml::to_string(&document).unwrap() }),
    );
    tree.insert("local_file.number".into(), json!({ "content": 16 }));
    tree
}

#[test]
fn raw_json_and_yaml_attributes_round_trip() {
    let plan = file_plan();
    let expected = json!({ "length": 16, "nested": { "value": 16 } });

    let json_raw = RawResourceAttribute::new(
        "local_file.json",
        "content",
        AttributeFormat::Json,
        expected.clone(),
    );
    let yaml_raw =
        RawResourceAttribute::new("local_file.yaml", "content", AttributeFormat::Yaml, expected);

    assert!(match_raw_attribute(&plan, &json_raw).is_ok());
    assert!(match_raw_attribute(&plan, &yaml_raw).is_ok());
}

#[test]
fn raw_attribute_mismatch_path_starts_at_the_attribute() {
    let raw = RawResourceAttribute::new(
        "local_file.json",
        "content",
        AttributeFormat::Json,
        json!({ "nested": { "value": 17 } }),
    );

    let err = match_raw_attribute(&file_plan(), &raw).unwrap_err();
    let SubsetError::Mismatch(mismatch) = err else {
        panic!("expected mismatch, got {err:?}");
    };
    assert_eq!(mismatch.path, "local_file.json.content.nested.value");
    assert_eq!(mismatch.actual, Some(json!(16)));
}

#[test]
fn raw_attribute_rejects_non_string_and_undecodable_values() {
    let plan = file_plan();

    let not_string =
        RawResourceAttribute::new("local_file.number", "content", AttributeFormat::Json, json!({}));
    assert!(matches!(
        match_raw_attribute(&plan, &not_string),
        Err(SubsetError::NotAString { path, .. }) if path == "local_file.number.content"
    ));

    // a YAML document is not valid JSON
    let wrong_format =
        RawResourceAttribute::new("local_file.yaml", "content", AttributeFormat::Json, json!({}));
    assert!(matches!(
        match_raw_attribute(&plan, &wrong_format),
        Err(SubsetError::Format { format, .. }) if format == "json"
    ));
}

#[test]
fn raw_attribute_missing_resource_or_attribute() {
    let plan = file_plan();

    let missing_resource =
        RawResourceAttribute::new("local_file.toml", "content", AttributeFormat::Json, json!({}));
    let Err(SubsetError::Mismatch(mismatch)) = match_raw_attribute(&plan, &missing_resource) else {
        panic!("expected a missing resource mismatch");
    };
    assert_eq!(mismatch.path, "local_file.toml");
    assert_eq!(mismatch.kind, MismatchKind::MissingKey);

    let missing_attribute =
        RawResourceAttribute::new("local_file.json", "body", AttributeFormat::Json, json!({}));
    let Err(SubsetError::Mismatch(mismatch)) = match_raw_attribute(&plan, &missing_attribute)
    else {
        panic!("expected a missing attribute mismatch");
    };
    assert_eq!(mismatch.path, "local_file.json.body");
}

#[test]
fn verify_expectations_checks_attributes_then_raw_attributes() {
    let plan = file_plan();
    let mut description = tfcheck::expectation::ResourceDescription::new();
    description.insert(
        "local_file.json".into(),
        parse_attributes(r#"{"filename": "out.json"}"#).unwrap(),
    );

    let raws = vec![RawResourceAttribute::new(
        "local_file.yaml",
        "content",
        AttributeFormat::Yaml,
        json!({ "length": 16 }),
    )];
    assert!(verify_expectations(&plan, &description, &raws).is_ok());

    description.insert(
        "local_file.yaml".into(),
        parse_attributes(r#"{"filename": "wrong.yaml"}"#).unwrap(),
    );
    let bad_raws = vec![RawResourceAttribute::new(
        "local_file.yaml",
        "content",
        AttributeFormat::Yaml,
        json!({ "length": 99 }),
    )];
    let Err(SubsetError::Mismatch(mismatch)) = verify_expectations(&plan, &description, &bad_raws)
    else {
        panic!("expected a mismatch");
    };
    assert_eq!(mismatch.path, "local_file.yaml.filename");
}

#[test]
fn first_mismatch_follows_the_order_keys_were_written() {
    let actual = json!({ "location": "westus", "name": "OtherGroup" });
    let expected: Value =
        serde_json::from_str(r#"{"name": "MyTestResourceGroup", "location": "centralus"}"#)
            .unwrap();

    let mismatch = matches(&actual, &expected, "azurerm_resource_group.rg").unwrap();
    assert_eq!(mismatch.path, "azurerm_resource_group.rg.name");
    assert_eq!(mismatch.kind, MismatchKind::ValueMismatch);

    let attributes =
        parse_attributes(r#"{"subnet": [], "address_space": ["10.1.0.0/16"]}"#).unwrap();
    let actual = json!({ "address_space": ["10.0.0.0/16"], "subnet": [{ "name": "a" }] });
    let mismatch = matches(&actual, &Value::Object(attributes), "vnet").unwrap();
    assert_eq!(mismatch.path, "vnet.subnet");
    assert_eq!(mismatch.kind, MismatchKind::LengthMismatch);
}
