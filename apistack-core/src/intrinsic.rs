//! CloudFormation intrinsic function helpers
//!
//! Resource properties are plain `serde_json::Value`s. Cross-resource links are
//! expressed with `Ref`, `Fn::GetAtt` and `Fn::Sub`, and [`referenced_ids`]
//! recovers them when the dependency graph is built.

use serde_json::{json, Value};
use std::collections::BTreeSet;

/// `{"Ref": logical_id}`
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `{"Fn::GetAtt": [logical_id, attribute]}`
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `{"Fn::Join": [separator, parts]}`
pub fn join(separator: &str, parts: Vec<Value>) -> Value {
    json!({ "Fn::Join": [separator, parts] })
}

/// `{"Fn::Sub": template}`
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

pub fn partition() -> Value {
    reference("AWS::Partition")
}

pub fn region() -> Value {
    reference("AWS::Region")
}

pub fn account_id() -> Value {
    reference("AWS::AccountId")
}

pub fn url_suffix() -> Value {
    reference("AWS::URLSuffix")
}

/// Collect the logical ids a value refers to
///
/// Pseudo parameters (`AWS::*`) are not resources and are skipped.
pub fn referenced_ids(value: &Value) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    collect(value, &mut ids);
    ids
}

fn collect(value: &Value, ids: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    insert(target, ids);
                    return;
                }
                if let Some(att) = map.get("Fn::GetAtt") {
                    match att {
                        Value::Array(parts) => {
                            if let Some(Value::String(target)) = parts.first() {
                                insert(target, ids);
                            }
                        }
                        Value::String(dotted) => {
                            if let Some((target, _)) = dotted.split_once('.') {
                                insert(target, ids);
                            }
                        }
                        _ => {}
                    }
                    return;
                }
                if let Some(sub) = map.get("Fn::Sub") {
                    match sub {
                        Value::String(template) => collect_sub(template, ids),
                        Value::Array(parts) => {
                            if let Some(Value::String(template)) = parts.first() {
                                collect_sub(template, ids);
                            }
                            for part in parts.iter().skip(1) {
                                collect(part, ids);
                            }
                        }
                        _ => {}
                    }
                    return;
                }
            }
            for v in map.values() {
                collect(v, ids);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect(v, ids);
            }
        }
        _ => {}
    }
}

/// `${Name}` and `${Name.Attr}` placeholders; `${!Literal}` is an escape
fn collect_sub(template: &str, ids: &mut BTreeSet<String>) {
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        if !name.starts_with('!') {
            let target = name.split_once('.').map_or(name, |(id, _)| id);
            insert(target, ids);
        }
        rest = &after[end + 1..];
    }
}

fn insert(target: &str, ids: &mut BTreeSet<String>) {
    if !target.starts_with("AWS::") && !target.is_empty() {
        ids.insert(target.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_and_get_att() {
        let value = json!({
            "UserPoolId": reference("UserPool6BA7E5F2"),
            "ProviderARNs": [get_att("UserPool6BA7E5F2", "Arn")],
            "RoleArn": { "Fn::GetAtt": "FnRoleABCD1234.Arn" },
        });

        let ids = referenced_ids(&value);
        assert_eq!(
            ids.into_iter().collect::<Vec<_>>(),
            vec!["FnRoleABCD1234".to_string(), "UserPool6BA7E5F2".to_string()]
        );
    }

    #[test]
    fn test_pseudo_parameters_skipped() {
        let value = join("", vec![json!("arn:"), partition(), json!(":"), region()]);
        assert!(referenced_ids(&value).is_empty());
    }

    #[test]
    fn test_sub_placeholders() {
        let value = sub("arn:${AWS::Partition}:execute-api:${Api1234}/${Stage.Name}/${!Literal}");
        let ids = referenced_ids(&value);
        assert!(ids.contains("Api1234"));
        assert!(ids.contains("Stage"));
        assert_eq!(ids.len(), 2);
    }
}
