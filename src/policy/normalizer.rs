//! 策略文档规范化器
//! 将字段形状不统一的策略 JSON（字符串 / 字符串数组 / 缺失）转换为规范化模型

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use super::model::{CanonicalPolicy, CanonicalStatement, Condition, ConditionEntries, Principal, PrincipalMap};
use crate::error::{FinderError, FinderResult};

/// 规范化配置
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsePolicyOptions {
    /// 将 Action / NotAction 统一转为小写（Resource / Principal / Condition 不受影响）
    pub action_to_lower_case: bool,
}

/// 宽松的策略文档形状
#[derive(Debug, Deserialize)]
struct FuzzyPolicy {
    #[serde(rename = "Version", default)]
    version: String,
    #[serde(rename = "Statement", default, deserialize_with = "present")]
    statement: Option<Value>,
}

/// 宽松的语句形状：各字段保留原始 JSON 值
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FuzzyStatement {
    #[serde(default)]
    sid: String,
    #[serde(default)]
    effect: String,
    #[serde(default, deserialize_with = "present")]
    action: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    not_action: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    resource: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    principal: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    not_principal: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    condition: Option<Value>,
}

// 字段出现即为 Some（包括 null），缺失才是 None
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// 规范化策略文档
///
/// 要么返回完整有效的 [`CanonicalPolicy`]，要么返回错误，不会返回半成品。
pub fn normalize(src: &[u8], opts: &ParsePolicyOptions) -> FinderResult<CanonicalPolicy> {
    let fuzzy: FuzzyPolicy = serde_json::from_slice(src).map_err(FinderError::PolicyParse)?;

    // Statement 允许是单个对象或对象数组；null 与缺失等价
    let raw_statements = match fuzzy.statement {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(obj @ Value::Object(_)) => vec![obj],
        Some(other) => return Err(FinderError::malformed("Statement", other.to_string())),
    };

    let mut statements = Vec::with_capacity(raw_statements.len());
    for (idx, raw) in raw_statements.into_iter().enumerate() {
        if !raw.is_object() {
            return Err(FinderError::malformed(format!("Statement[{}]", idx), raw.to_string()));
        }
        let fuzzy_stmt: FuzzyStatement =
            serde_json::from_value(raw).map_err(FinderError::PolicyParse)?;
        statements.push(normalize_statement(fuzzy_stmt, opts)?);
    }

    debug!("策略文档规范化完成，版本：{}，语句数：{}", fuzzy.version, statements.len());

    Ok(CanonicalPolicy {
        version: fuzzy.version,
        statements,
    })
}

/// 规范化单条语句
fn normalize_statement(f: FuzzyStatement, opts: &ParsePolicyOptions) -> FinderResult<CanonicalStatement> {
    let mut action = normalize_strings("Action", f.action.as_ref(), ScalarMode::Strict)?;
    let mut not_action = normalize_strings("NotAction", f.not_action.as_ref(), ScalarMode::Strict)?;
    if opts.action_to_lower_case {
        to_lower(&mut action);
        to_lower(&mut not_action);
    }

    Ok(CanonicalStatement {
        sid: f.sid,
        effect: f.effect,
        action,
        not_action,
        resource: normalize_strings("Resource", f.resource.as_ref(), ScalarMode::Strict)?,
        principal: normalize_principal("Principal", f.principal.as_ref())?,
        not_principal: normalize_principal("NotPrincipal", f.not_principal.as_ref())?,
        condition: normalize_condition(f.condition.as_ref())?,
    })
}

/// 标量处理模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarMode {
    /// 只接受字符串
    Strict,
    /// 布尔 / 数字转为字符串表示（条件值专用）
    Stringify,
}

/// 将 字符串 / 字符串数组 / 缺失 统一为字符串列表
fn normalize_strings(field: &str, raw: Option<&Value>, mode: ScalarMode) -> FinderResult<Vec<String>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    match raw {
        Value::Array(items) => items
            .iter()
            .map(|item| scalar_to_string(item, mode).ok_or_else(|| FinderError::malformed(field, raw.to_string())))
            .collect(),
        scalar => scalar_to_string(scalar, mode)
            .map(|s| vec![s])
            .ok_or_else(|| FinderError::malformed(field, raw.to_string())),
    }
}

fn scalar_to_string(value: &Value, mode: ScalarMode) -> Option<String> {
    match (value, mode) {
        (Value::String(s), _) => Some(s.clone()),
        (Value::Bool(b), ScalarMode::Stringify) => Some(b.to_string()),
        (Value::Number(n), ScalarMode::Stringify) => Some(n.to_string()),
        _ => None,
    }
}

/// 规范化 Principal：对象 -> 类型映射，"*" -> 通配符，缺失 -> 空映射
fn normalize_principal(field: &str, raw: Option<&Value>) -> FinderResult<Principal> {
    match raw {
        None => Ok(Principal::default()),
        Some(Value::String(s)) if s == "*" => Ok(Principal::Wildcard),
        Some(Value::Object(obj)) => {
            let mut mapping = PrincipalMap::new();
            for (kind, ids) in obj {
                let key_field = format!("{}.{}", field, kind);
                mapping.insert(kind.clone(), normalize_strings(&key_field, Some(ids), ScalarMode::Strict)?);
            }
            Ok(Principal::Mapping(mapping))
        }
        Some(other) => Err(FinderError::malformed(field, other.to_string())),
    }
}

/// 规范化 Condition：两级映射，每个叶子值统一为字符串列表
fn normalize_condition(raw: Option<&Value>) -> FinderResult<Condition> {
    let Some(raw) = raw else {
        return Ok(Condition::new());
    };
    let Value::Object(operators) = raw else {
        return Err(FinderError::malformed("Condition", raw.to_string()));
    };

    let mut condition = Condition::new();
    for (operator, entries) in operators {
        let Value::Object(entries) = entries else {
            return Err(FinderError::malformed(format!("Condition.{}", operator), entries.to_string()));
        };
        let mut normalized = ConditionEntries::new();
        for (key, value) in entries {
            let field = format!("Condition.{}.{}", operator, key);
            normalized.insert(key.clone(), normalize_strings(&field, Some(value), ScalarMode::Stringify)?);
        }
        condition.insert(operator.clone(), normalized);
    }
    Ok(condition)
}

fn to_lower(values: &mut [String]) {
    for value in values.iter_mut() {
        *value = value.to_lowercase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUZZY_POLICY_JSON: &str = r#"{
        "Version": "2012-10-17",
        "Statement": [{
            "Sid": "1",
            "Effect": "Allow",
            "Action": "s3:ListBucket",
            "Principal": "*",
            "Resource": "arn:aws:s3:::example_bucket"
        }, {
            "Sid": "2",
            "Effect": "Deny",
            "Action": ["s3:DeleteObject", "s3:PutObject"],
            "Resource": ["arn:aws:s3:::example_bucket/*"],
            "Principal": {
                "AWS": "123456789012"
            },
            "Condition": {
                "ArnNotEquals": {
                    "aws:PrincipalArn": "arn:aws:iam::444455556666:user/user-name"
                }
            }
        }]
    }"#;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn parse(json: &str) -> FinderResult<CanonicalPolicy> {
        normalize(json.as_bytes(), &ParsePolicyOptions::default())
    }

    #[test]
    fn test_normalize_fuzzy_policy() {
        let policy = parse(FUZZY_POLICY_JSON).unwrap();

        let mut aws = PrincipalMap::new();
        aws.insert("AWS".to_string(), strings(&["123456789012"]));
        let mut arn_not_equals = ConditionEntries::new();
        arn_not_equals.insert(
            "aws:PrincipalArn".to_string(),
            strings(&["arn:aws:iam::444455556666:user/user-name"]),
        );
        let mut condition = Condition::new();
        condition.insert("ArnNotEquals".to_string(), arn_not_equals);

        let expected = CanonicalPolicy {
            version: "2012-10-17".to_string(),
            statements: vec![
                CanonicalStatement {
                    sid: "1".to_string(),
                    effect: "Allow".to_string(),
                    action: strings(&["s3:ListBucket"]),
                    not_action: Vec::new(),
                    resource: strings(&["arn:aws:s3:::example_bucket"]),
                    principal: Principal::Wildcard,
                    not_principal: Principal::default(),
                    condition: Condition::new(),
                },
                CanonicalStatement {
                    sid: "2".to_string(),
                    effect: "Deny".to_string(),
                    action: strings(&["s3:DeleteObject", "s3:PutObject"]),
                    not_action: Vec::new(),
                    resource: strings(&["arn:aws:s3:::example_bucket/*"]),
                    principal: Principal::Mapping(aws),
                    not_principal: Principal::default(),
                    condition,
                },
            ],
        };
        assert_eq!(policy, expected);
    }

    #[test]
    fn test_absent_fields_become_empty() {
        let policy = parse(r#"{"Statement":[{"Effect":"Allow"}]}"#).unwrap();
        let stmt = &policy.statements[0];

        assert_eq!(policy.version, "");
        assert_eq!(stmt.sid, "");
        assert!(stmt.action.is_empty());
        assert!(stmt.not_action.is_empty());
        assert!(stmt.resource.is_empty());
        assert_eq!(stmt.principal, Principal::Mapping(PrincipalMap::new()));
        assert_eq!(stmt.not_principal, Principal::Mapping(PrincipalMap::new()));
        assert!(stmt.condition.is_empty());
    }

    #[test]
    fn test_wildcard_and_absent_principal_differ() {
        let policy = parse(r#"{"Statement":[{"Principal":"*"},{}]}"#).unwrap();
        assert_eq!(policy.statements[0].principal, Principal::Wildcard);
        assert_eq!(policy.statements[1].principal, Principal::default());
        assert_ne!(policy.statements[0].principal, policy.statements[1].principal);
    }

    #[test]
    fn test_condition_scalars_are_stringified() {
        let policy = parse(
            r#"{"Statement":[{"Condition":{
                "Bool":{"aws:SecureTransport":false},
                "NumericLessThan":{"s3:max-keys":[10, "20"]}
            }}]}"#,
        )
        .unwrap();
        let condition = &policy.statements[0].condition;

        assert_eq!(condition["Bool"]["aws:SecureTransport"], strings(&["false"]));
        assert_eq!(condition["NumericLessThan"]["s3:max-keys"], strings(&["10", "20"]));
    }

    #[test]
    fn test_action_to_lower_case_only_touches_actions() {
        let opts = ParsePolicyOptions {
            action_to_lower_case: true,
        };
        let policy = normalize(
            br#"{"Statement":[{
                "Action":["S3:GetObject"],
                "NotAction":"IAM:PassRole",
                "Resource":"arn:aws:s3:::Bucket/Key",
                "Principal":{"AWS":"arn:aws:iam::123456789012:role/Admin"}
            }]}"#,
            &opts,
        )
        .unwrap();
        let stmt = &policy.statements[0];

        assert_eq!(stmt.action, strings(&["s3:getobject"]));
        assert_eq!(stmt.not_action, strings(&["iam:passrole"]));
        assert_eq!(stmt.resource, strings(&["arn:aws:s3:::Bucket/Key"]));
        assert_eq!(
            stmt.principal.get("AWS"),
            Some(&strings(&["arn:aws:iam::123456789012:role/Admin"])[..])
        );
    }

    #[test]
    fn test_single_statement_object_is_accepted() {
        let policy = parse(r#"{"Version":"2012-10-17","Statement":{"Effect":"Allow","Action":"*"}}"#).unwrap();
        assert_eq!(policy.statements.len(), 1);
        assert_eq!(policy.statements[0].action, strings(&["*"]));
    }

    #[test]
    fn test_malformed_action_is_rejected() {
        let err = parse(r#"{"Statement":[{"Action":{"s3":"GetObject"}}]}"#).unwrap_err();
        match err {
            FinderError::MalformedField { field, raw } => {
                assert_eq!(field, "Action");
                assert!(raw.contains("GetObject"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_non_string_action_element_is_rejected() {
        let err = parse(r#"{"Statement":[{"Action":["s3:GetObject", 1]}]}"#).unwrap_err();
        assert!(matches!(err, FinderError::MalformedField { ref field, .. } if field == "Action"));
    }

    #[test]
    fn test_null_statement_is_empty() {
        let policy = parse(r#"{"Version":"2012-10-17","Statement":null}"#).unwrap();
        assert_eq!(policy.version, "2012-10-17");
        assert!(policy.statements.is_empty());
        assert!(matches!(
            parse(r#"{"Statement":"Allow"}"#),
            Err(FinderError::MalformedField { ref field, .. }) if field == "Statement"
        ));
    }

    #[test]
    fn test_null_field_is_rejected() {
        let err = parse(r#"{"Statement":[{"Resource":null}]}"#).unwrap_err();
        assert!(matches!(err, FinderError::MalformedField { ref field, .. } if field == "Resource"));
    }

    #[test]
    fn test_malformed_principal_is_rejected() {
        for principal in [r#"["*"]"#, r#""arn:aws:iam::123456789012:root""#, "true"] {
            let json = format!(r#"{{"Statement":[{{"Principal":{}}}]}}"#, principal);
            let err = parse(&json).unwrap_err();
            assert!(
                matches!(err, FinderError::MalformedField { ref field, .. } if field == "Principal"),
                "principal {principal} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_malformed_principal_value_names_key() {
        let err = parse(r#"{"Statement":[{"NotPrincipal":{"AWS":42}}]}"#).unwrap_err();
        assert!(matches!(err, FinderError::MalformedField { ref field, .. } if field == "NotPrincipal.AWS"));
    }

    #[test]
    fn test_malformed_condition_is_rejected() {
        let err = parse(r#"{"Statement":[{"Condition":{"StringEquals":"x"}}]}"#).unwrap_err();
        assert!(matches!(err, FinderError::MalformedField { ref field, .. } if field == "Condition.StringEquals"));

        let err = parse(r#"{"Statement":[{"Condition":{"StringEquals":{"k":{"nested":1}}}}]}"#).unwrap_err();
        assert!(matches!(err, FinderError::MalformedField { ref field, .. } if field == "Condition.StringEquals.k"));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(parse("{not json"), Err(FinderError::PolicyParse(_))));
        assert!(matches!(parse(r#"{"Statement":[{"Effect":1}]}"#), Err(FinderError::PolicyParse(_))));
    }
}
