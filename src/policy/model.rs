//! 规范化策略数据模型
//! 仅存储规范化后的数据，所有字段形状固定，支持序列化（随命中记录输出）

use std::collections::BTreeMap;
use serde::{Serialize, Serializer};

/// Principal 类型名 -> 标识列表（如 "AWS" -> ["123456789012"]）
pub type PrincipalMap = BTreeMap<String, Vec<String>>;

/// 条件键 -> 条件值列表
pub type ConditionEntries = BTreeMap<String, Vec<String>>;

/// 条件运算符 -> (条件键 -> 条件值列表)
pub type Condition = BTreeMap<String, ConditionEntries>;

/// Principal / NotPrincipal：通配符或类型映射，两者是不同的变体
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// 字面量 "*"
    Wildcard,
    /// 类型名 -> 标识列表；源字段缺失时为空映射
    Mapping(PrincipalMap),
}

impl Principal {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Principal::Wildcard)
    }

    /// 按类型名取标识列表，映射中不存在该键时返回空列表
    ///
    /// 通配符没有类型映射，返回 `None`。
    pub fn get(&self, key: &str) -> Option<&[String]> {
        match self {
            Principal::Wildcard => None,
            Principal::Mapping(map) => Some(map.get(key).map(Vec::as_slice).unwrap_or(&[])),
        }
    }
}

impl Default for Principal {
    fn default() -> Self {
        Principal::Mapping(PrincipalMap::new())
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Principal::Wildcard => serializer.serialize_str("*"),
            Principal::Mapping(map) => map.serialize(serializer),
        }
    }
}

/// 规范化后的单条语句：八个键始终存在
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CanonicalStatement {
    pub sid: String,
    pub effect: String,
    pub action: Vec<String>,
    pub not_action: Vec<String>,
    pub resource: Vec<String>,
    pub principal: Principal,
    pub not_principal: Principal,
    pub condition: Condition,
}

/// 规范化后的策略文档
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CanonicalPolicy {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statements: Vec<CanonicalStatement>,
}
