//! GetAccountAuthorizationDetails 的数据模型
//! 字段名与 API / AWS CLI 输出一致（PascalCase），缺失字段取默认值

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::decode::decode_document;
use crate::error::{FinderError, FinderResult};

/// 授权详情的实体类型（用于过滤）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    User,
    Group,
    Role,
    LocalManagedPolicy,
    #[serde(rename = "AWSManagedPolicy")]
    AwsManagedPolicy,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::User,
        EntityType::Group,
        EntityType::Role,
        EntityType::LocalManagedPolicy,
        EntityType::AwsManagedPolicy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::User => "User",
            EntityType::Group => "Group",
            EntityType::Role => "Role",
            EntityType::LocalManagedPolicy => "LocalManagedPolicy",
            EntityType::AwsManagedPolicy => "AWSManagedPolicy",
        }
    }

    /// 按 ARN 判断托管策略属于哪一类
    /// AWS 托管策略形如 `arn:<partition>:iam::aws:policy/...`，分区可以是 aws、aws-cn、aws-us-gov 等
    pub fn of_managed_policy(arn: &str) -> EntityType {
        let mut parts = arn.splitn(6, ':');
        let aws_managed = parts.next() == Some("arn")
            && parts.next().is_some_and(|partition| !partition.is_empty())
            && parts.next() == Some("iam")
            && parts.next().is_some()
            && parts.next() == Some("aws")
            && parts.next().is_some_and(|resource| resource.starts_with("policy/"));
        if aws_managed {
            EntityType::AwsManagedPolicy
        } else {
            EntityType::LocalManagedPolicy
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = FinderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|entity| entity.as_str() == s)
            .ok_or_else(|| {
                FinderError::InvalidInput(format!(
                    "未知的实体类型：{}（可选：User, Group, Role, LocalManagedPolicy, AWSManagedPolicy）",
                    s
                ))
            })
    }
}

/// 原始策略文档
///
/// API 返回的是 URL 编码的字符串，AWS CLI 输出的是已解码的 JSON 对象。
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDocument {
    Encoded(String),
    Inline(Value),
}

impl Default for RawDocument {
    fn default() -> Self {
        RawDocument::Encoded(String::new())
    }
}

impl RawDocument {
    /// 解码为策略原文
    pub fn decode(&self, name: &str) -> FinderResult<String> {
        match self {
            RawDocument::Encoded(raw) => decode_document(name, raw),
            RawDocument::Inline(value) => Ok(serde_json::to_string(value)?),
        }
    }
}

/// 内联策略（用户/组/角色）
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InlinePolicy {
    pub policy_name: String,
    pub policy_document: RawDocument,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UserDetail {
    pub user_name: String,
    pub user_policy_list: Vec<InlinePolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GroupDetail {
    pub group_name: String,
    pub group_policy_list: Vec<InlinePolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RoleDetail {
    pub role_name: String,
    pub role_policy_list: Vec<InlinePolicy>,
}

/// 托管策略的一个版本
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PolicyVersion {
    pub document: RawDocument,
    pub version_id: String,
    pub is_default_version: bool,
}

/// 托管策略
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ManagedPolicyDetail {
    pub policy_name: String,
    pub arn: String,
    pub attachment_count: i32,
    pub policy_version_list: Vec<PolicyVersion>,
}

impl ManagedPolicyDetail {
    pub fn entity_type(&self) -> EntityType {
        EntityType::of_managed_policy(&self.arn)
    }
}

/// 一页授权详情
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AuthorizationDetailsPage {
    pub user_detail_list: Vec<UserDetail>,
    pub group_detail_list: Vec<GroupDetail>,
    pub role_detail_list: Vec<RoleDetail>,
    pub policies: Vec<ManagedPolicyDetail>,
    pub marker: Option<String>,
    pub is_truncated: bool,
}
