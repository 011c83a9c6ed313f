//! 在线数据源：通过 aws-sdk-iam 分页调用 GetAccountAuthorizationDetails

use async_trait::async_trait;
use aws_sdk_iam::types as iam;
use aws_sdk_iam::Client;
use tracing::debug;

use super::model::{
    AuthorizationDetailsPage, EntityType, GroupDetail, InlinePolicy, ManagedPolicyDetail,
    PolicyVersion, RawDocument, RoleDetail, UserDetail,
};
use super::PolicySource;
use crate::error::{FinderError, FinderResult};

/// IAM 授权详情数据源
#[derive(Debug, Clone)]
pub struct IamSource {
    client: Client,
    page_size: i32,
}

impl IamSource {
    /// 使用默认凭证链与区域配置创建
    pub async fn from_env(page_size: i32) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), page_size)
    }

    pub fn new(client: Client, page_size: i32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl PolicySource for IamSource {
    async fn next_page(
        &mut self,
        marker: Option<String>,
        filter: &[EntityType],
    ) -> FinderResult<AuthorizationDetailsPage> {
        let filter: Vec<iam::EntityType> = filter.iter().map(|e| iam::EntityType::from(e.as_str())).collect();
        let output = self
            .client
            .get_account_authorization_details()
            .set_marker(marker)
            .set_filter((!filter.is_empty()).then_some(filter))
            .max_items(self.page_size)
            .send()
            .await
            .map_err(|e| FinderError::Source(format!("GetAccountAuthorizationDetails 调用失败：{}", e)))?;

        let page = AuthorizationDetailsPage {
            user_detail_list: output
                .user_detail_list()
                .iter()
                .map(|user| UserDetail {
                    user_name: text(user.user_name()),
                    user_policy_list: inline_policies(user.user_policy_list()),
                })
                .collect(),
            group_detail_list: output
                .group_detail_list()
                .iter()
                .map(|group| GroupDetail {
                    group_name: text(group.group_name()),
                    group_policy_list: inline_policies(group.group_policy_list()),
                })
                .collect(),
            role_detail_list: output
                .role_detail_list()
                .iter()
                .map(|role| RoleDetail {
                    role_name: text(role.role_name()),
                    role_policy_list: inline_policies(role.role_policy_list()),
                })
                .collect(),
            policies: output.policies().iter().map(managed_policy).collect(),
            marker: output.marker().map(str::to_string),
            is_truncated: output.is_truncated(),
        };
        debug!(
            "拉取授权详情一页：用户{}个、组{}个、角色{}个、托管策略{}个，是否还有下一页：{}",
            page.user_detail_list.len(),
            page.group_detail_list.len(),
            page.role_detail_list.len(),
            page.policies.len(),
            page.is_truncated
        );
        Ok(page)
    }
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

fn encoded(document: Option<&str>) -> RawDocument {
    RawDocument::Encoded(text(document))
}

fn inline_policies(list: &[iam::PolicyDetail]) -> Vec<InlinePolicy> {
    list.iter()
        .map(|policy| InlinePolicy {
            policy_name: text(policy.policy_name()),
            policy_document: encoded(policy.policy_document()),
        })
        .collect()
}

fn managed_policy(policy: &iam::ManagedPolicyDetail) -> ManagedPolicyDetail {
    ManagedPolicyDetail {
        policy_name: text(policy.policy_name()),
        arn: text(policy.arn()),
        attachment_count: policy.attachment_count().unwrap_or_default(),
        policy_version_list: policy
            .policy_version_list()
            .iter()
            .map(|version| PolicyVersion {
                document: encoded(version.document()),
                version_id: text(version.version_id()),
                is_default_version: version.is_default_version(),
            })
            .collect(),
    }
}
