//! 授权详情数据源：分页拉取用户/组/角色的内联策略与托管策略
pub mod model;
pub mod decode;
pub mod file;
#[cfg(feature = "aws")]
pub mod iam;

use async_trait::async_trait;

use crate::error::FinderResult;

pub use self::model::{
    AuthorizationDetailsPage, EntityType, GroupDetail, InlinePolicy, ManagedPolicyDetail,
    PolicyVersion, RawDocument, RoleDetail, UserDetail,
};
pub use self::decode::decode_document;
pub use self::file::FileSource;
#[cfg(feature = "aws")]
pub use self::iam::IamSource;

/// 分页数据源
#[async_trait]
pub trait PolicySource: Send {
    /// 拉取 `marker` 指向的一页；返回页的 `marker` 为 `None` 表示已到末页
    async fn next_page(
        &mut self,
        marker: Option<String>,
        filter: &[EntityType],
    ) -> FinderResult<AuthorizationDetailsPage>;
}
