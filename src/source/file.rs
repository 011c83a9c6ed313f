//! 本地 JSON 文件数据源
//! 每个文件是一页 `aws iam get-account-authorization-details` 的输出

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::model::{AuthorizationDetailsPage, EntityType};
use super::PolicySource;
use crate::error::{FinderError, FinderResult};

/// 按顺序读取一组页面文件，marker 为下一个文件的序号
#[derive(Debug, Clone)]
pub struct FileSource {
    paths: Vec<PathBuf>,
}

impl FileSource {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PolicySource for FileSource {
    async fn next_page(
        &mut self,
        marker: Option<String>,
        _filter: &[EntityType],
    ) -> FinderResult<AuthorizationDetailsPage> {
        let index = match marker {
            None => 0,
            Some(m) => m
                .parse::<usize>()
                .map_err(|_| FinderError::Source(format!("无效的分页标记：{}", m)))?,
        };
        let Some(path) = self.paths.get(index) else {
            return Ok(AuthorizationDetailsPage::default());
        };

        let content = tokio::fs::read(path).await?;
        let mut page: AuthorizationDetailsPage = serde_json::from_slice(&content)
            .map_err(|e| FinderError::Source(format!("解析授权详情文件失败：{}，错误：{}", path.display(), e)))?;
        debug!(
            "读取授权详情文件：{}，用户{}个、组{}个、角色{}个、托管策略{}个",
            path.display(),
            page.user_detail_list.len(),
            page.group_detail_list.len(),
            page.role_detail_list.len(),
            page.policies.len()
        );

        // 文件中的 Marker 来自原始 API 调用，这里改写为下一个文件的序号
        let next = index + 1;
        page.is_truncated = next < self.paths.len();
        page.marker = page.is_truncated.then(|| next.to_string());
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_page(tag: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "iam-policy-finder-page-{}-{}.json",
            std::process::id(),
            tag
        ));
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_pages_are_read_in_order() {
        let first = temp_page("first", r#"{"UserDetailList":[{"UserName":"alice"}],"Marker":"opaque","IsTruncated":true}"#);
        let second = temp_page("second", r#"{"RoleDetailList":[{"RoleName":"deployer"}]}"#);
        let mut source = FileSource::new([first.clone(), second.clone()]);

        let page = source.next_page(None, &[]).await.unwrap();
        assert_eq!(page.user_detail_list[0].user_name, "alice");
        assert_eq!(page.marker.as_deref(), Some("1"));

        let page = source.next_page(page.marker, &[]).await.unwrap();
        assert_eq!(page.role_detail_list[0].role_name, "deployer");
        assert_eq!(page.marker, None);
        assert!(!page.is_truncated);

        std::fs::remove_file(first).unwrap();
        std::fs::remove_file(second).unwrap();
    }

    #[tokio::test]
    async fn test_invalid_page_is_source_error() {
        let path = temp_page("invalid", "[1, 2, 3]");
        let mut source = FileSource::new([path.clone()]);
        assert!(matches!(source.next_page(None, &[]).await, Err(FinderError::Source(_))));
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_no_files_yields_empty_page() {
        let mut source = FileSource::new(Vec::<PathBuf>::new());
        let page = source.next_page(None, &[]).await.unwrap();
        assert_eq!(page, AuthorizationDetailsPage::default());
    }
}
