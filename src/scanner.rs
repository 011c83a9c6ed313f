//! 扫描循环：逐页遍历角色/用户/组的内联策略与托管策略版本，交给检测器判定

use serde::Serialize;
use tracing::{debug, info};

use crate::detector::PolicyDetector;
use crate::error::FinderResult;
use crate::policy::{CanonicalPolicy, PolicyDetail};
use crate::source::{EntityType, InlinePolicy, ManagedPolicyDetail, PolicySource, RawDocument};

/// 一条命中记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub entity_type: EntityType,
    /// 角色/用户/组名；托管策略为策略名
    pub entity_name: String,
    pub policy_name: String,
    /// 托管策略中命中的版本
    pub versions: Vec<String>,
    /// 托管策略的挂载数
    pub attachment_count: Option<i32>,
    /// 命中的解码后策略原文（托管策略取最后一个命中版本）
    pub document: String,
    /// 与 `document` 对应的规范化策略
    pub policy: CanonicalPolicy,
}

/// 扫描结果汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub scanned: usize,
    pub found: usize,
    pub matches: Vec<Finding>,
}

/// 扫描器
#[derive(Debug, Clone)]
pub struct Scanner {
    detector: PolicyDetector,
}

impl Scanner {
    pub fn new(detector: PolicyDetector) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &PolicyDetector {
        &self.detector
    }

    /// 扫描数据源的全部分页
    ///
    /// 无法解析的文档记录警告后跳过；未开启跳过时的求值错误、数据源错误会终止扫描。
    pub async fn run<S>(&self, source: &mut S) -> FinderResult<ScanReport>
    where
        S: PolicySource + ?Sized,
    {
        info!(
            "🚀 开始扫描，规则：{}，过滤：{:?}",
            self.detector.rule().source(),
            self.detector.config().filter
        );
        let mut matches = Vec::new();
        let result = self.scan_pages(source, &mut matches).await;
        info!(
            "🏁 扫描结束，命中{}个，已扫描{}个",
            self.detector.found(),
            self.detector.scanned()
        );
        result?;

        Ok(ScanReport {
            scanned: self.detector.scanned(),
            found: self.detector.found(),
            matches,
        })
    }

    async fn scan_pages<S>(&self, source: &mut S, matches: &mut Vec<Finding>) -> FinderResult<()>
    where
        S: PolicySource + ?Sized,
    {
        let config = self.detector.config();
        let mut marker = None;
        loop {
            let page = source.next_page(marker, &config.filter).await?;

            if config.accepts(EntityType::Role) {
                for role in &page.role_detail_list {
                    self.scan_inline(EntityType::Role, &role.role_name, &role.role_policy_list, matches)?;
                }
            }
            if config.accepts(EntityType::User) {
                for user in &page.user_detail_list {
                    self.scan_inline(EntityType::User, &user.user_name, &user.user_policy_list, matches)?;
                }
            }
            if config.accepts(EntityType::Group) {
                for group in &page.group_detail_list {
                    self.scan_inline(EntityType::Group, &group.group_name, &group.group_policy_list, matches)?;
                }
            }
            for policy in &page.policies {
                if config.accepts(policy.entity_type()) {
                    self.scan_managed(policy, matches)?;
                }
            }

            match page.marker {
                Some(next) => marker = Some(next),
                None => return Ok(()),
            }
        }
    }

    fn scan_inline(
        &self,
        entity_type: EntityType,
        owner: &str,
        policies: &[InlinePolicy],
        matches: &mut Vec<Finding>,
    ) -> FinderResult<()> {
        for policy in policies {
            debug!("🔍 扫描 {} {}，策略：{}", entity_type, owner, policy.policy_name);
            let Some(detail) = self.prepare(&policy.policy_name, &policy.policy_document)? else {
                continue;
            };
            if self.detector.detect(&detail)? {
                info!("🎯 命中 {} {}，策略：{}", entity_type, owner, policy.policy_name);
                self.dump(&detail);
                matches.push(Finding {
                    entity_type,
                    entity_name: owner.to_string(),
                    policy_name: policy.policy_name.clone(),
                    versions: Vec::new(),
                    attachment_count: None,
                    document: detail.document,
                    policy: detail.policy,
                });
            }
        }
        Ok(())
    }

    fn scan_managed(&self, policy: &ManagedPolicyDetail, matches: &mut Vec<Finding>) -> FinderResult<()> {
        let mut versions = Vec::new();
        let mut last_match = None;
        for version in &policy.policy_version_list {
            debug!("🔍 扫描托管策略 {}，版本：{}", policy.policy_name, version.version_id);
            let Some(detail) = self.prepare(&policy.policy_name, &version.document)? else {
                continue;
            };
            if self.detector.detect(&detail)? {
                versions.push(version.version_id.clone());
                last_match = Some(detail);
            }
        }

        let Some(detail) = last_match else {
            return Ok(());
        };
        info!(
            "🎯 命中托管策略 {}，版本：{:?}，挂载数：{}",
            policy.policy_name, versions, policy.attachment_count
        );
        self.dump(&detail);
        matches.push(Finding {
            entity_type: policy.entity_type(),
            entity_name: policy.policy_name.clone(),
            policy_name: policy.policy_name.clone(),
            versions,
            attachment_count: Some(policy.attachment_count),
            document: detail.document,
            policy: detail.policy,
        });
        Ok(())
    }

    // 解码 + 规范化；单个文档的失败只记录警告
    fn prepare(&self, name: &str, raw: &RawDocument) -> FinderResult<Option<PolicyDetail>> {
        let opts = self.detector.config().parse_options();
        let detail = raw
            .decode(name)
            .and_then(|document| PolicyDetail::new(name, document, &opts));
        match detail {
            Ok(detail) => Ok(Some(detail)),
            Err(e) if e.is_document_error() => {
                self.detector.skip(name, &e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn dump(&self, detail: &PolicyDetail) {
        if self.detector.config().dump {
            println!("{}", detail.document);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use crate::config::{ConfigManager, GlobalConfig};
    use crate::error::FinderError;
    use crate::source::AuthorizationDetailsPage;

    /// 内存分页数据源，marker 为页序号
    struct PagedSource {
        pages: Vec<AuthorizationDetailsPage>,
        requests: Vec<Option<String>>,
    }

    impl PagedSource {
        fn new(pages: Vec<serde_json::Value>) -> Self {
            Self {
                pages: pages.into_iter().map(|p| serde_json::from_value(p).unwrap()).collect(),
                requests: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PolicySource for PagedSource {
        async fn next_page(
            &mut self,
            marker: Option<String>,
            _filter: &[EntityType],
        ) -> FinderResult<AuthorizationDetailsPage> {
            self.requests.push(marker.clone());
            let index: usize = marker.map(|m| m.parse().unwrap()).unwrap_or(0);
            let mut page = self.pages[index].clone();
            page.marker = (index + 1 < self.pages.len()).then(|| (index + 1).to_string());
            Ok(page)
        }
    }

    fn encode(doc: &serde_json::Value) -> String {
        percent_encoding::utf8_percent_encode(&doc.to_string(), percent_encoding::NON_ALPHANUMERIC).to_string()
    }

    fn admin_doc() -> serde_json::Value {
        json!({"Version": "2012-10-17", "Statement": [{"Effect": "Allow", "Action": "*", "Resource": "*"}]})
    }

    fn reader_doc() -> serde_json::Value {
        json!({"Version": "2012-10-17", "Statement": [{"Effect": "Allow", "Action": "s3:GetObject", "Resource": "*"}]})
    }

    fn pages() -> Vec<serde_json::Value> {
        vec![
            json!({
                "RoleDetailList": [{
                    "RoleName": "ops",
                    "RolePolicyList": [
                        {"PolicyName": "admin", "PolicyDocument": encode(&admin_doc())},
                        {"PolicyName": "broken", "PolicyDocument": encode(&json!({"Statement": [{"Action": 7}]}))}
                    ]
                }],
                "UserDetailList": [{
                    "UserName": "alice",
                    "UserPolicyList": [{"PolicyName": "read", "PolicyDocument": reader_doc()}]
                }]
            }),
            json!({
                "GroupDetailList": [{
                    "GroupName": "admins",
                    "GroupPolicyList": [{"PolicyName": "admin", "PolicyDocument": admin_doc()}]
                }],
                "Policies": [{
                    "PolicyName": "AdministratorAccess",
                    "Arn": "arn:aws:iam::aws:policy/AdministratorAccess",
                    "AttachmentCount": 4,
                    "PolicyVersionList": [
                        {"VersionId": "v1", "Document": encode(&reader_doc()), "IsDefaultVersion": false},
                        {"VersionId": "v2", "Document": encode(&admin_doc()), "IsDefaultVersion": false},
                        {"VersionId": "v3", "Document": admin_doc(), "IsDefaultVersion": true}
                    ]
                }, {
                    "PolicyName": "deploy",
                    "Arn": "arn:aws:iam::123456789012:policy/deploy",
                    "AttachmentCount": 1,
                    "PolicyVersionList": [{"VersionId": "v1", "Document": encode(&admin_doc())}]
                }]
            }),
        ]
    }

    fn scanner(config: GlobalConfig) -> Scanner {
        let detector = PolicyDetector::from_expr(r#"Statement.exists(s, s.Effect == "Allow" && "*" in s.Action)"#, config).unwrap();
        Scanner::new(detector)
    }

    #[tokio::test]
    async fn test_scan_all_pages() {
        let mut source = PagedSource::new(pages());
        let report = scanner(ConfigManager::get_default()).run(&mut source).await.unwrap();

        assert_eq!(source.requests, vec![None, Some("1".to_string())]);
        // 2 个角色策略 + 1 个用户策略 + 1 个组策略 + 4 个托管策略版本
        assert_eq!(report.scanned, 8);
        assert_eq!(report.found, 5);

        let summary: Vec<(EntityType, &str, &str)> = report
            .matches
            .iter()
            .map(|f| (f.entity_type, f.entity_name.as_str(), f.policy_name.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (EntityType::Role, "ops", "admin"),
                (EntityType::Group, "admins", "admin"),
                (EntityType::AwsManagedPolicy, "AdministratorAccess", "AdministratorAccess"),
                (EntityType::LocalManagedPolicy, "deploy", "deploy"),
            ]
        );

        let managed = &report.matches[2];
        assert_eq!(managed.versions, vec!["v2".to_string(), "v3".to_string()]);
        assert_eq!(managed.attachment_count, Some(4));
        let dumped: serde_json::Value = serde_json::from_str(&managed.document).unwrap();
        assert_eq!(dumped, admin_doc());
        assert_eq!(managed.policy.version, "2012-10-17");
        assert_eq!(managed.policy.statements[0].action, vec!["*".to_string()]);

        let role = serde_json::to_value(&report.matches[0]).unwrap();
        assert_eq!(role["policy"]["Statement"][0]["Effect"], json!("Allow"));
        assert_eq!(role["policy"]["Statement"][0]["Principal"], json!({}));
        assert_eq!(role["entity_type"], json!("Role"));
    }

    #[tokio::test]
    async fn test_filter_limits_entity_types() {
        let config = ConfigManager::custom()
            .filter(vec![EntityType::User, EntityType::LocalManagedPolicy])
            .build();
        let mut source = PagedSource::new(pages());
        let report = scanner(config).run(&mut source).await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.found, 1);
        assert_eq!(report.matches[0].entity_type, EntityType::LocalManagedPolicy);
    }

    #[tokio::test]
    async fn test_aws_managed_policy_in_other_partition() {
        let config = ConfigManager::custom().filter(vec![EntityType::AwsManagedPolicy]).build();
        let detector = PolicyDetector::from_expr("true", config).unwrap();
        let mut source = PagedSource::new(vec![json!({
            "Policies": [{
                "PolicyName": "AdministratorAccess",
                "Arn": "arn:aws-cn:iam::aws:policy/AdministratorAccess",
                "PolicyVersionList": [{"VersionId": "v1", "Document": admin_doc(), "IsDefaultVersion": true}]
            }]
        })]);

        let report = Scanner::new(detector).run(&mut source).await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.found, 1);
        assert_eq!(report.matches[0].entity_type, EntityType::AwsManagedPolicy);
    }

    #[tokio::test]
    async fn test_evaluation_error_aborts_scan() {
        let detector = PolicyDetector::from_expr("Statement[1].Effect == \"Deny\"", ConfigManager::get_default()).unwrap();
        let mut source = PagedSource::new(pages());

        let err = Scanner::new(detector).run(&mut source).await.unwrap_err();
        assert!(matches!(err, FinderError::Evaluation { ref name, .. } if name == "admin"));
        assert_eq!(source.requests.len(), 1);
    }

    #[tokio::test]
    async fn test_evaluation_error_skipped_when_configured() {
        let config = ConfigManager::custom().skip_evaluation_error(true).build();
        let detector = PolicyDetector::from_expr("Statement[1].Effect == \"Deny\"", config).unwrap();
        let mut source = PagedSource::new(pages());

        let report = Scanner::new(detector).run(&mut source).await.unwrap();
        assert_eq!(report.scanned, 8);
        assert_eq!(report.found, 0);
        assert!(report.matches.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_document_is_skipped() {
        let mut source = PagedSource::new(vec![json!({
            "UserDetailList": [{
                "UserName": "bob",
                "UserPolicyList": [
                    {"PolicyName": "bad-escape", "PolicyDocument": "%7B%zz"},
                    {"PolicyName": "admin", "PolicyDocument": encode(&admin_doc())}
                ]
            }]
        })]);
        let report = scanner(ConfigManager::get_default()).run(&mut source).await.unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.found, 1);
        assert_eq!(report.matches[0].policy_name, "admin");
    }
}
