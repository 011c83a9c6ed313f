//! 待检测的策略文档（名称 + 解码后原文 + 规范化结果）

use super::model::CanonicalPolicy;
use super::normalizer::{normalize, ParsePolicyOptions};
use crate::compiler::Bindings;
use crate::error::FinderResult;

/// 单个待检测策略文档
#[derive(Debug, Clone)]
pub struct PolicyDetail {
    /// 来源系统中的策略名
    pub name: String,
    /// 解码后的策略原文
    pub document: String,
    /// 规范化后的策略
    pub policy: CanonicalPolicy,
}

impl PolicyDetail {
    /// 由已解码的策略原文创建，规范化失败时返回错误（调用方记录警告并跳过）
    pub fn new(name: impl Into<String>, document: impl Into<String>, opts: &ParsePolicyOptions) -> FinderResult<Self> {
        let document = document.into();
        let policy = normalize(document.as_bytes(), opts)?;
        Ok(Self {
            name: name.into(),
            document,
            policy,
        })
    }

    /// 规则表达式的绑定变量
    pub fn bindings(&self) -> Bindings<'_> {
        Bindings {
            name: &self.name,
            document: &self.document,
            version: &self.policy.version,
            statements: &self.policy.statements,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FinderError;

    #[test]
    fn test_bindings_expose_policy_fields() {
        let doc = r#"{"Version":"2012-10-17","Statement":[{"Effect":"Allow","Action":"*"}]}"#;
        let detail = PolicyDetail::new("AdminAccess", doc, &ParsePolicyOptions::default()).unwrap();
        let bindings = detail.bindings();

        assert_eq!(bindings.name, "AdminAccess");
        assert_eq!(bindings.document, doc);
        assert_eq!(bindings.version, "2012-10-17");
        assert_eq!(bindings.statements.len(), 1);
    }

    #[test]
    fn test_malformed_document_is_rejected() {
        let err = PolicyDetail::new("Broken", r#"{"Statement":[{"Action":7}]}"#, &ParsePolicyOptions::default())
            .unwrap_err();
        assert!(err.is_document_error());
        assert!(matches!(err, FinderError::MalformedField { .. }));
    }
}
