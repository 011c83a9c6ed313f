//! 规则编译器入口
//! 负责读取规则源（文本或文件）并编译为可执行规则，每次运行只编译一次

use std::io::ErrorKind;
use std::time::Instant;
use tracing::debug;

use super::program::{compile, CompiledRule};
use crate::error::FinderResult;

/// 规则编译器
pub struct RuleCompiler;

impl RuleCompiler {
    /// 编译规则表达式文本
    pub fn compile(source: &str) -> FinderResult<CompiledRule> {
        let start = Instant::now();
        let rule = compile(source)?;
        debug!(
            "✅ 规则编译完成，总耗时{:?}，结果类型：{}",
            start.elapsed(),
            rule.result_type()
        );
        Ok(rule)
    }

    /// 编译命令行参数：若参数是已存在的文件路径则读取文件内容，否则视为表达式文本
    pub async fn compile_arg(arg: &str) -> FinderResult<CompiledRule> {
        let source = Self::resolve_source(arg).await?;
        Self::compile(&source)
    }

    // 参数不对应任何已存在的路径时才视为表达式文本，其余文件系统错误照常返回
    async fn resolve_source(arg: &str) -> FinderResult<String> {
        match tokio::fs::metadata(arg).await {
            Ok(_) => {
                let source = tokio::fs::read_to_string(arg).await?;
                debug!("从文件读取规则表达式：{}，长度：{} 字节", arg, source.len());
                Ok(source)
            }
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::InvalidFilename) => {
                Ok(arg.to_string())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FinderError;

    #[tokio::test]
    async fn test_compile_arg_uses_text_when_no_such_file() {
        let rule = RuleCompiler::compile_arg(r#"Statement.exists(s, s.Effect == "Allow")"#)
            .await
            .unwrap();
        assert_eq!(rule.source(), r#"Statement.exists(s, s.Effect == "Allow")"#);
    }

    #[tokio::test]
    async fn test_compile_arg_reads_rule_file() {
        let path = std::env::temp_dir().join(format!("iam-policy-finder-rule-{}.cel", std::process::id()));
        tokio::fs::write(&path, "// deny statements\nStatement.exists(s, s.Effect == \"Deny\")\n")
            .await
            .unwrap();

        let rule = RuleCompiler::compile_arg(path.to_str().unwrap()).await.unwrap();
        assert!(rule.source().contains("s.Effect == \"Deny\""));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_compile_arg_reports_unreadable_path() {
        let dir = std::env::temp_dir();
        let err = RuleCompiler::compile_arg(dir.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, FinderError::Io(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_compile_arg_accepts_long_expression_text() {
        let clauses: Vec<String> = (0..40).map(|i| format!("Name != \"service-role-{i}\"")).collect();
        let expr = clauses.join(" && ");
        assert!(expr.len() > 255);
        let rule = RuleCompiler::compile_arg(&expr).await.unwrap();
        assert_eq!(rule.source(), expr);
    }

    #[test]
    fn test_compile_error_is_reported() {
        assert!(matches!(
            RuleCompiler::compile("Statement.exists(s, s.Bogus)"),
            Err(FinderError::Compile { .. })
        ));
    }
}
