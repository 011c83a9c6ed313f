//! 编译后的规则与求值入口

use super::checker::{check, Node};
use super::interpreter::eval;
use super::parser::parse;
use super::types::Type;
use crate::error::{FinderError, FinderResult};
use crate::policy::CanonicalStatement;

/// 每次求值的绑定变量，全部借用自调用方
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub name: &'a str,
    pub document: &'a str,
    pub version: &'a str,
    pub statements: &'a [CanonicalStatement],
}

/// 编译后的规则：不可变，可跨线程共享并发求值
#[derive(Debug, Clone)]
pub struct CompiledRule {
    source: String,
    root: Node,
    result_type: Type,
}

impl CompiledRule {
    /// 规则源文本
    pub fn source(&self) -> &str {
        &self.source
    }

    /// 顶层表达式的静态类型
    pub fn result_type(&self) -> &Type {
        &self.result_type
    }

    /// 对一组绑定变量求值，顶层结果必须是 bool
    pub fn evaluate(&self, bindings: &Bindings<'_>) -> FinderResult<bool> {
        let evaluation_error = |message: String| FinderError::Evaluation {
            name: bindings.name.to_string(),
            message,
        };
        let value = eval(&self.root, bindings).map_err(evaluation_error)?;
        value
            .as_bool()
            .map_err(|_| evaluation_error(format!("rule result must be bool, found {}", value.type_name())))
    }
}

/// 编译规则表达式（语法分析 + 静态类型检查）
pub fn compile(source: &str) -> FinderResult<CompiledRule> {
    let expr = parse(source)?;
    let (root, result_type) = check(&expr)?;
    Ok(CompiledRule {
        source: source.to_string(),
        root,
        result_type,
    })
}

/// 求值快捷入口
pub fn evaluate(rule: &CompiledRule, bindings: &Bindings<'_>) -> FinderResult<bool> {
    rule.evaluate(bindings)
}
