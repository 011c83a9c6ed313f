//! 全局错误类型定义

use thiserror::Error;
use serde_json::Error as SerdeJsonError;
use std::io::Error as IoError;

#[derive(Error, Debug)]
pub enum FinderError {
    // 策略文档规范化错误
    #[error("字段 {field} 的JSON形状无法规范化：{raw}")]
    MalformedField { field: String, raw: String },
    #[error("策略文档解析失败：{0}")]
    PolicyParse(#[source] SerdeJsonError),

    // 规则表达式错误
    #[error("规则表达式编译失败（位置 {position}）：{message}")]
    Compile { position: usize, message: String },
    #[error("规则表达式求值失败：{message}，name: {name}")]
    Evaluation { name: String, message: String },

    // 数据源相关错误
    #[error("策略文档解码失败：{message}，name: {name}")]
    DocumentDecode { name: String, message: String },
    #[error("授权详情拉取失败：{0}")]
    Source(String),

    // 基础错误
    #[error("JSON解析失败：{0}")]
    Json(#[from] SerdeJsonError),
    #[error("IO操作失败：{0}")]
    Io(#[from] IoError),
    #[error("无效输入：{0}")]
    InvalidInput(String),
}

impl FinderError {
    /// 构造字段形状错误
    pub(crate) fn malformed(field: impl Into<String>, raw: impl Into<String>) -> Self {
        FinderError::MalformedField {
            field: field.into(),
            raw: raw.into(),
        }
    }

    /// 构造编译错误
    pub(crate) fn compile(position: usize, message: impl Into<String>) -> Self {
        FinderError::Compile {
            position,
            message: message.into(),
        }
    }

    /// 是否为可跳过的单文档错误（规范化/解码），扫描循环据此决定记录警告还是终止
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            FinderError::MalformedField { .. }
                | FinderError::PolicyParse(_)
                | FinderError::DocumentDecode { .. }
        )
    }
}

// 全局Result类型
pub type FinderResult<T> = Result<T, FinderError>;
