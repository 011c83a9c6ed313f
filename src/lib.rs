//! iam-policy-finder - 使用 CEL 风格规则表达式查找可疑或过度授权的 IAM 策略文档

// 导出全局错误类型
pub use self::error::{FinderError, FinderResult};

// 导出配置模块
pub use self::config::{GlobalConfig, ConfigManager, CustomConfigBuilder};

// 导出策略模块核心接口
pub use self::policy::{
    CanonicalPolicy, CanonicalStatement, Condition, ConditionEntries, Principal, PrincipalMap,
    normalize, ParsePolicyOptions, PolicyDetail
};

// 导出编译模块核心接口
pub use self::compiler::{compile, evaluate, Bindings, CompiledRule, RuleCompiler};

// 导出检测模块核心接口
pub use self::detector::PolicyDetector;

// 导出数据源模块核心接口
pub use self::source::{
    AuthorizationDetailsPage, EntityType, FileSource, PolicySource, RawDocument, decode_document
};
#[cfg(feature = "aws")]
pub use self::source::IamSource;

// 导出扫描模块核心接口
pub use self::scanner::{Finding, ScanReport, Scanner};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod policy;
pub mod compiler;
pub mod detector;
pub mod source;
pub mod scanner;
