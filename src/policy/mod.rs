//! 策略模块：负责策略文档的数据模型定义与规范化
pub mod model;
pub mod normalizer;
pub mod detail;

// 导出核心接口
pub use self::model::{
    CanonicalPolicy, CanonicalStatement, Condition, ConditionEntries, Principal, PrincipalMap
};
pub use self::normalizer::{normalize, ParsePolicyOptions};
pub use self::detail::PolicyDetail;
