//! 检测模块：在规范化策略上执行编译后的规则
pub mod detector;

pub use self::detector::PolicyDetector;
