//! 检测器核心：持有编译后的规则与求值失败策略，统计扫描/命中数量
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::compiler::{CompiledRule, RuleCompiler};
use crate::config::GlobalConfig;
use crate::error::{FinderError, FinderResult};
use crate::policy::PolicyDetail;

/// 策略检测器
///
/// 规则只读共享，计数器为原子类型，可在多个任务间并发调用 [`PolicyDetector::detect`]。
#[derive(Debug, Clone)]
pub struct PolicyDetector {
    rule: Arc<CompiledRule>,
    config: GlobalConfig,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    scanned: AtomicUsize,
    found: AtomicUsize,
}

impl PolicyDetector {
    /// 使用已编译的规则创建检测器
    pub fn new(rule: CompiledRule, config: GlobalConfig) -> Self {
        Self {
            rule: Arc::new(rule),
            config,
            counters: Arc::new(Counters::default()),
        }
    }

    /// 编译规则表达式并创建检测器
    pub fn from_expr(expr: &str, config: GlobalConfig) -> FinderResult<Self> {
        Ok(Self::new(RuleCompiler::compile(expr)?, config))
    }

    pub fn rule(&self) -> &CompiledRule {
        &self.rule
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// 已扫描的文档数（含无法解析而跳过的文档）
    pub fn scanned(&self) -> usize {
        self.counters.scanned.load(Ordering::Relaxed)
    }

    /// 命中的文档数
    pub fn found(&self) -> usize {
        self.counters.found.load(Ordering::Relaxed)
    }

    /// 检测单个策略文档
    ///
    /// 求值失败时：`skip_evaluation_error` 开启则记录警告并视为未命中，否则返回错误终止扫描。
    pub fn detect(&self, detail: &PolicyDetail) -> FinderResult<bool> {
        self.tick();
        match self.rule.evaluate(&detail.bindings()) {
            Ok(found) => {
                if found {
                    self.counters.found.fetch_add(1, Ordering::Relaxed);
                }
                Ok(found)
            }
            Err(FinderError::Evaluation { name, message }) if self.config.skip_evaluation_error => {
                warn!("⚠️ 规则求值失败，已跳过：name: {}，错误：{}", name, message);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// 记录一个无法解码/规范化的文档（计入扫描数，不参与求值）
    pub fn skip(&self, name: &str, err: &FinderError) {
        self.tick();
        warn!("⚠️ 策略文档无法解析，已跳过：name: {}，错误：{}", name, err);
    }

    fn tick(&self) {
        self.counters.scanned.fetch_add(1, Ordering::Relaxed);
        if self.config.progress {
            eprint!(".");
        }
    }
}
