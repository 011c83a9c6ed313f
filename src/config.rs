//! 全局配置管理,存储所有可配置项

use crate::policy::ParsePolicyOptions;
use crate::source::EntityType;

/// 全局配置
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    // Action / NotAction 是否统一转为小写
    pub action_to_lower_case: bool,
    // 求值失败时是否仅记录警告并视为未命中
    pub skip_evaluation_error: bool,
    // 命中时是否输出原始策略文档
    pub dump: bool,
    // 是否在 stderr 输出进度点
    pub progress: bool,
    // 实体类型过滤（为空表示全部）
    pub filter: Vec<EntityType>,
    // 在线拉取时每页条目数
    pub page_size: i32,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            action_to_lower_case: false,
            skip_evaluation_error: false,
            dump: false,
            progress: false,
            filter: Vec::new(),
            page_size: 100,
        }
    }
}

impl GlobalConfig {
    /// 规范化器所需的配置子集
    pub fn parse_options(&self) -> ParsePolicyOptions {
        ParsePolicyOptions {
            action_to_lower_case: self.action_to_lower_case,
        }
    }

    /// 实体类型是否在过滤范围内
    pub fn accepts(&self, entity: EntityType) -> bool {
        self.filter.is_empty() || self.filter.contains(&entity)
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 获取默认配置
    pub fn get_default() -> GlobalConfig {
        GlobalConfig::default()
    }

    /// 自定义配置
    pub fn custom() -> CustomConfigBuilder {
        CustomConfigBuilder::new()
    }
}

/// 配置构建器（便于自定义配置）
#[derive(Debug, Clone, Default)]
pub struct CustomConfigBuilder {
    config: GlobalConfig,
}

impl CustomConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: GlobalConfig::default(),
        }
    }

    pub fn action_to_lower_case(mut self, enabled: bool) -> Self {
        self.config.action_to_lower_case = enabled;
        self
    }

    pub fn skip_evaluation_error(mut self, enabled: bool) -> Self {
        self.config.skip_evaluation_error = enabled;
        self
    }

    pub fn dump(mut self, enabled: bool) -> Self {
        self.config.dump = enabled;
        self
    }

    pub fn progress(mut self, enabled: bool) -> Self {
        self.config.progress = enabled;
        self
    }

    pub fn filter(mut self, filter: Vec<EntityType>) -> Self {
        self.config.filter = filter;
        self
    }

    pub fn page_size(mut self, page_size: i32) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn build(self) -> GlobalConfig {
        self.config
    }
}
