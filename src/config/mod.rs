// ==========================================
// 住院医师排班系统 - 配置层
// ==========================================
// 职责: 系统配置管理 (ACGME 限值、资格窗口、求解器预算)
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod scheduling_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use scheduling_config_trait::SchedulingConfigReader;
