// ==========================================
// 住院医师排班系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 约束求解排班 + ACGME 工时合规 (决策核心,不含前端)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 规则/求解/合规/编排
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施 (连接初始化/PRAGMA/schema 统一)
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务操作面
pub mod api;

// 应用层 - 组合根
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    AssignmentMethod, CoverageTier, HolidayType, PgyLevel, ScheduleStatus, Severity,
    ShiftCategory, SolveStatus, TimeOffStatus, ViolationKind, WorkflowState,
};

// 领域实体
pub use domain::{
    AcademicYearWorkflow, AcgmeViolation, ActionLog, Assignment, CoverageRequirement,
    CoverageUpdate, HolidayCoverageInstance, HolidayDefinition, QuotaTable, QuotaTarget,
    Resident, ResidentPreferences, Schedule, SchedulingRule, TimeOffRequest,
};

// 引擎
pub use engine::{
    ComplianceEngine, ConstraintCompiler, CspSolver, GenerateScheduleParams,
    GenerateScheduleResult, HolidayCoverageManager, RuleCatalog, WorkflowOrchestrator,
};

// API
pub use api::{HolidayApi, ResidentApi, ScheduleApi, WorkflowApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "住院医师排班系统";
