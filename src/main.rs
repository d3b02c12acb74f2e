// ==========================================
// 住院医师排班系统 - 主入口
// ==========================================
// 技术栈: Rust + SQLite
// 说明: 初始化日志与应用状态后驻留;
//       业务操作经由上层适配器调用 AppState 中的 API
// ==========================================

use residency_roster::app::{get_default_db_path, AppState};

fn main() {
    // 初始化日志系统
    residency_roster::logging::init();

    tracing::info!("==================================================");
    tracing::info!("住院医师排班系统 - 约束求解核心");
    tracing::info!("系统版本: {}", residency_roster::VERSION);
    tracing::info!("==================================================");

    // 获取数据库路径
    let db_path = get_default_db_path();
    tracing::info!("使用数据库: {}", db_path);

    // 创建AppState (建库建表 + 装配仓储/引擎/API)
    tracing::info!("正在初始化AppState...");
    let app_state = match AppState::new(db_path) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("无法初始化AppState: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("AppState初始化成功, 数据库: {}", app_state.db_path);
    tracing::info!("核心就绪, 等待上层适配器接入");
}
