// ==========================================
// 产线排产系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 连接: 所有仓储共享同一个 Arc<Mutex<Connection>>
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::api::PlanningApi;
use crate::config::ConfigManager;
use crate::db::{ensure_schema, open_sqlite_connection, read_schema_version, CURRENT_SCHEMA_VERSION};
use crate::engine::{
    CapacityGrid, DailyConsistencyChecker, HoursCalculator, LineLockRegistry, SummaryOverlay,
};
use crate::perf::install_sqlite_tracing;
use crate::repository::{PlanningCellRepository, ReferenceRepository, SummaryEntryRepository};

/// 应用状态
///
/// 包含API实例和共享资源, 作为 HTTP 路由的共享状态
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 排产API
    pub planning_api: Arc<PlanningApi>,

    /// 日检引擎（CLI daily-check 模式直接使用）
    pub checker: Arc<DailyConsistencyChecker>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开连接并建表（幂等）
    /// 2. 初始化所有Repository
    /// 3. 初始化所有Engine
    /// 4. 创建API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let mut conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        install_sqlite_tracing(&mut conn);

        match read_schema_version(&conn) {
            Ok(Some(v)) if v > CURRENT_SCHEMA_VERSION => {
                tracing::warn!(
                    found = v,
                    expected = CURRENT_SCHEMA_VERSION,
                    "数据库 schema_version 高于当前程序, 可能由更新版本创建"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("读取 schema_version 失败(将继续启动): {}", e),
        }
        ensure_schema(&conn).map_err(|e| format!("建表失败: {}", e))?;

        Ok(Self::from_connection(db_path, Arc::new(Mutex::new(conn))))
    }

    /// 从已初始化的连接装配（schema 需已存在）
    pub fn from_connection(db_path: String, conn: Arc<Mutex<rusqlite::Connection>>) -> Self {
        // ==========================================
        // 初始化Repository层
        // ==========================================
        let reference_repo = Arc::new(ReferenceRepository::new(conn.clone()));
        let planning_repo = Arc::new(PlanningCellRepository::new(conn.clone()));
        let summary_repo = Arc::new(SummaryEntryRepository::new(conn.clone()));

        // ==========================================
        // 初始化Engine层
        // ==========================================
        let config_manager = Arc::new(ConfigManager::from_connection(conn));
        let line_locks = Arc::new(LineLockRegistry::new());

        let grid = Arc::new(CapacityGrid::new(
            planning_repo.clone(),
            reference_repo.clone(),
            config_manager.clone(),
            line_locks.clone(),
        ));
        let overlay = Arc::new(SummaryOverlay::new(summary_repo));
        let hours = Arc::new(HoursCalculator::new(reference_repo.clone()));
        let checker = Arc::new(DailyConsistencyChecker::new(
            planning_repo.clone(),
            reference_repo.clone(),
            line_locks,
        ));

        // ==========================================
        // 创建API实例
        // ==========================================
        let planning_api = Arc::new(PlanningApi::new(
            reference_repo,
            planning_repo,
            grid,
            overlay,
            hours,
            checker.clone(),
        ));

        tracing::info!("AppState初始化完成");

        Self {
            db_path,
            planning_api,
            checker,
            config_manager,
        }
    }
}

/// 获取默认数据库路径
///
/// 优先使用 LINE_PLANNER_DB_PATH; 否则位于用户本地数据目录
pub fn get_default_db_path() -> String {
    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("LINE_PLANNER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./line_planning_aps.db");

    if let Some(data_dir) = dirs::data_local_dir() {
        let dir = data_dir.join("line-planning-aps");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("line_planning_aps.db");
        }
    }

    path.to_string_lossy().to_string()
}
