// lib.rs
//
// ================================================================================
// 三战同盟助手后端
//
// 小程序登录与资料 | 同盟统计导入与对比 | 对比图生成 | 资源点与迁城推荐
// ================================================================================

pub mod log;

pub mod config;
pub mod db;
pub mod error;
pub mod params;

pub mod alliance;
pub mod battle;
pub mod hex;
pub mod media;
pub mod profile;
pub mod report;
pub mod resource;
pub mod server;
pub mod store;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConfigManager;
use crate::report::ReportRenderer;
use crate::resource::{loader, relocate};
use crate::server::AppState;
use crate::store::FileStore;

/// 指定配置文件路径的环境变量
pub const CONFIG_ENV: &str = "SANZHAN_CONFIG";

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// 应用构建器
pub struct AppBuilder {
    config_path: PathBuf,
}

impl AppBuilder {
    /// 默认读取 `SANZHAN_CONFIG`，未设置时为 `config.toml`
    pub fn new() -> Self {
        let config_path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.toml"));
        Self { config_path }
    }

    /// 设置配置文件路径
    pub fn config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = path.as_ref().to_path_buf();
        self
    }

    pub fn build(self) -> App {
        App {
            config: ConfigManager::new(&self.config_path),
        }
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct App {
    config: ConfigManager,
}

impl App {
    pub fn builder() -> AppBuilder {
        AppBuilder::new()
    }

    /// 加载配置并准备好数据库、目录与资源点数据
    pub async fn prepare(&self) -> Result<AppState> {
        info!(target: "System", "正在加载配置: {:?}", self.config.path());
        let config = self.config.load().await?;

        match log::Level::parse(&config.log.level) {
            Some(level) => log::set_level(level),
            None => warn!(target: "System", "未知日志等级 {}，使用 info", config.log.level),
        }

        let db = db::init(&config.database.url)
            .await
            .with_context(|| format!("无法连接数据库 {}", config.database.url))?;
        db::setup_schema(&db).await.context("建表失败")?;

        let store = FileStore::new(&config.paths);
        store.ensure_dirs().await.context("无法创建数据目录")?;

        let imported = loader::load_seasons(&db, &config.paths.resource_dir()).await?;
        if imported > 0 {
            info!(target: "Resource", "新导入资源点 {} 个", imported);
        }

        // 字体查找会扫描系统字体目录
        let renderer = {
            let config = config.clone();
            tokio::task::spawn_blocking(move || ReportRenderer::new(&config)).await?
        };

        let scorer = relocate::scorer_by_name(&config.resource.strategy);
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("无法创建 HTTP 客户端")?;

        Ok(AppState {
            db,
            config: Arc::new(config),
            http,
            store,
            renderer: Arc::new(renderer),
            scorer: Arc::from(scorer),
        })
    }

    /// 启动 HTTP 服务
    pub async fn run(self) -> Result<()> {
        println!("╔═══════════════════════════════════════╗");
        println!("║        三战同盟助手 · 后端服务         ║");
        println!("╚═══════════════════════════════════════╝");
        println!();

        let state = self.prepare().await?;
        let bind = state.config.server.bind.clone();
        let app = server::router(state);

        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("无法监听 {}", bind))?;
        info!(target: "System", "服务已启动: http://{}", bind);

        axum::serve(listener, app).await?;
        Ok(())
    }
}
