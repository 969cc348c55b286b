use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::info;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub wechat: WechatConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub resource: ResourceConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    // 生成图片链接时使用的外部地址，留空则取请求的 Host 头
    #[serde(default)]
    pub public_base_url: String,
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: usize,
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_max_upload_mb() -> usize {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: String::new(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    // mode=rwc 允许 读/写/创建
    #[serde(default = "default_db_url")]
    pub url: String,
}

fn default_db_url() -> String {
    "sqlite:data/san_minipro.db?mode=rwc".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WechatConfig {
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_app_secret")]
    pub app_secret: String,
}

fn default_app_id() -> String {
    "YOUR_APP_ID".to_string()
}

fn default_app_secret() -> String {
    "YOUR_APP_SECRET".to_string()
}

impl WechatConfig {
    /// 未配置真实 AppID 时走模拟登录
    pub fn is_mock(&self) -> bool {
        let id = self.app_id.trim();
        id.is_empty() || id == "YOUR_APP_ID" || id == "your_wechat_app_id"
    }
}

impl Default for WechatConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            app_secret: default_app_secret(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl PathsConfig {
    /// 上传的原始文件
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// 生成的对比图
    pub fn generated_dir(&self) -> PathBuf {
        self.data_dir.join("generated")
    }

    /// 赛季资源点 CSV
    pub fn resource_dir(&self) -> PathBuf {
        self.data_dir.join("resources")
    }

    /// 头图、成语等素材
    pub fn asset_dir(&self) -> PathBuf {
        self.data_dir.join("assets")
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResourceConfig {
    #[serde(default = "default_level")]
    pub default_level: String,
    #[serde(default = "default_nearest_limit")]
    pub nearest_limit: usize,
    // "brute_force" | "grid"
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

fn default_level() -> String {
    "8铜".to_string()
}

fn default_nearest_limit() -> usize {
    40
}

fn default_strategy() -> String {
    "brute_force".to_string()
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            default_level: default_level(),
            nearest_limit: default_nearest_limit(),
            strategy: default_strategy(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct Threshold {
    pub upper: i64,
    pub lower: i64,
}

impl Default for Threshold {
    fn default() -> Self {
        Self {
            upper: 5000,
            lower: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    // 指定字体文件，优先于 font_families
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default = "default_font_families")]
    pub font_families: Vec<String>,
    // 键为指标名 (battle / power / contribution / assist / donation)
    #[serde(default)]
    pub thresholds: BTreeMap<String, Threshold>,
}

fn default_width() -> u32 {
    1170
}

fn default_font_families() -> Vec<String> {
    [
        "Microsoft YaHei",
        "SimHei",
        "WenQuanYi Zen Hei",
        "Noto Sans CJK SC",
        "Droid Sans Fallback",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ReportConfig {
    pub fn threshold(&self, metric_key: &str) -> Threshold {
        self.thresholds.get(metric_key).copied().unwrap_or_default()
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            font_path: None,
            font_families: default_font_families(),
            thresholds: BTreeMap::new(),
        }
    }
}

/// 配置管理器
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// 获取配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载配置，如果文件不存在则创建默认配置
    pub async fn load(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            let default_cfg = AppConfig::default();
            self.save_atomic(&default_cfg).await?;
            info!(target: "Config", "已生成默认配置: {:?}", self.path);
            return Ok(default_cfg);
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("读取配置失败: {:?}", self.path))?;
        let cfg: AppConfig =
            toml::from_str(&content).with_context(|| format!("解析配置失败: {:?}", self.path))?;

        Ok(cfg)
    }

    /// 原子写入配置（写临时文件 -> Rename 覆盖）
    pub async fn save_atomic(&self, cfg: &AppConfig) -> Result<()> {
        let content = toml::to_string_pretty(cfg)?;
        let tmp_path = self.path.with_extension("tmp");
        let path_clone = self.path.clone();

        // 在阻塞线程中执行同步 IO
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            if let Some(parent) = path_clone.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }

            let mut file = std::fs::File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?; // 确保落盘
            std::fs::rename(&tmp_path, &path_clone)?;
            Ok(())
        })
        .await??;

        Ok(())
    }
}
