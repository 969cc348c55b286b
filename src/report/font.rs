//! 对比图字体
//!
//! plotters 的 ab_glyph 后端只认注册过的字体，这里按配置找到一款中文字体注册一次。

use plotters::style::{FontStyle, register_font};
use std::sync::OnceLock;

use crate::config::ReportConfig;
use crate::{info, warn};

pub const FALLBACK_FAMILY: &str = "sans-serif";

// 通过 font_path 指定的字体统一以此名注册
const CUSTOM_FAMILY: &str = "report-custom";

static REGISTERED: OnceLock<String> = OnceLock::new();

/// 返回可用于绘制的字体名，整个进程只查找一次
pub fn ensure_registered(config: &ReportConfig) -> &'static str {
    REGISTERED.get_or_init(|| register(config)).as_str()
}

fn register(config: &ReportConfig) -> String {
    let Some((family, bytes)) = find_font(config) else {
        warn!(target: "Report", "未找到可用的中文字体，对比图文字可能无法绘制");
        return FALLBACK_FAMILY.to_string();
    };

    // 注册表要求 'static，字体数据在进程内常驻
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    match register_font(&family, FontStyle::Normal, bytes) {
        Ok(()) => {
            info!(target: "Report", "使用字体: {}", family);
            family
        }
        Err(_) => {
            warn!(target: "Report", "字体 {} 无法解析", family);
            FALLBACK_FAMILY.to_string()
        }
    }
}

fn find_font(config: &ReportConfig) -> Option<(String, Vec<u8>)> {
    if let Some(path) = &config.font_path {
        match std::fs::read(path) {
            Ok(bytes) => return Some((CUSTOM_FAMILY.to_string(), bytes)),
            Err(e) => warn!(target: "Report", "读取字体 {:?} 失败: {}", path, e),
        }
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    config.font_families.iter().find_map(|family| {
        let families = [fontdb::Family::Name(family.as_str())];
        let query = fontdb::Query {
            families: &families,
            ..Default::default()
        };
        let id = db.query(&query)?;
        db.with_face_data(id, |data, _index| data.to_vec())
            .map(|bytes| (family.clone(), bytes))
    })
}
