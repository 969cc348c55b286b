//! 同盟对比图
//!
//! 一次对比生成一张 "全盟" 卡片，再为每个已分组的组各生成一张。

pub mod card;
pub mod font;
pub mod idiom;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Timelike};
use image::RgbaImage;
use rand::Rng;
use rand::seq::IndexedRandom;
use std::path::PathBuf;

use self::card::CardSpec;
use self::idiom::Idiom;
use crate::alliance::diff::{DiffRow, Group};
use crate::config::{AppConfig, ReportConfig};
use crate::{debug, info};

pub const ALL_MEMBERS: &str = "全盟";

const SHICHEN: [&str; 12] = [
    "子", "丑", "寅", "卯", "辰", "巳", "午", "未", "申", "酉", "戌", "亥",
];

/// `2024年05月01日 午时`
pub fn format_shichen(at: NaiveDateTime) -> String {
    let idx = ((at.hour() + 1) / 2) % 12;
    format!("{} {}时", at.format("%Y年%m月%d日"), SHICHEN[idx as usize])
}

/// 一张卡片的内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<'a> {
    /// 用于文件名与接口返回
    pub group: String,
    /// 卡片标题中的名称
    pub label: String,
    pub rows: Vec<&'a DiffRow>,
}

/// 全盟在前，其余按组名升序；未分组成员只出现在全盟卡片中
pub fn build_pages(rows: &[DiffRow]) -> Vec<Page<'_>> {
    let mut groups: Vec<&Group> = rows.iter().map(|r| &r.group).filter(|g| g.is_assigned()).collect();
    groups.sort();
    groups.dedup();

    let mut pages = Vec::with_capacity(groups.len() + 1);
    pages.push(Page {
        group: ALL_MEMBERS.to_string(),
        label: ALL_MEMBERS.to_string(),
        rows: rows.iter().collect(),
    });
    for group in groups {
        pages.push(Page {
            group: group.label().to_string(),
            label: format!("{} 组", group.label()),
            rows: rows.iter().filter(|r| &r.group == group).collect(),
        });
    }

    pages.retain(|p| !p.rows.is_empty());
    for page in &mut pages {
        page.rows.sort_by(|a, b| b.diff.cmp(&a.diff));
    }
    pages
}

/// 组名中的路径分隔符替换为下划线
fn safe_group(group: &str) -> String {
    group.replace(['/', '\\'], "_")
}

#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub rows: Vec<DiffRow>,
    pub early: NaiveDateTime,
    pub late: NaiveDateTime,
    pub metric_key: String,
    pub metric_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    pub group: String,
    pub filename: String,
}

pub struct ReportRenderer {
    font_family: &'static str,
    idioms: Vec<Idiom>,
    config: ReportConfig,
    output_dir: PathBuf,
    asset_dir: PathBuf,
}

impl ReportRenderer {
    pub fn new(config: &AppConfig) -> Self {
        let asset_dir = config.paths.asset_dir();
        let idioms = idiom::load_idioms(&asset_dir.join("idioms100.json"));
        debug!(target: "Report", "已加载 {} 条成语", idioms.len());

        Self {
            font_family: font::ensure_registered(&config.report),
            idioms,
            config: config.report.clone(),
            output_dir: config.paths.generated_dir(),
            asset_dir,
        }
    }

    fn load_header(&self) -> RgbaImage {
        let path = self.asset_dir.join("header.jpg");
        let source = match image::open(&path) {
            Ok(img) => Some(img.to_rgba8()),
            Err(e) => {
                debug!(target: "Report", "头图不可用 {:?}: {}，使用占位图", path, e);
                None
            }
        };
        card::prepare_header(source, self.config.width)
    }

    /// 同步绘制并写盘，调用方应放在阻塞线程中执行
    pub fn render(&self, report: &ComparisonReport) -> Result<Vec<RenderedImage>> {
        let pages = build_pages(&report.rows);
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("无法创建输出目录 {:?}", self.output_dir))?;

        let header = self.load_header();
        let threshold = self.config.threshold(&report.metric_key);
        let period = format!(
            "{} → {}",
            format_shichen(report.early),
            format_shichen(report.late)
        );
        let stamp = chrono::Local::now().format("%H%M%S");
        let mut rng = rand::rng();

        let mut images = Vec::with_capacity(pages.len());
        for page in &pages {
            let title = format!("{} 丨 {}", page.label, period);
            let spec = CardSpec {
                header: &header,
                font_family: self.font_family,
                title: &title,
                metric_label: &report.metric_label,
                rows: &page.rows,
                threshold,
                idiom: self.idioms.choose(&mut rng),
            };
            let canvas = card::draw(&spec).with_context(|| format!("绘制 {} 失败", page.group))?;

            let token: u32 = rng.random::<u32>() & 0xff_ffff;
            let filename = format!(
                "compare_{}_{}_{:06x}.png",
                safe_group(&page.group),
                stamp,
                token
            );
            let path = self.output_dir.join(&filename);
            canvas
                .save(&path)
                .with_context(|| format!("保存对比图失败: {:?}", path))?;

            images.push(RenderedImage {
                group: page.group.clone(),
                filename,
            });
        }

        info!(
            target: "Report",
            "生成 {} 张{}对比图",
            images.len(),
            report.metric_label
        );
        Ok(images)
    }
}
