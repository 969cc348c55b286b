use anyhow::{Result, anyhow};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use plotters::prelude::*;
use plotters::style::FontDesc;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use super::idiom::Idiom;
use crate::alliance::diff::DiffRow;
use crate::config::Threshold;

// ===== 配色 =====

const BACKGROUND: RGBColor = RGBColor(255, 255, 224);
const HEADER_FILL: RGBColor = RGBColor(255, 200, 120);
const HEADER_BORDER: RGBColor = RGBColor(80, 80, 80);
const ROW_BORDER: RGBColor = RGBColor(120, 120, 120);
const TEXT: RGBColor = RGBColor(0, 0, 0);
const HEADER_TEXT: RGBColor = RGBColor(40, 40, 40);
const HIGH_FILL: RGBAColor = RGBAColor(144, 238, 144, 0.7);
const LOW_FILL: RGBAColor = RGBAColor(255, 140, 0, 0.7);
const IDIOM_FILL: RGBColor = RGBColor(255, 245, 230);
const IDIOM_BORDER: RGBColor = RGBColor(255, 200, 150);
const IDIOM_TITLE: RGBColor = RGBColor(200, 100, 50);
const IDIOM_TEXT: RGBColor = RGBColor(80, 80, 80);

// ===== 布局 =====

const TITLE_FONT: u32 = 38;
const TABLE_FONT: u32 = 48;
const IDIOM_TITLE_FONT: u32 = 42;
const IDIOM_BODY_FONT: u32 = 36;

const HEADER_BOTTOM_GAP: u32 = 60;
const GROUP_TITLE_GAP: u32 = 32;
const ROW_PADDING: u32 = 32;
const IDIOM_TOP_PADDING: u32 = 80;
const IDIOM_BOTTOM_PADDING: u32 = 100;
const IDIOM_LINE_SPACING: u32 = 20;
const IDIOM_MARGIN_X: i32 = 60;
const TABLE_WIDTH_RATIO: f64 = 0.92;
// 排名 / 成员 / 差值
const COLUMN_RATIOS: [f64; 3] = [0.15, 0.45, 0.40];

const PLACEHOLDER_HEADER: (u32, u32) = (800, 200);

pub struct CardSpec<'a> {
    pub header: &'a RgbaImage,
    pub font_family: &'a str,
    pub title: &'a str,
    pub metric_label: &'a str,
    pub rows: &'a [&'a DiffRow],
    pub threshold: Threshold,
    pub idiom: Option<&'a Idiom>,
}

fn draw_err(e: impl std::fmt::Display) -> anyhow::Error {
    anyhow!("绘制失败: {}", e)
}

/// 头图缩放到目标宽度，缺失时用灰色占位
pub fn prepare_header(source: Option<RgbaImage>, width: u32) -> RgbaImage {
    let img = source.unwrap_or_else(|| {
        let (w, h) = PLACEHOLDER_HEADER;
        RgbaImage::from_pixel(w, h, Rgba([200, 200, 200, 255]))
    });
    if img.width() == width || img.width() == 0 {
        return img;
    }
    let height = ((img.height() as f64) * (width as f64) / (img.width() as f64)).round() as u32;
    imageops::resize(&img, width, height.max(1), FilterType::Lanczos3)
}

fn text_height(font: &FontDesc, fallback: u32) -> u32 {
    font.box_size("汉").map(|(_, h)| h).unwrap_or(fallback).max(1)
}

/// 逐字折行，保证每行宽度不超过 `max_width`
pub fn wrap_text(font: &FontDesc, text: &str, max_width: u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        let mut candidate = current.clone();
        candidate.push(ch);
        let width = font
            .box_size(&candidate)
            .map(|(w, _)| w)
            .unwrap_or(candidate.chars().count() as u32 * font.get_size() as u32);
        if !current.is_empty() && width > max_width {
            lines.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

struct IdiomLayout {
    title: String,
    lines: Vec<String>,
    title_h: u32,
    body_h: u32,
    height: u32,
}

/// 绘制一张对比卡片
pub fn draw(spec: &CardSpec) -> Result<RgbaImage> {
    let width = spec.header.width();
    let header_h = spec.header.height();

    let title_font = (spec.font_family, TITLE_FONT).into_font();
    let table_font = (spec.font_family, TABLE_FONT).into_font();
    let idiom_title_font = (spec.font_family, IDIOM_TITLE_FONT).into_font();
    let idiom_body_font = (spec.font_family, IDIOM_BODY_FONT).into_font();

    let row_h = text_height(&table_font, TABLE_FONT).max(36) + ROW_PADDING;
    let title_y = header_h + HEADER_BOTTOM_GAP;
    let title_h = text_height(&title_font, TITLE_FONT);
    let table_top = title_y + title_h + GROUP_TITLE_GAP;
    let table_h = (spec.rows.len() as u32 + 1) * row_h;

    let idiom = spec.idiom.map(|idiom| {
        let title_h = text_height(&idiom_title_font, IDIOM_TITLE_FONT);
        let body_h = text_height(&idiom_body_font, IDIOM_BODY_FONT).max(36);
        let lines = wrap_text(&idiom_body_font, &idiom.story, width.saturating_sub(100));
        let story_h = if lines.is_empty() {
            0
        } else {
            lines.len() as u32 * body_h + (lines.len() as u32 - 1) * IDIOM_LINE_SPACING
        };
        let gap = if story_h > 0 { IDIOM_LINE_SPACING } else { 0 };
        IdiomLayout {
            title: idiom.title.clone(),
            lines,
            title_h,
            body_h,
            height: IDIOM_TOP_PADDING + title_h + gap + story_h + IDIOM_BOTTOM_PADDING,
        }
    });

    let height = header_h.max(table_top + table_h + idiom.as_ref().map_or(0, |i| i.height));

    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&BACKGROUND).map_err(draw_err)?;

        let table_w = width as f64 * TABLE_WIDTH_RATIO;
        let table_left = (width as f64 - table_w) / 2.0;
        let mut col_x = [table_left; 4];
        for (i, ratio) in COLUMN_RATIOS.iter().enumerate() {
            col_x[i + 1] = col_x[i] + table_w * ratio;
        }
        let col_x = col_x.map(|x| x.round() as i32);

        // 标题
        root.draw_text(
            spec.title,
            &title_font
                .color(&TEXT)
                .pos(Pos::new(HPos::Left, VPos::Top)),
            (col_x[0], title_y as i32),
        )
        .map_err(draw_err)?;

        let centered = |color| {
            table_font
                .color(color)
                .pos(Pos::new(HPos::Center, VPos::Center))
        };

        // 表头
        let header_cells = ["#".to_string(), "成员".to_string(), format!("{}差值", spec.metric_label)];
        let top = table_top as i32;
        let bottom = top + row_h as i32;
        root.draw(&Rectangle::new(
            [(col_x[0], top), (col_x[3], bottom)],
            HEADER_FILL.filled(),
        ))
        .map_err(draw_err)?;
        for (i, text) in header_cells.iter().enumerate() {
            root.draw(&Rectangle::new(
                [(col_x[i], top), (col_x[i + 1], bottom)],
                HEADER_BORDER.stroke_width(2),
            ))
            .map_err(draw_err)?;
            root.draw_text(
                text,
                &centered(&HEADER_TEXT),
                ((col_x[i] + col_x[i + 1]) / 2, (top + bottom) / 2),
            )
            .map_err(draw_err)?;
        }

        // 数据行
        for (idx, row) in spec.rows.iter().enumerate() {
            let top = table_top as i32 + (idx as i32 + 1) * row_h as i32;
            let bottom = top + row_h as i32;
            let fill = if row.diff >= spec.threshold.upper {
                Some(HIGH_FILL)
            } else if row.diff <= spec.threshold.lower {
                Some(LOW_FILL)
            } else {
                None
            };

            let cells = [(idx + 1).to_string(), row.name.clone(), row.diff.to_string()];
            for (i, text) in cells.iter().enumerate() {
                let rect = [(col_x[i], top), (col_x[i + 1], bottom)];
                if let Some(color) = fill {
                    root.draw(&Rectangle::new(rect, color.filled()))
                        .map_err(draw_err)?;
                }
                root.draw(&Rectangle::new(rect, ROW_BORDER.stroke_width(1)))
                    .map_err(draw_err)?;
                root.draw_text(
                    text,
                    &centered(&TEXT),
                    ((col_x[i] + col_x[i + 1]) / 2, (top + bottom) / 2),
                )
                .map_err(draw_err)?;
            }
        }

        // 成语
        if let Some(layout) = &idiom {
            let idiom_top = (table_top + table_h + IDIOM_TOP_PADDING) as i32;
            let box_bottom =
                idiom_top + layout.height as i32 - IDIOM_BOTTOM_PADDING as i32 + 10;
            let box_rect = [(20, idiom_top), (width as i32 - 20, box_bottom)];
            root.draw(&Rectangle::new(box_rect, IDIOM_FILL.filled()))
                .map_err(draw_err)?;
            root.draw(&Rectangle::new(box_rect, IDIOM_BORDER.stroke_width(1)))
                .map_err(draw_err)?;

            let title_center = idiom_top + (IDIOM_TOP_PADDING / 2 + layout.title_h / 2) as i32;
            root.draw_text(
                &layout.title,
                &idiom_title_font
                    .color(&IDIOM_TITLE)
                    .pos(Pos::new(HPos::Left, VPos::Center)),
                (IDIOM_MARGIN_X, title_center),
            )
            .map_err(draw_err)?;

            let story_top = idiom_top
                + (IDIOM_TOP_PADDING / 2 + layout.title_h + IDIOM_LINE_SPACING) as i32;
            let body_style = idiom_body_font
                .color(&IDIOM_TEXT)
                .pos(Pos::new(HPos::Left, VPos::Top));
            for (i, line) in layout.lines.iter().enumerate() {
                let y = story_top + i as i32 * (layout.body_h + IDIOM_LINE_SPACING) as i32;
                root.draw_text(line, &body_style, (IDIOM_MARGIN_X, y))
                    .map_err(draw_err)?;
            }
        }

        root.present().map_err(draw_err)?;
    }

    let mut canvas = RgbaImage::from_fn(width, height, |x, y| {
        let idx = ((y * width + x) * 3) as usize;
        Rgba([buffer[idx], buffer[idx + 1], buffer[idx + 2], 255])
    });
    imageops::overlay(&mut canvas, spec.header, 0, 0);
    Ok(canvas)
}
