use anyhow::{Context, Result};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, TransactionTrait,
};
use std::path::Path;
use tokio::fs;

use super::ResourcePoint;
use super::entity::resource_point;
use crate::alliance::parser::decode;
use crate::{debug, info, warn};

const COUNTY_KEYS: &[&str] = &["county", "郡", "州郡"];
const LEVEL_KEYS: &[&str] = &["level", "等级"];
const X_KEYS: &[&str] = &["x", "X"];
const Y_KEYS: &[&str] = &["y", "Y"];

const INSERT_CHUNK: usize = 500;

/// 导入 `dir` 下的 `<赛季>.csv`，已有数据的赛季跳过
///
/// 返回新导入的资源点数量。
pub async fn load_seasons(db: &DatabaseConnection, dir: &Path) -> Result<usize> {
    if !dir.exists() {
        fs::create_dir_all(dir).await?;
        info!(target: "Resource", "资源点目录为空，已创建: {:?}", dir);
        return Ok(0);
    }

    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        {
            files.push(path);
        }
    }
    files.sort();

    let mut total = 0;
    for path in files {
        let Some(season) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
            continue;
        };

        let existing = resource_point::Entity::find()
            .filter(resource_point::Column::Season.eq(&season))
            .count(db)
            .await?;
        if existing > 0 {
            debug!(target: "Resource", "赛季 {} 已有 {} 个资源点，跳过导入", season, existing);
            continue;
        }

        let bytes = fs::read(&path)
            .await
            .with_context(|| format!("读取 {:?} 失败", path))?;
        let (text, encoding) = decode(&bytes).with_context(|| format!("{:?} 编码无法识别", path))?;
        let points = parse_season_csv(&season, &text);

        insert_points(db, &points).await?;
        info!(
            target: "Resource",
            "赛季 {} 导入 {} 个资源点 (编码 {})",
            season,
            points.len(),
            encoding
        );
        total += points.len();
    }

    Ok(total)
}

async fn insert_points(db: &DatabaseConnection, points: &[ResourcePoint]) -> Result<()> {
    let txn = db.begin().await?;
    for chunk in points.chunks(INSERT_CHUNK) {
        let models = chunk.iter().map(|p| resource_point::ActiveModel {
            season: Set(p.season.clone()),
            county: Set(p.county.clone()),
            level: Set(p.level.clone()),
            x: Set(p.x),
            y: Set(p.y),
            ..Default::default()
        });
        resource_point::Entity::insert_many(models).exec(&txn).await?;
    }
    txn.commit().await?;
    Ok(())
}

/// 解析单个赛季文件，坐标或郡缺失的行会被跳过
pub fn parse_season_csv(season: &str, text: &str) -> Vec<ResourcePoint> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            warn!(target: "Resource", "赛季 {} 表头解析失败: {}", season, e);
            return Vec::new();
        }
    };
    let find = |keys: &[&str]| keys.iter().find_map(|k| headers.iter().position(|h| h == *k));

    let (Some(county_idx), Some(x_idx), Some(y_idx)) = (find(COUNTY_KEYS), find(X_KEYS), find(Y_KEYS))
    else {
        warn!(target: "Resource", "赛季 {} 缺少 郡/X/Y 列", season);
        return Vec::new();
    };
    let level_idx = find(LEVEL_KEYS);

    let mut points = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "Resource", "赛季 {} 第 {} 行解析失败: {}", season, line + 2, e);
                continue;
            }
        };

        let county = record.get(county_idx).unwrap_or("");
        let x = record.get(x_idx).and_then(|v| v.parse::<i32>().ok());
        let y = record.get(y_idx).and_then(|v| v.parse::<i32>().ok());
        let (Some(x), Some(y)) = (x, y) else {
            debug!(target: "Resource", "赛季 {} 第 {} 行坐标无效，跳过", season, line + 2);
            continue;
        };
        if county.is_empty() {
            continue;
        }

        points.push(ResourcePoint {
            season: season.to_string(),
            county: county.to_string(),
            level: level_idx
                .and_then(|i| record.get(i))
                .unwrap_or("")
                .to_string(),
            x,
            y,
        });
    }
    points
}
