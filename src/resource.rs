//! 资源点：赛季数据、最近资源点查询与迁城推荐

pub mod county;
pub mod entity;
pub mod loader;
pub mod relocate;

use axum::Json;
use axum::extract::State;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use self::county::resolve_county;
use self::entity::resource_point;
use self::relocate::{RelocationCandidate, RelocationParams, Scorer, recommend};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::hex::{self, HexPos, Positioned};
use crate::params;
use crate::server::AppState;
use crate::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourcePoint {
    pub season: String,
    pub county: String,
    pub level: String,
    pub x: i32,
    pub y: i32,
}

impl Positioned for ResourcePoint {
    fn pos(&self) -> HexPos {
        HexPos::new(self.x, self.y)
    }
}

impl From<resource_point::Model> for ResourcePoint {
    fn from(m: resource_point::Model) -> Self {
        Self {
            season: m.season,
            county: m.county,
            level: m.level,
            x: m.x,
            y: m.y,
        }
    }
}

impl ResourcePoint {
    /// 等级按包含关系匹配，"8铜" 也能命中 "8铜(富)"
    pub fn matches_level(&self, level: &str) -> bool {
        self.level.contains(level)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NearbyPoint {
    pub x: i32,
    pub y: i32,
    pub level: String,
    pub county: String,
    pub distance: u64,
}

#[derive(Debug, Clone)]
pub struct NearestResult {
    pub county: String,
    pub points: Vec<NearbyPoint>,
}

#[derive(Debug, Clone)]
pub struct RelocationResult {
    pub county: String,
    pub candidates: Vec<RelocationCandidate>,
}

/// 起点所在郡内、指定等级的资源点，按距离排序
///
/// 赛季没有任何资源点时返回 None。
pub fn find_nearest(
    points: &[ResourcePoint],
    start: HexPos,
    level: &str,
    limit: usize,
) -> Option<NearestResult> {
    let county = resolve_county(points, start)?.to_string();

    let filtered: Vec<&ResourcePoint> = points
        .iter()
        .filter(|p| p.county == county && p.matches_level(level))
        .collect();

    let points = hex::nearest(start, &filtered, limit)
        .into_iter()
        .map(|(distance, p)| NearbyPoint {
            x: p.x,
            y: p.y,
            level: p.level.clone(),
            county: p.county.clone(),
            distance,
        })
        .collect();

    Some(NearestResult { county, points })
}

/// 在起点所在郡内推荐迁城点
pub fn find_relocation(
    points: &[ResourcePoint],
    start: HexPos,
    level: &str,
    params: &RelocationParams,
    scorer: &dyn Scorer,
) -> Option<RelocationResult> {
    let county = resolve_county(points, start)?.to_string();

    let nodes: Vec<HexPos> = points
        .iter()
        .filter(|p| p.county == county && p.matches_level(level))
        .map(|p| p.pos())
        .collect();

    let candidates = recommend(start, &nodes, params, scorer);
    Some(RelocationResult { county, candidates })
}

/// 读取某个赛季的全部资源点，按导入顺序
pub async fn load_season(db: &DatabaseConnection, season: &str) -> Result<Vec<ResourcePoint>, DbErr> {
    let rows = resource_point::Entity::find()
        .filter(resource_point::Column::Season.eq(season))
        .order_by_asc(resource_point::Column::Id)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(ResourcePoint::from).collect())
}

pub async fn list_seasons(db: &DatabaseConnection) -> Result<Vec<String>, DbErr> {
    resource_point::Entity::find()
        .select_only()
        .column(resource_point::Column::Season)
        .distinct()
        .order_by_asc(resource_point::Column::Season)
        .into_tuple::<String>()
        .all(db)
        .await
}

// ===== HTTP =====

#[derive(Debug, Deserialize)]
pub struct PointQuery {
    #[serde(deserialize_with = "params::flexible_i32")]
    pub x: i32,
    #[serde(deserialize_with = "params::flexible_i32")]
    pub y: i32,
    #[serde(default, rename = "type")]
    pub level: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
}

impl PointQuery {
    fn season(&self) -> ApiResult<&str> {
        match self.season.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s),
            _ => Err(ApiError::bad_request("缺少赛季")),
        }
    }

    fn level<'a>(&'a self, default: &'a str) -> &'a str {
        match self.level.as_deref().map(str::trim) {
            Some(l) if !l.is_empty() => l,
            _ => default,
        }
    }
}

fn no_data(season: &str) -> ApiError {
    ApiError::not_found(format!("赛季 {} 没有资源点数据", season))
}

pub async fn seasons(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let seasons = list_seasons(&state.db).await?;
    Ok(Json(json!({ "seasons": seasons })))
}

pub async fn nearest(
    State(state): State<AppState>,
    ApiJson(query): ApiJson<PointQuery>,
) -> ApiResult<Json<Value>> {
    let season = query.season()?;
    let level = query.level(&state.config.resource.default_level);
    let start = HexPos::new(query.x, query.y);

    let points = load_season(&state.db, season).await?;
    let result = find_nearest(&points, start, level, state.config.resource.nearest_limit)
        .ok_or_else(|| no_data(season))?;

    debug!(
        target: "Resource",
        "最近资源点 {} ({}, {}) {} -> {} 郡 {} 个",
        season,
        start.x,
        start.y,
        level,
        result.county,
        result.points.len()
    );

    Ok(Json(json!({
        "county": result.county,
        "points": result.points,
    })))
}

pub async fn relocate(
    State(state): State<AppState>,
    ApiJson(query): ApiJson<PointQuery>,
) -> ApiResult<Json<Value>> {
    let season = query.season()?;
    let level = query.level(&state.config.resource.default_level);
    let start = HexPos::new(query.x, query.y);

    let points = load_season(&state.db, season).await?;
    let params = RelocationParams::default();
    let result = find_relocation(&points, start, level, &params, state.scorer.as_ref())
        .ok_or_else(|| no_data(season))?;

    info!(
        target: "Resource",
        "迁城推荐 {} ({}, {}) {} -> {} 郡 {} 个候选",
        season,
        start.x,
        start.y,
        level,
        result.county,
        result.candidates.len()
    );

    Ok(Json(json!({
        "county": result.county,
        "top_locations": result.candidates,
    })))
}
