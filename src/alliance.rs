//! 同盟统计：上传、对比与成员历史

pub mod diff;
pub mod entity;
pub mod parser;
pub mod storage;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::Local;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use self::diff::Metric;
use self::storage::{DISPLAY_TIME, SaveOutcome};
use crate::error::{ApiError, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::params;
use crate::report::{ComparisonReport, ReportRenderer};
use crate::server::{AppState, base_url};
use crate::store::{self, Bucket};
use crate::{error, info, warn};

const DEFAULT_METRIC: &str = "battle";

fn record_not_found() -> ApiError {
    ApiError::not_found("记录不存在")
}

// ===== 上传 =====

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut filename: Option<String> = None;
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                file = Some((name, field.bytes().await?.to_vec()));
            }
            Some("filename") => filename = Some(field.text().await?),
            _ => {}
        }
    }

    let (part_name, bytes) = file.ok_or_else(|| ApiError::bad_request("缺少文件"))?;
    // 小程序上传时文件名会被改写，优先使用单独传来的原始文件名
    let original = filename
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or(part_name);
    let original = store::base_name(&original).to_string();
    if original.is_empty() {
        return Err(ApiError::bad_request("缺少文件名"));
    }

    let stats_time = parser::parse_stats_time(&original);
    if storage::is_duplicate(&state.db, &original, stats_time).await? {
        info!(target: "Alliance", "{} 已导入过，跳过", original);
        return Ok(Json(skipped()));
    }

    let saved_name = format!("{}_{}", Local::now().format("%Y%m%d%H%M%S"), original);
    if let Err(e) = state.store.save(Bucket::Roster, &saved_name, &bytes).await {
        warn!(target: "Alliance", "保存原始文件 {} 失败: {}", saved_name, e);
    }

    let (text, encoding) = parser::decode(&bytes).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let parsed = parser::parse_roster(&text);
    if parsed.skipped > 0 {
        warn!(
            target: "Alliance",
            "{} ({}) 跳过 {} 行无效数据",
            original,
            encoding,
            parsed.skipped
        );
    }

    match storage::save_snapshot(&state.db, &original, stats_time, &parsed.rows).await? {
        SaveOutcome::Saved { count, .. } => Ok(Json(json!({
            "success": true,
            "message": format!("成功导入 {} 条数据", count),
            "count": count,
        }))),
        SaveOutcome::Duplicate => Ok(Json(skipped())),
    }
}

fn skipped() -> Value {
    json!({
        "success": true,
        "message": "该统计已导入，已跳过",
        "skipped": true,
    })
}

// ===== 查询 =====

pub async fn uploads(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let uploads = storage::list_uploads(&state.db).await?;
    Ok(Json(json!({ "uploads": uploads })))
}

pub async fn detail(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Value>> {
    let record = storage::find_upload(&state.db, id)
        .await?
        .ok_or_else(record_not_found)?;
    let data = storage::detail_rows(&state.db, id).await?;
    Ok(Json(json!({
        "success": true,
        "record": record,
        "data": data,
    })))
}

#[derive(Debug, Deserialize)]
pub struct DeleteRequest {
    #[serde(deserialize_with = "params::flexible_i64")]
    pub upload_id: i64,
}

pub async fn delete(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DeleteRequest>,
) -> ApiResult<Json<Value>> {
    let id = to_id(req.upload_id)?;
    if !storage::delete_snapshot(&state.db, id).await? {
        return Err(record_not_found());
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn member_history(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let name = query
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::bad_request("缺少成员名"))?;
    let history = storage::member_history(&state.db, &name).await?;
    Ok(Json(json!({
        "success": true,
        "count": history.len(),
        "history": history,
    })))
}

// ===== 对比 =====

fn to_id(raw: i64) -> ApiResult<i32> {
    i32::try_from(raw).map_err(|_| ApiError::bad_request("记录 ID 无效"))
}

fn default_metric() -> String {
    DEFAULT_METRIC.to_string()
}

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    #[serde(deserialize_with = "params::flexible_i64")]
    pub upload_id_1: i64,
    #[serde(deserialize_with = "params::flexible_i64")]
    pub upload_id_2: i64,
    #[serde(default = "default_metric")]
    pub metric: String,
}

pub async fn compare(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CompareRequest>,
) -> ApiResult<Json<Value>> {
    let (id_a, id_b) = (to_id(req.upload_id_1)?, to_id(req.upload_id_2)?);
    let a = storage::find_upload(&state.db, id_a)
        .await?
        .ok_or_else(record_not_found)?;
    let b = storage::find_upload(&state.db, id_b)
        .await?
        .ok_or_else(record_not_found)?;
    let (early, late) = diff::order_snapshots(&a, &b);

    let metric = Metric::parse(&req.metric);
    if metric.is_none() {
        warn!(target: "Alliance", "未知指标 {}，差值按 0 计算", req.metric);
    }

    let early_rows = storage::load_members(&state.db, early.id).await?;
    let late_rows = storage::load_members(&state.db, late.id).await?;
    let results = diff::diff(&early_rows, &late_rows, metric);

    let report = ComparisonReport {
        rows: results.clone(),
        early: early.effective_time(),
        late: late.effective_time(),
        metric_key: metric.map_or(req.metric.clone(), |m| m.key().to_string()),
        metric_label: metric.map_or(req.metric.clone(), |m| m.label().to_string()),
    };
    let base = base_url(&state.config, &headers);
    let images: Vec<Value> = render_images(state.renderer.clone(), report)
        .await
        .into_iter()
        .map(|img| {
            json!({
                "group": img.group,
                "url": format!("{}/api/alliance/images/{}", base, img.filename),
            })
        })
        .collect();

    info!(
        target: "Alliance",
        "对比 #{} -> #{} ({}): {} 人, {} 张图",
        early.id,
        late.id,
        req.metric,
        results.len(),
        images.len()
    );

    Ok(Json(json!({
        "success": true,
        "results": results,
        "early_ts": early.effective_time().format(DISPLAY_TIME).to_string(),
        "late_ts": late.effective_time().format(DISPLAY_TIME).to_string(),
        "metric": req.metric,
        "images": images,
    })))
}

/// 绘图失败只记录日志，不影响对比结果
async fn render_images(
    renderer: Arc<ReportRenderer>,
    report: ComparisonReport,
) -> Vec<crate::report::RenderedImage> {
    match tokio::task::spawn_blocking(move || renderer.render(&report)).await {
        Ok(Ok(images)) => images,
        Ok(Err(e)) => {
            error!(target: "Report", "生成对比图失败: {:#}", e);
            Vec::new()
        }
        Err(e) => {
            error!(target: "Report", "绘图任务异常: {}", e);
            Vec::new()
        }
    }
}

pub async fn image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    state.store.serve(Bucket::Generated, &filename).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_request_accepts_string_ids() {
        let req: CompareRequest =
            serde_json::from_str(r#"{"upload_id_1":"3","upload_id_2":7}"#).unwrap();
        assert_eq!(req.upload_id_1, 3);
        assert_eq!(req.upload_id_2, 7);
        assert_eq!(req.metric, "battle");
    }

    #[test]
    fn oversized_id_is_rejected() {
        assert_eq!(to_id(12).unwrap(), 12);
        assert!(to_id(i64::MAX).is_err());
    }
}
