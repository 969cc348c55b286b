//! 战功截图提交

pub mod entity;

use axum::Json;
use axum::extract::{Multipart, State};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, SqlErr,
};
use serde_json::{Value, json};

use self::entity::battle_merit;
use crate::error::{ApiError, ApiResult};
use crate::media::random_name;
use crate::server::AppState;
use crate::store::{self, Bucket};
use crate::{info, warn};

/// 大于该值的时间戳视为毫秒
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// 解析截图创建时间
///
/// 纯数字为 Unix 时间戳（秒或毫秒），否则按 ISO 8601 解析；
/// 无法解析时退回 `now`，未提供时为 None。
pub fn parse_image_time(raw: Option<&str>, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty())?;

    let parsed = if raw.bytes().all(|b| b.is_ascii_digit()) {
        raw.parse::<i64>().ok().and_then(|ts| {
            let (secs, nanos) = if ts > MILLIS_THRESHOLD {
                (ts / 1000, ((ts % 1000) * 1_000_000) as u32)
            } else {
                (ts, 0)
            };
            DateTime::from_timestamp(secs, nanos).map(|t| t.with_timezone(&Local).naive_local())
        })
    } else {
        parse_iso(raw)
    };

    Some(parsed.unwrap_or_else(|| {
        warn!(target: "Battle", "无法解析截图时间 {:?}，使用当前时间", raw);
        now
    }))
}

fn parse_iso(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Local).naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

pub struct NewMerit<'a> {
    pub openid: &'a str,
    pub merit_value: i64,
    pub image_filename: &'a str,
    pub image_create_time: Option<NaiveDateTime>,
    pub file_md5: &'a str,
}

pub async fn find_duplicate(
    db: &DatabaseConnection,
    openid: &str,
    file_md5: &str,
) -> Result<Option<battle_merit::Model>, DbErr> {
    battle_merit::Entity::find()
        .filter(battle_merit::Column::Openid.eq(openid))
        .filter(battle_merit::Column::FileMd5.eq(file_md5))
        .one(db)
        .await
}

/// 写入一条战功记录，同一用户同一 md5 已存在时返回 None
pub async fn insert_merit(
    db: &DatabaseConnection,
    merit: NewMerit<'_>,
) -> Result<Option<battle_merit::Model>, DbErr> {
    let result = battle_merit::ActiveModel {
        openid: Set(merit.openid.to_string()),
        merit_value: Set(merit.merit_value),
        image_filename: Set(merit.image_filename.to_string()),
        image_create_time: Set(merit.image_create_time),
        file_md5: Set(merit.file_md5.to_string()),
        created_at: Set(Local::now().naive_local()),
        ..Default::default()
    }
    .insert(db)
    .await;

    match result {
        Ok(m) => Ok(Some(m)),
        Err(e) if is_unique_violation(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

fn duplicate() -> ApiError {
    ApiError::Conflict("重复提交的截图".to_string(), json!({ "is_duplicate": true }))
}

#[derive(Default)]
struct SubmitForm {
    file: Option<(String, Vec<u8>)>,
    merit: Option<String>,
    openid: Option<String>,
    image_create_time: Option<String>,
    md5: Option<String>,
}

pub async fn submit(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut form = SubmitForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                form.file = Some((filename, field.bytes().await?.to_vec()));
            }
            "merit" => form.merit = Some(field.text().await?),
            "openid" => form.openid = Some(field.text().await?),
            "image_create_time" => form.image_create_time = Some(field.text().await?),
            "md5" => form.md5 = Some(field.text().await?),
            _ => {}
        }
    }

    let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let (Some((filename, bytes)), Some(merit), Some(openid)) =
        (form.file, non_empty(form.merit), non_empty(form.openid))
    else {
        return Err(ApiError::bad_request("缺少必要字段"));
    };

    let merit_value: i64 = merit
        .replace(',', "")
        .parse()
        .map_err(|_| ApiError::bad_request("战功数值无效"))?;

    let file_md5 = non_empty(form.md5)
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| format!("{:x}", md5::compute(&bytes)));

    if find_duplicate(&state.db, &openid, &file_md5).await?.is_some() {
        return Err(duplicate());
    }

    let saved_name = random_name(&store::extension(&filename).unwrap_or_else(|| "jpg".into()));
    state.store.save(Bucket::Battle, &saved_name, &bytes).await?;

    let now = Local::now().naive_local();
    let record = insert_merit(
        &state.db,
        NewMerit {
            openid: &openid,
            merit_value,
            image_filename: &saved_name,
            image_create_time: parse_image_time(form.image_create_time.as_deref(), now),
            file_md5: &file_md5,
        },
    )
    .await?
    .ok_or_else(duplicate)?;

    info!(
        target: "Battle",
        "{} 提交战功 {} (#{})",
        openid,
        merit_value,
        record.id
    );
    Ok(Json(json!({ "success": true, "id": record.id })))
}
