use chrono::{Local, NaiveDateTime};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, SqlErr, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;

use super::entity::{alliance_data, upload_record};
use super::parser::{MemberRow, dedup_key};
use crate::{debug, info};

const INSERT_CHUNK: usize = 500;

/// 展示用时间格式
pub const DISPLAY_TIME: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved { id: i32, count: usize },
    /// 已有相同统计时间（或文件名）的记录
    Duplicate,
}

impl From<alliance_data::Model> for MemberRow {
    fn from(m: alliance_data::Model) -> Self {
        Self {
            rank: m.rank,
            name: m.name,
            group_name: m.group_name,
            contribution: m.contribution,
            power: m.power,
            battle_achievement: m.battle_achievement,
            assist: m.assist,
            donation: m.donation,
        }
    }
}

fn is_unique_violation(e: &DbErr) -> bool {
    matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// 是否已有同一去重键的记录，用于在保存原始文件前提前返回
pub async fn is_duplicate(
    db: &DatabaseConnection,
    filename: &str,
    stats_time: Option<NaiveDateTime>,
) -> Result<bool, DbErr> {
    let key = dedup_key(filename, stats_time);
    let existing = upload_record::Entity::find()
        .filter(upload_record::Column::DedupKey.eq(key))
        .one(db)
        .await?;
    Ok(existing.is_some())
}

/// 写入一次统计：记录与成员行在同一事务中
///
/// 查重与插入同样在事务内，并发上传撞上唯一约束时按重复处理。
pub async fn save_snapshot(
    db: &DatabaseConnection,
    filename: &str,
    stats_time: Option<NaiveDateTime>,
    rows: &[MemberRow],
) -> Result<SaveOutcome, DbErr> {
    let key = dedup_key(filename, stats_time);
    let txn = db.begin().await?;

    let existing = upload_record::Entity::find()
        .filter(upload_record::Column::DedupKey.eq(&key))
        .one(&txn)
        .await?;
    if existing.is_some() {
        debug!(target: "Alliance", "重复上传 {}，跳过", key);
        return Ok(SaveOutcome::Duplicate);
    }

    let record = upload_record::ActiveModel {
        filename: Set(filename.to_string()),
        dedup_key: Set(key.clone()),
        upload_time: Set(Local::now().naive_local()),
        stats_time: Set(stats_time),
        member_count: Set(rows.len() as i32),
        ..Default::default()
    }
    .insert(&txn)
    .await;

    let record = match record {
        Ok(r) => r,
        Err(e) if is_unique_violation(&e) => {
            debug!(target: "Alliance", "并发上传 {}，跳过", key);
            return Ok(SaveOutcome::Duplicate);
        }
        Err(e) => return Err(e),
    };

    for chunk in rows.chunks(INSERT_CHUNK) {
        let models = chunk.iter().map(|r| alliance_data::ActiveModel {
            upload_id: Set(record.id),
            rank: Set(r.rank),
            name: Set(r.name.clone()),
            group_name: Set(r.group_name.clone()),
            contribution: Set(r.contribution),
            power: Set(r.power),
            battle_achievement: Set(r.battle_achievement),
            assist: Set(r.assist),
            donation: Set(r.donation),
            ..Default::default()
        });
        alliance_data::Entity::insert_many(models).exec(&txn).await?;
    }

    match txn.commit().await {
        Ok(()) => {}
        Err(e) if is_unique_violation(&e) => return Ok(SaveOutcome::Duplicate),
        Err(e) => return Err(e),
    }

    info!(
        target: "Alliance",
        "保存统计 #{} {} ({} 人)",
        record.id,
        filename,
        rows.len()
    );
    Ok(SaveOutcome::Saved {
        id: record.id,
        count: rows.len(),
    })
}

/// 删除记录及其全部成员行，记录不存在时返回 false
pub async fn delete_snapshot(db: &DatabaseConnection, id: i32) -> Result<bool, DbErr> {
    let txn = db.begin().await?;
    let rows = alliance_data::Entity::delete_many()
        .filter(alliance_data::Column::UploadId.eq(id))
        .exec(&txn)
        .await?;
    let record = upload_record::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    if record.rows_affected > 0 {
        info!(
            target: "Alliance",
            "删除统计 #{} 及 {} 条成员数据",
            id,
            rows.rows_affected
        );
    }
    Ok(record.rows_affected > 0)
}

/// 最新上传在前
pub async fn list_uploads(db: &DatabaseConnection) -> Result<Vec<upload_record::Model>, DbErr> {
    upload_record::Entity::find()
        .order_by_desc(upload_record::Column::UploadTime)
        .order_by_desc(upload_record::Column::Id)
        .all(db)
        .await
}

pub async fn find_upload(
    db: &DatabaseConnection,
    id: i32,
) -> Result<Option<upload_record::Model>, DbErr> {
    upload_record::Entity::find_by_id(id).one(db).await
}

/// 成员行，按导入顺序
pub async fn load_members(db: &DatabaseConnection, upload_id: i32) -> Result<Vec<MemberRow>, DbErr> {
    let rows = alliance_data::Entity::find()
        .filter(alliance_data::Column::UploadId.eq(upload_id))
        .order_by_asc(alliance_data::Column::Id)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(MemberRow::from).collect())
}

/// 详情页：按排名、成员名排列
pub async fn detail_rows(
    db: &DatabaseConnection,
    upload_id: i32,
) -> Result<Vec<alliance_data::Model>, DbErr> {
    alliance_data::Entity::find()
        .filter(alliance_data::Column::UploadId.eq(upload_id))
        .order_by_asc(alliance_data::Column::Rank)
        .order_by_asc(alliance_data::Column::Name)
        .all(db)
        .await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub upload_id: i32,
    pub display_time: String,
    pub battle: i64,
    pub power: i64,
    pub contribution: i64,
    pub assist: i64,
    pub donation: i64,
    pub group_name: String,
}

/// 某个成员在各次统计中的数据，按统计时间（缺失时用上传时间）先后排列
pub async fn member_history(db: &DatabaseConnection, name: &str) -> Result<Vec<HistoryEntry>, DbErr> {
    let rows = alliance_data::Entity::find()
        .filter(alliance_data::Column::Name.eq(name))
        .order_by_asc(alliance_data::Column::Id)
        .all(db)
        .await?;
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = rows.iter().map(|r| r.upload_id).collect();
    let records: HashMap<i32, upload_record::Model> = upload_record::Entity::find()
        .filter(upload_record::Column::Id.is_in(ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    let mut entries: Vec<(NaiveDateTime, HistoryEntry)> = rows
        .into_iter()
        .filter_map(|row| {
            let record = records.get(&row.upload_id)?;
            let at = record.effective_time();
            Some((
                at,
                HistoryEntry {
                    upload_id: row.upload_id,
                    display_time: at.format(DISPLAY_TIME).to_string(),
                    battle: row.battle_achievement,
                    power: row.power,
                    contribution: row.contribution,
                    assist: row.assist,
                    donation: row.donation,
                    group_name: row.group_name,
                },
            ))
        })
        .collect();

    entries.sort_by_key(|(at, e)| (*at, e.upload_id));
    Ok(entries.into_iter().map(|(_, e)| e).collect())
}
