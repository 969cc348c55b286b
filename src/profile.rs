//! 用户登录与个人资料

pub mod entity;
pub mod wechat;

use axum::Json;
use axum::extract::State;
use chrono::{Local, NaiveDateTime};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, SqlErr};
use serde::Deserialize;
use serde_json::{Value, json};

use self::entity::user;
use self::wechat::LoginError;
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::server::AppState;
use crate::{debug, info};

/// 同盟名最多 6 个字
pub const ALLIANCE_NAME_MAX: usize = 6;

async fn bump_login(
    db: &DatabaseConnection,
    user: user::Model,
    now: NaiveDateTime,
) -> Result<user::Model, DbErr> {
    let count = user.login_count + 1;
    let mut active: user::ActiveModel = user.into();
    active.last_login_time = Set(now);
    active.login_count = Set(count);
    active.update(db).await
}

/// 登录：新用户注册，老用户累加登录次数
pub async fn record_login(db: &DatabaseConnection, openid: &str) -> Result<user::Model, DbErr> {
    let now = Local::now().naive_local();

    if let Some(existing) = user::Entity::find_by_id(openid).one(db).await? {
        return bump_login(db, existing, now).await;
    }

    let created = user::ActiveModel {
        openid: Set(openid.to_string()),
        registration_time: Set(now),
        last_login_time: Set(now),
        login_count: Set(1),
        ..Default::default()
    }
    .insert(db)
    .await;

    match created {
        Ok(u) => {
            info!(target: "Profile", "新用户注册: {}", openid);
            Ok(u)
        }
        // 同一用户并发首次登录
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            let existing = user::Entity::find_by_id(openid)
                .one(db)
                .await?
                .ok_or_else(|| DbErr::RecordNotFound(openid.to_string()))?;
            bump_login(db, existing, now).await
        }
        Err(e) => Err(e),
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, rename = "nickName")]
    pub nickname: Option<String>,
    #[serde(default, rename = "avatarUrl")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub role_name: Option<String>,
    #[serde(default)]
    pub role_id: Option<String>,
    #[serde(default)]
    pub server_info: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
}

/// 只更新请求中出现的字段，用户不存在时返回 None
pub async fn update_profile(
    db: &DatabaseConnection,
    openid: &str,
    update: ProfileUpdate,
) -> Result<Option<user::Model>, DbErr> {
    let Some(existing) = user::Entity::find_by_id(openid).one(db).await? else {
        return Ok(None);
    };

    let mut active: user::ActiveModel = existing.into();
    let fields = [
        (&mut active.nickname, update.nickname),
        (&mut active.avatar_url, update.avatar_url),
        (&mut active.role_name, update.role_name),
        (&mut active.role_id, update.role_id),
        (&mut active.server_info, update.server_info),
        (&mut active.zone, update.zone),
        (&mut active.team_name, update.team_name),
    ];
    for (slot, value) in fields {
        if let Some(v) = value {
            *slot = Set(Some(v));
        }
    }

    active.update(db).await.map(Some)
}

pub async fn set_season(
    db: &DatabaseConnection,
    openid: &str,
    season: &str,
) -> Result<Option<user::Model>, DbErr> {
    let Some(existing) = user::Entity::find_by_id(openid).one(db).await? else {
        return Ok(None);
    };
    let mut active: user::ActiveModel = existing.into();
    active.season = Set(Some(season.to_string()));
    active.update(db).await.map(Some)
}

pub async fn set_alliance_name(
    db: &DatabaseConnection,
    openid: &str,
    alliance_name: &str,
) -> Result<Option<user::Model>, DbErr> {
    let Some(existing) = user::Entity::find_by_id(openid).one(db).await? else {
        return Ok(None);
    };
    let mut active: user::ActiveModel = existing.into();
    active.alliance_name = Set(Some(alliance_name.to_string()));
    active.update(db).await.map(Some)
}

// ===== HTTP =====

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("缺少 {}", name)))
}

fn user_not_found() -> ApiError {
    ApiError::not_found("用户不存在")
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub code: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let code = required(req.code, "code")?;

    let session = wechat::code_to_session(&state.http, &state.config.wechat, &code)
        .await
        .map_err(|e| match e {
            LoginError::Rejected(msg) => ApiError::bad_request(msg),
            LoginError::Upstream(err) => ApiError::Internal(err),
        })?;

    let user = record_login(&state.db, &session.openid).await?;
    debug!(
        target: "Profile",
        "{} 第 {} 次登录",
        user.openid,
        user.login_count
    );

    Ok(Json(json!({
        "openid": session.openid,
        "session_key": session.session_key,
        "user": user,
    })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub openid: Option<String>,
    #[serde(flatten)]
    pub update: ProfileUpdate,
}

pub async fn update_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UpdateRequest>,
) -> ApiResult<Json<Value>> {
    let openid = required(req.openid, "openid")?;
    let user = update_profile(&state.db, &openid, req.update)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(json!({ "success": true, "user": user })))
}

#[derive(Debug, Deserialize)]
pub struct SeasonRequest {
    #[serde(default)]
    pub openid: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
}

pub async fn update_season(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SeasonRequest>,
) -> ApiResult<Json<Value>> {
    let openid = required(req.openid, "openid")?;
    let season = required(req.season, "season")?;
    let user = set_season(&state.db, &openid, &season)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(json!({ "success": true, "user": user })))
}

#[derive(Debug, Deserialize)]
pub struct AllianceRequest {
    #[serde(default)]
    pub openid: Option<String>,
    #[serde(default)]
    pub alliance_name: Option<String>,
}

pub async fn update_alliance(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AllianceRequest>,
) -> ApiResult<Json<Value>> {
    let openid = required(req.openid, "openid")?;
    let name = required(req.alliance_name, "alliance_name")?;
    if name.chars().count() > ALLIANCE_NAME_MAX {
        return Err(ApiError::bad_request(format!(
            "同盟名不能超过 {} 个字",
            ALLIANCE_NAME_MAX
        )));
    }
    let user = set_alliance_name(&state.db, &openid, &name)
        .await?
        .ok_or_else(user_not_found)?;
    Ok(Json(json!({ "success": true, "user": user })))
}
