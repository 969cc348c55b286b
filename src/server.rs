//! HTTP 路由与共享状态

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderMap, header};
use axum::routing::{get, post};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::report::ReportRenderer;
use crate::resource::relocate::Scorer;
use crate::store::FileStore;
use crate::{alliance, battle, media, profile, resource};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
    pub store: FileStore,
    pub renderer: Arc<ReportRenderer>,
    pub scorer: Arc<dyn Scorer>,
}

/// 对外地址：优先使用配置的 public_base_url，否则取请求的 Host 头
pub fn base_url(config: &AppConfig, headers: &HeaderMap) -> String {
    let configured = config.server.public_base_url.trim().trim_end_matches('/');
    if !configured.is_empty() {
        return configured.to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or(config.server.bind.as_str());
    format!("http://{}", host)
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_upload_mb * 1024 * 1024;

    Router::new()
        // 用户
        .route("/api/login", post(profile::login))
        .route("/api/user/update", post(profile::update_user))
        .route("/api/user/season", post(profile::update_season))
        .route("/api/user/alliance", post(profile::update_alliance))
        // 同盟统计
        .route("/api/alliance/upload", post(alliance::upload))
        .route("/api/alliance/uploads", get(alliance::uploads))
        .route("/api/alliance/delete", post(alliance::delete))
        .route("/api/alliance/detail/{id}", get(alliance::detail))
        .route("/api/alliance/compare", post(alliance::compare))
        .route("/api/alliance/images/{filename}", get(alliance::image))
        .route("/api/alliance/member/history", get(alliance::member_history))
        // 战功
        .route("/api/battle/submit", post(battle::submit))
        // 图片
        .route("/api/upload", post(media::upload))
        .route("/static/uploads/{filename}", get(media::serve_upload))
        // 资源点
        .route("/api/resource/seasons", get(resource::seasons))
        .route("/api/resource/nearest", post(resource::nearest))
        .route("/api/resource/relocate", post(resource::relocate))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn base_url_prefers_config() {
        let mut config = AppConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("example.com:5000"));

        assert_eq!(base_url(&config, &headers), "http://example.com:5000");

        config.server.public_base_url = "https://api.example.com/".to_string();
        assert_eq!(base_url(&config, &headers), "https://api.example.com");
    }

    #[test]
    fn base_url_without_host_uses_bind() {
        let config = AppConfig::default();
        assert_eq!(base_url(&config, &HeaderMap::new()), "http://0.0.0.0:5000");
    }
}
