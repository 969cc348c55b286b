//! 通用图片上传（头像等）

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::HeaderMap;
use axum::response::Response;
use rand::Rng;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::info;
use crate::server::{AppState, base_url};
use crate::store::{self, Bucket};

pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// 32 位十六进制随机名
pub fn random_name(ext: &str) -> String {
    let mut rng = rand::rng();
    let hi: u64 = rng.random();
    let lo: u64 = rng.random();
    format!("{:016x}{:016x}.{}", hi, lo, ext)
}

pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            file = Some((name, bytes.to_vec()));
        }
    }

    let (name, bytes) = file.ok_or_else(|| ApiError::bad_request("缺少文件"))?;
    if name.is_empty() {
        return Err(ApiError::bad_request("未选择文件"));
    }
    let ext = store::extension(&name)
        .filter(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
        .ok_or_else(|| ApiError::bad_request("不支持的文件类型"))?;

    let filename = random_name(&ext);
    state.store.save(Bucket::Media, &filename, &bytes).await?;
    info!(target: "Media", "保存上传图片 {} ({} 字节)", filename, bytes.len());

    let path = format!("/static/uploads/{}", filename);
    Ok(Json(json!({
        "success": true,
        "url": format!("{}{}", base_url(&state.config, &headers), path),
        "path": path,
    })))
}

pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    state.store.serve(Bucket::Media, &filename).await
}
