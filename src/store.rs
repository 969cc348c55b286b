//! 本地文件存储：上传的原始文件与生成的对比图

use axum::body::Body;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::config::PathsConfig;
use crate::error::{ApiError, ApiResult};

/// 存储分区
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// 头像等通用图片，对外以 /static/uploads 提供
    Media,
    /// 战功截图
    Battle,
    /// 同盟统计 CSV 原件
    Roster,
    /// 对比图
    Generated,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    upload_dir: PathBuf,
    generated_dir: PathBuf,
}

impl FileStore {
    pub fn new(paths: &PathsConfig) -> Self {
        Self {
            upload_dir: paths.upload_dir(),
            generated_dir: paths.generated_dir(),
        }
    }

    pub fn dir(&self, bucket: Bucket) -> PathBuf {
        match bucket {
            Bucket::Media => self.upload_dir.clone(),
            Bucket::Battle => self.upload_dir.join("battle"),
            Bucket::Roster => self.upload_dir.join("alliance"),
            Bucket::Generated => self.generated_dir.clone(),
        }
    }

    pub async fn ensure_dirs(&self) -> io::Result<()> {
        for bucket in [Bucket::Media, Bucket::Battle, Bucket::Roster, Bucket::Generated] {
            fs::create_dir_all(self.dir(bucket)).await?;
        }
        Ok(())
    }

    /// 文件名不合法时返回 None
    pub fn resolve(&self, bucket: Bucket, name: &str) -> Option<PathBuf> {
        sanitize_filename(name).map(|n| self.dir(bucket).join(n))
    }

    pub async fn save(&self, bucket: Bucket, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.resolve(bucket, name).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("非法文件名: {}", name))
        })?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// 以文件内容作为 HTTP 响应，不存在时 404
    pub async fn serve(&self, bucket: Bucket, name: &str) -> ApiResult<Response> {
        let path = self
            .resolve(bucket, name)
            .ok_or_else(|| ApiError::not_found("文件不存在"))?;
        let bytes = match fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ApiError::not_found("文件不存在"));
            }
            Err(e) => return Err(e.into()),
        };

        let mut resp = Body::from(bytes).into_response();
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type(&path)),
        );
        Ok(resp)
    }
}

/// 只允许单层文件名，拒绝路径分隔符与 `..`
pub fn sanitize_filename(name: &str) -> Option<&str> {
    let name = name.trim();
    if name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.contains("..")
    {
        return None;
    }
    Some(name)
}

/// 去掉路径部分，只保留原始文件名
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

pub fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn content_type(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("csv") => "text/csv; charset=utf-8",
        _ => "application/octet-stream",
    }
}
