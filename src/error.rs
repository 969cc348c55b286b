use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use sea_orm::DbErr;
use serde_json::{Value, json};
use std::fmt;

pub type ApiResult<T> = Result<T, ApiError>;

/// HTTP 层统一错误，序列化为 `{"success": false, "error": "..."}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// 409，附带额外字段（例如 is_duplicate）
    Conflict(String, Value),
    Database(DbErr),
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(..) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(m) | ApiError::NotFound(m) | ApiError::Conflict(m, _) => {
                write!(f, "{}", m)
            }
            // 不向调用方暴露数据库细节
            ApiError::Database(_) => write!(f, "数据库错误"),
            ApiError::Internal(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<DbErr> for ApiError {
    fn from(e: DbErr) -> Self {
        ApiError::Database(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::BadRequest(format!("表单解析失败: {}", e.body_text()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(format!("请求参数无效: {}", e.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(format!("查询参数无效: {}", e.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::BadRequest(format!("路径参数无效: {}", e.body_text()))
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Database(e) => crate::error!(target: "Http", "数据库错误: {}", e),
            ApiError::Internal(e) => crate::error!(target: "Http", "内部错误: {:#}", e),
            _ => {}
        }

        let mut body = json!({
            "success": false,
            "error": self.to_string(),
        });
        if let (ApiError::Conflict(_, Value::Object(extra)), Value::Object(map)) =
            (&self, &mut body)
        {
            for (k, v) in extra {
                map.insert(k.clone(), v.clone());
            }
        }

        (self.status(), Json(body)).into_response()
    }
}

// ===== 提取器 =====
//
// 与 axum 自带的 Json / Query / Path 相同，解析失败时返回 ApiError

/// JSON 请求体
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state).await?;
        Ok(ApiPath(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::header;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Point {
        x: i32,
        #[allow(dead_code)]
        y: i32,
    }

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn json_request(body: &'static str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_json_field_is_a_structured_bad_request() {
        let err = ApiJson::<Point>::from_request(json_request(r#"{"y": 1}"#), &())
            .await
            .err()
            .unwrap();
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("application/json"));

        let body = body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        let msg = body["error"].as_str().unwrap();
        assert!(msg.starts_with("请求参数无效"));
        assert!(msg.contains('x'));
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let err = ApiJson::<Point>::from_request(json_request("{not json"), &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let req = json_request(r#"{"x": 3, "y": 4}"#);
        let ApiJson(point) = ApiJson::<Point>::from_request(req, &()).await.unwrap();
        assert_eq!(point.x, 3);
    }

    #[tokio::test]
    async fn missing_query_field_is_a_bad_request() {
        let (mut parts, _) = axum::http::Request::builder()
            .uri("/history?other=1")
            .body(())
            .unwrap()
            .into_parts();
        let err = ApiQuery::<Named>::from_request_parts(&mut parts, &())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(err.into_response()).await["success"], json!(false));

        let (mut parts, _) = axum::http::Request::builder()
            .uri("/history?name=%E7%94%B2")
            .body(())
            .unwrap()
            .into_parts();
        let ApiQuery(named) = ApiQuery::<Named>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(named.name, "甲");
    }

    #[test]
    fn database_errors_are_reported_generically() {
        let err = ApiError::from(DbErr::Custom("disk I/O error".to_string()));
        assert_eq!(err.to_string(), "数据库错误");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::Conflict("dup".into(), json!({"is_duplicate": true})).status(),
            StatusCode::CONFLICT
        );
    }
}
