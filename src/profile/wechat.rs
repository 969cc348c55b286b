//! 微信小程序登录凭证校验

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::config::WechatConfig;
use crate::debug;

const JSCODE2SESSION: &str = "https://api.weixin.qq.com/sns/jscode2session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub openid: String,
    pub session_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    openid: Option<String>,
    session_key: Option<String>,
    #[serde(default)]
    errcode: i64,
    errmsg: Option<String>,
}

#[derive(Debug)]
pub enum LoginError {
    /// 微信返回了错误码（例如 code 无效），由调用方的请求导致
    Rejected(String),
    /// 网络或响应格式问题
    Upstream(anyhow::Error),
}

/// 模拟环境下不请求微信，直接以 code 拼出 openid
pub fn mock_session(code: &str) -> Session {
    Session {
        openid: format!("MOCK_OPENID_{}", code),
        session_key: Some("mock_session_key".to_string()),
    }
}

pub async fn code_to_session(
    client: &reqwest::Client,
    config: &WechatConfig,
    code: &str,
) -> Result<Session, LoginError> {
    if config.is_mock() {
        debug!(target: "Wechat", "模拟登录 code={}", code);
        return Ok(mock_session(code));
    }

    let resp = request(client, config, code)
        .await
        .map_err(LoginError::Upstream)?;

    match resp.openid {
        Some(openid) if !openid.is_empty() => Ok(Session {
            openid,
            session_key: resp.session_key,
        }),
        _ => Err(LoginError::Rejected(resp.errmsg.unwrap_or_else(|| {
            format!("微信登录失败 (errcode {})", resp.errcode)
        }))),
    }
}

async fn request(
    client: &reqwest::Client,
    config: &WechatConfig,
    code: &str,
) -> Result<SessionResponse> {
    let resp = client
        .get(JSCODE2SESSION)
        .query(&[
            ("appid", config.app_id.as_str()),
            ("secret", config.app_secret.as_str()),
            ("js_code", code),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .context("请求 jscode2session 失败")?;

    if !resp.status().is_success() {
        bail!("jscode2session 返回 HTTP {}", resp.status());
    }

    // 微信接口的 Content-Type 是 text/plain，手动解析
    let text = resp.text().await?;
    serde_json::from_str(&text).with_context(|| format!("无法解析 jscode2session 响应: {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_app_id_uses_mock_openid() {
        let client = reqwest::Client::new();
        let session = code_to_session(&client, &WechatConfig::default(), "abc")
            .await
            .unwrap();
        assert_eq!(session.openid, "MOCK_OPENID_abc");
        assert_eq!(session.session_key.as_deref(), Some("mock_session_key"));
    }

    #[test]
    fn error_response_parses() {
        let resp: SessionResponse =
            serde_json::from_str(r#"{"errcode":40029,"errmsg":"invalid code"}"#).unwrap();
        assert!(resp.openid.is_none());
        assert_eq!(resp.errcode, 40029);
        assert_eq!(resp.errmsg.as_deref(), Some("invalid code"));
    }
}
