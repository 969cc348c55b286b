//! 小程序端的输入框常把数字以字符串形式提交，这里统一兼容两种写法

use serde::{Deserialize, Deserializer, de::Error};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Int(i64),
    Float(f64),
    Str(String),
}

impl NumOrStr {
    fn into_i64(self) -> Option<i64> {
        match self {
            NumOrStr::Int(v) => Some(v),
            NumOrStr::Float(v) if v.is_finite() => Some(v.trunc() as i64),
            NumOrStr::Float(_) => None,
            NumOrStr::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            }
        }
    }
}

pub fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    NumOrStr::deserialize(deserializer)?
        .into_i64()
        .ok_or_else(|| D::Error::custom("需要数字"))
}

pub fn flexible_i32<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let v = flexible_i64(deserializer)?;
    i32::try_from(v).map_err(|_| D::Error::custom("数字超出范围"))
}

/// 缺失、null 或空字符串都视为 None
pub fn flexible_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumOrStr>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrStr::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(v) => v
            .into_i64()
            .map(Some)
            .ok_or_else(|| D::Error::custom("需要数字")),
    }
}
