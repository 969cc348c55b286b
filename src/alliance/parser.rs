//! 同盟统计表解析
//!
//! 游戏导出的 CSV 编码不固定（常见 UTF-8 BOM 与 GB18030），列名也随版本变化，
//! 这里统一转成 [`MemberRow`]。

use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::GB18030;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::{debug, warn};

/// 分组列为空时的占位
pub const UNGROUPED: &str = "未分组";

// ===== 编码探测 =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8Sig,
    Gb18030,
    Utf8,
}

/// 依次尝试的编码
pub const DETECT_ORDER: [TextEncoding; 3] =
    [TextEncoding::Utf8Sig, TextEncoding::Gb18030, TextEncoding::Utf8];

impl TextEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Gb18030 => "gb18030",
            TextEncoding::Utf8 => "utf-8",
        }
    }

    /// 严格解码，遇到非法字节返回 None
    fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8Sig => {
                let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(str::to_string)
            }
            TextEncoding::Gb18030 => GB18030
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|s| s.into_owned()),
            TextEncoding::Utf8 => std::str::from_utf8(bytes).ok().map(str::to_string),
        }
    }
}

#[derive(Debug)]
pub struct DecodeError;

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "无法识别文件编码")
    }
}

impl std::error::Error for DecodeError {}

fn first_line(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == b'\n') {
        Some(i) => &bytes[..=i],
        None => bytes,
    }
}

/// 用首行探测编码，再整体解码
///
/// 首行能解码但全文失败时继续尝试下一个编码。
pub fn decode(bytes: &[u8]) -> Result<(String, &'static str), DecodeError> {
    let head = first_line(bytes);
    for enc in DETECT_ORDER {
        if enc.decode(head).is_none() {
            continue;
        }
        match enc.decode(bytes) {
            Some(text) => return Ok((text, enc.name())),
            None => debug!(target: "Alliance", "{} 首行可解码但全文失败", enc.name()),
        }
    }
    Err(DecodeError)
}

// ===== 列名映射 =====

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Rank,
    Group,
    Contribution,
    Power,
    BattleAchievement,
    Assist,
    Donation,
}

/// 每个字段可接受的表头，靠前的优先
pub static FIELD_ALIASES: &[(Field, &[&str])] = &[
    (Field::Name, &["成员", "名字", "Name"]),
    (Field::Rank, &["排名", "Rank", "贡献排行"]),
    (Field::Group, &["分组", "Group"]),
    (Field::Contribution, &["贡献", "Contribution", "贡献总量"]),
    (Field::Power, &["势力值", "势力", "Power"]),
    (Field::BattleAchievement, &["战功", "Battle", "战功总量"]),
    (Field::Assist, &["助攻", "Assist", "助攻总量"]),
    (Field::Donation, &["捐献", "Donation", "捐献总量"]),
];

/// 表头解析结果：字段 -> 列下标
#[derive(Debug, Default, Clone, Copy)]
struct Columns {
    name: Option<usize>,
    rank: Option<usize>,
    group: Option<usize>,
    contribution: Option<usize>,
    power: Option<usize>,
    battle_achievement: Option<usize>,
    assist: Option<usize>,
    donation: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Self {
        let headers: Vec<&str> = headers.iter().collect();
        let mut cols = Columns::default();
        for (field, aliases) in FIELD_ALIASES {
            // 同名表头取最后一列
            let idx = aliases
                .iter()
                .find_map(|a| headers.iter().rposition(|h| h == a));
            let slot = match field {
                Field::Name => &mut cols.name,
                Field::Rank => &mut cols.rank,
                Field::Group => &mut cols.group,
                Field::Contribution => &mut cols.contribution,
                Field::Power => &mut cols.power,
                Field::BattleAchievement => &mut cols.battle_achievement,
                Field::Assist => &mut cols.assist,
                Field::Donation => &mut cols.donation,
            };
            *slot = idx;
        }
        cols
    }
}

// ===== 行解析 =====

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRow {
    pub rank: i64,
    pub name: String,
    pub group_name: String,
    pub contribution: i64,
    pub power: i64,
    pub battle_achievement: i64,
    pub assist: i64,
    pub donation: i64,
}

/// "1,234" / "56.7" / "" 之类的单元格转为非负整数，失败记 0
pub fn parse_number(raw: &str) -> i64 {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return 0;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.trunc() as i64,
        _ => 0,
    }
}

#[derive(Debug, Default)]
pub struct ParsedRoster {
    pub rows: Vec<MemberRow>,
    /// 没有成员名或无法解析的行
    pub skipped: usize,
}

pub fn parse_roster(text: &str) -> ParsedRoster {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut parsed = ParsedRoster::default();

    let headers = match reader.headers() {
        Ok(h) => h.clone(),
        Err(e) => {
            warn!(target: "Alliance", "表头解析失败: {}", e);
            return parsed;
        }
    };
    let cols = Columns::resolve(&headers);
    debug!(target: "Alliance", "表头: {:?}", headers.iter().collect::<Vec<_>>());

    let Some(name_idx) = cols.name else {
        warn!(target: "Alliance", "找不到成员列");
        return parsed;
    };

    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "Alliance", "第 {} 行解析失败: {}", line + 2, e);
                parsed.skipped += 1;
                continue;
            }
        };

        let name = record.get(name_idx).unwrap_or("");
        if name.is_empty() {
            parsed.skipped += 1;
            continue;
        }

        let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");
        let group = cell(cols.group);

        parsed.rows.push(MemberRow {
            rank: parse_number(cell(cols.rank)),
            name: name.to_string(),
            group_name: if group.is_empty() {
                UNGROUPED.to_string()
            } else {
                group.to_string()
            },
            contribution: parse_number(cell(cols.contribution)),
            power: parse_number(cell(cols.power)),
            battle_achievement: parse_number(cell(cols.battle_achievement)),
            assist: parse_number(cell(cols.assist)),
            donation: parse_number(cell(cols.donation)),
        });
    }

    parsed
}

// ===== 文件名中的统计时间 =====

static STATS_TIME_REGEX: OnceLock<Regex> = OnceLock::new();

fn stats_time_regex() -> &'static Regex {
    STATS_TIME_REGEX.get_or_init(|| {
        Regex::new(r"(\d{4})年(\d{1,2})月(\d{1,2})日(\d{1,2})时(\d{1,2})分(\d{1,2})秒")
            .expect("Invalid Regex")
    })
}

/// 例如 `同盟统计2025年01月25日13时30分12秒.csv`，日期不合法时返回 None
pub fn parse_stats_time(filename: &str) -> Option<NaiveDateTime> {
    let caps = stats_time_regex().captures(filename)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?.and_hms_opt(num(4)?, num(5)?, num(6)?)
}

/// 去重键：有统计时间按时间，否则按文件名
pub fn dedup_key(filename: &str, stats_time: Option<NaiveDateTime>) -> String {
    match stats_time {
        Some(t) => format!("stats:{}", t.format("%Y-%m-%d %H:%M:%S")),
        None => format!("file:{}", filename),
    }
}
