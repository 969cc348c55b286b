//! 两次统计之间的成员差值

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashMap;

use super::entity::upload_record;
use super::parser::{MemberRow, UNGROUPED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    BattleAchievement,
    Power,
    Contribution,
    Assist,
    Donation,
}

impl Metric {
    /// 未知指标返回 None，差值按 0 计算
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "battle" | "battle_achievement" => Some(Metric::BattleAchievement),
            "power" => Some(Metric::Power),
            "contribution" => Some(Metric::Contribution),
            "assist" => Some(Metric::Assist),
            "donation" => Some(Metric::Donation),
            _ => None,
        }
    }

    /// 配置中阈值使用的键
    pub fn key(self) -> &'static str {
        match self {
            Metric::BattleAchievement => "battle",
            Metric::Power => "power",
            Metric::Contribution => "contribution",
            Metric::Assist => "assist",
            Metric::Donation => "donation",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::BattleAchievement => "战功",
            Metric::Power => "势力值",
            Metric::Contribution => "贡献",
            Metric::Assist => "助攻",
            Metric::Donation => "捐献",
        }
    }

    pub fn value(self, row: &MemberRow) -> i64 {
        match self {
            Metric::BattleAchievement => row.battle_achievement,
            Metric::Power => row.power,
            Metric::Contribution => row.contribution,
            Metric::Assist => row.assist,
            Metric::Donation => row.donation,
        }
    }
}

fn metric_value(metric: Option<Metric>, row: &MemberRow) -> i64 {
    metric.map_or(0, |m| m.value(row))
}

/// 成员分组，"未分组" 是显式状态而不是普通组名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Group {
    Assigned(String),
    Unassigned,
}

impl Group {
    pub fn from_name(name: &str) -> Self {
        let name = name.trim();
        if name.is_empty() || name == UNGROUPED {
            Group::Unassigned
        } else {
            Group::Assigned(name.to_string())
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Group::Assigned(name) => name,
            Group::Unassigned => UNGROUPED,
        }
    }

    pub fn is_assigned(&self) -> bool {
        matches!(self, Group::Assigned(_))
    }
}

// 排序按显示名的字典序，"未分组" 与普通组名一起比较
impl Ord for Group {
    fn cmp(&self, other: &Self) -> Ordering {
        self.label().cmp(other.label())
    }
}

impl PartialOrd for Group {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRow {
    pub name: String,
    pub group: Group,
    pub diff: i64,
    pub early_val: i64,
    pub late_val: i64,
}

/// 按时间先后排列两条记录，返回 (较早, 较晚)
///
/// 两条都有统计时间时按统计时间，否则按上传时间；相同时保持参数顺序。
pub fn order_snapshots<'a>(
    a: &'a upload_record::Model,
    b: &'a upload_record::Model,
) -> (&'a upload_record::Model, &'a upload_record::Model) {
    let (ta, tb) = match (a.stats_time, b.stats_time) {
        (Some(x), Some(y)) => (x, y),
        _ => (a.upload_time, b.upload_time),
    };
    if ta > tb { (b, a) } else { (a, b) }
}

/// 计算较晚记录相对较早记录的差值
///
/// 只在较晚记录中出现的成员不输出。结果按 (分组 升序, 差值 降序) 排列。
pub fn diff(earlier: &[MemberRow], later: &[MemberRow], metric: Option<Metric>) -> Vec<DiffRow> {
    // 同名成员以最后一行为准
    let lookup: HashMap<&str, (i64, Group)> = earlier
        .iter()
        .map(|r| {
            (
                r.name.as_str(),
                (metric_value(metric, r), Group::from_name(&r.group_name)),
            )
        })
        .collect();

    let mut rows: Vec<DiffRow> = later
        .iter()
        .filter_map(|r| {
            let (early_val, early_group) = lookup.get(r.name.as_str())?;
            let late_val = metric_value(metric, r);
            let group = match Group::from_name(&r.group_name) {
                Group::Unassigned => early_group.clone(),
                assigned => assigned,
            };
            Some(DiffRow {
                name: r.name.clone(),
                group,
                diff: late_val - early_val,
                early_val: *early_val,
                late_val,
            })
        })
        .collect();

    rows.sort_by(|a, b| a.group.cmp(&b.group).then(b.diff.cmp(&a.diff)));
    rows
}
