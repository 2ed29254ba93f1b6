use crate::models::booking::SourceKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// 设备比对 key: (来源, 组ID, 物品ID)
/// 由组展开生成的报价行与由同一组生成的预定行共享同一 key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EquipmentKey {
    pub source_kind: SourceKind,
    pub source_group_id: Option<i64>,
    pub item_id: i64,
}

/// 人员比对 key: (去除首尾空白的职位名, 起, 止)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CrewKey {
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// 单个 key 上的数量差异
/// expected = 报价单声明量, current = 实际预定量
#[derive(Debug, Clone, Serialize)]
pub struct ChangeRecord<K> {
    pub key: K,
    pub expected: i64,
    pub current: i64,
}

impl<K> ChangeRecord<K> {
    /// 预定多于报价: 同步会删除或缩减既有预定
    pub fn is_removal(&self) -> bool {
        self.current > self.expected
    }

    /// 报价多于预定: 同步只会新增
    pub fn is_addition(&self) -> bool {
        self.expected > self.current
    }
}

/// 报价单与实际预定之间的结构化差异
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileDiff {
    pub equipment_changes: Vec<ChangeRecord<EquipmentKey>>,
    pub crew_changes: Vec<ChangeRecord<CrewKey>>,
    pub transport_changes: Vec<ChangeRecord<i64>>,
    /// 任一运输行缺少 vehicle_id 时无法确定性比对运输类,
    /// 此时视为中性 (不算漂移), transport_changes 为空
    pub transport_verifiable: bool,
}

impl ReconcileDiff {
    pub fn transport_matches(&self) -> bool {
        !self.transport_verifiable || self.transport_changes.is_empty()
    }

    /// 同步判定: 设备与人员零差异, 且运输类匹配或不可比
    pub fn is_synced(&self) -> bool {
        self.equipment_changes.is_empty()
            && self.crew_changes.is_empty()
            && self.transport_matches()
    }

    /// 是否存在删除项 (任何一处删除都要求显式确认)
    pub fn has_removals(&self) -> bool {
        self.equipment_changes.iter().any(ChangeRecord::is_removal)
            || self.crew_changes.iter().any(ChangeRecord::is_removal)
            || (self.transport_verifiable
                && self.transport_changes.iter().any(ChangeRecord::is_removal))
    }
}

/// 比对结果: 状态徽标 + 明细 diff
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub synced: bool,
    pub diff: ReconcileDiff,
}
