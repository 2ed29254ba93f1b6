use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 设备预定来源: 直接预定 / 由设备组展开
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Direct,
    Group,
}

impl SourceKind {
    /// 解析后端存储的文本值, 未知值按 direct 处理
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("group") => SourceKind::Group,
            _ => SourceKind::Direct,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Direct => "direct",
            SourceKind::Group => "group",
        }
    }
}

/// 设备预定 (equipment_reservations) - 原始数据库行
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentReservationRow {
    pub item_id: Option<i64>,
    pub quantity: Option<i64>,
    pub source_kind: Option<String>,
    pub source_group_id: Option<i64>,
}

/// 设备预定 - 边界校验后的领域对象 (同时用作整体替换写入的行)
#[derive(Debug, Clone, Serialize)]
pub struct EquipmentReservation {
    pub item_id: i64,
    pub quantity: i64,
    pub source_kind: SourceKind,
    pub source_group_id: Option<i64>,
}

impl EquipmentReservation {
    /// 缺少 item_id 的预定行无法比对, 返回 None 丢弃
    pub fn from_row(row: EquipmentReservationRow) -> Option<Self> {
        let source_kind = SourceKind::parse(row.source_kind.as_deref());
        Some(Self {
            item_id: row.item_id?,
            quantity: row.quantity.unwrap_or(1),
            source_kind,
            // direct 行不携带组引用
            source_group_id: match source_kind {
                SourceKind::Group => row.source_group_id,
                SourceKind::Direct => None,
            },
        })
    }
}

/// 人员档期 (crew_periods) - 原始数据库行
#[derive(Debug, Clone, FromRow)]
pub struct CrewPeriodRow {
    pub title: Option<String>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub needed_count: Option<i64>,
}

/// 人员档期 - 边界校验后的领域对象 (同时用作整体替换写入的行)
#[derive(Debug, Clone, Serialize)]
pub struct CrewPeriod {
    pub title: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub needed_count: i64,
}

impl CrewPeriod {
    /// 缺少起止时间的档期无法构成比对 key, 返回 None 丢弃
    pub fn from_row(row: CrewPeriodRow) -> Option<Self> {
        Some(Self {
            title: row.title.unwrap_or_default(),
            start_at: row.start_at?,
            end_at: row.end_at?,
            needed_count: row.needed_count.unwrap_or(1),
        })
    }
}

/// 车辆预定 (vehicle_reservations) - 原始数据库行
#[derive(Debug, Clone, FromRow)]
pub struct VehicleReservationRow {
    pub vehicle_id: Option<i64>,
}

/// 某个 job 当前实际预定的只读快照, 按需重新拉取, 不做缓存
#[derive(Debug, Clone, Default)]
pub struct BookingSnapshot {
    pub equipment: Vec<EquipmentReservation>,
    pub crew: Vec<CrewPeriod>,
    pub vehicles: Vec<i64>,
}
