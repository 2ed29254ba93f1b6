use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

/// 报价单主表 (offers)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OfferHeader {
    pub id: i64,
    pub job_id: i64,
    pub company_id: i64,
    pub days_of_use: i64,
    pub discount_percent: BigDecimal,
    pub vat_percent: BigDecimal,
}

impl OfferHeader {
    /// 租期天数下限为 1 (租期曲线入参约定)
    pub fn effective_days_of_use(&self) -> i64 {
        self.days_of_use.max(1)
    }
}

/// 计费模式: 按天 / 按小时
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingMode {
    Daily,
    Hourly,
}

impl BillingMode {
    /// 解析后端存储的文本值, 未知值一律按 daily 处理
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some(s) if s.trim().eq_ignore_ascii_case("hourly") => BillingMode::Hourly,
            _ => BillingMode::Daily,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingMode::Daily => "daily",
            BillingMode::Hourly => "hourly",
        }
    }
}

/// 设备明细行 (offer_equipment_lines) - 原始数据库行
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentLineRow {
    pub id: i64,
    pub item_id: Option<i64>,
    pub group_id: Option<i64>,
    pub quantity: Option<i64>,
    pub unit_price: Option<BigDecimal>,
}

/// 设备明细行 - 边界校验后的领域对象
/// item_id / group_id 恰好设置其一
#[derive(Debug, Clone, Serialize)]
pub struct EquipmentLine {
    pub id: i64,
    pub item_id: Option<i64>,
    pub group_id: Option<i64>,
    pub quantity: i64,
    pub unit_price: BigDecimal,
}

impl EquipmentLine {
    /// 既无 item 也无 group 引用的行无法定价和比对, 返回 None 丢弃
    pub fn from_row(row: EquipmentLineRow) -> Option<Self> {
        if row.item_id.is_none() && row.group_id.is_none() {
            return None;
        }
        let unit_price = row.unit_price.unwrap_or_else(BigDecimal::zero);
        Some(Self {
            id: row.id,
            item_id: row.item_id,
            group_id: row.group_id,
            quantity: row.quantity.unwrap_or(1).max(1),
            unit_price: if unit_price < BigDecimal::zero() {
                BigDecimal::zero()
            } else {
                unit_price
            },
        })
    }
}

/// 人员明细行 (offer_crew_lines) - 原始数据库行
#[derive(Debug, Clone, FromRow)]
pub struct CrewLineRow {
    pub id: i64,
    pub role_title: Option<String>,
    pub crew_count: Option<i64>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub billing_mode: Option<String>,
    pub daily_rate: Option<BigDecimal>,
    pub hourly_rate: Option<BigDecimal>,
    pub hours_per_day: Option<BigDecimal>,
}

/// 人员明细行 - 边界校验后的领域对象
/// 不变式: billing_mode = hourly 时 daily_rate = hourly_rate × hours_per_day,
/// 由 crew_rate::normalize 维护, daily_rate 是唯一入账口径
#[derive(Debug, Clone, Serialize)]
pub struct CrewLine {
    pub id: i64,
    pub role_title: String,
    pub crew_count: i64,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub billing_mode: BillingMode,
    pub daily_rate: BigDecimal,
    pub hourly_rate: Option<BigDecimal>,
    pub hours_per_day: Option<BigDecimal>,
}

impl CrewLine {
    pub fn from_row(row: CrewLineRow) -> Self {
        Self {
            id: row.id,
            role_title: row.role_title.unwrap_or_default(),
            crew_count: row.crew_count.unwrap_or(1).max(1),
            start_at: row.start_at,
            end_at: row.end_at,
            billing_mode: BillingMode::parse(row.billing_mode.as_deref()),
            daily_rate: row.daily_rate.unwrap_or_else(BigDecimal::zero),
            hourly_rate: row.hourly_rate,
            hours_per_day: row.hours_per_day,
        }
    }
}

/// 运输明细行 (offer_transport_lines) - 原始数据库行
#[derive(Debug, Clone, FromRow)]
pub struct TransportLineRow {
    pub id: i64,
    pub vehicle_id: Option<i64>,
    pub distance_km: Option<BigDecimal>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub daily_rate: Option<BigDecimal>,
    pub distance_rate: Option<BigDecimal>,
}

/// 运输明细行 - 边界校验后的领域对象
/// 费率缺省时回落到公司级默认值 (见 pricing::transport_line_total)
#[derive(Debug, Clone, Serialize)]
pub struct TransportLine {
    pub id: i64,
    pub vehicle_id: Option<i64>,
    pub distance_km: Option<BigDecimal>,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub daily_rate: Option<BigDecimal>,
    pub distance_rate: Option<BigDecimal>,
}

impl TransportLine {
    pub fn from_row(row: TransportLineRow) -> Self {
        Self {
            id: row.id,
            vehicle_id: row.vehicle_id,
            distance_km: row.distance_km.filter(|km| *km >= BigDecimal::zero()),
            start_at: row.start_at,
            end_at: row.end_at,
            daily_rate: row.daily_rate,
            distance_rate: row.distance_rate,
        }
    }
}

/// 设备组成员 (equipment_group_members) - 原始数据库行
#[derive(Debug, Clone, FromRow)]
pub struct GroupMemberRow {
    pub item_id: Option<i64>,
    pub quantity: Option<i64>,
}

/// 设备组成员 - 边界校验后的领域对象
#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub item_id: i64,
    pub quantity: i64,
}

impl GroupMember {
    pub fn from_row(row: GroupMemberRow) -> Option<Self> {
        Some(Self {
            item_id: row.item_id?,
            quantity: row.quantity.unwrap_or(1).max(1),
        })
    }
}

/// 报价单合计 - 全部为派生字段, 只在边界处保留两位小数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferTotals {
    pub equipment_subtotal: BigDecimal,
    pub crew_subtotal: BigDecimal,
    pub transport_subtotal: BigDecimal,
    pub total_before_discount: BigDecimal,
    pub discount_amount: BigDecimal,
    pub total_after_discount: BigDecimal,
    pub total_with_vat: BigDecimal,
    /// 存在里程数但解析不到里程费率时置位 (里程项按 0 计入, 不静默)
    pub distance_rate_missing: bool,
}

/// 报价单声明的完整构成: 三类资源明细 + 组成员展开表
#[derive(Debug, Clone)]
pub struct OfferComposition {
    pub offer: OfferHeader,
    pub equipment: Vec<EquipmentLine>,
    pub crew: Vec<CrewLine>,
    pub transport: Vec<TransportLine>,
    pub group_members: HashMap<i64, Vec<GroupMember>>,
}
