use crate::service::rental_curve::{self, RentalFactorTable};
use bigdecimal::BigDecimal;
use sqlx::FromRow;

/// 里程费率的默认计费增量 (公里)
pub const DEFAULT_DISTANCE_INCREMENT_KM: i64 = 150;

/// 公司级定价配置 (companies) - 原始数据库行
/// rental_factor_table 是 JSON 文本列, 解析失败按缺省处理
#[derive(Debug, Clone, FromRow)]
pub struct CompanyPricingRow {
    pub rental_factor_table: Option<String>,
    pub vehicle_daily_rate: Option<BigDecimal>,
    pub vehicle_distance_rate: Option<BigDecimal>,
    pub vehicle_distance_increment: Option<i64>,
    pub partner_discount_percent: Option<BigDecimal>,
    pub customer_discount_percent: Option<BigDecimal>,
    pub crew_rate_per_day: Option<BigDecimal>,
    pub crew_rate_per_hour: Option<BigDecimal>,
}

/// 公司级定价配置 - 边界校验后的领域对象
#[derive(Debug, Clone)]
pub struct CompanyPricingConfig {
    /// 租期折扣表覆盖, None 时使用内置默认表
    pub rental_table: Option<RentalFactorTable>,
    pub vehicle_daily_rate: Option<BigDecimal>,
    pub vehicle_distance_rate: Option<BigDecimal>,
    pub vehicle_distance_increment: i64,
    /// 新建报价单的折扣百分比预填值 (合作方 / 普通客户), 不参与引擎计算
    pub partner_discount_percent: Option<BigDecimal>,
    pub customer_discount_percent: Option<BigDecimal>,
    pub crew_rate_per_day: Option<BigDecimal>,
    pub crew_rate_per_hour: Option<BigDecimal>,
}

impl Default for CompanyPricingConfig {
    fn default() -> Self {
        Self {
            rental_table: None,
            vehicle_daily_rate: None,
            vehicle_distance_rate: None,
            vehicle_distance_increment: DEFAULT_DISTANCE_INCREMENT_KM,
            partner_discount_percent: None,
            customer_discount_percent: None,
            crew_rate_per_day: None,
            crew_rate_per_hour: None,
        }
    }
}

impl CompanyPricingConfig {
    pub fn from_row(row: CompanyPricingRow) -> Self {
        Self {
            rental_table: row
                .rental_factor_table
                .as_deref()
                .and_then(rental_curve::parse_rental_table),
            vehicle_daily_rate: row.vehicle_daily_rate,
            vehicle_distance_rate: row.vehicle_distance_rate,
            vehicle_distance_increment: row
                .vehicle_distance_increment
                .filter(|inc| *inc > 0)
                .unwrap_or(DEFAULT_DISTANCE_INCREMENT_KM),
            partner_discount_percent: row.partner_discount_percent,
            customer_discount_percent: row.customer_discount_percent,
            crew_rate_per_day: row.crew_rate_per_day,
            crew_rate_per_hour: row.crew_rate_per_hour,
        }
    }
}
