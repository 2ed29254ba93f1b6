use crate::models::{BillingMode, CompanyPricingConfig, CrewLine};
use bigdecimal::{BigDecimal, FromPrimitive, Zero};
use chrono::{DateTime, Utc};

/// 日期区间退化 (零长/倒置/缺失) 且行上无存量值时的兜底工时
pub const DEFAULT_HOURS_PER_DAY: i64 = 8;

/// 区间内平均每个日历天的小时数: 总小时 / ceil(总时长/24h)
/// 区间退化时返回 None
fn average_hours_per_day(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Option<f64> {
    let (start, end) = (start?, end?);
    let secs = (end - start).num_seconds();
    if secs <= 0 {
        return None;
    }
    let days = (secs + 86_399) / 86_400;
    Some(secs as f64 / 3600.0 / days as f64)
}

/// 维护人员行的 daily/hourly 不变式, 每次行变更后调用
/// - hourly: hours_per_day 从日期区间重算, hourly_rate 缺省回落公司默认,
///   daily_rate 永远重算为 hourly_rate × hours_per_day (唯一入账口径)
/// - daily: 清空小时相关字段, 日费率夹取到 ≥ 0
/// - 切换模式时现场反推对侧表示
pub fn normalize(mut line: CrewLine, config: &CompanyPricingConfig) -> CrewLine {
    match line.billing_mode {
        BillingMode::Daily => {
            line.hourly_rate = None;
            line.hours_per_day = None;
            if line.daily_rate < BigDecimal::zero() {
                line.daily_rate = BigDecimal::zero();
            }
        }
        BillingMode::Hourly => {
            let hours = average_hours_per_day(line.start_at, line.end_at)
                .and_then(BigDecimal::from_f64)
                .or_else(|| {
                    line.hours_per_day
                        .clone()
                        .filter(|h| *h > BigDecimal::zero())
                })
                .unwrap_or_else(|| BigDecimal::from(DEFAULT_HOURS_PER_DAY))
                .round(2);

            let hourly = line
                .hourly_rate
                .clone()
                .filter(|r| *r > BigDecimal::zero())
                .or_else(|| {
                    // daily → hourly 切换: 已有正的日费率时现场反推
                    if line.daily_rate > BigDecimal::zero() {
                        Some(&line.daily_rate / &hours)
                    } else {
                        None
                    }
                })
                .or_else(|| config.crew_rate_per_hour.clone())
                .unwrap_or_else(BigDecimal::zero)
                .round(2);

            line.daily_rate = (&hourly * &hours).round(2);
            line.hourly_rate = Some(hourly);
            line.hours_per_day = Some(hours);
        }
    }
    line
}
