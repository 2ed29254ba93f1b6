use crate::db::queries;
use crate::models::{
    CompanyPricingConfig, CrewLine, EquipmentLine, OfferTotals, TransportLine,
};
use crate::service::{crew_rate, rental_curve};
use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive, Zero};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// 日期区间折算的计费天数: max(1, ceil(时长/24h)), 缺失日期按 1 天
pub fn billable_days(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> i64 {
    let (Some(start), Some(end)) = (start, end) else {
        return 1;
    };
    let secs = (end - start).num_seconds();
    if secs <= 0 {
        1
    } else {
        (secs + 86_399) / 86_400
    }
}

/// 设备行小计: 单价 × 数量 × 租期乘数
pub fn equipment_line_total(line: &EquipmentLine, factor: f64) -> BigDecimal {
    let factor = BigDecimal::from_f64(factor).unwrap_or_else(|| BigDecimal::from(1));
    &line.unit_price * BigDecimal::from(line.quantity) * factor
}

/// 人员行小计: 日费率 × 人数 × 该行自身日期区间的天数
/// 人员计费与报价单的 days_of_use 无关
pub fn crew_line_total(line: &CrewLine) -> BigDecimal {
    &line.daily_rate
        * BigDecimal::from(line.crew_count)
        * BigDecimal::from(billable_days(line.start_at, line.end_at))
}

/// 运输行小计: 日费率项 + 里程项, 费率回落顺序 行 → 公司默认 → 缺省
/// 返回 (小计, 里程费率缺失标记) - 有里程但无费率时里程项记 0 且置位, 不静默
pub fn transport_line_total(
    line: &TransportLine,
    config: &CompanyPricingConfig,
) -> (BigDecimal, bool) {
    let mut total = match line.daily_rate.as_ref().or(config.vehicle_daily_rate.as_ref()) {
        Some(rate) => rate * BigDecimal::from(billable_days(line.start_at, line.end_at)),
        None => BigDecimal::zero(),
    };

    let mut distance_rate_missing = false;
    if let Some(km) = line
        .distance_km
        .as_ref()
        .filter(|km| **km > BigDecimal::zero())
    {
        match line
            .distance_rate
            .as_ref()
            .or(config.vehicle_distance_rate.as_ref())
        {
            Some(rate) => {
                let increments = (km.to_f64().unwrap_or(0.0)
                    / config.vehicle_distance_increment as f64)
                    .ceil() as i64;
                total += rate * BigDecimal::from(increments);
            }
            None => distance_rate_missing = true,
        }
    }

    (total, distance_rate_missing)
}

/// 报价单合计计算, 无副作用
/// 折扣只作用于设备小计, VAT 作用于折后总额, 金额仅在出口处保留两位小数
pub fn compute_totals(
    equipment: &[EquipmentLine],
    crew: &[CrewLine],
    transport: &[TransportLine],
    days_of_use: i64,
    discount_percent: &BigDecimal,
    vat_percent: &BigDecimal,
    config: &CompanyPricingConfig,
) -> OfferTotals {
    let factor = rental_curve::factor(days_of_use.max(1), config.rental_table.as_ref());

    let equipment_subtotal = equipment
        .iter()
        .fold(BigDecimal::zero(), |acc, line| {
            acc + equipment_line_total(line, factor)
        });
    let crew_subtotal = crew
        .iter()
        .fold(BigDecimal::zero(), |acc, line| acc + crew_line_total(line));

    let mut distance_rate_missing = false;
    let transport_subtotal = transport.iter().fold(BigDecimal::zero(), |acc, line| {
        let (total, missing) = transport_line_total(line, config);
        distance_rate_missing |= missing;
        acc + total
    });

    let hundred = BigDecimal::from(100);
    let total_before_discount = &equipment_subtotal + &crew_subtotal + &transport_subtotal;
    let discount_amount = &equipment_subtotal * discount_percent / &hundred;
    let total_after_discount = &total_before_discount - &discount_amount;
    let total_with_vat = &total_after_discount * (&hundred + vat_percent) / &hundred;

    OfferTotals {
        equipment_subtotal: equipment_subtotal.round(2),
        crew_subtotal: crew_subtotal.round(2),
        transport_subtotal: transport_subtotal.round(2),
        total_before_discount: total_before_discount.round(2),
        discount_amount: discount_amount.round(2),
        total_after_discount: total_after_discount.round(2),
        total_with_vat: total_with_vat.round(2),
        distance_rate_missing,
    }
}

/// 报价单定价服务: 读取明细 → 规范人员费率 → 回写派生金额
pub struct PricingService {
    pool: PgPool,
}

impl PricingService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 重算并持久化一张报价单的全部派生金额
    /// 行级 total_price 与报价单合计都是可重算字段, 从不作为事实来源
    pub async fn recompute_offer(
        &self,
        offer_id: i64,
    ) -> Result<OfferTotals, Box<dyn std::error::Error>> {
        // 1. 报价单主表与公司级定价配置
        let offer = queries::get_offer(&self.pool, offer_id).await?;
        let Some(offer) = offer else {
            return Err(format!("Offer {} not found", offer_id).into());
        };
        let config = match queries::get_company_pricing(&self.pool, offer.company_id).await? {
            Some(row) => CompanyPricingConfig::from_row(row),
            None => CompanyPricingConfig::default(),
        };

        // 2. 三类明细, 边界校验后进入计算
        let equipment: Vec<EquipmentLine> = queries::list_equipment_lines(&self.pool, offer_id)
            .await?
            .into_iter()
            .filter_map(EquipmentLine::from_row)
            .collect();
        let transport: Vec<TransportLine> = queries::list_transport_lines(&self.pool, offer_id)
            .await?
            .into_iter()
            .map(TransportLine::from_row)
            .collect();

        // 3. 人员行先过规范器, 修正后的 canonical 费率立即回写
        let crew_rows = queries::list_crew_lines(&self.pool, offer_id).await?;
        let mut crew = Vec::with_capacity(crew_rows.len());
        for row in crew_rows {
            let line = crew_rate::normalize(CrewLine::from_row(row), &config);
            queries::update_crew_line_rates(&self.pool, &line).await?;
            crew.push(line);
        }

        // 4. 逐行回写派生 total_price
        let days_of_use = offer.effective_days_of_use();
        let factor = rental_curve::factor(days_of_use, config.rental_table.as_ref());
        for line in &equipment {
            let total = equipment_line_total(line, factor).round(2);
            queries::update_equipment_line_total(&self.pool, line.id, &total).await?;
        }
        for line in &crew {
            let total = crew_line_total(line).round(2);
            queries::update_crew_line_total(&self.pool, line.id, &total).await?;
        }
        for line in &transport {
            let (total, _) = transport_line_total(line, &config);
            queries::update_transport_line_total(&self.pool, line.id, &total.round(2)).await?;
        }

        // 5. 汇总回写报价单合计
        let totals = compute_totals(
            &equipment,
            &crew,
            &transport,
            days_of_use,
            &offer.discount_percent,
            &offer.vat_percent,
            &config,
        );
        queries::update_offer_totals(&self.pool, offer_id, &totals).await?;

        tracing::info!(
            "Offer {} totals recomputed: equipment={}, crew={}, transport={}, total_with_vat={}",
            offer_id,
            totals.equipment_subtotal,
            totals.crew_subtotal,
            totals.transport_subtotal,
            totals.total_with_vat
        );

        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BillingMode;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, day, hour, 0, 0).unwrap()
    }

    fn bd(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    fn equipment(quantity: i64, unit_price: &str) -> EquipmentLine {
        EquipmentLine {
            id: 1,
            item_id: Some(11),
            group_id: None,
            quantity,
            unit_price: bd(unit_price),
        }
    }

    fn crew(crew_count: i64, daily_rate: &str, days: i64) -> CrewLine {
        CrewLine {
            id: 2,
            role_title: "技师".to_string(),
            crew_count,
            start_at: Some(ts(1, 0)),
            end_at: Some(ts(1 + days as u32, 0)),
            billing_mode: BillingMode::Daily,
            daily_rate: bd(daily_rate),
            hourly_rate: None,
            hours_per_day: None,
        }
    }

    #[test]
    fn equipment_scenario_with_discount_and_vat() {
        // 默认表 days=10 → 3.2; 2×100×3.2=640, 折扣 64, 折后 576, 含税 720
        let totals = compute_totals(
            &[equipment(2, "100")],
            &[],
            &[],
            10,
            &bd("10"),
            &bd("25"),
            &CompanyPricingConfig::default(),
        );
        assert_eq!(totals.equipment_subtotal, bd("640"));
        assert_eq!(totals.discount_amount, bd("64"));
        assert_eq!(totals.total_after_discount, bd("576"));
        assert_eq!(totals.total_with_vat, bd("720"));
    }

    #[test]
    fn discount_never_touches_crew_or_transport() {
        let transport = TransportLine {
            id: 3,
            vehicle_id: Some(7),
            distance_km: None,
            start_at: Some(ts(1, 0)),
            end_at: Some(ts(2, 0)),
            daily_rate: Some(bd("300")),
            distance_rate: None,
        };
        let totals = compute_totals(
            &[equipment(2, "100")],
            &[crew(2, "500", 2)],
            &[transport],
            10,
            &bd("10"),
            &bd("0"),
            &CompanyPricingConfig::default(),
        );
        // 折扣基数只有设备小计 640, 与 2000 + 300 无关
        assert_eq!(totals.discount_amount, bd("64"));
        assert_eq!(totals.total_before_discount, bd("2940"));
        assert_eq!(totals.total_after_discount, bd("2876"));
    }

    #[test]
    fn crew_subtotal_uses_own_span_not_days_of_use() {
        let lines = [crew(2, "500", 2)];
        let config = CompanyPricingConfig::default();
        let short = compute_totals(&[], &lines, &[], 1, &bd("0"), &bd("0"), &config);
        let long = compute_totals(&[], &lines, &[], 30, &bd("0"), &bd("0"), &config);
        // 跨 2 个日历天 × 2 人 × 500
        assert_eq!(short.crew_subtotal, bd("2000"));
        assert_eq!(long.crew_subtotal, bd("2000"));
    }

    #[test]
    fn transport_distance_rounds_up_per_increment() {
        let line = TransportLine {
            id: 4,
            vehicle_id: Some(7),
            distance_km: Some(bd("200")),
            start_at: None,
            end_at: None,
            daily_rate: None,
            distance_rate: Some(bd("50")),
        };
        let config = CompanyPricingConfig::default(); // 增量 150km
        let (total, missing) = transport_line_total(&line, &config);
        // ceil(200/150)=2 段 × 50
        assert_eq!(total, bd("100"));
        assert!(!missing);
    }

    #[test]
    fn transport_rates_fall_back_to_company_defaults() {
        let line = TransportLine {
            id: 5,
            vehicle_id: Some(7),
            distance_km: Some(bd("100")),
            start_at: Some(ts(1, 0)),
            end_at: Some(ts(4, 0)),
            daily_rate: None,
            distance_rate: None,
        };
        let config = CompanyPricingConfig {
            vehicle_daily_rate: Some(bd("200")),
            vehicle_distance_rate: Some(bd("10")),
            ..Default::default()
        };
        let (total, missing) = transport_line_total(&line, &config);
        // 3 天 × 200 + 1 段 × 10
        assert_eq!(total, bd("610"));
        assert!(!missing);
    }

    #[test]
    fn missing_distance_rate_is_flagged_not_silent() {
        let line = TransportLine {
            id: 6,
            vehicle_id: Some(7),
            distance_km: Some(bd("200")),
            start_at: None,
            end_at: None,
            daily_rate: Some(bd("300")),
            distance_rate: None,
        };
        let config = CompanyPricingConfig::default();
        let (total, missing) = transport_line_total(&line, &config);
        // 里程项记 0, 但缺失标记透出
        assert_eq!(total, bd("300"));
        assert!(missing);

        let totals = compute_totals(
            &[],
            &[],
            &[line],
            1,
            &bd("0"),
            &bd("0"),
            &config,
        );
        assert!(totals.distance_rate_missing);
    }

    #[test]
    fn billable_days_clamps_and_ceils() {
        assert_eq!(billable_days(None, None), 1);
        assert_eq!(billable_days(Some(ts(2, 0)), Some(ts(1, 0))), 1);
        assert_eq!(billable_days(Some(ts(1, 0)), Some(ts(1, 6))), 1);
        assert_eq!(billable_days(Some(ts(1, 0)), Some(ts(3, 0))), 2);
        assert_eq!(billable_days(Some(ts(1, 0)), Some(ts(3, 1))), 3);
    }
}
