use crate::models::{
    CompanyPricingRow, CrewLine, CrewLineRow, CrewPeriod, CrewPeriodRow, EquipmentLineRow,
    EquipmentReservation, EquipmentReservationRow, GroupMemberRow, OfferHeader, OfferTotals,
    ReplacedCounts, TransportLineRow, VehicleReservationRow,
};
use bigdecimal::BigDecimal;
use sqlx::PgPool;

/// 查询报价单主表
pub async fn get_offer(pool: &PgPool, offer_id: i64) -> Result<Option<OfferHeader>, sqlx::Error> {
    sqlx::query_as::<_, OfferHeader>(
        r#"
        SELECT id, job_id, company_id, days_of_use, discount_percent, vat_percent
        FROM offers
        WHERE id = $1
        "#,
    )
    .bind(offer_id)
    .fetch_optional(pool)
    .await
}

/// 查询公司级定价配置
pub async fn get_company_pricing(
    pool: &PgPool,
    company_id: i64,
) -> Result<Option<CompanyPricingRow>, sqlx::Error> {
    sqlx::query_as::<_, CompanyPricingRow>(
        r#"
        SELECT rental_factor_table, vehicle_daily_rate, vehicle_distance_rate,
               vehicle_distance_increment, partner_discount_percent,
               customer_discount_percent, crew_rate_per_day, crew_rate_per_hour
        FROM companies
        WHERE id = $1
        "#,
    )
    .bind(company_id)
    .fetch_optional(pool)
    .await
}

/// 查询报价单设备明细
pub async fn list_equipment_lines(
    pool: &PgPool,
    offer_id: i64,
) -> Result<Vec<EquipmentLineRow>, sqlx::Error> {
    sqlx::query_as::<_, EquipmentLineRow>(
        r#"
        SELECT id, item_id, group_id, quantity, unit_price
        FROM offer_equipment_lines
        WHERE offer_id = $1
        ORDER BY id
        "#,
    )
    .bind(offer_id)
    .fetch_all(pool)
    .await
}

/// 查询报价单人员明细
pub async fn list_crew_lines(
    pool: &PgPool,
    offer_id: i64,
) -> Result<Vec<CrewLineRow>, sqlx::Error> {
    sqlx::query_as::<_, CrewLineRow>(
        r#"
        SELECT id, role_title, crew_count, start_at, end_at,
               billing_mode, daily_rate, hourly_rate, hours_per_day
        FROM offer_crew_lines
        WHERE offer_id = $1
        ORDER BY id
        "#,
    )
    .bind(offer_id)
    .fetch_all(pool)
    .await
}

/// 查询报价单运输明细
pub async fn list_transport_lines(
    pool: &PgPool,
    offer_id: i64,
) -> Result<Vec<TransportLineRow>, sqlx::Error> {
    sqlx::query_as::<_, TransportLineRow>(
        r#"
        SELECT id, vehicle_id, distance_km, start_at, end_at, daily_rate, distance_rate
        FROM offer_transport_lines
        WHERE offer_id = $1
        ORDER BY id
        "#,
    )
    .bind(offer_id)
    .fetch_all(pool)
    .await
}

/// 查询设备组成员
pub async fn list_group_members(
    pool: &PgPool,
    group_id: i64,
) -> Result<Vec<GroupMemberRow>, sqlx::Error> {
    sqlx::query_as::<_, GroupMemberRow>(
        r#"
        SELECT item_id, quantity
        FROM equipment_group_members
        WHERE group_id = $1
        ORDER BY item_id
        "#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await
}

/// 查询 job 当前的设备预定
pub async fn list_equipment_reservations(
    pool: &PgPool,
    job_id: i64,
) -> Result<Vec<EquipmentReservationRow>, sqlx::Error> {
    sqlx::query_as::<_, EquipmentReservationRow>(
        r#"
        SELECT item_id, quantity, source_kind, source_group_id
        FROM equipment_reservations
        WHERE job_id = $1
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}

/// 查询 job 当前的人员档期
pub async fn list_crew_periods(
    pool: &PgPool,
    job_id: i64,
) -> Result<Vec<CrewPeriodRow>, sqlx::Error> {
    sqlx::query_as::<_, CrewPeriodRow>(
        r#"
        SELECT title, start_at, end_at, needed_count
        FROM crew_periods
        WHERE job_id = $1
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}

/// 查询 job 当前的车辆预定
pub async fn list_vehicle_reservations(
    pool: &PgPool,
    job_id: i64,
) -> Result<Vec<VehicleReservationRow>, sqlx::Error> {
    sqlx::query_as::<_, VehicleReservationRow>(
        r#"
        SELECT vehicle_id
        FROM vehicle_reservations
        WHERE job_id = $1
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await
}

/// 物品名称查找表 (删除清单展示用)
pub async fn get_item_names(
    pool: &PgPool,
    item_ids: &[i64],
) -> Result<Vec<(i64, String)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, String)>(
        r#"
        SELECT id, name
        FROM equipment_items
        WHERE id = ANY($1)
        "#,
    )
    .bind(item_ids)
    .fetch_all(pool)
    .await
}

/// 车辆名称查找表 (删除清单展示用)
pub async fn get_vehicle_names(
    pool: &PgPool,
    vehicle_ids: &[i64],
) -> Result<Vec<(i64, String)>, sqlx::Error> {
    sqlx::query_as::<_, (i64, String)>(
        r#"
        SELECT id, name
        FROM vehicles
        WHERE id = ANY($1)
        "#,
    )
    .bind(vehicle_ids)
    .fetch_all(pool)
    .await
}

/// 回写人员行规范化后的 canonical 费率
pub async fn update_crew_line_rates(pool: &PgPool, line: &CrewLine) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE offer_crew_lines
        SET billing_mode = $1, daily_rate = $2, hourly_rate = $3, hours_per_day = $4
        WHERE id = $5
        "#,
    )
    .bind(line.billing_mode.as_str())
    .bind(line.daily_rate.clone())
    .bind(line.hourly_rate.clone())
    .bind(line.hours_per_day.clone())
    .bind(line.id)
    .execute(pool)
    .await?;
    Ok(())
}

/// 回写设备行派生小计
pub async fn update_equipment_line_total(
    pool: &PgPool,
    line_id: i64,
    total: &BigDecimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE offer_equipment_lines SET total_price = $1 WHERE id = $2")
        .bind(total.clone())
        .bind(line_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// 回写人员行派生小计
pub async fn update_crew_line_total(
    pool: &PgPool,
    line_id: i64,
    total: &BigDecimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE offer_crew_lines SET total_price = $1 WHERE id = $2")
        .bind(total.clone())
        .bind(line_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// 回写运输行派生小计
pub async fn update_transport_line_total(
    pool: &PgPool,
    line_id: i64,
    total: &BigDecimal,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE offer_transport_lines SET total_price = $1 WHERE id = $2")
        .bind(total.clone())
        .bind(line_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// 回写报价单合计 (全部为派生字段)
pub async fn update_offer_totals(
    pool: &PgPool,
    offer_id: i64,
    totals: &OfferTotals,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE offers
        SET equipment_subtotal = $1, crew_subtotal = $2, transport_subtotal = $3,
            total_before_discount = $4, discount_amount = $5,
            total_after_discount = $6, total_with_vat = $7
        WHERE id = $8
        "#,
    )
    .bind(totals.equipment_subtotal.clone())
    .bind(totals.crew_subtotal.clone())
    .bind(totals.transport_subtotal.clone())
    .bind(totals.total_before_discount.clone())
    .bind(totals.discount_amount.clone())
    .bind(totals.total_after_discount.clone())
    .bind(totals.total_with_vat.clone())
    .bind(offer_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// 整体替换 job 的三类预定, 单事务: 要么全部落库, 要么一行不写
pub async fn replace_job_bookings(
    pool: &PgPool,
    job_id: i64,
    equipment: &[EquipmentReservation],
    crew: &[CrewPeriod],
    vehicle_ids: &[i64],
) -> Result<ReplacedCounts, sqlx::Error> {
    let mut tx = pool.begin().await?;

    // 1. 清空三类既有预定 (整体替换, 不是打补丁)
    sqlx::query("DELETE FROM equipment_reservations WHERE job_id = $1")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM crew_periods WHERE job_id = $1")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM vehicle_reservations WHERE job_id = $1")
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

    // 2. 按报价构成重建 (每1000条分块)
    for chunk in equipment.chunks(1000) {
        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO equipment_reservations (job_id, item_id, quantity, source_kind, source_group_id) ",
        );
        builder.push_values(chunk, |mut b, r| {
            b.push_bind(job_id)
                .push_bind(r.item_id)
                .push_bind(r.quantity)
                .push_bind(r.source_kind.as_str())
                .push_bind(r.source_group_id);
        });
        builder.build().execute(&mut *tx).await?;
    }

    for chunk in crew.chunks(1000) {
        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO crew_periods (job_id, title, start_at, end_at, needed_count) ",
        );
        builder.push_values(chunk, |mut b, p| {
            b.push_bind(job_id)
                .push_bind(&p.title)
                .push_bind(p.start_at)
                .push_bind(p.end_at)
                .push_bind(p.needed_count);
        });
        builder.build().execute(&mut *tx).await?;
    }

    for chunk in vehicle_ids.chunks(1000) {
        let mut builder =
            sqlx::QueryBuilder::new("INSERT INTO vehicle_reservations (job_id, vehicle_id) ");
        builder.push_values(chunk, |mut b, vehicle_id| {
            b.push_bind(job_id).push_bind(vehicle_id);
        });
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    Ok(ReplacedCounts {
        equipment_rows: equipment.len(),
        crew_rows: crew.len(),
        vehicle_rows: vehicle_ids.len(),
    })
}
