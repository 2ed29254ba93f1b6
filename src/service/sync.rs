use crate::db::queries;
use crate::models::{
    CrewPeriod, EquipmentReservation, OfferComposition, ReconcileDiff, RemovalSummary,
    SyncOutcome, SyncPlan,
};
use crate::service::reconcile::{
    self, offer_crew_counts, offer_equipment_counts, ReconcileService,
};
use sqlx::PgPool;
use std::collections::HashMap;

/// 把 diff 转成人工可审阅的同步计划
/// 只新增的同步不需要确认; 任何会删除或缩减既有预定的差异都要求显式确认
pub fn plan_sync(
    diff: &ReconcileDiff,
    item_names: &HashMap<i64, String>,
    vehicle_names: &HashMap<i64, String>,
) -> SyncPlan {
    let mut summary = RemovalSummary::default();

    for change in diff.equipment_changes.iter().filter(|c| c.is_removal()) {
        let name = item_names
            .get(&change.key.item_id)
            .cloned()
            .unwrap_or_else(|| format!("设备 #{}", change.key.item_id));
        let origin = match change.key.source_group_id {
            Some(group_id) => format!(" (组 #{})", group_id),
            None => String::new(),
        };
        summary.equipment.push(format!(
            "{}{}: 预定 {} → 报价 {}",
            name, origin, change.current, change.expected
        ));
    }

    for change in diff.crew_changes.iter().filter(|c| c.is_removal()) {
        summary.crew.push(format!(
            "{} ({} ~ {}): 预定 {} 人 → 报价 {} 人",
            change.key.title,
            change.key.start_at.format("%Y-%m-%d %H:%M"),
            change.key.end_at.format("%Y-%m-%d %H:%M"),
            change.current,
            change.expected
        ));
    }

    if diff.transport_verifiable {
        for change in diff.transport_changes.iter().filter(|c| c.is_removal()) {
            let name = vehicle_names
                .get(&change.key)
                .cloned()
                .unwrap_or_else(|| format!("车辆 #{}", change.key));
            summary.transport.push(format!(
                "{}: 预定 {} → 报价 {}",
                name, change.current, change.expected
            ));
        }
    }

    let has_removals = diff.has_removals();
    SyncPlan {
        has_removals,
        requires_confirmation: has_removals,
        removal_summary: summary,
    }
}

/// 由报价构成生成整体替换要写入的三类预定行
/// 与比对使用同一套多重集展开, 保证刚同步完的 job 立即判定为 synced
pub fn composition_booking_rows(
    composition: &OfferComposition,
) -> (Vec<EquipmentReservation>, Vec<CrewPeriod>, Vec<i64>) {
    let equipment = offer_equipment_counts(&composition.equipment, &composition.group_members)
        .into_iter()
        .map(|(key, quantity)| EquipmentReservation {
            item_id: key.item_id,
            quantity,
            source_kind: key.source_kind,
            source_group_id: key.source_group_id,
        })
        .collect();

    let crew = offer_crew_counts(&composition.crew)
        .into_iter()
        .map(|(key, needed_count)| CrewPeriod {
            title: key.title,
            start_at: key.start_at,
            end_at: key.end_at,
            needed_count,
        })
        .collect();

    // vehicle_id 不可解析的运输行写不出预定, 跳过
    let mut vehicles = Vec::new();
    for line in &composition.transport {
        if let Some(vehicle_id) = line.vehicle_id {
            vehicles.push(vehicle_id);
        }
    }

    (equipment, crew, vehicles)
}

/// 同步服务: 刷新 → 重算 diff → 确认门 → 事务内整体替换
pub struct SyncService {
    pool: PgPool,
}

impl SyncService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 把 job 的实际预定整体替换为报价单构成
    /// 三步管线固定顺序: 任何一步拉取失败都在写入前中止, 不产生半成品
    pub async fn sync_offer(
        &self,
        offer_id: i64,
        confirmed: bool,
    ) -> Result<SyncOutcome, Box<dyn std::error::Error>> {
        let loader = ReconcileService::new(self.pool.clone());

        // 1. 紧贴写入重新拉取两侧, 不复用渲染期的旧数据
        let composition = loader.load_composition(offer_id).await?;
        let job_id = composition.offer.job_id;
        let snapshot = loader.load_snapshot(job_id).await?;

        // 2. 重算 diff 并生成删除清单
        let diff = reconcile::build_diff(&composition, &snapshot);
        let (item_names, vehicle_names) = self.removal_names(&diff).await?;
        let plan = plan_sync(&diff, &item_names, &vehicle_names);

        if plan.requires_confirmation && !confirmed {
            tracing::info!(
                "Offer {} sync blocked pending confirmation: {} equipment, {} crew, {} transport removals",
                offer_id,
                plan.removal_summary.equipment.len(),
                plan.removal_summary.crew.len(),
                plan.removal_summary.transport.len()
            );
            return Ok(SyncOutcome::NeedsConfirmation(plan));
        }

        // 3. 单事务内整体替换三类预定
        let (equipment, crew, vehicles) = composition_booking_rows(&composition);
        let counts =
            queries::replace_job_bookings(&self.pool, job_id, &equipment, &crew, &vehicles)
                .await?;

        tracing::info!(
            "Offer {} synced to job {}: {} equipment, {} crew, {} vehicle rows written",
            offer_id,
            job_id,
            counts.equipment_rows,
            counts.crew_rows,
            counts.vehicle_rows
        );

        Ok(SyncOutcome::Replaced(counts))
    }

    /// 删除清单里引用到的物品/车辆名称查找表
    async fn removal_names(
        &self,
        diff: &ReconcileDiff,
    ) -> Result<(HashMap<i64, String>, HashMap<i64, String>), sqlx::Error> {
        let item_ids: Vec<i64> = diff
            .equipment_changes
            .iter()
            .filter(|c| c.is_removal())
            .map(|c| c.key.item_id)
            .collect();
        let vehicle_ids: Vec<i64> = if diff.transport_verifiable {
            diff.transport_changes
                .iter()
                .filter(|c| c.is_removal())
                .map(|c| c.key)
                .collect()
        } else {
            Vec::new()
        };

        let item_names = if item_ids.is_empty() {
            HashMap::new()
        } else {
            queries::get_item_names(&self.pool, &item_ids)
                .await?
                .into_iter()
                .collect()
        };
        let vehicle_names = if vehicle_ids.is_empty() {
            HashMap::new()
        } else {
            queries::get_vehicle_names(&self.pool, &vehicle_ids)
                .await?
                .into_iter()
                .collect()
        };

        Ok((item_names, vehicle_names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BillingMode, BookingSnapshot, ChangeRecord, CrewKey, CrewLine, EquipmentKey,
        EquipmentLine, GroupMember, OfferHeader, SourceKind, TransportLine,
    };
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, day, 9, 0, 0).unwrap()
    }

    fn composition() -> OfferComposition {
        OfferComposition {
            offer: OfferHeader {
                id: 1,
                job_id: 2,
                company_id: 3,
                days_of_use: 5,
                discount_percent: "0".parse().unwrap(),
                vat_percent: "25".parse().unwrap(),
            },
            equipment: vec![
                EquipmentLine {
                    id: 10,
                    item_id: Some(100),
                    group_id: None,
                    quantity: 2,
                    unit_price: "100".parse().unwrap(),
                },
                EquipmentLine {
                    id: 11,
                    item_id: None,
                    group_id: Some(5),
                    quantity: 3,
                    unit_price: "50".parse().unwrap(),
                },
            ],
            crew: vec![CrewLine {
                id: 20,
                role_title: "舞台监督".to_string(),
                crew_count: 2,
                start_at: Some(ts(1)),
                end_at: Some(ts(3)),
                billing_mode: BillingMode::Daily,
                daily_rate: "500".parse().unwrap(),
                hourly_rate: None,
                hours_per_day: None,
            }],
            transport: vec![
                TransportLine {
                    id: 30,
                    vehicle_id: Some(7),
                    distance_km: None,
                    start_at: None,
                    end_at: None,
                    daily_rate: None,
                    distance_rate: None,
                },
                TransportLine {
                    id: 31,
                    vehicle_id: Some(7),
                    distance_km: None,
                    start_at: None,
                    end_at: None,
                    daily_rate: None,
                    distance_rate: None,
                },
            ],
            group_members: HashMap::from([(
                5,
                vec![
                    GroupMember {
                        item_id: 200,
                        quantity: 2,
                    },
                    GroupMember {
                        item_id: 201,
                        quantity: 1,
                    },
                ],
            )]),
        }
    }

    #[test]
    fn freshly_synced_bookings_reconcile_as_synced() {
        // 由报价构成直接生成预定 → 再 diff 同一构成必须零漂移
        let composition = composition();
        let (equipment, crew, vehicles) = composition_booking_rows(&composition);
        let snapshot = BookingSnapshot {
            equipment,
            crew,
            vehicles,
        };
        let diff = reconcile::build_diff(&composition, &snapshot);
        assert!(diff.equipment_changes.is_empty());
        assert!(diff.crew_changes.is_empty());
        assert!(diff.transport_verifiable);
        assert!(diff.transport_matches());
        assert!(diff.is_synced());
    }

    #[test]
    fn booking_rows_mirror_group_expansion() {
        let (equipment, crew, vehicles) = composition_booking_rows(&composition());
        // 直接行 1 条 + 组展开 2 条
        assert_eq!(equipment.len(), 3);
        let grouped: Vec<_> = equipment
            .iter()
            .filter(|r| r.source_kind == SourceKind::Group)
            .collect();
        assert_eq!(grouped.len(), 2);
        assert!(grouped
            .iter()
            .any(|r| r.item_id == 200 && r.quantity == 6 && r.source_group_id == Some(5)));
        assert_eq!(crew.len(), 1);
        assert_eq!(crew[0].needed_count, 2);
        assert_eq!(vehicles, vec![7, 7]);
    }

    fn pure_addition_diff() -> ReconcileDiff {
        ReconcileDiff {
            equipment_changes: vec![ChangeRecord {
                key: EquipmentKey {
                    source_kind: SourceKind::Direct,
                    source_group_id: None,
                    item_id: 100,
                },
                expected: 3,
                current: 1,
            }],
            crew_changes: vec![],
            transport_changes: vec![],
            transport_verifiable: true,
        }
    }

    #[test]
    fn pure_additions_require_no_confirmation() {
        let plan = plan_sync(&pure_addition_diff(), &HashMap::new(), &HashMap::new());
        assert!(!plan.has_removals);
        assert!(!plan.requires_confirmation);
        assert!(plan.removal_summary.is_empty());
    }

    #[test]
    fn any_single_removal_requires_confirmation() {
        let mut diff = pure_addition_diff();
        diff.crew_changes.push(ChangeRecord {
            key: CrewKey {
                title: "舞台监督".to_string(),
                start_at: ts(1),
                end_at: ts(3),
            },
            expected: 1,
            current: 2,
        });
        let plan = plan_sync(&diff, &HashMap::new(), &HashMap::new());
        assert!(plan.has_removals);
        assert!(plan.requires_confirmation);
        assert_eq!(plan.removal_summary.crew.len(), 1);
        assert!(plan.removal_summary.equipment.is_empty());
    }

    #[test]
    fn removal_lines_resolve_names_with_id_fallback() {
        let diff = ReconcileDiff {
            equipment_changes: vec![
                ChangeRecord {
                    key: EquipmentKey {
                        source_kind: SourceKind::Direct,
                        source_group_id: None,
                        item_id: 100,
                    },
                    expected: 0,
                    current: 2,
                },
                ChangeRecord {
                    key: EquipmentKey {
                        source_kind: SourceKind::Group,
                        source_group_id: Some(5),
                        item_id: 200,
                    },
                    expected: 1,
                    current: 4,
                },
            ],
            crew_changes: vec![],
            transport_changes: vec![],
            transport_verifiable: true,
        };
        let item_names = HashMap::from([(100, "追光灯".to_string())]);
        let plan = plan_sync(&diff, &item_names, &HashMap::new());
        assert_eq!(plan.removal_summary.equipment.len(), 2);
        assert!(plan.removal_summary.equipment[0].starts_with("追光灯"));
        assert!(plan.removal_summary.equipment[1].contains("#200"));
        assert!(plan.removal_summary.equipment[1].contains("组 #5"));
    }

    #[test]
    fn unverifiable_transport_never_forces_confirmation() {
        let diff = ReconcileDiff {
            equipment_changes: vec![],
            crew_changes: vec![],
            transport_changes: vec![],
            transport_verifiable: false,
        };
        let plan = plan_sync(&diff, &HashMap::new(), &HashMap::new());
        assert!(!plan.requires_confirmation);
    }
}
