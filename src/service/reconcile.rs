use crate::db::queries;
use crate::models::{
    BookingSnapshot, ChangeRecord, CrewKey, CrewLine, CrewPeriod, EquipmentKey, EquipmentLine,
    EquipmentReservation, GroupMember, OfferComposition, ReconcileDiff, ReconcileReport,
    SourceKind, TransportLine,
};
use indexmap::IndexMap;
use sqlx::PgPool;
use std::collections::HashMap;
use std::hash::Hash;

/// 设备组成员查找器: 显式注入的记忆化协作者, 每次比对过程内同组只查一次
pub struct GroupLookup {
    pool: PgPool,
    cache: HashMap<i64, Vec<GroupMember>>,
}

impl GroupLookup {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: HashMap::new(),
        }
    }

    /// 取组成员, 同一实例内按 group_id 缓存
    pub async fn members(&mut self, group_id: i64) -> Result<Vec<GroupMember>, sqlx::Error> {
        if let Some(cached) = self.cache.get(&group_id) {
            return Ok(cached.clone());
        }
        let members: Vec<GroupMember> = queries::list_group_members(&self.pool, group_id)
            .await?
            .into_iter()
            .filter_map(GroupMember::from_row)
            .collect();
        self.cache.insert(group_id, members.clone());
        Ok(members)
    }

    /// 收集一组设备行引用到的全部组展开表
    pub async fn collect(
        &mut self,
        lines: &[EquipmentLine],
    ) -> Result<HashMap<i64, Vec<GroupMember>>, sqlx::Error> {
        let mut result = HashMap::new();
        for line in lines {
            if let Some(group_id) = line.group_id {
                if !result.contains_key(&group_id) {
                    result.insert(group_id, self.members(group_id).await?);
                }
            }
        }
        Ok(result)
    }
}

/// 累加后剔除非正数量的 key (缺失 key ≡ 数量 0)
fn prune<K: Hash + Eq>(mut counts: IndexMap<K, i64>) -> IndexMap<K, i64> {
    counts.retain(|_, qty| *qty > 0);
    counts
}

/// 报价侧设备多重集: 组行展开为每个成员一条 (group, 组ID, 成员物品) 合成行,
/// 数量 = 成员数量 × 行数量, 与同组生成的实际预定使用完全相同的 key
pub fn offer_equipment_counts(
    lines: &[EquipmentLine],
    group_members: &HashMap<i64, Vec<GroupMember>>,
) -> IndexMap<EquipmentKey, i64> {
    let mut counts: IndexMap<EquipmentKey, i64> = IndexMap::new();
    for line in lines {
        match (line.group_id, line.item_id) {
            (Some(group_id), _) => {
                for member in group_members.get(&group_id).map(Vec::as_slice).unwrap_or(&[]) {
                    let key = EquipmentKey {
                        source_kind: SourceKind::Group,
                        source_group_id: Some(group_id),
                        item_id: member.item_id,
                    };
                    *counts.entry(key).or_insert(0) += member.quantity * line.quantity;
                }
            }
            (None, Some(item_id)) => {
                let key = EquipmentKey {
                    source_kind: SourceKind::Direct,
                    source_group_id: None,
                    item_id,
                };
                *counts.entry(key).or_insert(0) += line.quantity;
            }
            (None, None) => {}
        }
    }
    prune(counts)
}

/// 预定侧设备多重集
pub fn booked_equipment_counts(
    reservations: &[EquipmentReservation],
) -> IndexMap<EquipmentKey, i64> {
    let mut counts: IndexMap<EquipmentKey, i64> = IndexMap::new();
    for r in reservations {
        let key = EquipmentKey {
            source_kind: r.source_kind,
            source_group_id: r.source_group_id,
            item_id: r.item_id,
        };
        *counts.entry(key).or_insert(0) += r.quantity;
    }
    prune(counts)
}

/// 报价侧人员多重集, key = (去空白职位名, 起, 止)
/// 空白职位名或缺失日期的行无法可靠匹配, 排除在比对之外
pub fn offer_crew_counts(lines: &[CrewLine]) -> IndexMap<CrewKey, i64> {
    let mut counts: IndexMap<CrewKey, i64> = IndexMap::new();
    for line in lines {
        let title = line.role_title.trim();
        let (Some(start_at), Some(end_at)) = (line.start_at, line.end_at) else {
            continue;
        };
        if title.is_empty() {
            continue;
        }
        let key = CrewKey {
            title: title.to_string(),
            start_at,
            end_at,
        };
        *counts.entry(key).or_insert(0) += line.crew_count;
    }
    prune(counts)
}

/// 预定侧人员多重集, 空白标题的档期同样排除
pub fn booked_crew_counts(periods: &[CrewPeriod]) -> IndexMap<CrewKey, i64> {
    let mut counts: IndexMap<CrewKey, i64> = IndexMap::new();
    for p in periods {
        let title = p.title.trim();
        if title.is_empty() {
            continue;
        }
        let key = CrewKey {
            title: title.to_string(),
            start_at: p.start_at,
            end_at: p.end_at,
        };
        *counts.entry(key).or_insert(0) += p.needed_count;
    }
    prune(counts)
}

/// 报价侧车辆多重集 (无数量概念, 只有多重集成员关系)
/// 任一运输行缺少 vehicle_id → None, 运输类整体不可确定性比对
pub fn offer_vehicle_counts(lines: &[TransportLine]) -> Option<IndexMap<i64, i64>> {
    let mut counts: IndexMap<i64, i64> = IndexMap::new();
    for line in lines {
        let vehicle_id = line.vehicle_id?;
        *counts.entry(vehicle_id).or_insert(0) += 1;
    }
    Some(counts)
}

/// 预定侧车辆多重集
pub fn booked_vehicle_counts(vehicle_ids: &[i64]) -> IndexMap<i64, i64> {
    let mut counts: IndexMap<i64, i64> = IndexMap::new();
    for &id in vehicle_ids {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}

/// 两侧 key 并集上的数量差异, 报价侧 key 在前保证输出顺序稳定
pub fn diff_counts<K: Hash + Eq + Clone>(
    expected: &IndexMap<K, i64>,
    current: &IndexMap<K, i64>,
) -> Vec<ChangeRecord<K>> {
    let mut changes = Vec::new();
    for (key, &want) in expected {
        let have = current.get(key).copied().unwrap_or(0);
        if want != have {
            changes.push(ChangeRecord {
                key: key.clone(),
                expected: want,
                current: have,
            });
        }
    }
    for (key, &have) in current {
        if !expected.contains_key(key) {
            changes.push(ChangeRecord {
                key: key.clone(),
                expected: 0,
                current: have,
            });
        }
    }
    changes
}

/// 报价单构成 vs 实际预定快照的结构化 diff
/// 破坏性同步前必须基于新拉取的快照重算, 不得复用早先渲染用的结果
pub fn build_diff(composition: &OfferComposition, snapshot: &BookingSnapshot) -> ReconcileDiff {
    let equipment_changes = diff_counts(
        &offer_equipment_counts(&composition.equipment, &composition.group_members),
        &booked_equipment_counts(&snapshot.equipment),
    );
    let crew_changes = diff_counts(
        &offer_crew_counts(&composition.crew),
        &booked_crew_counts(&snapshot.crew),
    );

    let (transport_verifiable, transport_changes) =
        match offer_vehicle_counts(&composition.transport) {
            Some(expected) => (
                true,
                diff_counts(&expected, &booked_vehicle_counts(&snapshot.vehicles)),
            ),
            // 不可比对: 中性处理, 绝不报成漂移
            None => (false, Vec::new()),
        };

    ReconcileDiff {
        equipment_changes,
        crew_changes,
        transport_changes,
        transport_verifiable,
    }
}

/// 比对服务: 独立加载报价构成与预定快照并给出判定
pub struct ReconcileService {
    pool: PgPool,
}

impl ReconcileService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 加载报价单声明的完整构成 (含组展开表)
    pub async fn load_composition(
        &self,
        offer_id: i64,
    ) -> Result<OfferComposition, Box<dyn std::error::Error>> {
        let offer = queries::get_offer(&self.pool, offer_id).await?;
        let Some(offer) = offer else {
            return Err(format!("Offer {} not found", offer_id).into());
        };

        let equipment: Vec<EquipmentLine> = queries::list_equipment_lines(&self.pool, offer_id)
            .await?
            .into_iter()
            .filter_map(EquipmentLine::from_row)
            .collect();
        let crew: Vec<CrewLine> = queries::list_crew_lines(&self.pool, offer_id)
            .await?
            .into_iter()
            .map(CrewLine::from_row)
            .collect();
        let transport: Vec<TransportLine> = queries::list_transport_lines(&self.pool, offer_id)
            .await?
            .into_iter()
            .map(TransportLine::from_row)
            .collect();

        let mut lookup = GroupLookup::new(self.pool.clone());
        let group_members = lookup.collect(&equipment).await?;

        Ok(OfferComposition {
            offer,
            equipment,
            crew,
            transport,
            group_members,
        })
    }

    /// 加载 job 当前实际预定的只读快照
    pub async fn load_snapshot(
        &self,
        job_id: i64,
    ) -> Result<BookingSnapshot, Box<dyn std::error::Error>> {
        let equipment: Vec<EquipmentReservation> =
            queries::list_equipment_reservations(&self.pool, job_id)
                .await?
                .into_iter()
                .filter_map(EquipmentReservation::from_row)
                .collect();
        let crew: Vec<CrewPeriod> = queries::list_crew_periods(&self.pool, job_id)
            .await?
            .into_iter()
            .filter_map(CrewPeriod::from_row)
            .collect();
        let vehicles: Vec<i64> = queries::list_vehicle_reservations(&self.pool, job_id)
            .await?
            .into_iter()
            .filter_map(|row| row.vehicle_id)
            .collect();

        Ok(BookingSnapshot {
            equipment,
            crew,
            vehicles,
        })
    }

    /// 比对入口: 重新加载两侧并给出 synced / not synced 判定
    pub async fn check_offer(
        &self,
        offer_id: i64,
    ) -> Result<ReconcileReport, Box<dyn std::error::Error>> {
        let composition = self.load_composition(offer_id).await?;
        let snapshot = self.load_snapshot(composition.offer.job_id).await?;
        let diff = build_diff(&composition, &snapshot);
        let synced = diff.is_synced();

        tracing::info!(
            "Offer {} reconciled: synced={}, equipment_changes={}, crew_changes={}, transport_verifiable={}",
            offer_id,
            synced,
            diff.equipment_changes.len(),
            diff.crew_changes.len(),
            diff.transport_verifiable
        );

        Ok(ReconcileReport { synced, diff })
    }
}
