use serde::Serialize;

/// 按资源类分组的删除提示, 供确认对话框逐行展示
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemovalSummary {
    pub equipment: Vec<String>,
    pub crew: Vec<String>,
    pub transport: Vec<String>,
}

impl RemovalSummary {
    pub fn is_empty(&self) -> bool {
        self.equipment.is_empty() && self.crew.is_empty() && self.transport.is_empty()
    }
}

/// 同步计划: 纯新增不需要确认, 出现任何删除项则必须显式确认
#[derive(Debug, Clone, Serialize)]
pub struct SyncPlan {
    pub has_removals: bool,
    pub requires_confirmation: bool,
    pub removal_summary: RemovalSummary,
}

/// 整体替换写入的行数统计
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplacedCounts {
    pub equipment_rows: usize,
    pub crew_rows: usize,
    pub vehicle_rows: usize,
}

/// 同步执行结果
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// 存在删除项且调用方未确认, 未产生任何写入
    NeedsConfirmation(SyncPlan),
    /// 三类预定已整体替换为报价单构成
    Replaced(ReplacedCounts),
}
