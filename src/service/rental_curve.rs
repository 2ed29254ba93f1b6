use std::collections::BTreeMap;

/// 租期折扣表: 使用天数 → 乘数 (有序)
pub type RentalFactorTable = BTreeMap<i64, f64>;

/// 超出最高断点后每多一天的固定增量 (既有业务常数, 不得改动)
pub const EXTRA_DAY_GROWTH: f64 = 0.025;

/// 内置默认折扣表, 公司未配置覆盖表时使用
pub fn default_table() -> RentalFactorTable {
    [
        (1, 1.0),
        (2, 1.6),
        (3, 2.0),
        (4, 2.3),
        (5, 2.5),
        (7, 2.8),
        (10, 3.2),
        (14, 3.5),
        (21, 4.0),
        (30, 4.5),
    ]
    .into_iter()
    .collect()
}

/// 使用天数 → 租期乘数, 全定义域纯函数
/// - days ≤ 0 → 1.0
/// - 低于最低断点 → 取最低断点乘数
/// - 高于最高断点 → 最高乘数 + 超出天数 × 0.025
/// - 其余 → 相邻断点线性插值
pub fn factor(days: i64, table: Option<&RentalFactorTable>) -> f64 {
    if days <= 0 {
        return 1.0;
    }

    let fallback;
    let table = match table {
        Some(t) if !t.is_empty() => t,
        _ => {
            fallback = default_table();
            &fallback
        }
    };

    let mut lower: Option<(i64, f64)> = None;
    let mut upper: Option<(i64, f64)> = None;
    for (&day, &mult) in table {
        if day <= days {
            lower = Some((day, mult));
        } else {
            upper = Some((day, mult));
            break;
        }
    }

    match (lower, upper) {
        // 两断点之间线性插值 (恰好命中断点时退化为下断点乘数)
        (Some((lo_day, lo)), Some((hi_day, hi))) => {
            lo + (hi - lo) * (days - lo_day) as f64 / (hi_day - lo_day) as f64
        }
        // 高于最高断点: 固定斜率外推
        (Some((hi_day, hi)), None) => hi + (days - hi_day) as f64 * EXTRA_DAY_GROWTH,
        // 低于最低断点: 夹取
        (None, Some((_, lo))) => lo,
        (None, None) => 1.0,
    }
}

/// 解析公司配置的 JSON 折扣表 (整数字符串 key → 正数值)
/// JSON 非法 / 非对象 / 无任何有效断点 → None, 调用方回落默认表
pub fn parse_rental_table(raw: &str) -> Option<RentalFactorTable> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;

    let mut table = RentalFactorTable::new();
    for (key, val) in object {
        let Ok(day) = key.trim().parse::<i64>() else {
            continue;
        };
        let Some(mult) = val.as_f64() else {
            continue;
        };
        if day > 0 && mult > 0.0 {
            table.insert(day, mult);
        }
    }

    if table.is_empty() {
        None
    } else {
        Some(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn exact_breakpoints_return_table_values() {
        let table = default_table();
        for (&day, &mult) in &table {
            close(factor(day, None), mult);
        }
    }

    #[test]
    fn non_positive_days_floor_to_one() {
        close(factor(0, None), 1.0);
        close(factor(-5, None), 1.0);
    }

    #[test]
    fn below_lowest_breakpoint_clamps() {
        let table: RentalFactorTable = [(5, 2.5), (10, 3.0)].into_iter().collect();
        close(factor(2, Some(&table)), 2.5);
    }

    #[test]
    fn interpolates_between_breakpoints() {
        // 5→2.5, 7→2.8, 第6天取中点
        close(factor(6, None), 2.65);
    }

    #[test]
    fn extrapolates_above_highest_breakpoint() {
        // 30→4.5, 每多一天 +0.025
        close(factor(35, None), 4.625);
    }

    #[test]
    fn empty_override_falls_back_to_default() {
        let empty = RentalFactorTable::new();
        close(factor(10, Some(&empty)), 3.2);
    }

    #[test]
    fn parses_valid_table() {
        let table = parse_rental_table(r#"{"1": 1.0, "3": 2.0}"#).unwrap();
        assert_eq!(table.len(), 2);
        close(table[&3], 2.0);
    }

    #[test]
    fn malformed_json_is_treated_as_absent() {
        assert!(parse_rental_table("not json").is_none());
        assert!(parse_rental_table("[1, 2]").is_none());
        assert!(parse_rental_table("{}").is_none());
        // key 非整数 / 值非正数的断点被跳过
        assert!(parse_rental_table(r#"{"abc": 2.0, "3": -1}"#).is_none());
    }

    #[test]
    fn invalid_entries_are_skipped_not_fatal() {
        let table = parse_rental_table(r#"{"abc": 9.0, "2": 1.6}"#).unwrap();
        assert_eq!(table.len(), 1);
        close(table[&2], 1.6);
    }
}
