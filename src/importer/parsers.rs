// ==========================================
// 记录导入引擎 - 默认解析器表
// ==========================================
// 职责: 字符串 → 字段值的纯函数解析器 + 按字段类型查表
// 说明: 绑定阶段按目标字段类型标签查表一次，不做运行时类型探测
// ==========================================

use crate::domain::schema::FieldType;
use crate::domain::value::Value;
use crate::importer::error::ColumnError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::sync::Arc;

/// 文本解析器（位置列使用）
pub type Parser = Arc<dyn Fn(&str) -> Result<Value, ColumnError> + Send + Sync>;

/// 由闭包构造解析器
pub fn parser<F>(f: F) -> Parser
where
    F: Fn(&str) -> Result<Value, ColumnError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// 日/月顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    /// 日/月/年（fr_FR）
    DayFirst,
    /// 月/日/年（en_US）
    MonthFirst,
}

/// 上限哨兵值（源系统以此表示"无限期"）
const MAX_SENTINEL: &str = "10000-01-01 0:00:00";

const TRUE_WORDS: [&str; 6] = ["yes", "true", "t", "1", "oui", "vrai"];

// ==========================================
// 基础解析函数
// ==========================================

/// 可空布尔（空串 → null）
pub fn parse_bool(raw: &str) -> Result<Value, ColumnError> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    let lower = raw.to_lowercase();
    Ok(Value::Bool(TRUE_WORDS.contains(&lower.as_str())))
}

/// 可空整数（无法解析 → null）
pub fn parse_int(raw: &str) -> Result<Value, ColumnError> {
    Ok(raw
        .trim()
        .parse::<i64>()
        .map(Value::Int)
        .unwrap_or(Value::Null))
}

/// 可空浮点数（无法解析 → null）
pub fn parse_float(raw: &str) -> Result<Value, ColumnError> {
    Ok(raw
        .trim()
        .parse::<f64>()
        .map(Value::Float)
        .unwrap_or(Value::Null))
}

/// 可空字符串，去首尾空白后按字符截断
pub fn parse_text(raw: &str, max_len: Option<usize>) -> Result<Value, ColumnError> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    let trimmed = raw.trim();
    let text = match max_len {
        Some(n) if trimmed.chars().count() > n => trimmed.chars().take(n).collect(),
        _ => trimmed.to_string(),
    };
    Ok(Value::Text(text))
}

/// 日期解析
///
/// # 规则
/// - 含 '/'：按 order 尝试 d/m/Y 或 m/d/Y，失败再试另一顺序
/// - 含 '.'：同上（d.m.Y / m.d.Y）
/// - 否则 Y-m-d；空串 → null；哨兵值 → 最大日期
pub fn parse_date(raw: &str, order: DateOrder) -> Result<Value, ColumnError> {
    let stripped = raw.trim();
    if stripped.is_empty() {
        return Ok(Value::Null);
    }
    if stripped == MAX_SENTINEL {
        return Ok(Value::Date(max_date()));
    }

    let formats: &[&str] = if stripped.contains('/') {
        match order {
            DateOrder::DayFirst => &["%d/%m/%Y", "%m/%d/%Y"],
            DateOrder::MonthFirst => &["%m/%d/%Y", "%d/%m/%Y"],
        }
    } else if stripped.contains('.') {
        match order {
            DateOrder::DayFirst => &["%d.%m.%Y", "%m.%d.%Y"],
            DateOrder::MonthFirst => &["%m.%d.%Y", "%d.%m.%Y"],
        }
    } else {
        &["%Y-%m-%d"]
    };

    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(stripped, fmt).ok())
        .map(Value::Date)
        .ok_or_else(|| ColumnError::Format(format!("无法解析日期: {}", stripped)))
}

/// 日期时间解析（规则同 parse_date，格式带 H:M:S）
pub fn parse_datetime(raw: &str, order: DateOrder) -> Result<Value, ColumnError> {
    let stripped = raw.trim();
    if stripped.is_empty() {
        return Ok(Value::Null);
    }
    if stripped == MAX_SENTINEL {
        return Ok(Value::DateTime(max_datetime()));
    }

    let formats: &[&str] = if stripped.contains('/') {
        match order {
            DateOrder::MonthFirst => &["%m/%d/%Y %H:%M:%S", "%d/%m/%Y %H:%M:%S"],
            DateOrder::DayFirst => &["%d/%m/%Y %H:%M:%S", "%m/%d/%Y %H:%M:%S"],
        }
    } else if stripped.contains('.') {
        match order {
            DateOrder::MonthFirst => &["%m.%d.%Y %H:%M:%S", "%d.%m.%Y %H:%M:%S"],
            DateOrder::DayFirst => &["%d.%m.%Y %H:%M:%S", "%m.%d.%Y %H:%M:%S"],
        }
    } else {
        &["%Y-%m-%d %H:%M:%S"]
    };

    formats
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(stripped, fmt).ok())
        .map(Value::DateTime)
        .ok_or_else(|| ColumnError::Format(format!("无法解析日期时间: {}", stripped)))
}

/// 时间解析（H:M:S；空串 → null）
pub fn parse_time(raw: &str) -> Result<Value, ColumnError> {
    let stripped = raw.trim();
    if stripped.is_empty() {
        return Ok(Value::Null);
    }
    NaiveTime::parse_from_str(stripped, "%H:%M:%S")
        .map(Value::Time)
        .map_err(|e| ColumnError::Format(format!("无法解析时间 {}: {}", stripped, e)))
}

fn max_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

fn max_datetime() -> NaiveDateTime {
    max_date()
        .and_hms_opt(23, 59, 59)
        .unwrap_or(NaiveDateTime::MAX)
}

// ==========================================
// 类型标签 → 默认解析器
// ==========================================

/// 按字段类型查找默认解析器
///
/// # 返回
/// - Some(Parser): 已知类型
/// - None: 不支持的类型（需显式指定 parser）
pub fn default_parser(field_type: &FieldType) -> Option<Parser> {
    match field_type {
        FieldType::Bool => Some(parser(parse_bool)),
        FieldType::Int => Some(parser(parse_int)),
        FieldType::Numeric => Some(parser(parse_float)),
        FieldType::Text { max_len } => {
            let max_len = *max_len;
            Some(parser(move |raw| parse_text(raw, max_len)))
        }
        FieldType::Date => Some(parser(|raw| parse_date(raw, DateOrder::DayFirst))),
        FieldType::DateTime => Some(parser(|raw| parse_datetime(raw, DateOrder::MonthFirst))),
        FieldType::Time => Some(parser(parse_time)),
        FieldType::Other(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("").unwrap(), Value::Null);
        assert_eq!(parse_bool("Oui").unwrap(), Value::Bool(true));
        assert_eq!(parse_bool("1").unwrap(), Value::Bool(true));
        assert_eq!(parse_bool("no").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_parse_int_and_float() {
        assert_eq!(parse_int(" 42 ").unwrap(), Value::Int(42));
        assert_eq!(parse_int("-1").unwrap(), Value::Int(-1));
        assert_eq!(parse_int("a").unwrap(), Value::Null);
        assert_eq!(parse_int("").unwrap(), Value::Null);
        assert_eq!(parse_float("1.5").unwrap(), Value::Float(1.5));
        assert_eq!(parse_float("x").unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_text_truncates() {
        assert_eq!(parse_text("", Some(1)).unwrap(), Value::Null);
        assert_eq!(parse_text("ABCDEFG", Some(1)).unwrap(), Value::from("A"));
        assert_eq!(parse_text("  abc ", None).unwrap(), Value::from("abc"));
        assert_eq!(parse_text("é中文", Some(2)).unwrap(), Value::from("é中"));
    }

    #[test]
    fn test_parse_date_orders() {
        assert_eq!(parse_date("03/02/2024", DateOrder::DayFirst).unwrap(), date(2024, 2, 3));
        assert_eq!(parse_date("03/02/2024", DateOrder::MonthFirst).unwrap(), date(2024, 3, 2));
        // 日 > 12 时回退到另一顺序
        assert_eq!(parse_date("02/25/2024", DateOrder::DayFirst).unwrap(), date(2024, 2, 25));
        assert_eq!(parse_date("25.02.2024", DateOrder::DayFirst).unwrap(), date(2024, 2, 25));
        assert_eq!(parse_date("2024-02-25", DateOrder::DayFirst).unwrap(), date(2024, 2, 25));
        assert_eq!(parse_date(" ", DateOrder::DayFirst).unwrap(), Value::Null);
        assert_eq!(
            parse_date("10000-01-01 0:00:00", DateOrder::DayFirst).unwrap(),
            date(9999, 12, 31)
        );
        assert!(matches!(
            parse_date("garbage", DateOrder::DayFirst),
            Err(ColumnError::Format(_))
        ));
    }

    #[test]
    fn test_parse_datetime_and_time() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 2)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(
            parse_datetime("03/02/2024 10:30:00", DateOrder::MonthFirst).unwrap(),
            Value::DateTime(expected)
        );
        assert_eq!(
            parse_datetime("2024-03-02 10:30:00", DateOrder::MonthFirst).unwrap(),
            Value::DateTime(expected)
        );
        assert_eq!(
            parse_time("08:15:00").unwrap(),
            Value::Time(NaiveTime::from_hms_opt(8, 15, 0).unwrap())
        );
        assert!(parse_time("8h15").is_err());
    }

    #[test]
    fn test_default_parser_table() {
        let int_parser = default_parser(&FieldType::Int).unwrap();
        assert_eq!(int_parser("7").unwrap(), Value::Int(7));

        let text_parser = default_parser(&FieldType::Text { max_len: Some(3) }).unwrap();
        assert_eq!(text_parser("abcdef").unwrap(), Value::from("abc"));

        assert!(default_parser(&FieldType::Other("BLOB".into())).is_none());
    }
}
