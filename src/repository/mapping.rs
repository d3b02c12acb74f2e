// ==========================================
// 住院医师排班系统 - 行映射辅助
// ==========================================
// 职责: 数据库文本列 ↔ 领域类型的集中转换
// 约束: 枚举写入走 Display (SCREAMING_SNAKE_CASE),
//       读取经 serde 反序列化,二者由 rename_all 保持一致
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::de::DeserializeOwned;

use crate::repository::error::{RepositoryError, RepositoryResult};

/// 日期列格式
pub(crate) const DATE_FMT: &str = "%Y-%m-%d";
/// 时间戳列格式
pub(crate) const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// 解析枚举文本列
///
/// # 参数
/// - field: 列名 (用于错误信息)
/// - raw: 数据库中的 SCREAMING_SNAKE_CASE 文本
pub(crate) fn enum_from_text<T: DeserializeOwned>(field: &str, raw: &str) -> RepositoryResult<T> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).map_err(|e| {
        RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("无法解析枚举值 '{}': {}", raw, e),
        }
    })
}

/// 解析日期列
pub(crate) fn date_from_text(field: &str, raw: &str) -> RepositoryResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FMT).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("无法解析日期 '{}': {}", raw, e),
    })
}

/// 解析时间戳列
pub(crate) fn datetime_from_text(field: &str, raw: &str) -> RepositoryResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FMT).map_err(|e| {
        RepositoryError::FieldValueError {
            field: field.to_string(),
            message: format!("无法解析时间戳 '{}': {}", raw, e),
        }
    })
}

/// 日期列写入格式化
pub(crate) fn date_to_text(date: NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

/// 时间戳列写入格式化
pub(crate) fn datetime_to_text(ts: NaiveDateTime) -> String {
    ts.format(DATETIME_FMT).to_string()
}

/// 解析 JSON 文本列
pub(crate) fn json_from_text<T: DeserializeOwned>(field: &str, raw: &str) -> RepositoryResult<T> {
    serde_json::from_str(raw).map_err(|e| RepositoryError::FieldValueError {
        field: field.to_string(),
        message: format!("无法解析 JSON: {}", e),
    })
}
