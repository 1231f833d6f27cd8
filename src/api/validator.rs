// ==========================================
// 产线排产系统 - 请求字段校验器
// ==========================================
// 职责: 从 JSON 请求体提取字段, 收集全部违规后统一失败
// 红线: 校验在任何写入之前完成, 不产生部分写入
// ==========================================

use crate::api::error::{ApiError, ApiResult, FieldViolation};
use crate::domain::types::ZoomLevel;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{Map, Value};
use uuid::Uuid;

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMTS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// 日期区间端点（纯日期时的补全方式）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    /// 纯日期补全为 00:00:00
    Start,
    /// 纯日期补全为 23:59:59
    End,
}

// ==========================================
// FieldValidator - 字段校验器
// ==========================================
pub struct FieldValidator<'a> {
    body: Option<&'a Map<String, Value>>,
    violations: Vec<FieldViolation>,
}

impl<'a> FieldValidator<'a> {
    pub fn new(body: &'a Value) -> Self {
        let mut validator = Self {
            body: body.as_object(),
            violations: Vec::new(),
        };
        if validator.body.is_none() && !body.is_null() {
            validator.reject("body", "请求体必须为 JSON 对象");
        }
        validator
    }

    /// 记录违规（同一字段只记第一条）
    pub fn reject(&mut self, field: &str, message: impl Into<String>) {
        if self.violations.iter().any(|v| v.field == field) {
            return;
        }
        self.violations.push(FieldViolation {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn has_violation(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }

    /// 取字段原值; 缺失或 null 时记“必填”
    fn present(&mut self, field: &str) -> Option<&'a Value> {
        match self.body.and_then(|b| b.get(field)) {
            Some(Value::Null) | None => {
                self.reject(field, "必填字段");
                None
            }
            Some(v) => Some(v),
        }
    }

    /// 非空字符串
    pub fn required_str(&mut self, field: &str) -> Option<String> {
        match self.present(field)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::String(_) => {
                self.reject(field, "不能为空");
                None
            }
            _ => {
                self.reject(field, "必须为字符串");
                None
            }
        }
    }

    /// UUID 字符串（只校验格式, 不校验存在性）
    pub fn uuid(&mut self, field: &str) -> Option<String> {
        let raw = self.required_str(field)?;
        match Uuid::parse_str(&raw) {
            Ok(_) => Some(raw),
            Err(_) => {
                self.reject(field, "不是合法的 UUID");
                None
            }
        }
    }

    /// 日期 YYYY-MM-DD
    pub fn date(&mut self, field: &str) -> Option<NaiveDate> {
        let raw = self.required_str(field)?;
        match NaiveDate::parse_from_str(&raw, DATE_FMT) {
            Ok(d) => Some(d),
            Err(_) => {
                self.reject(field, "日期格式错误（应为YYYY-MM-DD）");
                None
            }
        }
    }

    /// 日期时间; 纯日期按 bound 补全
    pub fn datetime(&mut self, field: &str, bound: RangeBound) -> Option<NaiveDateTime> {
        let raw = self.required_str(field)?;
        if let Some(dt) = parse_datetime(&raw) {
            return Some(dt);
        }
        if let Ok(d) = NaiveDate::parse_from_str(&raw, DATE_FMT) {
            let time = match bound {
                RangeBound::Start => NaiveTime::MIN,
                RangeBound::End => NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
            };
            return Some(d.and_time(time));
        }
        self.reject(field, "日期时间格式错误（应为YYYY-MM-DD[ HH:MM[:SS]]）");
        None
    }

    /// 整数（接受 JSON 整数或数字字符串）, 闭区间 [min, max]
    pub fn int_in_range(&mut self, field: &str, min: i64, max: i64) -> Option<i64> {
        let value = self.present(field)?;
        let parsed = match value {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        match parsed {
            Some(v) if (min..=max).contains(&v) => Some(v),
            Some(_) => {
                self.reject(field, format!("取值范围为 {}..={}", min, max));
                None
            }
            None => {
                self.reject(field, "必须为整数");
                None
            }
        }
    }

    /// 数值（接受 JSON 数字或数字字符串）
    pub fn number(&mut self, field: &str) -> Option<f64> {
        let value = self.present(field)?;
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match parsed.filter(|v| v.is_finite()) {
            Some(v) => Some(v),
            None => {
                self.reject(field, "必须为数值");
                None
            }
        }
    }

    /// 布尔（接受 true/false、0/1 及其字符串形式）
    pub fn boolean(&mut self, field: &str) -> Option<bool> {
        let value = self.present(field)?;
        let parsed = match value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_i64() {
                Some(0) => Some(false),
                Some(1) => Some(true),
                _ => None,
            },
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        if parsed.is_none() {
            self.reject(field, "必须为布尔值");
        }
        parsed
    }

    /// 时间粒度 hour / quarter
    pub fn zoom_level(&mut self, field: &str) -> Option<ZoomLevel> {
        let raw = self.required_str(field)?;
        let zoom = ZoomLevel::parse(&raw);
        if zoom.is_none() {
            self.reject(field, "只能为 hour 或 quarter");
        }
        zoom
    }

    /// 槽位: hour 0..=23, minute 须与粒度匹配
    pub fn slot_time(&mut self, zoom: Option<ZoomLevel>) -> Option<(u8, u8)> {
        let hour = self.int_in_range("hour", 0, 23);
        let minute = self.int_in_range("minute", 0, 59);
        let (hour, minute) = (hour?, minute?);
        if let Some(zoom) = zoom {
            if !zoom.is_valid_minute(minute) {
                self.reject(
                    "minute",
                    format!("粒度 {} 下分钟只能为 {:?}", zoom, zoom.valid_minutes()),
                );
                return None;
            }
        }
        Some((hour as u8, minute as u8))
    }

    /// 结束校验
    pub fn finish(self, context: &str) -> ApiResult<()> {
        if self.violations.is_empty() {
            return Ok(());
        }
        Err(ApiError::ValidationFailed {
            reason: format!("{}: {} 个字段不合法", context, self.violations.len()),
            violations: self.violations,
        })
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FMTS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}
