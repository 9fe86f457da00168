//! Operator value parsing.
//!
//! Turns one raw filter value (`>10`, `!draft`, `*rust*`, `$yesterday`, ...)
//! into a typed [`Condition`] for a single field.

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::error::ValidationError;
use crate::schema::{FieldDescriptor, FieldType};
use crate::types::{Condition, FieldPath, Scalar, Timezone};

use super::date_interval::{DateIntervalParser, day_start, format_instant};

/// Parses raw filter values against a fixed clock.
#[derive(Debug, Clone, Copy)]
pub struct OperatorValueParser {
    now: DateTime<Utc>,
}

impl Default for OperatorValueParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorValueParser {
    /// Creates a parser using the current time for relative dates.
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Creates a parser with a fixed clock.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// Parses `raw` for `field`, reached through `path`.
    pub fn perform(
        &self,
        field: &FieldDescriptor,
        path: &FieldPath,
        raw: &str,
        tz: &Timezone,
    ) -> Result<Condition, ValidationError> {
        let fail = |message: &str| ValidationError::InvalidFilterValue {
            field: path.to_string(),
            value: raw.to_string(),
            message: message.to_string(),
        };

        match raw {
            "$present" | "!null" => return Ok(Condition::IsNotNull),
            "$blank" | "null" => return Ok(Condition::IsNull),
            _ => {}
        }

        match &field.field_type {
            FieldType::Json => Err(fail("json fields cannot be filtered")),
            FieldType::Date => self.parse_date(raw, tz).ok_or_else(|| fail("expected a date")),
            FieldType::Boolean => match raw {
                "true" => Ok(Condition::Eq(Scalar::Boolean(true))),
                "false" => Ok(Condition::Eq(Scalar::Boolean(false))),
                "!true" => Ok(Condition::Ne(Scalar::Boolean(true))),
                "!false" => Ok(Condition::Ne(Scalar::Boolean(false))),
                _ => Err(fail("expected true or false")),
            },
            field_type => {
                let is_text = matches!(field_type, FieldType::String);
                if let Some(inner) = raw
                    .strip_prefix("!*")
                    .and_then(|rest| rest.strip_suffix('*'))
                {
                    if !is_text {
                        return Err(fail("pattern operators apply to string fields only"));
                    }
                    return Ok(Condition::NotLike(format!("%{}%", escape_like(inner))));
                }
                if let Some(operand) = raw.strip_prefix('!') {
                    return coerce(field_type, operand).map(Condition::Ne).map_err(fail);
                }
                if let Some((op, operand)) = split_comparison(raw) {
                    let value = coerce(field_type, operand).map_err(fail)?;
                    return Ok(op(value));
                }
                if raw.len() > 1 && (raw.starts_with('*') || raw.ends_with('*')) {
                    if !is_text {
                        return Err(fail("pattern operators apply to string fields only"));
                    }
                    return Ok(Condition::Like(like_pattern(raw)));
                }
                coerce(field_type, raw).map(Condition::Eq).map_err(fail)
            }
        }
    }

    fn parse_date(&self, raw: &str, tz: &Timezone) -> Option<Condition> {
        if DateIntervalParser::is_interval(raw) {
            return DateIntervalParser::new(self.now, *tz).parse(raw);
        }

        if let Some(operand) = raw.strip_prefix(">=") {
            return Some(Condition::Gte(lower_bound(operand, tz)?));
        }
        if let Some(operand) = raw.strip_prefix("<=") {
            return Some(match parse_day(operand) {
                Some(day) => Condition::Lt(next_day_start(day, tz)?),
                None => Condition::Lte(parse_instant(operand)?),
            });
        }
        if let Some(operand) = raw.strip_prefix('>') {
            return Some(match parse_day(operand) {
                Some(day) => Condition::Gte(next_day_start(day, tz)?),
                None => Condition::Gt(parse_instant(operand)?),
            });
        }
        if let Some(operand) = raw.strip_prefix('<') {
            return Some(Condition::Lt(lower_bound(operand, tz)?));
        }
        if let Some(operand) = raw.strip_prefix('!') {
            return Some(Condition::Ne(parse_instant(operand)?));
        }
        if let Some((from, to)) = raw.split_once("..") {
            let start = parse_day(from)?;
            let end = parse_day(to)?;
            return Some(Condition::Within {
                start: Scalar::Text(format_instant(day_start(start, tz)?)),
                end: next_day_start(end, tz)?,
            });
        }
        if let Some(day) = parse_day(raw) {
            return Some(Condition::Within {
                start: Scalar::Text(format_instant(day_start(day, tz)?)),
                end: next_day_start(day, tz)?,
            });
        }
        Some(Condition::Eq(parse_instant(raw)?))
    }
}

type ComparisonCtor = fn(Scalar) -> Condition;

fn split_comparison(raw: &str) -> Option<(ComparisonCtor, &str)> {
    let candidates: [(&str, ComparisonCtor); 4] = [
        (">=", Condition::Gte),
        ("<=", Condition::Lte),
        (">", Condition::Gt),
        ("<", Condition::Lt),
    ];
    candidates
        .into_iter()
        .find_map(|(prefix, ctor)| raw.strip_prefix(prefix).map(|rest| (ctor, rest)))
}

fn coerce(field_type: &FieldType, raw: &str) -> Result<Scalar, &'static str> {
    match field_type {
        FieldType::String => Ok(Scalar::text(raw)),
        FieldType::Integer => raw
            .trim()
            .parse::<i64>()
            .map(Scalar::Integer)
            .map_err(|_| "expected an integer"),
        FieldType::Float => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Scalar::Float)
            .ok_or("expected a number"),
        FieldType::Enum(values) => values
            .iter()
            .find(|v| v.as_str() == raw)
            .map(|v| Scalar::text(v.clone()))
            .ok_or("not a declared enum value"),
        FieldType::Uuid => uuid::Uuid::parse_str(raw.trim())
            .map(|u| Scalar::Text(u.to_string()))
            .map_err(|_| "expected a uuid"),
        FieldType::Boolean => raw
            .parse::<bool>()
            .map(Scalar::Boolean)
            .map_err(|_| "expected true or false"),
        FieldType::Date => parse_instant(raw).ok_or("expected a date"),
        FieldType::Json => Err("json fields cannot be filtered"),
    }
}

/// Escapes LIKE wildcards with `\`.
pub(crate) fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn like_pattern(raw: &str) -> String {
    let leading = raw.starts_with('*');
    let trailing = raw.ends_with('*');
    let inner = raw.trim_start_matches('*').trim_end_matches('*');
    format!(
        "{}{}{}",
        if leading { "%" } else { "" },
        escape_like(inner),
        if trailing { "%" } else { "" }
    )
}

fn parse_day(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn parse_instant(raw: &str) -> Option<Scalar> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| Scalar::Text(format_instant(dt.with_timezone(&Utc))))
}

fn next_day_start(day: NaiveDate, tz: &Timezone) -> Option<Scalar> {
    let next = day.checked_add_days(Days::new(1))?;
    Some(Scalar::Text(format_instant(day_start(next, tz)?)))
}

/// Start of a day, or the instant itself.
fn lower_bound(raw: &str, tz: &Timezone) -> Option<Scalar> {
    match parse_day(raw) {
        Some(day) => Some(Scalar::Text(format_instant(day_start(day, tz)?))),
        None => parse_instant(raw),
    }
}
