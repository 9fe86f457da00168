//! Request parameters for a listing.
//!
//! [`ListParams`] is the typed form of a "list records" request. It is built
//! once per request (by an HTTP layer or the `hlist` binary) and read-only
//! for the rest of the pipeline.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Parameters of a single listing request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ListParams {
    /// Requested fields, keyed by entity or association name (`"id,name"`).
    pub fields: BTreeMap<String, String>,

    /// Filters: field path (`field` or `association:field`) to comma-separated values.
    pub filter: BTreeMap<String, String>,

    /// How filter conditions are combined (`and` or `or`, default `and`).
    pub filter_type: Option<String>,

    /// Free-text search term.
    pub search: Option<String>,

    /// Also search the string fields of associated entities.
    pub search_extended: bool,

    /// Raw passthrough query whose result restricts the listing by primary key.
    pub query: Option<String>,

    /// Sort field, `-` prefixed for descending, `association.field` for joins.
    pub sort: Option<String>,

    /// Page selection.
    pub page: PageParams,

    /// Client timezone as a UTC offset (`+02:00`, `-0530`, `Z`, `UTC`).
    pub timezone: Option<String>,

    /// Name of the segment to apply.
    pub segment: Option<String>,
}

impl ListParams {
    /// Creates empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the requested fields for an entity or association.
    pub fn with_fields(mut self, entity: impl Into<String>, fields: impl Into<String>) -> Self {
        self.fields.insert(entity.into(), fields.into());
        self
    }

    /// Adds a filter.
    pub fn with_filter(mut self, key: impl Into<String>, values: impl Into<String>) -> Self {
        self.filter.insert(key.into(), values.into());
        self
    }

    /// Sets the filter combination operator.
    pub fn with_filter_type(mut self, filter_type: impl Into<String>) -> Self {
        self.filter_type = Some(filter_type.into());
        self
    }

    /// Sets the search term.
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    /// Sets the raw passthrough query.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    /// Sets the sort specification.
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Sets the page number and size.
    pub fn with_page(mut self, number: u64, size: u64) -> Self {
        self.page = PageParams {
            number: Some(number),
            size: Some(size),
        };
        self
    }

    /// Sets the timezone.
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Sets the segment name.
    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }

    /// Returns the search term, if present and not blank.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Returns the trimmed raw query, if present and not blank.
    pub fn live_query(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Parses the filter combination operator.
    pub fn combination(&self) -> Result<FilterType, ValidationError> {
        match self.filter_type.as_deref() {
            None => Ok(FilterType::And),
            Some(raw) => FilterType::parse(raw),
        }
    }

    /// Parses the timezone, defaulting to UTC.
    pub fn tz(&self) -> Result<Timezone, ValidationError> {
        match self.timezone.as_deref() {
            None => Ok(Timezone::utc()),
            Some(raw) => Timezone::parse(raw),
        }
    }
}

/// Page selection; both values are optional and defaulted by the assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    /// 1-based page number.
    pub number: Option<u64>,
    /// Page size.
    pub size: Option<u64>,
}

/// How filter conditions are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    /// Every condition must hold.
    #[default]
    And,
    /// Any condition may hold.
    Or,
}

impl FilterType {
    /// Parses `and` / `or`, case-insensitively.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(FilterType::And),
            "or" => Ok(FilterType::Or),
            _ => Err(ValidationError::InvalidFilterType {
                filter_type: raw.to_string(),
            }),
        }
    }
}

/// A client timezone, expressed as a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timezone(FixedOffset);

impl Timezone {
    /// UTC.
    pub fn utc() -> Self {
        Timezone(Utc.fix())
    }

    /// Wraps an offset.
    pub fn from_offset(offset: FixedOffset) -> Self {
        Timezone(offset)
    }

    /// Parses `Z`, `UTC`, `+HH:MM`, `-HH:MM`, `+HHMM` or `+HH`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidTimezone {
            timezone: raw.to_string(),
        };
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("z")
            || trimmed.eq_ignore_ascii_case("utc")
        {
            return Ok(Self::utc());
        }

        let (sign, rest) = match trimmed.as_bytes()[0] {
            b'+' => (1, &trimmed[1..]),
            b'-' => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };
        let digits: String = rest.chars().filter(|c| *c != ':').collect();
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let (hours, minutes) = match digits.len() {
            2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
            4 => (
                digits[..2].parse::<i32>().map_err(|_| invalid())?,
                digits[2..].parse::<i32>().map_err(|_| invalid())?,
            ),
            _ => return Err(invalid()),
        };
        if hours > 14 || minutes > 59 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Timezone)
            .ok_or_else(invalid)
    }

    /// The underlying offset.
    pub fn offset(&self) -> FixedOffset {
        self.0
    }
}

impl Default for Timezone {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_type_parse() {
        assert_eq!(FilterType::parse("and").unwrap(), FilterType::And);
        assert_eq!(FilterType::parse("OR").unwrap(), FilterType::Or);
        assert!(matches!(
            FilterType::parse("xor"),
            Err(ValidationError::InvalidFilterType { .. })
        ));
    }

    #[test]
    fn test_combination_defaults_to_and() {
        assert_eq!(ListParams::new().combination().unwrap(), FilterType::And);
    }

    #[test]
    fn test_timezone_parse() {
        assert_eq!(Timezone::parse("Z").unwrap(), Timezone::utc());
        assert_eq!(Timezone::parse("UTC").unwrap(), Timezone::utc());
        assert_eq!(
            Timezone::parse("+02:00").unwrap().offset().local_minus_utc(),
            7200
        );
        assert_eq!(
            Timezone::parse("-0530").unwrap().offset().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
        assert_eq!(Timezone::parse("+09").unwrap().offset().local_minus_utc(), 9 * 3600);
    }

    #[test]
    fn test_timezone_parse_invalid() {
        assert!(Timezone::parse("Europe/Paris").is_err());
        assert!(Timezone::parse("+2").is_err());
        assert!(Timezone::parse("+25:00").is_err());
        assert!(Timezone::parse("+ab:cd").is_err());
    }

    #[test]
    fn test_blank_search_and_query_are_absent() {
        let params = ListParams::new().with_search("   ").with_query("\n ");
        assert_eq!(params.search_term(), None);
        assert_eq!(params.live_query(), None);

        let params = ListParams::new().with_query("  SELECT id FROM articles ");
        assert_eq!(params.live_query(), Some("SELECT id FROM articles"));
    }

    #[test]
    fn test_params_deserialize_camel_case() {
        let json = serde_json::json!({
            "fields": {"Article": "title"},
            "filter": {"status": "published,draft"},
            "filterType": "or",
            "searchExtended": true,
            "page": {"number": 2, "size": 5}
        });
        let params: ListParams = serde_json::from_value(json).unwrap();
        assert_eq!(params.filter_type.as_deref(), Some("or"));
        assert!(params.search_extended);
        assert_eq!(params.page.size, Some(5));
    }
}
