use super::error::QueryError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::{Regex, RegexBuilder};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Prefixes that negate an atom. Only the first matching prefix is stripped.
pub const NEGATION_PREFIXES: [&str; 6] = ["-", "!", "exclude:", "remove:", "negate:", "not:"];

static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^([A-Za-z_]+):(.+)$").expect("valid field regex"));
static OPERATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^([<>]=?|=)?(.+)$").expect("valid operator regex"));
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(?:\.[0-9]+)?|\.[0-9]+)([A-Za-z]*)$").expect("valid size regex")
});

const DATETIME_FORMATS: [&str; 10] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m-%d-%Y %H:%M:%S",
    "%m-%d-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
];
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d", "%Y/%m/%d", "%m-%d-%Y", "%m/%d/%Y", "%d-%m-%Y", "%d/%m/%Y",
];

/// The post attribute a filter inspects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Tag,
    Owner,
    Title,
    Rating,
    FileType,
    Status,
    Score,
    Width,
    Height,
    Id,
    TagCount,
    /// File size in bytes; operands accept `b`, `kb`, `mb`, `gb` and `tb` units.
    FileSize,
    /// Seconds. Posts without a duration never match.
    Duration,
    /// `width / height`. Posts with no height never match.
    AspectRatio,
    /// Number of the post's tags hit by a positive tag filter of the same query.
    MatchingTags,
    CreatedAt,
    DownloadedAt,
    /// Any other field name. Never matches a post.
    Other(String),
}

impl FilterKey {
    /// Normalizes a field name and its aliases, case-insensitively.
    pub fn from_field(name: &str) -> Self {
        let lower = name.to_lowercase();
        match lower.as_str() {
            "tag" => FilterKey::Tag,
            "owner" | "user" | "creator" | "author" => FilterKey::Owner,
            "title" => FilterKey::Title,
            "rating" => FilterKey::Rating,
            "file_type" | "type" | "ext" | "extension" | "filetype" => FilterKey::FileType,
            "status" => FilterKey::Status,
            "score" => FilterKey::Score,
            "width" => FilterKey::Width,
            "height" => FilterKey::Height,
            "id" | "post_id" => FilterKey::Id,
            "tag_count" | "tagcount" | "tags" => FilterKey::TagCount,
            "file_size" | "filesize" | "size" => FilterKey::FileSize,
            "duration" => FilterKey::Duration,
            "aspect_ratio" | "aspectratio" | "ratio" => FilterKey::AspectRatio,
            "matching_tags" | "matchingtags" | "matches" => FilterKey::MatchingTags,
            "created_at" | "datecreated" | "uploaded" | "upload_date" => FilterKey::CreatedAt,
            "downloaded_at" | "datedownloaded" | "downloaded" | "download_date" => {
                FilterKey::DownloadedAt
            }
            _ => FilterKey::Other(lower),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FilterKey::Tag => "tag",
            FilterKey::Owner => "owner",
            FilterKey::Title => "title",
            FilterKey::Rating => "rating",
            FilterKey::FileType => "file_type",
            FilterKey::Status => "status",
            FilterKey::Score => "score",
            FilterKey::Width => "width",
            FilterKey::Height => "height",
            FilterKey::Id => "id",
            FilterKey::TagCount => "tag_count",
            FilterKey::FileSize => "file_size",
            FilterKey::Duration => "duration",
            FilterKey::AspectRatio => "aspect_ratio",
            FilterKey::MatchingTags => "matching_tags",
            FilterKey::CreatedAt => "created_at",
            FilterKey::DownloadedAt => "downloaded_at",
            FilterKey::Other(name) => name,
        }
    }

    /// How the operand of this field is read.
    pub fn operand_kind(&self) -> OperandKind {
        match self {
            FilterKey::Score
            | FilterKey::Width
            | FilterKey::Height
            | FilterKey::Id
            | FilterKey::TagCount
            | FilterKey::MatchingTags => OperandKind::Integer,
            FilterKey::FileSize => OperandKind::Bytes,
            FilterKey::Duration | FilterKey::AspectRatio => OperandKind::Decimal,
            FilterKey::CreatedAt | FilterKey::DownloadedAt => OperandKind::Date,
            _ => OperandKind::Text,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.operand_kind(),
            OperandKind::Integer | OperandKind::Bytes | OperandKind::Decimal
        )
    }

    pub fn is_date(&self) -> bool {
        self.operand_kind() == OperandKind::Date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    Text,
    Integer,
    /// Integer byte count, optionally written with a unit.
    Bytes,
    Decimal,
    Date,
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FilterKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Comparison a filter applies to its projected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
    /// Wildcard match of a numeric field's decimal form.
    Pattern,
}

impl CompareOp {
    fn from_symbol(symbol: Option<&str>) -> Self {
        match symbol {
            Some(">") => CompareOp::Gt,
            Some(">=") => CompareOp::Ge,
            Some("<") => CompareOp::Lt,
            Some("<=") => CompareOp::Le,
            _ => CompareOp::Eq,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Pattern => "pattern",
        }
    }

    /// Applies the operator to an ordered pair `(actual, expected)`.
    pub fn compare<T: PartialOrd>(self, actual: T, expected: T) -> bool {
        match self {
            CompareOp::Eq => actual == expected,
            CompareOp::Gt => actual > expected,
            CompareOp::Ge => actual >= expected,
            CompareOp::Lt => actual < expected,
            CompareOp::Le => actual <= expected,
            CompareOp::Pattern => false,
        }
    }
}

impl Serialize for CompareOp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.symbol())
    }
}

/// A date operand. Date-only bounds compare calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateBound {
    pub at: NaiveDateTime,
    pub has_time: bool,
}

impl fmt::Display for DateBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_time {
            write!(f, "{}", self.at.format("%Y-%m-%dT%H:%M:%S"))
        } else {
            write!(f, "{}", self.at.format("%Y-%m-%d"))
        }
    }
}

impl DateBound {
    pub fn parse(raw: &str) -> Option<Self> {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            let secs: i64 = raw.parse().ok()?;
            let at = DateTime::from_timestamp(secs, 0)?.naive_utc();
            return Some(DateBound { at, has_time: true });
        }

        for format in DATETIME_FORMATS {
            if let Ok(at) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(DateBound { at, has_time: true });
            }
        }

        DATE_FORMATS.iter().find_map(|format| {
            let date = NaiveDate::parse_from_str(raw, format).ok()?;
            Some(DateBound {
                at: date.and_hms_opt(0, 0, 0)?,
                has_time: false,
            })
        })
    }
}

/// A finite floating-point operand.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Decimal(f64);

// NaN and infinities are rejected on construction.
impl Eq for Decimal {}

impl Decimal {
    pub fn new(value: f64) -> Option<Self> {
        value.is_finite().then_some(Decimal(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0)
    }
}

/// The operand of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    /// Text operand, also used for wildcard sources on numeric fields.
    Text(String),
    /// Integers, and file sizes already converted to bytes.
    Integer(i64),
    Decimal(Decimal),
    #[serde(serialize_with = "serialize_display")]
    Date(DateBound),
}

impl FilterValue {
    pub(crate) fn has_whitespace(&self) -> bool {
        matches!(self, FilterValue::Text(text) if text.contains(char::is_whitespace))
    }
}

fn serialize_display<T: fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// A `*` pattern compiled into an anchored, case-insensitive regex.
#[derive(Debug, Clone)]
pub struct Wildcard {
    source: String,
    regex: Regex,
}

impl Wildcard {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let mut expr = String::with_capacity(pattern.len() + 4);
        expr.push('^');
        for ch in pattern.chars() {
            if ch == '*' {
                expr.push_str(".*");
            } else {
                let mut buf = [0u8; 4];
                expr.push_str(&regex::escape(ch.encode_utf8(&mut buf)));
            }
        }
        expr.push('$');

        let regex = RegexBuilder::new(&expr)
            .case_insensitive(true)
            .dot_matches_new_line(true)
            .build()?;
        Ok(Wildcard {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.regex.is_match(candidate)
    }

    /// The wildcard as the user wrote it.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl PartialEq for Wildcard {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Wildcard {}

impl Serialize for Wildcard {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.regex.as_str())
    }
}

/// Leaf predicate of the query AST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub key: FilterKey,
    pub value: FilterValue,
    pub negated: bool,
    pub operator: CompareOp,
    #[serde(rename = "regex")]
    pub wildcard: Option<Wildcard>,
}

impl Filter {
    /// A positive, exact tag filter.
    pub fn tag(value: &str) -> Self {
        Filter {
            key: FilterKey::Tag,
            value: FilterValue::Text(value.to_string()),
            negated: false,
            operator: CompareOp::Eq,
            wildcard: None,
        }
    }

    /// Returns the same filter with its polarity flipped.
    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

/// Splits a leading negation prefix off `atom`.
pub fn strip_negation(atom: &str) -> (bool, &str) {
    NEGATION_PREFIXES
        .iter()
        .find_map(|prefix| atom.strip_prefix(prefix))
        .map_or((false, atom), |rest| (true, rest))
}

/// Builds a filter from a single atom such as `-owner:artist*` or `score:>=10`.
pub fn parse_atom(token: &str) -> Result<Filter, QueryError> {
    let (negated, core) = strip_negation(token.trim());
    if core.is_empty() {
        return Err(QueryError::invalid_atom(token, "empty filter"));
    }

    let (key, raw_value) = match FIELD_RE.captures(core) {
        Some(caps) => {
            let field = caps.get(1).map_or("", |m| m.as_str());
            let value = caps.get(2).map_or("", |m| m.as_str());
            (FilterKey::from_field(field), value)
        }
        None => (FilterKey::Tag, core),
    };

    let (operator, value, wildcard) = match key.operand_kind() {
        OperandKind::Integer => parse_numeric(token, &key, raw_value)?,
        OperandKind::Bytes => parse_bytes(token, &key, raw_value)?,
        OperandKind::Decimal => parse_decimal(&key, raw_value)?,
        OperandKind::Date => parse_date(token, raw_value)?,
        OperandKind::Text => {
            let text = if key == FilterKey::FileType {
                raw_value.trim_start_matches('.')
            } else {
                raw_value
            };
            if text.is_empty() {
                return Err(QueryError::invalid_atom(token, "empty value"));
            }
            let wildcard = compile_if_wildcard(token, text)?;
            (CompareOp::Eq, FilterValue::Text(text.to_string()), wildcard)
        }
    };

    Ok(Filter {
        key,
        value,
        negated,
        operator,
        wildcard,
    })
}

type Classified = (CompareOp, FilterValue, Option<Wildcard>);

fn split_operator(raw: &str) -> (Option<&str>, &str) {
    match OPERATOR_RE.captures(raw) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()),
            caps.get(2).map_or(raw, |m| m.as_str()),
        ),
        None => (None, raw),
    }
}

fn parse_numeric(token: &str, key: &FilterKey, raw: &str) -> Result<Classified, QueryError> {
    let (symbol, number) = split_operator(raw);

    if number.contains('*') {
        let wildcard = compile_if_wildcard(token, number)?;
        return Ok((
            CompareOp::Pattern,
            FilterValue::Text(number.to_string()),
            wildcard,
        ));
    }

    let parsed: i64 = number.parse().map_err(|_| invalid_number(key, number))?;
    Ok((CompareOp::from_symbol(symbol), FilterValue::Integer(parsed), None))
}

fn invalid_number(key: &FilterKey, value: &str) -> QueryError {
    QueryError::InvalidNumeric {
        field: key.as_str().to_string(),
        value: value.to_string(),
    }
}

fn parse_bytes(token: &str, key: &FilterKey, raw: &str) -> Result<Classified, QueryError> {
    let (symbol, amount) = split_operator(raw);
    if amount.contains('*') {
        return parse_numeric(token, key, raw);
    }

    let caps = SIZE_RE.captures(amount).ok_or_else(|| invalid_number(key, amount))?;
    let number: f64 = caps[1].parse().map_err(|_| invalid_number(key, amount))?;
    let unit = caps.get(2).map_or("", |m| m.as_str()).to_ascii_lowercase();
    let multiplier = size_multiplier(&unit)
        .ok_or_else(|| QueryError::invalid_atom(token, format!("unknown size unit '{unit}'")))?;

    let bytes = (number * multiplier as f64).trunc();
    if !bytes.is_finite() || bytes >= i64::MAX as f64 {
        return Err(invalid_number(key, amount));
    }
    Ok((CompareOp::from_symbol(symbol), FilterValue::Integer(bytes as i64), None))
}

fn size_multiplier(unit: &str) -> Option<u64> {
    Some(match unit {
        "" | "b" | "byte" | "bytes" => 1,
        "kb" | "kilobyte" | "kilobytes" => 1 << 10,
        "mb" | "megabyte" | "megabytes" => 1 << 20,
        "gb" | "gigabyte" | "gigabytes" => 1 << 30,
        "tb" | "terabyte" | "terabytes" => 1 << 40,
        _ => return None,
    })
}

fn parse_decimal(key: &FilterKey, raw: &str) -> Result<Classified, QueryError> {
    let (symbol, number) = split_operator(raw);
    let value = number
        .parse::<f64>()
        .ok()
        .and_then(Decimal::new)
        .ok_or_else(|| invalid_number(key, number))?;
    Ok((CompareOp::from_symbol(symbol), FilterValue::Decimal(value), None))
}

fn parse_date(token: &str, raw: &str) -> Result<Classified, QueryError> {
    let (symbol, operand) = split_operator(raw);
    let bound = DateBound::parse(operand)
        .ok_or_else(|| QueryError::invalid_atom(token, format!("unrecognized date '{operand}'")))?;
    Ok((CompareOp::from_symbol(symbol), FilterValue::Date(bound), None))
}

fn compile_if_wildcard(token: &str, value: &str) -> Result<Option<Wildcard>, QueryError> {
    if !value.contains('*') {
        return Ok(None);
    }
    Wildcard::compile(value)
        .map(Some)
        .map_err(|e| QueryError::invalid_atom(token, e.to_string()))
}

/// True when a bare tag value would not read back as a plain tag.
pub(crate) fn needs_tag_prefix(value: &str) -> bool {
    strip_negation(value).0 || FIELD_RE.is_match(value)
}
