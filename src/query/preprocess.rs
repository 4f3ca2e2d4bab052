use super::atom::Wildcard;
use super::matcher::eq_fold;
use crate::post::{Post, PostStatus};
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use tracing::warn;

// The optional prefix catches negated directives so they leave no orphan
// `-` or `not:` behind.
static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(-|!|exclude:|remove:|negate:|not:)?\bstatus:(pending|saved|all)\b")
        .expect("valid status directive regex")
});

/// Default upper bound for `per-page:`; the search layer applies its own.
pub const MAX_PER_PAGE: usize = 200;

/// Which review state the candidate set is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusSelector {
    Pending,
    Saved,
    Discarded,
    #[default]
    All,
}

impl StatusSelector {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusSelector::Pending => "pending",
            StatusSelector::Saved => "saved",
            StatusSelector::Discarded => "discarded",
            StatusSelector::All => "all",
        }
    }

    pub fn admits(self, status: PostStatus) -> bool {
        match self {
            StatusSelector::All => true,
            StatusSelector::Pending => status == PostStatus::Pending,
            StatusSelector::Saved => status == PostStatus::Saved,
            StatusSelector::Discarded => status == PostStatus::Discarded,
        }
    }

    fn from_directive(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "pending" => Some(StatusSelector::Pending),
            "saved" => Some(StatusSelector::Saved),
            "all" => Some(StatusSelector::All),
            _ => None,
        }
    }
}

impl fmt::Display for StatusSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field a `sort:` directive orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortField {
    Id,
    Score,
    Width,
    Height,
    TagCount,
    CreatedAt,
    DownloadedAt,
    FileSize,
    Duration,
    Owner,
    Rating,
    MatchScore,
    /// Shuffles; any other listed field still orders the result first.
    Random,
}

impl SortField {
    pub fn from_alias(alias: &str) -> Option<Self> {
        let normalized = alias.trim().to_lowercase().replace(' ', "-");
        Some(match normalized.as_str() {
            "id" | "post-id" | "post_id" => SortField::Id,
            "score" => SortField::Score,
            "width" => SortField::Width,
            "height" => SortField::Height,
            "tags" | "tag-count" | "tag_count" | "tagcount" => SortField::TagCount,
            "upload" | "uploaded" | "created" | "created_at" | "upload-date" | "upload_date" => {
                SortField::CreatedAt
            }
            "download" | "downloaded" | "downloaded_at" | "download-date" | "download_date" => {
                SortField::DownloadedAt
            }
            "size" | "file-size" | "file_size" | "filesize" => SortField::FileSize,
            "duration" | "time" | "length" => SortField::Duration,
            "owner" | "user" | "creator" => SortField::Owner,
            "rating" => SortField::Rating,
            "matches" | "matching-tags" | "matching_tags" => SortField::MatchScore,
            "random" => SortField::Random,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Score => "score",
            SortField::Width => "width",
            SortField::Height => "height",
            SortField::TagCount => "tag_count",
            SortField::CreatedAt => "created_at",
            SortField::DownloadedAt => "downloaded_at",
            SortField::FileSize => "file_size",
            SortField::Duration => "duration",
            SortField::Owner => "owner",
            SortField::Rating => "rating",
            SortField::MatchScore => "matches",
            SortField::Random => "random",
        }
    }

    /// Order used when the directive names no direction: text ascending,
    /// everything else descending.
    pub fn default_order(self) -> SortOrder {
        match self {
            SortField::Owner | SortField::Rating => SortOrder::Ascending,
            _ => SortOrder::Descending,
        }
    }
}

impl Serialize for SortField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Parsed `sort:` directive. One direction applies to every field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortSpec {
    pub fields: Vec<SortField>,
    pub order: Option<SortOrder>,
}

impl SortSpec {
    /// Parses the part after `sort:`. `None` when no known field remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let value = raw.trim_matches(|c| c == '"' || c == '\'');
        let (fields, order) = split_direction(value);

        let separator = if fields.contains(';') { ';' } else { ',' };
        let fields: Vec<SortField> = fields
            .split(separator)
            .filter(|name| !name.trim().is_empty())
            .filter_map(|name| {
                let field = SortField::from_alias(name);
                if field.is_none() {
                    warn!(field = name.trim(), "ignoring unknown sort field");
                }
                field
            })
            .collect();

        (!fields.is_empty()).then_some(SortSpec { fields, order })
    }

    pub fn order_for(&self, field: SortField) -> SortOrder {
        self.order.unwrap_or_else(|| field.default_order())
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, field) in self.fields.iter().enumerate() {
            if idx > 0 {
                f.write_str(";")?;
            }
            f.write_str(field.as_str())?;
        }
        match self.order {
            Some(SortOrder::Ascending) => f.write_str("-asc"),
            Some(SortOrder::Descending) => f.write_str("-desc"),
            None => Ok(()),
        }
    }
}

const DIRECTION_SUFFIXES: [(&str, SortOrder); 8] = [
    ("-descending", SortOrder::Descending),
    ("_descending", SortOrder::Descending),
    ("-ascending", SortOrder::Ascending),
    ("_ascending", SortOrder::Ascending),
    ("-desc", SortOrder::Descending),
    ("_desc", SortOrder::Descending),
    ("-asc", SortOrder::Ascending),
    ("_asc", SortOrder::Ascending),
];

fn split_direction(value: &str) -> (&str, Option<SortOrder>) {
    if let Some(field) = value.strip_suffix('>') {
        return (field, Some(SortOrder::Ascending));
    }
    if let Some(field) = value.strip_prefix('>') {
        return (field, Some(SortOrder::Descending));
    }
    if let Some(field) = value.strip_suffix('<') {
        return (field, Some(SortOrder::Descending));
    }
    if let Some(field) = value.strip_prefix('<') {
        return (field, Some(SortOrder::Ascending));
    }

    let lower = value.to_ascii_lowercase();
    DIRECTION_SUFFIXES
        .iter()
        .find(|(suffix, _)| lower.ends_with(suffix))
        .map_or((value, None), |(suffix, order)| {
            (&value[..value.len() - suffix.len()], Some(*order))
        })
}

/// Presentation directives peeled out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryMetadata {
    pub sort: Option<SortSpec>,
    pub per_page: Option<usize>,
}

/// Result of [`preprocess`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Preprocessed {
    /// Status selector from a `status:` directive, if one was present.
    pub status: Option<StatusSelector>,
    /// Query text with every directive removed; this is what gets parsed.
    pub cleaned_query: String,
    /// Positive tag atoms, for match scoring.
    pub positive_tags: Vec<String>,
    pub metadata: QueryMetadata,
}

/// Peels `status:`, `sort:` and `per-page:` directives off a raw query.
///
/// The selector comes from the first directive without a negation prefix.
/// Negated directives cannot be expressed as a selector; they are removed and
/// otherwise ignored.
pub fn preprocess(query: &str) -> Preprocessed {
    let mut found = false;
    let mut status = None;
    for caps in STATUS_RE.captures_iter(query) {
        found = true;
        if caps.get(1).is_some() {
            warn!(directive = &caps[0], "ignoring negated status directive");
            continue;
        }
        if status.is_none() {
            status = caps
                .get(2)
                .and_then(|m| StatusSelector::from_directive(m.as_str()));
        }
    }

    let without_status = if found {
        collapse_whitespace(&STATUS_RE.replace_all(query, " "))
    } else {
        query.to_string()
    };

    let (cleaned_query, metadata) = extract_metadata(&without_status);

    Preprocessed {
        status,
        cleaned_query,
        positive_tags: extract_positive_tags(query),
        metadata,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_prefix_ci<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    let head = token.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &token[prefix.len()..])
}

fn extract_metadata(query: &str) -> (String, QueryMetadata) {
    let mut metadata = QueryMetadata::default();
    let mut kept = Vec::new();
    let mut removed = false;

    for token in query.split_whitespace() {
        if let Some(value) = strip_prefix_ci(token, "sort:") {
            removed = true;
            if !value.is_empty() {
                metadata.sort = SortSpec::parse(value);
            }
        } else if let Some(value) = strip_prefix_ci(token, "per-page:") {
            removed = true;
            match parse_page_size(value) {
                Some(n) => metadata.per_page = Some(n),
                None => warn!(value = token, "ignoring invalid per-page value"),
            }
        } else {
            kept.push(token);
        }
    }

    let cleaned = if removed {
        kept.join(" ")
    } else {
        query.to_string()
    };
    (cleaned, metadata)
}

/// Reads a `per-page:` value, raised to at least 1. Digit strings too long
/// for a `usize` saturate; the caller clamps to its own maximum.
fn parse_page_size(value: &str) -> Option<usize> {
    let digits = value.strip_prefix('-').unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if value.starts_with('-') {
        return Some(1);
    }
    Some(digits.parse::<usize>().unwrap_or(usize::MAX).max(1))
}

/// Collects the positive tag atoms of a raw query.
///
/// Negated tokens and field atoms other than `tag:` are skipped. Groups are
/// expanded on every OR separator.
pub fn extract_positive_tags(query: &str) -> Vec<String> {
    let mut tags = Vec::new();

    for token in query.split_whitespace() {
        if token.starts_with(['-', '!']) {
            continue;
        }
        let stripped: String = token.chars().filter(|c| !matches!(c, '(' | ')')).collect();

        for piece in stripped.split(['|', '~', ',']) {
            let atom = if piece.contains(':') {
                match strip_prefix_ci(piece, "tag:") {
                    Some(rest) => rest,
                    None => continue,
                }
            } else {
                piece
            };
            if atom.is_empty() || atom.starts_with(['-', '!']) {
                continue;
            }
            tags.push(atom.to_string());
        }
    }

    tags
}

#[derive(Debug, Clone)]
enum TagPattern {
    Exact(String),
    Wildcard(Wildcard),
}

impl TagPattern {
    fn is_match(&self, tag: &str) -> bool {
        match self {
            TagPattern::Exact(expected) => eq_fold(tag, expected),
            TagPattern::Wildcard(wildcard) => wildcard.is_match(tag),
        }
    }
}

/// Counts how many of a post's tags hit any positive tag atom.
#[derive(Debug, Clone, Default)]
pub struct TagScorer {
    patterns: Vec<TagPattern>,
}

impl TagScorer {
    pub fn new(positive_tags: &[String]) -> Self {
        let patterns = positive_tags
            .iter()
            .filter_map(|atom| {
                if atom.contains('*') {
                    Wildcard::compile(atom).ok().map(TagPattern::Wildcard)
                } else {
                    Some(TagPattern::Exact(atom.clone()))
                }
            })
            .collect();
        TagScorer { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn score(&self, post: &Post) -> usize {
        post.tags
            .iter()
            .filter(|tag| self.patterns.iter().any(|pattern| pattern.is_match(tag)))
            .count()
    }
}
