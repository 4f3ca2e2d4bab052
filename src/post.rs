use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostLoadError {
    #[error("Failed to read posts file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse posts file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: json5::Error,
    },
}

/// Review state of a scraped post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Pending,
    Saved,
    Discarded,
}

impl PostStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Saved => "saved",
            PostStatus::Discarded => "discarded",
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamp as the backend stores it: Unix seconds or a formatted string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostTime {
    Unix(i64),
    Text(String),
}

impl PostTime {
    /// Interprets the stored value as a UTC wall-clock time.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        match self {
            PostTime::Unix(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
            PostTime::Text(raw) => parse_post_time(raw.trim()),
        }
    }
}

fn parse_post_time(raw: &str) -> Option<NaiveDateTime> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.naive_utc())
}

/// A post record as delivered by the gallery backend.
///
/// Every field is optional on the wire; missing or `null` values fall back to
/// the empty string, zero, or `pending`. Fields the query engine does not read
/// are kept in `extra` and written back out unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub owner: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub width: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub height: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rating: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: PostStatus,
    /// Bytes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub file_size: i64,
    /// Seconds, for videos.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<PostTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<PostTime>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Post {
    pub fn new(id: i64) -> Self {
        Post {
            id,
            ..Post::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner = owner.to_string();
        self
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = score;
        self
    }

    pub fn with_size(mut self, width: i64, height: i64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_rating(mut self, rating: &str) -> Self {
        self.rating = rating.to_string();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_file_type(mut self, file_type: &str) -> Self {
        self.file_type = file_type.to_string();
        self
    }

    pub fn with_status(mut self, status: PostStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_file_size(mut self, bytes: i64) -> Self {
        self.file_size = bytes;
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    /// `width / height`, or `None` when the height is unknown.
    pub fn aspect_ratio(&self) -> Option<f64> {
        (self.height > 0).then(|| self.width as f64 / self.height as f64)
    }

    pub fn with_created_at(mut self, created_at: PostTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_downloaded_at(mut self, downloaded_at: PostTime) -> Self {
        self.downloaded_at = Some(downloaded_at);
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireTags {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<WireTags>::deserialize(deserializer)? {
        Some(WireTags::List(tags)) => tags,
        Some(WireTags::Joined(joined)) => joined.split_whitespace().map(str::to_string).collect(),
        None => Vec::new(),
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PostsFile {
    List(Vec<Post>),
    Wrapped { posts: Vec<Post> },
}

/// Parses a JSON (or JSON5) document holding either an array of posts or an
/// object with a `posts` array.
pub fn parse_posts(raw: &str) -> Result<Vec<Post>, json5::Error> {
    Ok(match json5::from_str::<PostsFile>(raw)? {
        PostsFile::List(posts) => posts,
        PostsFile::Wrapped { posts } => posts,
    })
}

pub fn load_posts(path: &Path) -> Result<Vec<Post>, PostLoadError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| PostLoadError::Read {
        path: path_display.clone(),
        source,
    })?;

    parse_posts(&raw).map_err(|source| PostLoadError::Parse {
        path: path_display,
        source,
    })
}
