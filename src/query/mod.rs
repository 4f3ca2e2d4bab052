//! Advanced search query engine
//!
//! A query string goes through three stages: [`preprocess`] peels reserved
//! directives off the text, [`parse_query`] turns what is left into an AST,
//! and [`matches`] evaluates that AST against a post.
//!
//! # Syntax
//!
//! ```text
//! red_hair               Post has the tag (case-insensitive)
//! *_girl                 Wildcard tag; `*` matches any run of characters
//! -blonde  !blonde       Negation; also exclude:, remove:, negate:, not:
//! a b                    Whitespace at top level is AND
//! (a|b)  (a~b)  (a,b)    OR inside a group; groups nest
//! field:value            Field filter, see below
//! ```
//!
//! # Fields
//!
//! - `tag:` - explicit tag, for values that look like a field or negation
//! - `owner:` / `user:` / `creator:` / `author:` - uploader
//! - `title:`, `rating:`, `status:`
//! - `file_type:` / `type:` / `ext:` / `extension:` / `filetype:` - leading dots ignored
//! - `score:`, `width:`, `height:`, `id:`, `tag_count:` - integers with `>`, `>=`, `<`, `<=`, `=`
//! - `size:` / `file_size:` - bytes, with an optional unit: `size:>5mb`, `size:<=1.5gb`
//! - `duration:`, `ratio:` / `aspect_ratio:` - decimals; `ratio:>1.5` is wider than 3:2
//! - `matches:` - how many of the post's tags hit the query's positive tag filters
//! - `created_at:` / `uploaded:`, `downloaded_at:` / `downloaded:` - dates with the same operators
//!
//! # Directives
//!
//! ```text
//! status:pending|saved|all    Selects the candidate set; never reaches the parser
//! sort:score-desc             Result ordering; `sort:random` shuffles
//! per-page:100                Page size, clamped by the search layer
//! ```
//!
//! # Examples
//!
//! ```text
//! girl red_hair -blonde
//! (cat|dog) owner:artist* score:>=100
//! type:mp4 width:>=1920 rating:s
//! status:saved uploaded:>=2024-01-01 sort:uploaded
//! ```

pub mod ast;
pub mod atom;
pub mod cache;
pub mod error;
pub mod matcher;
pub mod parser;
pub mod preprocess;
pub mod tokenizer;

pub use ast::Node;
pub use atom::{
    CompareOp, DateBound, Decimal, Filter, FilterKey, FilterValue, OperandKind, Wildcard,
    parse_atom,
};
pub use cache::ParseCache;
pub use error::{ErrorKind, ParenImbalance, QueryError};
pub use matcher::matches;
pub use parser::{ParseResult, QueryOptions, parse_query, parse_query_with, parse_tokens};
pub use preprocess::{
    Preprocessed, QueryMetadata, SortField, SortOrder, SortSpec, StatusSelector, TagScorer,
    extract_positive_tags, preprocess,
};
pub use tokenizer::{Token, WhitespaceMode, tokenize};
