use crate::config::EngineConfig;
use crate::post::{Post, PostTime};
use crate::query::{
    Node, ParseCache, ParseResult, Preprocessed, SortField, SortOrder, SortSpec, StatusSelector,
    TagScorer, preprocess,
};
use colored::Colorize;
use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use serde_json::json;
use std::cmp::{Ordering, Reverse};
use std::fmt::Write;
use std::sync::Arc;
use tracing::{debug, info};

const CHUNK_SIZE: usize = 2048;

/// Caller-side knobs for [`search_posts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOptions {
    /// Candidate set used when the query carries no `status:` directive.
    pub status: StatusSelector,
    /// 1-based page number.
    pub page: usize,
    /// Page size used when the query carries no `per-page:` directive.
    pub per_page: usize,
    pub max_per_page: usize,
    /// Order by match score when no `sort:` directive is present.
    pub by_matches: bool,
    pub strict_on_error: bool,
    pub progress_threshold: usize,
    /// Part of the parse cache key; bump it when the post set changes.
    pub dataset_version: u64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SearchOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            status: config.search.default_status,
            page: 1,
            per_page: config.search.default_per_page,
            max_per_page: config.search.max_per_page,
            by_matches: false,
            strict_on_error: config.query.strict_on_error,
            progress_threshold: config.search.progress_threshold,
            dataset_version: 0,
        }
    }

    pub fn status(mut self, status: StatusSelector) -> Self {
        self.status = status;
        self
    }

    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn by_matches(mut self, by_matches: bool) -> Self {
        self.by_matches = by_matches;
        self
    }

    pub fn strict_on_error(mut self, strict: bool) -> Self {
        self.strict_on_error = strict;
        self
    }

    pub fn dataset_version(mut self, version: u64) -> Self {
        self.dataset_version = version;
        self
    }
}

/// A matching post: its index in the input slice and its match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHit {
    pub index: usize,
    pub match_score: usize,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub preprocessed: Preprocessed,
    /// Status selector actually applied.
    pub status: StatusSelector,
    pub parse: Arc<ParseResult>,
    /// Posts admitted by the status selector.
    pub candidates: usize,
    pub total_matches: usize,
    pub page: usize,
    pub per_page: usize,
    /// Hits on the requested page, in display order.
    pub hits: Vec<SearchHit>,
}

impl SearchOutcome {
    pub fn page_count(&self) -> usize {
        self.total_matches.div_ceil(self.per_page.max(1))
    }
}

/// Runs a raw query over `posts`: directives, status restriction, parse,
/// evaluation, ordering and paging.
pub fn search_posts(
    posts: &[Post],
    raw_query: &str,
    options: &SearchOptions,
    cache: &mut ParseCache,
) -> SearchOutcome {
    let preprocessed = preprocess(raw_query);
    let status = preprocessed.status.unwrap_or(options.status);

    let candidates: Vec<usize> = posts
        .iter()
        .enumerate()
        .filter_map(|(idx, post)| status.admits(post.status).then_some(idx))
        .collect();

    let parse = cache.get_or_parse(&preprocessed.cleaned_query, options.dataset_version);

    let matched = if options.strict_on_error && parse.is_total_failure() {
        info!(query = raw_query, "every filter failed to parse; matching nothing");
        Vec::new()
    } else {
        collect_match_indices(posts, &candidates, &parse.root, options.progress_threshold)
    };

    let scorer = TagScorer::new(&preprocessed.positive_tags);
    let mut hits: Vec<SearchHit> = matched
        .into_iter()
        .map(|index| SearchHit {
            index,
            match_score: scorer.score(&posts[index]),
        })
        .collect();

    if let Some(sort) = &preprocessed.metadata.sort {
        sort_hits(posts, &mut hits, sort);
    } else if options.by_matches {
        hits.sort_by_key(|hit| Reverse(hit.match_score));
    }

    let total_matches = hits.len();
    let per_page = preprocessed
        .metadata
        .per_page
        .unwrap_or(options.per_page)
        .clamp(1, options.max_per_page.max(1));
    let page = options.page.max(1);
    let hits: Vec<SearchHit> = hits
        .into_iter()
        .skip((page - 1).saturating_mul(per_page))
        .take(per_page)
        .collect();

    debug!(
        candidates = candidates.len(),
        matches = total_matches,
        page = page,
        per_page = per_page,
        "search finished"
    );

    SearchOutcome {
        preprocessed,
        status,
        parse,
        candidates: candidates.len(),
        total_matches,
        page,
        per_page,
        hits,
    }
}

/// Evaluates `root` over the candidate indices, preserving input order.
pub fn collect_match_indices(
    posts: &[Post],
    candidates: &[usize],
    root: &Node,
    progress_threshold: usize,
) -> Vec<usize> {
    let progress = if candidates.len() > progress_threshold {
        let bar = ProgressBar::new(candidates.len() as u64);
        if let Ok(style) = ProgressStyle::with_template("{bar:40} {pos}/{len} posts") {
            bar.set_style(style);
        }
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut matched = Vec::new();
    for chunk in candidates.chunks(CHUNK_SIZE) {
        matched.extend(chunk.iter().copied().filter(|&idx| root.matches(&posts[idx])));
        progress.inc(chunk.len() as u64);
    }
    progress.finish_and_clear();

    matched
}

fn sort_hits(posts: &[Post], hits: &mut [SearchHit], sort: &SortSpec) {
    // The stable sort below keeps the shuffled order between equal keys.
    if sort.fields.contains(&SortField::Random) {
        hits.shuffle(&mut rand::thread_rng());
    }
    hits.sort_by(|a, b| {
        sort.fields
            .iter()
            .map(|&field| {
                let ordering = compare_field(field, a, b, posts);
                match sort.order_for(field) {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

fn compare_field(field: SortField, a: &SearchHit, b: &SearchHit, posts: &[Post]) -> Ordering {
    let (pa, pb) = (&posts[a.index], &posts[b.index]);
    match field {
        SortField::Id => pa.id.cmp(&pb.id),
        SortField::Score => pa.score.cmp(&pb.score),
        SortField::Width => pa.width.cmp(&pb.width),
        SortField::Height => pa.height.cmp(&pb.height),
        SortField::TagCount => pa.tags.len().cmp(&pb.tags.len()),
        SortField::CreatedAt => time_key(pa.created_at.as_ref()).cmp(&time_key(pb.created_at.as_ref())),
        SortField::DownloadedAt => {
            time_key(pa.downloaded_at.as_ref()).cmp(&time_key(pb.downloaded_at.as_ref()))
        }
        SortField::FileSize => pa.file_size.cmp(&pb.file_size),
        SortField::Duration => pa
            .duration
            .partial_cmp(&pb.duration)
            .unwrap_or(Ordering::Equal),
        SortField::Owner => pa.owner.to_lowercase().cmp(&pb.owner.to_lowercase()),
        SortField::Rating => pa.rating.to_lowercase().cmp(&pb.rating.to_lowercase()),
        SortField::MatchScore => a.match_score.cmp(&b.match_score),
        SortField::Random => Ordering::Equal,
    }
}

fn time_key(time: Option<&PostTime>) -> Option<chrono::NaiveDateTime> {
    time.and_then(PostTime::to_naive)
}

fn truncate_tags(tags: &[String], max_chars: usize) -> String {
    let joined = tags.join(" ");
    if joined.chars().count() <= max_chars {
        return joined;
    }
    let mut out: String = joined.chars().take(max_chars.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

pub fn format_search_text(posts: &[Post], outcome: &SearchOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "SEARCH matched {} of {} post{} (status: {})",
        outcome.total_matches,
        outcome.candidates,
        if outcome.candidates == 1 { "" } else { "s" },
        outcome.status
    );

    if !outcome.preprocessed.cleaned_query.is_empty() {
        let _ = writeln!(out, "Query: {}", outcome.parse.root);
    }
    if let Some(sort) = &outcome.preprocessed.metadata.sort {
        let _ = writeln!(out, "Sort: {sort}");
    }
    for message in outcome.parse.error_messages() {
        let _ = writeln!(out, "{} {message}", "warning:".yellow().bold());
    }

    if outcome.hits.is_empty() {
        let _ = writeln!(out, "No matching posts found.");
        return out;
    }

    let _ = writeln!(
        out,
        "Page {}/{} ({} per page)",
        outcome.page,
        outcome.page_count(),
        outcome.per_page
    );
    out.push('\n');

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "ID", "Status", "Score", "Size", "Type", "Owner", "Matches", "Tags",
        ]);
    for hit in &outcome.hits {
        let post = &posts[hit.index];
        table.add_row(vec![
            Cell::new(post.id),
            Cell::new(post.status),
            Cell::new(post.score),
            Cell::new(format!("{}x{}", post.width, post.height)),
            Cell::new(&post.file_type),
            Cell::new(&post.owner),
            Cell::new(hit.match_score),
            Cell::new(truncate_tags(&post.tags, 60)),
        ]);
    }
    let _ = writeln!(out, "{table}");

    out
}

pub fn format_search_json(posts: &[Post], raw_query: &str, outcome: &SearchOutcome) -> String {
    let entries: Vec<_> = outcome
        .hits
        .iter()
        .map(|hit| {
            json!({
                "match_score": hit.match_score,
                "post": &posts[hit.index],
            })
        })
        .collect();

    serde_json::to_string_pretty(&json!({
        "search": {
            "query": raw_query,
            "cleaned_query": outcome.preprocessed.cleaned_query,
            "status": outcome.status,
            "ast": outcome.parse.root,
            "errors": outcome.parse.error_messages(),
            "sort": outcome.preprocessed.metadata.sort,
            "candidates": outcome.candidates,
            "matches": outcome.total_matches,
            "page": outcome.page,
            "per_page": outcome.per_page,
            "pages": outcome.page_count(),
            "posts": entries,
        }
    }))
    .unwrap_or_else(|_| "{\"search\":{\"error\":\"failed to serialize search output\"}}".into())
}
