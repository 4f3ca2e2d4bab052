use super::ast::Node;
use super::atom::{CompareOp, DateBound, Filter, FilterKey, FilterValue};
use crate::post::{Post, PostTime};

/// Evaluates `node` against a single post.
pub fn matches(post: &Post, node: &Node) -> bool {
    node.matches(post)
}

impl Node {
    pub fn matches(&self, post: &Post) -> bool {
        self.eval(post, self)
    }

    fn eval(&self, post: &Post, root: &Node) -> bool {
        match self {
            Node::Filter(filter) => filter.test(post, Some(root)) != filter.negated,
            Node::And { children } => children.iter().all(|child| child.eval(post, root)),
            Node::Or { children } => children.iter().any(|child| child.eval(post, root)),
        }
    }

    /// Counts the post's tags hit by any positive tag filter in this tree.
    pub fn tag_match_score(&self, post: &Post) -> usize {
        let positive: Vec<&Filter> = self
            .filters()
            .into_iter()
            .filter(|filter| filter.key == FilterKey::Tag && !filter.negated)
            .collect();
        post.tags
            .iter()
            .filter(|tag| positive.iter().any(|filter| filter.matches_text(tag.as_str())))
            .count()
    }
}

impl Filter {
    /// Applies the predicate, then its negation flag.
    ///
    /// A lone `matching_tags` filter has no tag filters to count against and
    /// sees a score of zero; evaluate the whole tree through [`Node::matches`].
    pub fn matches(&self, post: &Post) -> bool {
        self.test(post, None) != self.negated
    }

    fn test(&self, post: &Post, root: Option<&Node>) -> bool {
        match &self.key {
            FilterKey::Tag => post.tags.iter().any(|tag| self.matches_text(tag)),
            FilterKey::Owner => self.matches_text(&post.owner),
            FilterKey::Title => self.matches_text(&post.title),
            FilterKey::Rating => self.matches_text(&post.rating),
            FilterKey::FileType => self.matches_text(post.file_type.trim_start_matches('.')),
            FilterKey::Status => self.matches_text(post.status.as_str()),
            FilterKey::Score => self.matches_number(post.score),
            FilterKey::Width => self.matches_number(post.width),
            FilterKey::Height => self.matches_number(post.height),
            FilterKey::Id => self.matches_number(post.id),
            FilterKey::TagCount => {
                self.matches_number(i64::try_from(post.tags.len()).unwrap_or(i64::MAX))
            }
            FilterKey::FileSize => self.matches_number(post.file_size),
            FilterKey::Duration => post.duration.is_some_and(|secs| self.matches_decimal(secs)),
            FilterKey::AspectRatio => post
                .aspect_ratio()
                .is_some_and(|ratio| self.matches_decimal(ratio)),
            FilterKey::MatchingTags => {
                let score = root.map_or(0, |root| root.tag_match_score(post));
                self.matches_number(i64::try_from(score).unwrap_or(i64::MAX))
            }
            FilterKey::CreatedAt => self.matches_time(post.created_at.as_ref()),
            FilterKey::DownloadedAt => self.matches_time(post.downloaded_at.as_ref()),
            FilterKey::Other(_) => false,
        }
    }

    fn matches_text(&self, candidate: &str) -> bool {
        if let Some(wildcard) = &self.wildcard {
            return wildcard.is_match(candidate);
        }
        match &self.value {
            FilterValue::Text(expected) => eq_fold(candidate, expected),
            _ => false,
        }
    }

    fn matches_number(&self, actual: i64) -> bool {
        match (&self.value, self.operator) {
            (_, CompareOp::Pattern) => self
                .wildcard
                .as_ref()
                .is_some_and(|wildcard| wildcard.is_match(&actual.to_string())),
            (FilterValue::Integer(expected), op) => op.compare(actual, *expected),
            _ => false,
        }
    }

    fn matches_decimal(&self, actual: f64) -> bool {
        match &self.value {
            FilterValue::Decimal(expected) => self.operator.compare(actual, expected.get()),
            _ => false,
        }
    }

    fn matches_time(&self, stored: Option<&PostTime>) -> bool {
        let FilterValue::Date(DateBound { at, has_time }) = &self.value else {
            return false;
        };
        let Some(actual) = stored.and_then(PostTime::to_naive) else {
            return false;
        };
        if *has_time {
            self.operator.compare(actual, *at)
        } else {
            self.operator.compare(actual.date(), at.date())
        }
    }
}

/// Case-insensitive equality without allocating either side.
pub(crate) fn eq_fold(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::PostStatus;
    use crate::query::atom::parse_atom;
    use crate::query::parser::parse_query;

    fn filter(atom: &str) -> Filter {
        parse_atom(atom).unwrap()
    }

    #[test]
    fn test_tag_match_is_case_insensitive_and_exact() {
        let post = Post::new(1).with_tags(["Red_Hair", "girl"]);
        assert!(filter("red_hair").matches(&post));
        assert!(filter("GIRL").matches(&post));
        assert!(!filter("red").matches(&post));
        assert!(!filter("hair").matches(&post));
    }

    #[test]
    fn test_negated_tag_uses_the_same_rule() {
        let post = Post::new(1).with_tags(["blonde_hair"]);
        // No substring semantics for negation either.
        assert!(filter("-blonde").matches(&post));
        assert!(!filter("-blonde_hair").matches(&post));
        assert!(!filter("-blonde*").matches(&post));
    }

    #[test]
    fn test_tag_filter_on_untagged_post() {
        let post = Post::new(1);
        assert!(!filter("girl").matches(&post));
        assert!(filter("-girl").matches(&post));
    }

    #[test]
    fn test_text_fields() {
        let post = Post::new(1)
            .with_owner("Artist_42")
            .with_title("Sunset Beach")
            .with_rating("s");
        assert!(filter("owner:artist_42").matches(&post));
        assert!(filter("user:ART*").matches(&post));
        assert!(filter("title:sunset*").matches(&post));
        assert!(filter("rating:S").matches(&post));
        assert!(!filter("rating:e").matches(&post));
    }

    #[test]
    fn test_file_type_ignores_dots_and_case() {
        let post = Post::new(1).with_file_type(".MP4");
        assert!(filter("type:mp4").matches(&post));
        assert!(filter("ext:.mp4").matches(&post));
        assert!(!filter("type:webm").matches(&post));
    }

    #[test]
    fn test_numeric_comparisons() {
        let post = Post::new(1).with_score(100).with_size(1920, 1080);
        assert!(filter("score:100").matches(&post));
        assert!(filter("score:>=100").matches(&post));
        assert!(!filter("score:>100").matches(&post));
        assert!(filter("width:>1280").matches(&post));
        assert!(filter("height:<=1080").matches(&post));
        assert!(!filter("height:<1080").matches(&post));
    }

    #[test]
    fn test_numeric_missing_is_zero() {
        let post = Post::new(1);
        assert!(filter("score:0").matches(&post));
        assert!(filter("score:<1").matches(&post));
        assert!(filter("score:>-1").matches(&post));
    }

    #[test]
    fn test_numeric_wildcard_matches_decimal_form() {
        let matches_score = |score| filter("score:*0*").matches(&Post::new(1).with_score(score));
        assert!(matches_score(10));
        assert!(matches_score(100));
        assert!(matches_score(20));
        assert!(!matches_score(5));
    }

    #[test]
    fn test_id_and_tag_count() {
        let post = Post::new(42).with_tags(["a", "b", "c"]);
        assert!(filter("id:42").matches(&post));
        assert!(filter("post_id:4*").matches(&post));
        assert!(filter("tag_count:3").matches(&post));
        assert!(filter("tagcount:>2").matches(&post));
        assert!(!filter("tag_count:>3").matches(&post));
    }

    #[test]
    fn test_file_size_with_units() {
        let post = Post::new(1).with_file_size(6 * 1024 * 1024);
        assert!(filter("size:>5mb").matches(&post));
        assert!(filter("filesize:<=6mb").matches(&post));
        assert!(!filter("size:>6mb").matches(&post));
        assert!(filter("size:6291456").matches(&post));
        assert!(filter("size:629*").matches(&post));
    }

    #[test]
    fn test_duration_requires_a_value() {
        let video = Post::new(1).with_duration(42.5);
        assert!(filter("duration:>30").matches(&video));
        assert!(filter("duration:42.5").matches(&video));
        assert!(!filter("duration:<30").matches(&video));

        let image = Post::new(2);
        assert!(!filter("duration:<30").matches(&image));
        assert!(filter("-duration:<30").matches(&image));
    }

    #[test]
    fn test_aspect_ratio_is_width_over_height() {
        let wide = Post::new(1).with_size(1920, 1080);
        assert!(filter("ratio:>1.5").matches(&wide));
        assert!(filter("aspect_ratio:<1.8").matches(&wide));
        assert!(!filter("ratio:>1.5").matches(&Post::new(2).with_size(1080, 1920)));
        assert!(!filter("ratio:>=0").matches(&Post::new(3).with_size(1920, 0)));
    }

    #[test]
    fn test_matching_tags_counts_positive_tag_filters() {
        let post = Post::new(1).with_tags(["cat", "red_hair", "red_eyes", "dog"]);
        let root = |q: &str| parse_query(q).root;
        assert!(root("(cat|red*) matches:3").matches(&post));
        assert!(!root("(cat|red*) matches:>3").matches(&post));
        // Negated tags do not count.
        assert!(root("(cat|-dog) matches:1").matches(&post));
        assert!(root("matches:0").matches(&post));
        assert_eq!(root("cat tag:red_hair -dog").tag_match_score(&post), 2);
        assert!(filter("matches:0").matches(&post));
    }

    #[test]
    fn test_status_field() {
        let post = Post::new(1).with_status(PostStatus::Discarded);
        assert!(filter("status:discarded").matches(&post));
        assert!(!filter("status:saved").matches(&post));
    }

    #[test]
    fn test_date_only_compares_calendar_day() {
        let post = Post::new(1).with_created_at(PostTime::Text("2024-03-01 18:45:00".into()));
        assert!(filter("created_at:2024-03-01").matches(&post));
        assert!(filter("uploaded:>=2024-03-01").matches(&post));
        assert!(!filter("created_at:>2024-03-01").matches(&post));
        assert!(filter("created_at:<2024-03-02").matches(&post));
    }

    #[test]
    fn test_datetime_compares_full_timestamp() {
        let post = Post::new(1).with_downloaded_at(PostTime::Unix(1_709_294_400));
        assert!(filter("downloaded_at:2024-03-01T12:00:00").matches(&post));
        assert!(filter("downloaded:>2024-03-01T11:59").matches(&post));
        assert!(!filter("downloaded:>2024-03-01T12:00").matches(&post));
        assert!(filter("downloaded_at:>=1709294400").matches(&post));
    }

    #[test]
    fn test_missing_timestamp_never_matches() {
        let post = Post::new(1);
        assert!(!filter("created_at:>2000-01-01").matches(&post));
        assert!(filter("-created_at:>2000-01-01").matches(&post));
    }

    #[test]
    fn test_unknown_key_is_false_and_negation_is_noop() {
        let post = Post::new(1).with_tags(["x"]);
        assert!(!filter("mood:happy").matches(&post));
        assert!(filter("-mood:happy").matches(&post));
    }

    #[test]
    fn test_or_node_and_and_node() {
        let post = Post::new(1).with_tags(["cat"]);
        assert!(matches(&post, &parse_query("(dog|cat)").root));
        assert!(!matches(&post, &parse_query("(dog|bird)").root));
        assert!(!matches(&post, &parse_query("cat dog").root));
        assert!(matches(&post, &Node::match_all()));
    }

    #[test]
    fn test_empty_or_is_false() {
        let post = Post::new(1);
        assert!(!Node::Or { children: Vec::new() }.matches(&post));
    }

    #[test]
    fn test_eq_fold() {
        assert!(eq_fold("ÄBC", "äbc"));
        assert!(!eq_fold("abc", "abcd"));
    }
}
