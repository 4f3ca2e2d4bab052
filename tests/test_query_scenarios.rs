use gallery_query::query::{ErrorKind, Node, matches, parse_query, preprocess};
use gallery_query::{Post, PostStatus};

fn query_matches(query: &str, post: &Post) -> bool {
    let result = parse_query(query);
    matches(post, &result.root)
}

#[test]
fn test_plain_tags_with_negation() {
    let query = "girl red_hair -blonde";
    let keeps = Post::new(1).with_tags(["girl", "red_hair", "long_hair"]);
    let rejects = Post::new(2).with_tags(["girl", "red_hair", "blonde"]);

    assert!(query_matches(query, &keeps));
    assert!(!query_matches(query, &rejects));
}

#[test]
fn test_or_group_with_owner_wildcard_and_score() {
    let query = "(cat|dog) owner:artist* score:>=100";

    let hit = Post::new(1)
        .with_tags(["cat"])
        .with_owner("artist_42")
        .with_score(150);
    let low_score = Post::new(2)
        .with_tags(["cat"])
        .with_owner("artist_42")
        .with_score(50);
    let wrong_tag = Post::new(3)
        .with_tags(["mouse"])
        .with_owner("artist_42")
        .with_score(200);

    assert!(query_matches(query, &hit));
    assert!(!query_matches(query, &low_score));
    assert!(!query_matches(query, &wrong_tag));
}

#[test]
fn test_file_type_width_and_rating() {
    let query = "type:mp4 width:>=1920 rating:s";

    let hit = Post::new(1)
        .with_file_type(".mp4")
        .with_size(1920, 1080)
        .with_rating("s");
    let narrow = Post::new(2)
        .with_file_type("mp4")
        .with_size(1280, 0)
        .with_rating("s");

    assert!(query_matches(query, &hit));
    assert!(!query_matches(query, &narrow));
}

#[test]
fn test_wildcard_tags_in_and_out_of_groups() {
    let query = "*_girl (red*|blue*)";

    assert!(query_matches(
        query,
        &Post::new(1).with_tags(["anime_girl", "red_dress"])
    ));
    assert!(!query_matches(query, &Post::new(2).with_tags(["boy", "red_dress"])));
    assert!(!query_matches(
        query,
        &Post::new(3).with_tags(["anime_girl", "green_dress"])
    ));
}

#[test]
fn test_status_directive_then_parse() {
    let pre = preprocess("status:pending girl");
    assert_eq!(pre.status.map(|s| s.as_str()), Some("pending"));
    assert_eq!(pre.cleaned_query, "girl");

    let post = Post::new(1)
        .with_tags(["girl"])
        .with_status(PostStatus::Pending);
    assert!(query_matches(&pre.cleaned_query, &post));
}

#[test]
fn test_malformed_query_matches_everything() {
    let result = parse_query("girl (");

    assert!(
        result
            .errors
            .iter()
            .any(|e| e.kind() == ErrorKind::UnmatchedParen),
        "expected UnmatchedParen, got {:?}",
        result.errors
    );
    assert_eq!(result.root, Node::match_all());

    for post in [
        Post::new(1),
        Post::new(2).with_tags(["boy"]),
        Post::new(3).with_tags(["girl"]).with_score(-5),
    ] {
        assert!(matches(&post, &result.root));
    }
}

#[test]
fn test_negation_prefix_forms_agree() {
    let post = Post::new(1).with_tags(["blonde"]);
    for query in ["-blonde", "!blonde", "exclude:blonde", "remove:blonde", "negate:blonde", "not:blonde"] {
        assert!(!query_matches(query, &post), "{query} should exclude the post");
    }
}

#[test]
fn test_unknown_field_negation_is_a_no_op() {
    let post = Post::new(1).with_tags(["girl"]);
    assert!(query_matches("girl -mood:happy", &post));
    assert!(!query_matches("girl mood:happy", &post));
}

#[test]
fn test_partially_malformed_query_still_filters() {
    let result = parse_query("girl score:>lots");
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind(), ErrorKind::InvalidNumeric);

    assert!(matches(&Post::new(1).with_tags(["girl"]), &result.root));
    assert!(!matches(&Post::new(2).with_tags(["boy"]), &result.root));
}

#[test]
fn test_date_filters_on_upload_time() {
    use gallery_query::PostTime;

    let post = Post::new(1)
        .with_tags(["girl"])
        .with_created_at(PostTime::Text("2024-06-15T08:30:00Z".to_string()));

    assert!(query_matches("girl uploaded:>=2024-06-01", &post));
    assert!(query_matches("created_at:2024-06-15", &post));
    assert!(!query_matches("created_at:<2024-06-15", &post));
    assert!(query_matches("created_at:<2024-06-15T09:00", &post));
}
