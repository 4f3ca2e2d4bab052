use gallery_query::Post;
use gallery_query::query::{
    SortField, SortOrder, StatusSelector, TagScorer, extract_positive_tags, preprocess,
};

#[test]
fn test_each_reserved_status_value() {
    for (query, expected) in [
        ("status:pending", StatusSelector::Pending),
        ("status:SAVED x", StatusSelector::Saved),
        ("x Status:All", StatusSelector::All),
    ] {
        assert_eq!(preprocess(query).status, Some(expected), "{query}");
    }
}

#[test]
fn test_first_status_wins_and_all_are_removed() {
    let pre = preprocess("status:saved (a|b) status:pending c");
    assert_eq!(pre.status, Some(StatusSelector::Saved));
    assert_eq!(pre.cleaned_query, "(a|b) c");
}

#[test]
fn test_status_inside_group_is_removed_too() {
    let pre = preprocess("(status:saved|cat)");
    assert_eq!(pre.status, Some(StatusSelector::Saved));
    assert_eq!(pre.cleaned_query, "( |cat)");
}

#[test]
fn test_directives_combine() {
    let pre = preprocess("status:saved girl sort:uploaded-asc per-page:25 -boy");
    assert_eq!(pre.status, Some(StatusSelector::Saved));
    assert_eq!(pre.cleaned_query, "girl -boy");

    let sort = pre.metadata.sort.expect("sort directive");
    assert_eq!(sort.fields, vec![SortField::CreatedAt]);
    assert_eq!(sort.order, Some(SortOrder::Ascending));
    assert_eq!(pre.metadata.per_page, Some(25));
}

#[test]
fn test_directive_prefix_is_case_insensitive() {
    let pre = preprocess("SORT:score Per-Page:5 girl");
    assert_eq!(pre.cleaned_query, "girl");
    assert_eq!(pre.metadata.per_page, Some(5));
    assert!(pre.metadata.sort.is_some());
}

#[test]
fn test_unknown_sort_field_yields_no_sort() {
    let pre = preprocess("sort:timestamp girl");
    assert_eq!(pre.cleaned_query, "girl");
    assert!(pre.metadata.sort.is_none());
}

#[test]
fn test_positive_tags_come_from_raw_query() {
    let pre = preprocess("status:pending girl (cat|dog) -blonde score:>5 tag:Red*");
    assert_eq!(pre.positive_tags, vec!["girl", "cat", "dog", "Red*"]);
}

#[test]
fn test_positive_tags_expand_every_or_separator() {
    assert_eq!(extract_positive_tags("(a~b,c|d)"), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_field_alternative_drops_only_that_alternative() {
    // The tag alternative of a mixed group still counts toward the score.
    assert_eq!(extract_positive_tags("(cat|score:>5)"), vec!["cat"]);
    assert_eq!(extract_positive_tags("(owner:x~dog,tag:bird)"), vec!["dog", "bird"]);
    assert!(extract_positive_tags("(score:>5|width:>10)").is_empty());
}

#[test]
fn test_negated_status_leaves_no_orphan_prefix() {
    for query in ["-status:saved girl", "!status:saved girl", "not:STATUS:saved girl"] {
        let pre = preprocess(query);
        assert_eq!(pre.status, None, "{query}");
        assert_eq!(pre.cleaned_query, "girl", "{query}");
        assert!(gallery_query::parse_query(&pre.cleaned_query).errors.is_empty());
    }
}

#[test]
fn test_match_score_orders_posts() {
    let pre = preprocess("girl (red*|blue_eyes)");
    let scorer = TagScorer::new(&pre.positive_tags);

    let strong = Post::new(1).with_tags(["girl", "red_hair", "blue_eyes"]);
    let weak = Post::new(2).with_tags(["girl", "green_eyes"]);

    assert_eq!(scorer.score(&strong), 3);
    assert_eq!(scorer.score(&weak), 1);
}
