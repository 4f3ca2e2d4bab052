use crate::query::{Node, ParseResult, Preprocessed};
use colored::Colorize;
use serde_json::json;
use std::fmt::Write;

pub fn format_parse_text(query: &str, result: &ParseResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PARSE {query:?}");
    let _ = writeln!(out, "Canonical: {}", result.root);
    let _ = writeln!(out, "Filters:   {}", result.root.filter_count());
    out.push('\n');
    write_tree(&mut out, &result.root, 0);

    if !result.errors.is_empty() {
        out.push('\n');
        for message in result.error_messages() {
            let _ = writeln!(out, "{} {message}", "warning:".yellow().bold());
        }
    }
    out
}

fn write_tree(out: &mut String, node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        Node::Filter(filter) => {
            let _ = writeln!(out, "{indent}{}", filter.to_string().cyan());
        }
        Node::And { children } if children.is_empty() => {
            let _ = writeln!(out, "{indent}AND [] {}", "(matches everything)".dimmed());
        }
        Node::And { children } | Node::Or { children } => {
            let label = if matches!(node, Node::And { .. }) { "AND" } else { "OR" };
            let _ = writeln!(out, "{indent}{}", label.bold());
            for child in children {
                write_tree(out, child, depth + 1);
            }
        }
    }
}

pub fn format_parse_json(query: &str, result: &ParseResult) -> String {
    serde_json::to_string_pretty(&json!({
        "parse": {
            "query": query,
            "canonical": result.root.to_string(),
            "root": result.root,
            "errors": result.error_messages(),
        }
    }))
    .unwrap_or_else(|_| "{\"parse\":{\"error\":\"failed to serialize parse output\"}}".into())
}

pub fn format_preprocess_text(query: &str, pre: &Preprocessed) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "PREPROCESS {query:?}");
    let _ = writeln!(
        out,
        "Status:        {}",
        pre.status.map_or("-".to_string(), |s| s.to_string())
    );
    let _ = writeln!(out, "Cleaned query: {:?}", pre.cleaned_query);
    let _ = writeln!(
        out,
        "Positive tags: {}",
        if pre.positive_tags.is_empty() {
            "-".to_string()
        } else {
            pre.positive_tags.join(", ")
        }
    );
    if let Some(sort) = &pre.metadata.sort {
        let _ = writeln!(out, "Sort:          {sort}");
    }
    if let Some(per_page) = pre.metadata.per_page {
        let _ = writeln!(out, "Per page:      {per_page}");
    }
    out
}

pub fn format_preprocess_json(query: &str, pre: &Preprocessed) -> String {
    serde_json::to_string_pretty(&json!({
        "preprocess": {
            "query": query,
            "status": pre.status,
            "cleaned_query": pre.cleaned_query,
            "positive_tags": pre.positive_tags,
            "metadata": pre.metadata,
        }
    }))
    .unwrap_or_else(|_| "{\"preprocess\":{\"error\":\"failed to serialize output\"}}".into())
}
