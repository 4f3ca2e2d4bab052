use super::atom::{CompareOp, Filter, FilterKey, FilterValue, needs_tag_prefix};
use serde::Serialize;
use std::fmt;

/// Query AST. `And`/`Or` are n-ary and kept flat by the parser.
///
/// An empty `And` matches every post; the parser never builds an empty `Or`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Node {
    Filter(Filter),
    And { children: Vec<Node> },
    Or { children: Vec<Node> },
}

impl Default for Node {
    fn default() -> Self {
        Node::match_all()
    }
}

impl Node {
    /// `AND([])`.
    pub fn match_all() -> Self {
        Node::And {
            children: Vec::new(),
        }
    }

    /// Builds an AND, splicing nested ANDs and collapsing a single child.
    pub fn and(children: Vec<Node>) -> Self {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Node::And { children: nested } => flat.extend(nested),
                other => flat.push(other),
            }
        }
        if flat.len() == 1 {
            flat.pop().unwrap_or_default()
        } else {
            Node::And { children: flat }
        }
    }

    /// Builds an OR, splicing nested ORs and collapsing a single child.
    ///
    /// Returns `None` for an empty child list, which has no valid OR form.
    pub fn or(children: Vec<Node>) -> Option<Self> {
        let mut flat = Vec::with_capacity(children.len());
        for child in children {
            match child {
                Node::Or { children: nested } => flat.extend(nested),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Node::Or { children: flat }),
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Node::And { children } if children.is_empty())
    }

    /// Number of leaf filters in the tree.
    pub fn filter_count(&self) -> usize {
        match self {
            Node::Filter(_) => 1,
            Node::And { children } | Node::Or { children } => {
                children.iter().map(Node::filter_count).sum()
            }
        }
    }

    /// Visits every leaf filter, depth first, in source order.
    pub fn filters(&self) -> Vec<&Filter> {
        let mut out = Vec::new();
        self.collect_filters(&mut out);
        out
    }

    fn collect_filters<'a>(&'a self, out: &mut Vec<&'a Filter>) {
        match self {
            Node::Filter(filter) => out.push(filter),
            Node::And { children } | Node::Or { children } => {
                for child in children {
                    child.collect_filters(out);
                }
            }
        }
    }
}

impl From<Filter> for Node {
    fn from(filter: Filter) -> Self {
        Node::Filter(filter)
    }
}

/// Canonical query text. Parsing the output yields a structurally equal tree,
/// in either whitespace mode.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_match_all() {
            return Ok(());
        }
        write_node(f, self, Position::TopLevel)
    }
}

/// Where a node sits in the printed text.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Outside any parentheses.
    TopLevel,
    /// Directly between OR separators.
    Alternative,
    /// Inside an AND group that is itself an OR alternative.
    Member,
}

fn write_node(f: &mut fmt::Formatter<'_>, node: &Node, position: Position) -> fmt::Result {
    match node {
        Node::Filter(filter) => {
            // Legacy mode keeps a space inside an atom only within a group.
            let wrap = match position {
                Position::TopLevel => filter.value.has_whitespace(),
                Position::Alternative => false,
                Position::Member => true,
            };
            if wrap {
                write!(f, "({filter})")
            } else {
                write!(f, "{filter}")
            }
        }
        Node::Or { children } => {
            f.write_str("(")?;
            write_joined(f, children, "|", Position::Alternative)?;
            f.write_str(")")
        }
        Node::And { children } if position == Position::TopLevel && !children.is_empty() => {
            write_joined(f, children, " ", Position::TopLevel)
        }
        Node::And { children } => {
            f.write_str("(")?;
            write_joined(f, children, " ", Position::Member)?;
            f.write_str(")")
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[Node],
    separator: &str,
    position: Position,
) -> fmt::Result {
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            f.write_str(separator)?;
        }
        write_node(f, child, position)?;
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("-")?;
        }

        if self.key == FilterKey::Tag {
            return match &self.value {
                FilterValue::Text(text) if needs_tag_prefix(text) => write!(f, "tag:{text}"),
                value => write_value(f, value, self.operator),
            };
        }

        write!(f, "{}:", self.key)?;
        write_value(f, &self.value, self.operator)
    }
}

fn write_value(f: &mut fmt::Formatter<'_>, value: &FilterValue, op: CompareOp) -> fmt::Result {
    let prefix = match op {
        CompareOp::Eq | CompareOp::Pattern => "",
        other => other.symbol(),
    };
    match value {
        FilterValue::Text(text) => write!(f, "{prefix}{text}"),
        FilterValue::Integer(n) => write!(f, "{prefix}{n}"),
        FilterValue::Decimal(n) => write!(f, "{prefix}{n}"),
        FilterValue::Date(bound) => write!(f, "{prefix}{bound}"),
    }
}
