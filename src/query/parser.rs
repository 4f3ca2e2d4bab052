use super::ast::Node;
use super::atom::parse_atom;
use super::error::QueryError;
use super::tokenizer::{Token, WhitespaceMode, tokenize};
use serde::{Serialize, Serializer};
use tracing::debug;

/// Knobs that change how query text is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub whitespace: WhitespaceMode,
}

/// Outcome of parsing a query: the best-effort tree plus every diagnostic.
///
/// Errors never prevent evaluation of `root`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    pub root: Node,
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<QueryError>,
}

fn serialize_errors<S: Serializer>(errors: &[QueryError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}

impl ParseResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    /// True when something went wrong and nothing usable was parsed.
    pub fn is_total_failure(&self) -> bool {
        !self.errors.is_empty() && self.root.filter_count() == 0
    }
}

/// Parses a query with default options.
pub fn parse_query(text: &str) -> ParseResult {
    parse_query_with(text, &QueryOptions::default())
}

pub fn parse_query_with(text: &str, options: &QueryOptions) -> ParseResult {
    let result = match tokenize(text, options.whitespace) {
        Ok(tokens) => parse_tokens(&tokens),
        Err(err) => ParseResult {
            root: Node::match_all(),
            errors: vec![err],
        },
    };
    debug!(
        query = text,
        filters = result.root.filter_count(),
        errors = result.errors.len(),
        "parsed query"
    );
    result
}

/// Builds an AST from a token stream, skipping atoms that fail to parse.
pub fn parse_tokens(tokens: &[Token]) -> ParseResult {
    let mut parser = TokenParser {
        tokens,
        pos: 0,
        errors: Vec::new(),
    };
    let mut root = parser.parse_and_list(0);

    // Stray ')' at depth 0 ends the inner loop; record and keep going.
    while parser.pos < tokens.len() {
        parser.errors.push(QueryError::UnexpectedToken {
            token: tokens[parser.pos].to_string(),
            position: parser.pos,
        });
        parser.pos += 1;
        let rest = parser.parse_and_list(0);
        root = Node::and(vec![root, rest]);
    }

    ParseResult {
        root,
        errors: parser.errors,
    }
}

struct TokenParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    errors: Vec<QueryError>,
}

impl<'a> TokenParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    // Reads terms until end of input, or a ')' at this depth. A closing paren
    // is consumed when depth > 0 and left in place at depth 0.
    fn parse_and_list(&mut self, depth: usize) -> Node {
        let mut terms = Vec::new();

        while let Some(token) = self.peek() {
            match token {
                Token::Close => {
                    if depth > 0 {
                        self.pos += 1;
                    }
                    break;
                }
                // A separator with no left operand, as in `(|a)`.
                Token::Or => self.pos += 1,
                Token::Open | Token::Atom(_) => {
                    let first = self.parse_term(depth);
                    if matches!(self.peek(), Some(Token::Or)) {
                        let mut alternatives: Vec<Node> = first.into_iter().collect();
                        self.parse_alternatives(depth, &mut alternatives);
                        terms.extend(Node::or(alternatives));
                    } else {
                        terms.extend(first);
                    }
                }
            }
        }

        Node::and(terms)
    }

    // Continues an OR chain while the next token is '|'.
    fn parse_alternatives(&mut self, depth: usize, alternatives: &mut Vec<Node>) {
        while matches!(self.peek(), Some(Token::Or)) {
            self.pos += 1;
            match self.peek() {
                Some(Token::Open | Token::Atom(_)) => alternatives.extend(self.parse_term(depth)),
                // Dangling separator, as in `(a|)` or `(a||b)`.
                _ => {}
            }
        }
    }

    // A single atom or a parenthesized group. `None` when the atom was
    // rejected or the group turned out empty.
    fn parse_term(&mut self, depth: usize) -> Option<Node> {
        match self.peek()? {
            Token::Open => {
                self.pos += 1;
                let group = self.parse_and_list(depth + 1);
                (!group.is_match_all()).then_some(group)
            }
            Token::Atom(atom) => {
                self.pos += 1;
                match parse_atom(atom) {
                    Ok(filter) => Some(Node::Filter(filter)),
                    Err(err) => {
                        self.errors.push(err);
                        None
                    }
                }
            }
            Token::Close | Token::Or => None,
        }
    }
}
