//! Program-text parsing.
//!
//! The compiler emits *program text*: literal template text interleaved
//! with `<% ... %>` tags. Before execution the raw executor parses that
//! text into a [`Node`] tree — literal runs, output expressions, and
//! nested control blocks. Parse failures are execution-time errors, not
//! compile-time ones: compilation is textual and best-effort, so an
//! unterminated `@if` only surfaces here, where the error-interception
//! layer reports and suppresses it.

use std::collections::VecDeque;

use crate::error::ExecError;
use crate::expr::{
    parse_expr, parse_for_header, parse_foreach_header, Expr, ForHeader, ForeachHeader,
};

/// A node of the executable template tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text emitted verbatim.
    Literal(String),
    /// `<% echo expr %>` — evaluate and emit.
    Echo(Expr),
    /// `if` / `elseif` arms with an optional `else` body.
    If {
        arms: Vec<(Expr, Vec<Node>)>,
        otherwise: Option<Vec<Node>>,
    },
    /// `foreach( subject as [$key =>] $item )`.
    Foreach {
        header: ForeachHeader,
        body: Vec<Node>,
    },
    /// `for( init; cond; step )`.
    For { header: ForHeader, body: Vec<Node> },
    /// `while( cond )`.
    While { cond: Expr, body: Vec<Node> },
    /// `switch` with ordered arms; an arm with no test is `default`.
    /// A matched arm falls through subsequent arms until `break`.
    Switch {
        subject: Expr,
        arms: Vec<(Option<Expr>, Vec<Node>)>,
    },
    /// `break` — terminates the innermost loop or switch.
    Break,
}

/// Parses program text into a node tree.
pub fn parse_program(code: &str) -> Result<Vec<Node>, ExecError> {
    let items = scan(code)?;
    let mut parser = TreeParser { items };
    let (nodes, terminator) = parser.parse_nodes(&[])?;
    if let Some(tag) = terminator {
        return Err(ExecError::Parse(format!(
            "unexpected `{}` outside its block",
            tag.name()
        )));
    }
    Ok(nodes)
}

#[derive(Debug)]
enum Item {
    Literal(String),
    Tag(Tag),
}

#[derive(Debug)]
enum Tag {
    Echo(Expr),
    If(Expr),
    ElseIf(Expr),
    Else,
    EndIf,
    Foreach(ForeachHeader),
    EndForeach,
    For(ForHeader),
    EndFor,
    While(Expr),
    EndWhile,
    Switch(Expr),
    Case(Expr),
    Default,
    Break,
    EndSwitch,
}

impl Tag {
    fn name(&self) -> &'static str {
        match self {
            Tag::Echo(_) => "echo",
            Tag::If(_) => "if",
            Tag::ElseIf(_) => "elseif",
            Tag::Else => "else",
            Tag::EndIf => "endif",
            Tag::Foreach(_) => "foreach",
            Tag::EndForeach => "endforeach",
            Tag::For(_) => "for",
            Tag::EndFor => "endfor",
            Tag::While(_) => "while",
            Tag::EndWhile => "endwhile",
            Tag::Switch(_) => "switch",
            Tag::Case(_) => "case",
            Tag::Default => "default",
            Tag::Break => "break",
            Tag::EndSwitch => "endswitch",
        }
    }
}

/// Splits program text into literal runs and parsed tags.
fn scan(code: &str) -> Result<VecDeque<Item>, ExecError> {
    let mut items = VecDeque::new();
    let mut rest = code;

    while let Some(open) = rest.find("<%") {
        if open > 0 {
            items.push_back(Item::Literal(rest[..open].to_string()));
        }
        let after_open = &rest[open + 2..];
        let close = after_open
            .find("%>")
            .ok_or_else(|| ExecError::Parse("unterminated `<%` tag".into()))?;
        let content = after_open[..close].trim();
        items.push_back(Item::Tag(parse_tag(content)?));
        rest = &after_open[close + 2..];
    }
    if !rest.is_empty() {
        items.push_back(Item::Literal(rest.to_string()));
    }
    Ok(items)
}

/// Parses one tag's trimmed content.
fn parse_tag(content: &str) -> Result<Tag, ExecError> {
    if let Some(expr) = content.strip_prefix("echo ") {
        return Ok(Tag::Echo(parse_expr(expr)?));
    }

    match content {
        "else:" | "else" => return Ok(Tag::Else),
        "endif" => return Ok(Tag::EndIf),
        "endforeach" => return Ok(Tag::EndForeach),
        "endfor" => return Ok(Tag::EndFor),
        "endwhile" => return Ok(Tag::EndWhile),
        "endswitch" => return Ok(Tag::EndSwitch),
        "default:" | "default" => return Ok(Tag::Default),
        "break" => return Ok(Tag::Break),
        _ => {}
    }

    for (keyword, build) in HEADED_TAGS {
        if let Some(inner) = headed_tag_body(content, keyword) {
            return build(inner);
        }
    }

    Err(ExecError::Parse(format!("unrecognized tag `{}`", content)))
}

type TagBuilder = fn(&str) -> Result<Tag, ExecError>;

/// Tags of the form `keyword( ... ):`. `foreach` must precede `for` so the
/// prefix check does not shadow it.
const HEADED_TAGS: &[(&str, TagBuilder)] = &[
    ("if", |s| Ok(Tag::If(parse_expr(s)?))),
    ("elseif", |s| Ok(Tag::ElseIf(parse_expr(s)?))),
    ("foreach", |s| Ok(Tag::Foreach(parse_foreach_header(s)?))),
    ("for", |s| Ok(Tag::For(parse_for_header(s)?))),
    ("while", |s| Ok(Tag::While(parse_expr(s)?))),
    ("switch", |s| Ok(Tag::Switch(parse_expr(s)?))),
    ("case", |s| Ok(Tag::Case(parse_expr(s)?))),
];

/// Matches `keyword( body ):` (trailing colon optional) and returns `body`.
fn headed_tag_body<'a>(content: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = content.strip_prefix(keyword)?;
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('(')?;
    let rest = rest.strip_suffix(':').unwrap_or(rest).trim_end();
    let body = rest.strip_suffix(')')?;
    Some(body)
}

struct TreeParser {
    items: VecDeque<Item>,
}

impl TreeParser {
    /// Parses nodes until one of `stop` tag names (or end of input).
    /// Returns the nodes and the terminating tag, if any.
    fn parse_nodes(&mut self, stop: &[&str]) -> Result<(Vec<Node>, Option<Tag>), ExecError> {
        let mut nodes = Vec::new();
        while let Some(item) = self.items.pop_front() {
            match item {
                Item::Literal(text) => nodes.push(Node::Literal(text)),
                // Terminators are consumed and handed back to the caller.
                Item::Tag(tag) if stop.contains(&tag.name()) => {
                    return Ok((nodes, Some(tag)));
                }
                Item::Tag(tag) => nodes.push(self.parse_block(tag)?),
            }
        }
        Ok((nodes, None))
    }

    fn parse_block(&mut self, tag: Tag) -> Result<Node, ExecError> {
        match tag {
            Tag::Echo(expr) => Ok(Node::Echo(expr)),
            Tag::Break => Ok(Node::Break),

            Tag::If(cond) => {
                let mut arms = Vec::new();
                let mut otherwise = None;
                let mut pending = cond;
                loop {
                    let (body, terminator) =
                        self.parse_nodes(&["elseif", "else", "endif"])?;
                    match terminator {
                        Some(Tag::ElseIf(next)) => {
                            arms.push((pending, body));
                            pending = next;
                        }
                        Some(Tag::Else) => {
                            arms.push((pending, body));
                            let (else_body, end) = self.parse_nodes(&["endif"])?;
                            if end.is_none() {
                                return Err(ExecError::Parse("unclosed `if`".into()));
                            }
                            otherwise = Some(else_body);
                            break;
                        }
                        Some(Tag::EndIf) => {
                            arms.push((pending, body));
                            break;
                        }
                        _ => return Err(ExecError::Parse("unclosed `if`".into())),
                    }
                }
                Ok(Node::If { arms, otherwise })
            }

            Tag::Foreach(header) => {
                let (body, terminator) = self.parse_nodes(&["endforeach"])?;
                if terminator.is_none() {
                    return Err(ExecError::Parse("unclosed `foreach`".into()));
                }
                Ok(Node::Foreach { header, body })
            }

            Tag::For(header) => {
                let (body, terminator) = self.parse_nodes(&["endfor"])?;
                if terminator.is_none() {
                    return Err(ExecError::Parse("unclosed `for`".into()));
                }
                Ok(Node::For { header, body })
            }

            Tag::While(cond) => {
                let (body, terminator) = self.parse_nodes(&["endwhile"])?;
                if terminator.is_none() {
                    return Err(ExecError::Parse("unclosed `while`".into()));
                }
                Ok(Node::While { cond, body })
            }

            Tag::Switch(subject) => {
                // Literal text between `switch` and its first `case` carries
                // no meaning and is dropped.
                let (_, mut terminator) =
                    self.parse_nodes(&["case", "default", "endswitch"])?;
                let mut arms: Vec<(Option<Expr>, Vec<Node>)> = Vec::new();
                loop {
                    let test = match terminator {
                        Some(Tag::Case(test)) => Some(test),
                        Some(Tag::Default) => None,
                        Some(Tag::EndSwitch) => break,
                        _ => return Err(ExecError::Parse("unclosed `switch`".into())),
                    };
                    let (body, next) =
                        self.parse_nodes(&["case", "default", "endswitch"])?;
                    arms.push((test, body));
                    terminator = next;
                }
                Ok(Node::Switch { subject, arms })
            }

            // A closer with no matching opener.
            closer => Err(ExecError::Parse(format!(
                "unexpected `{}` outside its block",
                closer.name()
            ))),
        }
    }
}
