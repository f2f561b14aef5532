use crate::compiler_frontend::compiler_messages::compiler_errors::{CompilerError, TextLocation};
use serde::Deserialize;
use std::fmt;

/// Node kinds produced by the template parser.
///
/// The parser's interchange format tags each node with a number, so the
/// discriminants here are part of that format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "u8")]
pub enum NodeKind {
    /// Raw HTML / text between template tags
    Literal = 1,

    /// Expression syntax passed through untouched (operators, member access, calls)
    DirectiveTag = 2,

    /// `#if`, `#foreach`, `#end` etc. The value is the directive name.
    Directive = 3,

    /// `$name` or `${name}`
    VariableRef = 4,

    /// `$!name` or `$!{name}`, renders nothing when the value can't be resolved
    QuietVariableRef = 5,

    /// A quoted string inside an expression that may interpolate references
    StringLiteral = 6,

    /// Literal text inside a `StringLiteral`
    StringFragment = 7,
}

impl TryFrom<u8> for NodeKind {
    type Error = String;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        Ok(match tag {
            1 => NodeKind::Literal,
            2 => NodeKind::DirectiveTag,
            3 => NodeKind::Directive,
            4 => NodeKind::VariableRef,
            5 => NodeKind::QuietVariableRef,
            6 => NodeKind::StringLiteral,
            7 => NodeKind::StringFragment,
            _ => return Err(format!("unknown template node type {}", tag)),
        })
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Literal => "Literal",
            NodeKind::DirectiveTag => "DirectiveTag",
            NodeKind::Directive => "Directive",
            NodeKind::VariableRef => "VariableRef",
            NodeKind::QuietVariableRef => "QuietVariableRef",
            NodeKind::StringLiteral => "StringLiteral",
            NodeKind::StringFragment => "StringFragment",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TemplateNode {
    #[serde(rename = "type")]
    pub kind: NodeKind,

    #[serde(rename = "val", default)]
    pub value: String,

    #[serde(rename = "sublayer", default)]
    pub children: Option<Vec<TemplateNode>>,

    // Only ever used to find the line of an error
    #[serde(rename = "begin", default)]
    pub source_position: usize,
}

impl TemplateNode {
    pub fn new(kind: NodeKind, value: impl Into<String>, children: Option<Vec<TemplateNode>>) -> Self {
        TemplateNode {
            kind,
            value: value.into(),
            children,
            source_position: 0,
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::new(NodeKind::Literal, text, None)
    }

    pub fn syntax(text: impl Into<String>) -> Self {
        Self::new(NodeKind::DirectiveTag, text, None)
    }

    pub fn directive(name: impl Into<String>, expression: Option<Vec<TemplateNode>>) -> Self {
        Self::new(NodeKind::Directive, name, expression)
    }

    pub fn reference(expression: Vec<TemplateNode>) -> Self {
        Self::new(NodeKind::VariableRef, "", Some(expression))
    }

    pub fn quiet_reference(expression: Vec<TemplateNode>) -> Self {
        Self::new(NodeKind::QuietVariableRef, "", Some(expression))
    }

    pub fn string_literal(fragments: Vec<TemplateNode>) -> Self {
        Self::new(NodeKind::StringLiteral, "", Some(fragments))
    }

    pub fn string_fragment(text: impl Into<String>) -> Self {
        Self::new(NodeKind::StringFragment, text, None)
    }

    pub fn at(mut self, source_position: usize) -> Self {
        self.source_position = source_position;
        self
    }

    pub fn children(&self) -> &[TemplateNode] {
        self.children.as_deref().unwrap_or_default()
    }

    pub fn location(&self) -> TextLocation {
        TextLocation::Offset(self.source_position)
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children().iter().map(TemplateNode::subtree_len).sum::<usize>()
    }
}

/// Everything the parser hands over for one template.
///
/// Symbol and word tables are opaque to the compiler.
/// They are kept so the host can build its line lookup from them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsedTemplate {
    #[serde(rename = "parseStack")]
    pub nodes: Vec<TemplateNode>,

    #[serde(default)]
    pub symbols: serde_json::Value,

    #[serde(default)]
    pub words: serde_json::Value,
}

impl ParsedTemplate {
    pub fn new(nodes: Vec<TemplateNode>) -> Self {
        ParsedTemplate {
            nodes,
            symbols: serde_json::Value::Null,
            words: serde_json::Value::Null,
        }
    }

    pub fn from_json(source: &str) -> Result<Self, CompilerError> {
        serde_json::from_str(source).map_err(|error| {
            CompilerError::new_tree_error(
                format!("Parser output is not a valid template tree: {}", error),
                TextLocation::Unknown,
            )
        })
    }
}

#[cfg(test)]
#[path = "tests/tree_nodes_tests.rs"]
mod tests;
