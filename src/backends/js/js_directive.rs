use crate::backends::js::JsEmitter;
use crate::compiler_frontend::compiler_messages::compiler_errors::{CompilerError, TextLocation};
use crate::compiler_frontend::template_tree::tree_nodes::TemplateNode;
use crate::settings::{LOOP_BODY_NAME, LOOP_METADATA_NAME, OUTPUT_BUFFER_NAME};
use crate::{codegen_log, return_structure_error, return_syntax_error, return_tree_error};
use regex::Regex;
use std::sync::LazyLock;

// These are deliberately loose text checks rather than an expression grammar.
// An expression that slips past them compiles into a broken program instead of failing here.
static QUOTED_STRING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'.*'").expect("quoted string regex must compile"));
static PARENTHESISED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(.*\)").expect("parenthesised regex must compile"));
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_\s\]]=[^=]*[A-Za-z0-9_\s\[\{]").expect("assignment regex must compile")
});
static TRAILING_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9_\s\]]=$").expect("trailing assignment regex must compile")
});
static FOREACH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+in\s+").expect("foreach separator regex must compile"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Directive {
    If,
    ElseIf,
    Else,
    End,
    Foreach,
    Break,
    Set,
}

impl Directive {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "if" => Directive::If,
            "elseif" => Directive::ElseIf,
            "else" => Directive::Else,
            "end" => Directive::End,
            "foreach" => Directive::Foreach,
            "break" => Directive::Break,
            "set" => Directive::Set,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Directive::If => "if",
            Directive::ElseIf => "elseif",
            Directive::Else => "else",
            Directive::End => "end",
            Directive::Foreach => "foreach",
            Directive::Break => "break",
            Directive::Set => "set",
        }
    }

    pub(crate) fn takes_expression(self) -> bool {
        matches!(
            self,
            Directive::If | Directive::ElseIf | Directive::Foreach | Directive::Set
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    Conditional,
    Loop,
}

impl BlockKind {
    pub(crate) fn directive_name(self) -> &'static str {
        match self {
            BlockKind::Conditional => "if",
            BlockKind::Loop => "foreach",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpenBlock {
    pub(crate) kind: BlockKind,
    pub(crate) location: TextLocation,
}

impl<'a> JsEmitter<'a> {
    pub(crate) fn lower_directive(
        &mut self,
        node: &TemplateNode,
        depth: usize,
    ) -> Result<String, CompilerError> {
        let location = node.location();

        let Some(directive) = Directive::from_name(node.value.trim()) else {
            return_tree_error!(format!("Unknown directive '#{}'", node.value), location);
        };

        let expression = if directive.takes_expression() {
            let expression = self.lower_sequence(node.children(), depth + 1)?;
            if expression.trim().is_empty() {
                return_tree_error!(
                    format!("#{} is missing its expression", directive.name()),
                    location
                );
            }
            expression
        } else {
            String::new()
        };

        codegen_log!("Directive #", Green directive.name(), " (", expression, ")");

        match directive {
            Directive::If => self.lower_if(&expression, location),
            Directive::ElseIf => self.lower_elseif(&expression, location),
            Directive::Else => self.lower_else(location),
            Directive::End => self.lower_end(location),
            Directive::Foreach => self.lower_foreach(&expression, location),
            Directive::Break => Ok(format!("return {};", OUTPUT_BUFFER_NAME)),
            Directive::Set => self.lower_set(&expression, location),
        }
    }

    fn innermost_block(&self) -> Option<BlockKind> {
        self.block_stack.last().map(|block| block.kind)
    }

    fn lower_if(&mut self, expression: &str, location: TextLocation) -> Result<String, CompilerError> {
        reject_assignment(expression, Directive::If, location)?;

        self.block_stack.push(OpenBlock {
            kind: BlockKind::Conditional,
            location,
        });

        Ok(format!("if({}){{", expression))
    }

    fn lower_elseif(
        &mut self,
        expression: &str,
        location: TextLocation,
    ) -> Result<String, CompilerError> {
        if self.innermost_block() != Some(BlockKind::Conditional) {
            return_structure_error!("elseif without if", location, {
                Directive => "elseif",
            });
        }

        reject_assignment(expression, Directive::ElseIf, location)?;

        Ok(format!("}}else if({}){{", expression))
    }

    fn lower_else(&mut self, location: TextLocation) -> Result<String, CompilerError> {
        if self.innermost_block() != Some(BlockKind::Conditional) {
            return_structure_error!("else without if", location, {
                Directive => "else",
            });
        }

        Ok("}else{".to_owned())
    }

    fn lower_end(&mut self, location: TextLocation) -> Result<String, CompilerError> {
        let Some(block) = self.block_stack.pop() else {
            return_structure_error!("end without matching if/foreach", location, {
                Directive => "end",
                PrimarySuggestion => "Remove the #end or open a block before it",
            });
        };

        Ok(match block.kind {
            BlockKind::Conditional => "}".to_owned(),
            BlockKind::Loop => close_loop(),
        })
    }

    fn lower_foreach(
        &mut self,
        expression: &str,
        location: TextLocation,
    ) -> Result<String, CompilerError> {
        let parts: Vec<&str> = FOREACH_SEPARATOR.split(expression.trim()).collect();

        let [key, collection] = parts.as_slice() else {
            return_syntax_error!("malformed foreach expression", location, {
                Directive => "foreach",
                Expression => expression.trim(),
                PrimarySuggestion => "Use the form `item in collection`",
            });
        };

        if key.is_empty() || collection.is_empty() {
            return_syntax_error!("malformed foreach expression", location, {
                Directive => "foreach",
                Expression => expression.trim(),
                PrimarySuggestion => "Use the form `item in collection`",
            });
        }

        self.block_stack.push(OpenBlock {
            kind: BlockKind::Loop,
            location,
        });

        Ok(open_loop(key, collection))
    }

    /// The assignment target is declared up front, so a fresh variable doesn't
    /// throw under strict mode.
    fn lower_set(&mut self, expression: &str, location: TextLocation) -> Result<String, CompilerError> {
        let without_strings = QUOTED_STRING.replace_all(expression, "");
        let check = PARENTHESISED.replace_all(&without_strings, "");

        if !ASSIGNMENT.is_match(&check) && !TRAILING_ASSIGNMENT.is_match(&check) {
            return_syntax_error!("malformed set expression", location, {
                Directive => "set",
                Expression => expression,
                PrimarySuggestion => "Use the form `target = value`",
            });
        }

        self.hoist_root(expression);

        Ok(format!("{};", expression))
    }
}

/// Strips quoted strings so `'a=b'` inside a literal doesn't count as an assignment.
fn reject_assignment(
    expression: &str,
    directive: Directive,
    location: TextLocation,
) -> Result<(), CompilerError> {
    let check = QUOTED_STRING.replace_all(expression, "");

    if ASSIGNMENT.is_match(&check) {
        return_syntax_error!(
            format!("assignment not allowed in {} expression", directive.name()),
            location,
            {
                Directive => directive.name(),
                Expression => expression,
                PrimarySuggestion => "Use == or === to compare values",
                SuggestedReplacement => "==",
            }
        );
    }

    Ok(())
}

/// Opens the loop scaffolding.
///
/// Arrays iterate by index and anything else over its own enumerable keys.
/// The body is a function taking the element and the loop metadata, so each
/// iteration gets its own bindings. A body that returns (a `#break`) stops the
/// loop and hands the output back, see `close_loop`.
fn open_loop(key: &str, collection: &str) -> String {
    format!(
        "if((function(){{\
var $c={collection},$k=Array.isArray($c)?null:Object.keys($c==null?{{}}:$c),\
$len=$k?$k.length:$c.length;\
for(var $i=0;$i<$len;$i++){{\
if({body}($k?$c[$k[$i]]:$c[$i],{{count:$i+1,index:$i,hasNext:$i<$len-1}})!==undefined)return {out};\
}}\
function {body}({key},{meta}){{",
        collection = collection,
        key = key,
        body = LOOP_BODY_NAME,
        meta = LOOP_METADATA_NAME,
        out = OUTPUT_BUFFER_NAME,
    )
}

/// An early return from the loop body carries on out of the enclosing scope,
/// so `#break` ends the whole render even from nested loops.
fn close_loop() -> String {
    format!("}}}})()!==undefined){{return {};}}", OUTPUT_BUFFER_NAME)
}
