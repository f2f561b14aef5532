//! JavaScript backend for Stencil templates.
//!
//! Walks a parsed template tree once and lowers it into the body of a JavaScript
//! function. The function takes the data context as its only argument and returns
//! the rendered text.

mod js_directive;
mod js_literal;
mod js_reference;

#[cfg(test)]
mod tests;

use crate::compiler_frontend::compiler_messages::compiler_errors::{
    CompilerError, ErrorMetaDataKey, TextLocation,
};
use crate::compiler_frontend::template_tree::line_lookup::LineLookup;
use crate::compiler_frontend::template_tree::tree_nodes::{NodeKind, TemplateNode};
use crate::settings::{
    Config, DATA_CONTEXT_NAME, NODE_TO_PROGRAM_RATIO, OUTPUT_BUFFER_NAME, SHOW_HELPER_NAME,
    TEXT_HELPER_NAME,
};
use crate::{codegen_log, timer_log, tree_log};
use js_directive::OpenBlock;
use rustc_hash::FxHashSet;

const ARRAY_SIZE_POLYFILL: &str =
    "if(!Array.prototype.size){Array.prototype.size=function(){return this.length;};}";

/// Result of lowering a template tree to JavaScript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    /// Complete JS function body.
    pub source: String,

    /// Root variable names read from the data context, in first-seen order.
    pub hoisted_variables: Vec<String>,
}

pub fn lower_template_to_js(
    nodes: &[TemplateNode],
    config: &Config,
    lines: &dyn LineLookup,
) -> Result<CompiledTemplate, CompilerError> {
    let mut emitter = JsEmitter::new(config, lines);
    emitter.lower_template(nodes)
}

/// Root variable names, deduplicated, kept in the order they were first referenced.
#[derive(Debug, Default)]
pub(crate) struct HoistedVariables {
    names: Vec<String>,
    seen: FxHashSet<String>,
}

impl HoistedVariables {
    pub(crate) fn insert(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }

        self.seen.insert(name.to_owned());
        self.names.push(name.to_owned());
        true
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }
}

/// All state for one compile. A fresh emitter is created for every template,
/// so nothing leaks between templates or between threads.
pub(crate) struct JsEmitter<'a> {
    pub(crate) config: &'a Config,
    lines: &'a dyn LineLookup,

    pub(crate) block_stack: Vec<OpenBlock>,
    pub(crate) hoisted: HoistedVariables,

    // Helpers are only emitted when a reference needs them
    pub(crate) uses_show_helper: bool,
    pub(crate) uses_text_helper: bool,
}

impl<'a> JsEmitter<'a> {
    pub(crate) fn new(config: &'a Config, lines: &'a dyn LineLookup) -> Self {
        Self {
            config,
            lines,
            block_stack: Vec::new(),
            hoisted: HoistedVariables::default(),
            uses_show_helper: false,
            uses_text_helper: false,
        }
    }

    fn lower_template(&mut self, nodes: &[TemplateNode]) -> Result<CompiledTemplate, CompilerError> {
        #[cfg(feature = "detailed_timers")]
        let time = std::time::Instant::now();

        tree_log!("Compiling template with ", Green nodes.len(), " top level nodes");

        let body = self.lower_sequence(nodes, 0)?;

        if let Some(open_block) = self.block_stack.last() {
            let mut error = CompilerError::new_structure_error(
                format!(
                    "Unclosed {} block, expected a matching end",
                    open_block.kind.directive_name()
                ),
                TextLocation::EndOfInput,
            )
            .with_metadata(ErrorMetaDataKey::Directive, open_block.kind.directive_name())
            .with_metadata(ErrorMetaDataKey::PrimarySuggestion, "Add #end to close the block");

            if let Some(offset) = open_block.location.offset() {
                error.new_metadata_entry(
                    ErrorMetaDataKey::OpenedOnLine,
                    self.lines.line_of(offset).to_string(),
                );
            }

            return Err(error);
        }

        let source = self.assemble_program(&body, nodes);

        timer_log!(time, "Template compiled in: ");
        codegen_log!("Generated program:\n", source);

        Ok(CompiledTemplate {
            source,
            hoisted_variables: self.hoisted.names().to_vec(),
        })
    }

    /// Lowers a run of sibling nodes.
    ///
    /// Only depth 0 is the template's own text; everything deeper is part of
    /// a directive expression or string interpolation and emits bare expressions.
    pub(crate) fn lower_sequence(
        &mut self,
        nodes: &[TemplateNode],
        depth: usize,
    ) -> Result<String, CompilerError> {
        let mut code = String::new();
        let mut literal_run = String::new();

        for (index, node) in nodes.iter().enumerate() {
            if node.kind == NodeKind::Literal {
                literal_run.push_str(&node.value);
                continue;
            }

            flush_literal_run(&mut literal_run, &mut code);

            let fragment = match node.kind {
                NodeKind::Literal => Ok(String::new()),
                NodeKind::DirectiveTag => Ok(node.value.to_owned()),
                NodeKind::Directive => self.lower_directive(node, depth),
                NodeKind::VariableRef | NodeKind::QuietVariableRef => {
                    let in_text = depth == 0
                        && (index == 0 || nodes[index - 1].kind == NodeKind::Literal);
                    self.lower_reference(node, depth, in_text)
                }
                NodeKind::StringLiteral => self.lower_string_literal(node, depth),
                NodeKind::StringFragment => Ok(js_literal::string_fragment(nodes, index)),
            }
            .map_err(|error| self.resolve_line(error))?;

            code.push_str(&fragment);
        }

        flush_literal_run(&mut literal_run, &mut code);

        Ok(code)
    }

    /// Handlers only know the offset of the node that failed.
    /// Errors leave the compiler with a line number attached.
    fn resolve_line(&self, error: CompilerError) -> CompilerError {
        match error.location {
            TextLocation::Offset(offset) => {
                let line = self.lines.line_of(offset);
                error.with_location(TextLocation::Line { offset, line })
            }
            _ => error,
        }
    }

    fn assemble_program(&self, body: &str, nodes: &[TemplateNode]) -> String {
        let node_count = nodes.iter().map(TemplateNode::subtree_len).sum::<usize>();
        let mut program = String::with_capacity(body.len() + node_count * NODE_TO_PROGRAM_RATIO);

        program.push_str("'use strict';");

        if self.config.array_size_helper {
            program.push_str(ARRAY_SIZE_POLYFILL);
        }

        program.push_str(&format!(
            "var {}=arguments[0]||{{}},{}='';",
            DATA_CONTEXT_NAME, OUTPUT_BUFFER_NAME
        ));

        // Missing fields are declared anyway so optional data never throws a ReferenceError.
        // Inherited fields and getters are read like own ones.
        for name in self.hoisted.names() {
            program.push_str(&format!(
                "var {name}={data}.{name};",
                name = name,
                data = DATA_CONTEXT_NAME,
            ));
        }

        if self.uses_show_helper {
            program.push_str(&format!(
                "var {}=function(g,f){{var v;try{{v=g();}}catch(e){{return f;}}return v||v===0?v:f;}};",
                SHOW_HELPER_NAME
            ));
        }

        if self.uses_text_helper {
            program.push_str(&format!(
                "var {}=function(v){{return v==null?'':v;}};",
                TEXT_HELPER_NAME
            ));
        }

        program.push_str(body);
        program.push_str(&format!("return {};", OUTPUT_BUFFER_NAME));

        program
    }
}

fn flush_literal_run(literal_run: &mut String, code: &mut String) {
    if literal_run.is_empty() {
        return;
    }

    let escaped = js_literal::escape_literal(literal_run);
    literal_run.clear();

    if escaped.is_empty() {
        return;
    }

    code.push_str(&format!("{}+='{}';", OUTPUT_BUFFER_NAME, escaped));
}

pub(crate) fn is_js_reserved(name: &str) -> bool {
    matches!(
        name,
        "break"
            | "case"
            | "catch"
            | "class"
            | "const"
            | "continue"
            | "debugger"
            | "default"
            | "delete"
            | "do"
            | "else"
            | "export"
            | "extends"
            | "finally"
            | "for"
            | "function"
            | "if"
            | "import"
            | "in"
            | "instanceof"
            | "new"
            | "return"
            | "super"
            | "switch"
            | "this"
            | "throw"
            | "try"
            | "typeof"
            | "var"
            | "void"
            | "while"
            | "with"
            | "yield"
            | "enum"
            | "implements"
            | "interface"
            | "let"
            | "package"
            | "private"
            | "protected"
            | "public"
            | "static"
            | "await"
            | "undefined"
            | "null"
            | "true"
            | "false"
            | "NaN"
            | "Infinity"
            | "eval"
            | "arguments"
    )
}

/// Reserved words that still evaluate to a value, so member access after them is real access.
pub(crate) fn is_js_value_keyword(name: &str) -> bool {
    matches!(
        name,
        "this" | "arguments" | "undefined" | "null" | "true" | "false" | "NaN" | "Infinity" | "eval"
    )
}
