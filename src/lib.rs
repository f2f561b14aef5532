pub mod settings;

pub mod compiler_frontend;

pub mod backends {
    pub mod js;
}

use crate::backends::js::lower_template_to_js;
use crate::settings::Config;
use rayon::prelude::*;

pub use crate::backends::js::CompiledTemplate;
pub use crate::compiler_frontend::compiler_messages::compiler_errors::{
    CompilerError, ErrorMetaDataKey, ErrorType, TextLocation,
};
pub use crate::compiler_frontend::template_tree::line_lookup::{LineLookup, SourceLines};
pub use crate::compiler_frontend::template_tree::tree_nodes::{
    NodeKind, ParsedTemplate, TemplateNode,
};

/// One template waiting to be compiled as part of a batch.
#[derive(Clone, Copy)]
pub struct TemplateSource<'t> {
    pub nodes: &'t [TemplateNode],
    pub lines: &'t dyn LineLookup,
}

pub struct Compiler<'a> {
    config: &'a Config,
}

impl<'a> Compiler<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    // -----------------------------
    //          CODEGEN
    // -----------------------------
    /// One pass over the tree. Every call gets its own block stack and
    /// hoisted variable set, so a single compiler can be shared between threads.
    pub fn compile(
        &self,
        nodes: &[TemplateNode],
        lines: &dyn LineLookup,
    ) -> Result<CompiledTemplate, CompilerError> {
        lower_template_to_js(nodes, self.config, lines)
    }

    pub fn compile_parsed(
        &self,
        template: &ParsedTemplate,
        lines: &dyn LineLookup,
    ) -> Result<CompiledTemplate, CompilerError> {
        self.compile(&template.nodes, lines)
    }

    /// Compiles independent templates in parallel.
    /// Results come back in the same order as the input.
    pub fn compile_batch(
        &self,
        templates: &[TemplateSource<'_>],
    ) -> Vec<Result<CompiledTemplate, CompilerError>> {
        templates
            .par_iter()
            .map(|template| self.compile(template.nodes, template.lines))
            .collect()
    }
}
