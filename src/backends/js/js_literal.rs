use crate::backends::js::JsEmitter;
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::template_tree::tree_nodes::{NodeKind, TemplateNode};

/// Escapes raw template text for a single-quoted JS string literal.
pub(crate) fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            _ => escaped.push(ch),
        }
    }

    escaped
}

/// String fragments keep the escapes written in the template source.
/// Only a bare quote or line break would end the emitted literal early.
fn escape_fragment(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => match chars.next() {
                Some(next) => {
                    escaped.push(ch);
                    escaped.push(next);
                }
                // A lone trailing backslash would escape the closing quote
                None => escaped.push_str("\\\\"),
            },
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(ch),
        }
    }

    escaped
}

/// Emits one string fragment along with whatever delimiters its siblings call for.
///
/// The first fragment opens the literal and the last one closes it.
/// Moving between literal text and an expression inserts the `+` and the quote.
pub(crate) fn string_fragment(siblings: &[TemplateNode], index: usize) -> String {
    let fragment = &siblings[index];
    let is_fragment = |node: &TemplateNode| node.kind == NodeKind::StringFragment;

    let mut code = String::with_capacity(fragment.value.len() + 4);

    if index == 0 {
        code.push('\'');
    }

    if index > 0 && !is_fragment(&siblings[index - 1]) {
        code.push_str("+'");
    }

    code.push_str(&escape_fragment(&fragment.value));

    match siblings.get(index + 1) {
        Some(next) if !is_fragment(next) => code.push_str("'+"),
        None => code.push('\''),
        Some(_) => {}
    }

    code
}

impl<'a> JsEmitter<'a> {
    /// Lowers a quoted string that may interpolate references into one JS string expression.
    pub(crate) fn lower_string_literal(
        &mut self,
        node: &TemplateNode,
        depth: usize,
    ) -> Result<String, CompilerError> {
        let fragments = node.children();

        if fragments.is_empty() {
            return Ok("''".to_owned());
        }

        let mut code = String::new();

        // Starting from an empty string keeps `+` as concatenation when the value leads
        if fragments[0].kind != NodeKind::StringFragment {
            code.push_str("''+");
        }

        for (index, fragment) in fragments.iter().enumerate() {
            if fragment.kind == NodeKind::StringFragment {
                code.push_str(&string_fragment(fragments, index));
                continue;
            }

            if index > 0 && fragments[index - 1].kind != NodeKind::StringFragment {
                code.push('+');
            }

            code.push_str(&self.lower_sequence(std::slice::from_ref(fragment), depth + 1)?);
        }

        Ok(code)
    }
}
