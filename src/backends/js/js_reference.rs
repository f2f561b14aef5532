use crate::backends::js::js_literal::escape_literal;
use crate::backends::js::{JsEmitter, is_js_reserved, is_js_value_keyword};
use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use crate::compiler_frontend::template_tree::tree_nodes::{NodeKind, TemplateNode};
use crate::settings::{
    OUTPUT_BUFFER_NAME, SHOW_HELPER_NAME, TEXT_HELPER_NAME, UNDEFINED_OUTPUT_PREFIX,
};
use crate::{codegen_log, return_tree_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReferenceMode {
    /// Emitted as written. Appended to the output, `null` and `undefined` render as empty text.
    Plain,

    /// Unresolvable values render as empty text
    Quiet,

    /// Unresolvable values render as `$expression` so missing bindings show up on the page
    UndefinedFallback,
}

impl<'a> JsEmitter<'a> {
    /// `in_text` is true when the reference sits directly in the template's text:
    /// the first node of the template or right after literal text.
    pub(crate) fn lower_reference(
        &mut self,
        node: &TemplateNode,
        depth: usize,
        in_text: bool,
    ) -> Result<String, CompilerError> {
        let expression = self.lower_sequence(node.children(), depth + 1)?;
        let expression = expression.trim();

        if expression.is_empty() {
            return_tree_error!("Variable reference has no expression", node.location());
        }

        self.hoist_root(expression);

        let mode = if node.kind == NodeKind::QuietVariableRef {
            ReferenceMode::Quiet
        } else if self.config.undefined_output && in_text {
            ReferenceMode::UndefinedFallback
        } else {
            ReferenceMode::Plain
        };

        let value = match mode {
            ReferenceMode::Plain if depth == 0 => {
                self.uses_text_helper = true;
                format!("{}({})", TEXT_HELPER_NAME, expression)
            }
            ReferenceMode::Plain => expression.to_owned(),
            ReferenceMode::Quiet => self.guarded_value(expression, ""),
            ReferenceMode::UndefinedFallback => {
                let placeholder = format!("{}{}", UNDEFINED_OUTPUT_PREFIX, expression);
                self.guarded_value(expression, &escape_literal(&placeholder))
            }
        };

        if depth == 0 {
            Ok(format!("{}+={};", OUTPUT_BUFFER_NAME, value))
        } else {
            Ok(value)
        }
    }

    /// Declares the variable `expression` reads from, so it resolves against the data context.
    pub(crate) fn hoist_root(&mut self, expression: &str) {
        let root = root_name(expression.trim_start());
        if is_hoistable(root) && self.hoisted.insert(root) {
            codegen_log!("Hoisting data context variable: ", Green root);
        }
    }

    /// Evaluates `expression` inside a thunk so anything it throws becomes the fallback text.
    /// A missing link in the access chain yields `undefined` rather than throwing.
    /// Falsy values other than 0 become the fallback text too.
    fn guarded_value(&mut self, expression: &str, escaped_fallback: &str) -> String {
        self.uses_show_helper = true;
        format!(
            "{}(()=>({}),'{}')",
            SHOW_HELPER_NAME,
            safe_navigation(expression),
            escaped_fallback
        )
    }
}

/// The leading run of word characters, the variable the expression reads from.
pub(crate) fn root_name(expression: &str) -> &str {
    let end = expression
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(expression.len());

    &expression[..end]
}

fn is_hoistable(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with(|ch: char| ch.is_ascii_digit())
        && !is_js_reserved(name)
}

fn is_identifier_char(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphanumeric()
}

fn starts_identifier(ch: char) -> bool {
    ch == '_' || ch == '$' || ch == '#' || ch.is_alphabetic()
}

/// Whether the token just before an access operator produces a value that can be accessed.
/// `typeof (x)` or `in [a]` are operators, not calls or index access.
fn ends_access_target(previous: Option<char>, word: &str) -> bool {
    match previous {
        Some(')') | Some(']') => true,
        Some(ch) if is_identifier_char(ch) => {
            !word.is_empty()
                && !word.starts_with(|ch: char| ch.is_ascii_digit())
                && (!is_js_reserved(word) || is_js_value_keyword(word))
        }
        _ => false,
    }
}

/// Index just past the string literal starting at `start`.
fn skip_string(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut index = start + 1;

    while index < chars.len() {
        match chars[index] {
            '\\' => index += 2,
            ch if ch == quote => return index + 1,
            _ => index += 1,
        }
    }

    chars.len()
}

/// Rewrites member access, index access and calls to optional chaining.
///
/// `a.b[c](d)` becomes `a?.b?.[c]?.(d)`, so a missing link yields `undefined`
/// instead of throwing. String literals are left untouched.
pub(crate) fn safe_navigation(expression: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let mut rewritten = String::with_capacity(expression.len() + 8);

    // Last significant char outside strings, and the identifier or number ending there
    let mut previous: Option<char> = None;
    let mut word = String::new();
    let mut index = 0;

    // `new a.B()` can't be optionally chained, leave the callee alone until its arguments
    let mut in_new_callee = false;

    while index < chars.len() {
        let ch = chars[index];

        match ch {
            '\'' | '"' | '`' => {
                let end = skip_string(&chars, index);
                rewritten.extend(&chars[index..end]);
                previous = Some(ch);
                word.clear();
                index = end;
                continue;
            }

            '.' => {
                let next = chars.get(index + 1).copied();

                if next == Some('.') {
                    // Spread
                    while chars.get(index) == Some(&'.') {
                        rewritten.push('.');
                        index += 1;
                    }
                    previous = Some('.');
                    word.clear();
                    continue;
                }

                let is_decimal_point = word.starts_with(|ch: char| ch.is_ascii_digit());

                if !is_decimal_point
                    && !in_new_callee
                    && next.is_some_and(starts_identifier)
                    && ends_access_target(previous, &word)
                {
                    rewritten.push_str("?.");
                } else {
                    rewritten.push('.');
                }

                if !is_decimal_point {
                    word.clear();
                }
                previous = Some('.');
            }

            '[' | '(' => {
                if !in_new_callee && ends_access_target(previous, &word) {
                    rewritten.push_str("?.");
                }

                if ch == '(' {
                    in_new_callee = false;
                }

                rewritten.push(ch);
                previous = Some(ch);
                word.clear();
            }

            _ if ch.is_whitespace() => {
                rewritten.push(ch);
            }

            _ if is_identifier_char(ch) => {
                let continues_word = index > 0
                    && (is_identifier_char(chars[index - 1])
                        || (chars[index - 1] == '.' && word.starts_with(|c: char| c.is_ascii_digit())));

                if !continues_word {
                    if word == "new" {
                        in_new_callee = true;
                    }
                    word.clear();
                }

                word.push(ch);
                rewritten.push(ch);
                previous = Some(ch);
            }

            _ => {
                rewritten.push(ch);
                previous = Some(ch);
                word.clear();
                in_new_callee = false;
            }
        }

        index += 1;
    }

    rewritten
}
