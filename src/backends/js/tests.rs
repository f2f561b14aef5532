use crate::backends::js::js_reference::{root_name, safe_navigation};
use crate::backends::js::{CompiledTemplate, lower_template_to_js};
use crate::compiler_frontend::compiler_messages::compiler_errors::{
    CompilerError, ErrorMetaDataKey, ErrorType, TextLocation,
};
use crate::compiler_frontend::template_tree::line_lookup::LineLookup;
use crate::compiler_frontend::template_tree::tree_nodes::TemplateNode;
use crate::settings::Config;

const PROLOGUE: &str = "'use strict';var $data=arguments[0]||{},$out='';";

// Ten bytes per line is plenty for hand-built trees
fn lines() -> impl LineLookup {
    |offset: usize| offset / 10 + 1
}

fn compile_with(nodes: &[TemplateNode], config: &Config) -> Result<CompiledTemplate, CompilerError> {
    lower_template_to_js(nodes, config, &lines())
}

fn compile(nodes: &[TemplateNode]) -> CompiledTemplate {
    compile_with(nodes, &Config::default()).expect("template should compile")
}

fn compile_err(nodes: &[TemplateNode]) -> CompilerError {
    compile_with(nodes, &Config::default()).expect_err("template should fail to compile")
}

fn var(expression: &str) -> TemplateNode {
    TemplateNode::reference(vec![TemplateNode::syntax(expression)])
}

fn quiet(expression: &str) -> TemplateNode {
    TemplateNode::quiet_reference(vec![TemplateNode::syntax(expression)])
}

fn directive(name: &str, expression: Vec<TemplateNode>) -> TemplateNode {
    TemplateNode::directive(name, Some(expression))
}

fn bare_directive(name: &str) -> TemplateNode {
    TemplateNode::directive(name, None)
}

fn text(value: &str) -> TemplateNode {
    TemplateNode::literal(value)
}

#[test]
fn empty_template_only_has_prologue_and_return() {
    let compiled = compile(&[]);
    assert_eq!(compiled.source, format!("{}return $out;", PROLOGUE));
    assert!(compiled.hoisted_variables.is_empty());
}

#[test]
fn consecutive_literals_merge_into_one_append() {
    let compiled = compile(&[text("<p>"), text("Hello"), text("</p>")]);

    assert_eq!(
        compiled.source,
        format!("{}$out+='<p>Hello</p>';return $out;", PROLOGUE)
    );
    assert_eq!(compiled.source.matches("$out+=").count(), 1);
}

#[test]
fn literal_quotes_backslashes_and_newlines_are_escaped() {
    let compiled = compile(&[text("it's a \\ test\n")]);
    assert!(compiled.source.contains(r"$out+='it\'s a \\ test\n';"));
}

#[test]
fn empty_literals_emit_nothing() {
    let compiled = compile(&[text(""), text("")]);
    assert_eq!(compiled.source, format!("{}return $out;", PROLOGUE));
}

#[test]
fn literal_runs_split_around_references() {
    let compiled = compile(&[text("a"), text("b"), var("x"), text("c")]);
    assert!(compiled.source.contains("$out+='ab';$out+=$text(x);$out+='c';"));
}

#[test]
fn plain_reference_is_hoisted_and_appended() {
    let compiled = compile(&[text("Hi "), var("user.name")]);

    assert_eq!(
        compiled.source,
        format!(
            "{}var user=$data.user;\
var $text=function(v){{return v==null?'':v;}};\
$out+='Hi ';$out+=$text(user.name);return $out;",
            PROLOGUE
        )
    );
    assert_eq!(compiled.hoisted_variables, vec!["user".to_owned()]);
}

#[test]
fn hoisted_variables_are_deduplicated_in_first_seen_order() {
    let compiled = compile(&[var("b"), text(" "), var("a"), text(" "), var("b.c")]);

    assert_eq!(
        compiled.hoisted_variables,
        vec!["b".to_owned(), "a".to_owned()]
    );
    assert_eq!(compiled.source.matches("var b=").count(), 1);
}

#[test]
fn keywords_and_numbers_are_not_hoisted() {
    let compiled = compile(&[var("this.x"), text(" "), var("42"), text(" "), var("(a)")]);

    assert!(compiled.hoisted_variables.is_empty());
    assert!(!compiled.source.contains("var this="));
    assert!(!compiled.source.contains("$data."));
}

#[test]
fn quiet_reference_uses_safe_navigation_and_empty_fallback() {
    let compiled = compile(&[quiet("user.profile.name")]);

    assert!(
        compiled
            .source
            .contains("$out+=$show(()=>(user?.profile?.name),'');")
    );
    // Zero is a real value, other falsy values are not. Anything thrown is the fallback.
    assert!(compiled.source.contains(
        "var $show=function(g,f){var v;try{v=g();}catch(e){return f;}return v||v===0?v:f;};"
    ));
}

#[test]
fn show_helper_is_only_emitted_when_needed() {
    let compiled = compile(&[var("name")]);
    assert!(!compiled.source.contains("$show"));
}

#[test]
fn undefined_output_renders_placeholder_for_references_in_text() {
    let config = Config::new(false, true);
    let compiled = compile_with(&[text("x"), var("missing.field")], &config)
        .expect("template should compile");

    assert!(
        compiled
            .source
            .contains("$out+=$show(()=>(missing?.field),'$missing.field');")
    );
}

#[test]
fn undefined_output_placeholder_is_escaped() {
    let config = Config::new(false, true);
    let compiled = compile_with(&[var("map['key']")], &config).expect("template should compile");

    assert!(compiled.source.contains(r"'$map[\'key\']'"));
}

#[test]
fn undefined_output_disabled_emits_plain_reference() {
    let compiled = compile(&[text("x"), var("missing.field")]);
    assert!(compiled.source.contains("$out+=$text(missing.field);"));
    assert!(!compiled.source.contains("$show"));
}

#[test]
fn undefined_output_skips_references_inside_directives() {
    let config = Config::new(false, true);
    let nodes = [
        directive("if", vec![var("flag")]),
        text("on"),
        bare_directive("end"),
    ];
    let compiled = compile_with(&nodes, &config).expect("template should compile");

    assert!(compiled.source.contains("if(flag){"));
    assert!(!compiled.source.contains("$show"));
}

#[test]
fn undefined_output_skips_references_after_other_references() {
    let config = Config::new(false, true);
    let compiled =
        compile_with(&[text("x"), var("a"), var("b")], &config).expect("template should compile");

    assert!(compiled.source.contains("$out+=$show(()=>(a),'$a');$out+=$text(b);"));
}

#[test]
fn conditional_chain_emits_matching_braces() {
    let nodes = [
        directive("if", vec![var("a"), TemplateNode::syntax(">1")]),
        text("big"),
        directive("elseif", vec![var("a"), TemplateNode::syntax("<0")]),
        text("neg"),
        bare_directive("else"),
        text("zero"),
        bare_directive("end"),
    ];

    let compiled = compile(&nodes);

    assert!(compiled.source.contains(
        "if(a>1){$out+='big';}else if(a<0){$out+='neg';}else{$out+='zero';}return $out;"
    ));
}

#[test]
fn stray_end_is_a_structure_error_with_a_line() {
    let error = compile_err(&[text("hello"), bare_directive("end").at(12)]);

    assert_eq!(error.error_type, ErrorType::Structure);
    assert_eq!(error.msg, "end without matching if/foreach");
    assert_eq!(error.location, TextLocation::Line { offset: 12, line: 2 });
    assert_eq!(error.line(), Some(2));
}

#[test]
fn else_without_if_fails() {
    let error = compile_err(&[bare_directive("else").at(3)]);
    assert_eq!(error.error_type, ErrorType::Structure);
    assert_eq!(error.msg, "else without if");
    assert_eq!(error.line(), Some(1));
}

#[test]
fn elseif_directly_inside_a_loop_fails() {
    let nodes = [
        directive("foreach", vec![TemplateNode::syntax("item in "), var("items")]),
        directive("elseif", vec![var("x")]).at(40),
        bare_directive("end"),
    ];

    let error = compile_err(&nodes);
    assert_eq!(error.msg, "elseif without if");
    assert_eq!(error.line(), Some(5));
}

#[test]
fn assignment_in_if_is_rejected() {
    let error = compile_err(&[
        directive("if", vec![var("a"), TemplateNode::syntax(" = 1")]).at(25),
        bare_directive("end"),
    ]);

    assert_eq!(error.error_type, ErrorType::Syntax);
    assert_eq!(error.msg, "assignment not allowed in if expression");
    assert_eq!(error.line(), Some(3));
    assert_eq!(
        error.metadata.get(&ErrorMetaDataKey::Expression).map(String::as_str),
        Some("a = 1")
    );
}

#[test]
fn assignment_in_elseif_is_rejected() {
    let error = compile_err(&[
        directive("if", vec![var("a")]),
        directive("elseif", vec![var("b"), TemplateNode::syntax("=2")]),
        bare_directive("end"),
    ]);

    assert_eq!(error.msg, "assignment not allowed in elseif expression");
}

#[test]
fn comparisons_and_quoted_equals_are_not_assignments() {
    let nodes = [
        directive("if", vec![var("a"), TemplateNode::syntax(" == 1")]),
        bare_directive("end"),
        directive("if", vec![var("a"), TemplateNode::syntax(" !== b && c >= d")]),
        bare_directive("end"),
        directive(
            "if",
            vec![
                var("name"),
                TemplateNode::syntax("=="),
                TemplateNode::string_literal(vec![TemplateNode::string_fragment("a=b")]),
            ],
        ),
        bare_directive("end"),
    ];

    let compiled = compile(&nodes);
    assert!(compiled.source.contains("if(name=='a=b'){}"));
}

#[test]
fn unclosed_block_fails_at_end_of_input() {
    let error = compile_err(&[directive("if", vec![var("a")]).at(31), text("open")]);

    assert_eq!(error.error_type, ErrorType::Structure);
    assert_eq!(error.location, TextLocation::EndOfInput);
    assert!(error.msg.starts_with("Unclosed if block"));
    assert_eq!(
        error.metadata.get(&ErrorMetaDataKey::OpenedOnLine).map(String::as_str),
        Some("4")
    );
}

#[test]
fn unclosed_loop_names_foreach() {
    let error = compile_err(&[directive(
        "foreach",
        vec![TemplateNode::syntax("item in list")],
    )]);

    assert!(error.msg.starts_with("Unclosed foreach block"));
}

#[test]
fn foreach_binds_element_and_loop_metadata() {
    let nodes = [
        directive("foreach", vec![TemplateNode::syntax("item in "), var("items")]),
        var("foreach.count"),
        text(":"),
        var("item"),
        bare_directive("end"),
    ];

    let compiled = compile(&nodes);
    let source = &compiled.source;

    assert!(source.contains("var $c=items,"));
    assert!(source.contains("Array.isArray($c)?null:Object.keys($c==null?{}:$c)"));
    assert!(source.contains("{count:$i+1,index:$i,hasNext:$i<$len-1}"));
    assert!(source.contains("function $body(item,foreach){$out+=$text(foreach.count);$out+=':';$out+=$text(item);"));
    assert!(source.ends_with("}})()!==undefined){return $out;}return $out;"));
}

#[test]
fn malformed_foreach_is_rejected() {
    for expression in ["item of list", "a in b in c", "list"] {
        let error = compile_err(&[
            directive("foreach", vec![TemplateNode::syntax(expression)]).at(7),
            bare_directive("end"),
        ]);

        assert_eq!(error.error_type, ErrorType::Syntax, "{}", expression);
        assert_eq!(error.msg, "malformed foreach expression");
        assert_eq!(error.line(), Some(1));
    }
}

#[test]
fn break_returns_the_output_so_far() {
    let compiled = compile(&[text("before"), bare_directive("break"), text("after")]);
    assert!(
        compiled
            .source
            .contains("$out+='before';return $out;$out+='after';")
    );
}

#[test]
fn break_inside_nested_loops_propagates_through_every_loop() {
    let nodes = [
        directive("foreach", vec![TemplateNode::syntax("row in "), var("rows")]),
        directive("foreach", vec![TemplateNode::syntax("cell in row")]),
        bare_directive("break"),
        bare_directive("end"),
        bare_directive("end"),
    ];

    let compiled = compile(&nodes);

    assert_eq!(
        compiled
            .source
            .matches("})()!==undefined){return $out;}")
            .count(),
        2
    );
    assert!(compiled.source.contains("function $body(cell,foreach){return $out;}"));
}

#[test]
fn set_emits_the_assignment_verbatim() {
    let compiled = compile(&[
        directive("set", vec![var("x"), TemplateNode::syntax(" = 1")]),
        var("x"),
    ]);

    assert!(compiled.source.contains("x = 1;$out+=$text(x);"));
    assert_eq!(compiled.hoisted_variables, vec!["x".to_owned()]);
}

#[test]
fn set_accepts_index_targets_strings_and_calls() {
    let nodes = [
        directive("set", vec![TemplateNode::syntax("list[0] = fn(a, b)")]),
        directive(
            "set",
            vec![
                TemplateNode::syntax("name="),
                TemplateNode::string_literal(vec![TemplateNode::string_fragment("Bob")]),
            ],
        ),
        directive("set", vec![TemplateNode::syntax("config = {debug: true}")]),
    ];

    let compiled = compile(&nodes);
    assert!(compiled.source.contains("list[0] = fn(a, b);name='Bob';config = {debug: true};"));
}

#[test]
fn set_declares_a_fresh_target() {
    let compiled = compile(&[directive("set", vec![TemplateNode::syntax("total = 0")])]);

    assert_eq!(compiled.hoisted_variables, vec!["total".to_owned()]);
    assert!(compiled.source.contains("var total=$data.total;"));
    assert!(compiled.source.ends_with("total = 0;return $out;"));
}

#[test]
fn malformed_set_is_rejected() {
    let error = compile_err(&[directive("set", vec![TemplateNode::syntax("x == 1")]).at(50)]);

    assert_eq!(error.error_type, ErrorType::Syntax);
    assert_eq!(error.msg, "malformed set expression");
    assert_eq!(error.line(), Some(6));
}

#[test]
fn unknown_directive_is_a_tree_error() {
    let error = compile_err(&[bare_directive("while").at(2)]);

    assert_eq!(error.error_type, ErrorType::Tree);
    assert!(error.msg.contains("#while"));
    assert_eq!(error.line(), Some(1));
}

#[test]
fn directive_without_expression_is_a_tree_error() {
    let error = compile_err(&[bare_directive("if"), bare_directive("end")]);

    assert_eq!(error.error_type, ErrorType::Tree);
    assert_eq!(error.msg, "#if is missing its expression");
}

#[test]
fn string_literal_mixes_fragments_and_references() {
    let nodes = [directive(
        "set",
        vec![
            TemplateNode::syntax("greeting="),
            TemplateNode::string_literal(vec![
                TemplateNode::string_fragment("Hi "),
                var("name"),
                TemplateNode::string_fragment("!"),
            ]),
        ],
    )];

    let compiled = compile(&nodes);
    assert!(compiled.source.contains("greeting='Hi '+name+'!';"));
}

#[test]
fn string_literal_starting_with_a_reference_stays_a_string() {
    let nodes = [directive(
        "set",
        vec![
            TemplateNode::syntax("label="),
            TemplateNode::string_literal(vec![var("a"), var("b"), TemplateNode::string_fragment("px")]),
        ],
    )];

    let compiled = compile(&nodes);
    assert!(compiled.source.contains("label=''+a+b+'px';"));
}

#[test]
fn empty_string_literal_is_an_empty_string() {
    let nodes = [directive(
        "set",
        vec![TemplateNode::syntax("s="), TemplateNode::string_literal(vec![])],
    )];

    let compiled = compile(&nodes);
    assert!(compiled.source.contains("s='';"));
}

#[test]
fn string_fragments_keep_source_escapes_and_escape_bare_quotes() {
    let nodes = [directive(
        "set",
        vec![
            TemplateNode::syntax("s="),
            TemplateNode::string_literal(vec![TemplateNode::string_fragment(r"it's \'quoted\'")]),
        ],
    )];

    let compiled = compile(&nodes);
    assert!(compiled.source.contains(r"s='it\'s \'quoted\'';"));
}

#[test]
fn trailing_backslash_in_a_fragment_cannot_escape_the_closing_quote() {
    let nodes = [directive(
        "set",
        vec![
            TemplateNode::syntax("path="),
            TemplateNode::string_literal(vec![TemplateNode::string_fragment(r"C:\dir\")]),
        ],
    )];

    let compiled = compile(&nodes);
    assert!(compiled.source.contains(r"path='C:\dir\\';"));

    let lone = [directive(
        "set",
        vec![
            TemplateNode::syntax("sep="),
            TemplateNode::string_literal(vec![TemplateNode::string_fragment("\\")]),
        ],
    )];

    let compiled = compile(&lone);
    assert!(compiled.source.contains(r"sep='\\';"));
}

#[test]
fn array_size_helper_is_emitted_when_enabled() {
    let config = Config::new(true, false);
    let compiled = compile_with(&[], &config).expect("template should compile");

    assert!(compiled.source.starts_with(
        "'use strict';if(!Array.prototype.size){Array.prototype.size=function(){return this.length;};}"
    ));
}

#[test]
fn compiling_twice_gives_identical_programs() {
    let nodes = [
        text("<ul>"),
        directive("foreach", vec![TemplateNode::syntax("item in "), var("items")]),
        text("<li>"),
        quiet("item.name"),
        text("</li>"),
        bare_directive("end"),
        text("</ul>"),
    ];

    assert_eq!(compile(&nodes), compile(&nodes));
}

#[test]
fn failed_compile_does_not_affect_the_next_one() {
    let _ = compile_err(&[directive("if", vec![var("a")])]);

    let compiled = compile(&[bare_directive("break")]);
    assert_eq!(compiled.source, format!("{}return $out;return $out;", PROLOGUE));
}

#[test]
fn root_name_stops_at_the_first_non_word_character() {
    assert_eq!(root_name("user.name"), "user");
    assert_eq!(root_name("items[0]"), "items");
    assert_eq!(root_name("fn_1(a)"), "fn_1");
    assert_eq!(root_name("(a+b)"), "");
}

#[test]
fn safe_navigation_chains_member_index_and_call_access() {
    assert_eq!(safe_navigation("a.b.c"), "a?.b?.c");
    assert_eq!(safe_navigation("a[0].b"), "a?.[0]?.b");
    assert_eq!(safe_navigation("fn(x).y"), "fn?.(x)?.y");
    assert_eq!(safe_navigation("a.b(c).d"), "a?.b?.(c)?.d");
}

#[test]
fn safe_navigation_leaves_strings_numbers_and_operators_alone() {
    assert_eq!(safe_navigation("'a.b' + x.y"), "'a.b' + x?.y");
    assert_eq!(safe_navigation("price * 1.5"), "price * 1.5");
    assert_eq!(safe_navigation("typeof (x)"), "typeof (x)");
    assert_eq!(safe_navigation("a ? b : c"), "a ? b : c");
    assert_eq!(safe_navigation("a?.b"), "a?.b");
    assert_eq!(safe_navigation("[1, 2][0]"), "[1, 2]?.[0]");
    assert_eq!(safe_navigation("f(...args)"), "f?.(...args)");
}

#[test]
fn safe_navigation_leaves_constructor_callees_alone() {
    assert_eq!(safe_navigation("new Date().getTime()"), "new Date()?.getTime?.()");
    assert_eq!(safe_navigation("new lib.Thing(a)"), "new lib.Thing(a)");
}
