use assert_matches::assert_matches;
use shaderlab_optimizer::{ParseError, tokenizer};

const FILE: &str = "Assets/Shaders/Test.cginc";

fn given_normalized(raw: &[&str]) -> Vec<String> {
    tokenizer::normalize_lines(FILE, raw.iter())
        .expect("normalize")
        .lines
}

#[test]
fn test_normalize_lines_should_split_statements_at_top_level_semicolons() {
    assert_eq!(
        given_normalized(&["float a; float b;"]),
        vec!["float a;", "float b;"]
    );
}

#[test]
fn test_normalize_lines_should_put_braces_on_their_own_lines() {
    assert_eq!(
        given_normalized(&["struct a { float x; };"]),
        vec!["struct a", "{", "float x;", "};"]
    );
}

#[test]
fn test_normalize_lines_when_semicolon_is_in_parentheses_should_not_split() {
    assert_eq!(
        given_normalized(&["for (int i = 0; i < 4; i++) x += i;"]),
        vec!["for (int i = 0; i < 4; i++) x += i;"]
    );
}

#[test]
fn test_normalize_lines_should_strip_comments() {
    assert_eq!(
        given_normalized(&["float a; // trailing", "/* multi", " line */ float b;", "// whole"]),
        vec!["float a;", "float b;"]
    );
}

#[test]
fn test_normalize_lines_when_comment_marker_is_in_string_should_keep_it() {
    assert_eq!(
        given_normalized(&[r#"#include "a//b.cginc""#]),
        vec![r#"#include "a//b.cginc""#]
    );
}

#[test]
fn test_normalize_lines_should_join_backslash_continuations() {
    assert_eq!(
        given_normalized(&["#define ADD_ONE(x) \\", "x + 1"]),
        vec!["#define ADD_ONE(x) x + 1"]
    );
}

#[test]
fn test_normalize_lines_should_keep_directives_whole() {
    assert_eq!(
        given_normalized(&["#define DECLARE(a) float a; float a##_b;"]),
        vec!["#define DECLARE(a) float a; float a##_b;"]
    );
}

#[test]
fn test_normalize_lines_should_promote_ifex_comments_to_directives() {
    let normalized = tokenizer::normalize_lines(
        FILE,
        ["//ifex _Foo==1 && _Bar > 0", "float a;", "//endex"],
    )
    .expect("normalize");

    assert_eq!(
        normalized.lines,
        vec!["#ifex _Foo==1 && _Bar > 0", "float a;", "#endex"]
    );
    assert_eq!(normalized.ifex_parameters, vec!["_Foo", "_Bar"]);
}

#[test]
fn test_normalize_lines_when_string_is_unterminated_should_fail() {
    let result = tokenizer::normalize_lines(FILE, ["float a;", r#"Tag "open"#]);

    assert_matches!(
        result,
        Err(ParseError::UnterminatedString { file, line: 2 }) if file == FILE
    );
}

#[test]
fn test_normalize_lines_when_block_comment_is_unterminated_should_fail() {
    let result = tokenizer::normalize_lines(FILE, ["float a; /* open", "float b;"]);

    assert_matches!(result, Err(ParseError::UnterminatedComment { file }) if file == FILE);
}

#[test]
fn test_ifex_condition_parameters_should_find_compared_names() {
    let names = tokenizer::ifex_condition_parameters("_A == 1 || (_B != 0 && _C >= 2)")
        .collect::<Vec<_>>();

    assert_eq!(names, vec!["_A", "_B", "_C"]);
}
