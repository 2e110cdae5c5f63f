use shaderlab_optimizer::preprocessor::{self, Truth};

fn lookup(name: &str) -> Truth {
    match name {
        "A" | "C" => Truth::True,
        "B" => Truth::False,
        _ => Truth::Unknown,
    }
}

#[test]
fn test_evaluate_when_conjunction_has_false_term_should_be_false() {
    assert_eq!(
        preprocessor::evaluate("defined(A) && defined(B)", lookup),
        Truth::False
    );
}

#[test]
fn test_evaluate_when_conjunction_has_unknown_term_should_be_unknown() {
    assert_eq!(
        preprocessor::evaluate("defined(A) && defined(D)", lookup),
        Truth::Unknown
    );
}

#[test]
fn test_evaluate_when_disjunction_has_true_term_should_be_true() {
    assert_eq!(
        preprocessor::evaluate("defined(D) || defined(A)", lookup),
        Truth::True
    );
}

#[test]
fn test_evaluate_when_joiners_are_mixed_should_be_unknown() {
    assert_eq!(
        preprocessor::evaluate("defined(A) && defined(C) || defined(A)", lookup),
        Truth::Unknown
    );
}

#[test]
fn test_evaluate_when_mixed_joiners_are_parenthesized_should_decide() {
    assert_eq!(
        preprocessor::evaluate("(defined(A) && defined(B)) || defined(C)", lookup),
        Truth::True
    );
}

#[test]
fn test_evaluate_should_support_negation_and_bare_defined() {
    assert_eq!(preprocessor::evaluate("!defined(A)", lookup), Truth::False);
    assert_eq!(preprocessor::evaluate("!defined B", lookup), Truth::True);
    assert_eq!(preprocessor::evaluate("defined A", lookup), Truth::True);
}

#[test]
fn test_evaluate_should_treat_integer_literals_as_truth() {
    assert_eq!(preprocessor::evaluate("0", lookup), Truth::False);
    assert_eq!(preprocessor::evaluate("1", lookup), Truth::True);
    assert_eq!(preprocessor::evaluate("0 || defined(A)", lookup), Truth::True);
}

#[test]
fn test_evaluate_when_expression_uses_unsupported_tokens_should_be_unknown() {
    assert_eq!(preprocessor::evaluate("FOO > 2", lookup), Truth::Unknown);
    assert_eq!(preprocessor::evaluate("SHADER_API_D3D11", lookup), Truth::Unknown);
    assert_eq!(preprocessor::evaluate("defined(A", lookup), Truth::Unknown);
    assert_eq!(preprocessor::evaluate("", lookup), Truth::Unknown);
}

#[test]
fn test_vendor_idiom_define_should_match_texture_usage_idiom() {
    assert_eq!(
        preprocessor::vendor_idiom_define(
            " defined(PROP_MAINTEX) || !defined(OPTIMIZER_ENABLED)"
        ),
        Some("PROP_MAINTEX")
    );
    assert_eq!(
        preprocessor::vendor_idiom_define("(defined(PROP_BUMPMAP) || !defined(OPTIMIZER_ENABLED))"),
        Some("PROP_BUMPMAP")
    );
    assert_eq!(
        preprocessor::vendor_idiom_define("defined(PROP_MAINTEX)"),
        None
    );
}
