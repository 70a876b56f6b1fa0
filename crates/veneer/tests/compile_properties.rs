//! Property tests for the directive compiler.

use proptest::prelude::*;
use veneer::DirectiveCompiler;

proptest! {
    // Compilation is pure: the same input always produces the same output.
    #[test]
    fn test_compile_is_deterministic(template in ".{0,200}") {
        let compiler = DirectiveCompiler::new();
        let first = compiler.compile(&template).unwrap();
        let second = compiler.compile(&template).unwrap();
        prop_assert_eq!(first, second);
    }

    // Text with no directive markers passes through untouched.
    #[test]
    fn test_plain_text_unchanged(template in "[a-zA-Z0-9 .,;:]{0,200}") {
        let compiler = DirectiveCompiler::new();
        prop_assert_eq!(compiler.compile(&template).unwrap(), template);
    }

    // A well-formed `@if` block compiles to its tag form no matter what
    // expression text it carries.
    #[test]
    fn test_if_always_compiles_regardless_of_expression(expr in "[a-z$ 0-9=<>!&|]{1,40}") {
        prop_assume!(!expr.contains('(') && !expr.contains(')'));
        let template = format!("@if({})body@endif", expr);
        let out = DirectiveCompiler::new().compile(&template).unwrap();
        prop_assert!(out.starts_with("<% if( "));
        prop_assert!(out.ends_with("<% endif %>"));
    }
}
