//! Property tests for the reader and the arithmetic builtins

use minischeme::ast::{Expression, Token};
use minischeme::scheme::{parse, read, tokenize};
use proptest::prelude::*;

/// Text of a single atomic leaf: unsigned integer, unsigned decimal or symbol
fn leaf() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..100_000).prop_map(|n| n.to_string()),
        (0u32..1000, 0u32..1000).prop_map(|(whole, fraction)| format!("{whole}.{fraction}")),
        "[a-z][a-z0-9*+-]{0,5}",
    ]
}

/// Balanced source text for one expression
fn tree() -> impl Strategy<Value = String> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(|items| format!("({})", items.join(" ")))
    })
}

fn is_paren(token: &Token) -> bool {
    token.is_symbol("(") || token.is_symbol(")")
}

proptest! {
    #[test]
    fn parse_preserves_leaf_order(trees in prop::collection::vec(tree(), 1..4)) {
        let text = trees.join(" ");
        let tokens = tokenize(&text);
        let expected: Vec<Token> = tokens.iter().filter(|t| !is_paren(t)).cloned().collect();

        let parsed = parse(&tokens);
        prop_assert!(parsed.is_ok(), "{text:?} failed to parse: {parsed:?}");
        if let Ok(tree) = parsed {
            let leaves: Vec<Token> = tree.leaves().into_iter().cloned().collect();
            prop_assert_eq!(leaves, expected);
        }
    }

    #[test]
    fn quote_returns_the_parsed_tree(text in tree()) {
        let quoted = minischeme::eval_expr(&format!("(quote {text})"));
        let read_back = match read(&text) {
            Ok(Expression::Form(mut top)) if top.len() == 1 => top.pop(),
            _ => None,
        };
        prop_assert_eq!(quoted.ok(), read_back);
    }

    #[test]
    fn arithmetic_always_yields_floats(
        op in prop::sample::select(vec!["+", "-", "*", "/"]),
        operands in prop::collection::vec(1u32..1000, 1..6),
    ) {
        let operands: Vec<String> = operands.iter().map(ToString::to_string).collect();
        let source = format!("({op} {})", operands.join(" "));
        let result = minischeme::eval_expr(&source);
        prop_assert!(
            matches!(result, Ok(Expression::Atom(Token::Float(_)))),
            "{source} gave {result:?}"
        );
    }
}
