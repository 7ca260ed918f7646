//! Reading source text: tokenizing, balance checking and parsing.
//!
//! Tokenizing never fails. Every run of source text is classified into a
//! [`Token`], and anything that does not look like a well-formed unsigned number
//! degrades to a symbol. Structure errors are reported by [`check_balance`] and
//! [`parse`] as [`Error::UnbalancedStructure`].

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{opt, recognize},
    sequence::pair,
};
use ordered_float::OrderedFloat;

use crate::{Error, MAX_PARSE_DEPTH};
use crate::ast::{Expression, FloatType, IntegerType, Token};

const OPEN: &str = "(";
const CLOSE: &str = ")";

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')'
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while(char::is_whitespace).parse(input)
}

/// A single `(` or `)`
fn paren(input: &str) -> IResult<&str, &str> {
    recognize(one_of("()")).parse(input)
}

/// Optional sign, digits, optional `.` followed by at least one digit
fn numeric_run(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        opt(one_of("+-")),
        alt((recognize(pair(digit0, pair(char('.'), digit1))), digit1)),
    ))
    .parse(input)
}

/// Maximal run of anything that is neither whitespace nor a paren
fn bare_run(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !is_delimiter(c)).parse(input)
}

fn raw_run(input: &str) -> IResult<&str, &str> {
    alt((paren, numeric_run, bare_run)).parse(input)
}

/// Classify one raw run of source text.
///
/// Only unsigned literals are numbers: `-5` and `.5` are symbols.
pub fn classify(run: &str) -> Token {
    if is_digits(run) {
        if let Ok(n) = run.parse::<IntegerType>() {
            return Token::Integer(n);
        }
        // Out of range: fall through to a symbol
        return Token::symbol(run);
    }

    if let Some((whole, fraction)) = run.split_once('.') {
        if is_digits(whole) && is_digits(fraction) {
            if let Ok(x) = run.parse::<FloatType>() {
                return Token::Float(OrderedFloat(x));
            }
        }
    }

    Token::symbol(run)
}

/// Convert source text into a flat sequence of classified tokens.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut input = source;

    loop {
        let rest = match whitespace(input) {
            Ok((rest, _)) => rest,
            Err(_) => input,
        };
        if rest.is_empty() {
            break;
        }
        match raw_run(rest) {
            Ok((remaining, run)) => {
                tokens.push(classify(run));
                input = remaining;
            }
            // Unreachable for non-empty input that starts with a non-space
            Err(_) => break,
        }
    }

    tokens
}

/// Check that `(` and `)` tokens occur equally often
pub fn check_balance(tokens: &[Token]) -> Result<(), Error> {
    let opened = tokens.iter().filter(|t| t.is_symbol(OPEN)).count();
    let closed = tokens.iter().filter(|t| t.is_symbol(CLOSE)).count();

    if opened == closed {
        Ok(())
    } else {
        Err(Error::UnbalancedStructure(format!(
            "{opened} '(' but {closed} ')'"
        )))
    }
}

/// Build the expression tree from a token sequence.
///
/// Returns a form holding the top-level expressions. Nesting deeper than
/// [`MAX_PARSE_DEPTH`] fails with [`Error::TooDeeplyNested`].
pub fn parse(tokens: &[Token]) -> Result<Expression, Error> {
    let mut stack: Vec<Vec<Expression>> = Vec::new();
    let mut acc: Vec<Expression> = Vec::new();

    for (position, token) in tokens.iter().enumerate() {
        if token.is_symbol(OPEN) {
            if stack.len() >= MAX_PARSE_DEPTH {
                return Err(Error::TooDeeplyNested);
            }
            stack.push(std::mem::take(&mut acc));
        } else if token.is_symbol(CLOSE) {
            let outer = stack.pop().ok_or_else(|| {
                Error::UnbalancedStructure(format!("unmatched ')' at token {position}"))
            })?;
            let finished = std::mem::replace(&mut acc, outer);
            acc.push(Expression::Form(finished));
        } else {
            acc.push(Expression::Atom(token.clone()));
        }
    }

    if !stack.is_empty() {
        return Err(Error::UnbalancedStructure(format!(
            "{} unclosed '('",
            stack.len()
        )));
    }

    Ok(Expression::Form(acc))
}

/// Tokenize, check the balance and parse.
pub fn read(source: &str) -> Result<Expression, Error> {
    let tokens = tokenize(source);
    check_balance(&tokens)?;
    parse(&tokens)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{float, form, int, sym};
    use pretty_assertions::assert_eq;

    fn s(name: &str) -> Token {
        Token::symbol(name)
    }

    fn i(n: IntegerType) -> Token {
        Token::Integer(n)
    }

    #[test]
    fn test_tokenize_forms() {
        let cases = vec![
            ("(+ 1 2)", vec![s("("), s("+"), i(1), i(2), s(")")]),
            ("(+ x y)", vec![s("("), s("+"), s("x"), s("y"), s(")")]),
            (
                "(+ (* a b) (expt c d))",
                vec![
                    s("("),
                    s("+"),
                    s("("),
                    s("*"),
                    s("a"),
                    s("b"),
                    s(")"),
                    s("("),
                    s("expt"),
                    s("c"),
                    s("d"),
                    s(")"),
                    s(")"),
                ],
            ),
            ("", vec![]),
            ("  \t\n ", vec![]),
            ("((", vec![s("("), s("(")]),
            ("(1.5)", vec![s("("), Token::float(1.5), s(")")]),
        ];

        for (n, (input, expected)) in cases.iter().enumerate() {
            assert_eq!(tokenize(input), *expected, "tokenize case #{}: {input:?}", n + 1);
        }
    }

    #[test]
    fn test_tokenize_run_boundaries() {
        let cases = vec![
            // A numeric run ends where the digits end
            ("12abc", vec![i(12), s("abc")]),
            ("abc12", vec![s("abc12")]),
            ("x-1", vec![s("x-1")]),
            // Signed runs are split off but classified as symbols
            ("-5", vec![s("-5")]),
            ("+5", vec![s("+5")]),
            ("(- 0 5)", vec![s("("), s("-"), i(0), i(5), s(")")]),
            // One decimal point per numeric run
            ("1.5.3", vec![Token::float(1.5), s(".3")]),
            (".5", vec![s(".5")]),
            ("3.", vec![i(3), s(".")]),
            ("-abc", vec![s("-abc")]),
            ("a(b)c", vec![s("a"), s("("), s("b"), s(")"), s("c")]),
            ("λ", vec![s("λ")]),
        ];

        for (n, (input, expected)) in cases.iter().enumerate() {
            assert_eq!(tokenize(input), *expected, "boundary case #{}: {input:?}", n + 1);
        }
    }

    #[test]
    fn test_classify() {
        let cases = vec![
            ("0", i(0)),
            ("42", i(42)),
            ("007", i(7)),
            ("9223372036854775807", i(IntegerType::MAX)),
            ("99999999999999999999", s("99999999999999999999")),
            ("2.75", Token::float(2.75)),
            ("0.5", Token::float(0.5)),
            ("10.0", Token::float(10.0)),
            ("1.2.3", s("1.2.3")),
            (".5", s(".5")),
            ("5.", s("5.")),
            ("-1.5", s("-1.5")),
            ("1e5", s("1e5")),
            ("(", s("(")),
            ("nil", s("nil")),
        ];

        for (n, (run, expected)) in cases.iter().enumerate() {
            assert_eq!(classify(run), *expected, "classify case #{}: {run:?}", n + 1);
        }
    }

    #[test]
    fn test_parse_nesting() {
        let cases = vec![
            ("(+ 1 2)", form([form([sym("+"), int(1), int(2)])])),
            (
                "(* (- 1 2) 2)",
                form([form([
                    sym("*"),
                    form([sym("-"), int(1), int(2)]),
                    int(2),
                ])]),
            ),
            (
                "(* a (+ b (- c (* d (+ e f) (+ g h i)) j k) l) m)",
                form([form([
                    sym("*"),
                    sym("a"),
                    form([
                        sym("+"),
                        sym("b"),
                        form([
                            sym("-"),
                            sym("c"),
                            form([
                                sym("*"),
                                sym("d"),
                                form([sym("+"), sym("e"), sym("f")]),
                                form([sym("+"), sym("g"), sym("h"), sym("i")]),
                            ]),
                            sym("j"),
                            sym("k"),
                        ]),
                        sym("l"),
                    ]),
                    sym("m"),
                ])]),
            ),
            ("42", form([int(42)])),
            ("1 2", form([int(1), int(2)])),
            ("()", form([form([])])),
            ("(0.5)", form([form([float(0.5)])])),
            ("", form([])),
        ];

        for (n, (input, expected)) in cases.iter().enumerate() {
            let parsed = parse(&tokenize(input)).unwrap();
            assert_eq!(parsed, *expected, "parse case #{}: {input:?}", n + 1);
        }
    }

    #[test]
    fn test_structure_errors() {
        // Counts differ: rejected before parsing
        for input in ["(+ 1 2", "(+ 1 2))", "(((", ")"] {
            let err = read(input).unwrap_err();
            assert!(
                matches!(err, Error::UnbalancedStructure(_)),
                "{input:?} should be unbalanced, got {err:?}"
            );
        }

        // Counts match but order does not: the parser reports it
        let err = read(")(").unwrap_err();
        assert!(matches!(err, Error::UnbalancedStructure(ref m) if m.contains("unmatched ')'")));

        // The parser alone also refuses unclosed input
        let err = parse(&tokenize("(+ 1 2")).unwrap_err();
        assert!(matches!(err, Error::UnbalancedStructure(ref m) if m.contains("unclosed")));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let nested = |levels: usize| format!("{}1{}", "(".repeat(levels), ")".repeat(levels));

        let at_limit = read(&nested(MAX_PARSE_DEPTH)).unwrap();
        assert_eq!(at_limit.leaves(), vec![&i(1)]);

        assert_eq!(
            read(&nested(MAX_PARSE_DEPTH + 1)),
            Err(Error::TooDeeplyNested)
        );
        assert_eq!(read(&nested(100_000)), Err(Error::TooDeeplyNested));

        // Depth is nesting, not the number of forms
        let wide = "(1) ".repeat(10_000);
        assert!(read(&wide).is_ok());
    }

    #[test]
    fn test_balance_message() {
        let err = check_balance(&tokenize("((a)")).unwrap_err();
        assert_eq!(err.to_string(), "UnbalancedStructure: 2 '(' but 1 ')'");
        assert!(check_balance(&tokenize("(a (b) c)")).is_ok());
    }
}
