use sprig::{
    lexer::{unquote, Lexer, TokenKind},
    DiagnosticKind, Position,
};

fn lexemes(source: &str) -> Vec<String> {
    Lexer::new(source)
        .tokenize()
        .expect("tokenize")
        .into_iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| t.lexeme)
        .collect()
}

fn kinds(source: &str) -> Vec<TokenKind> {
    Lexer::new(source)
        .tokenize()
        .expect("tokenize")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn splits_call_with_string_argument() {
    assert_eq!(
        lexemes(r#"max("aab", 81)"#),
        vec!["max", "(", "\"aab\"", ",", "81", ")"]
    );
}

#[test]
fn two_char_operators_win_over_one_char() {
    use TokenKind::*;
    assert_eq!(
        kinds("a == b != c >= d <= e = f"),
        vec![
            Identifier, EqualEqual, Identifier, NotEqual, Identifier, GreaterEqual,
            Identifier, LessEqual, Identifier, Equals, Identifier, Eof
        ]
    );
}

#[test]
fn keywords_are_whole_words_only() {
    use TokenKind::*;
    assert_eq!(
        kinds("if iffy var variable not nothing"),
        vec![If, Identifier, Var, Identifier, Not, Identifier, Eof]
    );
}

#[test]
fn numbers_take_one_decimal_point() {
    assert_eq!(lexemes("9.81 .5 12"), vec!["9.81", ".5", "12"]);
    assert_eq!(lexemes("1.2.3"), vec!["1.2", ".3"]);
}

#[test]
fn escaped_quote_stays_inside_string() {
    let tokens = Lexer::new(r#""say \"hi\"""#).tokenize().expect("tokenize");
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(unquote(&tokens[0].lexeme), "say \"hi\"");
}

#[test]
fn unterminated_string_is_lexer_error() {
    let err = Lexer::new("\"aab").tokenize().unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Lexer);
    assert!(err.message.contains("unterminated"));
}

#[test]
fn newline_inside_string_is_lexer_error() {
    let err = Lexer::new("\"ab\ncd\"").tokenize().unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Lexer);
}

#[test]
fn unknown_character_reports_position_and_expected() {
    let err = Lexer::new("var a = 1\nvar b = @").tokenize().unwrap_err();
    assert_eq!(err.kind, DiagnosticKind::Lexer);
    assert_eq!(err.position, Some(Position { line: 2, column: 9 }));
    assert!(err.expected.iter().any(|e| e == "identifier"));
}
