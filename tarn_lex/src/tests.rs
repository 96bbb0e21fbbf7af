//! Scanner tests: number classification, punctuation, comments, errors.

use crate::scan::{LexError, Scanner};
use crate::token::{CType, Token, TokenKind};

fn scan_all(source: &str) -> Vec<Token> {
    let mut scanner = Scanner::new(source);
    let mut tokens = Vec::new();
    loop {
        let t = scanner.next_token().unwrap();
        if t.kind == TokenKind::Eof {
            return tokens;
        }
        tokens.push(t);
    }
}

fn scan_err(source: &str) -> LexError {
    let mut scanner = Scanner::new(source);
    loop {
        match scanner.next_token() {
            Ok(t) if t.kind == TokenKind::Eof => panic!("expected an error in {source:?}"),
            Ok(_) => {}
            Err(e) => return e,
        }
    }
}

#[test]
fn classifies_number_literals() {
    let source = "
0 00 0x0 0b0
1 1u
4'000'000'000 4'000'000'000u 0xFFFF'FFFF 0x7FFF'FFFF
0b101 077 0x7aFAf
";
    let expected: &[(CType, u64)] = &[
        (CType::S32, 0),
        (CType::S32, 0),
        (CType::S32, 0),
        (CType::S32, 0),
        (CType::S32, 1),
        (CType::U32, 1),
        (CType::S64, 4_000_000_000),
        (CType::U32, 4_000_000_000),
        (CType::U32, 0xFFFF_FFFF),
        (CType::S32, 0x7FFF_FFFF),
        (CType::S32, 5),
        (CType::S32, 63),
        (CType::S32, 0x7aFAf),
    ];

    let tokens = scan_all(source);
    assert_eq!(tokens.len(), expected.len());
    for (t, &(ctype, zext)) in tokens.iter().zip(expected) {
        assert_eq!(t.kind, TokenKind::Number { zext, ctype }, "{}", t.lexeme(source));
    }
}

#[test]
fn classifies_64_bit_boundaries() {
    let tokens = scan_all("9223372036854775807 18446744073709551615u 0xFFFFFFFFFFFFFFFF");
    assert_eq!(
        tokens[0].kind,
        TokenKind::Number { zext: i64::MAX as u64, ctype: CType::S64 }
    );
    assert_eq!(
        tokens[1].kind,
        TokenKind::Number { zext: u64::MAX, ctype: CType::U64 }
    );
    assert_eq!(
        tokens[2].kind,
        TokenKind::Number { zext: u64::MAX, ctype: CType::U64 }
    );
}

#[test]
fn punctuation_and_names() {
    let source = "x = { y , - 1 }";
    let tokens = scan_all(source);
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        [
            TokenKind::Name,
            TokenKind::Assign,
            TokenKind::LBrace,
            TokenKind::Name,
            TokenKind::Comma,
            TokenKind::Minus,
            TokenKind::Number { zext: 1, ctype: CType::S32 },
            TokenKind::RBrace,
        ]
    );
    assert_eq!(tokens[0].lexeme(source), "x");
    assert_eq!(tokens[3].lexeme(source), "y");
}

#[test]
fn name_characters() {
    let source = "_x9 Abc_09";
    let tokens = scan_all(source);
    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].lexeme(source), "_x9");
    assert_eq!(tokens[1].lexeme(source), "Abc_09");
}

#[test]
fn comments_are_skipped_and_lines_counted() {
    let source = "a // to end of line\nb /* one\ntwo\nthree */ c\nd";
    let tokens = scan_all(source);
    let lines: Vec<(String, u32)> = tokens
        .iter()
        .map(|t| (t.lexeme(source).to_string(), t.line))
        .collect();
    assert_eq!(
        lines,
        [
            ("a".to_string(), 1),
            ("b".to_string(), 2),
            ("c".to_string(), 4),
            ("d".to_string(), 5),
        ]
    );
}

#[test]
fn slash_star_slash_is_not_a_whole_comment() {
    // `/*/` only opens a comment; the next `*/` closes it.
    let tokens = scan_all("a /*/ still a comment */ b");
    assert_eq!(tokens.len(), 2);
}

#[test]
fn unterminated_block_comment_fails() {
    assert_eq!(
        scan_err("a /* never closed"),
        LexError::UnterminatedBlockComment { line: 1 }
    );
}

#[test]
fn stray_comment_close_fails() {
    assert_eq!(scan_err("a */ b"), LexError::StrayCommentClose { line: 1 });
}

#[test]
fn dangling_digit_separator_fails() {
    assert_eq!(scan_err("0xAB'"), LexError::DanglingDigitSeparator { line: 1 });
    assert_eq!(scan_err("1' "), LexError::DanglingDigitSeparator { line: 1 });
}

#[test]
fn oversized_literals_fail() {
    // One past u64::MAX.
    assert_eq!(
        scan_err("18446744073709551616"),
        LexError::IntegerTooLarge { line: 1 }
    );
    // Unsuffixed signed decimal cannot represent 2^63.
    assert_eq!(
        scan_err("9223372036854775808"),
        LexError::IntegerTooLarge { line: 1 }
    );
    assert_eq!(
        scan_err("0x1FFFFFFFFFFFFFFFF"),
        LexError::IntegerTooLarge { line: 1 }
    );
}

#[test]
fn float_forms_are_unsupported() {
    assert_eq!(scan_err("1.5"), LexError::UnsupportedLiteral { line: 1 });
    assert_eq!(scan_err("1e6"), LexError::UnsupportedLiteral { line: 1 });
    assert_eq!(scan_err("0.0"), LexError::UnsupportedLiteral { line: 1 });
}

#[test]
fn unknown_suffixes_are_unsupported() {
    assert_eq!(scan_err("1L"), LexError::UnsupportedLiteral { line: 1 });
    assert_eq!(scan_err("09"), LexError::UnsupportedLiteral { line: 1 });
}

#[test]
fn invalid_bytes_fail_with_position() {
    assert_eq!(
        scan_err("a\n$"),
        LexError::InvalidByte { line: 2, byte: b'$' }
    );
}

#[test]
fn ctype_rank_helpers() {
    assert!(CType::S32.is_integer());
    assert!(CType::U64.is_integer());
    assert!(!CType::Bool.is_integer());
    assert!(CType::Bool.is_integer_or_bool());
    assert!(!CType::Void.is_integer_or_bool());
    assert_eq!(CType::S32.make_unsigned(), CType::U32);
    assert_eq!(CType::SLongLong.make_unsigned(), CType::U64);
    assert_eq!(CType::U32.make_unsigned(), CType::U32);
}
