#[cfg(test)]
mod scanner_tests {
    use pretty_assertions::assert_eq;

    use rox::error::LoxError;
    use rox::scanner::*;
    use rox::token::*;

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let scanner = Scanner::new(source);
        let tokens: Vec<_> = scanner.filter_map(Result::ok).collect();

        assert_eq!(tokens.len(), expected.len());

        for (actual, (expected_type, expected_lexeme)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.token_type, *expected_type);
            assert_eq!(actual.lexeme, *expected_lexeme);
        }
    }

    #[test]
    fn test_scanner_01_symbols() {
        assert_token_sequence(
            "({*.,+*})",
            &[
                (TokenType::LEFT_PAREN, "("),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::STAR, "*"),
                (TokenType::DOT, "."),
                (TokenType::COMMA, ","),
                (TokenType::PLUS, "+"),
                (TokenType::STAR, "*"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::RIGHT_PAREN, ")"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_02_number_expression() {
        let (tokens, errors) = scan("1+2");
        assert!(errors.is_empty());

        let rendered: Vec<String> = tokens.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            ["NUMBER 1 1.0", "PLUS + null", "NUMBER 2 2.0", "EOF  null"]
        );
    }

    #[test]
    fn test_scanner_03_keywords_and_identifiers() {
        assert_token_sequence(
            "class B < A { base break continue this }",
            &[
                (TokenType::CLASS, "class"),
                (TokenType::IDENTIFIER, "B"),
                (TokenType::LESS, "<"),
                (TokenType::IDENTIFIER, "A"),
                (TokenType::LEFT_BRACE, "{"),
                (TokenType::BASE, "base"),
                (TokenType::BREAK, "break"),
                (TokenType::CONTINUE, "continue"),
                (TokenType::THIS, "this"),
                (TokenType::RIGHT_BRACE, "}"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_04_two_char_operators_and_comments() {
        assert_token_sequence(
            "!= == <= >= // ignored until newline\n/",
            &[
                (TokenType::BANG_EQUAL, "!="),
                (TokenType::EQUAL_EQUAL, "=="),
                (TokenType::LESS_EQUAL, "<="),
                (TokenType::GREATER_EQUAL, ">="),
                (TokenType::SLASH, "/"),
                (TokenType::EOF, ""),
            ],
        );
    }

    #[test]
    fn test_scanner_05_string_literal_spans_lines() {
        let (tokens, errors) = scan("\"a\nb\" x");
        assert!(errors.is_empty());

        assert_eq!(tokens[0].token_type, TokenType::STRING(String::new()));
        assert_eq!(tokens[0].lexeme, "\"a\nb\"");
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn test_scanner_06_unterminated_string() {
        let (tokens, errors) = scan("\"open");

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "[line 1] Error: Unterminated string.");
        assert_eq!(tokens.last().map(|t| t.token_type.clone()), Some(TokenType::EOF));
    }

    #[test]
    fn test_scanner_07_numbers() {
        // a trailing '.' is not part of the number
        assert_token_sequence(
            "123.",
            &[
                (TokenType::NUMBER(0.0), "123"),
                (TokenType::DOT, "."),
                (TokenType::EOF, ""),
            ],
        );

        let (tokens, errors) = scan("1.5 123.");
        assert!(errors.is_empty());

        let values: Vec<Option<f64>> = tokens
            .iter()
            .map(|t| match t.token_type {
                TokenType::NUMBER(n) => Some(n),
                _ => None,
            })
            .collect();
        assert_eq!(values, [Some(1.5), Some(123.0), None, None]);
        assert_eq!(tokens[0].to_string(), "NUMBER 1.5 1.5");
        assert_eq!(tokens[1].to_string(), "NUMBER 123 123.0");
    }

    #[test]
    fn test_unexpected_chars_token_sequence() {
        let source = ",.$(#";
        let scanner = Scanner::new(source);

        // Collect all results (both tokens and errors)
        let results: Vec<_> = scanner.collect();

        // We expect this sequence:
        // 0: COMMA ','
        // 1: DOT '.'
        // 2: Error for '$'
        // 3: LEFT_PAREN '('
        // 4: Error for '#'
        // 5: EOF
        assert_eq!(results.len(), 6, "Expected 6 items in result");

        assert_token_matches(&results[0], TokenType::COMMA, ",");
        assert_token_matches(&results[1], TokenType::DOT, ".");
        assert_token_matches(&results[3], TokenType::LEFT_PAREN, "(");
        assert_token_matches(&results[5], TokenType::EOF, "");

        let error_count = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(error_count, 2, "Expected 2 error messages");

        for err in results.iter().filter_map(|r| r.as_ref().err()) {
            assert!(
                err.to_string().contains("Unexpected character"),
                "Error message should contain 'Unexpected character', got: {}",
                err
            );
        }

        // Helper function
        fn assert_token_matches(
            result: &Result<Token, LoxError>,
            expected_type: TokenType,
            expected_lexeme: &str,
        ) {
            match result {
                Ok(token) => {
                    assert_eq!(
                        token.token_type, expected_type,
                        "Expected token type {:?}, got {:?}",
                        expected_type, token.token_type
                    );
                    assert_eq!(
                        token.lexeme, expected_lexeme,
                        "Expected lexeme '{}', got '{}'",
                        expected_lexeme, token.lexeme
                    );
                }
                Err(e) => panic!("Expected token but got error: {}", e),
            }
        }
    }
}
