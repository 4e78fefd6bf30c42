//! Tokenizer for the SAGE expression DSL.
//!
//! A hand-rolled, zero-copy tokenizer producing a flat token stream with
//! source positions, over a small pandas-flavored predicate grammar.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Operator,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub offset: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LexError {
    #[error("unterminated string literal starting at byte {0}")]
    UnterminatedString(usize),
    #[error("unexpected character '{0}' at byte {1}")]
    UnexpectedChar(char, usize),
}

/// Tokenize `source` into a flat stream, always ending in `TokenKind::Eof`.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        match c {
            '(' => {
                tokens.push(tok(TokenKind::LeftParen, "(", i));
                i += 1;
            }
            ')' => {
                tokens.push(tok(TokenKind::RightParen, ")", i));
                i += 1;
            }
            '[' => {
                tokens.push(tok(TokenKind::LeftBracket, "[", i));
                i += 1;
            }
            ']' => {
                tokens.push(tok(TokenKind::RightBracket, "]", i));
                i += 1;
            }
            ',' => {
                tokens.push(tok(TokenKind::Comma, ",", i));
                i += 1;
            }
            '.' => {
                tokens.push(tok(TokenKind::Dot, ".", i));
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let start = i;
                i += 1;
                let mut value = String::new();
                let mut closed = false;
                while i < bytes.len() {
                    let ch = bytes[i] as char;
                    if ch == quote {
                        i += 1;
                        closed = true;
                        break;
                    }
                    if ch == '\\' && i + 1 < bytes.len() {
                        value.push(bytes[i + 1] as char);
                        i += 2;
                        continue;
                    }
                    value.push(ch);
                    i += 1;
                }
                if !closed {
                    return Err(LexError::UnterminatedString(start));
                }
                tokens.push(tok(TokenKind::String, &value, start));
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                let start = i;
                let mut op = String::new();
                op.push(c);
                i += 1;
                if i < bytes.len() {
                    let next = bytes[i] as char;
                    let combined = match (c, next) {
                        ('=', '=') | ('!', '=') | ('<', '=') | ('>', '=') | ('&', '&') | ('|', '|') => true,
                        _ => false,
                    };
                    if combined {
                        op.push(next);
                        i += 1;
                    }
                }
                tokens.push(tok(TokenKind::Operator, &op, start));
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(tok(TokenKind::Operator, &c.to_string(), i));
                i += 1;
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_digit() || bytes[i] as char == '.')
                {
                    i += 1;
                }
                tokens.push(tok(TokenKind::Number, &source[start..i], start));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_alphanumeric() || bytes[i] as char == '_')
                {
                    i += 1;
                }
                let word = &source[start..i];
                if word == "and" || word == "or" || word == "not" {
                    tokens.push(tok(TokenKind::Operator, word, start));
                } else {
                    tokens.push(tok(TokenKind::Identifier, word, start));
                }
            }
            other => return Err(LexError::UnexpectedChar(other, i)),
        }
    }

    tokens.push(tok(TokenKind::Eof, "", bytes.len()));
    Ok(tokens)
}

fn tok(kind: TokenKind, text: &str, offset: usize) -> Token {
    Token {
        kind,
        text: text.to_owned(),
        offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_simple_comparison() {
        let tokens = lex("total == cantidad * precio_unitario").unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_string_literal_with_escape() {
        let tokens = lex(r#"str.contains('it\'s')"#).unwrap();
        assert_eq!(tokens[4].kind, TokenKind::String);
        assert_eq!(tokens[4].text, "it's");
    }

    #[test]
    fn lexes_multi_table_indexing() {
        let tokens = lex("df['ventas']['customer_id']").unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::LeftBracket,
                TokenKind::String,
                TokenKind::RightBracket,
                TokenKind::LeftBracket,
                TokenKind::String,
                TokenKind::RightBracket,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_errors() {
        assert_eq!(lex("'abc"), Err(LexError::UnterminatedString(0)));
    }

    #[test]
    fn combined_operators() {
        let tokens = lex(">= <= == != && ||").unwrap();
        let ops: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenKind::Operator)
            .map(|t| t.text.as_str())
            .collect();
        assert_eq!(ops, vec![">=", "<=", "==", "!=", "&&", "||"]);
    }
}
