//! Tokenizer for guard and variable-update expressions.

use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Str(String),
    True,
    False,
    /// `$input.<InputName>.<dotted.path>`
    Input { input: String, path: String },
    /// `$variable.<name>`
    Variable(String),
    Plus,
    Minus,
    Star,
    Slash,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Equal,
    NotEqual,
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
    Eof,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string '{s}'"),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Input { input, path } => format!("'$input.{input}.{path}'"),
            Token::Variable(name) => format!("'$variable.{name}'"),
            Token::Plus => "'+'".to_string(),
            Token::Minus => "'-'".to_string(),
            Token::Star => "'*'".to_string(),
            Token::Slash => "'/'".to_string(),
            Token::Greater => "'>'".to_string(),
            Token::GreaterEq => "'>='".to_string(),
            Token::Less => "'<'".to_string(),
            Token::LessEq => "'<='".to_string(),
            Token::Equal => "'=='".to_string(),
            Token::NotEqual => "'!='".to_string(),
            Token::And => "'&&'".to_string(),
            Token::Or => "'||'".to_string(),
            Token::Not => "'!'".to_string(),
            Token::LeftParen => "'('".to_string(),
            Token::RightParen => "')'".to_string(),
            Token::Eof => "end of expression".to_string(),
        }
    }
}

/// A token and the character offset where it starts.
pub(crate) type Spanned = (Token, usize);

pub(crate) fn tokenize(input: &str) -> Result<Vec<Spanned>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let start = i;
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
            }
            '0'..='9' | '.' => {
                let (n, next) = number(&chars, i)?;
                tokens.push((Token::Number(n), start));
                i = next;
            }
            '\'' | '"' => {
                let (s, next) = string(&chars, i)?;
                tokens.push((Token::Str(s), start));
                i = next;
            }
            '$' => {
                let (token, next) = reference(&chars, i)?;
                tokens.push((token, start));
                i = next;
            }
            c if c.is_ascii_alphabetic() => {
                let (word, next) = identifier(&chars, i);
                let token = match word.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    _ => {
                        return Err(ExprError::new(
                            format!("unknown identifier '{word}' (references start with '$input.' or '$variable.')"),
                            start,
                        ))
                    }
                };
                tokens.push((token, start));
                i = next;
            }
            '+' => {
                tokens.push((Token::Plus, start));
                i += 1;
            }
            '-' => {
                tokens.push((Token::Minus, start));
                i += 1;
            }
            '*' => {
                tokens.push((Token::Star, start));
                i += 1;
            }
            '/' => {
                tokens.push((Token::Slash, start));
                i += 1;
            }
            '(' => {
                tokens.push((Token::LeftParen, start));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RightParen, start));
                i += 1;
            }
            '>' | '<' | '=' | '!' | '&' | '|' => {
                let (token, next) = operator(&chars, i)?;
                tokens.push((token, start));
                i = next;
            }
            other => {
                return Err(ExprError::new(format!("unexpected character '{other}'"), start));
            }
        }
    }

    tokens.push((Token::Eof, chars.len()));
    Ok(tokens)
}

fn number(chars: &[char], start: usize) -> Result<(f64, usize), ExprError> {
    let mut i = start;
    let mut seen_dot = false;
    while i < chars.len() && (chars[i].is_ascii_digit() || (chars[i] == '.' && !seen_dot)) {
        if chars[i] == '.' {
            seen_dot = true;
        }
        i += 1;
    }
    // Optional exponent: 1e3, 2.5E-2
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            while j < chars.len() && chars[j].is_ascii_digit() {
                j += 1;
            }
            i = j;
        }
    }

    let text: String = chars[start..i].iter().collect();
    let value = text
        .parse::<f64>()
        .map_err(|_| ExprError::new(format!("invalid number '{text}'"), start))?;
    Ok((value, i))
}

fn string(chars: &[char], start: usize) -> Result<(String, usize), ExprError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                out.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return Ok((out, i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(ExprError::new("unterminated string literal", start))
}

fn identifier(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

/// One path segment: a bare identifier or a backtick-quoted name.
fn segment(chars: &[char], start: usize) -> Result<(String, usize), ExprError> {
    if start < chars.len() && chars[start] == '`' {
        let mut i = start + 1;
        while i < chars.len() && chars[i] != '`' {
            i += 1;
        }
        if i >= chars.len() {
            return Err(ExprError::new("unterminated quoted name", start));
        }
        let name: String = chars[start + 1..i].iter().collect();
        if name.is_empty() {
            return Err(ExprError::new("empty quoted name", start));
        }
        return Ok((name, i + 1));
    }

    let (name, next) = identifier(chars, start);
    if name.is_empty() {
        return Err(ExprError::new("expected a name after '.'", start));
    }
    Ok((name, next))
}

/// Dot-separated segments following `start`, which must point at a `.`.
fn segments(chars: &[char], start: usize) -> Result<(Vec<String>, usize), ExprError> {
    let mut parts = Vec::new();
    let mut i = start;
    while i < chars.len() && chars[i] == '.' {
        let (part, next) = segment(chars, i + 1)?;
        parts.push(part);
        i = next;
    }
    Ok((parts, i))
}

fn reference(chars: &[char], start: usize) -> Result<(Token, usize), ExprError> {
    let (kind, after_kind) = identifier(chars, start + 1);
    let (parts, next) = segments(chars, after_kind)?;

    match kind.as_str() {
        "input" => {
            if parts.len() < 2 {
                return Err(ExprError::new(
                    "input reference must look like '$input.<InputName>.<path>'",
                    start,
                ));
            }
            let mut parts = parts.into_iter();
            let input = parts.next().unwrap_or_default();
            let path = parts.collect::<Vec<_>>().join(".");
            Ok((Token::Input { input, path }, next))
        }
        "variable" => {
            if parts.len() != 1 {
                return Err(ExprError::new(
                    "variable reference must look like '$variable.<name>'",
                    start,
                ));
            }
            let name = parts.into_iter().next().unwrap_or_default();
            Ok((Token::Variable(name), next))
        }
        other => Err(ExprError::new(
            format!("unknown reference '${other}' (expected '$input' or '$variable')"),
            start,
        )),
    }
}

fn operator(chars: &[char], start: usize) -> Result<(Token, usize), ExprError> {
    let next = chars.get(start + 1).copied();
    let token = match (chars[start], next) {
        ('>', Some('=')) => return Ok((Token::GreaterEq, start + 2)),
        ('<', Some('=')) => return Ok((Token::LessEq, start + 2)),
        ('=', Some('=')) => return Ok((Token::Equal, start + 2)),
        ('!', Some('=')) => return Ok((Token::NotEqual, start + 2)),
        ('&', Some('&')) => return Ok((Token::And, start + 2)),
        ('|', Some('|')) => return Ok((Token::Or, start + 2)),
        ('>', _) => Token::Greater,
        ('<', _) => Token::Less,
        ('!', _) => Token::Not,
        ('=', _) => {
            return Err(ExprError::new("single '=' is not an operator; use '=='", start));
        }
        (c, _) => {
            return Err(ExprError::new(format!("'{c}' must be doubled ('{c}{c}')"), start));
        }
    };
    Ok((token, start + 1))
}
