//! Recognizer for Python-style tool call lists.
//!
//! Accepts `[name(arg=value, ...), ...]` or a single bare call. Values are
//! quoted strings, numbers, `True`/`False`/`None`, lists and dicts with
//! string keys. Every problem goes to the [`ErrorListener`]; parsing stops at
//! the first syntax error.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::parser_common::{strip_quotes, DefaultErrorListener, ErrorListener};

/// One recognized function invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Wire form used in assistant messages.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": { "name": self.name, "arguments": Value::Object(self.arguments.clone()) },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Str(String),
    Num(String),
    Punct(char),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
    line: usize,
    column: usize,
    text: String,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, line: 1, column: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    /// Tokenize the whole input, or report the first bad character.
    fn tokenize(mut self, listener: &mut dyn ErrorListener) -> Option<Vec<Token>> {
        let mut out = Vec::new();
        loop {
            while self.peek_char().is_some_and(char::is_whitespace) {
                self.bump();
            }
            let (start, line, column) = (self.pos, self.line, self.column);
            let Some(c) = self.peek_char() else {
                out.push(Token { tok: Tok::Eof, offset: start, line, column, text: String::new() });
                return Some(out);
            };
            let tok = if c.is_alphabetic() || c == '_' {
                while self.peek_char().is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.') {
                    self.bump();
                }
                Tok::Ident(self.src[start..self.pos].to_string())
            } else if c.is_ascii_digit() || c == '-' {
                self.bump();
                while self
                    .peek_char()
                    .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
                {
                    self.bump();
                }
                Tok::Num(self.src[start..self.pos].to_string())
            } else if c == '"' || c == '\'' {
                self.bump();
                let mut closed = false;
                while let Some(n) = self.bump() {
                    if n == '\\' {
                        self.bump();
                    } else if n == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    listener.syntax_error(line, column, Some(&self.src[start..]), "unterminated string");
                    return None;
                }
                Tok::Str(unescape(strip_quotes(&self.src[start..self.pos])))
            } else if "[](){},=:".contains(c) {
                self.bump();
                Tok::Punct(c)
            } else {
                listener.syntax_error(line, column, Some(&c.to_string()), "unexpected character");
                return None;
            };
            out.push(Token { tok, offset: start, line, column, text: self.src[start..self.pos].to_string() });
        }
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

struct Parser<'l> {
    tokens: Vec<Token>,
    pos: usize,
    listener: &'l mut dyn ErrorListener,
}

impl<'l> Parser<'l> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error<T>(&mut self, msg: &str) -> Option<T> {
        let token = self.peek().clone();
        let offending = if token.tok == Tok::Eof { "<EOF>" } else { token.text.as_str() };
        self.listener.syntax_error(token.line, token.column, Some(offending), msg);
        None
    }

    fn expect(&mut self, c: char) -> Option<()> {
        if self.peek().tok == Tok::Punct(c) {
            self.advance();
            Some(())
        } else {
            self.error(&format!("expected '{c}'"))
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek().tok == Tok::Punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn calls(&mut self) -> Option<Vec<ToolCall>> {
        let mut calls = Vec::new();
        if self.eat('[') {
            while !self.eat(']') {
                calls.push(self.call()?);
                if !self.eat(',') {
                    self.expect(']')?;
                    break;
                }
            }
        } else {
            calls.push(self.call()?);
        }
        if self.peek().tok != Tok::Eof {
            return self.error("trailing input after tool calls");
        }
        Some(calls)
    }

    fn call(&mut self) -> Option<ToolCall> {
        let name = match self.peek().tok.clone() {
            Tok::Ident(name) => {
                self.advance();
                name
            }
            _ => return self.error("expected function name"),
        };
        self.expect('(')?;
        let mut arguments = Map::new();
        while !self.eat(')') {
            let key_offset = self.peek().offset;
            let Tok::Ident(key) = self.peek().tok.clone() else {
                return self.error("expected keyword argument name");
            };
            self.advance();
            self.expect('=')?;
            let value = self.value()?;
            if arguments.insert(key, value).is_some() {
                let stop = self.peek().offset;
                self.listener.report_ambiguity(key_offset, stop, true, &[]);
            }
            if !self.eat(',') {
                self.expect(')')?;
                break;
            }
        }
        Some(ToolCall { name, arguments })
    }

    fn value(&mut self) -> Option<Value> {
        let scalar = match self.peek().tok.clone() {
            Tok::Str(s) => Some(Value::String(s)),
            Tok::Num(n) => match parse_number(&n) {
                Some(num) => Some(Value::Number(num)),
                None => return self.error("malformed number"),
            },
            Tok::Ident(id) => match id.as_str() {
                "True" | "true" => Some(Value::Bool(true)),
                "False" | "false" => Some(Value::Bool(false)),
                "None" | "null" => Some(Value::Null),
                _ => return self.error("expected a literal value"),
            },
            Tok::Punct('[') | Tok::Punct('{') => None,
            _ => return self.error("expected a value"),
        };
        if let Some(value) = scalar {
            self.advance();
            return Some(value);
        }

        if self.eat('[') {
            let mut items = Vec::new();
            while !self.eat(']') {
                items.push(self.value()?);
                if !self.eat(',') {
                    self.expect(']')?;
                    break;
                }
            }
            return Some(Value::Array(items));
        }

        self.expect('{')?;
        let mut map = Map::new();
        while !self.eat('}') {
            let Tok::Str(key) = self.peek().tok.clone() else {
                return self.error("expected string key");
            };
            self.advance();
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);
            if !self.eat(',') {
                self.expect('}')?;
                break;
            }
        }
        Some(Value::Object(map))
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(i) = text.parse::<i64>() {
        return Some(Number::from(i));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

/// Recognize tool calls in `text`, reporting every problem to `listener`.
///
/// Returns whatever was recognized before the first syntax error; callers
/// decide validity from the listener, not from the return value.
pub fn parse_tool_calls(text: &str, listener: &mut dyn ErrorListener) -> Vec<ToolCall> {
    let Some(tokens) = Lexer::new(text.trim()).tokenize(listener) else {
        return Vec::new();
    };
    let mut parser = Parser { tokens, pos: 0, listener };
    parser.calls().unwrap_or_default()
}

/// Recognize tool calls, returning `None` unless the parse was well-formed.
pub fn try_parse_tool_calls(text: &str) -> Option<Vec<ToolCall>> {
    let mut listener = DefaultErrorListener::new();
    let calls = parse_tool_calls(text, &mut listener);
    (listener.status() && !calls.is_empty()).then_some(calls)
}
