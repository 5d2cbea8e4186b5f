//! Minimal placeholder parser producing template nodes.
//!
//! Templates are plain text with `{expression}` placeholders:
//!
//! - `\{` emits a literal brace;
//! - a `{` followed by whitespace, `{`, `}` or the end of input is plain text;
//! - expressions follow `[namespace:]part(.part)*` where a part is `name` or
//!   `name(arg, ...)` and each argument is itself an expression;
//! - `'text'`, `"text"`, numbers, `true`, `false` and `null` are literals.
//!
//! There are no sections, loops or includes.

use std::{mem, sync::Arc};

use serde_json::Value;
use stencil_types::{Expression, Origin, Part};

use crate::{
    EngineError,
    node::{ExpressionNode, TemplateNode},
};

/// Parses template source into nodes, tagging expressions with `template_id`.
pub fn parse_template(template_id: &str, source: &str) -> Result<Vec<TemplateNode>, EngineError> {
    let bytes = source.as_bytes();
    let mut nodes = Vec::new();
    let mut text = String::new();
    let mut line = 1;
    let mut index = 0;
    let mut text_start = 0;

    while index < bytes.len() {
        match bytes[index] {
            b'\n' => {
                line += 1;
                index += 1;
            }
            b'\\' if bytes.get(index + 1) == Some(&b'{') => {
                text.push_str(&source[text_start..index]);
                text_start = index + 1;
                index += 2;
            }
            b'{' if opens_placeholder(bytes.get(index + 1)) => {
                let Some(end) = find_closing_brace(bytes, index + 1) else {
                    return Err(EngineError::parse(template_id, line, "unterminated expression"));
                };
                text.push_str(&source[text_start..index]);
                if !text.is_empty() {
                    nodes.push(TemplateNode::Text(Arc::from(mem::take(&mut text))));
                }
                let content = &source[index + 1..end];
                let expression = parse_expression(content.trim_end(), Origin::new(template_id, line))
                    .map_err(|message| EngineError::parse(template_id, line, message))?;
                nodes.push(TemplateNode::Expression(Arc::new(ExpressionNode::new(expression))));
                line += content.matches('\n').count();
                index = end + 1;
                text_start = index;
            }
            _ => index += 1,
        }
    }

    text.push_str(&source[text_start..]);
    if !text.is_empty() {
        nodes.push(TemplateNode::Text(Arc::from(text)));
    }
    Ok(nodes)
}

/// Parses the content of a single placeholder, without braces.
pub fn parse_expression(source: &str, origin: Origin) -> Result<Expression, String> {
    let mut parser = ExpressionParser {
        source,
        position: 0,
        origin,
    };
    let expression = parser.expression()?;
    parser.skip_whitespace();
    if parser.position < source.len() {
        return Err(format!("unexpected `{}` in expression `{source}`", &source[parser.position..]));
    }
    Ok(expression)
}

fn opens_placeholder(next: Option<&u8>) -> bool {
    matches!(next, Some(byte) if !byte.is_ascii_whitespace() && *byte != b'{' && *byte != b'}')
}

/// Finds the `}` closing a placeholder, skipping braces inside quoted literals.
fn find_closing_brace(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote = None;
    let mut escaped = false;
    for (offset, &byte) in bytes[start..].iter().enumerate() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if byte == b'\\' => escaped = true,
            Some(open) if byte == open => quote = None,
            Some(_) => {}
            None => match byte {
                b'\'' | b'"' => quote = Some(byte),
                b'}' => return Some(start + offset),
                _ => {}
            },
        }
    }
    None
}

fn keyword_literal(name: &str) -> Option<Value> {
    match name {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "null" => Some(Value::Null),
        _ => None,
    }
}

struct ExpressionParser<'a> {
    source: &'a str,
    position: usize,
    origin: Origin,
}

impl ExpressionParser<'_> {
    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.position).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|byte| byte.is_ascii_whitespace()) {
            self.position += 1;
        }
    }

    fn expression(&mut self) -> Result<Expression, String> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(format!("empty expression in `{}`", self.source)),
            Some(quote @ (b'\'' | b'"')) => self.string_literal(quote),
            Some(byte) if byte.is_ascii_digit() || byte == b'-' => self.number_literal(),
            Some(_) => self.path(),
        }
    }

    fn path(&mut self) -> Result<Expression, String> {
        let mut namespace = None;
        let mut name = self.identifier()?;
        if self.peek() == Some(b':') {
            self.position += 1;
            namespace = Some(name);
            name = self.identifier()?;
        }
        if namespace.is_none()
            && !matches!(self.peek(), Some(b'.' | b'('))
            && let Some(value) = keyword_literal(&name)
        {
            return Ok(Expression::literal(value, self.origin.clone()));
        }

        let mut parts = Vec::new();
        loop {
            let part = if self.peek() == Some(b'(') {
                self.position += 1;
                Part::virtual_method(name, self.arguments()?)
            } else {
                Part::property(name)
            };
            parts.push(part);
            if self.peek() != Some(b'.') {
                break;
            }
            self.position += 1;
            name = self.identifier()?;
        }
        Ok(Expression::new(namespace, parts, self.origin.clone()))
    }

    fn arguments(&mut self) -> Result<Vec<Expression>, String> {
        let mut arguments = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b')') {
            self.position += 1;
            return Ok(arguments);
        }
        loop {
            arguments.push(self.expression()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.position += 1,
                Some(b')') => {
                    self.position += 1;
                    return Ok(arguments);
                }
                _ => return Err(format!("expected `,` or `)` in `{}`", self.source)),
            }
        }
    }

    fn identifier(&mut self) -> Result<String, String> {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
        {
            self.position += 1;
        }
        if start == self.position {
            return Err(format!("expected a name at offset {start} in `{}`", self.source));
        }
        Ok(self.source[start..self.position].to_string())
    }

    fn string_literal(&mut self, quote: u8) -> Result<Expression, String> {
        let body_start = self.position + 1;
        let mut value = String::new();
        let mut characters = self.source[body_start..].char_indices();
        while let Some((offset, character)) = characters.next() {
            match character {
                '\\' => {
                    if let Some((_, escaped)) = characters.next() {
                        value.push(escaped);
                    }
                }
                closing if closing == char::from(quote) => {
                    self.position = body_start + offset + 1;
                    return Ok(Expression::literal(Value::String(value), self.origin.clone()));
                }
                other => value.push(other),
            }
        }
        Err(format!("unterminated string literal in `{}`", self.source))
    }

    fn number_literal(&mut self) -> Result<Expression, String> {
        let start = self.position;
        while self
            .peek()
            .is_some_and(|byte| byte.is_ascii_digit() || matches!(byte, b'.' | b'-' | b'+' | b'e' | b'E'))
        {
            self.position += 1;
        }
        let raw = &self.source[start..self.position];
        serde_json::from_str::<Value>(raw)
            .map(|value| Expression::literal(value, self.origin.clone()))
            .map_err(|_| format!("invalid number literal `{raw}`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expressions(nodes: &[TemplateNode]) -> Vec<String> {
        nodes
            .iter()
            .filter_map(|node| match node {
                TemplateNode::Expression(node) => Some(node.expression().to_original_string()),
                TemplateNode::Text(_) => None,
            })
            .collect()
    }

    fn texts(nodes: &[TemplateNode]) -> Vec<&str> {
        nodes
            .iter()
            .filter_map(|node| match node {
                TemplateNode::Text(text) => Some(&**text),
                TemplateNode::Expression(_) => None,
            })
            .collect()
    }

    #[test]
    fn splits_text_and_placeholders() {
        let nodes = parse_template("hello", "Hello {foo} and {msg:greet(user.name, 'x').length}!").unwrap();
        assert_eq!(texts(&nodes), vec!["Hello ", " and ", "!"]);
        assert_eq!(expressions(&nodes), vec!["foo", "msg:greet(user.name, 'x').length"]);
    }

    #[test]
    fn braces_that_do_not_open_placeholders_stay_text() {
        let nodes = parse_template("t", "a { b } \\{c} {} end{").unwrap();
        assert_eq!(texts(&nodes), vec!["a { b } {c} {} end{"]);
    }

    #[test]
    fn quoted_braces_do_not_close_placeholders() {
        let nodes = parse_template("t", "{name.or('}')}").unwrap();
        assert_eq!(expressions(&nodes), vec!["name.or('}')"]);
    }

    #[test]
    fn origins_carry_line_numbers() {
        let nodes = parse_template("lines", "first\nsecond {a}\n\n{b}").unwrap();
        let lines: Vec<usize> = nodes
            .iter()
            .filter_map(|node| match node {
                TemplateNode::Expression(node) => Some(node.expression().origin().line),
                TemplateNode::Text(_) => None,
            })
            .collect();
        assert_eq!(lines, vec![2, 4]);
    }

    #[test]
    fn unterminated_placeholder_reports_line() {
        let error = parse_template("broken", "ok\n{oops").unwrap_err();
        assert!(matches!(error, EngineError::Parse { line: 2, ref template_id, .. } if template_id == "broken"));
    }

    #[test]
    fn literals_are_recognized() {
        let origin = Origin::new("t", 1);
        let cases = [("'it''", None), ("\"hi\"", Some(json!("hi"))), ("42", Some(json!(42))), ("-1.5", Some(json!(-1.5))), ("true", Some(json!(true))), ("null", Some(Value::Null))];
        for (source, expected) in cases {
            match expected {
                Some(value) => assert_eq!(parse_expression(source, origin.clone()).unwrap().literal_value(), Some(&value)),
                None => assert!(parse_expression(source, origin.clone()).is_err()),
            }
        }
    }

    #[test]
    fn keywords_followed_by_parts_are_paths() {
        let expression = parse_expression("true.size", Origin::default()).unwrap();
        assert!(!expression.is_literal());
        assert_eq!(expression.parts().len(), 2);
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let expression = parse_expression(r"'it\'s'", Origin::default()).unwrap();
        assert_eq!(expression.literal_value(), Some(&json!("it's")));
    }

    #[test]
    fn nested_arguments_parse_recursively() {
        let expression = parse_expression("items.get(index.or(0))", Origin::default()).unwrap();
        let arguments = expression.parts()[1].parameters();
        assert_eq!(arguments.len(), 1);
        assert_eq!(arguments[0].to_original_string(), "index.or(0)");
        assert!(arguments[0].parts()[1].parameters()[0].is_literal());
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for source in ["a..b", "a(1", "a b", "ns:", "'open"] {
            assert!(parse_expression(source, Origin::default()).is_err(), "{source} should fail");
        }
    }
}
