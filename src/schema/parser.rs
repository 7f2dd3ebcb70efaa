//! Recursive descent parser for schema files.
//!
//! Builds a [`SchemaFile`] from the token stream. Comments are surfaced as
//! body elements where a statement may start and skipped everywhere else.

use super::lexer::{tokenize, Span, Token};
use super::*;
use crate::errors::{ProtoGraphError, Result};
use crate::types::Syntax;

/// Parses schema source text. `path` is only used for error reporting.
pub fn parse_schema(path: &str, source: &str) -> Result<SchemaFile> {
    let tokens = tokenize(source).map_err(|span| ProtoGraphError::Parse {
        message: format!(
            "unexpected character '{}'",
            source.get(span.clone()).unwrap_or("?")
        ),
        path: path.to_string(),
        line: Some(line_of(source, span.start)),
    })?;
    let mut parser = Parser::new(path, source, tokens);
    parser.parse_file()
}

fn line_of(source: &str, offset: usize) -> u32 {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() as u32 + 1
}

/// The parser state.
struct Parser<'a> {
    path: &'a str,
    source: &'a str,
    tokens: Vec<(Token, Span)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(path: &'a str, source: &'a str, tokens: Vec<(Token, Span)>) -> Self {
        Self {
            path,
            source,
            tokens,
            pos: 0,
        }
    }

    // =========================================================================
    // Token inspection
    // =========================================================================

    /// Index of the next non-comment token at or after `pos`.
    fn significant_index(&self, mut idx: usize) -> usize {
        while idx < self.tokens.len() && self.tokens[idx].0.is_comment() {
            idx += 1;
        }
        idx
    }

    fn peek(&self) -> Option<&Token> {
        self.nth(0)
    }

    /// Looks ahead `n` significant tokens without consuming anything.
    fn nth(&self, n: usize) -> Option<&Token> {
        let mut idx = self.significant_index(self.pos);
        for _ in 0..n {
            idx = self.significant_index(idx + 1);
        }
        self.tokens.get(idx).map(|(t, _)| t)
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == keyword)
    }

    /// Byte span of the `n`-th significant token ahead.
    fn nth_span(&self, n: usize) -> Option<&Span> {
        let mut idx = self.significant_index(self.pos);
        for _ in 0..n {
            idx = self.significant_index(idx + 1);
        }
        self.tokens.get(idx).map(|(_, span)| span)
    }

    fn nth_is_ident(&self, n: usize) -> bool {
        matches!(self.nth(n), Some(Token::Ident(_)))
    }

    fn current_line(&self) -> u32 {
        let idx = self.significant_index(self.pos);
        let offset = self
            .tokens
            .get(idx)
            .map(|(_, span)| span.start)
            .unwrap_or(self.source.len());
        line_of(self.source, offset)
    }

    /// Consumes and returns the next significant token.
    fn bump(&mut self) -> Option<Token> {
        self.pos = self.significant_index(self.pos);
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Takes a pending comment token, if the very next token is one.
    fn take_comment(&mut self) -> Option<String> {
        match self.tokens.get(self.pos) {
            Some((Token::LineComment(text), _)) | Some((Token::BlockComment(text), _)) => {
                let text = text.clone();
                self.pos += 1;
                Some(text)
            }
            _ => None,
        }
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        Err(ProtoGraphError::Parse {
            message: message.into(),
            path: self.path.to_string(),
            line: Some(self.current_line()),
        })
    }

    fn describe_next(&self) -> String {
        self.peek()
            .map(|t| format!("'{}'", t.text()))
            .unwrap_or_else(|| "end of file".to_string())
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.at(&token) {
            self.bump();
            return Ok(());
        }
        self.error(format!(
            "expected '{}', found {}",
            token.text(),
            self.describe_next()
        ))
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.at_keyword(keyword) {
            self.bump();
            return Ok(());
        }
        self.error(format!(
            "expected '{keyword}', found {}",
            self.describe_next()
        ))
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Ident(_)) => match self.bump() {
                Some(Token::Ident(name)) => Ok(name),
                _ => self.error("expected identifier"),
            },
            _ => self.error(format!(
                "expected identifier, found {}",
                self.describe_next()
            )),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Str(_)) => match self.bump() {
                Some(Token::Str(value)) => Ok(value),
                _ => self.error("expected string"),
            },
            _ => self.error(format!("expected string, found {}", self.describe_next())),
        }
    }

    /// `ident { "." ident }`, with an optional leading `.` for fully qualified names.
    fn full_ident(&mut self) -> Result<String> {
        let mut name = String::new();
        if self.eat(&Token::Dot) {
            name.push('.');
        }
        name.push_str(&self.expect_ident()?);
        while self.at(&Token::Dot) {
            self.bump();
            name.push('.');
            name.push_str(&self.expect_ident()?);
        }
        Ok(name)
    }

    fn int_literal(&mut self) -> Result<i64> {
        let negative = self.eat(&Token::Minus);
        let text = match self.peek() {
            Some(Token::Int(_)) => match self.bump() {
                Some(Token::Int(text)) => text,
                _ => return self.error("expected integer"),
            },
            _ => {
                return self.error(format!(
                    "expected integer, found {}",
                    self.describe_next()
                ))
            }
        };
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16),
            None if text.len() > 1 && text.starts_with('0') => i64::from_str_radix(&text[1..], 8),
            None => text.parse::<i64>(),
        };
        match parsed {
            Ok(value) if negative => Ok(-value),
            Ok(value) => Ok(value),
            Err(_) => self.error(format!("invalid integer literal '{text}'")),
        }
    }

    fn field_number(&mut self) -> Result<u32> {
        let value = self.int_literal()?;
        match u32::try_from(value) {
            Ok(number) => Ok(number),
            Err(_) => self.error(format!("field number {value} out of range")),
        }
    }

    /// Collects raw token text up to (not including) a terminator at depth 0.
    ///
    /// Braces, brackets, parentheses and angle brackets nest.
    fn raw_until(&mut self, terminators: &[Token]) -> Result<String> {
        let mut depth = 0usize;
        let mut parts: Vec<String> = Vec::new();
        loop {
            let Some(token) = self.peek().cloned() else {
                return self.error("unexpected end of file");
            };
            if depth == 0 && terminators.contains(&token) {
                break;
            }
            match token {
                Token::LBrace | Token::LBracket | Token::LParen | Token::LAngle => depth += 1,
                Token::RBrace | Token::RBracket | Token::RParen | Token::RAngle => {
                    if depth == 0 {
                        return self.error(format!("unbalanced '{}'", token.text()));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            parts.push(token.text());
            self.bump();
        }
        Ok(parts.join(" "))
    }

    // =========================================================================
    // File level
    // =========================================================================

    fn parse_file(&mut self) -> Result<SchemaFile> {
        let mut file = SchemaFile::default();
        loop {
            if let Some(comment) = self.take_comment() {
                file.elements.push(FileElement::Comment(comment));
                continue;
            }
            let Some(token) = self.peek().cloned() else {
                break;
            };
            match token {
                Token::Semi => {
                    self.bump();
                }
                Token::Ident(keyword) => match keyword.as_str() {
                    "syntax" => file.syntax = self.parse_syntax()?,
                    "edition" => {
                        self.bump();
                        self.expect(Token::Eq)?;
                        let edition = self.expect_string()?;
                        self.expect(Token::Semi)?;
                        file.syntax = Syntax::Editions(edition);
                    }
                    "package" => {
                        self.bump();
                        let name = self.full_ident()?;
                        self.expect(Token::Semi)?;
                        file.package = Some(name);
                    }
                    "import" => file.imports.push(self.parse_import()?),
                    "option" => file.elements.push(FileElement::Option(self.parse_option()?)),
                    "message" => file.elements.push(FileElement::Message(self.parse_message()?)),
                    "enum" => file.elements.push(FileElement::Enum(self.parse_enum()?)),
                    "service" => file.elements.push(FileElement::Service(self.parse_service()?)),
                    "extend" => file.elements.push(FileElement::Extend(self.parse_extend()?)),
                    other => return self.error(format!("unexpected '{other}' at top level")),
                },
                other => return self.error(format!("unexpected '{}' at top level", other.text())),
            }
        }
        Ok(file)
    }

    fn parse_syntax(&mut self) -> Result<Syntax> {
        self.expect_keyword("syntax")?;
        self.expect(Token::Eq)?;
        let value = self.expect_string()?;
        self.expect(Token::Semi)?;
        match value.as_str() {
            "proto2" => Ok(Syntax::Proto2),
            "proto3" => Ok(Syntax::Proto3),
            other => self.error(format!("unknown syntax '{other}'")),
        }
    }

    fn parse_import(&mut self) -> Result<Import> {
        let line = self.current_line();
        self.expect_keyword("import")?;
        let modifier = if self.at_keyword("weak") {
            self.bump();
            ImportModifier::Weak
        } else if self.at_keyword("public") {
            self.bump();
            ImportModifier::Public
        } else {
            ImportModifier::None
        };
        let path = self.expect_string()?;
        self.expect(Token::Semi)?;
        Ok(Import {
            path,
            modifier,
            line,
        })
    }

    /// `option name = constant ;`
    fn parse_option(&mut self) -> Result<OptionDecl> {
        self.expect_keyword("option")?;
        let name = self.raw_until(&[Token::Eq])?.replace(' ', "");
        self.expect(Token::Eq)?;
        let value = self.raw_until(&[Token::Semi])?;
        self.expect(Token::Semi)?;
        Ok(OptionDecl { name, value })
    }

    /// Optional `[ ... ]` after a field or enum value.
    fn parse_field_options(&mut self) -> Result<Option<String>> {
        if !self.eat(&Token::LBracket) {
            return Ok(None);
        }
        let text = self.raw_until(&[Token::RBracket])?;
        self.expect(Token::RBracket)?;
        Ok(Some(text))
    }

    // =========================================================================
    // Messages
    // =========================================================================

    fn parse_message(&mut self) -> Result<Message> {
        let line = self.current_line();
        self.expect_keyword("message")?;
        let name = self.expect_ident()?;
        let elements = self.parse_message_body()?;
        Ok(Message {
            name,
            elements,
            line,
        })
    }

    /// `{ element* }`
    fn parse_message_body(&mut self) -> Result<Vec<MessageElement>> {
        self.expect(Token::LBrace)?;
        let mut elements = Vec::new();
        loop {
            if let Some(comment) = self.take_comment() {
                elements.push(MessageElement::Comment(comment));
                continue;
            }
            match self.peek() {
                None => return self.error("unexpected end of file in message body"),
                Some(Token::RBrace) => {
                    self.bump();
                    break;
                }
                Some(Token::Semi) => {
                    self.bump();
                }
                _ => elements.push(self.parse_message_element()?),
            }
        }
        Ok(elements)
    }

    /// Whether the next tokens open a declaration `<keyword> Name {`.
    fn at_declaration(&self, keyword: &str) -> bool {
        self.at_keyword(keyword) && self.nth_is_ident(1) && self.nth(2) == Some(&Token::LBrace)
    }

    fn parse_message_element(&mut self) -> Result<MessageElement> {
        if self.at_declaration("message") {
            return Ok(MessageElement::Message(self.parse_message()?));
        }
        if self.at_declaration("enum") {
            return Ok(MessageElement::Enum(self.parse_enum()?));
        }
        if self.at_declaration("oneof") {
            return Ok(MessageElement::Oneof(self.parse_oneof()?));
        }
        if self.at_extend() {
            return Ok(MessageElement::Extend(self.parse_extend()?));
        }
        if self.at_keyword("option") && !self.nth_is_field_start() {
            return Ok(MessageElement::Option(self.parse_option()?));
        }
        if self.at_keyword("reserved") && !self.nth_is_field_start() {
            self.bump();
            let items = self.parse_ranges()?;
            self.expect(Token::Semi)?;
            return Ok(MessageElement::Reserved(items));
        }
        if self.at_keyword("extensions") && !self.nth_is_field_start() {
            self.bump();
            let items = self.parse_ranges()?;
            self.parse_field_options()?;
            self.expect(Token::Semi)?;
            return Ok(MessageElement::Extensions(items));
        }
        if self.at_keyword("map") && self.nth(1) == Some(&Token::LAngle) {
            return Ok(MessageElement::Map(self.parse_map_field()?));
        }

        let line = self.current_line();
        let label = self.parse_label();
        if self.at_keyword("group") && self.nth_is_ident(1) && self.nth(2) == Some(&Token::Eq) {
            return Ok(MessageElement::Group(self.parse_group(label, line)?));
        }
        Ok(MessageElement::Field(self.parse_field_rest(label, line)?))
    }

    /// Whether the next tokens are `extend [.]a.b.C {`.
    fn at_extend(&self) -> bool {
        if !self.at_keyword("extend") {
            return false;
        }
        let mut n = 1;
        if self.nth(n) == Some(&Token::Dot) {
            n += 1;
        }
        loop {
            if !self.nth_is_ident(n) {
                return false;
            }
            n += 1;
            if self.nth(n) != Some(&Token::Dot) {
                break;
            }
            n += 1;
        }
        self.nth(n) == Some(&Token::LBrace)
    }

    /// Whether the token after a keyword continues a field (`option foo = 1;`
    /// declares a field named `foo` of type `option`).
    fn nth_is_field_start(&self) -> bool {
        self.nth_is_ident(1)
            && self.nth(2) == Some(&Token::Eq)
            && matches!(self.nth(3), Some(Token::Int(_)))
    }

    fn parse_label(&mut self) -> FieldLabel {
        // A label is only a label when a type follows it.
        let label = match self.peek() {
            Some(Token::Ident(word)) => match word.as_str() {
                "repeated" => FieldLabel::Repeated,
                "optional" => FieldLabel::Optional,
                "required" => FieldLabel::Required,
                _ => return FieldLabel::None,
            },
            _ => return FieldLabel::None,
        };
        if self.nth_is_ident(1) || self.nth(1) == Some(&Token::Dot) {
            self.bump();
            label
        } else {
            FieldLabel::None
        }
    }

    /// `type name = number [options] ;` after the label.
    fn parse_field_rest(&mut self, label: FieldLabel, line: u32) -> Result<Field> {
        let type_name = self.full_ident()?;
        let name = self.expect_ident()?;
        self.expect(Token::Eq)?;
        let number = self.field_number()?;
        let options = self.parse_field_options()?;
        self.expect(Token::Semi)?;
        Ok(Field {
            label,
            type_name,
            name,
            number,
            options,
            line,
        })
    }

    fn parse_map_field(&mut self) -> Result<MapField> {
        let line = self.current_line();
        self.expect_keyword("map")?;
        self.expect(Token::LAngle)?;
        let key_type = self.full_ident()?;
        self.expect(Token::Comma)?;
        let value_type = self.full_ident()?;
        self.expect(Token::RAngle)?;
        let name = self.expect_ident()?;
        self.expect(Token::Eq)?;
        let number = self.field_number()?;
        let options = self.parse_field_options()?;
        self.expect(Token::Semi)?;
        Ok(MapField {
            key_type,
            value_type,
            name,
            number,
            options,
            line,
        })
    }

    fn parse_group(&mut self, label: FieldLabel, line: u32) -> Result<Group> {
        self.expect_keyword("group")?;
        let name = self.expect_ident()?;
        self.expect(Token::Eq)?;
        let number = self.field_number()?;
        self.parse_field_options()?;
        let elements = self.parse_message_body()?;
        Ok(Group {
            label,
            name,
            number,
            elements,
            line,
        })
    }

    fn parse_oneof(&mut self) -> Result<Oneof> {
        self.expect_keyword("oneof")?;
        let name = self.expect_ident()?;
        self.expect(Token::LBrace)?;
        let mut elements = Vec::new();
        loop {
            if let Some(comment) = self.take_comment() {
                elements.push(OneofElement::Comment(comment));
                continue;
            }
            match self.peek() {
                None => return self.error("unexpected end of file in oneof"),
                Some(Token::RBrace) => {
                    self.bump();
                    break;
                }
                Some(Token::Semi) => {
                    self.bump();
                }
                _ => {
                    if self.at_keyword("option") && !self.nth_is_field_start() {
                        elements.push(OneofElement::Option(self.parse_option()?));
                        continue;
                    }
                    let line = self.current_line();
                    let label = self.parse_label();
                    if self.at_keyword("group")
                        && self.nth_is_ident(1)
                        && self.nth(2) == Some(&Token::Eq)
                    {
                        elements.push(OneofElement::Group(self.parse_group(label, line)?));
                    } else {
                        elements.push(OneofElement::Field(self.parse_field_rest(label, line)?));
                    }
                }
            }
        }
        Ok(Oneof { name, elements })
    }

    /// `extend Target { fields }`
    fn parse_extend(&mut self) -> Result<Extend> {
        let line = self.current_line();
        self.expect_keyword("extend")?;
        let target = self.full_ident()?;
        let elements = self.parse_message_body()?;
        Ok(Extend {
            target,
            elements,
            line,
        })
    }

    /// Ranges (`1, 5 to 9, 100 to max`) or names (`"a", "b"` / `a, b`).
    fn parse_ranges(&mut self) -> Result<Vec<ReservedItem>> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Str(_)) => {
                    let name = self.expect_string()?;
                    items.push(ReservedItem::Name(name));
                }
                Some(Token::Ident(word)) if word != "max" => {
                    let name = self.expect_ident()?;
                    items.push(ReservedItem::Name(name));
                }
                _ => {
                    let start = self.int_literal()?;
                    let end = if self.at_keyword("to") {
                        self.bump();
                        if self.at_keyword("max") {
                            self.bump();
                            Some(i64::from(u32::MAX >> 3))
                        } else {
                            Some(self.int_literal()?)
                        }
                    } else {
                        None
                    };
                    items.push(ReservedItem::Range { start, end });
                }
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok(items)
    }

    // =========================================================================
    // Enums
    // =========================================================================

    fn parse_enum(&mut self) -> Result<EnumDecl> {
        let line = self.current_line();
        self.expect_keyword("enum")?;
        let name = self.expect_ident()?;
        self.expect(Token::LBrace)?;
        let mut elements = Vec::new();
        loop {
            if let Some(comment) = self.take_comment() {
                elements.push(EnumElement::Comment(comment));
                continue;
            }
            match self.peek() {
                None => return self.error("unexpected end of file in enum"),
                Some(Token::RBrace) => {
                    self.bump();
                    break;
                }
                Some(Token::Semi) => {
                    self.bump();
                }
                _ => {
                    if self.at_keyword("option") && self.nth(1) != Some(&Token::Eq) {
                        elements.push(EnumElement::Option(self.parse_option()?));
                    } else if self.at_keyword("reserved") && self.nth(1) != Some(&Token::Eq) {
                        self.bump();
                        let items = self.parse_ranges()?;
                        self.expect(Token::Semi)?;
                        elements.push(EnumElement::Reserved(items));
                    } else {
                        let name = self.expect_ident()?;
                        self.expect(Token::Eq)?;
                        let number = self.int_literal()?;
                        self.parse_field_options()?;
                        self.expect(Token::Semi)?;
                        elements.push(EnumElement::Value(EnumValue { name, number }));
                    }
                }
            }
        }
        Ok(EnumDecl {
            name,
            elements,
            line,
        })
    }

    // =========================================================================
    // Services
    // =========================================================================

    fn parse_service(&mut self) -> Result<Service> {
        let line = self.current_line();
        self.expect_keyword("service")?;
        let name = self.expect_ident()?;
        self.expect(Token::LBrace)?;
        let mut elements = Vec::new();
        loop {
            if let Some(comment) = self.take_comment() {
                elements.push(ServiceElement::Comment(comment));
                continue;
            }
            match self.peek() {
                None => return self.error("unexpected end of file in service"),
                Some(Token::RBrace) => {
                    self.bump();
                    break;
                }
                Some(Token::Semi) => {
                    self.bump();
                }
                _ if self.at_keyword("option") => {
                    elements.push(ServiceElement::Option(self.parse_option()?));
                }
                _ if self.at_keyword("rpc") => {
                    elements.push(ServiceElement::Rpc(self.parse_rpc()?));
                }
                _ => {
                    return self.error(format!(
                        "unexpected {} in service body",
                        self.describe_next()
                    ))
                }
            }
        }
        Ok(Service {
            name,
            elements,
            line,
        })
    }

    /// `( [stream] Type )`
    fn parse_rpc_type(&mut self) -> Result<(bool, String)> {
        self.expect(Token::LParen)?;
        // `stream` is also a legal type name or package component:
        // `stream.Foo` is a type, `stream .Foo` streams a fully qualified one.
        let streaming = self.at_keyword("stream")
            && match self.nth(1) {
                Some(Token::Ident(_)) => true,
                Some(Token::Dot) => match (self.nth_span(0), self.nth_span(1)) {
                    (Some(keyword), Some(dot)) => dot.start != keyword.end,
                    _ => false,
                },
                _ => false,
            };
        if streaming {
            self.bump();
        }
        let type_name = self.full_ident()?;
        self.expect(Token::RParen)?;
        Ok((streaming, type_name))
    }

    fn parse_rpc(&mut self) -> Result<Rpc> {
        let line = self.current_line();
        self.expect_keyword("rpc")?;
        let name = self.expect_ident()?;
        let (client_streaming, request_type) = self.parse_rpc_type()?;
        self.expect_keyword("returns")?;
        let (server_streaming, response_type) = self.parse_rpc_type()?;

        let mut options = Vec::new();
        if self.eat(&Token::LBrace) {
            loop {
                self.take_comment();
                match self.peek() {
                    None => return self.error("unexpected end of file in rpc body"),
                    Some(Token::RBrace) => {
                        self.bump();
                        break;
                    }
                    Some(Token::Semi) => {
                        self.bump();
                    }
                    _ => options.push(self.parse_option()?),
                }
            }
            self.eat(&Token::Semi);
        } else {
            self.expect(Token::Semi)?;
        }

        Ok(Rpc {
            name,
            request_type,
            response_type,
            client_streaming,
            server_streaming,
            options,
            line,
        })
    }
}
