//! Style declarations: the `a: b !important` blocks of style, page,
//! margin, and font-face rules.
//!
//! Entries keep declaration order including comments and repeated
//! properties; which of several same-named properties wins is decided at
//! access and serialization time, so `keepAllProperties` can still emit
//! the whole block.

use crate::error::{Error, Result};
use crate::tokenizer::{self, Token, TokenKind, Tokenizer};

use super::rule::{CssRule, RuleNode};
use super::{RcCell, WeakCell, rc_cell};

/// A component of a property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Identifier in serialized form (`c\olor` keeps its escape).
    Ident(String),
    /// String literal including quotes, as written.
    Str(String),
    /// `url(...)` target, unwrapped.
    Uri(String),
    /// Hash value without the `#`.
    Hash(String),
    /// Number literal, sign and all.
    Number(String),
    /// Percentage literal including `%`.
    Percentage(String),
    /// Number plus unit, as written.
    Dimension(String),
    UnicodeRange(String),
    Function { name: String, args: Vec<Value> },
    Comma,
    Slash,
    Comment(String),
    /// Any other character that is only meaningful inside a function.
    Char(char),
}

/// A parsed property value: a non-empty sequence of components.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PropertyValue {
    pub(crate) items: Vec<Value>,
}

impl PropertyValue {
    pub fn parse(text: &str) -> Result<PropertyValue> {
        let tokens: Vec<Token> = Tokenizer::new(text).collect();
        PropertyValue::from_tokens(&tokens)
    }

    pub(crate) fn from_tokens(tokens: &[Token]) -> Result<PropertyValue> {
        let mut parser = ValueParser { tokens, pos: 0 };
        let items = parser.parse_items(false)?;
        if let Some(t) = parser.tokens.get(parser.pos) {
            return Err(Error::syntax("unexpected token in value", t.line, t.column));
        }
        if !items.iter().any(|v| !matches!(v, Value::Comment(_))) {
            let (line, column) = tokens.first().map(|t| (t.line, t.column)).unwrap_or((1, 1));
            return Err(Error::syntax("empty property value", line, column));
        }
        Ok(PropertyValue { items })
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Whether any component references a CSS variable.
    pub(crate) fn has_variables(&self) -> bool {
        fn check(items: &[Value]) -> bool {
            items.iter().any(|v| match v {
                Value::Function { name, args } => {
                    tokenizer::normalize(name) == "var" || check(args)
                }
                _ => false,
            })
        }
        check(&self.items)
    }

    /// Default-formatted value text.
    pub fn css_text(&self) -> String {
        crate::serializer::Serializer::default().do_value(self)
    }
}

struct ValueParser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ValueParser<'a> {
    /// Parses value components until an unconsumable token. Inside a
    /// function, stray characters are tolerated; at the top level only
    /// `,` and `/` are.
    fn parse_items(&mut self, in_function: bool) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        while let Some(t) = self.tokens.get(self.pos) {
            let value = match t.kind {
                TokenKind::Space => {
                    self.pos += 1;
                    continue;
                }
                TokenKind::Comment => Value::Comment(t.value.clone()),
                TokenKind::Ident => Value::Ident(tokenizer::serialize_ident(&t.value)),
                TokenKind::String => {
                    if !tokenizer::is_closed_string(&t.value) {
                        return Err(Error::syntax("unterminated string", t.line, t.column));
                    }
                    Value::Str(t.value.clone())
                }
                TokenKind::Uri => match tokenizer::uri_value(&t.value) {
                    Some(uri) => Value::Uri(uri),
                    None => return Err(Error::syntax("malformed url()", t.line, t.column)),
                },
                TokenKind::Hash => Value::Hash(t.value[1..].to_string()),
                TokenKind::Number => Value::Number(t.value.clone()),
                TokenKind::Percentage => Value::Percentage(t.value.clone()),
                TokenKind::Dimension => Value::Dimension(t.value.clone()),
                TokenKind::UnicodeRange => Value::UnicodeRange(t.value.clone()),
                TokenKind::Function => {
                    let name = tokenizer::serialize_ident(&t.value);
                    let (line, column) = (t.line, t.column);
                    self.pos += 1;
                    let args = self.parse_items(true)?;
                    match self.tokens.get(self.pos) {
                        Some(t) if t.is_char(')') => {
                            self.pos += 1;
                        }
                        _ => return Err(Error::syntax("unclosed function", line, column)),
                    }
                    items.push(Value::Function { name, args });
                    continue;
                }
                TokenKind::Char => match t.ch() {
                    ',' => Value::Comma,
                    '/' => Value::Slash,
                    ')' if in_function => break,
                    c if in_function => Value::Char(c),
                    _ => break,
                },
                _ => break,
            };
            self.pos += 1;
            items.push(value);
        }
        Ok(items)
    }
}

/// A single name/value/priority declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Normalized (unescaped, lowercased) name.
    pub name: String,
    /// Name as written, in serialized-ident form.
    pub literal_name: String,
    pub value: PropertyValue,
    /// Normalized priority: empty or `important`.
    pub priority: String,
    /// Priority as written (`!IMPORTANT` keeps its case).
    pub literal_priority: String,
    /// Whether name and value match a known property profile.
    pub valid: bool,
}

impl Property {
    pub fn new(name: &str, value: &str, priority: &str) -> Result<Property> {
        let parsed = PropertyValue::parse(value)?;
        let priority = priority.trim().trim_start_matches('!').trim();
        let norm_priority = tokenizer::normalize(priority);
        if !norm_priority.is_empty() && norm_priority != "important" {
            return Err(Error::syntax(
                format!("invalid priority: {priority}"),
                1,
                1,
            ));
        }
        let literal_name = tokenizer::serialize_ident(name);
        let name = tokenizer::normalize(name);
        let valid = crate::profiles::validate(&name, &parsed);
        Ok(Property {
            name,
            literal_name,
            value: parsed,
            priority: norm_priority,
            literal_priority: priority.to_string(),
            valid,
        })
    }

    /// Serialized value text with default formatting.
    pub fn value_text(&self) -> String {
        self.value.css_text()
    }

    pub fn is_important(&self) -> bool {
        self.priority == "important"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DeclEntry {
    Property(Property),
    Comment(String),
}

pub(crate) struct DeclData {
    pub entries: Vec<DeclEntry>,
    pub parent_rule: Option<WeakCell<RuleNode>>,
}

/// An ordered, mutable block of declarations.
#[derive(Clone)]
pub struct CssStyleDeclaration(pub(crate) RcCell<DeclData>);

impl Default for CssStyleDeclaration {
    fn default() -> Self {
        CssStyleDeclaration::new()
    }
}

impl CssStyleDeclaration {
    pub fn new() -> CssStyleDeclaration {
        CssStyleDeclaration(rc_cell(DeclData {
            entries: Vec::new(),
            parent_rule: None,
        }))
    }

    /// Parses a full declaration block. Declarations that do not parse
    /// are dropped with a warning; the rest of the block survives.
    pub fn parse(text: &str) -> CssStyleDeclaration {
        let tokens: Vec<Token> = Tokenizer::new(text).collect();
        let style = CssStyleDeclaration::new();
        style.0.borrow_mut().entries = parse_declaration_block(&tokens);
        style
    }

    /// Replaces the whole block, keeping identity and parent link.
    pub fn set_css_text(&self, text: &str) {
        let tokens: Vec<Token> = Tokenizer::new(text).collect();
        self.0.borrow_mut().entries = parse_declaration_block(&tokens);
    }

    pub fn parent_rule(&self) -> Option<CssRule> {
        self.0
            .borrow()
            .parent_rule
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(CssRule)
    }

    pub(crate) fn set_parent(&self, parent: Option<WeakCell<RuleNode>>) {
        self.0.borrow_mut().parent_rule = parent;
    }

    /// Number of distinct property names set.
    pub fn length(&self) -> usize {
        self.names().len()
    }

    /// Distinct normalized property names, in order of first appearance.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for entry in &self.0.borrow().entries {
            if let DeclEntry::Property(p) = entry {
                if !names.contains(&p.name) {
                    names.push(p.name.clone());
                }
            }
        }
        names
    }

    pub fn item(&self, index: usize) -> Option<String> {
        self.names().get(index).cloned()
    }

    pub fn is_empty(&self) -> bool {
        !self
            .0
            .borrow()
            .entries
            .iter()
            .any(|e| matches!(e, DeclEntry::Property(_)))
    }

    /// The effective property for a name: the last important one when any
    /// is important, otherwise the last.
    pub fn get_property(&self, name: &str) -> Option<Property> {
        let norm = tokenizer::normalize(name);
        let data = self.0.borrow();
        let matching: Vec<&Property> = data
            .entries
            .iter()
            .filter_map(|e| match e {
                DeclEntry::Property(p) if p.name == norm => Some(p),
                _ => None,
            })
            .collect();
        matching
            .iter()
            .rev()
            .find(|p| p.is_important())
            .or_else(|| matching.last())
            .map(|p| (*p).clone())
    }

    /// Serialized value of the effective property, or empty.
    pub fn get_property_value(&self, name: &str) -> String {
        self.get_property(name)
            .map(|p| p.value.css_text())
            .unwrap_or_default()
    }

    pub fn get_property_priority(&self, name: &str) -> String {
        self.get_property(name).map(|p| p.priority).unwrap_or_default()
    }

    /// Every same-named property in declaration order.
    pub fn get_properties(&self, name: &str) -> Vec<Property> {
        let norm = tokenizer::normalize(name);
        self.0
            .borrow()
            .entries
            .iter()
            .filter_map(|e| match e {
                DeclEntry::Property(p) if p.name == norm => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sets a property, replacing the last same-named one in place or
    /// appending. Invalid syntax is an error and leaves the block alone.
    pub fn set_property(&self, name: &str, value: &str, priority: &str) -> Result<()> {
        let property = Property::new(name, value, priority)?;
        let mut data = self.0.borrow_mut();
        let existing = data.entries.iter().rposition(|e| {
            matches!(e, DeclEntry::Property(p) if p.name == property.name)
        });
        match existing {
            Some(i) => data.entries[i] = DeclEntry::Property(property),
            None => data.entries.push(DeclEntry::Property(property)),
        }
        Ok(())
    }

    /// Removes all same-named properties, returning the old effective
    /// value (empty when not present).
    pub fn remove_property(&self, name: &str) -> String {
        let old = self.get_property_value(name);
        let norm = tokenizer::normalize(name);
        self.0.borrow_mut().entries.retain(|e| {
            !matches!(e, DeclEntry::Property(p) if p.name == norm)
        });
        old
    }

    pub(crate) fn entries(&self) -> Vec<DeclEntry> {
        self.0.borrow().entries.clone()
    }

    /// Every `url()` value in the block, in declaration order.
    pub(crate) fn collect_uris(&self, out: &mut Vec<String>) {
        fn walk(items: &[Value], out: &mut Vec<String>) {
            for item in items {
                match item {
                    Value::Uri(target) => out.push(target.clone()),
                    Value::Function { args, .. } => walk(args, out),
                    _ => {}
                }
            }
        }
        for entry in self.0.borrow().entries.iter() {
            if let DeclEntry::Property(p) = entry {
                walk(&p.value.items, out);
            }
        }
    }

    /// Rewrites every `url()` value in place.
    pub(crate) fn map_uris(&self, f: &dyn Fn(&str) -> String) {
        fn walk(items: &mut [Value], f: &dyn Fn(&str) -> String) {
            for item in items {
                match item {
                    Value::Uri(target) => *target = f(target),
                    Value::Function { args, .. } => walk(args, f),
                    _ => {}
                }
            }
        }
        for entry in self.0.borrow_mut().entries.iter_mut() {
            if let DeclEntry::Property(p) = entry {
                walk(&mut p.value.items, f);
            }
        }
    }

    pub(crate) fn push_entry(&self, entry: DeclEntry) {
        self.0.borrow_mut().entries.push(entry);
    }

    /// Default-formatted block text.
    pub fn css_text(&self) -> String {
        crate::serializer::Serializer::default().do_style_declaration(self)
    }
}

/// Parses a declaration block token slice into entries, dropping invalid
/// declarations with a warning.
pub(crate) fn parse_declaration_block(tokens: &[Token]) -> Vec<DeclEntry> {
    let mut entries = Vec::new();
    for chunk in split_on_semicolons(tokens) {
        let trimmed = trim_space(chunk);
        if trimmed.is_empty() {
            continue;
        }
        // a chunk of only comments keeps them as standalone entries
        if trimmed.iter().all(|t| {
            matches!(t.kind, TokenKind::Comment | TokenKind::Space)
        }) {
            for t in trimmed {
                if t.kind == TokenKind::Comment {
                    entries.push(DeclEntry::Comment(t.value.clone()));
                }
            }
            continue;
        }
        match parse_declaration(trimmed) {
            Ok((before, property, after)) => {
                for c in before {
                    entries.push(DeclEntry::Comment(c));
                }
                entries.push(DeclEntry::Property(property));
                for c in after {
                    entries.push(DeclEntry::Comment(c));
                }
            }
            Err(err) => {
                let literal: String = trimmed.iter().map(|t| t.value.as_str()).collect();
                log::warn!("dropping invalid declaration {literal:?}: {err}");
            }
        }
    }
    entries
}

fn trim_space(tokens: &[Token]) -> &[Token] {
    let mut start = 0;
    let mut end = tokens.len();
    while start < end && tokens[start].kind == TokenKind::Space {
        start += 1;
    }
    while end > start && tokens[end - 1].kind == TokenKind::Space {
        end -= 1;
    }
    &tokens[start..end]
}

/// Splits on top-level `;` (function parens and brackets nest).
fn split_on_semicolons(tokens: &[Token]) -> Vec<&[Token]> {
    let mut chunks = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, t) in tokens.iter().enumerate() {
        match t.kind {
            TokenKind::Function => depth += 1,
            TokenKind::Char => match t.ch() {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                ';' if depth == 0 => {
                    chunks.push(&tokens[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
            _ => {}
        }
    }
    chunks.push(&tokens[start..]);
    chunks
}

/// Parses one `name: value [!priority]` declaration, returning comments
/// found before the name and after the value separately.
fn parse_declaration(tokens: &[Token]) -> Result<(Vec<String>, Property, Vec<String>)> {
    let mut pos = 0;
    let mut before = Vec::new();
    while let Some(t) = tokens.get(pos) {
        match t.kind {
            TokenKind::Space => pos += 1,
            TokenKind::Comment => {
                before.push(t.value.clone());
                pos += 1;
            }
            _ => break,
        }
    }
    let name_token = match tokens.get(pos) {
        Some(t) if t.kind == TokenKind::Ident => t,
        Some(t) => return Err(Error::syntax("expected a property name", t.line, t.column)),
        None => return Err(Error::syntax("expected a property name", 1, 1)),
    };
    pos += 1;
    while tokens.get(pos).is_some_and(|t| {
        matches!(t.kind, TokenKind::Space | TokenKind::Comment)
    }) {
        pos += 1;
    }
    match tokens.get(pos) {
        Some(t) if t.is_char(':') => pos += 1,
        Some(t) => return Err(Error::syntax("expected ':'", t.line, t.column)),
        None => return Err(Error::syntax("expected ':'", name_token.line, name_token.column)),
    }

    // split off a trailing !priority
    let mut value_end = tokens.len();
    let mut priority: Option<String> = None;
    if let Some(bang) = tokens[pos..].iter().rposition(|t| t.is_char('!')) {
        let bang = pos + bang;
        let after: Vec<&Token> = tokens[bang + 1..]
            .iter()
            .filter(|t| t.kind != TokenKind::Space && t.kind != TokenKind::Comment)
            .collect();
        match after.as_slice() {
            [t] if t.kind == TokenKind::Ident => {
                let norm = tokenizer::normalize(&t.value);
                if norm != "important" {
                    return Err(Error::syntax(
                        format!("invalid priority: {norm}"),
                        t.line,
                        t.column,
                    ));
                }
                priority = Some(tokenizer::serialize_ident(&t.value));
                value_end = bang;
            }
            _ => {
                let t = &tokens[bang];
                return Err(Error::syntax("invalid priority", t.line, t.column));
            }
        }
    }

    // comments trailing the value attach after the property
    let mut after_comments = Vec::new();
    let mut value_tokens = trim_space(&tokens[pos..value_end]);
    while let Some(t) = value_tokens.last() {
        if t.kind == TokenKind::Comment {
            after_comments.insert(0, t.value.clone());
            value_tokens = trim_space(&value_tokens[..value_tokens.len() - 1]);
        } else {
            break;
        }
    }

    let value = PropertyValue::from_tokens(value_tokens)?;
    let literal_name = tokenizer::serialize_ident(&name_token.value);
    let name = tokenizer::normalize(&name_token.value);
    let valid = crate::profiles::validate(&name, &value);
    let (priority, literal_priority) = match priority {
        Some(p) => ("important".to_string(), p),
        None => (String::new(), String::new()),
    };
    Ok((
        before,
        Property {
            name,
            literal_name,
            value,
            priority,
            literal_priority,
            valid,
        },
        after_comments,
    ))
}
