//! Selectors: parsing, specificity, and namespace-aware serialization.
//!
//! A [`Selector`] stores a sequence of simple selectors and combinators.
//! Namespace prefixes are resolved to their URIs at parse time, so a
//! selector survives a later re-declaration of the prefix; serialization
//! maps each URI back through the prefix map in effect.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tokenizer::{self, Token, TokenKind, Tokenizer};

/// Specificity as `(ids, classes/attributes/pseudo-classes,
/// types/pseudo-elements)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Specificity(pub u32, pub u32, pub u32);

/// Namespace component of a type or attribute selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NsPrefix {
    /// No prefix written and no default namespace in effect.
    None,
    /// Explicit empty prefix `|name`: no namespace.
    NoNamespace,
    /// `*|name`: any namespace.
    Any,
    /// Resolved namespace URI.
    Uri(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

impl Combinator {
    pub fn ch(self) -> Option<char> {
        match self {
            Combinator::Descendant => None,
            Combinator::Child => Some('>'),
            Combinator::Adjacent => Some('+'),
            Combinator::Sibling => Some('~'),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AttribValue {
    Ident(String),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttribOp {
    pub op: String,
    pub value: AttribValue,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SelItem {
    /// Type or universal selector; `name` is `*` for universal.
    Type { prefix: NsPrefix, name: String },
    Hash(String),
    Class(String),
    Attrib {
        prefix: NsPrefix,
        name: String,
        op: Option<AttribOp>,
    },
    Pseudo {
        element: bool,
        name: String,
        args: Option<String>,
    },
    Combinator(Combinator),
    Comment(String),
}

/// A single selector of a selector group.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    pub(crate) items: Vec<SelItem>,
}

/// A comma-separated selector group, as attached to a style rule.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectorList {
    pub(crate) selectors: Vec<Selector>,
    /// Prefix map in effect at parse time; the fallback for standalone
    /// serialization when no sheet context is available.
    pub(crate) namespaces: HashMap<String, String>,
}

// CSS 2.1 pseudo-elements that still parse with a single colon.
const SINGLE_COLON_ELEMENTS: [&str; 4] = ["first-line", "first-letter", "before", "after"];

impl Selector {
    pub fn parse(text: &str, namespaces: &HashMap<String, String>) -> Result<Selector> {
        let tokens: Vec<Token> = Tokenizer::new(text).collect();
        Selector::from_tokens(&tokens, namespaces)
    }

    pub(crate) fn from_tokens(
        tokens: &[Token],
        namespaces: &HashMap<String, String>,
    ) -> Result<Selector> {
        SelectorParser {
            tokens,
            pos: 0,
            namespaces,
        }
        .parse()
    }

    pub fn specificity(&self) -> Specificity {
        let mut s = Specificity::default();
        for item in &self.items {
            match item {
                SelItem::Hash(_) => s.0 += 1,
                SelItem::Class(_) | SelItem::Attrib { .. } => s.1 += 1,
                SelItem::Pseudo { element, name, .. } => {
                    let norm = tokenizer::normalize(name);
                    if *element || SINGLE_COLON_ELEMENTS.contains(&norm.as_str()) {
                        s.2 += 1;
                    } else if norm != "not" {
                        s.1 += 1;
                    }
                }
                SelItem::Type { name, .. } => {
                    if name != "*" {
                        s.2 += 1;
                    }
                }
                SelItem::Combinator(_) | SelItem::Comment(_) => {}
            }
        }
        s
    }

    /// Namespace URIs this selector references.
    pub(crate) fn used_uris(&self, out: &mut Vec<String>) {
        for item in &self.items {
            let prefix = match item {
                SelItem::Type { prefix, .. } => prefix,
                SelItem::Attrib { prefix, .. } => prefix,
                _ => continue,
            };
            if let NsPrefix::Uri(uri) = prefix {
                if !out.contains(uri) {
                    out.push(uri.clone());
                }
            }
        }
    }

    /// Default-formatted selector text, resolved against `namespaces`.
    pub fn selector_text(&self, namespaces: &HashMap<String, String>) -> String {
        crate::serializer::Serializer::default().do_selector(self, namespaces)
    }
}

impl SelectorList {
    pub fn parse(text: &str, namespaces: &HashMap<String, String>) -> Result<SelectorList> {
        let tokens: Vec<Token> = Tokenizer::new(text).collect();
        SelectorList::from_tokens(&tokens, namespaces)
    }

    pub(crate) fn from_tokens(
        tokens: &[Token],
        namespaces: &HashMap<String, String>,
    ) -> Result<SelectorList> {
        let mut selectors = Vec::new();
        for group in split_on_commas(tokens) {
            selectors.push(Selector::from_tokens(group, namespaces)?);
        }
        if selectors.is_empty() {
            let (line, column) = tokens
                .first()
                .map(|t| (t.line, t.column))
                .unwrap_or((1, 1));
            return Err(Error::syntax("no selector", line, column));
        }
        Ok(SelectorList {
            selectors,
            namespaces: namespaces.clone(),
        })
    }

    pub fn length(&self) -> usize {
        self.selectors.len()
    }

    pub fn item(&self, index: usize) -> Option<&Selector> {
        self.selectors.get(index)
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    /// Appends a selector parsed in this list's namespace context.
    pub fn append_selector(&mut self, text: &str) -> Result<()> {
        let namespaces = self.namespaces.clone();
        self.selectors.push(Selector::parse(text, &namespaces)?);
        Ok(())
    }

    pub(crate) fn used_uris(&self) -> Vec<String> {
        let mut out = Vec::new();
        for sel in &self.selectors {
            sel.used_uris(&mut out);
        }
        out
    }

    /// Default-formatted group text.
    pub fn selector_text(&self) -> String {
        crate::serializer::Serializer::default().do_selector_list(self, &self.namespaces)
    }
}

/// Splits a token slice on top-level commas (brackets and parens nest).
fn split_on_commas(tokens: &[Token]) -> Vec<&[Token]> {
    let mut groups = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, t) in tokens.iter().enumerate() {
        match t.kind {
            TokenKind::Function => depth += 1,
            TokenKind::Char => match t.ch() {
                '[' | '(' => depth += 1,
                ']' | ')' => depth -= 1,
                ',' if depth == 0 => {
                    groups.push(&tokens[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
            _ => {}
        }
    }
    groups.push(&tokens[start..]);
    groups
}

struct SelectorParser<'a> {
    tokens: &'a [Token],
    pos: usize,
    namespaces: &'a HashMap<String, String>,
}

impl<'a> SelectorParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn next(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.pos);
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn skip_space(&mut self) {
        while self.peek().is_some_and(|t| t.kind == TokenKind::Space) {
            self.pos += 1;
        }
    }

    fn error(&self, message: &str) -> Error {
        let (line, column) = self
            .peek()
            .or_else(|| self.tokens.last())
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 1));
        Error::syntax(message, line, column)
    }

    fn resolve_prefix(&self, written: Option<&str>) -> Result<NsPrefix> {
        match written {
            Some("*") => Ok(NsPrefix::Any),
            Some("") => Ok(NsPrefix::NoNamespace),
            Some(p) => {
                let norm = tokenizer::normalize(p);
                match self.namespaces.get(&norm) {
                    Some(uri) => Ok(NsPrefix::Uri(uri.clone())),
                    None => Err(Error::Namespace(norm)),
                }
            }
            None => match self.namespaces.get("") {
                Some(uri) => Ok(NsPrefix::Uri(uri.clone())),
                None => Ok(NsPrefix::None),
            },
        }
    }

    /// Attribute names never take the default namespace.
    fn resolve_attrib_prefix(&self, written: Option<&str>) -> Result<NsPrefix> {
        match written {
            None => Ok(NsPrefix::None),
            other => self.resolve_prefix(other),
        }
    }

    fn parse(mut self) -> Result<Selector> {
        let mut items: Vec<SelItem> = Vec::new();
        self.skip_space();
        while let Some(t) = self.peek() {
            match t.kind {
                TokenKind::Space => {
                    self.pos += 1;
                    self.skip_space();
                    // a space is a combinator only between sequences
                    match self.peek() {
                        None => break,
                        Some(n) if n.kind == TokenKind::Char && matches!(n.ch(), '>' | '+' | '~') => {
                        }
                        _ => items.push(SelItem::Combinator(Combinator::Descendant)),
                    }
                }
                TokenKind::Comment => {
                    let text = t.value.clone();
                    self.pos += 1;
                    items.push(SelItem::Comment(text));
                }
                TokenKind::Char if matches!(t.ch(), '>' | '+' | '~') => {
                    let comb = match t.ch() {
                        '>' => Combinator::Child,
                        '+' => Combinator::Adjacent,
                        _ => Combinator::Sibling,
                    };
                    self.pos += 1;
                    self.skip_space();
                    if self.peek().is_none() {
                        return Err(self.error("selector ends with a combinator"));
                    }
                    if !matches!(items.last(), Some(i) if !matches!(i, SelItem::Combinator(_))) {
                        return Err(self.error("combinator without a preceding selector"));
                    }
                    items.push(SelItem::Combinator(comb));
                }
                _ => self.parse_simple_sequence(&mut items)?,
            }
        }
        while matches!(items.last(), Some(SelItem::Combinator(_))) {
            return Err(Error::syntax("selector ends with a combinator", 1, 1));
        }
        if !items
            .iter()
            .any(|i| !matches!(i, SelItem::Comment(_) | SelItem::Combinator(_)))
        {
            return Err(Error::syntax("empty selector", 1, 1));
        }
        Ok(Selector { items })
    }

    /// One sequence of simple selectors (no intervening whitespace).
    fn parse_simple_sequence(&mut self, items: &mut Vec<SelItem>) -> Result<()> {
        let mut any = false;
        loop {
            let Some(t) = self.peek() else { break };
            match t.kind {
                TokenKind::Ident => {
                    let name = tokenizer::serialize_ident(&t.value);
                    self.pos += 1;
                    let prefix = self.take_type_prefix(Some(&name))?;
                    match prefix {
                        Some((prefix, name)) => items.push(SelItem::Type { prefix, name }),
                        None => items.push(SelItem::Type {
                            prefix: self.resolve_prefix(None)?,
                            name,
                        }),
                    }
                }
                TokenKind::Hash => {
                    let name = tokenizer::serialize_ident(&t.value[1..]);
                    self.pos += 1;
                    items.push(SelItem::Hash(name));
                }
                TokenKind::Char => match t.ch() {
                    '*' => {
                        self.pos += 1;
                        match self.take_type_prefix(Some("*"))? {
                            Some((prefix, name)) => items.push(SelItem::Type { prefix, name }),
                            None => items.push(SelItem::Type {
                                prefix: self.resolve_prefix(None)?,
                                name: "*".to_string(),
                            }),
                        }
                    }
                    '|' => {
                        // explicit no-namespace prefix
                        self.pos += 1;
                        let name = self.expect_type_name()?;
                        items.push(SelItem::Type {
                            prefix: NsPrefix::NoNamespace,
                            name,
                        });
                    }
                    '.' => {
                        self.pos += 1;
                        let name = match self.next() {
                            Some(t) if t.kind == TokenKind::Ident => {
                                tokenizer::serialize_ident(&t.value)
                            }
                            _ => return Err(self.error("expected a class name after '.'")),
                        };
                        items.push(SelItem::Class(name));
                    }
                    '[' => {
                        self.pos += 1;
                        items.push(self.parse_attrib()?);
                    }
                    ':' => {
                        self.pos += 1;
                        items.push(self.parse_pseudo()?);
                    }
                    _ => return Err(self.error("unexpected character in selector")),
                },
                TokenKind::Comment => {
                    let text = t.value.clone();
                    self.pos += 1;
                    items.push(SelItem::Comment(text));
                    continue;
                }
                _ => return Err(self.error("unexpected token in selector")),
            }
            any = true;
            // stop at whitespace or a combinator
            match self.peek() {
                Some(t)
                    if t.kind == TokenKind::Space
                        || (t.kind == TokenKind::Char && matches!(t.ch(), '>' | '+' | '~')) =>
                {
                    break;
                }
                None => break,
                _ => {}
            }
        }
        if !any {
            return Err(self.error("expected a selector"));
        }
        Ok(())
    }

    /// After consuming an ident or `*`, checks for a following `|name`
    /// making the consumed token a namespace prefix.
    fn take_type_prefix(&mut self, written: Option<&str>) -> Result<Option<(NsPrefix, String)>> {
        if self.peek().is_some_and(|t| t.is_char('|'))
            && self
                .peek_at(1)
                .is_some_and(|t| t.kind == TokenKind::Ident || t.is_char('*'))
        {
            self.pos += 1;
            let prefix = self.resolve_prefix(written)?;
            let name = self.expect_type_name()?;
            return Ok(Some((prefix, name)));
        }
        Ok(None)
    }

    fn expect_type_name(&mut self) -> Result<String> {
        match self.next() {
            Some(t) if t.kind == TokenKind::Ident => Ok(tokenizer::serialize_ident(&t.value)),
            Some(t) if t.is_char('*') => Ok("*".to_string()),
            _ => Err(self.error("expected an element name")),
        }
    }

    fn parse_attrib(&mut self) -> Result<SelItem> {
        self.skip_space();
        // [prefix|]name
        let mut written: Option<String> = None;
        let name;
        match self.peek() {
            Some(t) if t.kind == TokenKind::Ident => {
                let first = tokenizer::serialize_ident(&t.value);
                self.pos += 1;
                if self.peek().is_some_and(|t| t.is_char('|'))
                    && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Ident)
                {
                    self.pos += 1;
                    written = Some(first);
                    name = self.expect_type_name()?;
                } else {
                    name = first;
                }
            }
            Some(t) if t.is_char('*') => {
                self.pos += 1;
                if !self.peek().is_some_and(|t| t.is_char('|')) {
                    return Err(self.error("expected '|' after '*' in attribute"));
                }
                self.pos += 1;
                written = Some("*".to_string());
                name = self.expect_type_name()?;
            }
            Some(t) if t.is_char('|') => {
                self.pos += 1;
                written = Some(String::new());
                name = self.expect_type_name()?;
            }
            _ => return Err(self.error("expected an attribute name")),
        }
        let prefix = self.resolve_attrib_prefix(written.as_deref())?;

        self.skip_space();
        let op = match self.peek() {
            Some(t) if t.is_char(']') => None,
            Some(t) => {
                let op = match t.kind {
                    TokenKind::Includes => "~=".to_string(),
                    TokenKind::DashMatch => "|=".to_string(),
                    TokenKind::Char if t.ch() == '=' => "=".to_string(),
                    TokenKind::Char if matches!(t.ch(), '^' | '$' | '*') => {
                        let c = t.ch();
                        if !self.peek_at(1).is_some_and(|t| t.is_char('=')) {
                            return Err(self.error("expected '=' in attribute operator"));
                        }
                        self.pos += 1;
                        format!("{c}=")
                    }
                    _ => return Err(self.error("expected an attribute operator or ']'")),
                };
                self.pos += 1;
                self.skip_space();
                let value = match self.next() {
                    Some(t) if t.kind == TokenKind::Ident => {
                        AttribValue::Ident(tokenizer::serialize_ident(&t.value))
                    }
                    Some(t) if t.kind == TokenKind::String => {
                        if !tokenizer::is_closed_string(&t.value) {
                            return Err(self.error("unterminated string in attribute"));
                        }
                        AttribValue::Str(t.value.clone())
                    }
                    _ => return Err(self.error("expected an attribute value")),
                };
                Some(AttribOp { op, value })
            }
            None => return Err(self.error("unclosed attribute selector")),
        };
        self.skip_space();
        if !self.next().is_some_and(|t| t.is_char(']')) {
            return Err(self.error("unclosed attribute selector"));
        }
        Ok(SelItem::Attrib { prefix, name, op })
    }

    fn parse_pseudo(&mut self) -> Result<SelItem> {
        let element = if self.peek().is_some_and(|t| t.is_char(':')) {
            self.pos += 1;
            true
        } else {
            false
        };
        match self.next().cloned() {
            Some(t) if t.kind == TokenKind::Ident => Ok(SelItem::Pseudo {
                element,
                name: tokenizer::serialize_ident(&t.value),
                args: None,
            }),
            Some(t) if t.kind == TokenKind::Function => {
                let name = tokenizer::serialize_ident(&t.value);
                let mut depth = 1i32;
                let mut args = String::new();
                loop {
                    match self.next() {
                        None => return Err(Error::syntax("unclosed pseudo function", t.line, t.column)),
                        Some(t) => {
                            match t.kind {
                                TokenKind::Function => depth += 1,
                                TokenKind::Char if t.ch() == '(' => depth += 1,
                                TokenKind::Char if t.ch() == ')' => {
                                    depth -= 1;
                                    if depth == 0 {
                                        break;
                                    }
                                }
                                _ => {}
                            }
                            if t.kind == TokenKind::Function {
                                args.push_str(&tokenizer::serialize_ident(&t.value));
                                args.push('(');
                            } else {
                                args.push_str(&t.value);
                            }
                        }
                    }
                }
                Ok(SelItem::Pseudo {
                    element,
                    name,
                    args: Some(args.trim().to_string()),
                })
            }
            _ => Err(self.error("expected a pseudo name after ':'")),
        }
    }
}

/// A page selector: optional name plus optional page pseudo-class, as in
/// `@page vertical:first`. Comments around the selector are kept.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageSelector {
    pub name: Option<String>,
    pub pseudo: Option<String>,
    pub head_comments: Vec<String>,
    pub tail_comments: Vec<String>,
}

/// Pseudo-pages with defined cascade behavior; others are kept as written.
const PAGE_PSEUDOS: [&str; 4] = ["blank", "first", "left", "right"];

impl PageSelector {
    pub fn parse(text: &str) -> Result<PageSelector> {
        let tokens: Vec<Token> = Tokenizer::new(text).collect();
        PageSelector::from_tokens(&tokens)
    }

    pub(crate) fn from_tokens(tokens: &[Token]) -> Result<PageSelector> {
        let mut sel = PageSelector::default();
        let mut pos = 0;
        while let Some(t) = tokens.get(pos) {
            match t.kind {
                TokenKind::Space => pos += 1,
                TokenKind::Comment => {
                    sel.head_comments.push(t.value.clone());
                    pos += 1;
                }
                _ => break,
            }
        }
        if let Some(t) = tokens.get(pos) {
            if t.kind == TokenKind::Ident {
                if tokenizer::normalize(&t.value) == "auto" {
                    return Err(Error::syntax(
                        "\"auto\" is not a valid page name",
                        t.line,
                        t.column,
                    ));
                }
                sel.name = Some(tokenizer::serialize_ident(&t.value));
                // the pseudo-class must follow the name without spacing;
                // anything after a gap falls through to the tail scan
                pos += 1;
            }
        }
        if let Some(t) = tokens.get(pos) {
            if t.is_char(':') {
                pos += 1;
                match tokens.get(pos) {
                    Some(n) if n.kind == TokenKind::Ident => {
                        let norm = tokenizer::normalize(&n.value);
                        sel.pseudo = Some(if PAGE_PSEUDOS.contains(&norm.as_str()) {
                            norm
                        } else {
                            tokenizer::serialize_ident(&n.value)
                        });
                        pos += 1;
                    }
                    // no space or comment between ':' and the name
                    _ => {
                        return Err(Error::syntax(
                            "expected a pseudo-page directly after ':'",
                            t.line,
                            t.column,
                        ));
                    }
                }
            }
        }
        while let Some(t) = tokens.get(pos) {
            match t.kind {
                TokenKind::Space => pos += 1,
                TokenKind::Comment => {
                    sel.tail_comments.push(t.value.clone());
                    pos += 1;
                }
                _ => return Err(Error::syntax("invalid page selector", t.line, t.column)),
            }
        }
        Ok(sel)
    }

    /// `(named, first-or-blank, left-or-right)` ordering for cascade
    /// purposes.
    pub fn specificity(&self) -> Specificity {
        let mut s = Specificity::default();
        if self.name.is_some() {
            s.0 = 1;
        }
        match self.pseudo.as_deref() {
            Some("first") | Some("blank") => s.1 = 1,
            Some("left") | Some("right") => s.2 = 1,
            _ => {}
        }
        s
    }

    pub fn selector_text(&self) -> String {
        let mut core = String::new();
        if let Some(name) = &self.name {
            core.push_str(name);
        }
        if let Some(pseudo) = &self.pseudo {
            core.push(':');
            core.push_str(pseudo);
        }
        let mut parts: Vec<&str> = self.head_comments.iter().map(String::as_str).collect();
        if !core.is_empty() {
            parts.push(&core);
        }
        parts.extend(self.tail_comments.iter().map(String::as_str));
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ns(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn specificity_counting() {
        let none = HashMap::new();
        let spec = |s: &str| Selector::parse(s, &none).unwrap().specificity();
        assert_eq!(spec("*"), Specificity(0, 0, 0));
        assert_eq!(spec("li"), Specificity(0, 0, 1));
        assert_eq!(spec("ul li"), Specificity(0, 0, 2));
        assert_eq!(spec("h1 + *[rel=up]"), Specificity(0, 1, 1));
        assert_eq!(spec("ul ol li.red"), Specificity(0, 1, 3));
        assert_eq!(spec("li.red.level"), Specificity(0, 2, 1));
        assert_eq!(spec("#x34y"), Specificity(1, 0, 0));
        assert_eq!(spec("a:hover"), Specificity(0, 1, 1));
        assert_eq!(spec("p:first-line"), Specificity(0, 0, 2));
        assert_eq!(spec("div p::after"), Specificity(0, 0, 3));
    }

    #[test]
    fn undefined_prefix_is_a_namespace_error() {
        let err = Selector::parse("x|a", &HashMap::new()).unwrap_err();
        assert!(matches!(err, Error::Namespace(_)));
        assert!(Selector::parse("x|a", &ns(&[("x", "uri")])).is_ok());
    }

    #[test]
    fn default_namespace_applies_to_elements_not_attributes() {
        let map = ns(&[("", "http://example.com")]);
        let sel = Selector::parse("a[title]", &map).unwrap();
        let (ty, at) = match &sel.items[..] {
            [SelItem::Type { prefix, .. }, SelItem::Attrib { prefix: ap, .. }] => (prefix, ap),
            other => panic!("unexpected items: {other:?}"),
        };
        assert_eq!(*ty, NsPrefix::Uri("http://example.com".to_string()));
        assert_eq!(*at, NsPrefix::None);
    }

    #[test]
    fn invalid_selectors_rejected() {
        let none = HashMap::new();
        assert!(Selector::parse("", &none).is_err());
        assert!(Selector::parse("p @here", &none).is_err());
        assert!(Selector::parse("a >", &none).is_err());
        assert!(Selector::parse("> a", &none).is_err());
        assert!(Selector::parse("a &b", &none).is_err());
        assert!(Selector::parse("[a", &none).is_err());
    }

    #[test]
    fn selector_group_splits_on_top_level_commas() {
        let none = HashMap::new();
        let list = SelectorList::parse("a, b:not(.c, .d), e", &none);
        // :not with a selector list argument keeps its commas inside
        let list = list.unwrap();
        assert_eq!(list.length(), 3);
    }

    #[test]
    fn page_selectors() {
        let sel = PageSelector::parse("vertical:first").unwrap();
        assert_eq!(sel.name.as_deref(), Some("vertical"));
        assert_eq!(sel.pseudo.as_deref(), Some("first"));
        assert_eq!(sel.specificity(), Specificity(1, 1, 0));
        assert_eq!(sel.selector_text(), "vertical:first");

        assert_eq!(
            PageSelector::parse(":left").unwrap().specificity(),
            Specificity(0, 0, 1)
        );
        assert_eq!(
            PageSelector::parse(":blank").unwrap().specificity(),
            Specificity(0, 1, 0)
        );
        assert_eq!(PageSelector::parse("").unwrap(), PageSelector::default());
        assert!(PageSelector::parse("a b").is_err());
        assert!(PageSelector::parse("auto").is_err());
    }

    #[test]
    fn unknown_pseudo_pages_are_kept_as_written() {
        let sel = PageSelector::parse(":UNKNOWNIDENT").unwrap();
        assert_eq!(sel.pseudo.as_deref(), Some("UNKNOWNIDENT"));
        assert_eq!(sel.specificity(), Specificity(0, 0, 0));
        // known pseudo-pages still normalize
        assert_eq!(
            PageSelector::parse(":LEFT").unwrap().pseudo.as_deref(),
            Some("left")
        );
    }

    #[test]
    fn page_selector_comments() {
        let sel = PageSelector::parse("/*1*/ /*2*/:left /*3*/").unwrap();
        assert_eq!(sel.pseudo.as_deref(), Some("left"));
        assert_eq!(sel.selector_text(), "/*1*/ /*2*/ :left /*3*/");

        // nothing may separate ':' from the pseudo-page name
        assert!(PageSelector::parse(":/*1*/left").is_err());
        assert!(PageSelector::parse(": left").is_err());
        // or the page name from ':'
        assert!(PageSelector::parse("a :left").is_err());
    }
}
