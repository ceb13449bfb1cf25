//! The production parser: token stream in, rule tree out.
//!
//! Parsing is forward-only with local error recovery: an invalid
//! construct is skipped up to the next safe point (a `;` or the end of
//! its block, brackets balanced) and the rest of the sheet survives.
//! [`ErrorPolicy::Strict`] turns every recovery into a hard error
//! instead, for single-rule APIs that must not guess.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::imports::{urljoin, FetchContent, Fetcher};
use crate::om::style::{self, DeclEntry};
use crate::om::variables::VariableEntry;
use crate::om::{
    CssRule, CssStyleSheet, CssVariablesDeclaration, MediaList, PageSelector, SelectorList,
};
use crate::om::{HrefFormat, RuleBody};
use crate::tokenizer::{self, Token, TokenKind, TokenStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Any unparsable construct is an error.
    Strict,
    /// Unparsable constructs are dropped with a warning.
    #[default]
    Permissive,
}

/// Margin at-keywords allowed inside `@page`.
const MARGIN_KEYWORDS: [&str; 16] = [
    "bottom-center",
    "bottom-left",
    "bottom-left-corner",
    "bottom-right",
    "bottom-right-corner",
    "left-bottom",
    "left-middle",
    "left-top",
    "right-bottom",
    "right-middle",
    "right-top",
    "top-center",
    "top-left",
    "top-left-corner",
    "top-right",
    "top-right-corner",
];

const MAX_IMPORT_DEPTH: u32 = 20;

pub(crate) struct Parser<'a> {
    stream: TokenStream,
    policy: ErrorPolicy,
    fetcher: Option<&'a dyn Fetcher>,
    base_href: Option<String>,
    /// Caller-forced encoding, propagated into imported sheets.
    override_encoding: Option<String>,
    /// This sheet's explicitly determined encoding; the referrer
    /// encoding for its imports.
    explicit_encoding: Option<String>,
    namespaces: HashMap<String, String>,
    import_depth: u32,
}

/// Structural zones of a sheet; rules must not move backwards.
#[derive(PartialEq, PartialOrd, Clone, Copy)]
enum Zone {
    Start,
    Imports,
    Namespaces,
    Variables,
    Body,
}

/// Parses a sheet with no import loading, permissively.
pub(crate) fn parse_sheet_text(text: &str, href: Option<&str>) -> Result<CssStyleSheet> {
    parse_sheet(
        text,
        href,
        ErrorPolicy::Permissive,
        None,
        None,
        None,
        0,
    )
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn parse_sheet(
    text: &str,
    href: Option<&str>,
    policy: ErrorPolicy,
    fetcher: Option<&dyn Fetcher>,
    override_encoding: Option<&str>,
    explicit_encoding: Option<&str>,
    import_depth: u32,
) -> Result<CssStyleSheet> {
    let sheet = CssStyleSheet::new();
    sheet.set_href(href.map(str::to_string));
    let mut parser = Parser {
        stream: TokenStream::new(text),
        policy,
        fetcher,
        base_href: href.map(str::to_string),
        override_encoding: override_encoding.map(str::to_string),
        explicit_encoding: explicit_encoding.map(str::to_string),
        namespaces: HashMap::new(),
        import_depth,
    };
    let rules = parser.parse_rule_list(true)?;
    for rule in rules {
        sheet.append_rule_object(rule);
    }
    if let Some(enc) = explicit_encoding {
        sheet.set_encoding(Some(enc))?;
    }
    Ok(sheet)
}

/// Parses exactly one rule, strictly, in the given namespace context.
pub(crate) fn parse_rule(
    text: &str,
    namespaces: &HashMap<String, String>,
) -> Result<CssRule> {
    let mut parser = Parser {
        stream: TokenStream::new(text),
        policy: ErrorPolicy::Strict,
        fetcher: None,
        base_href: None,
        override_encoding: None,
        explicit_encoding: None,
        namespaces: namespaces.clone(),
        import_depth: 0,
    };
    let mut rules = parser.parse_rule_list(true)?.into_iter();
    match (rules.next(), rules.next()) {
        (Some(rule), None) => Ok(rule),
        (None, _) => Err(Error::syntax("no rule found", 1, 1)),
        (Some(_), Some(_)) => Err(Error::syntax("expected a single rule", 1, 1)),
    }
}

impl<'a> Parser<'a> {
    /// Parses rules until end of input (`top_level`) or an unconsumed
    /// closing brace.
    fn parse_rule_list(&mut self, top_level: bool) -> Result<Vec<CssRule>> {
        let mut rules: Vec<CssRule> = Vec::new();
        let mut zone = if top_level { Zone::Start } else { Zone::Body };
        // @charset must be the very first bytes, before any whitespace
        let mut at_start = top_level;
        loop {
            let Some(tok) = self.stream.peek().cloned() else {
                break;
            };
            match tok.kind {
                TokenKind::Space => {
                    self.stream.next();
                }
                TokenKind::Cdo | TokenKind::Cdc if top_level => {
                    self.stream.next();
                }
                TokenKind::Comment => {
                    self.stream.next();
                    rules.push(CssRule::comment(&tok.value));
                }
                TokenKind::AtKeyword => {
                    if let Some(rule) = self.parse_at_rule(&tok, &mut zone, top_level, at_start)? {
                        rules.push(rule);
                    }
                }
                TokenKind::Char if tok.ch() == '}' => {
                    if top_level {
                        // stray closer: drop it and whatever follows up
                        // to the next recovery point
                        self.stream.next();
                        self.recover(Error::syntax("unexpected \"}\"", tok.line, tok.column))?;
                        self.skip_to_recovery();
                    } else {
                        break;
                    }
                }
                _ => {
                    zone = Zone::Body;
                    if let Some(rule) = self.parse_style_rule()? {
                        rules.push(rule);
                    }
                }
            }
            at_start = false;
        }
        Ok(rules)
    }

    fn recover(&mut self, err: Error) -> Result<()> {
        match self.policy {
            ErrorPolicy::Strict => Err(err),
            ErrorPolicy::Permissive => {
                log::warn!("{err}");
                Ok(())
            }
        }
    }

    /// Skips tokens up to a safe point: past a `;` at bracket depth
    /// zero, past the brace block the construct opened, or up to (not
    /// past) a closing brace belonging to the enclosing block.
    fn skip_to_recovery(&mut self) {
        let mut depth = 0i32;
        while let Some(t) = self.stream.peek().cloned() {
            match t.kind {
                TokenKind::Function => {
                    depth += 1;
                    self.stream.next();
                }
                TokenKind::Char => match t.ch() {
                    '(' | '[' => {
                        depth += 1;
                        self.stream.next();
                    }
                    ')' | ']' => {
                        depth -= 1;
                        self.stream.next();
                    }
                    '{' => {
                        depth += 1;
                        self.stream.next();
                    }
                    '}' => {
                        if depth == 0 {
                            return;
                        }
                        depth -= 1;
                        self.stream.next();
                        if depth == 0 {
                            return;
                        }
                    }
                    ';' if depth == 0 => {
                        self.stream.next();
                        return;
                    }
                    _ => {
                        self.stream.next();
                    }
                },
                _ => {
                    self.stream.next();
                }
            }
        }
    }

    /// Collects tokens until a top-depth occurrence of any of `stops`;
    /// the stop token is not consumed.
    fn collect_until(&mut self, stops: &[char]) -> Vec<Token> {
        let mut out = Vec::new();
        let mut depth = 0i32;
        while let Some(t) = self.stream.peek().cloned() {
            match t.kind {
                TokenKind::Function => depth += 1,
                TokenKind::Char => match t.ch() {
                    '(' | '[' => depth += 1,
                    ')' | ']' => depth -= 1,
                    c if depth == 0 && stops.contains(&c) => break,
                    _ => {}
                },
                _ => {}
            }
            self.stream.next();
            out.push(t);
        }
        out
    }

    /// Collects the content of a brace block after the opening `{` has
    /// been consumed, up to and including the matching `}`.
    fn collect_block(&mut self) -> Vec<Token> {
        let mut out = Vec::new();
        let mut depth = 0i32;
        while let Some(t) = self.stream.next() {
            match t.kind {
                TokenKind::Char if t.ch() == '{' => depth += 1,
                TokenKind::Char if t.ch() == '}' => {
                    if depth == 0 {
                        return out;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            out.push(t);
        }
        out
    }

    // at-rules

    fn parse_at_rule(
        &mut self,
        tok: &Token,
        zone: &mut Zone,
        top_level: bool,
        at_start: bool,
    ) -> Result<Option<CssRule>> {
        let keyword = tokenizer::normalize(&tok.value[1..]);
        match keyword.as_str() {
            "charset" => self.parse_charset(tok, zone, at_start),
            "import" => self.parse_import(tok, zone, top_level),
            "namespace" => self.parse_namespace(tok, zone, top_level),
            "variables" => self.parse_variables(tok, zone),
            "media" => self.parse_media(tok, zone),
            "page" => self.parse_page(tok, zone),
            "font-face" => self.parse_font_face(tok, zone),
            k if MARGIN_KEYWORDS.contains(&k) => {
                self.stream.next();
                self.recover(Error::syntax(
                    format!("@{k} only allowed inside @page"),
                    tok.line,
                    tok.column,
                ))?;
                self.skip_to_recovery();
                Ok(None)
            }
            _ => self.parse_unknown_at_rule(tok, zone),
        }
    }

    fn drop_at_rule(&mut self, err: Error) -> Result<Option<CssRule>> {
        self.recover(err)?;
        self.skip_to_recovery();
        Ok(None)
    }

    /// `@charset "name";`, literal, only as the very first construct.
    fn parse_charset(
        &mut self,
        tok: &Token,
        zone: &mut Zone,
        at_start: bool,
    ) -> Result<Option<CssRule>> {
        self.stream.next();
        let exact = tok.value == "@charset"
            && self.stream.peek().is_some_and(|t| t.value == " ")
            && self
                .stream
                .peek_at(1)
                .is_some_and(|t| t.kind == TokenKind::String && t.value.starts_with('"'));
        if !at_start || !exact {
            return self.drop_at_rule(Error::syntax(
                "@charset must be exactly \"@charset \\\"...\\\";\" at the sheet start",
                tok.line,
                tok.column,
            ));
        }
        self.stream.next();
        let Some(lit) = self.stream.next() else {
            return self.drop_at_rule(Error::syntax(
                "malformed @charset rule",
                tok.line,
                tok.column,
            ));
        };
        if !tokenizer::is_closed_string(&lit.value)
            || !self.stream.peek().is_some_and(|t| t.is_char(';'))
        {
            return self.drop_at_rule(Error::syntax(
                "malformed @charset rule",
                tok.line,
                tok.column,
            ));
        }
        self.stream.next();
        let encoding = tokenizer::string_value(&lit.value).to_ascii_lowercase();
        if crate::encoding::Codec::for_label(&encoding).is_none() {
            self.recover(Error::UnicodeDecode {
                encoding: encoding.clone(),
                message: "unknown encoding".to_string(),
            })?;
            return Ok(None);
        }
        *zone = Zone::Imports;
        Ok(Some(CssRule::new(RuleBody::Charset { encoding })))
    }

    fn parse_import(
        &mut self,
        tok: &Token,
        zone: &mut Zone,
        top_level: bool,
    ) -> Result<Option<CssRule>> {
        self.stream.next();
        if !top_level || *zone > Zone::Imports {
            return self.drop_at_rule(Error::syntax(
                "@import only allowed before any other rule",
                tok.line,
                tok.column,
            ));
        }
        self.stream.skip_space();

        let (href, href_format) = match self.stream.peek().cloned() {
            Some(t) if t.kind == TokenKind::Uri => {
                self.stream.next();
                match tokenizer::uri_value(&t.value) {
                    Some(href) => (href, HrefFormat::Uri),
                    None => {
                        return self.drop_at_rule(Error::syntax(
                            "malformed url() in @import",
                            t.line,
                            t.column,
                        ));
                    }
                }
            }
            Some(t) if t.kind == TokenKind::String => {
                self.stream.next();
                if !tokenizer::is_closed_string(&t.value) {
                    return self.drop_at_rule(Error::syntax(
                        "unterminated string in @import",
                        t.line,
                        t.column,
                    ));
                }
                (tokenizer::string_value(&t.value), HrefFormat::Str)
            }
            _ => {
                return self.drop_at_rule(Error::syntax(
                    "expected a url or string after @import",
                    tok.line,
                    tok.column,
                ));
            }
        };

        let mut rest = self.collect_until(&[';', '{', '}']);
        match self.stream.peek() {
            Some(t) if t.is_char(';') => {
                self.stream.next();
            }
            None => {}
            Some(t) => {
                let err = Error::syntax("malformed @import rule", t.line, t.column);
                return self.drop_at_rule(err);
            }
        }

        // an optional sheet name trails the media list
        let mut name = None;
        while rest
            .last()
            .is_some_and(|t| t.kind == TokenKind::Space)
        {
            rest.pop();
        }
        if let Some(t) = rest.last() {
            if t.kind == TokenKind::String {
                if !tokenizer::is_closed_string(&t.value) {
                    let err =
                        Error::syntax("unterminated string in @import", t.line, t.column);
                    return self.drop_at_rule(err);
                }
                name = Some(tokenizer::string_value(&t.value));
                rest.pop();
            }
        }

        let media = MediaList::new();
        let media_text: String = rest.iter().map(|t| t.value.as_str()).collect();
        if !media_text.trim().is_empty() {
            if let Err(err) = media.set_media_text(&media_text) {
                return self.drop_at_rule(err);
            }
        }

        let sheet = self.load_import(&href);
        *zone = Zone::Imports;
        let rule = CssRule::new(RuleBody::Import {
            href,
            href_format,
            media,
            name,
            sheet,
        });
        if let Some(child) = rule.imported_sheet() {
            child.0.borrow_mut().owner_rule = Some(std::rc::Rc::downgrade(&rule.0));
        }
        Ok(Some(rule))
    }

    /// Fetches and parses an imported sheet; failures only log.
    fn load_import(&mut self, href: &str) -> Option<CssStyleSheet> {
        let fetcher = self.fetcher?;
        if self.import_depth >= MAX_IMPORT_DEPTH {
            log::warn!("@import nesting too deep at {href:?}");
            return None;
        }
        let url = urljoin(self.base_href.as_deref(), href);
        let fetched = match fetcher.fetch(&url) {
            Ok(Some(f)) => f,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("failed to fetch @import {url:?}: {err}");
                return None;
            }
        };
        let (transport_encoding, content) = fetched;
        let decoded = match content {
            FetchContent::Text(text) => {
                let explicit = crate::encoding::resolve_text_encoding(
                    &text,
                    self.override_encoding.as_deref(),
                    self.explicit_encoding.as_deref(),
                );
                match explicit {
                    Ok(explicit) => Ok((text, explicit)),
                    Err(err) => Err(err),
                }
            }
            FetchContent::Bytes(bytes) => crate::encoding::decode_css_bytes(
                &bytes,
                self.override_encoding.as_deref(),
                transport_encoding.as_deref(),
                self.explicit_encoding.as_deref(),
            ),
        };
        let (text, explicit) = match decoded {
            Ok(d) => d,
            Err(err) => {
                log::warn!("cannot decode @import {url:?}: {err}");
                return None;
            }
        };
        match parse_sheet(
            &text,
            Some(&url),
            self.policy,
            Some(fetcher),
            self.override_encoding.as_deref(),
            explicit.as_deref(),
            self.import_depth + 1,
        ) {
            Ok(sheet) => Some(sheet),
            Err(err) => {
                log::warn!("cannot parse @import {url:?}: {err}");
                None
            }
        }
    }

    fn parse_namespace(
        &mut self,
        tok: &Token,
        zone: &mut Zone,
        top_level: bool,
    ) -> Result<Option<CssRule>> {
        self.stream.next();
        if !top_level || *zone > Zone::Namespaces {
            return self.drop_at_rule(Error::syntax(
                "@namespace only allowed before style rules",
                tok.line,
                tok.column,
            ));
        }
        self.stream.skip_space();
        let mut prefix = String::new();
        if let Some(t) = self.stream.peek().cloned() {
            if t.kind == TokenKind::Ident {
                prefix = tokenizer::normalize(&t.value);
                self.stream.next();
                self.stream.skip_space();
            }
        }
        let uri = match self.stream.peek().cloned() {
            Some(t) if t.kind == TokenKind::String && tokenizer::is_closed_string(&t.value) => {
                self.stream.next();
                tokenizer::string_value(&t.value)
            }
            Some(t) if t.kind == TokenKind::Uri => {
                self.stream.next();
                match tokenizer::uri_value(&t.value) {
                    Some(uri) => uri,
                    None => {
                        return self.drop_at_rule(Error::syntax(
                            "malformed url() in @namespace",
                            t.line,
                            t.column,
                        ));
                    }
                }
            }
            _ => {
                return self.drop_at_rule(Error::syntax(
                    "expected a namespace uri",
                    tok.line,
                    tok.column,
                ));
            }
        };
        self.stream.skip_space();
        match self.stream.peek() {
            Some(t) if t.is_char(';') => {
                self.stream.next();
            }
            None => {}
            Some(t) => {
                let err = Error::syntax("malformed @namespace rule", t.line, t.column);
                return self.drop_at_rule(err);
            }
        }
        self.namespaces.insert(prefix.clone(), uri.clone());
        *zone = Zone::Namespaces;
        Ok(Some(CssRule::new(RuleBody::Namespace { prefix, uri })))
    }

    fn parse_variables(&mut self, tok: &Token, zone: &mut Zone) -> Result<Option<CssRule>> {
        self.stream.next();
        if *zone > Zone::Variables {
            return self.drop_at_rule(Error::syntax(
                "@variables only allowed before style rules",
                tok.line,
                tok.column,
            ));
        }
        self.stream.skip_space();
        match self.stream.peek() {
            Some(t) if t.is_char('{') => {
                self.stream.next();
            }
            _ => {
                return self.drop_at_rule(Error::syntax(
                    "expected \"{\" after @variables",
                    tok.line,
                    tok.column,
                ));
            }
        }
        let block = self.collect_block();
        let variables = CssVariablesDeclaration::new();
        let mut entries = Vec::new();
        for entry in style::parse_declaration_block(&block) {
            if let DeclEntry::Property(p) = entry {
                entries.push(VariableEntry {
                    name: p.name,
                    literal_name: p.literal_name,
                    value: p.value,
                });
            }
        }
        variables.set_entries(entries);
        *zone = Zone::Variables;
        let rule = CssRule::new(RuleBody::Variables { variables });
        rule.reattach_children();
        Ok(Some(rule))
    }

    fn parse_media(&mut self, tok: &Token, zone: &mut Zone) -> Result<Option<CssRule>> {
        self.stream.next();
        let head = self.collect_until(&['{', ';', '}']);
        match self.stream.peek() {
            Some(t) if t.is_char('{') => {
                self.stream.next();
            }
            _ => {
                return self.drop_at_rule(Error::syntax(
                    "expected \"{\" after @media",
                    tok.line,
                    tok.column,
                ));
            }
        }
        let media = MediaList::new();
        let media_text: String = head.iter().map(|t| t.value.as_str()).collect();
        if let Err(err) = media.set_media_text(&media_text) {
            // the whole block is invalid with its media list
            self.recover(err)?;
            self.collect_block();
            return Ok(None);
        }
        let rules = self.parse_rule_list(false)?;
        match self.stream.peek() {
            Some(t) if t.is_char('}') => {
                self.stream.next();
            }
            _ => {
                self.recover(Error::syntax("unclosed @media block", tok.line, tok.column))?;
            }
        }
        *zone = Zone::Body;
        let rule = CssRule::new(RuleBody::Media { media, rules });
        rule.reattach_children();
        Ok(Some(rule))
    }

    fn parse_page(&mut self, tok: &Token, zone: &mut Zone) -> Result<Option<CssRule>> {
        self.stream.next();
        let head = self.collect_until(&['{', ';', '}']);
        match self.stream.peek() {
            Some(t) if t.is_char('{') => {
                self.stream.next();
            }
            _ => {
                return self.drop_at_rule(Error::syntax(
                    "expected \"{\" after @page",
                    tok.line,
                    tok.column,
                ));
            }
        }
        let selector = match PageSelector::from_tokens(&head) {
            Ok(sel) => sel,
            Err(err) => {
                self.recover(err)?;
                self.collect_block();
                return Ok(None);
            }
        };

        // the block mixes declarations with margin at-rules
        let style = crate::om::CssStyleDeclaration::new();
        let mut margins = Vec::new();
        let mut decl_tokens: Vec<Token> = Vec::new();
        loop {
            let Some(t) = self.stream.peek().cloned() else {
                self.recover(Error::syntax("unclosed @page block", tok.line, tok.column))?;
                break;
            };
            match t.kind {
                TokenKind::Char if t.ch() == '}' => {
                    self.stream.next();
                    break;
                }
                TokenKind::AtKeyword => {
                    let keyword = tokenizer::normalize(&t.value[1..]);
                    if !MARGIN_KEYWORDS.contains(&keyword.as_str()) {
                        self.stream.next();
                        self.recover(Error::syntax(
                            format!("@{keyword} not allowed inside @page"),
                            t.line,
                            t.column,
                        ))?;
                        self.skip_to_recovery();
                        continue;
                    }
                    self.stream.next();
                    self.stream.skip_space();
                    match self.stream.peek() {
                        Some(n) if n.is_char('{') => {
                            self.stream.next();
                        }
                        _ => {
                            self.recover(Error::syntax(
                                format!("expected \"{{\" after @{keyword}"),
                                t.line,
                                t.column,
                            ))?;
                            self.skip_to_recovery();
                            continue;
                        }
                    }
                    let block = self.collect_block();
                    let margin_style = crate::om::CssStyleDeclaration::new();
                    margin_style
                        .0
                        .borrow_mut()
                        .entries
                        .extend(style::parse_declaration_block(&block));
                    let margin = CssRule::new(RuleBody::Margin {
                        keyword,
                        style: margin_style,
                    });
                    margin.reattach_children();
                    margins.push(margin);
                }
                _ => {
                    // everything up to the next margin rule or block end
                    let mut chunk = self.collect_until_any_at_or_close();
                    decl_tokens.append(&mut chunk);
                }
            }
        }
        style
            .0
            .borrow_mut()
            .entries
            .extend(style::parse_declaration_block(&decl_tokens));
        *zone = Zone::Body;
        let rule = CssRule::new(RuleBody::Page {
            selector,
            style,
            margins,
        });
        rule.reattach_children();
        Ok(Some(rule))
    }

    /// Collects tokens up to a top-depth at-keyword or closing brace.
    fn collect_until_any_at_or_close(&mut self) -> Vec<Token> {
        let mut out = Vec::new();
        let mut depth = 0i32;
        while let Some(t) = self.stream.peek().cloned() {
            match t.kind {
                TokenKind::AtKeyword if depth == 0 => break,
                TokenKind::Function => depth += 1,
                TokenKind::Char => match t.ch() {
                    '(' | '[' | '{' => depth += 1,
                    ')' | ']' => depth -= 1,
                    '}' => {
                        if depth == 0 {
                            break;
                        }
                        depth -= 1;
                    }
                    _ => {}
                },
                _ => {}
            }
            self.stream.next();
            out.push(t);
        }
        out
    }

    fn parse_font_face(&mut self, tok: &Token, zone: &mut Zone) -> Result<Option<CssRule>> {
        self.stream.next();
        self.stream.skip_space();
        match self.stream.peek() {
            Some(t) if t.is_char('{') => {
                self.stream.next();
            }
            _ => {
                return self.drop_at_rule(Error::syntax(
                    "expected \"{\" after @font-face",
                    tok.line,
                    tok.column,
                ));
            }
        }
        let block = self.collect_block();
        let style = crate::om::CssStyleDeclaration::new();
        style
            .0
            .borrow_mut()
            .entries
            .extend(style::parse_declaration_block(&block));
        *zone = Zone::Body;
        let rule = CssRule::new(RuleBody::FontFace { style });
        rule.reattach_children();
        Ok(Some(rule))
    }

    /// Any other at-rule is kept verbatim: the at-keyword plus its
    /// balanced body (up to `;` or a complete brace block).
    fn parse_unknown_at_rule(&mut self, tok: &Token, zone: &mut Zone) -> Result<Option<CssRule>> {
        self.stream.next();
        let mut tokens = Vec::new();
        let mut depth = 0i32;
        let mut entered_block = false;
        while let Some(t) = self.stream.peek().cloned() {
            match t.kind {
                TokenKind::Char => match t.ch() {
                    '{' | '(' | '[' => {
                        depth += 1;
                        entered_block = entered_block || t.ch() == '{';
                    }
                    ')' | ']' => depth -= 1,
                    '}' => {
                        if depth == 0 {
                            // belongs to the enclosing block
                            break;
                        }
                        depth -= 1;
                        if depth == 0 && entered_block {
                            self.stream.next();
                            tokens.push(t);
                            break;
                        }
                    }
                    ';' if depth == 0 => {
                        self.stream.next();
                        tokens.push(t);
                        break;
                    }
                    _ => {}
                },
                TokenKind::Function => depth += 1,
                _ => {}
            }
            self.stream.next();
            tokens.push(t);
        }
        *zone = Zone::Body;
        Ok(Some(CssRule::new(RuleBody::Unknown {
            at_keyword: tok.value.clone(),
            tokens,
        })))
    }

    // style rules

    fn parse_style_rule(&mut self) -> Result<Option<CssRule>> {
        let start = self.stream.location();
        let head = self.collect_until(&['{', ';', '}']);
        match self.stream.peek() {
            Some(t) if t.is_char('{') => {
                self.stream.next();
            }
            _ => {
                self.recover(Error::syntax(
                    "expected \"{\" after a selector",
                    start.0,
                    start.1,
                ))?;
                self.skip_to_recovery();
                return Ok(None);
            }
        }
        let selectors = match SelectorList::from_tokens(&head, &self.namespaces) {
            Ok(list) => list,
            Err(err) => {
                self.recover(err)?;
                self.collect_block();
                return Ok(None);
            }
        };
        let block = self.collect_block();
        let style = crate::om::CssStyleDeclaration::new();
        style
            .0
            .borrow_mut()
            .entries
            .extend(style::parse_declaration_block(&block));
        let rule = CssRule::new(RuleBody::Style { selectors, style });
        rule.reattach_children();
        Ok(Some(rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::om::RuleType;

    fn sheet(css: &str) -> CssStyleSheet {
        parse_sheet_text(css, None).unwrap()
    }

    fn types(css: &str) -> Vec<RuleType> {
        sheet(css).rules().iter().map(|r| r.rule_type()).collect()
    }

    #[test]
    fn basic_sheet() {
        assert_eq!(
            types("@charset \"ascii\";@import url(x);@namespace p \"u\";a{x:1}"),
            vec![
                RuleType::Charset,
                RuleType::Import,
                RuleType::Namespace,
                RuleType::Style
            ]
        );
    }

    #[test]
    fn charset_must_be_literal_and_first() {
        assert_eq!(types(" @charset \"ascii\";"), vec![]);
        assert_eq!(types("@charset 'ascii';"), vec![]);
        assert_eq!(types("@CHARSET \"ascii\";"), vec![]);
        assert_eq!(types("a{x:1}@charset \"ascii\";"), vec![RuleType::Style]);
    }

    #[test]
    fn import_after_style_is_dropped() {
        assert_eq!(
            types("a{x:1}@import url(x);b{y:2}"),
            vec![RuleType::Style, RuleType::Style]
        );
    }

    #[test]
    fn stray_brace_drops_following_ruleset() {
        let s = sheet("a {color: blue}} a{color: red} a{color: green}");
        let colors: Vec<String> = s
            .rules()
            .iter()
            .map(|r| r.style().unwrap().get_property_value("color"))
            .collect();
        assert_eq!(colors, vec!["blue", "green"]);
    }

    #[test]
    fn invalid_selector_drops_ruleset() {
        assert_eq!(types("p @here {color: red} b{y:2}"), vec![RuleType::Style]);
        assert_eq!(types("@1; b{y:2}"), vec![RuleType::Style]);
    }

    #[test]
    fn media_block() {
        let s = sheet("@media print, screen { a {x:1} /*c*/ b{y:2} }");
        let media = s.rule(0).unwrap();
        assert_eq!(media.rule_type(), RuleType::Media);
        assert_eq!(media.media().unwrap().media_text(), "print, screen");
        let kinds: Vec<RuleType> = media.rules().iter().map(|r| r.rule_type()).collect();
        assert_eq!(
            kinds,
            vec![RuleType::Style, RuleType::Comment, RuleType::Style]
        );
        assert!(media.rules()[0].parent_rule().is_some());
    }

    #[test]
    fn media_with_invalid_list_is_dropped() {
        assert_eq!(types("@media foo!bar { a{x:1} } b{y:2}"), vec![RuleType::Style]);
    }

    #[test]
    fn page_with_margin_rules() {
        let s = sheet("@page :first { margin: 1cm; @top-left { content: \"a\" } top: 0 }");
        let page = s.rule(0).unwrap();
        assert_eq!(page.rule_type(), RuleType::Page);
        assert_eq!(page.page_selector().unwrap().pseudo.as_deref(), Some("first"));
        let style = page.style().unwrap();
        assert_eq!(style.get_property_value("margin"), "1cm");
        assert_eq!(style.get_property_value("top"), "0");
        let margins = page.rules();
        assert_eq!(margins.len(), 1);
        assert_eq!(margins[0].margin_keyword().as_deref(), Some("top-left"));
        assert_eq!(
            margins[0].style().unwrap().get_property_value("content"),
            "\"a\""
        );
    }

    #[test]
    fn variables_rule() {
        let s = sheet("@variables { BackColor: #fff; x: 1 } a{color: var(BackColor)}");
        let vars = s.rule(0).unwrap().variables().unwrap();
        assert_eq!(vars.length(), 2);
        assert_eq!(vars.get_variable_value("backcolor"), "#fff");
    }

    #[test]
    fn unknown_at_rules_kept() {
        let s = sheet("@three-dee { @background-lighting { azimuth: 30deg } } h1 {x:1}");
        assert_eq!(
            s.rules().iter().map(|r| r.rule_type()).collect::<Vec<_>>(),
            vec![RuleType::Unknown, RuleType::Style]
        );
        let s = sheet("@foo bar;b{y:2}");
        assert_eq!(s.rule(0).unwrap().rule_type(), RuleType::Unknown);
    }

    #[test]
    fn namespace_prefixes_scope_selectors() {
        let s = sheet("@namespace p \"uri\"; p|a {x:1} q|b {y:2}");
        // the q prefix is undefined, that ruleset is dropped
        assert_eq!(
            s.rules().iter().map(|r| r.rule_type()).collect::<Vec<_>>(),
            vec![RuleType::Namespace, RuleType::Style]
        );
    }

    #[test]
    fn strict_single_rule_parsing() {
        let ns = HashMap::new();
        assert!(parse_rule("a {x:1}", &ns).is_ok());
        assert!(parse_rule("a {x:1} b {y:2}", &ns).is_err());
        assert!(parse_rule("p @here {x:1}", &ns).is_err());
        assert!(parse_rule("", &ns).is_err());
    }

    #[test]
    fn html_comment_markers_skipped_at_top_level() {
        assert_eq!(types("<!-- a{x:1} -->"), vec![RuleType::Style]);
    }
}
