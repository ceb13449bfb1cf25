//! Serialization of the object model back to CSS text.
//!
//! All output formatting is driven by [`Preferences`]; the defaults give
//! a readable pretty-print, [`Preferences::minified`] a compact one.
//! Rules, declarations and values are each rendered at nesting level
//! zero and indented as whole blocks by their container, so the same
//! code serves top-level and nested rules.

use std::collections::HashMap;

use crate::om::{
    CssRule, CssStyleDeclaration, CssStyleSheet, CssVariablesDeclaration, MediaList,
    PropertyValue, RuleType, Selector, SelectorList, Value,
};
use crate::om::{HrefFormat, RuleBody};
use crate::om::style::DeclEntry;
use crate::tokenizer::{self, Token, TokenKind};

/// Output formatting preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    /// Normalize at-keywords (`@\import` becomes `@import`).
    pub default_at_keyword: bool,
    /// Use normalized property names instead of the literal spelling.
    pub default_property_name: bool,
    /// Use normalized priority instead of the literal spelling.
    pub default_property_priority: bool,
    /// Pretty-print unknown at-rules instead of echoing them verbatim.
    pub format_unknown_at_rules: bool,
    /// Force `@import` targets to `url(...)` or string form; `None`
    /// keeps whatever was written.
    pub import_href_format: Option<ImportHrefFormat>,
    pub indent: String,
    /// Indent the closing brace one level deeper than the rule head.
    pub indent_closing_brace: bool,
    /// Emit repeated same-named properties, not only the winning one.
    pub keep_all_properties: bool,
    pub keep_comments: bool,
    pub keep_empty_rules: bool,
    pub keep_unknown_at_rules: bool,
    /// Drop `@namespace` rules no selector refers to.
    pub keep_used_namespace_rules_only: bool,
    pub line_numbers: bool,
    pub line_separator: String,
    /// Extra text after each top-level rule, e.g. `"\n"` for blank lines.
    pub lines_after_rules: String,
    /// After the comma of comma-separated lists.
    pub list_item_spacer: String,
    /// `#ffaa11` becomes `#fa1` when the pairs allow it.
    pub minimize_color_hash: bool,
    /// Write variable names normalized in `@variables` blocks.
    pub normalized_var_names: bool,
    pub omit_last_semicolon: bool,
    /// `0.1` becomes `.1`.
    pub omit_leading_zero: bool,
    /// Before an opening brace.
    pub parenthesis_spacer: String,
    /// After the colon of a declaration.
    pub property_name_spacer: String,
    /// Substitute `var()` references from reachable `@variables` rules.
    pub resolve_variables: bool,
    pub selector_combinator_spacer: String,
    pub spacer: String,
    /// Emit only properties that validate against the property profile.
    pub valid_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportHrefFormat {
    Uri,
    Str,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            default_at_keyword: true,
            default_property_name: true,
            default_property_priority: true,
            format_unknown_at_rules: true,
            import_href_format: None,
            indent: "    ".to_string(),
            indent_closing_brace: true,
            keep_all_properties: true,
            keep_comments: true,
            keep_empty_rules: false,
            keep_unknown_at_rules: true,
            keep_used_namespace_rules_only: false,
            line_numbers: false,
            line_separator: "\n".to_string(),
            lines_after_rules: String::new(),
            list_item_spacer: " ".to_string(),
            minimize_color_hash: true,
            normalized_var_names: true,
            omit_last_semicolon: true,
            omit_leading_zero: false,
            parenthesis_spacer: " ".to_string(),
            property_name_spacer: " ".to_string(),
            resolve_variables: true,
            selector_combinator_spacer: " ".to_string(),
            spacer: " ".to_string(),
            valid_only: false,
        }
    }
}

impl Preferences {
    /// Compact output: no whitespace, no comments, no unknown rules.
    pub fn minified() -> Preferences {
        Preferences {
            import_href_format: Some(ImportHrefFormat::Str),
            indent: String::new(),
            keep_comments: false,
            keep_unknown_at_rules: false,
            keep_used_namespace_rules_only: true,
            line_separator: String::new(),
            list_item_spacer: String::new(),
            omit_leading_zero: true,
            parenthesis_spacer: String::new(),
            property_name_spacer: String::new(),
            selector_combinator_spacer: String::new(),
            spacer: String::new(),
            ..Preferences::default()
        }
    }
}

/// Normalized variable name to value, collected across the import graph.
type VarMap = HashMap<String, PropertyValue>;

/// Renders the object model to text according to its [`Preferences`].
#[derive(Default)]
pub struct Serializer {
    pub prefs: Preferences,
}

impl Serializer {
    pub fn new(prefs: Preferences) -> Serializer {
        Serializer { prefs }
    }

    // stylesheet

    pub fn do_stylesheet(&self, sheet: &CssStyleSheet) -> String {
        let vars = self
            .prefs
            .resolve_variables
            .then(|| collect_variables(sheet));
        let prefixes = sheet.prefixes_by_uri();
        let used_uris = self
            .prefs
            .keep_used_namespace_rules_only
            .then(|| sheet.used_namespace_uris());

        let mut parts: Vec<String> = Vec::new();
        for rule in sheet.rules() {
            if let Some(used) = &used_uris {
                if let Some(uri) = rule.namespace_uri() {
                    if !used.contains(&uri) {
                        continue;
                    }
                }
            }
            let text = self.render_rule(&rule, vars.as_ref(), Some(&prefixes));
            if !text.is_empty() {
                parts.push(text);
            }
        }
        let sep = format!("{}{}", self.prefs.lines_after_rules, self.prefs.line_separator);
        let text = parts.join(&sep);
        if self.prefs.line_numbers {
            self.add_line_numbers(&text)
        } else {
            text
        }
    }

    fn add_line_numbers(&self, text: &str) -> String {
        let nl = &self.prefs.line_separator;
        if nl.is_empty() {
            return format!("1: {text}");
        }
        text.split(nl.as_str())
            .enumerate()
            .map(|(i, line)| format!("{}: {line}", i + 1))
            .collect::<Vec<_>>()
            .join(nl)
    }

    // rules

    pub fn do_rule(&self, rule: &CssRule) -> String {
        let prefixes = rule
            .parent_style_sheet()
            .map(|s| s.prefixes_by_uri());
        self.render_rule(rule, None, prefixes.as_ref())
    }

    fn render_rule(
        &self,
        rule: &CssRule,
        vars: Option<&VarMap>,
        prefixes: Option<&HashMap<String, String>>,
    ) -> String {
        let node = rule.0.borrow();
        match &node.body {
            RuleBody::Comment(text) => {
                if self.prefs.keep_comments {
                    text.clone()
                } else {
                    String::new()
                }
            }
            RuleBody::Charset { encoding } => {
                format!("@charset \"{encoding}\";")
            }
            RuleBody::Import {
                href,
                href_format,
                media,
                name,
                ..
            } => {
                let href_text = match (self.prefs.import_href_format, href_format) {
                    (Some(ImportHrefFormat::Str), _) | (None, HrefFormat::Str) => {
                        quote_raw_string(href)
                    }
                    _ => format!("url({href})"),
                };
                // a space is mandatory where tokens would merge, even
                // with an empty spacer
                let mut out = "@import".to_string();
                push_spaced(&mut out, &href_text, &self.prefs.spacer);
                if !media.is_all() {
                    push_spaced(&mut out, &self.do_media_list(media), &self.prefs.spacer);
                }
                if let Some(name) = name {
                    push_spaced(&mut out, &quote_raw_string(name), &self.prefs.spacer);
                }
                out.push(';');
                out
            }
            RuleBody::Namespace { prefix, uri } => {
                if prefix.is_empty() {
                    format!("@namespace {};", quote_raw_string(uri))
                } else {
                    format!("@namespace {prefix} {};", quote_raw_string(uri))
                }
            }
            RuleBody::Variables { variables } => {
                if self.prefs.resolve_variables {
                    return String::new();
                }
                let body = self.do_variables_declaration(variables);
                if body.is_empty() && !self.prefs.keep_empty_rules {
                    return String::new();
                }
                self.wrap_block("@variables", &body)
            }
            RuleBody::Media { media, rules } => {
                let mut parts = Vec::new();
                let mut has_content = false;
                for child in rules {
                    let text = self.render_rule(child, vars, prefixes);
                    if text.is_empty() {
                        continue;
                    }
                    if child.rule_type() != RuleType::Comment {
                        has_content = true;
                    }
                    parts.push(text);
                }
                if !has_content && !self.prefs.keep_empty_rules {
                    return String::new();
                }
                let head = format!("@media {}", self.do_media_list(media));
                self.wrap_block(&head, &parts.join(&self.prefs.line_separator))
            }
            RuleBody::FontFace { style } => {
                let body = self.render_declarations(style, vars);
                if body.is_empty() && !self.prefs.keep_empty_rules {
                    return String::new();
                }
                self.wrap_block("@font-face", &body)
            }
            RuleBody::Page {
                selector,
                style,
                margins,
            } => {
                let mut parts = Vec::new();
                let decls = self.render_declarations(style, vars);
                if !decls.is_empty() {
                    parts.push(decls);
                }
                for margin in margins {
                    let text = self.render_rule(margin, vars, prefixes);
                    if !text.is_empty() {
                        parts.push(text);
                    }
                }
                if parts.is_empty() && !self.prefs.keep_empty_rules {
                    return String::new();
                }
                let sel = selector.selector_text();
                let head = if sel.is_empty() {
                    "@page".to_string()
                } else {
                    format!("@page {sel}")
                };
                self.wrap_block(&head, &parts.join(&self.prefs.line_separator))
            }
            RuleBody::Margin { keyword, style } => {
                let body = self.render_declarations(style, vars);
                if body.is_empty() && !self.prefs.keep_empty_rules {
                    return String::new();
                }
                self.wrap_block(&format!("@{keyword}"), &body)
            }
            RuleBody::Style { selectors, style } => {
                let body = self.render_declarations(style, vars);
                if body.is_empty() && !self.prefs.keep_empty_rules {
                    return String::new();
                }
                let fallback;
                let prefixes = match prefixes {
                    Some(p) => p,
                    None => {
                        fallback = invert_prefixes(&selectors.namespaces);
                        &fallback
                    }
                };
                let head = self.render_selector_list(selectors, prefixes);
                if body.is_empty() {
                    return format!("{head}{}{{}}", self.prefs.parenthesis_spacer);
                }
                self.wrap_block(&head, &body)
            }
            RuleBody::Unknown { at_keyword, tokens } => {
                if !self.prefs.keep_unknown_at_rules {
                    return String::new();
                }
                self.format_unknown(at_keyword, tokens)
            }
        }
    }

    /// `head { body }` with the body indented one level.
    fn wrap_block(&self, head: &str, body: &str) -> String {
        let nl = &self.prefs.line_separator;
        let closing = if self.prefs.indent_closing_brace {
            self.prefs.indent.as_str()
        } else {
            ""
        };
        format!(
            "{head}{}{{{nl}{}{nl}{closing}}}",
            self.prefs.parenthesis_spacer,
            self.indent_block(body, 1),
        )
    }

    /// Prefixes every line with `level` indents; a no-op without a line
    /// separator.
    fn indent_block(&self, text: &str, level: usize) -> String {
        let nl = &self.prefs.line_separator;
        if nl.is_empty() {
            return text.to_string();
        }
        let prefix = self.prefs.indent.repeat(level);
        text.split(nl.as_str())
            .map(|line| format!("{prefix}{line}"))
            .collect::<Vec<_>>()
            .join(nl)
    }

    fn format_unknown(&self, at_keyword: &str, tokens: &[Token]) -> String {
        let at = if self.prefs.default_at_keyword {
            format!("@{}", tokenizer::normalize(&at_keyword[1..]))
        } else {
            at_keyword.to_string()
        };
        let verbatim = !self.prefs.format_unknown_at_rules
            || tokens.iter().any(|t| t.kind == TokenKind::Comment);
        if verbatim {
            let rest: String = tokens.iter().map(|t| t.value.as_str()).collect();
            return format!("{at}{rest}");
        }
        let nl = &self.prefs.line_separator;
        let mut out = at;
        let mut depth = 0usize;
        let mut at_line_start = false;
        for t in tokens {
            match t.kind {
                TokenKind::Space => {
                    if !at_line_start && !out.ends_with(' ') {
                        out.push(' ');
                    }
                }
                TokenKind::Char if t.ch() == '{' => {
                    out.push('{');
                    depth += 1;
                    out.push_str(nl);
                    out.push_str(&self.prefs.indent.repeat(depth));
                    at_line_start = true;
                }
                TokenKind::Char if t.ch() == ';' => {
                    while out.ends_with(' ') {
                        out.pop();
                    }
                    out.push(';');
                    out.push_str(nl);
                    out.push_str(&self.prefs.indent.repeat(depth));
                    at_line_start = true;
                }
                TokenKind::Char if t.ch() == '}' => {
                    depth = depth.saturating_sub(1);
                    if !at_line_start {
                        out.push_str(nl);
                        out.push_str(&self.prefs.indent.repeat(depth + 1));
                    }
                    out.push('}');
                    at_line_start = false;
                }
                _ => {
                    out.push_str(&t.value);
                    at_line_start = false;
                }
            }
        }
        out
    }

    // media

    pub fn do_media_list(&self, media: &MediaList) -> String {
        let queries = media.queries();
        if queries.is_empty() {
            return "all".to_string();
        }
        let texts: Vec<String> = queries
            .iter()
            .map(|q| {
                if self.prefs.keep_comments {
                    q.media_text()
                } else {
                    q.core_text()
                }
            })
            .collect();
        texts.join(&format!(",{}", self.prefs.list_item_spacer))
    }

    // selectors

    pub fn do_selector_list(
        &self,
        list: &SelectorList,
        namespaces: &HashMap<String, String>,
    ) -> String {
        self.render_selector_list(list, &invert_prefixes(namespaces))
    }

    fn render_selector_list(
        &self,
        list: &SelectorList,
        prefixes: &HashMap<String, String>,
    ) -> String {
        list.selectors()
            .iter()
            .map(|s| self.render_selector(s, prefixes))
            .collect::<Vec<_>>()
            .join(&format!(",{}", self.prefs.list_item_spacer))
    }

    pub fn do_selector(&self, sel: &Selector, namespaces: &HashMap<String, String>) -> String {
        self.render_selector(sel, &invert_prefixes(namespaces))
    }

    fn render_selector(&self, sel: &Selector, prefixes: &HashMap<String, String>) -> String {
        use crate::om::selector::{AttribValue, NsPrefix, SelItem};

        let ns_text = |prefix: &NsPrefix| -> String {
            match prefix {
                NsPrefix::None => String::new(),
                NsPrefix::NoNamespace => "|".to_string(),
                NsPrefix::Any => "*|".to_string(),
                NsPrefix::Uri(uri) => match prefixes.get(uri).map(String::as_str) {
                    Some("") | None => String::new(),
                    Some(p) => format!("{p}|"),
                },
            }
        };

        let mut out = String::new();
        for item in &sel.items {
            match item {
                SelItem::Type { prefix, name } => {
                    out.push_str(&ns_text(prefix));
                    out.push_str(name);
                }
                SelItem::Hash(name) => {
                    out.push('#');
                    out.push_str(name);
                }
                SelItem::Class(name) => {
                    out.push('.');
                    out.push_str(name);
                }
                SelItem::Attrib { prefix, name, op } => {
                    out.push('[');
                    out.push_str(&ns_text(prefix));
                    out.push_str(name);
                    if let Some(op) = op {
                        out.push_str(&op.op);
                        match &op.value {
                            AttribValue::Ident(v) => out.push_str(v),
                            AttribValue::Str(lit) => {
                                out.push_str(&tokenizer::serialize_string(lit))
                            }
                        }
                    }
                    out.push(']');
                }
                SelItem::Pseudo {
                    element,
                    name,
                    args,
                } => {
                    out.push(':');
                    if *element {
                        out.push(':');
                    }
                    out.push_str(name);
                    if let Some(args) = args {
                        out.push('(');
                        out.push_str(args);
                        out.push(')');
                    }
                }
                SelItem::Combinator(c) => match c.ch() {
                    None => out.push(' '),
                    Some(ch) => {
                        out.push_str(&self.prefs.selector_combinator_spacer);
                        out.push(ch);
                        out.push_str(&self.prefs.selector_combinator_spacer);
                    }
                },
                SelItem::Comment(text) => {
                    if self.prefs.keep_comments {
                        out.push_str(text);
                    }
                }
            }
        }
        out
    }

    // declarations

    pub fn do_style_declaration(&self, style: &CssStyleDeclaration) -> String {
        self.render_declarations(style, None)
    }

    fn render_declarations(&self, style: &CssStyleDeclaration, vars: Option<&VarMap>) -> String {
        let entries = style.entries();
        // which same-named property wins, for keep_all_properties=false
        let effective: Vec<bool> = {
            let mut winners: HashMap<&str, usize> = HashMap::new();
            for (i, e) in entries.iter().enumerate() {
                if let DeclEntry::Property(p) = e {
                    let slot = winners.entry(p.name.as_str()).or_insert(i);
                    let current = match &entries[*slot] {
                        DeclEntry::Property(c) => c,
                        _ => unreachable!(),
                    };
                    if p.is_important() || !current.is_important() {
                        *slot = i;
                    }
                }
            }
            entries
                .iter()
                .enumerate()
                .map(|(i, e)| match e {
                    DeclEntry::Property(p) => winners.get(p.name.as_str()) == Some(&i),
                    DeclEntry::Comment(_) => true,
                })
                .collect()
        };

        let mut parts: Vec<(String, bool)> = Vec::new();
        for (i, entry) in entries.iter().enumerate() {
            match entry {
                DeclEntry::Comment(text) => {
                    if self.prefs.keep_comments {
                        parts.push((text.clone(), false));
                    }
                }
                DeclEntry::Property(p) => {
                    if self.prefs.valid_only && !p.valid {
                        continue;
                    }
                    if !self.prefs.keep_all_properties && !effective[i] {
                        continue;
                    }
                    let name = if self.prefs.default_property_name {
                        p.name.clone()
                    } else {
                        p.literal_name.clone()
                    };
                    let value = self.render_value(&p.value, vars, 0);
                    let mut text =
                        format!("{name}:{}{value}", self.prefs.property_name_spacer);
                    if !p.priority.is_empty() {
                        let priority = if self.prefs.default_property_priority {
                            p.priority.clone()
                        } else {
                            p.literal_priority.clone()
                        };
                        text.push_str(&self.prefs.spacer);
                        text.push('!');
                        text.push_str(&priority);
                    }
                    parts.push((text, true));
                }
            }
        }

        let last_property = parts.iter().rposition(|(_, is_prop)| *is_prop);
        let mut lines = Vec::with_capacity(parts.len());
        for (i, (text, is_prop)) in parts.iter().enumerate() {
            let mut line = text.clone();
            if *is_prop && !(self.prefs.omit_last_semicolon && Some(i) == last_property) {
                line.push(';');
            }
            lines.push(line);
        }
        lines.join(&self.prefs.line_separator)
    }

    // variables

    pub fn do_variables_declaration(&self, vars: &CssVariablesDeclaration) -> String {
        let entries = vars.entries();
        let mut lines = Vec::with_capacity(entries.len());
        let last = entries.len().saturating_sub(1);
        for (i, entry) in entries.iter().enumerate() {
            let name = if self.prefs.normalized_var_names {
                entry.name.clone()
            } else {
                entry.literal_name.clone()
            };
            let mut line = format!(
                "{name}:{}{}",
                self.prefs.property_name_spacer,
                self.render_value(&entry.value, None, 0)
            );
            if !(self.prefs.omit_last_semicolon && i == last) {
                line.push(';');
            }
            lines.push(line);
        }
        lines.join(&self.prefs.line_separator)
    }

    // values

    pub fn do_value(&self, value: &PropertyValue) -> String {
        self.render_value(value, None, 0)
    }

    fn render_value(&self, value: &PropertyValue, vars: Option<&VarMap>, depth: u32) -> String {
        #[derive(PartialEq)]
        enum Prev {
            Start,
            Comma,
            Slash,
            Other,
        }
        let mut out = String::new();
        let mut prev = Prev::Start;
        for item in &value.items {
            let text = match item {
                Value::Comma => {
                    out.push(',');
                    prev = Prev::Comma;
                    continue;
                }
                Value::Slash => {
                    out.push('/');
                    prev = Prev::Slash;
                    continue;
                }
                Value::Comment(text) => {
                    if !self.prefs.keep_comments {
                        continue;
                    }
                    text.clone()
                }
                Value::Ident(name) => name.clone(),
                Value::Str(lit) => tokenizer::serialize_string(lit),
                Value::Uri(target) => self.render_uri(target),
                Value::Hash(hex) => self.render_hash(hex),
                Value::Number(lit) => self.render_number(lit, ""),
                Value::Percentage(lit) => {
                    let num = &lit[..lit.len() - 1];
                    self.render_number(num, "%")
                }
                Value::Dimension(lit) => {
                    let split = lit
                        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
                        .unwrap_or(lit.len());
                    let unit = tokenizer::normalize(&lit[split..]);
                    self.render_number(&lit[..split], &unit)
                }
                Value::UnicodeRange(lit) => lit.clone(),
                Value::Char(c) => c.to_string(),
                Value::Function { name, args } => {
                    match self.resolve_var(name, args, vars, depth) {
                        Some(resolved) => resolved,
                        None => {
                            let inner = self.render_value(
                                &PropertyValue { items: args.clone() },
                                vars,
                                depth,
                            );
                            format!("{name}({inner})")
                        }
                    }
                }
            };
            match prev {
                Prev::Start | Prev::Slash => {}
                Prev::Comma => out.push_str(&self.prefs.list_item_spacer),
                // a space is mandatory where adjacent values would merge
                // into one token, even with an empty spacer
                Prev::Other if self.prefs.spacer.is_empty() => {
                    let merges = out
                        .chars()
                        .last()
                        .zip(text.chars().next())
                        .is_some_and(|(a, b)| value_boundary(a) && value_boundary(b));
                    if merges {
                        out.push(' ');
                    }
                }
                Prev::Other => out.push_str(&self.prefs.spacer),
            }
            out.push_str(&text);
            prev = Prev::Other;
        }
        out
    }

    /// Splices a `var(name)` reference; unknown names stay literal.
    fn resolve_var(
        &self,
        name: &str,
        args: &[Value],
        vars: Option<&VarMap>,
        depth: u32,
    ) -> Option<String> {
        if depth > 32 || tokenizer::normalize(name) != "var" {
            return None;
        }
        let vars = vars?;
        let var_name = args.iter().find_map(|a| match a {
            Value::Ident(n) => Some(tokenizer::normalize(n)),
            _ => None,
        })?;
        let resolved = vars.get(&var_name)?;
        Some(self.render_value(resolved, Some(vars), depth + 1))
    }

    fn render_uri(&self, target: &str) -> String {
        let needs_quotes = target
            .chars()
            .any(|c| matches!(c, ' ' | '\t' | '\n' | '(' | ')' | ',' | '"' | '\'' | '\\'))
            || target.is_empty();
        if needs_quotes {
            format!("url({})", quote_raw_string(target))
        } else {
            format!("url({target})")
        }
    }

    fn render_hash(&self, hex: &str) -> String {
        if self.prefs.minimize_color_hash
            && hex.len() == 6
            && hex.chars().all(|c| c.is_ascii_hexdigit())
        {
            let c: Vec<char> = hex.chars().collect();
            if c[0].eq_ignore_ascii_case(&c[1])
                && c[2].eq_ignore_ascii_case(&c[3])
                && c[4].eq_ignore_ascii_case(&c[5])
            {
                return format!("#{}{}{}", c[0], c[2], c[4]);
            }
        }
        format!("#{hex}")
    }

    /// Canonical numeric form: no redundant zeros, no unit on a zero
    /// length, written sign kept on non-zero values.
    fn render_number(&self, literal: &str, unit: &str) -> String {
        const ZERO_DROPPABLE_UNITS: [&str; 8] =
            ["cm", "em", "ex", "in", "mm", "pc", "pt", "px"];

        let (sign, digits) = match literal.strip_prefix(['+', '-']) {
            Some(rest) => (&literal[..1], rest),
            None => ("", literal),
        };
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        let int_trimmed = int_part.trim_start_matches('0');
        let frac_trimmed = frac_part.trim_end_matches('0');

        if int_trimmed.is_empty() && frac_trimmed.is_empty() {
            if ZERO_DROPPABLE_UNITS.contains(&unit) {
                return "0".to_string();
            }
            return format!("0{unit}");
        }

        let mut out = String::new();
        out.push_str(sign);
        if int_trimmed.is_empty() {
            if !(self.prefs.omit_leading_zero && !frac_trimmed.is_empty()) {
                out.push('0');
            }
        } else {
            out.push_str(int_trimmed);
        }
        if !frac_trimmed.is_empty() {
            out.push('.');
            out.push_str(frac_trimmed);
        }
        out.push_str(unit);
        out
    }
}

/// Collects variable definitions: imported sheets first in document
/// order, the sheet's own `@variables` rules last, later names winning.
fn collect_variables(sheet: &CssStyleSheet) -> VarMap {
    fn walk(sheet: &CssStyleSheet, map: &mut VarMap, depth: u32) {
        if depth > 32 {
            return;
        }
        for rule in sheet.rules() {
            if let Some(child) = rule.imported_sheet() {
                walk(&child, map, depth + 1);
            }
        }
        for rule in sheet.rules() {
            if let Some(vars) = rule.variables() {
                for entry in vars.entries() {
                    map.insert(entry.name, entry.value);
                }
            }
        }
    }
    let mut map = VarMap::new();
    walk(sheet, &mut map, 0);
    map
}

/// Characters that glue neighboring value tokens together when not
/// separated: ident characters plus numeric continuations.
fn value_boundary(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '%' | '#') || !c.is_ascii()
}

fn invert_prefixes(namespaces: &HashMap<String, String>) -> HashMap<String, String> {
    namespaces
        .iter()
        .map(|(prefix, uri)| (uri.clone(), prefix.clone()))
        .collect()
}

/// Appends `part` after `spacer`, forcing a single space when an empty
/// spacer would merge adjacent ident-ish characters into one token.
fn push_spaced(out: &mut String, part: &str, spacer: &str) {
    let would_merge = |a: char, b: char| {
        let identish = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii();
        identish(a) && identish(b)
    };
    if spacer.is_empty() {
        if let (Some(a), Some(b)) = (out.chars().last(), part.chars().next()) {
            if would_merge(a, b) {
                out.push(' ');
            }
        }
    } else {
        out.push_str(spacer);
    }
    out.push_str(part);
}

/// Canonical double-quoted string from raw (unescaped) text.
pub(crate) fn quote_raw_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        if c == '"' {
            out.push_str("\\\"");
        } else if c == '\\' {
            out.push_str("\\\\");
        } else if (c as u32) < 0x20 || c == '\x7f' {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else {
            out.push(c);
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ser() -> Serializer {
        Serializer::default()
    }

    #[test]
    fn number_canonicalization() {
        let s = ser();
        assert_eq!(s.render_number("0", "px"), "0");
        assert_eq!(s.render_number("0.0", "em"), "0");
        assert_eq!(s.render_number("-0", "px"), "0");
        assert_eq!(s.render_number("0", "%"), "0%");
        assert_eq!(s.render_number("0", "s"), "0s");
        assert_eq!(s.render_number("0", "xx"), "0xx");
        assert_eq!(s.render_number("010", "px"), "10px");
        assert_eq!(s.render_number("1.0", ""), "1");
        assert_eq!(s.render_number("0.1", ""), "0.1");
        assert_eq!(s.render_number(".1", ""), "0.1");
        assert_eq!(s.render_number("+1", ""), "+1");
        assert_eq!(s.render_number("-1.50", "em"), "-1.5em");

        let min = Serializer::new(Preferences::minified());
        assert_eq!(min.render_number("0.1", ""), ".1");
    }

    #[test]
    fn hash_minimization() {
        let s = ser();
        assert_eq!(s.render_hash("112233"), "#123");
        assert_eq!(s.render_hash("123456"), "#123456");
        assert_eq!(s.render_hash("fff"), "#fff");
        let mut prefs = Preferences::default();
        prefs.minimize_color_hash = false;
        assert_eq!(Serializer::new(prefs).render_hash("112233"), "#112233");
    }

    #[test]
    fn value_spacing() {
        let s = ser();
        let v = PropertyValue::parse("1px 2px, 3px/4").unwrap();
        assert_eq!(s.do_value(&v), "1px 2px, 3px/4");

        let min = Serializer::new(Preferences::minified());
        assert_eq!(min.do_value(&v), "1px 2px,3px/4");
    }

    #[test]
    fn uri_values_quote_when_needed() {
        let s = ser();
        let v = PropertyValue::parse("url(a.png)").unwrap();
        assert_eq!(s.do_value(&v), "url(a.png)");
        let v = PropertyValue::parse("url('a b.png')").unwrap();
        assert_eq!(s.do_value(&v), "url(\"a b.png\")");
    }

    #[test]
    fn declaration_block_formatting() {
        let s = ser();
        let style = CssStyleDeclaration::parse("x: 1; y: 2;");
        assert_eq!(s.do_style_declaration(&style), "x: 1;\ny: 2");

        let min = Serializer::new(Preferences::minified());
        assert_eq!(min.do_style_declaration(&style), "x:1;y:2");
    }

    #[test]
    fn style_rule_block_shape() {
        let rule =
            crate::parser::parse_rule("a { x: 1; y: 2 }", &HashMap::new()).unwrap();
        assert_eq!(ser().do_rule(&rule), "a {\n    x: 1;\n    y: 2\n    }");

        let mut prefs = Preferences::default();
        prefs.line_separator = String::new();
        assert_eq!(
            Serializer::new(prefs).do_rule(&rule),
            "a {x: 1;y: 2    }"
        );

        let min = Serializer::new(Preferences::minified());
        assert_eq!(min.do_rule(&rule), "a{x:1;y:2}");
    }

    #[test]
    fn empty_rules_dropped_by_default() {
        let rule = crate::parser::parse_rule("a {}", &HashMap::new()).unwrap();
        assert_eq!(ser().do_rule(&rule), "");
        let mut prefs = Preferences::default();
        prefs.keep_empty_rules = true;
        assert_eq!(Serializer::new(prefs).do_rule(&rule), "a {}");
    }

    #[test]
    fn charset_and_import_rules() {
        let sheet = crate::parser::parse_sheet_text(
            "@charset \"ascii\";@import url(x.css) tv;",
            None,
        )
        .unwrap();
        assert_eq!(
            ser().do_stylesheet(&sheet),
            "@charset \"ascii\";\n@import url(x.css) tv;"
        );
        let min = Serializer::new(Preferences::minified());
        assert_eq!(
            min.do_stylesheet(&sheet),
            "@charset \"ascii\";@import\"x.css\"tv;"
        );
    }

    #[test]
    fn line_numbers() {
        let sheet =
            crate::parser::parse_sheet_text("a { top: 0 }\nb { left: 0 }", None).unwrap();
        let mut prefs = Preferences::default();
        prefs.line_numbers = true;
        let out = Serializer::new(prefs).do_stylesheet(&sheet);
        assert!(out.starts_with("1: a {"));
        assert!(out.contains("\n2: "));
    }
}
