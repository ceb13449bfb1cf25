//! The stylesheet: an ordered rule list with structural invariants.
//!
//! `@charset` may only sit at index 0, `@import` before `@namespace`,
//! and both before any other rule; comments go anywhere. The sheet's
//! encoding is the charset rule itself: setting one inserts or updates
//! the rule, clearing it removes the rule.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::media::MediaList;
use super::rule::{CssRule, RuleBody, RuleNode, RuleType};
use super::{RcCell, WeakCell, rc_cell};

pub(crate) struct SheetData {
    pub href: Option<String>,
    pub title: Option<String>,
    pub media: MediaList,
    pub owner_rule: Option<WeakCell<RuleNode>>,
    pub rules: Vec<CssRule>,
    pub validating: bool,
}

/// A handle to a stylesheet.
#[derive(Clone)]
pub struct CssStyleSheet(pub(crate) RcCell<SheetData>);

/// Structural position class of a rule type; lower classes must precede
/// higher ones. Comments are unconstrained.
fn order_class(t: RuleType) -> Option<u8> {
    match t {
        RuleType::Comment => None,
        RuleType::Charset => Some(0),
        RuleType::Import => Some(1),
        RuleType::Namespace => Some(2),
        RuleType::Variables => Some(3),
        _ => Some(4),
    }
}

impl Default for CssStyleSheet {
    fn default() -> Self {
        CssStyleSheet::new()
    }
}

impl CssStyleSheet {
    pub fn new() -> CssStyleSheet {
        CssStyleSheet(rc_cell(SheetData {
            href: None,
            title: None,
            media: MediaList::new(),
            owner_rule: None,
            rules: Vec::new(),
            validating: true,
        }))
    }

    pub fn href(&self) -> Option<String> {
        self.0.borrow().href.clone()
    }

    pub fn set_href(&self, href: Option<String>) {
        self.0.borrow_mut().href = href;
    }

    pub fn title(&self) -> Option<String> {
        self.0.borrow().title.clone()
    }

    pub fn set_title(&self, title: Option<String>) {
        self.0.borrow_mut().title = title;
    }

    /// The media this sheet applies to; shared handle.
    pub fn media(&self) -> MediaList {
        self.0.borrow().media.clone()
    }

    pub fn validating(&self) -> bool {
        self.0.borrow().validating
    }

    pub fn set_validating(&self, validating: bool) {
        self.0.borrow_mut().validating = validating;
    }

    /// The `@import` rule that loaded this sheet, if any.
    pub fn owner_rule(&self) -> Option<CssRule> {
        self.0
            .borrow()
            .owner_rule
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(CssRule)
    }

    /// The sheet at the root of the owner chain.
    pub fn root_sheet(&self) -> CssStyleSheet {
        match self.owner_rule().and_then(|r| r.parent_style_sheet()) {
            Some(parent) => parent.root_sheet(),
            None => self.clone(),
        }
    }

    pub fn rules(&self) -> Vec<CssRule> {
        self.0.borrow().rules.clone()
    }

    pub fn length(&self) -> usize {
        self.0.borrow().rules.len()
    }

    pub fn rule(&self, index: usize) -> Option<CssRule> {
        self.0.borrow().rules.get(index).cloned()
    }

    /// Effective encoding label: the charset rule, or the UTF-8 default.
    pub fn encoding(&self) -> String {
        self.charset_rule()
            .and_then(|r| r.charset_encoding())
            .unwrap_or_else(|| "utf-8".to_string())
    }

    fn charset_rule(&self) -> Option<CssRule> {
        let rule = self.rule(0)?;
        (rule.rule_type() == RuleType::Charset).then_some(rule)
    }

    /// Sets the encoding by inserting or updating the charset rule at
    /// index 0. `None` removes it, restoring the UTF-8 default.
    pub fn set_encoding(&self, encoding: Option<&str>) -> Result<()> {
        match encoding {
            None => {
                if self.charset_rule().is_some() {
                    self.delete_rule(0)?;
                }
                Ok(())
            }
            Some(label) => {
                let codec = crate::encoding::Codec::for_label(label).ok_or_else(|| {
                    Error::syntax(format!("unknown encoding: {label}"), 1, 1)
                })?;
                match self.charset_rule() {
                    Some(rule) => rule.set_charset_encoding(&codec.name),
                    None => self
                        .insert_rule_object(
                            CssRule::new(RuleBody::Charset {
                                encoding: codec.name,
                            }),
                            0,
                        )
                        .map(|_| ()),
                }
            }
        }
    }

    /// Namespace prefix to URI map declared by this sheet's rules.
    /// Later declarations of a prefix win.
    pub fn namespaces(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for rule in self.0.borrow().rules.iter() {
            if let RuleBody::Namespace { prefix, uri } = &rule.0.borrow().body {
                map.insert(prefix.clone(), uri.clone());
            }
        }
        map
    }

    /// The preferred (last declared) prefix for each namespace URI.
    pub(crate) fn prefixes_by_uri(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for rule in self.0.borrow().rules.iter() {
            if let RuleBody::Namespace { prefix, uri } = &rule.0.borrow().body {
                map.insert(uri.clone(), prefix.clone());
            }
        }
        map
    }

    /// Parses and inserts one rule. With `index` of `None` the rule is
    /// appended.
    pub fn insert_rule(&self, text: &str, index: Option<usize>) -> Result<usize> {
        let rule = crate::parser::parse_rule(text, &self.namespaces())?;
        let index = index.unwrap_or(self.length());
        self.insert_rule_object(rule, index)
    }

    /// Parses one rule and inserts it at the lowest structurally valid
    /// position at or after all rules of its class.
    pub fn add(&self, text: &str) -> Result<usize> {
        let rule = crate::parser::parse_rule(text, &self.namespaces())?;
        let class = order_class(rule.rule_type()).unwrap_or(4);
        let mut index = self.length();
        {
            let data = self.0.borrow();
            while index > 0 {
                let prev = order_class(data.rules[index - 1].rule_type());
                match prev {
                    Some(c) if c > class => index -= 1,
                    _ => break,
                }
            }
        }
        self.insert_rule_object(rule, index)
    }

    pub(crate) fn insert_rule_object(&self, rule: CssRule, index: usize) -> Result<usize> {
        {
            let data = self.0.borrow();
            if index > data.rules.len() {
                return Err(Error::IndexSize(format!(
                    "index {index} exceeds length {}",
                    data.rules.len()
                )));
            }
            let t = rule.rule_type();
            if let Some(class) = order_class(t) {
                if t == RuleType::Charset {
                    if index != 0 {
                        return Err(Error::InvalidModification(
                            "@charset only allowed at index 0".into(),
                        ));
                    }
                    if data
                        .rules
                        .first()
                        .is_some_and(|r| r.rule_type() == RuleType::Charset)
                    {
                        return Err(Error::InvalidModification(
                            "a @charset rule is already present".into(),
                        ));
                    }
                }
                for (i, other) in data.rules.iter().enumerate() {
                    let Some(other_class) = order_class(other.rule_type()) else {
                        continue;
                    };
                    if i < index && other_class > class {
                        return Err(Error::InvalidModification(format!(
                            "cannot insert a {t:?} rule after a {:?} rule",
                            other.rule_type()
                        )));
                    }
                    if i >= index && other_class < class {
                        return Err(Error::InvalidModification(format!(
                            "cannot insert a {t:?} rule before a {:?} rule",
                            other.rule_type()
                        )));
                    }
                }
            }
        }
        self.0.borrow_mut().rules.insert(index, rule.clone());
        let weak = std::rc::Rc::downgrade(&self.0);
        rule.attach_to_sheet(&weak);
        Ok(index)
    }

    /// Appends an already-built rule; used while parsing.
    pub(crate) fn append_rule_object(&self, rule: CssRule) {
        self.0.borrow_mut().rules.push(rule.clone());
        let weak = std::rc::Rc::downgrade(&self.0);
        rule.attach_to_sheet(&weak);
    }

    /// Deletes the rule at `index`, detaching it. Deleting a namespace
    /// rule still referenced by a selector is refused.
    pub fn delete_rule(&self, index: usize) -> Result<()> {
        let rule = {
            let data = self.0.borrow();
            match data.rules.get(index) {
                Some(r) => r.clone(),
                None => {
                    return Err(Error::IndexSize(format!(
                        "index {index} exceeds length {}",
                        data.rules.len()
                    )));
                }
            }
        };
        if let Some(uri) = rule.namespace_uri() {
            let declared_elsewhere = self.0.borrow().rules.iter().enumerate().any(|(i, r)| {
                i != index && r.namespace_uri().as_deref() == Some(uri.as_str())
            });
            if !declared_elsewhere && self.used_namespace_uris().contains(&uri) {
                return Err(Error::NoModificationAllowed(format!(
                    "namespace {uri:?} is still used by a selector"
                )));
            }
        }
        self.0.borrow_mut().rules.remove(index);
        rule.detach();
        Ok(())
    }

    /// Namespace URIs referenced by any selector in the sheet.
    pub(crate) fn used_namespace_uris(&self) -> Vec<String> {
        let mut out = Vec::new();
        fn walk(rules: &[CssRule], out: &mut Vec<String>) {
            for rule in rules {
                match &rule.0.borrow().body {
                    RuleBody::Style { selectors, .. } => {
                        for uri in selectors.used_uris() {
                            if !out.contains(&uri) {
                                out.push(uri);
                            }
                        }
                    }
                    RuleBody::Media { rules, .. } => walk(rules, out),
                    _ => {}
                }
            }
        }
        walk(&self.0.borrow().rules, &mut out);
        out
    }

    /// Replaces the whole rule list by re-parsing `text` permissively.
    pub fn set_css_text(&self, text: &str) -> Result<()> {
        let fresh = crate::parser::parse_sheet_text(text, self.href().as_deref())?;
        let old = std::mem::take(&mut self.0.borrow_mut().rules);
        for rule in old {
            rule.detach();
        }
        let weak = std::rc::Rc::downgrade(&self.0);
        for rule in fresh.rules() {
            rule.attach_to_sheet(&weak);
            self.0.borrow_mut().rules.push(rule);
        }
        Ok(())
    }

    /// Default-formatted sheet text.
    pub fn css_text(&self) -> String {
        crate::serializer::Serializer::default().do_stylesheet(self)
    }

    /// Sheet text encoded per the sheet's own encoding, with unencodable
    /// characters escaped.
    pub fn as_bytes(&self) -> Vec<u8> {
        let text = self.css_text();
        let codec = crate::encoding::Codec::for_label(&self.encoding())
            .unwrap_or_else(crate::encoding::Codec::utf8);
        codec.encode(&text)
    }
}
