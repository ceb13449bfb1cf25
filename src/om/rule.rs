//! Rules: the nodes of a stylesheet's rule tree.
//!
//! A [`CssRule`] is a cheap handle; the node itself lives in a shared
//! cell so a rule inserted into a sheet and the handle the caller kept
//! observe the same state. Parent links are weak: removing a rule from
//! its container leaves a detached but still readable rule.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tokenizer::Token;

use super::media::MediaList;
use super::selector::{PageSelector, SelectorList};
use super::style::CssStyleDeclaration;
use super::stylesheet::{CssStyleSheet, SheetData};
use super::variables::CssVariablesDeclaration;
use super::{RcCell, WeakCell, rc_cell};

/// Discriminates rule kinds without borrowing the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleType {
    Unknown,
    Style,
    Charset,
    Import,
    Media,
    FontFace,
    Page,
    Margin,
    Namespace,
    Comment,
    Variables,
}

/// How an `@import` target was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HrefFormat {
    /// `url(...)`.
    Uri,
    /// A plain string.
    Str,
}

pub(crate) enum RuleBody {
    Charset {
        encoding: String,
    },
    Import {
        href: String,
        href_format: HrefFormat,
        media: MediaList,
        /// Optional sheet name following the media list.
        name: Option<String>,
        /// The fetched target sheet, when import loading succeeded.
        sheet: Option<CssStyleSheet>,
    },
    Namespace {
        prefix: String,
        uri: String,
    },
    Media {
        media: MediaList,
        rules: Vec<CssRule>,
    },
    FontFace {
        style: CssStyleDeclaration,
    },
    Page {
        selector: PageSelector,
        style: CssStyleDeclaration,
        margins: Vec<CssRule>,
    },
    Margin {
        /// Normalized keyword without the `@`, e.g. `top-left`.
        keyword: String,
        style: CssStyleDeclaration,
    },
    Style {
        selectors: SelectorList,
        style: CssStyleDeclaration,
    },
    Variables {
        variables: CssVariablesDeclaration,
    },
    Comment(String),
    Unknown {
        /// At-keyword as written, including the `@`.
        at_keyword: String,
        /// Everything after the at-keyword, as tokens.
        tokens: Vec<Token>,
    },
}

impl RuleBody {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleBody::Charset { .. } => RuleType::Charset,
            RuleBody::Import { .. } => RuleType::Import,
            RuleBody::Namespace { .. } => RuleType::Namespace,
            RuleBody::Media { .. } => RuleType::Media,
            RuleBody::FontFace { .. } => RuleType::FontFace,
            RuleBody::Page { .. } => RuleType::Page,
            RuleBody::Margin { .. } => RuleType::Margin,
            RuleBody::Style { .. } => RuleType::Style,
            RuleBody::Variables { .. } => RuleType::Variables,
            RuleBody::Comment(_) => RuleType::Comment,
            RuleBody::Unknown { .. } => RuleType::Unknown,
        }
    }
}

pub(crate) struct RuleNode {
    pub parent_rule: Option<WeakCell<RuleNode>>,
    pub parent_sheet: Option<WeakCell<SheetData>>,
    /// Frozen post-construction; every mutator checks this at entry.
    pub readonly: bool,
    pub body: RuleBody,
}

/// A handle to a rule node.
#[derive(Clone)]
pub struct CssRule(pub(crate) RcCell<RuleNode>);

impl CssRule {
    pub(crate) fn new(body: RuleBody) -> CssRule {
        CssRule(rc_cell(RuleNode {
            parent_rule: None,
            parent_sheet: None,
            readonly: false,
            body,
        }))
    }

    pub fn comment(text: &str) -> CssRule {
        CssRule::new(RuleBody::Comment(text.to_string()))
    }

    pub fn rule_type(&self) -> RuleType {
        self.0.borrow().body.rule_type()
    }

    pub fn parent_rule(&self) -> Option<CssRule> {
        self.0
            .borrow()
            .parent_rule
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(CssRule)
    }

    pub fn parent_style_sheet(&self) -> Option<CssStyleSheet> {
        let direct = self
            .0
            .borrow()
            .parent_sheet
            .as_ref()
            .and_then(|w| w.upgrade())
            .map(CssStyleSheet);
        direct.or_else(|| self.parent_rule().and_then(|r| r.parent_style_sheet()))
    }

    pub(crate) fn attach_to_sheet(&self, sheet: &WeakCell<SheetData>) {
        let mut node = self.0.borrow_mut();
        node.parent_sheet = Some(sheet.clone());
        node.parent_rule = None;
    }

    pub(crate) fn attach_to_rule(&self, parent: &CssRule) {
        let mut node = self.0.borrow_mut();
        node.parent_rule = Some(std::rc::Rc::downgrade(&parent.0));
        node.parent_sheet = None;
    }

    /// Clears parent links; the rule stays usable on its own.
    pub(crate) fn detach(&self) {
        let mut node = self.0.borrow_mut();
        node.parent_rule = None;
        node.parent_sheet = None;
    }

    pub fn is_readonly(&self) -> bool {
        self.0.borrow().readonly
    }

    /// Freezes or unfreezes the rule. A frozen rule refuses mutation
    /// with [`Error::NoModificationAllowed`].
    pub fn set_readonly(&self, readonly: bool) {
        self.0.borrow_mut().readonly = readonly;
    }

    fn check_writable(&self) -> Result<()> {
        if self.0.borrow().readonly {
            return Err(Error::NoModificationAllowed(format!(
                "{:?} rule is readonly",
                self.rule_type()
            )));
        }
        Ok(())
    }

    /// Namespace prefixes in scope, from the owning sheet.
    pub(crate) fn namespaces(&self) -> HashMap<String, String> {
        self.parent_style_sheet()
            .map(|s| s.namespaces())
            .unwrap_or_default()
    }

    // typed accessors

    pub fn charset_encoding(&self) -> Option<String> {
        match &self.0.borrow().body {
            RuleBody::Charset { encoding } => Some(encoding.clone()),
            _ => None,
        }
    }

    pub fn set_charset_encoding(&self, encoding: &str) -> Result<()> {
        self.check_writable()?;
        let codec = crate::encoding::Codec::for_label(encoding).ok_or_else(|| {
            Error::syntax(format!("unknown encoding: {encoding}"), 1, 1)
        })?;
        match &mut self.0.borrow_mut().body {
            RuleBody::Charset { encoding } => {
                *encoding = codec.name;
                Ok(())
            }
            _ => Err(Error::InvalidModification("not a @charset rule".into())),
        }
    }

    pub fn href(&self) -> Option<String> {
        match &self.0.borrow().body {
            RuleBody::Import { href, .. } => Some(href.clone()),
            _ => None,
        }
    }

    pub(crate) fn set_href(&self, new_href: String) {
        if let RuleBody::Import { href, .. } = &mut self.0.borrow_mut().body {
            *href = new_href;
        }
    }

    /// The fetched sheet of an `@import` rule.
    pub fn imported_sheet(&self) -> Option<CssStyleSheet> {
        match &self.0.borrow().body {
            RuleBody::Import { sheet, .. } => sheet.clone(),
            _ => None,
        }
    }

    /// Media list of an `@media` or `@import` rule. The returned handle
    /// shares storage; mutations are visible through the rule.
    pub fn media(&self) -> Option<MediaList> {
        match &self.0.borrow().body {
            RuleBody::Media { media, .. } => Some(media.clone()),
            RuleBody::Import { media, .. } => Some(media.clone()),
            _ => None,
        }
    }

    pub fn namespace_prefix(&self) -> Option<String> {
        match &self.0.borrow().body {
            RuleBody::Namespace { prefix, .. } => Some(prefix.clone()),
            _ => None,
        }
    }

    pub fn namespace_uri(&self) -> Option<String> {
        match &self.0.borrow().body {
            RuleBody::Namespace { uri, .. } => Some(uri.clone()),
            _ => None,
        }
    }

    /// Declaration block of a style, page, margin, or font-face rule.
    pub fn style(&self) -> Option<CssStyleDeclaration> {
        match &self.0.borrow().body {
            RuleBody::Style { style, .. } => Some(style.clone()),
            RuleBody::Page { style, .. } => Some(style.clone()),
            RuleBody::Margin { style, .. } => Some(style.clone()),
            RuleBody::FontFace { style } => Some(style.clone()),
            _ => None,
        }
    }

    pub fn selector_list(&self) -> Option<SelectorList> {
        match &self.0.borrow().body {
            RuleBody::Style { selectors, .. } => Some(selectors.clone()),
            _ => None,
        }
    }

    /// Replaces the selector group of a style rule. The text is parsed
    /// in the owning sheet's namespace context.
    pub fn set_selector_text(&self, text: &str) -> Result<()> {
        self.check_writable()?;
        let namespaces = self.namespaces();
        let parsed = SelectorList::parse(text, &namespaces)?;
        match &mut self.0.borrow_mut().body {
            RuleBody::Style { selectors, .. } => {
                *selectors = parsed;
                Ok(())
            }
            _ => Err(Error::InvalidModification("not a style rule".into())),
        }
    }

    pub fn selector_text(&self) -> Option<String> {
        match self.rule_type() {
            RuleType::Style => {
                let namespaces = self.namespaces();
                match &self.0.borrow().body {
                    RuleBody::Style { selectors, .. } => Some(
                        crate::serializer::Serializer::default()
                            .do_selector_list(selectors, &namespaces),
                    ),
                    _ => None,
                }
            }
            RuleType::Page => match &self.0.borrow().body {
                RuleBody::Page { selector, .. } => Some(selector.selector_text()),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn page_selector(&self) -> Option<PageSelector> {
        match &self.0.borrow().body {
            RuleBody::Page { selector, .. } => Some(selector.clone()),
            _ => None,
        }
    }

    pub fn set_page_selector_text(&self, text: &str) -> Result<()> {
        self.check_writable()?;
        let parsed = PageSelector::parse(text)?;
        match &mut self.0.borrow_mut().body {
            RuleBody::Page { selector, .. } => {
                *selector = parsed;
                Ok(())
            }
            _ => Err(Error::InvalidModification("not a @page rule".into())),
        }
    }

    pub fn margin_keyword(&self) -> Option<String> {
        match &self.0.borrow().body {
            RuleBody::Margin { keyword, .. } => Some(keyword.clone()),
            _ => None,
        }
    }

    pub fn variables(&self) -> Option<CssVariablesDeclaration> {
        match &self.0.borrow().body {
            RuleBody::Variables { variables } => Some(variables.clone()),
            _ => None,
        }
    }

    pub fn comment_text(&self) -> Option<String> {
        match &self.0.borrow().body {
            RuleBody::Comment(text) => Some(text.clone()),
            _ => None,
        }
    }

    /// Child rules of an `@media` rule, or margin rules of `@page`.
    pub fn rules(&self) -> Vec<CssRule> {
        match &self.0.borrow().body {
            RuleBody::Media { rules, .. } => rules.clone(),
            RuleBody::Page { margins, .. } => margins.clone(),
            _ => Vec::new(),
        }
    }

    /// Inserts a parsed rule into an `@media` rule's children. Only
    /// style, comment, nested media-compatible and unknown rules may
    /// nest inside media.
    pub fn insert_rule(&self, text: &str, index: Option<usize>) -> Result<usize> {
        self.check_writable()?;
        let parsed = crate::parser::parse_rule(text, &self.namespaces())?;
        match parsed.rule_type() {
            RuleType::Charset | RuleType::Import | RuleType::Namespace => {
                return Err(Error::HierarchyRequest(format!(
                    "{:?} rules cannot nest in @media",
                    parsed.rule_type()
                )));
            }
            _ => {}
        }
        let mut node = self.0.borrow_mut();
        match &mut node.body {
            RuleBody::Media { rules, .. } => {
                let index = index.unwrap_or(rules.len());
                if index > rules.len() {
                    return Err(Error::IndexSize(format!(
                        "index {index} exceeds length {}",
                        rules.len()
                    )));
                }
                rules.insert(index, parsed.clone());
                drop(node);
                parsed.attach_to_rule(self);
                Ok(index)
            }
            _ => Err(Error::InvalidModification("not an @media rule".into())),
        }
    }

    pub fn delete_rule(&self, index: usize) -> Result<()> {
        self.check_writable()?;
        let mut node = self.0.borrow_mut();
        match &mut node.body {
            RuleBody::Media { rules, .. } => {
                if index >= rules.len() {
                    return Err(Error::IndexSize(format!(
                        "index {index} exceeds length {}",
                        rules.len()
                    )));
                }
                let removed = rules.remove(index);
                drop(node);
                removed.detach();
                Ok(())
            }
            _ => Err(Error::InvalidModification("not an @media rule".into())),
        }
    }

    /// Default-formatted rule text.
    pub fn css_text(&self) -> String {
        crate::serializer::Serializer::default().do_rule(self)
    }

    /// Re-parses the rule in place. The replacement must parse to the
    /// same rule type.
    pub fn set_css_text(&self, text: &str) -> Result<()> {
        self.check_writable()?;
        let parsed = crate::parser::parse_rule(text, &self.namespaces())?;
        let own_type = self.rule_type();
        if parsed.rule_type() != own_type {
            return Err(Error::InvalidModification(format!(
                "cannot replace a {:?} rule with a {:?} rule",
                own_type,
                parsed.rule_type()
            )));
        }
        let new_body = match std::rc::Rc::try_unwrap(parsed.0) {
            Ok(cell) => cell.into_inner().body,
            Err(rc) => {
                // handle was cloned during parse; fall back to moving out
                let mut node = rc.borrow_mut();
                std::mem::replace(&mut node.body, RuleBody::Comment(String::new()))
            }
        };
        self.0.borrow_mut().body = new_body;
        self.reattach_children();
        Ok(())
    }

    /// Repoints child back-references at this node after a body swap.
    pub(crate) fn reattach_children(&self) {
        for child in self.rules() {
            child.attach_to_rule(self);
        }
        if let Some(style) = self.style() {
            style.set_parent(Some(std::rc::Rc::downgrade(&self.0)));
        }
        if let RuleBody::Variables { variables } = &self.0.borrow().body {
            variables.0.borrow_mut().parent_rule = Some(std::rc::Rc::downgrade(&self.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_rules() {
        let r = CssRule::comment("/* note */");
        assert_eq!(r.rule_type(), RuleType::Comment);
        assert_eq!(r.comment_text().as_deref(), Some("/* note */"));
        assert!(r.style().is_none());
    }

    #[test]
    fn typed_accessors_are_none_for_other_kinds() {
        let r = CssRule::new(RuleBody::Charset {
            encoding: "utf-8".to_string(),
        });
        assert_eq!(r.rule_type(), RuleType::Charset);
        assert_eq!(r.charset_encoding().as_deref(), Some("utf-8"));
        assert!(r.href().is_none());
        assert!(r.media().is_none());
        assert!(r.selector_list().is_none());
    }

    #[test]
    fn charset_encoding_is_validated() {
        let r = CssRule::new(RuleBody::Charset {
            encoding: "utf-8".to_string(),
        });
        assert!(r.set_charset_encoding("no-such").is_err());
        r.set_charset_encoding("ASCII").unwrap();
        assert_eq!(r.charset_encoding().as_deref(), Some("ascii"));
    }

    #[test]
    fn readonly_refuses_mutation() {
        let r = CssRule::new(RuleBody::Charset {
            encoding: "utf-8".to_string(),
        });
        r.set_readonly(true);
        assert!(matches!(
            r.set_charset_encoding("ascii"),
            Err(Error::NoModificationAllowed(_))
        ));
        assert_eq!(r.charset_encoding().as_deref(), Some("utf-8"));
        r.set_readonly(false);
        r.set_charset_encoding("ascii").unwrap();
    }

    #[test]
    fn detached_rule_has_no_parents() {
        let r = CssRule::comment("/*a*/");
        assert!(r.parent_rule().is_none());
        assert!(r.parent_style_sheet().is_none());
    }
}
