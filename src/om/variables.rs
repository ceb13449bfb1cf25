//! `@variables` declarations: a case-insensitive name to value mapping.

use crate::error::Result;
use crate::tokenizer;

use super::style::PropertyValue;
use super::{RcCell, WeakCell, RuleNode, rc_cell};

pub(crate) struct VariablesData {
    /// Ordered by first declaration; names normalized to lowercase.
    pub entries: Vec<VariableEntry>,
    pub parent_rule: Option<WeakCell<RuleNode>>,
}

#[derive(Clone)]
pub(crate) struct VariableEntry {
    pub name: String,
    pub literal_name: String,
    pub value: PropertyValue,
}

/// The declaration body of a `@variables` rule. Names compare
/// case-insensitively; the literal spelling is kept for serialization.
#[derive(Clone)]
pub struct CssVariablesDeclaration(pub(crate) RcCell<VariablesData>);

impl Default for CssVariablesDeclaration {
    fn default() -> Self {
        CssVariablesDeclaration::new()
    }
}

impl CssVariablesDeclaration {
    pub fn new() -> CssVariablesDeclaration {
        CssVariablesDeclaration(rc_cell(VariablesData {
            entries: Vec::new(),
            parent_rule: None,
        }))
    }

    pub fn length(&self) -> usize {
        self.0.borrow().entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        let norm = tokenizer::normalize(name);
        self.0.borrow().entries.iter().any(|e| e.name == norm)
    }

    /// The normalized name at `index`, in declaration order.
    pub fn item(&self, index: usize) -> Option<String> {
        self.0.borrow().entries.get(index).map(|e| e.name.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Serialized value of a variable, or the empty string.
    pub fn get_variable_value(&self, name: &str) -> String {
        let norm = tokenizer::normalize(name);
        self.0
            .borrow()
            .entries
            .iter()
            .find(|e| e.name == norm)
            .map(|e| e.value.css_text())
            .unwrap_or_default()
    }

    pub(crate) fn get(&self, name: &str) -> Option<PropertyValue> {
        let norm = tokenizer::normalize(name);
        self.0
            .borrow()
            .entries
            .iter()
            .find(|e| e.name == norm)
            .map(|e| e.value.clone())
    }

    /// Sets a variable from CSS value text.
    pub fn set_variable(&self, name: &str, value: &str) -> Result<()> {
        let parsed = PropertyValue::parse(value)?;
        let norm = tokenizer::normalize(name);
        let mut data = self.0.borrow_mut();
        match data.entries.iter_mut().find(|e| e.name == norm) {
            Some(entry) => {
                entry.literal_name = name.to_string();
                entry.value = parsed;
            }
            None => data.entries.push(VariableEntry {
                name: norm,
                literal_name: name.to_string(),
                value: parsed,
            }),
        }
        Ok(())
    }

    /// Removes a variable, returning its old serialized value (empty when
    /// it was not present).
    pub fn remove_variable(&self, name: &str) -> String {
        let norm = tokenizer::normalize(name);
        let mut data = self.0.borrow_mut();
        match data.entries.iter().position(|e| e.name == norm) {
            Some(i) => data.entries.remove(i).value.css_text(),
            None => String::new(),
        }
    }

    pub(crate) fn entries(&self) -> Vec<VariableEntry> {
        self.0.borrow().entries.clone()
    }

    pub(crate) fn set_entries(&self, entries: Vec<VariableEntry>) {
        self.0.borrow_mut().entries = entries;
    }

    pub(crate) fn clear_parent(&self) {
        self.0.borrow_mut().parent_rule = None;
    }

    /// Default-formatted declaration text.
    pub fn css_text(&self) -> String {
        crate::serializer::Serializer::default().do_variables_declaration(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        let v = CssVariablesDeclaration::new();
        v.set_variable("X", "0").unwrap();
        assert_eq!(v.get_variable_value("x"), "0");
        assert_eq!(v.get_variable_value("X"), "0");
        assert!(v.contains("x"));
        assert!(!v.contains("y"));
        assert_eq!(v.get_variable_value("y"), "");
    }

    #[test]
    fn remove_returns_old_value() {
        let v = CssVariablesDeclaration::new();
        v.set_variable("x", "0").unwrap();
        v.set_variable("z", "1").unwrap();
        assert_eq!(v.length(), 2);
        assert_eq!(v.remove_variable("x"), "0");
        assert_eq!(v.remove_variable("z"), "1");
        assert_eq!(v.remove_variable("z"), "");
        assert_eq!(v.length(), 0);
    }

    #[test]
    fn item_order_is_declaration_order() {
        let v = CssVariablesDeclaration::new();
        v.set_variable("x", "0").unwrap();
        v.set_variable("Y", "2").unwrap();
        assert_eq!(v.item(0).as_deref(), Some("x"));
        assert_eq!(v.item(1).as_deref(), Some("y"));
        assert_eq!(v.item(2), None);
    }
}
