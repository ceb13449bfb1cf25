//! The mutable, DOM-like object model: stylesheets, rules, selectors,
//! declarations, and media lists.
//!
//! Container handles are cheap `Rc` clones; parent links are `Weak`
//! back-references so a container exclusively owns its children. A child
//! replaced wholesale is detached (parent cleared) but stays usable on
//! its own.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub(crate) type RcCell<T> = Rc<RefCell<T>>;
pub(crate) type WeakCell<T> = Weak<RefCell<T>>;

pub(crate) fn rc_cell<T>(value: T) -> RcCell<T> {
    Rc::new(RefCell::new(value))
}

pub(crate) mod media;
pub(crate) mod rule;
pub(crate) mod selector;
pub(crate) mod style;
pub(crate) mod stylesheet;
pub(crate) mod variables;

pub use media::{MediaList, MediaQuery};
pub use rule::{CssRule, RuleType};
pub use selector::{PageSelector, Selector, SelectorList, Specificity};
pub use style::{CssStyleDeclaration, Property, PropertyValue, Value};
pub use stylesheet::CssStyleSheet;
pub use variables::CssVariablesDeclaration;

pub(crate) use rule::{HrefFormat, RuleBody, RuleNode};
pub(crate) use stylesheet::SheetData;
