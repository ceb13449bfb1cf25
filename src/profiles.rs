//! Property validation against a CSS 2.1 profile.
//!
//! This is deliberately shallow: it knows the property names and enough
//! value shape to separate plausible declarations from nonsense, which
//! is what `validOnly` serialization and validity reporting need. It is
//! not a full grammar for every property.

use crate::om::{PropertyValue, Value};
use crate::tokenizer;

const COLOR_KEYWORDS: [&str; 17] = [
    "aqua", "black", "blue", "fuchsia", "gray", "green", "lime", "maroon", "navy", "olive",
    "orange", "purple", "red", "silver", "teal", "white", "yellow",
];

const LENGTH_UNITS: [&str; 10] = ["cm", "em", "ex", "in", "mm", "pc", "pt", "px", "q", "rem"];

const COLOR_PROPERTIES: [&str; 7] = [
    "background-color",
    "border-bottom-color",
    "border-left-color",
    "border-right-color",
    "border-top-color",
    "color",
    "outline-color",
];

const LENGTH_PROPERTIES: [&str; 22] = [
    "bottom",
    "height",
    "left",
    "letter-spacing",
    "line-height",
    "margin",
    "margin-bottom",
    "margin-left",
    "margin-right",
    "margin-top",
    "max-height",
    "max-width",
    "min-height",
    "min-width",
    "padding",
    "padding-bottom",
    "padding-left",
    "padding-right",
    "padding-top",
    "right",
    "top",
    "width",
];

const BORDER_WIDTH_PROPERTIES: [&str; 5] = [
    "border-bottom-width",
    "border-left-width",
    "border-right-width",
    "border-top-width",
    "border-width",
];

/// Properties known to the profile but with no modeled value grammar.
const OTHER_KNOWN_PROPERTIES: [&str; 50] = [
    "background",
    "background-attachment",
    "background-image",
    "background-position",
    "background-repeat",
    "border",
    "border-bottom",
    "border-bottom-style",
    "border-collapse",
    "border-color",
    "border-left",
    "border-left-style",
    "border-right",
    "border-right-style",
    "border-spacing",
    "border-style",
    "border-top",
    "border-top-style",
    "caption-side",
    "clear",
    "clip",
    "content",
    "counter-increment",
    "counter-reset",
    "cursor",
    "direction",
    "display",
    "empty-cells",
    "font",
    "font-family",
    "font-size",
    "font-style",
    "font-variant",
    "font-weight",
    "list-style",
    "list-style-image",
    "list-style-position",
    "list-style-type",
    "margin-offset",
    "overflow",
    "position",
    "quotes",
    "text-align",
    "text-decoration",
    "text-indent",
    "text-transform",
    "vertical-align",
    "visibility",
    "white-space",
    "word-spacing",
];

pub fn is_known_property(name: &str) -> bool {
    COLOR_PROPERTIES.contains(&name)
        || LENGTH_PROPERTIES.contains(&name)
        || BORDER_WIDTH_PROPERTIES.contains(&name)
        || OTHER_KNOWN_PROPERTIES.contains(&name)
        || matches!(name, "float" | "z-index" | "opacity" | "orphans" | "widows")
}

/// Whether `value` is plausible for the (normalized) property `name`.
/// Unknown properties are invalid; vendor-prefixed ones are let through.
pub(crate) fn validate(name: &str, value: &PropertyValue) -> bool {
    if name.starts_with('-') {
        return true;
    }
    let items: Vec<&Value> = value
        .items
        .iter()
        .filter(|v| !matches!(v, Value::Comment(_)))
        .collect();
    if items.iter().any(|v| is_variable(v)) {
        // defer judgment until resolution
        return true;
    }
    if let [single] = items.as_slice() {
        if is_wide_keyword(single) {
            return is_known_property(name);
        }
    }

    if COLOR_PROPERTIES.contains(&name) {
        return items.len() == 1 && is_color(items[0]);
    }
    if name == "float" {
        return items.len() == 1 && is_keyword(items[0], &["left", "none", "right"]);
    }
    if LENGTH_PROPERTIES.contains(&name) {
        return !items.is_empty()
            && items.len() <= 4
            && items.iter().all(|v| is_length_or_auto(v, true));
    }
    if BORDER_WIDTH_PROPERTIES.contains(&name) {
        return !items.is_empty()
            && items.len() <= 4
            && items.iter().all(|v| {
                is_keyword(v, &["medium", "thick", "thin"]) || is_length_or_auto(v, false)
            });
    }
    if name == "z-index" || name == "orphans" || name == "widows" {
        return items.len() == 1
            && matches!(items[0], Value::Number(n) if !n.contains('.'))
            || (name == "z-index" && items.len() == 1 && is_keyword(items[0], &["auto"]));
    }
    if name == "background" {
        // strings are the classic invalid case here
        return !items.is_empty()
            && !items
                .iter()
                .any(|v| matches!(v, Value::Str(_) | Value::UnicodeRange(_)));
    }
    OTHER_KNOWN_PROPERTIES.contains(&name) || name == "opacity"
}

fn is_variable(v: &Value) -> bool {
    matches!(v, Value::Function { name, .. } if tokenizer::normalize(name) == "var")
}

fn is_wide_keyword(v: &Value) -> bool {
    is_keyword(v, &["inherit", "initial", "unset"])
}

fn is_keyword(v: &Value, keywords: &[&str]) -> bool {
    matches!(v, Value::Ident(name) if keywords.contains(&tokenizer::normalize(name).as_str()))
}

fn is_color(v: &Value) -> bool {
    match v {
        Value::Ident(name) => {
            let norm = tokenizer::normalize(name);
            COLOR_KEYWORDS.contains(&norm.as_str()) || norm == "transparent"
        }
        Value::Hash(hex) => {
            (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit())
        }
        Value::Function { name, args } => {
            matches!(
                tokenizer::normalize(name).as_str(),
                "rgb" | "rgba" | "hsl" | "hsla"
            ) && !args.is_empty()
        }
        _ => false,
    }
}

/// A length: zero may drop its unit, anything else needs one.
fn is_length_or_auto(v: &Value, allow_auto: bool) -> bool {
    match v {
        Value::Number(n) => is_zero(n),
        Value::Percentage(_) => true,
        Value::Dimension(lit) => {
            let split = lit
                .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '+' || c == '-'))
                .unwrap_or(lit.len());
            LENGTH_UNITS.contains(&tokenizer::normalize(&lit[split..]).as_str())
        }
        Value::Ident(_) => allow_auto && is_keyword(v, &["auto"]),
        _ => false,
    }
}

fn is_zero(literal: &str) -> bool {
    literal
        .chars()
        .all(|c| matches!(c, '0' | '.' | '+' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(name: &str, value: &str) -> bool {
        validate(name, &PropertyValue::parse(value).unwrap())
    }

    #[test]
    fn colors() {
        assert!(valid("color", "red"));
        assert!(valid("color", "#12a"));
        assert!(valid("color", "#1122aa"));
        assert!(valid("color", "rgb(1, 2, 3)"));
        assert!(valid("color", "inherit"));
        assert!(!valid("color", "#12"));
        assert!(!valid("color", "3px"));
        assert!(!valid("color", "red blue"));
    }

    #[test]
    fn floats_and_positions() {
        assert!(valid("float", "left"));
        assert!(!valid("float", "up"));
        assert!(valid("left", "0"));
        assert!(valid("left", "1px"));
        assert!(valid("left", "10%"));
        assert!(valid("left", "auto"));
        assert!(!valid("left", "1"));
        assert!(!valid("left", "1foo"));
    }

    #[test]
    fn border_width_needs_a_unit() {
        assert!(valid("border-top-width", "thin"));
        assert!(valid("border-top-width", "0"));
        assert!(valid("border-top-width", "5px"));
        assert!(!valid("border-top-width", "5"));
        assert!(!valid("border-top-width", "auto"));
    }

    #[test]
    fn background_rejects_strings() {
        assert!(valid("background", "red"));
        assert!(valid("background", "url(x.png) no-repeat"));
        assert!(!valid("background", "\"red\""));
    }

    #[test]
    fn unknown_properties_are_invalid() {
        assert!(!valid("no-such-property", "red"));
        assert!(valid("-x-no-such", "whatever"));
    }

    #[test]
    fn variables_defer_validation() {
        assert!(valid("color", "var(main)"));
    }
}
