//! Object model mutation tests: rule insertion and ordering invariants,
//! declaration editing, media lists, and selector specificity.

use std::collections::HashMap;

use cassis::{
    parse_string, CssParser, CssStyleSheet, Error, MediaList, RuleType, Selector, Specificity,
};

fn parse(css: &str) -> CssStyleSheet {
    CssParser::new()
        .without_fetching()
        .parse_string(css)
        .expect("sheet should parse")
}

// ============================================================================
// Rule insertion and ordering
// ============================================================================

#[test]
fn test_insert_rule_enforces_structural_order() {
    let sheet = parse("@import url(x.css);\na { color: red }");

    // @charset only fits at index 0
    sheet.insert_rule("@charset \"ascii\";", Some(0)).unwrap();
    assert!(matches!(
        sheet.insert_rule("@charset \"utf-8\";", Some(1)),
        Err(Error::InvalidModification(_))
    ));

    // an @import cannot land after a style rule; the list is unchanged
    let before = sheet.length();
    assert!(matches!(
        sheet.insert_rule("@import url(y.css);", None),
        Err(Error::InvalidModification(_))
    ));
    assert_eq!(sheet.length(), before);
    sheet.insert_rule("@import url(y.css);", Some(2)).unwrap();

    let types: Vec<RuleType> = sheet.rules().iter().map(|r| r.rule_type()).collect();
    assert_eq!(
        types,
        vec![
            RuleType::Charset,
            RuleType::Import,
            RuleType::Import,
            RuleType::Style,
        ]
    );
}

#[test]
fn test_add_finds_the_lowest_valid_position() {
    let sheet = parse("a { color: red }");
    let index = sheet.add("@import url(x.css);").unwrap();
    assert_eq!(index, 0);
    let index = sheet.add("b { color: blue }").unwrap();
    assert_eq!(index, 2);
    let index = sheet.add("@namespace p \"http://example.com/p\";").unwrap();
    assert_eq!(index, 1);
}

#[test]
fn test_comments_are_unconstrained() {
    let sheet = parse("@import url(x.css);\na { color: red }");
    sheet.insert_rule("/* head */", Some(0)).unwrap();
    sheet.insert_rule("/* tail */", None).unwrap();
    assert_eq!(sheet.length(), 4);
}

#[test]
fn test_deleted_rule_becomes_a_zombie() {
    let sheet = parse("a { color: red }\nb { color: blue }");
    let rule = sheet.rule(0).unwrap();
    sheet.delete_rule(0).unwrap();
    assert_eq!(sheet.length(), 1);
    assert!(rule.parent_style_sheet().is_none());
    // still readable and editable on its own
    assert_eq!(rule.selector_text().as_deref(), Some("a"));
    rule.style().unwrap().set_property("color", "green", "").unwrap();
}

#[test]
fn test_deleting_a_used_namespace_rule_is_refused() {
    let sheet = parse("@namespace p \"http://example.com/p\";\np|a { color: red }");
    assert!(sheet.delete_rule(0).is_err());
    sheet.delete_rule(1).unwrap();
    sheet.delete_rule(0).unwrap();
    assert_eq!(sheet.length(), 0);
}

#[test]
fn test_media_rule_children_follow_the_same_rules() {
    let sheet = parse("@media print { a { color: red } }");
    let media = sheet.rule(0).unwrap();
    media.insert_rule("b { color: blue }", None).unwrap();
    assert_eq!(media.rules().len(), 2);
    assert!(media.insert_rule("@import url(x.css);", None).is_err());
    media.delete_rule(0).unwrap();
    assert_eq!(media.rules()[0].selector_text().as_deref(), Some("b"));
}

// ============================================================================
// Rule editing
// ============================================================================

#[test]
fn test_set_css_text_keeps_rule_identity_and_type() {
    let sheet = parse("a { color: red }");
    let rule = sheet.rule(0).unwrap();
    rule.set_css_text("b { color: blue }").unwrap();
    assert_eq!(rule.selector_text().as_deref(), Some("b"));
    assert_eq!(sheet.css_text(), "b {\n    color: blue\n    }");

    // replacing with a different rule type is refused
    assert!(rule.set_css_text("@media print { b { left: 0 } }").is_err());
    assert_eq!(rule.rule_type(), RuleType::Style);
}

#[test]
fn test_set_selector_text_checks_namespaces() {
    let sheet = parse("@namespace p \"http://example.com/p\";\na { color: red }");
    let rule = sheet.rule(1).unwrap();
    rule.set_selector_text("p|b, .x").unwrap();
    assert_eq!(rule.selector_text().as_deref(), Some("p|b, .x"));
    assert!(rule.set_selector_text("q|c").is_err());
    assert_eq!(rule.selector_text().as_deref(), Some("p|b, .x"));
}

#[test]
fn test_charset_rule_validates_its_encoding() {
    let sheet = parse("@charset \"ascii\";\na { color: red }");
    let rule = sheet.rule(0).unwrap();
    assert!(rule.set_charset_encoding("no-such-encoding").is_err());
    rule.set_charset_encoding("UTF-8").unwrap();
    assert_eq!(sheet.encoding(), "utf-8");
}

// ============================================================================
// Declarations
// ============================================================================

#[test]
fn test_set_property_replaces_in_place() {
    let style = cassis::parse_style("color: red; left: 0");
    style.set_property("color", "blue", "important").unwrap();
    assert_eq!(style.length(), 2);
    assert_eq!(style.get_property_value("color"), "blue");
    assert_eq!(style.get_property_priority("color"), "important");
    assert_eq!(style.css_text(), "color: blue !important;\nleft: 0");
}

#[test]
fn test_remove_property_returns_the_old_value() {
    let style = cassis::parse_style("color: red; left: 0");
    assert_eq!(style.remove_property("COLOR"), "red");
    assert_eq!(style.remove_property("color"), "");
    assert_eq!(style.length(), 1);
}

#[test]
fn test_important_declaration_wins_over_a_later_normal_one() {
    let style = cassis::parse_style("color: red !important; color: blue");
    // length counts distinct names
    assert_eq!(style.length(), 1);
    assert_eq!(style.get_property_value("color"), "red");
    assert_eq!(style.get_property_priority("color"), "important");
}

#[test]
fn test_names_are_distinct_in_first_appearance_order() {
    let style = cassis::parse_style("color: red; left: 0; color: blue");
    assert_eq!(style.names(), vec!["color", "left"]);
    assert_eq!(style.get_property_value("color"), "blue");
}

#[test]
fn test_unparsable_declarations_are_dropped() {
    let style = cassis::parse_style("color: red; left 0; top: 1px");
    assert_eq!(style.names(), vec!["color", "top"]);
}

// ============================================================================
// Media lists
// ============================================================================

#[test]
fn test_media_list_mutation_reflects_in_the_rule() {
    let sheet = parse("@media print { a { color: red } }");
    let media = sheet.rule(0).unwrap().media().unwrap();
    media.append_medium("tv").unwrap();
    assert!(sheet.css_text().starts_with("@media print, tv {"));
}

#[test]
fn test_media_list_all_is_exclusive() {
    let ml = MediaList::new();
    ml.set_media_text("print, screen").unwrap();
    ml.append_medium("all").unwrap();
    assert_eq!(ml.media_text(), "all");
    assert!(ml.append_medium("tv").is_err());
}

#[test]
fn test_media_list_rejects_garbage() {
    let ml = MediaList::new();
    assert!(ml.set_media_text("print &").is_err());
    assert!(ml.set_media_text("not").is_err());
    assert_eq!(ml.media_text(), "all");
}

// ============================================================================
// Specificity
// ============================================================================

#[test]
fn test_specificity() {
    let none = HashMap::new();
    let spec = |text: &str| Selector::parse(text, &none).unwrap().specificity();

    assert_eq!(spec("*"), Specificity(0, 0, 0));
    assert_eq!(spec("li"), Specificity(0, 0, 1));
    assert_eq!(spec("ul li"), Specificity(0, 0, 2));
    assert_eq!(spec("ul ol + li"), Specificity(0, 0, 3));
    assert_eq!(spec("h1 + *[rel=up]"), Specificity(0, 1, 1));
    assert_eq!(spec("li.red.level"), Specificity(0, 2, 1));
    assert_eq!(spec("#x34y"), Specificity(1, 0, 0));
    assert_eq!(spec("a:hover"), Specificity(0, 1, 1));
    // single-colon pseudo-elements still count as elements
    assert_eq!(spec("p:first-line"), Specificity(0, 0, 2));
    assert_eq!(spec("p::before"), Specificity(0, 0, 2));
}

#[test]
fn test_specificity_orders() {
    let none = HashMap::new();
    let a = Selector::parse("li", &none).unwrap().specificity();
    let b = Selector::parse(".x", &none).unwrap().specificity();
    let c = Selector::parse("#i", &none).unwrap().specificity();
    assert!(a < b && b < c);
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_variables_declaration_mutation() {
    let sheet = parse_string("@variables { main: red }").unwrap();
    let vars = sheet.rule(0).unwrap().variables().unwrap();
    vars.set_variable("spacing", "1em").unwrap();
    assert_eq!(vars.length(), 2);
    assert_eq!(vars.get_variable_value("spacing"), "1em");
    assert_eq!(vars.remove_variable("MAIN"), "red");
    assert_eq!(vars.length(), 1);
}
