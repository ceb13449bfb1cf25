//! Stylesheet parsing tests.
//!
//! Covers rule recognition, the structural zones (`@charset`, `@import`,
//! `@namespace` before body rules), and error recovery: an invalid
//! construct is dropped and parsing resumes at the next safe point.

use cassis::{parse_string, CssParser, ErrorPolicy, ParseOptions, RuleType};

// ============================================================================
// Rule recognition
// ============================================================================

#[test]
fn test_rule_types_in_order() {
    let parser = CssParser::new().without_fetching();
    let sheet = parser
        .parse_string(
            "@charset \"utf-8\";\n\
             @import url(x.css);\n\
             @namespace p \"http://example.com/ns\";\n\
             @variables { main: red }\n\
             @media print { a { color: red } }\n\
             @page :first { margin-top: 3cm }\n\
             @font-face { font-family: x }\n\
             b { left: 0 }\n\
             /* trailing */",
        )
        .expect("sheet should parse");

    let types: Vec<RuleType> = sheet.rules().iter().map(|r| r.rule_type()).collect();
    assert_eq!(
        types,
        vec![
            RuleType::Charset,
            RuleType::Import,
            RuleType::Namespace,
            RuleType::Variables,
            RuleType::Media,
            RuleType::Page,
            RuleType::FontFace,
            RuleType::Style,
            RuleType::Comment,
        ]
    );
}

#[test]
fn test_unknown_at_rule_is_kept() {
    let sheet = parse_string("@three-dee { azimuth: 30deg } b { color: red }").unwrap();
    assert_eq!(sheet.length(), 2);
    assert_eq!(sheet.rule(0).unwrap().rule_type(), RuleType::Unknown);
    assert!(sheet.css_text().contains("@three-dee"));
}

#[test]
fn test_cdo_cdc_ignored_at_top_level() {
    let sheet = parse_string("<!-- a { color: red } -->").unwrap();
    assert_eq!(sheet.length(), 1);
    assert_eq!(sheet.rule(0).unwrap().rule_type(), RuleType::Style);
}

// ============================================================================
// Structural zones
// ============================================================================

#[test]
fn test_charset_must_be_the_very_first_bytes() {
    // even leading whitespace disqualifies it
    let sheet = parse_string(" @charset \"utf-8\";\na { color: red }").unwrap();
    assert_eq!(sheet.length(), 1);
    assert_eq!(sheet.rule(0).unwrap().rule_type(), RuleType::Style);
    assert_eq!(sheet.encoding(), "utf-8");
}

#[test]
fn test_charset_sets_the_sheet_encoding() {
    let sheet = parse_string("@charset \"ascii\";\na { color: red }").unwrap();
    assert_eq!(sheet.encoding(), "ascii");
}

#[test]
fn test_import_after_a_body_rule_is_dropped() {
    let parser = CssParser::new().without_fetching();
    let sheet = parser
        .parse_string("a { color: red }\n@import url(x.css);\nb { color: blue }")
        .unwrap();
    assert_eq!(sheet.length(), 2);
    assert!(sheet.rules().iter().all(|r| r.rule_type() == RuleType::Style));
}

// ============================================================================
// Error recovery
// ============================================================================

#[test]
fn test_invalid_selector_drops_the_whole_rule() {
    let sheet = parse_string("p @here { color: red }\nspan { color: green }").unwrap();
    assert_eq!(sheet.length(), 1);
    assert_eq!(
        sheet.rule(0).unwrap().selector_text().as_deref(),
        Some("span")
    );
}

#[test]
fn test_stray_close_brace_consumes_the_next_construct() {
    let sheet = parse_string("}} a { color: red } b { color: blue }").unwrap();
    assert_eq!(sheet.length(), 1);
    assert_eq!(sheet.rule(0).unwrap().selector_text().as_deref(), Some("b"));
}

#[test]
fn test_invalid_media_list_drops_the_block() {
    let sheet = parse_string("@media print & screen { a { color: red } }\nb { left: 0 }").unwrap();
    assert_eq!(sheet.length(), 1);
    assert_eq!(sheet.rule(0).unwrap().rule_type(), RuleType::Style);
}

#[test]
fn test_strict_policy_reports_instead_of_recovering() {
    let strict = CssParser::new().with_policy(ErrorPolicy::Strict);
    assert!(strict.parse_string("p @here { color: red }").is_err());
    assert!(strict.parse_string("a { color: red }").is_ok());
}

// ============================================================================
// Nested rules
// ============================================================================

#[test]
fn test_media_children_know_their_parents() {
    let sheet = parse_string("@media print { a { color: red } }").unwrap();
    let media = sheet.rule(0).unwrap();
    assert_eq!(media.media().unwrap().media_text(), "print");

    let child = media.rules().into_iter().next().expect("nested rule");
    assert_eq!(child.rule_type(), RuleType::Style);
    assert!(child.parent_rule().is_some());
    assert!(child.parent_style_sheet().is_some());
}

#[test]
fn test_page_rule_with_margin_rules() {
    let sheet = parse_string(
        "@page :first { margin-top: 3cm; @top-left { content: \"a\" } margin-left: 4cm }",
    )
    .unwrap();
    let page = sheet.rule(0).unwrap();
    assert_eq!(page.rule_type(), RuleType::Page);
    assert_eq!(page.selector_text().as_deref(), Some(":first"));

    let style = page.style().unwrap();
    assert_eq!(style.get_property_value("margin-top"), "3cm");
    assert_eq!(style.get_property_value("margin-left"), "4cm");

    let margins = page.rules();
    assert_eq!(margins.len(), 1);
    assert_eq!(margins[0].margin_keyword().as_deref(), Some("top-left"));
}

#[test]
fn test_page_pseudo_pages() {
    let sheet =
        parse_string("@page :blank { margin: 1cm }\n@page :vendor-x { margin: 2cm }").unwrap();
    assert_eq!(sheet.length(), 2);
    let blank = sheet.rule(0).unwrap();
    assert_eq!(blank.rule_type(), RuleType::Page);
    assert_eq!(blank.page_selector().unwrap().pseudo.as_deref(), Some("blank"));
    // unrecognized pseudo-pages are kept as written
    let vendor = sheet.rule(1).unwrap();
    assert_eq!(vendor.page_selector().unwrap().pseudo.as_deref(), Some("vendor-x"));
}

#[test]
fn test_margin_rule_outside_page_is_dropped() {
    let sheet = parse_string("@top-left { content: \"a\" }\nb { left: 0 }").unwrap();
    assert_eq!(sheet.length(), 1);
    assert_eq!(sheet.rule(0).unwrap().rule_type(), RuleType::Style);
}

// ============================================================================
// Namespaces
// ============================================================================

#[test]
fn test_namespace_prefixes_resolve_in_selectors() {
    let sheet = parse_string(
        "@namespace \"http://example.com/default\";\n\
         @namespace p \"http://example.com/p\";\n\
         p|a { color: red }",
    )
    .unwrap();
    assert_eq!(sheet.length(), 3);
    assert_eq!(
        sheet.rule(2).unwrap().selector_text().as_deref(),
        Some("p|a")
    );

    let namespaces = sheet.namespaces();
    assert_eq!(
        namespaces.get("p").map(String::as_str),
        Some("http://example.com/p")
    );
    assert_eq!(
        namespaces.get("").map(String::as_str),
        Some("http://example.com/default")
    );
}

#[test]
fn test_undefined_namespace_prefix_drops_the_rule() {
    let sheet = parse_string("q|a { color: red }\nb { color: blue }").unwrap();
    assert_eq!(sheet.length(), 1);
    assert_eq!(sheet.rule(0).unwrap().selector_text().as_deref(), Some("b"));
}

// ============================================================================
// Variables
// ============================================================================

#[test]
fn test_variables_rule_contents() {
    let sheet = parse_string("@variables { main: red; SPACING: 1em 2em }").unwrap();
    let vars = sheet.rule(0).unwrap().variables().expect("@variables rule");
    assert_eq!(vars.length(), 2);
    assert_eq!(vars.get_variable_value("main"), "red");
    // names are case-insensitive
    assert_eq!(vars.get_variable_value("spacing"), "1em 2em");
}

// ============================================================================
// Parse options
// ============================================================================

#[test]
fn test_options_set_sheet_metadata() {
    let options = ParseOptions {
        href: Some("http://example.com/base.css".to_string()),
        media: Some("print, screen".to_string()),
        title: Some("base".to_string()),
        encoding: None,
    };
    let sheet = CssParser::new()
        .without_fetching()
        .parse_string_with("a { color: red }", &options)
        .unwrap();
    assert_eq!(sheet.href().as_deref(), Some("http://example.com/base.css"));
    assert_eq!(sheet.title().as_deref(), Some("base"));
    assert_eq!(sheet.media().length(), 2);
}

#[test]
fn test_encoding_override_adds_a_charset_rule() {
    let options = ParseOptions {
        encoding: Some("ASCII".to_string()),
        ..ParseOptions::default()
    };
    let sheet = CssParser::new()
        .parse_string_with("a { color: red }", &options)
        .unwrap();
    assert_eq!(sheet.encoding(), "ascii");
    assert_eq!(sheet.rule(0).unwrap().rule_type(), RuleType::Charset);
    assert!(sheet.css_text().starts_with("@charset \"ascii\";"));
}
