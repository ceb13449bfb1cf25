//! # cassis
//!
//! A CSS 2.1 parser, object model, and serializer, with the common CSS 3
//! extensions found in the wild: media queries, namespaces, and `@variables`.
//!
//! ## Features
//!
//! - Parse stylesheets from strings, bytes, files, or URLs, with the full
//!   CSS encoding detection ladder (BOM, `@charset`, referrer)
//! - A mutable, DOM-like object model of rules, selectors, and declarations
//! - Configurable serialization, from pretty-printed to fully minified
//! - `@import` loading and flattening, URL collection and rewriting
//! - CSS variable resolution at serialization time
//!
//! ## Quick Start
//!
//! ```
//! use cassis::{parse_string, Preferences, Serializer};
//!
//! let sheet = parse_string("a { color: red } b { color: blue }").unwrap();
//! assert_eq!(sheet.length(), 2);
//!
//! let minified = Serializer::new(Preferences::minified());
//! assert_eq!(minified.do_stylesheet(&sheet), "a{color:red}b{color:blue}");
//! ```
//!
//! ## Working with the object model
//!
//! Parsed sheets are live: rules and declarations can be inspected and
//! mutated, and serialization reflects the current state.
//!
//! ```
//! use cassis::parse_string;
//!
//! let sheet = parse_string("a { color: red }").unwrap();
//! let rule = sheet.rule(0).unwrap();
//! let style = rule.style().unwrap();
//! style.set_property("color", "green", "").unwrap();
//! assert_eq!(style.get_property_value("color"), "green");
//! ```

mod encoding;
pub mod error;
pub mod imports;
pub mod om;
mod parser;
mod profiles;
pub mod serializer;
mod tokenizer;

use std::fs;
use std::path::Path;

pub use error::{Error, Result};
pub use imports::{get_urls, path2url, replace_urls, replace_urls_in_style, resolve_imports};
pub use imports::{FetchContent, Fetcher, FileFetcher};
pub use om::{
    CssRule, CssStyleDeclaration, CssStyleSheet, CssVariablesDeclaration, MediaList, MediaQuery,
    PageSelector, Property, PropertyValue, RuleType, Selector, SelectorList, Specificity,
};
pub use parser::ErrorPolicy;
pub use profiles::is_known_property;
pub use serializer::{ImportHrefFormat, Preferences, Serializer};

/// Per-call parse settings; all default to off.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Location the sheet was loaded from; the base for resolving
    /// `@import` and `url()` targets.
    pub href: Option<String>,
    /// Media the sheet applies to, as a media query list.
    pub media: Option<String>,
    /// Advisory title of the sheet.
    pub title: Option<String>,
    /// Forced encoding. Overrides every detected source and propagates
    /// into imported sheets.
    pub encoding: Option<String>,
}

/// A configured parser. The free functions [`parse_string`],
/// [`parse_bytes`], [`parse_file`], and [`parse_url`] cover the default
/// configuration; build a `CssParser` to change error handling, import
/// fetching, or validation.
pub struct CssParser<'a> {
    policy: ErrorPolicy,
    fetcher: Option<&'a dyn Fetcher>,
    validating: bool,
}

impl Default for CssParser<'_> {
    fn default() -> Self {
        CssParser {
            policy: ErrorPolicy::Permissive,
            fetcher: Some(&FileFetcher),
            validating: true,
        }
    }
}

impl<'a> CssParser<'a> {
    pub fn new() -> CssParser<'a> {
        CssParser::default()
    }

    /// Makes every unparsable construct a hard error instead of a
    /// logged drop.
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Loads `@import` targets through `fetcher` instead of the default
    /// [`FileFetcher`].
    pub fn with_fetcher(mut self, fetcher: &'a dyn Fetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Keeps `@import` rules unloaded.
    pub fn without_fetching(mut self) -> Self {
        self.fetcher = None;
        self
    }

    /// Controls property validation on parsed sheets.
    pub fn validating(mut self, validating: bool) -> Self {
        self.validating = validating;
        self
    }

    pub fn parse_string(&self, css: &str) -> Result<CssStyleSheet> {
        self.parse_string_with(css, &ParseOptions::default())
    }

    pub fn parse_string_with(&self, css: &str, options: &ParseOptions) -> Result<CssStyleSheet> {
        let explicit =
            encoding::resolve_text_encoding(css, options.encoding.as_deref(), None)?;
        let sheet = parser::parse_sheet(
            css,
            options.href.as_deref(),
            self.policy,
            self.fetcher,
            options.encoding.as_deref(),
            explicit.as_deref(),
            0,
        )?;
        self.finish(sheet, options)
    }

    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<CssStyleSheet> {
        self.parse_bytes_with(bytes, &ParseOptions::default())
    }

    pub fn parse_bytes_with(&self, bytes: &[u8], options: &ParseOptions) -> Result<CssStyleSheet> {
        let (text, explicit) =
            encoding::decode_css_bytes(bytes, options.encoding.as_deref(), None, None)?;
        let sheet = parser::parse_sheet(
            &text,
            options.href.as_deref(),
            self.policy,
            self.fetcher,
            options.encoding.as_deref(),
            explicit.as_deref(),
            0,
        )?;
        self.finish(sheet, options)
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<CssStyleSheet> {
        self.parse_file_with(path, &ParseOptions::default())
    }

    pub fn parse_file_with(
        &self,
        path: impl AsRef<Path>,
        options: &ParseOptions,
    ) -> Result<CssStyleSheet> {
        let bytes = fs::read(path.as_ref())?;
        let mut options = options.clone();
        if options.href.is_none() {
            options.href = Some(path2url(path.as_ref())?);
        }
        self.parse_bytes_with(&bytes, &options)
    }

    pub fn parse_url(&self, url: &str) -> Result<CssStyleSheet> {
        self.parse_url_with(url, &ParseOptions::default())
    }

    pub fn parse_url_with(&self, url: &str, options: &ParseOptions) -> Result<CssStyleSheet> {
        let fetcher = self.fetcher.unwrap_or(&FileFetcher);
        let Some((transport_enc, content)) = fetcher.fetch(url)? else {
            return Err(Error::Fetch(format!("no content for {url}")));
        };
        let mut options = options.clone();
        if options.href.is_none() {
            options.href = Some(url.to_string());
        }
        let (text, explicit) = match content {
            FetchContent::Bytes(bytes) => encoding::decode_css_bytes(
                &bytes,
                options.encoding.as_deref(),
                transport_enc.as_deref(),
                None,
            )?,
            FetchContent::Text(text) => {
                let explicit = encoding::resolve_text_encoding(
                    &text,
                    options.encoding.as_deref().or(transport_enc.as_deref()),
                    None,
                )?;
                (text, explicit)
            }
        };
        let sheet = parser::parse_sheet(
            &text,
            options.href.as_deref(),
            self.policy,
            self.fetcher,
            options.encoding.as_deref(),
            explicit.as_deref(),
            0,
        )?;
        self.finish(sheet, &options)
    }

    /// Parses a bare declaration block, permissively.
    pub fn parse_style(&self, css: &str) -> CssStyleDeclaration {
        CssStyleDeclaration::parse(css)
    }

    fn finish(&self, sheet: CssStyleSheet, options: &ParseOptions) -> Result<CssStyleSheet> {
        if let Some(media) = &options.media {
            sheet.media().set_media_text(media)?;
        }
        sheet.set_title(options.title.clone());
        sheet.set_validating(self.validating);
        Ok(sheet)
    }
}

/// Parses a stylesheet from a string with the default configuration.
pub fn parse_string(css: &str) -> Result<CssStyleSheet> {
    CssParser::new().parse_string(css)
}

/// Parses a stylesheet from raw bytes, detecting their encoding.
pub fn parse_bytes(bytes: &[u8]) -> Result<CssStyleSheet> {
    CssParser::new().parse_bytes(bytes)
}

/// Parses a stylesheet from a file; its path becomes the sheet's href.
pub fn parse_file(path: impl AsRef<Path>) -> Result<CssStyleSheet> {
    CssParser::new().parse_file(path)
}

/// Parses a stylesheet from a URL through the default [`FileFetcher`].
pub fn parse_url(url: &str) -> Result<CssStyleSheet> {
    CssParser::new().parse_url(url)
}

/// Parses a bare declaration block, such as an HTML `style` attribute.
pub fn parse_style(css: &str) -> CssStyleDeclaration {
    CssStyleDeclaration::parse(css)
}
