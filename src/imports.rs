//! Fetching, URL resolution, and `@import` flattening.
//!
//! The parser loads imported sheets through a [`Fetcher`]; the built-in
//! [`FileFetcher`] serves `file:` URLs and plain paths. `resolve_imports`
//! produces a sheet with imports spliced inline, their URLs rewritten to
//! stay valid from the importing sheet's location.

use std::fs;
use std::path::Path;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{Error, Result};
use crate::om::{CssRule, CssStyleSheet, MediaList, RuleType};
use crate::om::RuleBody;

/// Payload of a fetched stylesheet source.
pub enum FetchContent {
    /// Already-decoded text; only `@charset` and the referrer still
    /// matter for its encoding.
    Text(String),
    /// Raw bytes; the full decoding ladder applies.
    Bytes(Vec<u8>),
}

/// Loads `@import` targets and `parse_url` sources.
///
/// `Ok(None)` means the resource was deliberately not provided (the
/// `@import` rule is kept untouched); `Err` means a failed attempt.
pub trait Fetcher {
    /// Returns the transport-declared charset, if any, and the content.
    fn fetch(&self, url: &str) -> Result<Option<(Option<String>, FetchContent)>>;
}

/// Serves `file:` URLs and bare filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Option<(Option<String>, FetchContent)>> {
        let path = match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "file" => parsed
                .to_file_path()
                .map_err(|_| Error::Fetch(format!("not a local path: {url}")))?,
            Ok(parsed) => {
                return Err(Error::Fetch(format!(
                    "unsupported url scheme \"{}\"",
                    parsed.scheme()
                )));
            }
            Err(_) => {
                // a bare path, possibly percent-encoded
                let decoded = percent_decode_str(url)
                    .decode_utf8()
                    .map_err(|e| Error::Fetch(e.to_string()))?;
                Path::new(decoded.as_ref()).to_path_buf()
            }
        };
        let bytes = fs::read(&path)?;
        Ok(Some((None, FetchContent::Bytes(bytes))))
    }
}

/// Converts a filesystem path to a `file:` URL. Relative paths resolve
/// against the current directory.
pub fn path2url(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let url = Url::from_file_path(&absolute)
        .map_err(|_| Error::Fetch(format!("cannot express {} as a url", absolute.display())))?;
    Ok(url.to_string())
}

/// Resolves `href` against `base`, RFC 3986 style. A hierarchical base
/// URL uses the `url` crate; a bare path base gets a textual join with
/// dot-segment removal.
pub(crate) fn urljoin(base: Option<&str>, href: &str) -> String {
    let Some(base) = base else {
        return href.to_string();
    };
    // an absolute href wins outright
    if Url::parse(href).is_ok() {
        return href.to_string();
    }
    if let Ok(base_url) = Url::parse(base) {
        if let Ok(joined) = base_url.join(href) {
            return joined.to_string();
        }
    }
    let dir = match base.rfind('/') {
        Some(i) => &base[..=i],
        None => "",
    };
    remove_dot_segments(&format!("{dir}{href}"))
}

fn remove_dot_segments(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "." | "" => {}
            ".." => {
                if matches!(out.last(), Some(&s) if s != "..") {
                    out.pop();
                } else if !absolute {
                    out.push("..");
                }
            }
            _ => out.push(seg),
        }
    }
    let mut joined = out.join("/");
    if absolute {
        joined.insert(0, '/');
    }
    if path.ends_with('/') && !joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// Every URL in the sheet: `@import` targets first (unless skipped),
/// then `url()` values in document order, recursing into nested rules.
pub fn get_urls(sheet: &CssStyleSheet) -> Vec<String> {
    let mut out = Vec::new();
    collect_rule_urls(&sheet.rules(), true, &mut out);
    out
}

fn collect_rule_urls(rules: &[CssRule], include_imports: bool, out: &mut Vec<String>) {
    for rule in rules {
        if include_imports {
            if let Some(href) = rule.href() {
                out.push(href);
            }
        }
        if let Some(style) = rule.style() {
            style.collect_uris(out);
        }
        match rule.rule_type() {
            RuleType::Media | RuleType::Page => {
                collect_rule_urls(&rule.rules(), include_imports, out);
            }
            _ => {}
        }
    }
}

/// Rewrites every URL in the sheet in place. With `ignore_import_rules`
/// the `@import` targets are left alone.
pub fn replace_urls(
    sheet: &CssStyleSheet,
    replacer: &dyn Fn(&str) -> String,
    ignore_import_rules: bool,
) {
    replace_rule_urls(&sheet.rules(), replacer, ignore_import_rules);
}

fn replace_rule_urls(
    rules: &[CssRule],
    replacer: &dyn Fn(&str) -> String,
    ignore_import_rules: bool,
) {
    for rule in rules {
        if !ignore_import_rules {
            if let Some(href) = rule.href() {
                rule.set_href(replacer(&href));
            }
        }
        if let Some(style) = rule.style() {
            style.map_uris(replacer);
        }
        match rule.rule_type() {
            RuleType::Media | RuleType::Page => {
                replace_rule_urls(&rule.rules(), replacer, ignore_import_rules);
            }
            _ => {}
        }
    }
}

/// Rewrites every `url()` value in a bare declaration block in place.
pub fn replace_urls_in_style(
    style: &crate::om::CssStyleDeclaration,
    replacer: &dyn Fn(&str) -> String,
) {
    style.map_uris(replacer);
}

/// Returns a new sheet with every loaded `@import` spliced inline.
///
/// Media-qualified imports are wrapped in an `@media` block. An import
/// is kept as-is when its sheet failed to load, when the imported sheet
/// declares namespaces, or when a needed `@media` wrap would have to
/// contain an unresolved `@import`; splicing cannot express those.
/// Imported charset rules are dropped; relative URLs are rewritten
/// through the import chain so they stay correct from the root sheet's
/// location.
pub fn resolve_imports(sheet: &CssStyleSheet) -> CssStyleSheet {
    let out = CssStyleSheet::new();
    out.set_href(sheet.href());
    out.set_title(sheet.title());
    for rule in sheet.rules() {
        match (&rule.imported_sheet(), rule.rule_type()) {
            (Some(child), RuleType::Import) => {
                let child = resolve_imports(child);
                let media = rule.media().unwrap_or_default();
                let has_namespaces = child
                    .rules()
                    .iter()
                    .any(|r| r.rule_type() == RuleType::Namespace);
                // an unresolved @import cannot nest inside @media
                let unsplicable_import = !media.is_all()
                    && child
                        .rules()
                        .iter()
                        .any(|r| r.rule_type() == RuleType::Import);
                if has_namespaces || unsplicable_import {
                    log::warn!(
                        "not resolving @import {:?}: imported sheet cannot be spliced",
                        rule.href().unwrap_or_default()
                    );
                    out.append_rule_object(rule);
                    continue;
                }
                let href = rule.href().unwrap_or_default();
                replace_urls(&child, &|old| urljoin(Some(&href), old), false);

                let spliced: Vec<CssRule> = child
                    .rules()
                    .into_iter()
                    .filter(|r| r.rule_type() != RuleType::Charset)
                    .collect();
                if media.is_all() {
                    for child_rule in spliced {
                        out.append_rule_object(child_rule);
                    }
                } else {
                    let wrapper = CssRule::new(RuleBody::Media {
                        media: media.duplicate(),
                        rules: spliced,
                    });
                    wrapper.reattach_children();
                    out.append_rule_object(wrapper);
                }
            }
            _ => out.append_rule_object(rule),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urljoin_composes() {
        assert_eq!(urljoin(None, "a.css"), "a.css");
        assert_eq!(urljoin(Some("css/base.css"), "a.css"), "css/a.css");
        assert_eq!(urljoin(Some("css/base.css"), "../img/x.gif"), "img/x.gif");
        assert_eq!(urljoin(Some("base.css"), "sub/a.css"), "sub/a.css");
        assert_eq!(
            urljoin(Some("http://x.test/css/base.css"), "../a.css"),
            "http://x.test/a.css"
        );
        assert_eq!(
            urljoin(Some("css/base.css"), "http://y.test/a.css"),
            "http://y.test/a.css"
        );
    }

    #[test]
    fn dot_segment_removal() {
        assert_eq!(remove_dot_segments("a/./b/../c"), "a/c");
        assert_eq!(remove_dot_segments("../a"), "../a");
        assert_eq!(remove_dot_segments("/a/../../b"), "/b");
    }

    #[test]
    fn urls_collected_and_replaced() {
        let sheet = crate::parser::parse_sheet_text(
            "@import url(i.css);a{background: url(a.png)}\
             @media print{b{cursor: url(b.cur), pointer}}",
            None,
        )
        .unwrap();
        assert_eq!(get_urls(&sheet), vec!["i.css", "a.png", "b.cur"]);

        replace_urls(&sheet, &|old| format!("http://x.test/{old}"), true);
        assert_eq!(
            get_urls(&sheet),
            vec!["i.css", "http://x.test/a.png", "http://x.test/b.cur"]
        );
    }

    #[test]
    fn unresolved_import_is_kept() {
        let sheet =
            crate::parser::parse_sheet_text("@import url(missing.css);a{x:1}", None).unwrap();
        let resolved = resolve_imports(&sheet);
        assert_eq!(resolved.length(), 2);
        assert_eq!(resolved.rule(0).unwrap().rule_type(), RuleType::Import);
    }
}
