//! Media query lists for `@media` and `@import` rules and stylesheets.

use crate::error::{Error, Result};
use crate::tokenizer::{self, TokenKind, TokenStream};

use super::{RcCell, rc_cell};

const KNOWN_MEDIA_TYPES: &[&str] = &[
    "all",
    "braille",
    "embossed",
    "handheld",
    "print",
    "projection",
    "screen",
    "speech",
    "tty",
    "tv",
];

/// A single media query: `[not|only] <type> [and (feature[: value])]*`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaQuery {
    pub(crate) modifier: Option<String>,
    pub(crate) media_type: Option<String>,
    pub(crate) features: Vec<String>,
    pub(crate) comments_before: Vec<String>,
    pub(crate) comments_after: Vec<String>,
}

impl MediaQuery {
    /// An empty, invalid query (no media type).
    pub fn empty() -> MediaQuery {
        MediaQuery {
            modifier: None,
            media_type: None,
            features: Vec::new(),
            comments_before: Vec::new(),
            comments_after: Vec::new(),
        }
    }

    /// Parses a single media query.
    pub fn new(text: &str) -> Result<MediaQuery> {
        let list = parse_media_query_list(text)?;
        match <[MediaQuery; 1]>::try_from(list) {
            Ok([q]) => Ok(q),
            Err(_) => Err(Error::syntax("expected a single media query", 1, 1)),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.media_type.is_some() || !self.features.is_empty()
    }

    /// Case-normalized media type for comparisons.
    pub(crate) fn normalized_type(&self) -> Option<String> {
        self.media_type
            .as_deref()
            .map(tokenizer::normalize)
    }

    pub(crate) fn is_all(&self) -> bool {
        self.normalized_type().as_deref() == Some("all")
    }

    /// Query text without surrounding comments.
    pub(crate) fn core_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(m) = &self.modifier {
            parts.push(m.clone());
        }
        if let Some(t) = &self.media_type {
            parts.push(tokenizer::serialize_ident(t));
        }
        for f in &self.features {
            parts.push("and".to_string());
            parts.push(f.clone());
        }
        parts.join(" ")
    }

    /// Query text including comments (default formatting).
    pub fn media_text(&self) -> String {
        let mut parts = self.comments_before.clone();
        parts.push(self.core_text());
        parts.extend(self.comments_after.iter().cloned());
        parts.join(" ")
    }
}

/// An ordered list of media queries. The sentinel `all` is exclusive:
/// nothing can be appended next to it, and appending it replaces
/// everything else.
#[derive(Clone)]
pub struct MediaList(pub(crate) RcCell<Vec<MediaQuery>>);

impl Default for MediaList {
    fn default() -> Self {
        MediaList::new()
    }
}

impl MediaList {
    pub fn new() -> MediaList {
        MediaList(rc_cell(Vec::new()))
    }

    pub fn from_text(text: &str) -> Result<MediaList> {
        let ml = MediaList::new();
        ml.set_media_text(text)?;
        Ok(ml)
    }

    /// Deep copy with its own backing storage.
    pub(crate) fn duplicate(&self) -> MediaList {
        MediaList(rc_cell(self.0.borrow().clone()))
    }

    pub fn length(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn item(&self, index: usize) -> Option<String> {
        self.0.borrow().get(index).map(|q| q.media_text())
    }

    pub(crate) fn queries(&self) -> Vec<MediaQuery> {
        self.0.borrow().clone()
    }

    /// True when the list is empty (meaning `all`) or lists `all` alone.
    pub(crate) fn is_all(&self) -> bool {
        let qs = self.0.borrow();
        qs.is_empty() || (qs.len() == 1 && qs[0].is_all())
    }

    /// Replaces the whole list; atomic (the list is unchanged on error).
    pub fn set_media_text(&self, text: &str) -> Result<()> {
        let parsed = parse_media_query_list(text)?;
        for q in &parsed {
            if let Some(t) = q.normalized_type() {
                if !is_known_media_type(&t) {
                    return Err(Error::syntax(
                        format!("unknown media type \"{t}\""),
                        1,
                        1,
                    ));
                }
            }
        }
        // "all" plus anything else collapses to plain "all"
        let collapsed = if parsed.len() > 1 && parsed.iter().any(|q| q.is_all()) {
            parsed.into_iter().filter(|q| q.is_all()).take(1).collect()
        } else {
            parsed
        };
        *self.0.borrow_mut() = collapsed;
        Ok(())
    }

    /// Appends a medium by name, deduplicating case-insensitively (the
    /// old entry is removed and the new literal spelling appended).
    pub fn append_medium(&self, medium: &str) -> Result<()> {
        let query = MediaQuery::new(medium)?;
        self.append_query(query)
    }

    /// Appends a parsed query; invalid queries are ignored.
    pub fn append_query(&self, query: MediaQuery) -> Result<()> {
        if !query.is_valid() {
            log::debug!("MediaList: ignoring invalid media query");
            return Ok(());
        }
        if let Some(t) = query.normalized_type() {
            if !is_known_media_type(&t) {
                log::warn!("MediaQuery: Unknown media type: \"{}\".", t);
            }
        }
        let mut queries = self.0.borrow_mut();
        if query.is_all() {
            queries.clear();
            queries.push(query);
            return Ok(());
        }
        if queries.iter().any(|q| q.is_all()) {
            return Err(Error::InvalidModification(format!(
                "MediaList: ignoring new medium {:?} as \"all\" is already specified",
                query.media_text()
            )));
        }
        let norm = query.normalized_type();
        queries.retain(|q| q.normalized_type() != norm);
        queries.push(query);
        Ok(())
    }

    /// Removes a medium by (case-insensitive) name.
    pub fn delete_medium(&self, medium: &str) -> Result<()> {
        let norm = tokenizer::normalize(medium);
        let mut queries = self.0.borrow_mut();
        let before = queries.len();
        queries.retain(|q| q.normalized_type().as_deref() != Some(norm.as_str()));
        if queries.len() == before {
            return Err(Error::NotFound(format!("medium \"{medium}\" not in list")));
        }
        Ok(())
    }

    /// Replaces the query at `index`.
    pub fn set_item(&self, index: usize, medium: &str) -> Result<()> {
        let query = MediaQuery::new(medium)?;
        let mut queries = self.0.borrow_mut();
        match queries.get_mut(index) {
            Some(slot) => {
                *slot = query;
                Ok(())
            }
            None => Err(Error::IndexSize(format!("no media query at {index}"))),
        }
    }

    /// Default-formatted media text; an empty list reads as `all`.
    pub fn media_text(&self) -> String {
        crate::serializer::Serializer::default().do_media_list(self)
    }
}

pub(crate) fn is_known_media_type(normalized: &str) -> bool {
    // vendor-specific types (amzn-mobi and friends) pass unflagged
    KNOWN_MEDIA_TYPES.contains(&normalized) || normalized.contains('-')
}

/// Parses a comma-separated media query list. Comments are attached to
/// the nearest query.
pub(crate) fn parse_media_query_list(text: &str) -> Result<Vec<MediaQuery>> {
    let mut stream = TokenStream::new(text);
    let mut queries = Vec::new();
    loop {
        let query = parse_media_query(&mut stream)?;
        queries.push(query);
        stream.skip_space();
        match stream.peek() {
            None => break,
            Some(t) if t.is_char(',') => {
                stream.next();
            }
            Some(t) => {
                let (line, column) = (t.line, t.column);
                return Err(Error::syntax("unexpected token in media list", line, column));
            }
        }
    }
    Ok(queries)
}

fn parse_media_query(stream: &mut TokenStream) -> Result<MediaQuery> {
    let mut query = MediaQuery::empty();
    let mut seen_type = false;

    loop {
        let Some(tok) = stream.peek().cloned() else {
            break;
        };
        match tok.kind {
            TokenKind::Space => {
                stream.next();
            }
            TokenKind::Comment => {
                stream.next();
                if seen_type {
                    query.comments_after.push(tok.value);
                } else {
                    query.comments_before.push(tok.value);
                }
            }
            TokenKind::Ident => {
                let norm = tokenizer::normalize(&tok.value);
                if !seen_type && (norm == "not" || norm == "only") && query.modifier.is_none() {
                    // a modifier must be followed by a media type
                    let mark = stream.save();
                    stream.next();
                    stream.skip_space();
                    if !stream.peek().is_some_and(|t| t.kind == TokenKind::Ident) {
                        stream.restore(mark);
                        return Err(Error::syntax(
                            format!("media type required after \"{norm}\""),
                            tok.line,
                            tok.column,
                        ));
                    }
                    query.modifier = Some(norm);
                } else if !seen_type {
                    query.media_type = Some(tok.value.clone());
                    seen_type = true;
                    stream.next();
                } else if norm == "and" {
                    stream.next();
                    stream.skip_space();
                    let feature = parse_media_feature(stream)?;
                    query.features.push(feature);
                } else {
                    return Err(Error::syntax(
                        format!("unexpected \"{}\" in media query", tok.value),
                        tok.line,
                        tok.column,
                    ));
                }
            }
            _ if tok.is_char(',') => break,
            _ => {
                return Err(Error::syntax(
                    "unexpected token in media query",
                    tok.line,
                    tok.column,
                ));
            }
        }
    }

    if !query.is_valid() {
        return Err(Error::syntax("empty media query", 1, 1));
    }
    Ok(query)
}

fn parse_media_feature(stream: &mut TokenStream) -> Result<String> {
    let (line, column) = stream.location();
    match stream.next() {
        Some(t) if t.is_char('(') => {}
        _ => return Err(Error::syntax("expected ( after \"and\"", line, column)),
    }
    stream.skip_space();
    let name = match stream.next() {
        Some(t) if t.kind == TokenKind::Ident => t.value,
        _ => return Err(Error::syntax("expected media feature name", line, column)),
    };
    stream.skip_space();
    let mut value = None;
    if stream.peek().is_some_and(|t| t.is_char(':')) {
        stream.next();
        stream.skip_space();
        let mut parts = Vec::new();
        while let Some(t) = stream.peek() {
            if t.is_char(')') {
                break;
            }
            let t = stream.next().unwrap();
            if t.kind != TokenKind::Space {
                parts.push(t.value);
            }
        }
        if parts.is_empty() {
            return Err(Error::syntax("expected media feature value", line, column));
        }
        value = Some(parts.join(" "));
    }
    match stream.next() {
        Some(t) if t.is_char(')') => {}
        _ => return Err(Error::syntax("unclosed media feature", line, column)),
    }
    Ok(match value {
        Some(v) => format!("({}: {})", tokenizer::serialize_ident(&name), v),
        None => format!("({})", tokenizer::serialize_ident(&name)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_reads_all() {
        let ml = MediaList::new();
        assert_eq!(ml.length(), 0);
        assert_eq!(ml.media_text(), "all");
    }

    #[test]
    fn set_and_append() {
        let ml = MediaList::new();
        ml.set_media_text(" print   , screen ").unwrap();
        assert_eq!(ml.length(), 2);
        assert_eq!(ml.media_text(), "print, screen");

        // dedup moves the medium to the end, keeping the new spelling
        ml.append_medium("print").unwrap();
        assert_eq!(ml.media_text(), "screen, print");
        ml.append_medium("SCREEN").unwrap();
        assert_eq!(ml.media_text(), "print, SCREEN");

        // appending an invalid query is a no-op
        ml.append_query(MediaQuery::empty()).unwrap();
        assert_eq!(ml.length(), 2);
    }

    #[test]
    fn all_is_exclusive() {
        let ml = MediaList::new();
        ml.append_medium("print").unwrap();
        ml.append_medium("tv").unwrap();
        ml.append_medium("all").unwrap();
        assert_eq!(ml.media_text(), "all");
        assert!(matches!(
            ml.append_medium("tv"),
            Err(Error::InvalidModification(_))
        ));
        assert_eq!(ml.media_text(), "all");
    }

    #[test]
    fn set_media_text_collapses_all() {
        let ml = MediaList::from_text("all, handheld").unwrap();
        assert_eq!(ml.media_text(), "all");
    }

    #[test]
    fn delete_medium() {
        let ml = MediaList::new();
        assert!(matches!(ml.delete_medium("all"), Err(Error::NotFound(_))));
        ml.append_medium("tV").unwrap();
        ml.delete_medium("Tv").unwrap();
        assert_eq!(ml.length(), 0);
    }

    #[test]
    fn rejects_malformed_lists() {
        for bad in ["", "a,b", "not", "only", "not tv,", "all;", "all, and(color)",
                    "all,", "all, ", "all ,", "all, /*1*/", "all and (color),", "all tv, print"] {
            assert!(MediaList::from_text(bad).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn queries_with_features() {
        let ml =
            MediaList::from_text("tv and (color), handheld and (width: 1px) and (color)").unwrap();
        assert_eq!(
            ml.media_text(),
            "tv and (color), handheld and (width: 1px) and (color)"
        );
    }

    #[test]
    fn vendor_types_pass() {
        let ml = MediaList::from_text("print, amzn-mobi").unwrap();
        assert_eq!(ml.media_text(), "print, amzn-mobi");
    }
}
