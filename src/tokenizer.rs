//! CSS tokenizer.
//!
//! Consumes decoded CSS source text and lazily produces a flat token stream.
//! Whitespace and comments are real tokens (the serializer needs them to
//! reproduce comment placement), literal text is preserved verbatim, and
//! unterminated strings/comments/URLs at end of input still yield a
//! best-effort token; validity judgment is deferred to the parser.

/// The kind of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier, possibly containing escapes: `color`, `c\olor`.
    Ident,
    /// `@media`, `@im\port`, ...
    AtKeyword,
    /// Quoted string including its quotes. May lack the closing quote
    /// when unterminated.
    String,
    /// `#fff`, `#someid`.
    Hash,
    /// `12`, `-4`, `+.5`.
    Number,
    /// `50%`.
    Percentage,
    /// `10px`, `1.5em`.
    Dimension,
    /// `url(...)` including the wrapper.
    Uri,
    /// `u+0a-ff`.
    UnicodeRange,
    /// `<!--`.
    Cdo,
    /// `-->`.
    Cdc,
    /// `~=`.
    Includes,
    /// `|=`.
    DashMatch,
    /// Run of whitespace, literal text preserved.
    Space,
    /// `/* ... */`, possibly unterminated at end of input.
    Comment,
    /// Identifier immediately followed by `(`; the value excludes the paren.
    Function,
    /// Any other single character.
    Char,
}

/// A single token with its literal source text and 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: u32,
    pub column: u32,
}

impl Token {
    /// First character of the literal, for `Char` tokens.
    pub(crate) fn ch(&self) -> char {
        self.value.chars().next().unwrap_or('\0')
    }

    pub(crate) fn is_char(&self, c: char) -> bool {
        self.kind == TokenKind::Char && self.ch() == c
    }
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_name_char(c: char) -> bool {
    is_name_start(c) || c.is_ascii_digit() || c == '-'
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | '\x0c')
}

/// A lazy scanner over decoded CSS text.
pub struct Tokenizer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Tokenizer {
    pub fn new(text: &str) -> Self {
        Tokenizer {
            chars: text.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn bump(&mut self, out: &mut String) {
        if let Some(c) = self.peek() {
            out.push(c);
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn starts_escape(&self, n: usize) -> bool {
        self.peek_at(n) == Some('\\') && self.peek_at(n + 1).is_some_and(|c| c != '\n')
    }

    /// True when an identifier starts at offset `n`.
    fn starts_ident(&self, n: usize) -> bool {
        match self.peek_at(n) {
            Some('-') => {
                self.peek_at(n + 1).is_some_and(is_name_start) || self.starts_escape(n + 1)
            }
            Some(c) if is_name_start(c) => true,
            _ => self.starts_escape(n),
        }
    }

    /// Consumes one escape sequence (`\` already verified) into `out`.
    fn consume_escape(&mut self, out: &mut String) {
        self.bump(out); // the backslash
        let mut hex = 0;
        while hex < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            self.bump(out);
            hex += 1;
        }
        if hex > 0 {
            // single optional whitespace terminator belongs to the escape
            if self.peek().is_some_and(is_space) {
                self.bump(out);
            }
        } else if self.peek().is_some() {
            self.bump(out);
        }
    }

    /// Consumes a name (ident characters and escapes) into `out`.
    fn consume_name(&mut self, out: &mut String) {
        loop {
            match self.peek() {
                Some('\\') if self.starts_escape(0) => self.consume_escape(out),
                Some(c) if is_name_char(c) => self.bump(out),
                _ => break,
            }
        }
    }

    /// Consumes a quoted string starting at the opening quote. The literal
    /// includes both quotes when terminated. A raw newline or end of input
    /// ends the token without consuming the newline.
    fn consume_string(&mut self, out: &mut String) {
        let Some(quote) = self.peek() else { return };
        self.bump(out);
        loop {
            match self.peek() {
                None => break,
                Some('\n') => break, // unterminated; judged by the parser
                Some('\\') => {
                    if self.peek_at(1) == Some('\n') {
                        // line continuation, kept literally; decode elides it
                        self.bump(out);
                        self.bump(out);
                    } else {
                        self.consume_escape(out);
                    }
                }
                Some(c) => {
                    self.bump(out);
                    if c == quote {
                        break;
                    }
                }
            }
        }
    }

    /// Consumes the remainder of `url(` up to the matching `)`.
    fn consume_uri_rest(&mut self, out: &mut String) {
        while self.peek().is_some_and(is_space) {
            self.bump(out);
        }
        if matches!(self.peek(), Some('"') | Some('\'')) {
            self.consume_string(out);
        } else {
            loop {
                match self.peek() {
                    None | Some(')') => break,
                    Some('\\') => self.consume_escape(out),
                    Some(c) if is_space(c) => break,
                    _ => self.bump(out),
                }
            }
        }
        while self.peek().is_some_and(is_space) {
            self.bump(out);
        }
        if self.peek() == Some(')') {
            self.bump(out);
        }
    }

    fn consume_number(&mut self, out: &mut String) {
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump(out);
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump(out);
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.bump(out);
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump(out);
            }
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        let c = self.peek()?;
        let line = self.line;
        let column = self.column;
        let mut value = String::new();

        let kind = if is_space(c) {
            while self.peek().is_some_and(is_space) {
                self.bump(&mut value);
            }
            TokenKind::Space
        } else if c == '/' && self.peek_at(1) == Some('*') {
            self.bump(&mut value);
            self.bump(&mut value);
            loop {
                match self.peek() {
                    None => break,
                    Some('*') if self.peek_at(1) == Some('/') => {
                        self.bump(&mut value);
                        self.bump(&mut value);
                        break;
                    }
                    _ => self.bump(&mut value),
                }
            }
            TokenKind::Comment
        } else if c == '"' || c == '\'' {
            self.consume_string(&mut value);
            TokenKind::String
        } else if c == '@' && self.starts_ident(1) {
            self.bump(&mut value);
            self.consume_name(&mut value);
            TokenKind::AtKeyword
        } else if c == '#' && (self.peek_at(1).is_some_and(is_name_char) || self.starts_escape(1)) {
            self.bump(&mut value);
            self.consume_name(&mut value);
            TokenKind::Hash
        } else if (c == 'u' || c == 'U')
            && self.peek_at(1) == Some('+')
            && self
                .peek_at(2)
                .is_some_and(|c| c.is_ascii_hexdigit() || c == '?')
        {
            self.bump(&mut value);
            self.bump(&mut value);
            while self
                .peek()
                .is_some_and(|c| c.is_ascii_hexdigit() || c == '?' || c == '-')
            {
                self.bump(&mut value);
            }
            TokenKind::UnicodeRange
        } else if c.is_ascii_digit()
            || (c == '.' && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()))
            || ((c == '+' || c == '-')
                && (self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                    || (self.peek_at(1) == Some('.')
                        && self.peek_at(2).is_some_and(|c| c.is_ascii_digit()))))
        {
            self.consume_number(&mut value);
            if self.peek() == Some('%') {
                self.bump(&mut value);
                TokenKind::Percentage
            } else if self.starts_ident(0) {
                self.consume_name(&mut value);
                TokenKind::Dimension
            } else {
                TokenKind::Number
            }
        } else if c == '<'
            && self.peek_at(1) == Some('!')
            && self.peek_at(2) == Some('-')
            && self.peek_at(3) == Some('-')
        {
            for _ in 0..4 {
                self.bump(&mut value);
            }
            TokenKind::Cdo
        } else if c == '-'
            && self.peek_at(1) == Some('-')
            && self.peek_at(2) == Some('>')
        {
            for _ in 0..3 {
                self.bump(&mut value);
            }
            TokenKind::Cdc
        } else if c == '~' && self.peek_at(1) == Some('=') {
            self.bump(&mut value);
            self.bump(&mut value);
            TokenKind::Includes
        } else if c == '|' && self.peek_at(1) == Some('=') {
            self.bump(&mut value);
            self.bump(&mut value);
            TokenKind::DashMatch
        } else if self.starts_ident(0) {
            self.consume_name(&mut value);
            if self.peek() == Some('(') {
                if value.eq_ignore_ascii_case("url") {
                    self.bump(&mut value);
                    self.consume_uri_rest(&mut value);
                    TokenKind::Uri
                } else {
                    self.pos += 1; // the paren is implied by the kind
                    self.column += 1;
                    TokenKind::Function
                }
            } else {
                TokenKind::Ident
            }
        } else {
            self.bump(&mut value);
            TokenKind::Char
        };

        Some(Token {
            kind,
            value,
            line,
            column,
        })
    }
}

impl Iterator for Tokenizer {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        self.next_token()
    }
}

/// A buffering wrapper that lets the parser look ahead arbitrarily and
/// snapshot/restore its cursor to backtrack.
pub struct TokenStream {
    source: Tokenizer,
    buf: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    pub fn new(text: &str) -> Self {
        TokenStream {
            source: Tokenizer::new(text),
            buf: Vec::new(),
            pos: 0,
        }
    }

    fn fill(&mut self, upto: usize) {
        while self.buf.len() <= upto {
            match self.source.next() {
                Some(t) => self.buf.push(t),
                None => break,
            }
        }
    }

    pub fn peek(&mut self) -> Option<&Token> {
        self.fill(self.pos);
        self.buf.get(self.pos)
    }

    pub fn peek_at(&mut self, n: usize) -> Option<&Token> {
        self.fill(self.pos + n);
        self.buf.get(self.pos + n)
    }

    pub fn next(&mut self) -> Option<Token> {
        self.fill(self.pos);
        let t = self.buf.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    pub fn save(&self) -> usize {
        self.pos
    }

    pub fn restore(&mut self, mark: usize) {
        self.pos = mark;
    }

    /// Skips whitespace tokens only.
    pub fn skip_space(&mut self) {
        while self.peek().is_some_and(|t| t.kind == TokenKind::Space) {
            self.pos += 1;
        }
    }

    /// Position of the next token, for diagnostics.
    pub fn location(&mut self) -> (u32, u32) {
        match self.peek() {
            Some(t) => (t.line, t.column),
            None => (self.source.line, self.source.column),
        }
    }
}

/// Decodes hex escapes to their characters but keeps single-character
/// escapes literally, the normalized display form for identifiers:
/// `\43\x` becomes `C\x`.
pub(crate) fn decode_hex_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut it = s.chars().peekable();
    while let Some(c) = it.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match it.peek() {
            None => out.push('\\'),
            Some('\n') => {
                it.next(); // line continuation elided
            }
            Some(d) if d.is_ascii_hexdigit() => {
                let mut hex = String::new();
                while hex.len() < 6 && it.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    hex.push(it.next().unwrap());
                }
                if it.peek().copied().is_some_and(is_space) {
                    it.next();
                }
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => out.push('\u{fffd}'),
                }
            }
            Some(_) => {
                out.push('\\');
                out.push(it.next().unwrap());
            }
        }
    }
    out
}

/// Fully decodes all escapes; used for name matching.
pub(crate) fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let decoded = decode_hex_escapes(s);
    let mut it = decoded.chars().peekable();
    while let Some(c) = it.next() {
        if c == '\\' && it.peek().is_some() {
            out.push(it.next().unwrap());
        } else {
            out.push(c);
        }
    }
    out
}

/// Fully decodes and ASCII-lowercases; the keyword matching form, so that
/// `@MeDiA` and `@\media` both dispatch as `@media`.
pub(crate) fn normalize(s: &str) -> String {
    unescape(s).to_ascii_lowercase()
}

/// Decodes the content of a string literal (quotes included in `lit`),
/// resolving all escapes and elided line continuations.
pub(crate) fn string_value(lit: &str) -> String {
    let inner = string_inner(lit);
    unescape(inner)
}

/// The raw inner text of a string literal, stripped of its quotes.
pub(crate) fn string_inner(lit: &str) -> &str {
    if !lit.starts_with(['"', '\'']) {
        return lit;
    }
    let s = &lit[1..];
    if is_closed_string(lit) {
        &s[..s.len() - 1]
    } else {
        s
    }
}

/// Whether a string literal was properly terminated.
pub(crate) fn is_closed_string(lit: &str) -> bool {
    let mut chars: Vec<char> = lit.chars().collect();
    if chars.len() < 2 {
        return false;
    }
    let quote = chars[0];
    if *chars.last().unwrap() != quote {
        return false;
    }
    // make sure the final quote is not escaped
    chars.pop();
    let mut backslashes = 0;
    while chars.last() == Some(&'\\') {
        chars.pop();
        backslashes += 1;
    }
    backslashes % 2 == 0
}

/// Extracts the target of a `url(...)` token. Returns `None` when the
/// token is malformed (unterminated inner string or missing `)`).
pub(crate) fn uri_value(lit: &str) -> Option<String> {
    let rest = lit.strip_prefix(|c: char| c == 'u' || c == 'U')?;
    let rest = rest.strip_prefix(|c: char| c == 'r' || c == 'R')?;
    let rest = rest.strip_prefix(|c: char| c == 'l' || c == 'L')?;
    let rest = rest.strip_prefix('(')?;
    let rest = rest.strip_suffix(')')?;
    let inner = rest.trim_matches(is_space);
    if inner.starts_with('"') || inner.starts_with('\'') {
        if !is_closed_string(inner) || inner.contains('\n') {
            return None;
        }
        Some(string_value(inner))
    } else {
        if inner.contains('\n') || inner.contains('"') || inner.contains('\'') {
            return None;
        }
        Some(unescape(inner))
    }
}

/// Canonical double-quoted serialization of a string literal. Hex escapes
/// of control characters are normalized (`\a `), printable hex escapes are
/// decoded, other character escapes are preserved, and quoting always uses
/// double quotes.
pub(crate) fn serialize_string(lit: &str) -> String {
    let inner = string_inner(lit);
    let mut out = String::with_capacity(inner.len() + 2);
    out.push('"');
    let mut it = inner.chars().peekable();
    while let Some(c) = it.next() {
        match c {
            '\\' => match it.peek() {
                None => out.push_str("\\\\"),
                Some('\n') => {
                    it.next(); // continuation elided
                }
                Some(d) if d.is_ascii_hexdigit() => {
                    let mut hex = String::new();
                    while hex.len() < 6 && it.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                        hex.push(it.next().unwrap());
                    }
                    if it.peek().copied().is_some_and(is_space) {
                        it.next();
                    }
                    let decoded = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .unwrap_or('\u{fffd}');
                    push_string_char(&mut out, decoded);
                }
                Some('"') => {
                    it.next();
                    out.push_str("\\\"");
                }
                Some('\'') => {
                    it.next();
                    out.push('\'');
                }
                Some('\\') => {
                    it.next();
                    out.push_str("\\\\");
                }
                Some(_) => {
                    // other character escapes are kept as written
                    out.push('\\');
                    out.push(it.next().unwrap());
                }
            },
            _ => push_string_char(&mut out, c),
        }
    }
    out.push('"');
    out
}

fn push_string_char(out: &mut String, c: char) {
    if c == '"' {
        out.push_str("\\\"");
    } else if c == '\\' {
        out.push_str("\\\\");
    } else if (c as u32) < 0x20 || c == '\x7f' {
        out.push_str(&format!("\\{:x} ", c as u32));
    } else {
        out.push(c);
    }
}

/// Canonical form of an identifier: hex escapes decoded where the result
/// is a plain character, character escapes preserved.
pub(crate) fn serialize_ident(lit: &str) -> String {
    let mut out = String::with_capacity(lit.len());
    for c in decode_hex_escapes(lit).chars() {
        if (c as u32) < 0x20 || c == '\x7f' {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(css: &str) -> Vec<TokenKind> {
        Tokenizer::new(css).map(|t| t.kind).collect()
    }

    fn texts(css: &str) -> Vec<String> {
        Tokenizer::new(css).map(|t| t.value).collect()
    }

    #[test]
    fn basic_ruleset() {
        use TokenKind::*;
        assert_eq!(
            kinds("a { color: red; }"),
            vec![
                Ident, Space, Char, Space, Ident, Char, Space, Ident, Char, Space, Char
            ]
        );
    }

    #[test]
    fn numbers_and_dimensions() {
        use TokenKind::*;
        assert_eq!(
            kinds("0 .5 -1em +0.5% 12px"),
            vec![
                Number, Space, Number, Space, Dimension, Space, Percentage, Space, Dimension
            ]
        );
        assert_eq!(texts("-1em")[0], "-1em");
        assert_eq!(texts("+.5")[0], "+.5");
    }

    #[test]
    fn at_keyword_with_escape() {
        let toks: Vec<Token> = Tokenizer::new(r"@im\port \43\x").collect();
        assert_eq!(toks[0].kind, TokenKind::AtKeyword);
        assert_eq!(normalize(&toks[0].value), "@import");
        assert_eq!(toks[2].kind, TokenKind::Ident);
        assert_eq!(serialize_ident(&toks[2].value), r"C\x");
        assert_eq!(normalize(&toks[2].value), "cx");
    }

    #[test]
    fn strings() {
        let toks: Vec<Token> = Tokenizer::new("\"abc\" 'd\"e'").collect();
        assert_eq!(toks[0].kind, TokenKind::String);
        assert!(is_closed_string(&toks[0].value));
        assert_eq!(string_value(&toks[2].value), "d\"e");
        assert_eq!(serialize_string(&toks[2].value), r#""d\"e""#);
    }

    #[test]
    fn unterminated_string_stops_at_newline() {
        let toks: Vec<Token> = Tokenizer::new("\"abc\nx").collect();
        assert_eq!(toks[0].kind, TokenKind::String);
        assert!(!is_closed_string(&toks[0].value));
        assert_eq!(toks[1].kind, TokenKind::Space);
        assert_eq!(toks[2].kind, TokenKind::Ident);
    }

    #[test]
    fn string_continuation_is_elided() {
        let toks: Vec<Token> = Tokenizer::new("\"a not s\\\no very long\"").collect();
        assert!(is_closed_string(&toks[0].value));
        assert_eq!(string_value(&toks[0].value), "a not so very long");
    }

    #[test]
    fn uri_tokens() {
        let toks: Vec<Token> = Tokenizer::new("url( images/x.gif ) url('h)i')").collect();
        assert_eq!(toks[0].kind, TokenKind::Uri);
        assert_eq!(uri_value(&toks[0].value).as_deref(), Some("images/x.gif"));
        assert_eq!(toks[2].kind, TokenKind::Uri);
        assert_eq!(uri_value(&toks[2].value).as_deref(), Some("h)i"));
    }

    #[test]
    fn bad_uri_is_judged_invalid() {
        let toks: Vec<Token> = Tokenizer::new("url('a\n);").collect();
        assert_eq!(toks[0].kind, TokenKind::Uri);
        assert_eq!(uri_value(&toks[0].value), None);
    }

    #[test]
    fn comments_and_unterminated_comment() {
        let toks: Vec<Token> = Tokenizer::new("/*a*/ /*b").collect();
        assert_eq!(toks[0].kind, TokenKind::Comment);
        assert_eq!(toks[0].value, "/*a*/");
        assert_eq!(toks[2].kind, TokenKind::Comment);
        assert_eq!(toks[2].value, "/*b");
    }

    #[test]
    fn hash_and_function() {
        use TokenKind::*;
        assert_eq!(kinds("#fff rgb(1,2,3)"), vec![
            Hash, Space, Function, Number, Char, Number, Char, Number, Char
        ]);
    }

    #[test]
    fn positions_are_tracked() {
        let toks: Vec<Token> = Tokenizer::new("a {\n  top: 1\n}").collect();
        let top = toks.iter().find(|t| t.value == "top").unwrap();
        assert_eq!((top.line, top.column), (2, 3));
    }

    #[test]
    fn stream_save_restore() {
        let mut s = TokenStream::new("a b c");
        let mark = s.save();
        assert_eq!(s.next().unwrap().value, "a");
        s.skip_space();
        assert_eq!(s.next().unwrap().value, "b");
        s.restore(mark);
        assert_eq!(s.next().unwrap().value, "a");
    }

    #[test]
    fn escape_string_normalization() {
        // hex escapes of controls keep escape form with trailing space,
        // printable hex escapes decode, char escapes survive
        assert_eq!(serialize_string(r#""\a\d\c""#), r#""\a \d \c ""#);
        assert_eq!(serialize_string(r#""\22""#), r#""\"""#);
        assert_eq!(serialize_string(r#"'\''"#), r#""'""#);
        assert_eq!(serialize_string(r#""\\""#), r#""\\""#);
        assert_eq!(serialize_string(r#""2\\ 1\ 2\\""#), r#""2\\ 1\ 2\\""#);
        assert_eq!(serialize_string(r#"'\[\]'"#), r#""\[\]""#);
    }
}
