//! Pull-based HTML tag tokenizer.
//!
//! Reads markup from any [`BufRead`] and yields tags lazily, one per call to
//! [`Iterator::next`]. Text, comments and doctypes are consumed without being
//! emitted. Nothing but the tag currently being read is buffered, so a page
//! body can be tokenized while it is still arriving.

use std::io::{self, BufRead};
use std::iter::FusedIterator;

/// Elements whose content is raw text rather than markup.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "iframe",
    "noembed",
    "noframes",
    "noscript",
    "plaintext",
    "script",
    "style",
    "textarea",
    "title",
    "xmp",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// ASCII-lowercased attribute name.
    pub key: String,
    /// Attribute value with character references decoded.
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// ASCII-lowercased tag name.
    pub name: String,
    /// Attributes in source order. Duplicates are kept.
    pub attrs: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartTag(Tag),
    SelfClosingTag(Tag),
    EndTag(String),
}

/// Lazily tokenizes the markup read from `R`.
///
/// The iterator is single-pass and fused: it ends at end of input, and an I/O
/// error is yielded once before it ends. A tag cut off by end of input is
/// dropped.
pub struct Tokenizer<R> {
    reader: R,
    raw_tag: Option<String>,
    done: bool,
}

impl<R: BufRead> Tokenizer<R> {
    pub fn new(reader: R) -> Self {
        Tokenizer {
            reader,
            raw_tag: None,
            done: false,
        }
    }

    fn read_token(&mut self) -> io::Result<Option<Token>> {
        if let Some(name) = self.raw_tag.take() {
            if let Some(token) = self.skip_raw_text(name)? {
                return Ok(Some(token));
            }
            return Ok(None);
        }

        loop {
            if !self.scan(None, |b| b == b'<')? {
                return Ok(None);
            }
            self.bump();

            match self.peek()? {
                None => return Ok(None),
                Some(b) if b.is_ascii_alphabetic() => return self.read_start_tag(),
                Some(b'/') => {
                    self.bump();
                    if let Some(token) = self.read_end_tag()? {
                        return Ok(Some(token));
                    }
                }
                Some(b'!') => {
                    self.bump();
                    self.skip_markup_declaration()?;
                }
                Some(b'?') => self.skip_past(b'>')?,
                // A lone '<' is just text.
                Some(_) => {}
            }
        }
    }

    fn read_start_tag(&mut self) -> io::Result<Option<Token>> {
        let name = self.read_name()?;
        let mut attrs = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace()?;
            match self.peek()? {
                None => return Ok(None),
                Some(b'>') => {
                    self.bump();
                    break;
                }
                Some(b'/') => {
                    self.bump();
                    self_closing = true;
                }
                Some(_) => {
                    self_closing = false;
                    let key = self.read_attr_key()?;
                    self.skip_whitespace()?;
                    let value = if self.peek()? == Some(b'=') {
                        self.bump();
                        self.skip_whitespace()?;
                        match self.read_attr_value()? {
                            Some(value) => value,
                            None => return Ok(None),
                        }
                    } else {
                        String::new()
                    };
                    attrs.push(Attribute { key, value });
                }
            }
        }

        let tag = Tag { name, attrs };
        // A trailing '/' does not end a raw text element.
        if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
            self.raw_tag = Some(tag.name.clone());
        }
        if self_closing {
            return Ok(Some(Token::SelfClosingTag(tag)));
        }
        Ok(Some(Token::StartTag(tag)))
    }

    /// Called after `</`.
    fn read_end_tag(&mut self) -> io::Result<Option<Token>> {
        match self.peek()? {
            Some(b) if b.is_ascii_alphabetic() => {
                let name = self.read_name()?;
                if !self.scan(None, |b| b == b'>')? {
                    return Ok(None);
                }
                self.bump();
                Ok(Some(Token::EndTag(name)))
            }
            _ => {
                self.skip_past(b'>')?;
                Ok(None)
            }
        }
    }

    /// Called after `<!`.
    fn skip_markup_declaration(&mut self) -> io::Result<()> {
        if self.peek()? == Some(b'-') {
            self.bump();
            if self.peek()? == Some(b'-') {
                self.bump();
                return self.skip_comment();
            }
        }
        self.skip_past(b'>')
    }

    fn skip_comment(&mut self) -> io::Result<()> {
        // `<!-->` and `<!--->` close immediately, `--!>` closes like `-->`.
        let mut dashes = 2;
        let mut bang = false;
        loop {
            match self.next_byte()? {
                None => return Ok(()),
                Some(b'-') if bang => {
                    dashes = 1;
                    bang = false;
                }
                Some(b'-') => dashes += 1,
                Some(b'!') if dashes >= 2 && !bang => bang = true,
                Some(b'>') if dashes >= 2 => return Ok(()),
                Some(_) => {
                    dashes = 0;
                    bang = false;
                }
            }
        }
    }

    /// Skips the content of a raw text element and returns its end tag.
    fn skip_raw_text(&mut self, name: String) -> io::Result<Option<Token>> {
        if name == "plaintext" {
            self.scan(None, |_| false)?;
            return Ok(None);
        }

        loop {
            if !self.scan(None, |b| b == b'<')? {
                return Ok(None);
            }
            self.bump();
            if self.peek()? != Some(b'/') {
                continue;
            }
            self.bump();
            if !self.eat_ignore_case(&name)? {
                continue;
            }
            match self.peek()? {
                None => return Ok(None),
                Some(b) if is_space(b) || b == b'/' || b == b'>' => {
                    if !self.scan(None, |b| b == b'>')? {
                        return Ok(None);
                    }
                    self.bump();
                    return Ok(Some(Token::EndTag(name)));
                }
                Some(_) => {}
            }
        }
    }

    fn read_name(&mut self) -> io::Result<String> {
        let mut raw = Vec::new();
        self.scan(Some(&mut raw), |b| is_space(b) || b == b'/' || b == b'>')?;
        raw.make_ascii_lowercase();
        Ok(bytes_to_string(raw))
    }

    fn read_attr_key(&mut self) -> io::Result<String> {
        let mut raw = Vec::new();
        // A leading '=' belongs to the name.
        if self.peek()? == Some(b'=') {
            raw.push(b'=');
            self.bump();
        }
        self.scan(Some(&mut raw), |b| {
            is_space(b) || b == b'/' || b == b'>' || b == b'='
        })?;
        raw.make_ascii_lowercase();
        Ok(bytes_to_string(raw))
    }

    /// Returns `None` when input ends inside a quoted value.
    fn read_attr_value(&mut self) -> io::Result<Option<String>> {
        let mut raw = Vec::new();
        match self.peek()? {
            Some(quote @ (b'"' | b'\'')) => {
                self.bump();
                if !self.scan(Some(&mut raw), |b| b == quote)? {
                    return Ok(None);
                }
                self.bump();
            }
            _ => {
                self.scan(Some(&mut raw), |b| is_space(b) || b == b'>')?;
            }
        }
        let value = bytes_to_string(raw);
        if value.contains('&') {
            // Attribute rules: `&amp=` and `&copyx` stay literal.
            let decoded = htmlize::unescape_attribute(value.as_str());
            return Ok(Some(decoded.into_owned()));
        }
        Ok(Some(value))
    }

    /// Consumes `expected` if the input starts with it, ignoring ASCII case.
    /// A mismatching byte is left unread.
    fn eat_ignore_case(&mut self, expected: &str) -> io::Result<bool> {
        for want in expected.bytes() {
            match self.peek()? {
                Some(b) if b.to_ascii_lowercase() == want => self.bump(),
                _ => return Ok(false),
            }
        }
        Ok(true)
    }

    fn skip_whitespace(&mut self) -> io::Result<()> {
        self.scan(None, |b| !is_space(b))?;
        Ok(())
    }

    fn skip_past(&mut self, stop: u8) -> io::Result<()> {
        if self.scan(None, |b| b == stop)? {
            self.bump();
        }
        Ok(())
    }

    /// Consumes bytes up to, not including, the first one matching `stop`,
    /// appending them to `out` if given. Returns `false` at end of input.
    fn scan(
        &mut self,
        mut out: Option<&mut Vec<u8>>,
        stop: impl Fn(u8) -> bool,
    ) -> io::Result<bool> {
        loop {
            let (consumed, found) = {
                let buf = self.fill()?;
                if buf.is_empty() {
                    return Ok(false);
                }
                let (consumed, found) = match buf.iter().position(|&b| stop(b)) {
                    Some(i) => (i, true),
                    None => (buf.len(), false),
                };
                if let Some(out) = out.as_deref_mut() {
                    out.extend_from_slice(&buf[..consumed]);
                }
                (consumed, found)
            };
            self.reader.consume(consumed);
            if found {
                return Ok(true);
            }
        }
    }

    fn fill(&mut self) -> io::Result<&[u8]> {
        loop {
            match self.reader.fill_buf() {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
                Ok(_) => break,
            }
        }
        self.reader.fill_buf()
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        Ok(self.fill()?.first().copied())
    }

    fn bump(&mut self) {
        self.reader.consume(1);
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.bump();
        }
        Ok(byte)
    }
}

impl<R: BufRead> Iterator for Tokenizer<R> {
    type Item = io::Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> FusedIterator for Tokenizer<R> {}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c')
}

fn bytes_to_string(raw: Vec<u8>) -> String {
    String::from_utf8(raw)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}
