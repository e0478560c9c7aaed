//! Catalogue queries over the server's system documents.
use std::io::{Read, Write};

use super::Connection;
use crate::{Result, protocol::ResultFormat};

impl<S: Read + Write> Connection<S> {
    pub fn documents(&mut self) -> Result<Vec<String>> {
        self.list_metadata("$documents")
    }

    pub fn collections(&mut self) -> Result<Vec<String>> {
        self.list_metadata("$collections")
    }

    pub fn modules(&mut self) -> Result<Vec<String>> {
        self.list_metadata("$modules")
    }

    pub fn indexes(&mut self) -> Result<Vec<String>> {
        self.list_metadata("$indexes")
    }

    pub fn schema(&mut self) -> Result<Vec<String>> {
        self.list_metadata("$schema")
    }

    /// Descriptive schema of a document or collection, as XML.
    pub fn schema_of(&mut self, name: &str) -> Result<String> {
        self.system_document(&format!("$schema_{name}"))
    }

    pub fn document_stats(&mut self, name: &str) -> Result<String> {
        self.system_document(&format!("$document_{name}"))
    }

    pub fn collection_stats(&mut self, name: &str) -> Result<String> {
        self.system_document(&format!("$collection_{name}"))
    }

    fn system_document(&mut self, name: &str) -> Result<String> {
        let query = format!("doc(\"{}\")", name.replace('"', "\"\""));
        self.execute(&query, ResultFormat::Xml)?.value()
    }

    fn list_metadata(&mut self, name: &str) -> Result<Vec<String>> {
        let listing = self.system_document(name)?;
        Ok(child_names(&listing))
    }
}

/// `name` attributes of the root element's direct children.
fn child_names(xml: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut rest = xml;

    while let Some(start) = rest.find('<') {
        rest = &rest[start..];

        if let Some(skipped) = skip_markup(rest, "<!--", "-->")
            .or_else(|| skip_markup(rest, "<![CDATA[", "]]>"))
        {
            rest = skipped;
            continue;
        }

        let Some(end) = tag_end(rest) else {
            break;
        };
        let tag = &rest[1..end];
        rest = &rest[end + 1..];

        if tag.starts_with('?') || tag.starts_with('!') {
            continue;
        }
        if tag.starts_with('/') {
            depth = depth.saturating_sub(1);
            continue;
        }

        if depth == 1 {
            if let Some(name) = attribute(tag, "name") {
                names.push(name);
            }
        }
        if !tag.ends_with('/') {
            depth += 1;
        }
    }
    names
}

/// Text after a `open ... close` section at the start of `s`.
fn skip_markup<'a>(s: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let body = s.strip_prefix(open)?;
    Some(body.find(close).map_or("", |end| &body[end + close.len()..]))
}

/// Offset of the `>` closing the tag at the start of `s`, ignoring any
/// inside quoted attribute values.
fn tag_end(s: &str) -> Option<usize> {
    let mut quote = None;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '>') => return Some(i),
            _ => {}
        }
    }
    None
}

fn attribute(tag: &str, name: &str) -> Option<String> {
    let mut rest = tag.trim_start_matches(|c: char| !c.is_whitespace());
    loop {
        rest = rest.trim_start();
        let eq = rest.find('=')?;
        let key = rest[..eq].trim();
        let value = rest[eq + 1..].trim_start();

        let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        let end = value[1..].find(quote)? + 1;
        if key == name {
            return Some(unescape(&value[1..end]));
        }
        rest = &value[end + 1..];
    }
}

/// Expand the predefined entities and character references.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .and_then(|semi| entity(&rest[1..semi]).map(|c| (c, semi)));
        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = match name.strip_prefix("#x") {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => name.strip_prefix('#')?.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
