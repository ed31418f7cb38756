//! Directory listing
//!
//! Renders a bare `<pre>` list of links, one per entry, sorted by name,
//! with directories marked by a trailing slash.

use std::io;
use std::path::Path;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters escaped in an href path segment. Unreserved characters and
/// the sub-delimiters that are legal in a path stay as they are.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b',')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'@');

/// One listed entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Entry {
    pub name: String,
    pub is_dir: bool,
}

impl Entry {
    fn display_name(&self) -> String {
        if self.is_dir {
            format!("{}/", self.name)
        } else {
            self.name.clone()
        }
    }

    fn href(&self) -> String {
        let name = self.display_name();
        let encoded = utf8_percent_encode(&name, PATH_SEGMENT).to_string();
        // A colon in the first segment would read as a URL scheme
        if encoded.contains(':') {
            format!("./{encoded}")
        } else {
            encoded
        }
    }
}

/// Read `dir` and return its entries sorted by name
pub async fn read_entries(dir: &Path) -> io::Result<Vec<Entry>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let is_dir = entry.file_type().await?.is_dir();
        entries.push(Entry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
        });
    }
    entries.sort();
    Ok(entries)
}

/// HTML page listing `entries`
pub fn render(entries: &[Entry]) -> String {
    let mut html = String::from(
        "<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n",
    );
    for entry in entries {
        html.push_str(&format!(
            "<a href=\"{}\">{}</a>\n",
            entry.href(),
            escape_html(&entry.display_name())
        ));
    }
    html.push_str("</pre>\n");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
