//! Line codec for the reader history file.
//!
//! The codec is a surgical editor, not a serializer. [`parse`] extracts the
//! `[/path]` / `page=N` pairs into a [`Snapshot`]; [`render`] replays the
//! original bytes and rewrites only the page lines whose scope carries a
//! different value in the snapshot. Comments, blank lines and anything it
//! does not recognise pass through untouched, including lines that are not
//! valid UTF-8.
//!
//! Both directions share one [`Scanner`], so a page line is bound to a scope
//! by exactly the same rule when reading and when writing.

use super::{Record, Snapshot};

/// One classified input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Line<'a> {
    Blank,
    Comment,
    /// `[/path]`, carrying the path without the brackets.
    Header(&'a str),
    /// `page=<digits>`
    Page(u32),
    Opaque,
}

impl<'a> Line<'a> {
    pub(crate) fn classify(line: &'a [u8]) -> Self {
        if line.is_empty() {
            return Line::Blank;
        }
        if line.starts_with(b"#") {
            return Line::Comment;
        }
        // Keys are strings; a line that isn't UTF-8 can only be payload
        let Ok(line) = std::str::from_utf8(line) else {
            return Line::Opaque;
        };
        if let Some(key) = header_key(line) {
            return Line::Header(key);
        }
        match page_value(line) {
            Some(page) => Line::Page(page),
            None => Line::Opaque,
        }
    }
}

fn header_key(line: &str) -> Option<&str> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    inner.starts_with('/').then_some(inner)
}

fn page_value(line: &str) -> Option<u32> {
    let digits = line.strip_prefix("page=")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Values past u32::MAX degrade to opaque payload like any other malformed line
    digits.parse().ok()
}

/// Split on `\n`, dropping one trailing `\r` per line. A final newline does
/// not start an extra empty line.
pub(crate) fn lines(text: &[u8]) -> impl Iterator<Item = &[u8]> {
    let body = text.strip_suffix(b"\n").unwrap_or(text);
    (!text.is_empty())
        .then(|| body.split(|&b| b == b'\n'))
        .into_iter()
        .flatten()
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}

/// Scope tracker: a header opens a scope, the first page line after it
/// closes it again.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) enum Scanner<'a> {
    #[default]
    Outside,
    AwaitingPage(&'a str),
}

impl<'a> Scanner<'a> {
    /// Advance over one line. Returns the scope key when `line` is a page
    /// line that claims the open scope.
    pub(crate) fn step(&mut self, line: Line<'a>) -> Option<&'a str> {
        match line {
            Line::Header(key) => {
                *self = Scanner::AwaitingPage(key);
                None
            }
            Line::Page(_) => match std::mem::take(self) {
                Scanner::AwaitingPage(key) => Some(key),
                Scanner::Outside => None,
            },
            Line::Blank | Line::Comment | Line::Opaque => None,
        }
    }
}

/// Build the key -> record mapping for a history file's contents.
///
/// Never fails: anything outside the grammar is opaque. When a key appears
/// under several headers, the last captured page wins.
pub fn parse(text: &[u8]) -> Snapshot {
    let mut snapshot = Snapshot::new();
    let mut scanner = Scanner::default();

    for raw in lines(text) {
        let line = Line::classify(raw);
        if let (Some(key), Line::Page(page)) = (scanner.step(line), line) {
            snapshot.insert(key.to_string(), Record::new(page));
        }
    }

    snapshot
}

/// Re-emit `original` with page values taken from `snapshot`.
///
/// Every line is newline-terminated on output. A page line is rewritten only
/// when its scope is in `snapshot` and the stored value differs, so rendering
/// against the file's own snapshot reproduces it byte for byte.
pub fn render(original: &[u8], snapshot: &Snapshot) -> Vec<u8> {
    let mut out = Vec::with_capacity(original.len() + 1);
    let mut scanner = Scanner::default();

    for raw in lines(original) {
        let line = Line::classify(raw);
        match (scanner.step(line), line) {
            (Some(key), Line::Page(current)) => match snapshot.get(key) {
                Some(record) if record.page != current => {
                    out.extend_from_slice(b"page=");
                    out.extend_from_slice(record.page.to_string().as_bytes());
                }
                _ => out.extend_from_slice(raw),
            },
            _ => out.extend_from_slice(raw),
        }
        out.push(b'\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HISTORY: &[u8] = b"# history\n[/books/a.pdf]\npage=3\n[/books/b.pdf]\npage=10\n";

    fn snapshot_of(entries: &[(&str, u32)]) -> Snapshot {
        entries
            .iter()
            .map(|(k, p)| (k.to_string(), Record::new(*p)))
            .collect()
    }

    #[test]
    fn test_classify_lines() {
        assert_eq!(Line::classify(b""), Line::Blank);
        assert_eq!(Line::classify(b"# [/x]"), Line::Comment);
        assert_eq!(Line::classify(b"# caf\xE9"), Line::Comment);
        assert_eq!(Line::classify(b"[/books/a.pdf]"), Line::Header("/books/a.pdf"));
        assert_eq!(Line::classify(b"[/]"), Line::Header("/"));
        assert_eq!(Line::classify(b"page=0"), Line::Page(0));
        assert_eq!(Line::classify(b"page=007"), Line::Page(7));
    }

    #[test]
    fn test_classify_malformed_as_opaque() {
        for line in [
            &b"[books/a.pdf]"[..],
            b"[/books/a.pdf",
            b"[/",
            b" [/a]",
            b"page=",
            b"page=-1",
            b"page=+1",
            b"page=12a",
            b"page= 12",
            b"page=99999999999",
            b"Page=1",
            b"zoom=1.5",
            b" ",
            b"[/caf\xE9.pdf]",
            b"note=caf\xE9",
        ] {
            assert_eq!(Line::classify(line), Line::Opaque, "line {line:?}");
        }
    }

    #[test]
    fn test_lines_split() {
        fn split(text: &[u8]) -> Vec<&[u8]> {
            lines(text).collect()
        }
        assert!(split(b"").is_empty());
        assert_eq!(split(b"\n"), vec![&b""[..]]);
        assert_eq!(split(b"a\nb"), vec![&b"a"[..], b"b"]);
        assert_eq!(split(b"a\r\n\r\nb\n"), vec![&b"a"[..], b"", b"b"]);
        assert_eq!(split(b"a\rb\n"), vec![&b"a\rb"[..]]);
    }

    #[test]
    fn test_scanner_consumes_one_page_per_header() {
        let mut scanner = Scanner::default();
        assert_eq!(scanner.step(Line::Header("/a")), None);
        assert_eq!(scanner, Scanner::AwaitingPage("/a"));
        assert_eq!(scanner.step(Line::Opaque), None);
        assert_eq!(scanner, Scanner::AwaitingPage("/a"));
        assert_eq!(scanner.step(Line::Page(1)), Some("/a"));
        assert_eq!(scanner, Scanner::Outside);
        assert_eq!(scanner.step(Line::Page(2)), None);
    }

    #[test]
    fn test_scanner_header_replaces_open_scope() {
        let mut scanner = Scanner::default();
        scanner.step(Line::Header("/a"));
        scanner.step(Line::Header("/b"));
        assert_eq!(scanner.step(Line::Page(4)), Some("/b"));
    }

    #[test]
    fn test_parse_basic() {
        let snapshot = parse(HISTORY);
        assert_eq!(snapshot, snapshot_of(&[("/books/a.pdf", 3), ("/books/b.pdf", 10)]));
    }

    #[test]
    fn test_parse_skips_opaque_between_header_and_page() {
        let text = b"[/a]\nfirst=1\n\n# note\nnote=caf\xE9\nzoom=100\npage=12\n";
        assert_eq!(parse(text), snapshot_of(&[("/a", 12)]));
    }

    #[test]
    fn test_parse_edge_cases() {
        // page before any header, header without page, second page line ignored
        let text = b"page=1\n[/lonely]\n[/a]\npage=2\npage=9\n";
        assert_eq!(parse(text), snapshot_of(&[("/a", 2)]));
    }

    #[test]
    fn test_parse_duplicate_header_last_wins() {
        let text = b"[/a]\npage=1\n[/a]\npage=5\n";
        assert_eq!(parse(text), snapshot_of(&[("/a", 5)]));
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse(b"").is_empty());
        assert!(parse(b"# nothing\n\n").is_empty());
    }

    #[test]
    fn test_parse_crlf() {
        let text = b"[/a]\r\npage=8\r\n";
        assert_eq!(parse(text), snapshot_of(&[("/a", 8)]));
    }

    #[test]
    fn test_render_roundtrip_identity() {
        let text: &[u8] =
            b"# history\n\n[/a]\nfirst=1\npage=007\npage=3\nnote=caf\xE9\nunknown trailer\n[/b]\n";
        assert_eq!(render(text, &parse(text)), text);
    }

    #[test]
    fn test_render_updates_single_scope() {
        let mut snapshot = parse(HISTORY);
        snapshot.insert("/books/b.pdf".to_string(), Record::new(42));

        let expected = b"# history\n[/books/a.pdf]\npage=3\n[/books/b.pdf]\npage=42\n";
        assert_eq!(render(HISTORY, &snapshot), expected);
    }

    #[test]
    fn test_render_keeps_non_utf8_bytes() {
        let text = b"[/a]\nnote=caf\xE9\npage=3\n\xFF\xFE\n";
        let snapshot = snapshot_of(&[("/a", 9)]);
        assert_eq!(render(text, &snapshot), b"[/a]\nnote=caf\xE9\npage=9\n\xFF\xFE\n");
    }

    #[test]
    fn test_render_ignores_keys_without_page_line() {
        let text = b"[/a]\nfirst=1\n";
        let snapshot = snapshot_of(&[("/a", 5), ("/new", 1)]);
        assert_eq!(render(text, &snapshot), text);
    }

    #[test]
    fn test_render_leaves_unmatched_scopes() {
        let text = b"page=1\n[/a]\npage=2\npage=3\n[/b]\npage=4\n";
        let snapshot = snapshot_of(&[("/a", 20)]);
        assert_eq!(
            render(text, &snapshot),
            b"page=1\n[/a]\npage=20\npage=3\n[/b]\npage=4\n"
        );
    }

    #[test]
    fn test_render_rewrites_every_duplicate_scope() {
        let text = b"[/a]\npage=1\n[/a]\npage=5\n";
        let snapshot = snapshot_of(&[("/a", 9)]);
        assert_eq!(render(text, &snapshot), b"[/a]\npage=9\n[/a]\npage=9\n");
    }

    #[test]
    fn test_render_normalizes_line_endings() {
        let text = b"[/a]\r\npage=8\r\nzoom=1";
        let snapshot = snapshot_of(&[("/a", 9)]);
        assert_eq!(render(text, &snapshot), b"[/a]\npage=9\nzoom=1\n");
    }
}
