//! Raw HTML recognition for HTML blocks and inline HTML.

use crate::ast::HtmlBlockKind;

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "base",
    "basefont",
    "blockquote",
    "body",
    "caption",
    "center",
    "col",
    "colgroup",
    "dd",
    "details",
    "dialog",
    "dir",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "frame",
    "frameset",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "head",
    "header",
    "hr",
    "html",
    "iframe",
    "legend",
    "li",
    "link",
    "main",
    "menu",
    "menuitem",
    "nav",
    "noframes",
    "ol",
    "optgroup",
    "option",
    "p",
    "param",
    "search",
    "section",
    "summary",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "title",
    "tr",
    "track",
    "ul",
];

const RAW_TAGS: &[&str] = &["pre", "script", "style", "textarea"];

struct TagName<'a> {
    name: &'a str,
    after: usize,
    closing: bool,
}

fn scan_tag_name(text: &str) -> Option<TagName<'_>> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }
    let mut idx = 1;
    let closing = bytes.get(idx) == Some(&b'/');
    if closing {
        idx += 1;
    }
    if !bytes.get(idx)?.is_ascii_alphabetic() {
        return None;
    }
    let start = idx;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'-') {
        idx += 1;
    }
    Some(TagName {
        name: &text[start..idx],
        after: idx,
        closing,
    })
}

fn is_tag_boundary(bytes: &[u8], idx: usize) -> bool {
    match bytes.get(idx) {
        None => true,
        Some(b) => b.is_ascii_whitespace() || *b == b'>',
    }
}

/// Classifies a line (indentation already removed) as an HTML block start.
/// `allow_other_tag` gates kind 7, which may not interrupt a paragraph.
pub(crate) fn html_block_start(text: &str, allow_other_tag: bool) -> Option<HtmlBlockKind> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'<') {
        return None;
    }
    if let Some(tag) = scan_tag_name(text)
        && !tag.closing
        && is_tag_boundary(bytes, tag.after)
        && let Some(raw) = RAW_TAGS
            .iter()
            .find(|name| tag.name.eq_ignore_ascii_case(name))
    {
        return Some(HtmlBlockKind::Raw(*raw));
    }
    if text.starts_with("<!--") {
        return Some(HtmlBlockKind::Comment);
    }
    if text.starts_with("<?") {
        return Some(HtmlBlockKind::ProcessingInstruction);
    }
    if text.starts_with("<![CDATA[") {
        return Some(HtmlBlockKind::Cdata);
    }
    if text.starts_with("<!") && bytes.get(2).is_some_and(u8::is_ascii_alphabetic) {
        return Some(HtmlBlockKind::Declaration);
    }
    if let Some(tag) = scan_tag_name(text) {
        let boundary = is_tag_boundary(bytes, tag.after)
            || (bytes.get(tag.after) == Some(&b'/') && bytes.get(tag.after + 1) == Some(&b'>'));
        if boundary && BLOCK_TAGS.iter().any(|name| tag.name.eq_ignore_ascii_case(name)) {
            return Some(HtmlBlockKind::BlockTag);
        }
        if !allow_other_tag || RAW_TAGS.iter().any(|name| tag.name.eq_ignore_ascii_case(name)) {
            return None;
        }
        let end = scan_html_tag(bytes, 0)?;
        if bytes[end..].iter().all(|b| b.is_ascii_whitespace()) {
            return Some(HtmlBlockKind::OtherTag);
        }
    }
    None
}

/// True when `line` satisfies the end condition of `kind`. Kinds 6 and 7
/// end at a blank line instead, which the block parser handles.
pub(crate) fn html_block_end(kind: HtmlBlockKind, line: &str) -> bool {
    match kind {
        HtmlBlockKind::Raw(tag) => {
            let lowered = line.to_ascii_lowercase();
            lowered.contains(&format!("</{tag}>"))
        }
        HtmlBlockKind::Comment => line.contains("-->"),
        HtmlBlockKind::ProcessingInstruction => line.contains("?>"),
        HtmlBlockKind::Declaration => line.contains('>'),
        HtmlBlockKind::Cdata => line.contains("]]>"),
        HtmlBlockKind::BlockTag | HtmlBlockKind::OtherTag => false,
    }
}

fn is_attr_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':'
}

fn is_attr_name_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b':' | b'.' | b'-')
}

/// Scans an open or closing tag at `start`. Returns the index just past `>`.
pub(crate) fn scan_html_tag(bytes: &[u8], start: usize) -> Option<usize> {
    let end = bytes.len();
    if bytes.get(start) != Some(&b'<') {
        return None;
    }
    let mut i = start + 1;
    let closing = bytes.get(i) == Some(&b'/');
    if closing {
        i += 1;
    }
    if !bytes.get(i)?.is_ascii_alphabetic() {
        return None;
    }
    while i < end && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'-') {
        i += 1;
    }
    if closing {
        while i < end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        return (bytes.get(i) == Some(&b'>')).then_some(i + 1);
    }
    loop {
        let ws_start = i;
        while i < end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match *bytes.get(i)? {
            b'>' => return Some(i + 1),
            b'/' => return (bytes.get(i + 1) == Some(&b'>')).then_some(i + 2),
            b if is_attr_name_start(b) && i > ws_start => {}
            _ => return None,
        }
        while i < end && is_attr_name_continue(bytes[i]) {
            i += 1;
        }
        let mut ws = i;
        while ws < end && bytes[ws].is_ascii_whitespace() {
            ws += 1;
        }
        if bytes.get(ws) != Some(&b'=') {
            continue;
        }
        i = ws + 1;
        while i < end && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match *bytes.get(i)? {
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < end && bytes[i] != quote {
                    i += 1;
                }
                if i >= end {
                    return None;
                }
                i += 1;
            }
            _ => {
                let value_start = i;
                while i < end
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'"' | b'\'' | b'=' | b'<' | b'>' | b'`')
                {
                    i += 1;
                }
                if i == value_start {
                    return None;
                }
            }
        }
    }
}

/// Scans inline raw HTML at `start`: a tag, comment, processing
/// instruction, declaration or CDATA section. Returns the index past it.
pub(crate) fn scan_inline_html(bytes: &[u8], start: usize) -> Option<usize> {
    let rest = bytes.get(start..)?;
    if rest.starts_with(b"<!--") {
        if rest.starts_with(b"<!-->") {
            return Some(start + 5);
        }
        if rest.starts_with(b"<!--->") {
            return Some(start + 6);
        }
        return find(rest, 4, b"-->").map(|idx| start + idx + 3);
    }
    if rest.starts_with(b"<![CDATA[") {
        return find(rest, 9, b"]]>").map(|idx| start + idx + 3);
    }
    if rest.starts_with(b"<?") {
        return find(rest, 2, b"?>").map(|idx| start + idx + 2);
    }
    if rest.starts_with(b"<!") {
        if !rest.get(2)?.is_ascii_alphabetic() {
            return None;
        }
        return find(rest, 2, b">").map(|idx| start + idx + 1);
    }
    scan_html_tag(bytes, start)
}

fn find(haystack: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|idx| idx + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_block_starts() {
        assert_eq!(
            html_block_start("<pre class=\"x\">", true),
            Some(HtmlBlockKind::Raw("pre"))
        );
        assert_eq!(html_block_start("<!-- c", true), Some(HtmlBlockKind::Comment));
        assert_eq!(html_block_start("<DIV>", true), Some(HtmlBlockKind::BlockTag));
        assert_eq!(html_block_start("</table>", true), Some(HtmlBlockKind::BlockTag));
        assert_eq!(html_block_start("<custom a=\"1\">", true), Some(HtmlBlockKind::OtherTag));
        assert_eq!(html_block_start("<custom a=\"1\">", false), None);
        assert_eq!(html_block_start("<span>text", true), None);
        assert_eq!(html_block_start("<divx", true), None);
    }

    #[test]
    fn raw_block_ends_at_closing_tag() {
        assert!(html_block_end(HtmlBlockKind::Raw("script"), "x</SCRIPT> y"));
        assert!(!html_block_end(HtmlBlockKind::Raw("script"), "</style>"));
        assert!(!html_block_end(HtmlBlockKind::BlockTag, "</div>"));
    }

    #[test]
    fn scans_tags_and_attributes() {
        let scan = |text: &str| scan_html_tag(text.as_bytes(), 0);
        assert_eq!(scan("<a href=\"x\">rest"), Some(12));
        assert_eq!(scan("<br/>"), Some(5));
        assert_eq!(scan("<img src=x alt='y' />"), Some(21));
        assert_eq!(scan("</a >"), Some(5));
        assert_eq!(scan("<a href=\"x>"), None);
        assert_eq!(scan("<a b=>"), None);
        assert_eq!(scan("<a\"b\">"), None);
    }

    #[test]
    fn scans_inline_constructs() {
        let scan = |text: &str| scan_inline_html(text.as_bytes(), 0);
        assert_eq!(scan("<!-- c -->x"), Some(10));
        assert_eq!(scan("<!-->"), Some(5));
        assert_eq!(scan("<?php ?>"), Some(8));
        assert_eq!(scan("<!DOCTYPE html>"), Some(15));
        assert_eq!(scan("<![CDATA[x]]>"), Some(13));
        assert_eq!(scan("<!-- open"), None);
    }
}
