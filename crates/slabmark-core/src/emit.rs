use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use ammonia::Builder;

use crate::arena::NodeArena;
use crate::ast::{BlockId, BlockKind, InlineKind, InlineRange, ListKind};
use crate::config::{HtmlEmitOptions, SoftBreak};

/// Emits HTML for the block tree rooted at `root`.
pub fn emit_html(arena: &NodeArena, root: BlockId, options: &HtmlEmitOptions) -> String {
    let mut writer = HtmlWriter {
        arena,
        options,
        out: String::new(),
    };
    writer.block(root, false);
    if options.sanitize {
        sanitize_html(&writer.out)
    } else {
        writer.out
    }
}

/// Cleans emitted HTML against an allow-list of the tags the renderer
/// produces. Raw HTML from the source is dropped or neutralised.
pub(crate) fn sanitize_html(raw_html: &str) -> String {
    let tags: HashSet<&'static str> = [
        "a",
        "blockquote",
        "br",
        "code",
        "em",
        "h1",
        "h2",
        "h3",
        "h4",
        "h5",
        "h6",
        "hr",
        "img",
        "li",
        "ol",
        "p",
        "pre",
        "strong",
        "ul",
    ]
    .into_iter()
    .collect();

    let mut tag_attributes: HashMap<&'static str, HashSet<&'static str>> = HashMap::new();
    tag_attributes.insert("a", ["href", "title"].into_iter().collect());
    tag_attributes.insert("img", ["src", "alt", "title"].into_iter().collect());
    tag_attributes.insert("ol", ["start"].into_iter().collect());
    tag_attributes.insert("code", ["class"].into_iter().collect());

    Builder::new()
        .tags(tags)
        .generic_attributes(HashSet::<&str>::new())
        .tag_attributes(tag_attributes)
        .link_rel(None)
        .clean(raw_html)
        .to_string()
}

struct HtmlWriter<'a> {
    arena: &'a NodeArena,
    options: &'a HtmlEmitOptions,
    out: String,
}

impl HtmlWriter<'_> {
    /// Starts a new line unless the output already ends with one.
    fn cr(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn children(&mut self, id: BlockId, tight: bool) {
        let arena = self.arena;
        for child in arena.children(id) {
            self.block(child, tight);
        }
    }

    fn block(&mut self, id: BlockId, tight: bool) {
        let arena = self.arena;
        let block = arena.block(id);
        match block.kind {
            BlockKind::Document => self.children(id, false),
            BlockKind::BlockQuote => {
                self.cr();
                self.out.push_str("<blockquote>\n");
                self.children(id, false);
                self.cr();
                self.out.push_str("</blockquote>\n");
            }
            BlockKind::List(data) => {
                self.cr();
                let tag = match data.kind {
                    ListKind::Bullet => "ul",
                    ListKind::Ordered => "ol",
                };
                if data.is_ordered() && data.start != 1 {
                    let _ = writeln!(self.out, "<ol start=\"{}\">", data.start);
                } else {
                    let _ = writeln!(self.out, "<{tag}>");
                }
                for item in arena.children(id) {
                    self.cr();
                    self.out.push_str("<li>");
                    self.children(item, data.tight);
                    self.out.push_str("</li>\n");
                }
                self.cr();
                let _ = writeln!(self.out, "</{tag}>");
            }
            BlockKind::ListItem(_) => self.children(id, tight),
            BlockKind::Paragraph if tight => self.inlines(block.inlines),
            BlockKind::Paragraph => {
                self.cr();
                self.out.push_str("<p>");
                self.inlines(block.inlines);
                self.out.push_str("</p>\n");
            }
            BlockKind::Heading { level, .. } => {
                self.cr();
                let _ = write!(self.out, "<h{level}>");
                self.inlines(block.inlines);
                let _ = writeln!(self.out, "</h{level}>");
            }
            BlockKind::CodeBlock(data) => {
                self.cr();
                self.out.push_str("<pre><code");
                let info = arena.text(data.info);
                if let Some(lang) = info.split_ascii_whitespace().next() {
                    self.out.push_str(" class=\"language-");
                    push_escaped(&mut self.out, lang);
                    self.out.push('"');
                }
                self.out.push('>');
                push_escaped(&mut self.out, arena.text(block.content));
                self.out.push_str("</code></pre>\n");
            }
            BlockKind::HtmlBlock(_) => {
                self.cr();
                self.out.push_str(arena.text(block.content));
                self.cr();
            }
            BlockKind::ThematicBreak => {
                self.cr();
                self.out.push_str("<hr />\n");
            }
        }
    }

    fn inlines(&mut self, range: InlineRange) {
        let arena = self.arena;
        for inline in arena.inlines(range) {
            match inline.kind {
                InlineKind::Text(span) => push_escaped(&mut self.out, arena.text(span)),
                InlineKind::CodeSpan(span) => {
                    self.out.push_str("<code>");
                    push_escaped(&mut self.out, arena.text(span));
                    self.out.push_str("</code>");
                }
                InlineKind::RawHtml(span) => self.out.push_str(arena.text(span)),
                InlineKind::LineBreak { hard: true } => self.out.push_str("<br />\n"),
                InlineKind::LineBreak { hard: false } => match self.options.soft_break {
                    SoftBreak::Newline => self.out.push('\n'),
                    SoftBreak::Space => self.out.push(' '),
                },
                InlineKind::Emphasis { strength } => {
                    let tag = if strength >= 2 { "strong" } else { "em" };
                    let _ = write!(self.out, "<{tag}>");
                    self.inlines(inline.children);
                    let _ = write!(self.out, "</{tag}>");
                }
                InlineKind::Link { destination, title } => {
                    self.out.push_str("<a href=\"");
                    push_escaped_href(&mut self.out, arena.text(destination));
                    self.out.push('"');
                    if let Some(title) = title {
                        self.out.push_str(" title=\"");
                        push_escaped(&mut self.out, arena.text(title));
                        self.out.push('"');
                    }
                    self.out.push('>');
                    self.inlines(inline.children);
                    self.out.push_str("</a>");
                }
                InlineKind::Image { destination, title } => {
                    self.out.push_str("<img src=\"");
                    push_escaped_href(&mut self.out, arena.text(destination));
                    self.out.push_str("\" alt=\"");
                    let mut alt = String::new();
                    plain_text(arena, inline.children, &mut alt);
                    push_escaped(&mut self.out, &alt);
                    self.out.push('"');
                    if let Some(title) = title {
                        self.out.push_str(" title=\"");
                        push_escaped(&mut self.out, arena.text(title));
                        self.out.push('"');
                    }
                    self.out.push_str(" />");
                }
            }
        }
    }
}

/// Flattens inlines to their text, as used for image alt attributes.
fn plain_text(arena: &NodeArena, range: InlineRange, out: &mut String) {
    for inline in arena.inlines(range) {
        match inline.kind {
            InlineKind::Text(span) | InlineKind::CodeSpan(span) | InlineKind::RawHtml(span) => {
                out.push_str(arena.text(span));
            }
            InlineKind::LineBreak { .. } => out.push(' '),
            InlineKind::Emphasis { .. } | InlineKind::Link { .. } | InlineKind::Image { .. } => {
                plain_text(arena, inline.children, out);
            }
        }
    }
}

/// Escapes `&`, `<`, `>` and `"` for text and attribute values.
pub(crate) fn push_escaped(out: &mut String, text: &str) {
    let mut last = 0;
    for (idx, byte) in text.bytes().enumerate() {
        let replacement = match byte {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            _ => continue,
        };
        out.push_str(&text[last..idx]);
        out.push_str(replacement);
        last = idx + 1;
    }
    out.push_str(&text[last..]);
}

/// Percent-encodes a link destination for an `href`/`src` attribute,
/// leaving existing escapes and URL punctuation intact.
pub(crate) fn push_escaped_href(out: &mut String, url: &str) {
    for byte in url.bytes() {
        match byte {
            b'&' => out.push_str("&amp;"),
            b'\'' => out.push_str("&#x27;"),
            b if b.is_ascii_alphanumeric() || b"-_.+!*(),%#@?=;:/$~".contains(&b) => {
                out.push(b as char);
            }
            _ => {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EngineConfig, markdown_to_html, markdown_to_html_with};

    fn escaped(text: &str) -> String {
        let mut out = String::new();
        push_escaped(&mut out, text);
        out
    }

    fn href(url: &str) -> String {
        let mut out = String::new();
        push_escaped_href(&mut out, url);
        out
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(escaped("a < b && \"c\" > d"), "a &lt; b &amp;&amp; &quot;c&quot; &gt; d");
        assert_eq!(escaped("plain"), "plain");
    }

    #[test]
    fn percent_encodes_destinations() {
        assert_eq!(href("/a b"), "/a%20b");
        assert_eq!(href("foo%20b\u{e4}"), "foo%20b%C3%A4");
        assert_eq!(href("a\\b[c]"), "a%5Cb%5Bc%5D");
        assert_eq!(href("?q=1&r='x'"), "?q=1&amp;r=&#x27;x&#x27;");
        assert_eq!(href("\"x\""), "%22x%22");
    }

    #[test]
    fn tight_list_items_skip_paragraph_tags() {
        assert_eq!(
            markdown_to_html("- a\n- b\n"),
            "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n"
        );
    }

    #[test]
    fn loose_list_items_wrap_paragraphs() {
        assert_eq!(
            markdown_to_html("- a\n\n- b\n"),
            "<ul>\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn nested_list_breaks_after_tight_paragraph() {
        assert_eq!(
            markdown_to_html("- a\n  - b\n"),
            "<ul>\n<li>a\n<ul>\n<li>b</li>\n</ul>\n</li>\n</ul>\n"
        );
    }

    #[test]
    fn ordered_list_start_attribute() {
        assert_eq!(markdown_to_html("3. x\n"), "<ol start=\"3\">\n<li>x</li>\n</ol>\n");
        assert_eq!(markdown_to_html("1. x\n"), "<ol>\n<li>x</li>\n</ol>\n");
    }

    #[test]
    fn code_block_language_is_first_info_word() {
        assert_eq!(
            markdown_to_html("```rust ignore\nlet a = 1 < 2;\n```\n"),
            "<pre><code class=\"language-rust\">let a = 1 &lt; 2;\n</code></pre>\n"
        );
        assert_eq!(markdown_to_html("    x\n"), "<pre><code>x\n</code></pre>\n");
    }

    #[test]
    fn blocks_are_separated_by_one_newline() {
        assert_eq!(
            markdown_to_html("# H\n\n> q\n\n***\n<div>\nraw\n</div>\n"),
            "<h1>H</h1>\n<blockquote>\n<p>q</p>\n</blockquote>\n<hr />\n<div>\nraw\n</div>\n"
        );
    }

    #[test]
    fn inline_markup() {
        assert_eq!(
            markdown_to_html("*a* **b** `c` [d](/e \"t\") ![f *g*](/h)\ni  \nj"),
            "<p><em>a</em> <strong>b</strong> <code>c</code> <a href=\"/e\" title=\"t\">d</a> \
             <img src=\"/h\" alt=\"f g\" />\ni<br />\nj</p>\n"
        );
    }

    #[test]
    fn soft_break_as_space() {
        let mut config = EngineConfig::default();
        config.emit.soft_break = SoftBreak::Space;
        assert_eq!(markdown_to_html_with("a\nb", &config), "<p>a b</p>\n");
    }

    #[test]
    fn sanitize_drops_raw_script() {
        let mut config = EngineConfig::default();
        config.emit.sanitize = true;
        let html = markdown_to_html_with("<script>alert(1)</script>\n\n*ok*", &config);
        assert!(!html.contains("script"));
        assert!(html.contains("<em>ok</em>"));
    }
}
