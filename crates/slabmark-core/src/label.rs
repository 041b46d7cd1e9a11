/// Normalises a link label for reference lookup: surrounding whitespace is
/// dropped, inner whitespace runs collapse to one space and the text is
/// case-folded.
pub(crate) fn normalize_link_label(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for word in label.split_ascii_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    // Case folding maps ß to "ss"; `to_lowercase` alone does not.
    out.to_lowercase().replace('ß', "ss")
}

/// Scans a link label body starting just after `[`. Returns the index of
/// the closing `]`. Labels may not contain unescaped brackets and are
/// limited to 999 characters.
pub(crate) fn scan_link_label(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if i + 1 < bytes.len() && bytes[i + 1].is_ascii_punctuation() => i += 2,
            b'[' => return None,
            b']' => {
                if i - start > 999 {
                    return None;
                }
                return Some(i);
            }
            _ => i += 1,
        }
    }
    None
}
