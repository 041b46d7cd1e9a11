//! Named character references.
//!
//! A subset of the HTML5 table: markup-significant names, Latin-1, common
//! typography and the names exercised by CommonMark examples. Unknown names
//! are left as literal text.

// Sorted by name (byte order) for binary search.
static ENTITIES: &[(&str, &str)] = &[
    ("AElig", "\u{00C6}"),
    ("Aacute", "\u{00C1}"),
    ("Acirc", "\u{00C2}"),
    ("Agrave", "\u{00C0}"),
    ("Alpha", "\u{0391}"),
    ("Aring", "\u{00C5}"),
    ("Atilde", "\u{00C3}"),
    ("Auml", "\u{00C4}"),
    ("Beta", "\u{0392}"),
    ("Ccedil", "\u{00C7}"),
    ("ClockwiseContourIntegral", "\u{2232}"),
    ("Dagger", "\u{2021}"),
    ("Dcaron", "\u{010E}"),
    ("Delta", "\u{0394}"),
    ("DifferentialD", "\u{2146}"),
    ("Eacute", "\u{00C9}"),
    ("Ecirc", "\u{00CA}"),
    ("Egrave", "\u{00C8}"),
    ("Euml", "\u{00CB}"),
    ("Gamma", "\u{0393}"),
    ("HilbertSpace", "\u{210B}"),
    ("Iacute", "\u{00CD}"),
    ("Icirc", "\u{00CE}"),
    ("Igrave", "\u{00CC}"),
    ("Iuml", "\u{00CF}"),
    ("Lambda", "\u{039B}"),
    ("Ntilde", "\u{00D1}"),
    ("Oacute", "\u{00D3}"),
    ("Ocirc", "\u{00D4}"),
    ("Ograve", "\u{00D2}"),
    ("Omega", "\u{03A9}"),
    ("Oslash", "\u{00D8}"),
    ("Otilde", "\u{00D5}"),
    ("Ouml", "\u{00D6}"),
    ("Phi", "\u{03A6}"),
    ("Pi", "\u{03A0}"),
    ("Prime", "\u{2033}"),
    ("Psi", "\u{03A8}"),
    ("Sigma", "\u{03A3}"),
    ("THORN", "\u{00DE}"),
    ("Theta", "\u{0398}"),
    ("Uacute", "\u{00DA}"),
    ("Ucirc", "\u{00DB}"),
    ("Ugrave", "\u{00D9}"),
    ("Uuml", "\u{00DC}"),
    ("Xi", "\u{039E}"),
    ("Yacute", "\u{00DD}"),
    ("aacute", "\u{00E1}"),
    ("acirc", "\u{00E2}"),
    ("acute", "\u{00B4}"),
    ("aelig", "\u{00E6}"),
    ("agrave", "\u{00E0}"),
    ("alpha", "\u{03B1}"),
    ("amp", "&"),
    ("apos", "'"),
    ("aring", "\u{00E5}"),
    ("atilde", "\u{00E3}"),
    ("auml", "\u{00E4}"),
    ("bdquo", "\u{201E}"),
    ("beta", "\u{03B2}"),
    ("brvbar", "\u{00A6}"),
    ("bull", "\u{2022}"),
    ("ccedil", "\u{00E7}"),
    ("cedil", "\u{00B8}"),
    ("cent", "\u{00A2}"),
    ("chi", "\u{03C7}"),
    ("copy", "\u{00A9}"),
    ("curren", "\u{00A4}"),
    ("dagger", "\u{2020}"),
    ("darr", "\u{2193}"),
    ("deg", "\u{00B0}"),
    ("delta", "\u{03B4}"),
    ("divide", "\u{00F7}"),
    ("eacute", "\u{00E9}"),
    ("ecirc", "\u{00EA}"),
    ("egrave", "\u{00E8}"),
    ("emsp", "\u{2003}"),
    ("ensp", "\u{2002}"),
    ("epsilon", "\u{03B5}"),
    ("eta", "\u{03B7}"),
    ("eth", "\u{00F0}"),
    ("euml", "\u{00EB}"),
    ("euro", "\u{20AC}"),
    ("frac12", "\u{00BD}"),
    ("frac14", "\u{00BC}"),
    ("frac34", "\u{00BE}"),
    ("gamma", "\u{03B3}"),
    ("ge", "\u{2265}"),
    ("gt", ">"),
    ("harr", "\u{2194}"),
    ("hellip", "\u{2026}"),
    ("iacute", "\u{00ED}"),
    ("icirc", "\u{00EE}"),
    ("iexcl", "\u{00A1}"),
    ("igrave", "\u{00EC}"),
    ("infin", "\u{221E}"),
    ("iota", "\u{03B9}"),
    ("iquest", "\u{00BF}"),
    ("iuml", "\u{00EF}"),
    ("kappa", "\u{03BA}"),
    ("lambda", "\u{03BB}"),
    ("laquo", "\u{00AB}"),
    ("larr", "\u{2190}"),
    ("ldquo", "\u{201C}"),
    ("le", "\u{2264}"),
    ("lsaquo", "\u{2039}"),
    ("lsquo", "\u{2018}"),
    ("lt", "<"),
    ("macr", "\u{00AF}"),
    ("mdash", "\u{2014}"),
    ("micro", "\u{00B5}"),
    ("middot", "\u{00B7}"),
    ("minus", "\u{2212}"),
    ("mu", "\u{03BC}"),
    ("nbsp", "\u{00A0}"),
    ("ndash", "\u{2013}"),
    ("ne", "\u{2260}"),
    ("ngE", "\u{2267}\u{0338}"),
    ("not", "\u{00AC}"),
    ("ntilde", "\u{00F1}"),
    ("nu", "\u{03BD}"),
    ("oacute", "\u{00F3}"),
    ("ocirc", "\u{00F4}"),
    ("ograve", "\u{00F2}"),
    ("omega", "\u{03C9}"),
    ("ordf", "\u{00AA}"),
    ("ordm", "\u{00BA}"),
    ("oslash", "\u{00F8}"),
    ("otilde", "\u{00F5}"),
    ("ouml", "\u{00F6}"),
    ("para", "\u{00B6}"),
    ("permil", "\u{2030}"),
    ("phi", "\u{03C6}"),
    ("pi", "\u{03C0}"),
    ("plusmn", "\u{00B1}"),
    ("pound", "\u{00A3}"),
    ("prime", "\u{2032}"),
    ("psi", "\u{03C8}"),
    ("quot", "\""),
    ("raquo", "\u{00BB}"),
    ("rarr", "\u{2192}"),
    ("rdquo", "\u{201D}"),
    ("reg", "\u{00AE}"),
    ("rho", "\u{03C1}"),
    ("rsaquo", "\u{203A}"),
    ("rsquo", "\u{2019}"),
    ("sbquo", "\u{201A}"),
    ("sect", "\u{00A7}"),
    ("shy", "\u{00AD}"),
    ("sigma", "\u{03C3}"),
    ("sup1", "\u{00B9}"),
    ("sup2", "\u{00B2}"),
    ("sup3", "\u{00B3}"),
    ("szlig", "\u{00DF}"),
    ("tau", "\u{03C4}"),
    ("theta", "\u{03B8}"),
    ("thinsp", "\u{2009}"),
    ("thorn", "\u{00FE}"),
    ("times", "\u{00D7}"),
    ("trade", "\u{2122}"),
    ("uacute", "\u{00FA}"),
    ("uarr", "\u{2191}"),
    ("ucirc", "\u{00FB}"),
    ("ugrave", "\u{00F9}"),
    ("uml", "\u{00A8}"),
    ("upsilon", "\u{03C5}"),
    ("uuml", "\u{00FC}"),
    ("xi", "\u{03BE}"),
    ("yacute", "\u{00FD}"),
    ("yen", "\u{00A5}"),
    ("yuml", "\u{00FF}"),
    ("zeta", "\u{03B6}"),
    ("zwj", "\u{200D}"),
    ("zwnj", "\u{200C}"),
];

pub(crate) fn lookup_named_entity(name: &str) -> Option<&'static str> {
    ENTITIES
        .binary_search_by(|(candidate, _)| candidate.cmp(&name))
        .ok()
        .map(|idx| ENTITIES[idx].1)
}

/// Decodes the reference starting at `bytes[start] == b'&'`, returning the
/// replacement text and the index just past the `;`.
pub(crate) fn decode_entity(bytes: &[u8], start: usize, end: usize) -> Option<(String, usize)> {
    if start + 2 >= end || bytes[start] != b'&' {
        return None;
    }
    let mut i = start + 1;
    if bytes[i] == b'#' {
        i += 1;
        let mut radix = 10;
        if i < end && (bytes[i] == b'x' || bytes[i] == b'X') {
            radix = 16;
            i += 1;
        }
        let digits_start = i;
        while i < end
            && (if radix == 16 {
                bytes[i].is_ascii_hexdigit()
            } else {
                bytes[i].is_ascii_digit()
            })
        {
            i += 1;
        }
        let max_digits = if radix == 16 { 6 } else { 7 };
        if i == digits_start || i - digits_start > max_digits || i >= end || bytes[i] != b';' {
            return None;
        }
        let digits = std::str::from_utf8(&bytes[digits_start..i]).ok()?;
        let value = u32::from_str_radix(digits, radix).ok()?;
        let ch = match value {
            0 => '\u{FFFD}',
            _ => char::from_u32(value).unwrap_or('\u{FFFD}'),
        };
        return Some((ch.to_string(), i + 1));
    }
    let name_start = i;
    while i < end && bytes[i].is_ascii_alphanumeric() {
        i += 1;
    }
    if i == name_start || i >= end || bytes[i] != b';' {
        return None;
    }
    let name = std::str::from_utf8(&bytes[name_start..i]).ok()?;
    let decoded = lookup_named_entity(name)?;
    Some((decoded.to_string(), i + 1))
}
