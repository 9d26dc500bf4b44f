use std::borrow::Cow;

/// Decodes HTML character references (`&amp;`, `&eacute;`, `&#233;`, `&#xE9;`).
///
/// Feed producers frequently entity-encode text that is already inside an XML
/// text node, so after XML unescaping titles still read `Caf&eacute;`. Text
/// without a `&` is returned borrowed and unchanged.
///
/// # Examples
///
/// ```
/// use gator::util::decode_entities;
///
/// assert_eq!(decode_entities("Caf&eacute; &amp; Bar"), "Café & Bar");
/// assert_eq!(decode_entities("Plain title"), "Plain title");
/// ```
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    html_escape::decode_html_entities(s)
}

/// Removes terminal control characters from feed-supplied text before it is
/// printed.
///
/// ESC and the C0 controls are dropped, along with the rest of any CSI
/// sequence (`ESC [ ... final`). Tab, newline and carriage return are kept.
/// Clean input is returned borrowed.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let needs_strip = s
        .chars()
        .any(|c| c == '\x1b' || c == '\x7f' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r')));

    if !needs_strip {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // Parameter and intermediate bytes run until a final byte 0x40..=0x7E
                for next in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        if c == '\x7f' || (c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r')) {
            continue;
        }
        out.push(c);
    }

    Cow::Owned(out)
}
