//! Cleaning of code tokens
//!
//! Word processors scatter formatting markup inside typed template code
//! and replace plain quotes and dashes with typographic ones. The lexer
//! cuts the markup out and normalizes the characters so the template
//! engine sees the code the author meant.

use std::borrow::Cow;
use std::ops::Range;

/// Source text of `span` with the `excised` ranges cut out
pub(crate) fn excise(source: &str, span: Range<usize>, excised: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(span.len());
    let mut pos = span.start;
    for cut in excised {
        out.push_str(&source[pos..cut.start]);
        pos = cut.end;
    }
    out.push_str(&source[pos..span.end]);
    out
}

/// Undo entity escaping and typographic substitutions inside code
pub(crate) fn normalize(code: &str) -> String {
    let typed: String = code
        .replace("?.", ".")
        .chars()
        .map(|c| match c {
            '\u{2013}' => '-',
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2019}' | '\u{2018}' | '\u{201A}' => '\'',
            other => other,
        })
        .collect();

    match quick_xml::escape::unescape(&typed) {
        Ok(Cow::Borrowed(_)) => typed,
        Ok(Cow::Owned(unescaped)) => unescaped,
        // Unknown entities such as &nbsp; make the strict unescaper give up
        Err(_) => typed
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excise() {
        let source = "xx{{ na<b>me</b> }}yy";
        let code = excise(source, 2..19, &[7..10, 12..16]);
        assert_eq!(code, "{{ name }}");
    }

    #[test]
    fn test_excise_nothing() {
        assert_eq!(excise("{{a}}", 0..5, &[]), "{{a}}");
    }

    #[test]
    fn test_normalize_entities() {
        assert_eq!(normalize("{% if a &lt; b &amp;&amp; c &gt; d %}"), "{% if a < b && c > d %}");
        assert_eq!(normalize("{{ &quot;x&quot; ~ &apos;y&apos; }}"), "{{ \"x\" ~ 'y' }}");
    }

    #[test]
    fn test_normalize_typography() {
        assert_eq!(normalize("{{ \u{201C}a\u{201D} }}"), "{{ \"a\" }}");
        assert_eq!(normalize("{{ \u{2018}b\u{2019} }}"), "{{ 'b' }}");
        assert_eq!(normalize("{{ x \u{2013} 1 }}"), "{{ x - 1 }}");
        assert_eq!(normalize("{{ user?.name }}"), "{{ user.name }}");
    }

    #[test]
    fn test_normalize_unknown_entity() {
        assert_eq!(normalize("{{ a&nbsp;&lt; b }}"), "{{ a&nbsp;< b }}");
    }
}
