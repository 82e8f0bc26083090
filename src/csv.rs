//! CSV rendering of Humdrum records.

use std::borrow::Cow;

/// Rewrite one CSV record into tab-separated Humdrum text.
///
/// Global comments (`!!...`) are taken verbatim. Quoted fields may contain
/// the separator, and a doubled quote inside a quoted field is a literal
/// quote.
pub fn csv_to_tabs(csv: &str, separator: &str) -> String {
    let csv = csv.strip_suffix('\r').unwrap_or(csv);
    if csv.starts_with("!!") || separator.is_empty() {
        return csv.to_string();
    }

    let mut output = String::with_capacity(csv.len());
    let mut in_quote = false;
    let mut rest = csv;
    while let Some(ch) = rest.chars().next() {
        if ch == '"' {
            if in_quote && rest[1..].starts_with('"') {
                output.push('"');
                rest = &rest[2..];
                continue;
            }
            in_quote = !in_quote;
            rest = &rest[1..];
        } else if !in_quote && rest.starts_with(separator) {
            output.push('\t');
            rest = &rest[separator.len()..];
        } else {
            output.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    output
}

/// Quote a field for CSV output when it holds the separator, a comma or a
/// quote. Quotes inside the field are doubled.
pub fn escape_field<'a>(text: &'a str, separator: &str) -> Cow<'a, str> {
    let needs_quotes = text.contains(',')
        || text.contains('"')
        || (!separator.is_empty() && text.contains(separator));
    if !needs_quotes {
        return Cow::Borrowed(text);
    }
    Cow::Owned(format!("\"{}\"", text.replace('"', "\"\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_csv_to_tabs() {
        assert_eq!(csv_to_tabs("4c,4e,4g", ","), "4c\t4e\t4g");
        assert_eq!(csv_to_tabs("\"a,b\",4c", ","), "a,b\t4c");
        assert_eq!(csv_to_tabs("\"say \"\"hi\"\"\",.", ","), "say \"hi\"\t.");
        assert_eq!(csv_to_tabs("4c;4e\r", ";"), "4c\t4e");
        assert_eq!(csv_to_tabs("4c::4e", "::"), "4c\t4e");
    }

    #[test]
    fn test_global_comments_are_verbatim() {
        assert_eq!(csv_to_tabs("!! a, \"b\"", ","), "!! a, \"b\"");
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("4c", ","), "4c");
        assert_eq!(escape_field("a,b", ";"), "\"a,b\"");
        assert_eq!(escape_field("a;b", ";"), "\"a;b\"");
        assert_eq!(escape_field("say \"hi\"", ","), "\"say \"\"hi\"\"\"");
        assert!(matches!(escape_field("plain", ","), Cow::Borrowed(_)));
    }
}
