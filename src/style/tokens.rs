//! Tiny CSS value tokenizer shared by the resolver and the paint decoders.
//!
//! Captured values are already serialised by the browser, so a full CSS
//! tokenizer is not needed: splitting at top level (outside parentheses and
//! quotes) covers every value shape we decode.

/// Whether parentheses and quotes are balanced
pub fn is_balanced(s: &str) -> bool {
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    for ch in s.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth < 0 {
                        return false;
                    }
                }
                _ => {}
            },
        }
    }
    depth == 0 && quote.is_none()
}

fn split_with<F>(s: &str, is_sep: F) -> Vec<&str>
where
    F: Fn(char) -> bool,
{
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '(' => depth += 1,
                ')' => depth -= 1,
                c if depth == 0 && is_sep(c) => {
                    let part = s[start..i].trim();
                    if !part.is_empty() {
                        parts.push(part);
                    }
                    start = i + c.len_utf8();
                }
                _ => {}
            },
        }
    }
    let tail = s[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }
    parts
}

/// Split at `sep` outside parentheses and quotes; empty parts are dropped
pub fn split_top_level(s: &str, sep: char) -> Vec<&str> {
    split_with(s, |c| c == sep)
}

/// Split at whitespace outside parentheses and quotes
pub fn split_whitespace_top_level(s: &str) -> Vec<&str> {
    split_with(s, char::is_whitespace)
}

/// `name(args)` -> `(name, args)` when the whole token is one function call
pub fn parse_function(s: &str) -> Option<(&str, &str)> {
    let s = s.trim();
    let open = s.find('(')?;
    if !s.ends_with(')') || open == 0 {
        return None;
    }
    let name = &s[..open];
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }
    let args = &s[open + 1..s.len() - 1];
    if !is_balanced(args) {
        return None;
    }
    Some((name, args.trim()))
}

/// Split a leading number from its unit: `"12.5px"` -> `(12.5, "px")`
pub fn parse_number_unit(s: &str) -> Option<(f32, &str)> {
    let s = s.trim();
    let mut end = 0;
    let bytes = s.as_bytes();
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exp = false;
    while end < bytes.len() {
        let c = bytes[end] as char;
        match c {
            '+' | '-' if end == 0 => {}
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot && !seen_exp => seen_dot = true,
            'e' | 'E' if seen_digit && !seen_exp => {
                // only an exponent when followed by a digit or sign+digit
                let next = bytes.get(end + 1).map(|b| *b as char);
                let after = bytes.get(end + 2).map(|b| *b as char);
                let is_exp = match next {
                    Some(d) if d.is_ascii_digit() => true,
                    Some('+') | Some('-') => after.is_some_and(|d| d.is_ascii_digit()),
                    _ => false,
                };
                if !is_exp {
                    break;
                }
                seen_exp = true;
                if matches!(next, Some('+') | Some('-')) {
                    end += 1;
                }
            }
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return None;
    }
    let value: f32 = s[..end].parse().ok()?;
    Some((value, &s[end..]))
}

/// Strip one level of matching quotes
pub fn unquote(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 2 {
        let first = s.as_bytes()[0];
        let last = s.as_bytes()[s.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return &s[1..s.len() - 1];
        }
    }
    s
}

/// Parse an angle into degrees
pub fn parse_angle(s: &str) -> Option<f32> {
    let (v, unit) = parse_number_unit(s)?;
    match unit.to_ascii_lowercase().as_str() {
        "deg" => Some(v),
        "rad" => Some(v.to_degrees()),
        "grad" => Some(v * 0.9),
        "turn" => Some(v * 360.0),
        "" if v == 0.0 => Some(0.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_outside_parentheses() {
        let parts = split_top_level("rgb(0, 0, 0) 1px, url('a,b.png')", ',');
        assert_eq!(parts, vec!["rgb(0, 0, 0) 1px", "url('a,b.png')"]);
        let ws = split_whitespace_top_level("  1px  rgba(0 0 0 / 50%) inset ");
        assert_eq!(ws, vec!["1px", "rgba(0 0 0 / 50%)", "inset"]);
    }

    #[test]
    fn parses_functions() {
        assert_eq!(parse_function("blur(4px)"), Some(("blur", "4px")));
        assert_eq!(parse_function("blur(4px"), None);
        assert_eq!(parse_function("(4px)"), None);
    }

    #[test]
    fn parses_number_units() {
        assert_eq!(parse_number_unit("12.5px"), Some((12.5, "px")));
        assert_eq!(parse_number_unit("-3"), Some((-3.0, "")));
        assert_eq!(parse_number_unit(".5em"), Some((0.5, "em")));
        assert_eq!(parse_number_unit("1e2px"), Some((100.0, "px")));
        assert_eq!(parse_number_unit("2em"), Some((2.0, "em")));
        assert_eq!(parse_number_unit("px"), None);
    }

    #[test]
    fn balance_checks_quotes_and_parens() {
        assert!(is_balanced("url(\"a)b\")"));
        assert!(!is_balanced("calc(1px + (2px)"));
        assert!(!is_balanced("a)"));
    }

    #[test]
    fn angles_in_all_units() {
        assert_eq!(parse_angle("90deg"), Some(90.0));
        assert_eq!(parse_angle("0.5turn"), Some(180.0));
        assert_eq!(parse_angle("0"), Some(0.0));
        assert_eq!(parse_angle("12px"), None);
    }
}
