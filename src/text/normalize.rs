use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Cleans text extracted from a PDF.
///
/// Every whitespace run (newlines and tabs included) becomes a single space,
/// a hyphen that is not preceded by a word character is deleted together with
/// the whitespace that follows it, and the result is trimmed.
pub fn normalize(text: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(text, " ");
    strip_dangling_hyphens(&collapsed).trim().to_string()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Removes `-<whitespace>` where the hyphen does not follow a word character.
///
/// The predecessor test looks at the input, not at what has been emitted so
/// far, so consecutive matches behave like a left-to-right regex substitution.
fn strip_dangling_hyphens(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let follows_word = i > 0 && is_word_char(chars[i - 1]);
        let next_is_space = chars.get(i + 1).is_some_and(|n| n.is_whitespace());

        if c == '-' && !follows_word && next_is_space {
            i += 1;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}
