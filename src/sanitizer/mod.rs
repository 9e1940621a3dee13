//! Repairs generated source code before it is executed.
//!
//! Code returned by a language model has often been escaped once more than
//! it should be (JSON string quoting, markdown). The sanitizer runs two passes:
//!
//! 1. **Escapes**: every physical line that does not match a protected
//!    pattern has `\u`/`\U`, `\n`, `\t` and `\"` sequences decoded, and on
//!    such an escaped line `\\` becomes `\`. A malformed unicode escape
//!    leaves the line with only the other escapes decoded. Protected lines
//!    are copied verbatim.
//! 2. **Quotes**: the decoded text is split into physical lines again and
//!    grouped into logical lines so that a string literal spanning several
//!    lines stays together (see [`quotes::group_lines`]).
//!
//! Sanitizing never fails. A string that is still open at the end of the
//! input is reported in [`SanitizedScript::unterminated_quote`].
pub mod escapes;
pub mod quotes;

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::config::SanitizerConfig;

static DEFAULT_SANITIZER: LazyLock<Sanitizer> = LazyLock::new(Sanitizer::default);

/// Output of [`Sanitizer::sanitize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedScript {
    pub logical_lines: Vec<String>,
    /// Quote character of a string literal left open at end of input.
    pub unterminated_quote: Option<char>,
}

impl SanitizedScript {
    pub fn text(&self) -> String {
        self.logical_lines.join("\n")
    }

    pub fn is_balanced(&self) -> bool {
        self.unterminated_quote.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    protected: Vec<Regex>,
    line_comment: Option<String>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::from_config(&SanitizerConfig::default()).expect("built-in protected patterns compile")
    }
}

impl Sanitizer {
    pub fn new(protected: Vec<Regex>, line_comment: Option<String>) -> Self {
        Self {
            protected,
            line_comment,
        }
    }

    pub fn from_config(config: &SanitizerConfig) -> Result<Self, regex::Error> {
        let protected = config
            .protected_patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(protected, config.line_comment.clone()))
    }

    fn is_protected(&self, line: &str) -> bool {
        self.protected.iter().any(|re| re.is_match(line))
    }

    fn decode_line(&self, line: &str) -> String {
        if self.is_protected(line) {
            return line.to_string();
        }
        match escapes::decode_unicode(line) {
            Ok(decoded) => escapes::decode_common(&decoded),
            Err(e) => {
                debug!("Keeping line without unicode decoding: {e}");
                escapes::decode_common(line)
            }
        }
    }

    pub fn sanitize(&self, code: &str) -> SanitizedScript {
        if code.is_empty() {
            return SanitizedScript {
                logical_lines: Vec::new(),
                unterminated_quote: None,
            };
        }

        let decoded: Vec<String> = code.split('\n').map(|line| self.decode_line(line)).collect();
        let decoded = decoded.join("\n");

        let (logical_lines, unterminated_quote) =
            quotes::group_lines(decoded.split('\n'), self.line_comment.clone());

        debug!(
            "Sanitized script: {} physical lines in, {} logical lines out",
            code.split('\n').count(),
            logical_lines.len()
        );

        SanitizedScript {
            logical_lines,
            unterminated_quote,
        }
    }
}

/// Sanitize with the built-in protected patterns and `#` comments.
pub fn sanitize(code: &str) -> String {
    DEFAULT_SANITIZER.sanitize(code).text()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A PyMuPDF extraction script as returned inside a JSON string: one
    /// physical line, every quote and line break escaped.
    const ESCAPED_SCRIPT: &str = r###"\nimport fitz  # PyMuPDF\nimport csv  # Necessary for writing CSV file\n\n# Path provided in /tmp/tmp46vo6jz2/BGD_Animalia_Mammals_2015.pdf for input path\ninput_path = \"/tmp/tmp46vo6jz2/BGD_Animalia_Mammals_2015.pdf\"\noutput_path = \"/home/adam/data.csv\"  # Path provided in /home/adam/data.csv for output path\n\ndef extract_scientific_names_and_threats(input_file, output_file):\n    \"\"\"\n    Extract scientific names and threat categories from a PDF file and write them to a CSV file.\n    \n    Parameters:\n    input_file (str): The path to the PDF file.\n    output_file (str): The path to the CSV file where results will be written.\n    \"\"\"\n\n    # Open the PDF file\n    document = fitz.open(input_file)\n    \n    # Prepare data to write to CSV\n    with open(output_file, \"w\", newline=\"\", encoding=\"utf-8\") as csvfile:\n        writer = csv.writer(csvfile)\n        writer.writerow([\"Scientific Name\", \"Threat Category\", \"Regional Status\"])  # Write header\n        \n        for page_num in range(len(document)):\n            page = document.load_page(page_num)\n            \n            text = page.get_text(\"text\")\n            \n            lines = text.split(\"\\n\")\n            \n            scientific_name = None\n            threat_category = None\n            \n            for line in lines:\n                if \"Scientific Name:\" in line:\n                    name_part = line.replace(\"Scientific Name:\", \"\").strip()\n                    \n                    parts = name_part.split(' ')\n                    scientific_name = ' '.join(parts[:2])  # Take exactly the first two words\n                    \n                elif \"\u003c\" in line and \"\u003e\" in line:\n                    threat_category = line.strip(\"\u003c\u003e\").strip()\n                    \n            if scientific_name is not None and threat_category is not None:\n                writer.writerow([scientific_name, threat_category, \"Not Threatened in Bangladesh\"])\n\n# Example usage\nextract_scientific_names_and_threats(input_path, output_path)\n"###;

    #[test]
    fn test_escaped_script_restored() {
        let out = Sanitizer::default().sanitize(ESCAPED_SCRIPT);
        assert!(out.is_balanced());

        let text = out.text();
        assert!(text.contains(r#"            lines = text.split("\n")"#), "got:\n{text}");
        assert!(!text.contains(r#"split("\\n")"#));
        assert!(text.contains(r#"input_path = "/tmp/tmp46vo6jz2/BGD_Animalia_Mammals_2015.pdf""#));
        assert!(text.contains(r#"threat_category = line.strip("<>").strip()"#));
        assert!(text.contains("parts = name_part.split(' ')"));

        // The docstring stays one logical line; code lines stay separate.
        assert!(
            out.logical_lines
                .iter()
                .any(|l| l.starts_with("    \"\"\"\n    Extract scientific names") && l.ends_with("\"\"\""))
        );
        assert!(out.logical_lines.contains(&"import fitz  # PyMuPDF".to_string()));
    }

    #[test]
    fn test_escaped_newline_becomes_real() {
        assert_eq!(sanitize(r"a\n b"), "a\n b");
    }

    #[test]
    fn test_protected_line_unchanged() {
        let line = r#"rows = text.split("\n")"#;
        assert_eq!(sanitize(line), line);

        let joined = r#"out = '\n'.join(rows)"#;
        assert_eq!(sanitize(joined), joined);
    }

    #[test]
    fn test_protection_is_per_line() {
        let code = "print(\\\"a\\tb\\\")\nparts = raw.split('\\n')";
        assert_eq!(
            sanitize(code),
            "print(\"a\tb\")\nparts = raw.split('\\n')"
        );
    }

    #[test]
    fn test_protected_line_still_grouped() {
        // Decoding is skipped for the protected line, quote tracking is not.
        let code = "s = 'x.split(\"\\n\")\nend'";
        let out = Sanitizer::default().sanitize(code);
        assert_eq!(out.logical_lines, vec![code.to_string()]);
        assert!(out.is_balanced());
    }

    #[test]
    fn test_unicode_and_malformed_unicode() {
        assert_eq!(sanitize(r"name = 'caf\u00e9'"), "name = 'café'");
        // The broken \u escape stays, the other escapes on the line are decoded.
        assert_eq!(sanitize(r#"say(\"hi\") \u12"#), r#"say("hi") \u12"#);
    }

    #[test]
    fn test_backslash_pairs_survive() {
        let code = r#"print("a\\nb")"#;
        assert_eq!(sanitize(code), code);
    }

    #[test]
    fn test_multiline_string_accumulated() {
        let code = "s = '''first\n\nsecond'''\nx = 1";
        let out = Sanitizer::default().sanitize(code);
        assert_eq!(
            out.logical_lines,
            vec!["s = '''first\n\nsecond'''".to_string(), "x = 1".to_string()]
        );
        assert_eq!(out.text(), code);
    }

    #[test]
    fn test_decoded_newline_inside_string() {
        let out = Sanitizer::default().sanitize(r"s = 'a\nb'");
        assert_eq!(out.logical_lines, vec!["s = 'a\nb'".to_string()]);
    }

    #[test]
    fn test_unterminated_quote_flushed() {
        let code = "x = 1\ns = \"abc\ndef";
        let out = Sanitizer::default().sanitize(code);
        assert_eq!(out.unterminated_quote, Some('"'));
        assert_eq!(out.logical_lines.len(), 2);
        assert_eq!(out.text(), code);
    }

    #[test]
    fn test_escaped_quote_does_not_open() {
        let out = Sanitizer::default().sanitize(r"s = 'it\'s'");
        assert!(out.is_balanced());
        assert_eq!(out.text(), r"s = 'it\'s'");
    }

    #[test]
    fn test_empty_and_edge_inputs() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("\n"), "\n");
        // `\t` is decoded even here; a trailing backslash is kept.
        assert_eq!(sanitize(r"path = 'C:\temp' \"), "path = 'C:\temp' \\");
    }

    #[test]
    fn test_custom_config() {
        let config = SanitizerConfig {
            protected_patterns: vec![r"KEEP".to_string()],
            line_comment: Some("//".to_string()),
        };
        let sanitizer = Sanitizer::from_config(&config).unwrap();
        assert_eq!(sanitizer.sanitize(r"KEEP \n").text(), r"KEEP \n");
        assert!(sanitizer.sanitize("x = 1 // it's").is_balanced());
        assert!(!sanitizer.sanitize("x = 1 # it's").is_balanced());

        let bad = SanitizerConfig {
            protected_patterns: vec!["(".to_string()],
            line_comment: None,
        };
        assert!(Sanitizer::from_config(&bad).is_err());
    }
}
