//! Quote-balance tracking across physical lines.

/// Scans lines for string literal boundaries.
///
/// The state is the quote character of the string that is still open, if
/// any. A quote preceded by an odd number of backslashes is escaped and never
/// changes the state; inside a string the other quote character is plain text.
#[derive(Debug, Default, Clone)]
pub struct QuoteTracker {
    open: Option<char>,
    line_comment: Option<String>,
}

impl QuoteTracker {
    pub fn new(line_comment: Option<String>) -> Self {
        Self {
            open: None,
            line_comment: line_comment.filter(|c| !c.is_empty()),
        }
    }

    /// The quote character of the string left open by the lines seen so far.
    pub fn open_quote(&self) -> Option<char> {
        self.open
    }

    fn starts_comment(&self, rest: &str) -> bool {
        self.line_comment
            .as_deref()
            .is_some_and(|prefix| rest.starts_with(prefix))
    }

    /// Advance the state over one physical line.
    pub fn scan_line(&mut self, line: &str) {
        let mut backslashes = 0usize;

        for (pos, c) in line.char_indices() {
            if c == '\\' {
                backslashes += 1;
                continue;
            }
            let escaped = backslashes % 2 == 1;
            backslashes = 0;

            match self.open {
                None => {
                    if self.starts_comment(&line[pos..]) {
                        return;
                    }
                    if (c == '\'' || c == '"') && !escaped {
                        self.open = Some(c);
                    }
                }
                Some(q) => {
                    if c == q && !escaped {
                        self.open = None;
                    }
                }
            }
        }
    }
}

/// Group physical lines into logical lines.
///
/// A line that leaves a string open is joined with the following lines, by
/// newline, until the string closes. A group still open after the last line
/// is emitted as it is. Returns the groups and the quote left open, if any.
pub fn group_lines<'a, I>(lines: I, line_comment: Option<String>) -> (Vec<String>, Option<char>)
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tracker = QuoteTracker::new(line_comment);
    let mut logical = Vec::new();
    let mut pending: Option<String> = None;

    for line in lines {
        tracker.scan_line(line);

        let block = match pending.take() {
            Some(mut acc) => {
                acc.push('\n');
                acc.push_str(line);
                acc
            }
            None => line.to_string(),
        };

        if tracker.open_quote().is_some() {
            pending = Some(block);
        } else {
            logical.push(block);
        }
    }

    if let Some(rest) = pending {
        logical.push(rest);
    }

    (logical, tracker.open_quote())
}
