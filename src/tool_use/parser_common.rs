//! Error reporting shared by the tool-call recognizers.

/// Receives every irregularity a recognizer runs into.
///
/// Recognizers never fail on their own: they report here and let the caller
/// decide what a bad parse means.
pub trait ErrorListener {
    /// Input that does not match the grammar.
    fn syntax_error(&mut self, line: usize, column: usize, offending: Option<&str>, msg: &str);

    /// More than one interpretation of `start..stop` is possible.
    fn report_ambiguity(&mut self, start: usize, stop: usize, exact: bool, alternatives: &[usize]);

    /// Local lookahead was not enough and full context is needed.
    fn report_attempting_full_context(&mut self, start: usize, stop: usize, conflicting: &[usize]);

    /// The decision at `start..stop` depends on the surrounding context.
    fn report_context_sensitivity(&mut self, start: usize, stop: usize, prediction: usize);
}

/// Tracks whether a parse stayed well-formed.
///
/// Starts well-formed. Any report flips it for good; nothing is raised, logged
/// or recovered. Check [`DefaultErrorListener::status`] once the parse ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultErrorListener {
    status: bool,
}

impl Default for DefaultErrorListener {
    fn default() -> Self {
        Self { status: true }
    }
}

impl DefaultErrorListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` while no error, ambiguity or context conflict has been reported.
    pub fn status(&self) -> bool {
        self.status
    }
}

impl ErrorListener for DefaultErrorListener {
    fn syntax_error(&mut self, _line: usize, _column: usize, _offending: Option<&str>, _msg: &str) {
        self.status = false;
    }

    fn report_ambiguity(&mut self, _start: usize, _stop: usize, _exact: bool, _alternatives: &[usize]) {
        self.status = false;
    }

    fn report_attempting_full_context(&mut self, _start: usize, _stop: usize, _conflicting: &[usize]) {
        self.status = false;
    }

    fn report_context_sensitivity(&mut self, _start: usize, _stop: usize, _prediction: usize) {
        self.status = false;
    }
}

/// Remove one matching pair of `'` or `"` around `text`.
///
/// Returned unchanged when shorter than two characters, when the first
/// character is not a quote, or when the last character differs from it.
pub fn strip_quotes(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() < 2 {
        return text;
    }
    let first = bytes[0];
    if (first != b'"' && first != b'\'') || bytes[bytes.len() - 1] != first {
        return text;
    }
    &text[1..text.len() - 1]
}
