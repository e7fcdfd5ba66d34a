//! An indent-tracking text writer.

const INDENT: &str = "    ";

/// Accumulates SQL text; indentation is applied lazily at the start of each
/// line so that `indent()` may be called before or after `new_line()`.
#[derive(Debug, Default)]
pub struct IndentedWriter {
    buf: String,
    level: usize,
    at_line_start: bool,
}

impl IndentedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, text: &str) -> &mut Self {
        if text.is_empty() {
            return self;
        }
        if self.at_line_start {
            for _ in 0..self.level {
                self.buf.push_str(INDENT);
            }
            self.at_line_start = false;
        }
        self.buf.push_str(text);
        self
    }

    pub fn new_line(&mut self) -> &mut Self {
        self.buf.push('\n');
        self.at_line_start = true;
        self
    }

    pub fn indent(&mut self) -> &mut Self {
        self.level += 1;
        self
    }

    pub fn outdent(&mut self) -> &mut Self {
        self.level = self.level.saturating_sub(1);
        self
    }

    pub const fn level(&self) -> usize {
        self.level
    }

    pub fn as_str(&self) -> &str {
        &self.buf
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
