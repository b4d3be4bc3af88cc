// SPDX-License-Identifier: AGPL-3.0-or-later
//! Output buffer with nesting-aware indentation

/// Accumulates exporter output, indenting lines by the current nesting level
pub(crate) struct IndentWriter<'c> {
    out: String,
    unit: &'c str,
    level: usize,
    skip_next: bool,
}

impl<'c> IndentWriter<'c> {
    pub fn new(unit: &'c str) -> Self {
        Self {
            out: String::new(),
            unit,
            level: 0,
            skip_next: true,
        }
    }

    /// Emit the indentation for the current level, unless it was suppressed
    pub fn indent(&mut self) {
        if self.skip_next {
            self.skip_next = false;
            return;
        }
        for _ in 0..self.level {
            self.out.push_str(self.unit);
        }
    }

    /// The next `indent` call emits nothing; used after an inline opener
    pub fn skip_next_indent(&mut self) {
        self.skip_next = true;
    }

    pub fn more(&mut self) {
        self.level += 1;
    }

    pub fn less(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    pub fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub fn push_char(&mut self, c: char) {
        self.out.push(c);
    }

    pub fn ensure_newline(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    /// Drop trailing spaces and tabs from what was written so far
    pub fn trim_trailing_blanks(&mut self) {
        let kept = self.out.trim_end_matches([' ', '\t']).len();
        self.out.truncate(kept);
    }

    /// Drop all trailing whitespace, line breaks included
    pub fn trim_end(&mut self) {
        let kept = self.out.trim_end().len();
        self.out.truncate(kept);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_first_indent_is_skipped() {
        let mut writer = IndentWriter::new("  ");
        writer.more();
        writer.indent();
        writer.push("a\n");
        writer.indent();
        writer.push("b");
        assert_eq!(writer.finish(), "a\n  b");
    }

    #[test]
    fn test_trim_and_newline() {
        let mut writer = IndentWriter::new("\t");
        writer.push("x \t ");
        writer.trim_trailing_blanks();
        writer.ensure_newline();
        writer.ensure_newline();
        writer.less();
        writer.indent();
        assert_eq!(writer.finish(), "x\n");
    }
}
