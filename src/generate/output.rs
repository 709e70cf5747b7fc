/// Output buffer that accumulates generated code line by line
pub struct Output {
    lines: Vec<String>,
    current_line: String,
    indent: usize,
}

impl Output {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            current_line: String::new(),
            indent: 0,
        }
    }

    /// Add text to the current line, indenting it if it is the first text
    pub fn push(&mut self, text: &str) {
        if self.current_line.is_empty() {
            self.current_line.push_str(&"  ".repeat(self.indent));
        }
        self.current_line.push_str(text);
    }

    /// Add a newline
    pub fn newline(&mut self) {
        self.current_line.push('\n');
        self.lines.push(std::mem::take(&mut self.current_line));
    }

    /// Add a whole line
    pub fn line(&mut self, text: &str) {
        self.push(text);
        self.newline();
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Finish and return the generated code
    pub fn finish(mut self) -> String {
        if !self.current_line.is_empty() {
            self.lines.push(std::mem::take(&mut self.current_line));
        }
        self.lines.join("")
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indentation() {
        let mut output = Output::new();
        output.line("a {");
        output.indent();
        output.push("b");
        output.push(";");
        output.newline();
        output.dedent();
        output.push("}");
        assert_eq!(output.finish(), "a {\n  b;\n}");
    }
}
