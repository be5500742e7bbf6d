//! Compiler output filtering

/// Outcome text of one compile attempt
///
/// Only the lines a designer needs to act on are kept. Progress chatter
/// like "wrote new font file" never reaches the report.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompileReport {
    pub failed: bool,
    messages: Vec<String>,
}

impl CompileReport {
    /// A failed compile with the given diagnostic output
    pub fn failure(output: &str) -> Self {
        Self {
            failed: true,
            messages: filter_messages(output),
        }
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

fn is_informational(line: &str) -> bool {
    let lower = line.trim().to_ascii_lowercase();
    lower.is_empty()
        || lower.starts_with("note:")
        || lower.contains("[note]")
        || (lower.contains("wrote") && lower.contains("font file"))
}

fn filter_messages(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !is_informational(line))
        .map(|line| line.trim_end().to_string())
        .collect()
}
