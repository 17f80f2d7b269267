//! Shared step scaffolding.
//!
//! Nearly every emitted action has the same three-part shape: a named step
//! wrapper carrying the ordinal and description, the operation body, and a
//! trailing idle wait on the step's page. [`Step`] factors that shape out so
//! the ~20 emitters only contribute body lines.

use crate::literal::js_str;

/// Base indentation of statements inside the generated test body.
const TEST_INDENT: &str = "  ";
/// Indentation of statements inside a step closure.
const STEP_INDENT: &str = "    ";

/// Builder for one generated step.
#[derive(Debug, Clone)]
pub struct Step {
    title: String,
    page_var: String,
    lines: Vec<String>,
    idle_wait: bool,
}

impl Step {
    /// Step titled `Step <n>: <description>`, falling back to the action
    /// kind's wire tag when no description was recorded. Ordinals are
    /// 1-based in titles.
    #[must_use]
    pub fn new(ordinal: usize, description: Option<&str>, kind_label: &str) -> Self {
        let label = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(kind_label);
        Self {
            title: format!("Step {}: {label}", ordinal + 1),
            page_var: "page".to_string(),
            lines: Vec::new(),
            idle_wait: true,
        }
    }

    /// Operate on a page variable other than the root page.
    #[must_use]
    pub fn on_page(mut self, page_var: &str) -> Self {
        self.page_var = page_var.to_string();
        self
    }

    /// Skip the trailing idle wait (page-close steps have no page left to
    /// settle).
    #[must_use]
    pub fn without_idle_wait(mut self) -> Self {
        self.idle_wait = false;
        self
    }

    /// Append one body line.
    #[must_use]
    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Append several body lines.
    #[must_use]
    pub fn lines(mut self, lines: impl IntoIterator<Item = String>) -> Self {
        self.lines.extend(lines);
        self
    }

    /// Render the complete step fragment, trailing newline included.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(TEST_INDENT);
        out.push_str("await test.step(");
        out.push_str(&js_str(&self.title));
        out.push_str(", async () => {\n");
        for line in &self.lines {
            if line.is_empty() {
                out.push('\n');
            } else {
                out.push_str(STEP_INDENT);
                out.push_str(line);
                out.push('\n');
            }
        }
        if self.idle_wait {
            out.push_str(STEP_INDENT);
            out.push_str(&format!("await waitForAppIdle({});\n", self.page_var));
        }
        out.push_str(TEST_INDENT);
        out.push_str("});\n");
        out
    }
}
