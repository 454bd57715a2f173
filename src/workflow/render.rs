//! YAML rendering of workflow documents.

use crate::error::GenerationResult;

use super::schema::Workflow;

/// Renders [`Workflow`] values to YAML text.
///
/// Output never contains timestamps, so identical workflows always render
/// to identical bytes.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    header: Vec<String>,
}

impl Renderer {
    /// Renderer without a comment header.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line to the comment header.
    #[must_use]
    pub fn comment(mut self, line: impl Into<String>) -> Self {
        self.header.push(line.into());
        self
    }

    /// Add several comment lines, skipping empty ones.
    #[must_use]
    pub fn comments<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for line in lines {
            let line = line.into();
            if !line.trim().is_empty() {
                self.header.push(line);
            }
        }
        self
    }

    /// Render a workflow.
    pub fn render(&self, workflow: &Workflow) -> GenerationResult<String> {
        let body = unquote_on_key(serde_yaml::to_string(workflow)?);

        if self.header.is_empty() {
            return Ok(body);
        }

        let mut out = String::with_capacity(body.len() + 64 * self.header.len());
        for line in &self.header {
            // Comment text must stay on one line to remain a comment.
            for part in line.lines() {
                out.push_str("# ");
                out.push_str(part.trim_end());
                out.push('\n');
            }
        }
        out.push('\n');
        out.push_str(&body);
        Ok(out)
    }
}

// YAML 1.1 emitters quote `on` as a boolean lookalike. GitHub reads both
// spellings the same way, but the plain key is the conventional one.
fn unquote_on_key(body: String) -> String {
    if !body.lines().any(|line| line.starts_with("'on':") || line.starts_with("\"on\":")) {
        return body;
    }
    let mut out = String::with_capacity(body.len());
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("'on':").or_else(|| line.strip_prefix("\"on\":")) {
            out.push_str("on:");
            out.push_str(rest);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Render a workflow without a header.
pub fn to_yaml(workflow: &Workflow) -> GenerationResult<String> {
    Renderer::new().render(workflow)
}
