pub mod ledger;
pub mod save;
pub mod status;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "{}: {}\n",
            self.command,
            if self.ok { "ok" } else { "failed" }
        );
        for detail in &self.details {
            out.push_str(&format!("  {detail}\n"));
        }
        for issue in &self.issues {
            out.push_str(&format!("  issue: {issue}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::CommandReport;

    #[test]
    fn issue_marks_report_failed() {
        let mut report = CommandReport::new("save");
        report.detail("queried=2");
        assert!(report.ok);
        report.issue("task finished with state FAILURE");
        assert!(!report.ok);
        assert_eq!(
            report.render_text(),
            "save: failed\n  queried=2\n  issue: task finished with state FAILURE\n"
        );
    }
}
