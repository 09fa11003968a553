use crate::error::{ConversionIssue, IssueKind, Severity};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Submission files found.
    pub discovered: usize,
    /// Freshly converted (includes partial failures).
    pub converted: usize,
    /// Carried over unchanged from the previous run.
    pub reused: usize,
    /// No matrix produced.
    pub skipped: usize,
    pub timed_out: usize,
    pub partial_failures: usize,
    pub warnings: usize,
}

impl BatchSummary {
    pub fn count_issue(&mut self, issue: &ConversionIssue) {
        match issue.severity {
            // Path errors are not submissions.
            Severity::Skip if issue.kind == IssueKind::PathAccess => {}
            Severity::Skip => self.skipped += 1,
            Severity::PartialFailure => self.partial_failures += 1,
            Severity::Warning => self.warnings += 1,
        }
        if issue.kind == IssueKind::Timeout {
            self.timed_out += 1;
        }
    }

    /// Matrices in the result.
    pub fn produced(&self) -> usize {
        self.converted + self.reused
    }

    pub fn line(&self) -> String {
        let noun = if self.converted == 1 {
            "strategy"
        } else {
            "strategies"
        };
        let mut line = format!("converted a total of {} {noun}.", self.converted);
        if self.reused > 0 {
            let _ = write!(line, " reused {} unchanged.", self.reused);
        }
        line
    }
}

/// Human-readable error report; empty when there is nothing to report.
pub fn render_issues(issues: &[ConversionIssue]) -> String {
    if issues.is_empty() {
        return String::new();
    }
    let mut out = String::from("ERRORS occurred during conversion:\n");
    for issue in issues {
        let who = issue.identity_hint.as_deref().unwrap_or("<unknown>");
        let _ = writeln!(
            out,
            "Team {who}: {issue}. At path {}",
            issue.path.display()
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_line_pluralizes() {
        let mut s = BatchSummary {
            converted: 1,
            ..Default::default()
        };
        assert_eq!(s.line(), "converted a total of 1 strategy.");
        s.converted = 3;
        s.reused = 2;
        assert_eq!(
            s.line(),
            "converted a total of 3 strategies. reused 2 unchanged."
        );
        assert_eq!(s.produced(), 5);
    }

    #[test]
    fn issues_are_counted_by_severity() {
        let mut s = BatchSummary::default();
        s.count_issue(&ConversionIssue::new(IssueKind::Timeout, "a", "t"));
        s.count_issue(&ConversionIssue::new(IssueKind::PathAccess, "b", "p"));
        s.count_issue(&ConversionIssue::new(IssueKind::CellValidation, "c", "v"));
        s.count_issue(&ConversionIssue::new(IssueKind::DuplicateIdentity, "d", "d"));
        assert_eq!(s.skipped, 1);
        assert_eq!(s.timed_out, 1);
        assert_eq!(s.partial_failures, 1);
        assert_eq!(s.warnings, 1);
    }

    #[test]
    fn render_lists_every_issue() {
        assert_eq!(render_issues(&[]), "");
        let issues = vec![
            ConversionIssue::new(IssueKind::MissingEntryPoint, "x/hog_contest.py", "Missing f")
                .with_hint("x..."),
            ConversionIssue::new(IssueKind::PathAccess, "nowhere", "cannot access nowhere"),
        ];
        let text = render_issues(&issues);
        assert!(text.starts_with("ERRORS occurred during conversion:\n"));
        assert!(text.contains("Team x...: [Skipped] Missing f. At path x/hog_contest.py\n"));
        assert!(text.contains("Team <unknown>: [Skipped] cannot access nowhere. At path nowhere"));
    }
}
