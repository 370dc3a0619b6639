//! Terminal listener: prompts on stdin, progress on stderr.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use fmjob_core::{
    Conflict, ConflictDecision, ErrorSeverity, FileInfoList, JobError, JobId, JobListener,
};

use crate::config::ConflictPolicy;

/// Answers job prompts from the terminal.
///
/// Progress lines are redrawn in place on stderr and only when stderr is a
/// terminal. Prompts are only shown when stdin is a terminal; otherwise the
/// listener answers with the non-interactive default (skip, no retry).
pub struct ConsoleListener {
    policy: ConflictPolicy,
    interactive: bool,
    progress: bool,
    found: AtomicUsize,
    line: Mutex<String>,
}

impl ConsoleListener {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            interactive: io::stdin().is_terminal(),
            progress: io::stderr().is_terminal(),
            found: AtomicUsize::new(0),
            line: Mutex::new(String::new()),
        }
    }

    /// Turn progress lines off, e.g. for JSON output.
    pub fn quiet(mut self) -> Self {
        self.progress = false;
        self
    }

    /// Entries delivered through `files_added` so far.
    pub fn found(&self) -> usize {
        self.found.load(Ordering::Relaxed)
    }

    fn status(&self, text: &str) {
        if !self.progress {
            return;
        }
        let mut line = self.line.lock().unwrap_or_else(|e| e.into_inner());
        let width = line.chars().count();
        let mut stderr = io::stderr().lock();
        let _ = write!(stderr, "\r{text:<width$}");
        let _ = stderr.flush();
        *line = text.to_string();
    }

    /// Move off the progress line before printing something else.
    pub fn clear(&self) {
        let mut line = self.line.lock().unwrap_or_else(|e| e.into_inner());
        if !line.is_empty() {
            eprintln!();
            line.clear();
        }
    }

    fn prompt(&self, question: &str) -> Option<String> {
        if !self.interactive {
            return None;
        }
        self.clear();
        eprint!("{question}");
        let _ = io::stderr().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(answer.trim().to_string()),
        }
    }
}

/// Map a conflict prompt answer to a decision. Upper case applies to all.
fn parse_conflict_answer(answer: &str) -> Option<ConflictDecision> {
    let mut chars = answer.chars();
    let first = chars.next()?;
    let rest = chars.as_str().trim();
    let decision = match first.to_ascii_lowercase() {
        's' => ConflictDecision::skip(),
        'o' => ConflictDecision::overwrite(),
        'r' if rest.is_empty() => ConflictDecision::rename(None),
        'r' => ConflictDecision::rename(Some(rest.to_string())),
        'c' => ConflictDecision::cancel(),
        _ => return None,
    };
    Some(if first.is_ascii_uppercase() {
        decision.for_all()
    } else {
        decision
    })
}

impl JobListener for ConsoleListener {
    fn finished(&self, _job: JobId) {
        self.clear();
    }

    fn cancelled(&self, _job: JobId) {
        self.clear();
    }

    fn error(&self, _job: JobId, error: &JobError, severity: ErrorSeverity) -> bool {
        self.clear();
        eprintln!("{severity} error: {error}");
        if !severity.is_recoverable() {
            return false;
        }
        self.prompt("Retry? [y/N] ")
            .is_some_and(|answer| answer.eq_ignore_ascii_case("y"))
    }

    fn ask(&self, _job: JobId, question: &str, options: &[&str]) -> Option<usize> {
        let mut text = format!("{question}\n");
        for (i, option) in options.iter().enumerate() {
            text.push_str(&format!("  {}) {option}\n", i + 1));
        }
        text.push_str("> ");

        let answer = self.prompt(&text)?;
        answer
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=options.len()).contains(n))
            .map(|n| n - 1)
    }

    fn conflict(&self, _job: JobId, conflict: &Conflict) -> ConflictDecision {
        if let Some(decision) = self.policy.decision() {
            return decision;
        }
        let question = format!(
            "{}: {}\n  [s]kip [o]verwrite [r]ename [NAME] [c]ancel (capital letter = all): ",
            conflict.kind,
            conflict.destination.display()
        );
        loop {
            let Some(answer) = self.prompt(&question) else {
                return ConflictDecision::skip();
            };
            if let Some(decision) = parse_conflict_answer(&answer) {
                return decision;
            }
        }
    }

    fn current_file(&self, _job: JobId, path: &Path) {
        self.status(&path.display().to_string());
    }

    fn percent(&self, _job: JobId, percent: u32) {
        self.status(&format!("{percent:>3}%"));
    }

    fn files_added(&self, _job: JobId, files: &FileInfoList) {
        let found = self.found.fetch_add(files.len(), Ordering::Relaxed) + files.len();
        self.status(&format!("{found} found"));
    }
}

#[cfg(test)]
mod tests {
    use fmjob_core::ConflictResolution;

    use super::*;

    #[test]
    fn test_parse_conflict_answer() {
        let skip = parse_conflict_answer("s").unwrap();
        assert_eq!(skip.resolution, ConflictResolution::Skip);
        assert!(!skip.apply_to_all);

        let all = parse_conflict_answer("O").unwrap();
        assert_eq!(all.resolution, ConflictResolution::Overwrite);
        assert!(all.apply_to_all);

        let named = parse_conflict_answer("r copy.txt").unwrap();
        assert_eq!(named.resolution, ConflictResolution::Rename);
        assert_eq!(named.new_name.as_deref(), Some("copy.txt"));

        assert!(parse_conflict_answer("").is_none());
        assert!(parse_conflict_answer("x").is_none());
    }
}
