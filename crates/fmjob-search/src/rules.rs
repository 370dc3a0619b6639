//! Search rules and the chain that combines them.

use std::fmt;
use std::time::SystemTime;

use globset::{GlobBuilder, GlobMatcher};
use regex::{Regex, RegexBuilder};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use fmjob_core::{FileInfo, FileKind, JobError, JobResult, Vfs};

use crate::content::ContentMatcher;
use crate::settings::{NameMode, SearchSettings};

/// What a rule may use besides the entry itself.
pub struct RuleEnv<'a> {
    vfs: &'a dyn Vfs,
    cancel: Option<CancellationToken>,
}

impl<'a> RuleEnv<'a> {
    pub fn new(vfs: &'a dyn Vfs) -> Self {
        Self { vfs, cancel: None }
    }

    /// Make long-running rules stop once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn vfs(&self) -> &dyn Vfs {
        self.vfs
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}

/// A predicate over one directory entry.
pub trait SearchRule: Send + Sync + fmt::Debug {
    fn matches(&self, info: &FileInfo, env: &RuleEnv<'_>) -> bool;
}

/// A rule from a closure.
pub struct FnRule<F> {
    name: &'static str,
    f: F,
}

impl<F> FnRule<F>
where
    F: Fn(&FileInfo, &RuleEnv<'_>) -> bool + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> fmt::Debug for FnRule<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule").field("name", &self.name).finish()
    }
}

impl<F> SearchRule for FnRule<F>
where
    F: Fn(&FileInfo, &RuleEnv<'_>) -> bool + Send + Sync,
{
    fn matches(&self, info: &FileInfo, env: &RuleEnv<'_>) -> bool {
        (self.f)(info, env)
    }
}

#[derive(Debug, Clone)]
enum NameMatcher {
    Glob(GlobMatcher),
    Regex(Regex),
}

/// Matches the file name against a glob or a regular expression.
#[derive(Debug, Clone)]
pub struct NameRule {
    matcher: NameMatcher,
}

impl NameRule {
    pub fn new(pattern: &str, mode: NameMode, case_sensitive: bool) -> JobResult<Self> {
        let invalid = |message: String| JobError::InvalidPattern {
            pattern: pattern.to_string(),
            message,
        };
        let matcher = match mode {
            NameMode::Glob => {
                let glob = GlobBuilder::new(pattern)
                    .case_insensitive(!case_sensitive)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| invalid(e.to_string()))?;
                NameMatcher::Glob(glob.compile_matcher())
            }
            NameMode::Regex => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|e| invalid(e.to_string()))?;
                NameMatcher::Regex(regex)
            }
        };
        Ok(Self { matcher })
    }
}

impl SearchRule for NameRule {
    fn matches(&self, info: &FileInfo, _env: &RuleEnv<'_>) -> bool {
        match &self.matcher {
            NameMatcher::Glob(glob) => glob.is_match(info.name.as_str()),
            NameMatcher::Regex(regex) => regex.is_match(&info.name),
        }
    }
}

/// Accepts entries whose mime type is listed, exactly or as `type/*`.
#[derive(Debug, Clone)]
pub struct MimeRule {
    patterns: Vec<String>,
}

impl MimeRule {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }
}

impl SearchRule for MimeRule {
    fn matches(&self, info: &FileInfo, _env: &RuleEnv<'_>) -> bool {
        let mime = info.mime_type.as_str();
        self.patterns.iter().any(|pattern| match pattern.strip_suffix("/*") {
            Some(prefix) => mime
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/')),
            None => pattern == mime,
        })
    }
}

/// Size bounds in bytes, inclusive. Directories never match.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeRule {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl SearchRule for SizeRule {
    fn matches(&self, info: &FileInfo, _env: &RuleEnv<'_>) -> bool {
        !info.is_dir()
            && self.min.is_none_or(|min| info.size >= min)
            && self.max.is_none_or(|max| info.size <= max)
    }
}

/// Modification time window, inclusive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModifiedRule {
    pub after: Option<SystemTime>,
    pub before: Option<SystemTime>,
}

impl SearchRule for ModifiedRule {
    fn matches(&self, info: &FileInfo, _env: &RuleEnv<'_>) -> bool {
        self.after.is_none_or(|after| info.modified >= after)
            && self.before.is_none_or(|before| info.modified <= before)
    }
}

/// Regular files containing a pattern.
#[derive(Debug, Clone)]
pub struct ContentRule {
    matcher: ContentMatcher,
}

impl ContentRule {
    pub fn new(matcher: ContentMatcher) -> Self {
        Self { matcher }
    }
}

impl SearchRule for ContentRule {
    fn matches(&self, info: &FileInfo, env: &RuleEnv<'_>) -> bool {
        if info.kind != FileKind::Regular {
            return false;
        }
        let found = env
            .vfs()
            .open_read(&info.path)
            .and_then(|reader| self.matcher.find_in(reader, || env.is_cancelled()));
        match found {
            Ok(found) => found,
            Err(e) => {
                debug!(target: "search", path = %info.path.display(), "content not readable: {e}");
                false
            }
        }
    }
}

/// Rules applied in order; an entry matches when every rule accepts it.
#[derive(Debug, Default)]
pub struct RuleChain {
    rules: Vec<Box<dyn SearchRule>>,
}

impl RuleChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the chain described by `settings`: name, mime, size and time
    /// rules first, the content rule last.
    pub fn from_settings(settings: &SearchSettings) -> JobResult<Self> {
        let mut chain = Self::new();

        if let Some(pattern) = settings.name_pattern.as_deref().filter(|p| !p.is_empty()) {
            chain.push(NameRule::new(
                pattern,
                settings.name_mode,
                settings.name_case_sensitive,
            )?);
        }
        if !settings.mime_types.is_empty() {
            chain.push(MimeRule::new(settings.mime_types.iter().cloned()));
        }
        if settings.min_size.is_some() || settings.max_size.is_some() {
            chain.push(SizeRule {
                min: settings.min_size,
                max: settings.max_size,
            });
        }
        if settings.modified_after.is_some() || settings.modified_before.is_some() {
            chain.push(ModifiedRule {
                after: settings.modified_after,
                before: settings.modified_before,
            });
        }
        if let Some(pattern) = settings.content_pattern.as_deref().filter(|p| !p.is_empty()) {
            let matcher = ContentMatcher::new(
                pattern,
                settings.content_mode,
                settings.content_case_sensitive,
            )?
            .with_chunk_size(settings.chunk_size);
            chain.push(ContentRule::new(matcher));
        }
        Ok(chain)
    }

    pub fn push(&mut self, rule: impl SearchRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Stops at the first rule that rejects.
    pub fn matches(&self, info: &FileInfo, env: &RuleEnv<'_>) -> bool {
        self.rules.iter().all(|rule| rule.matches(info, env))
    }
}
