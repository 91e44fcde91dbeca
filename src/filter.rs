//! Entry filtering for the directory walk.
//!
//! Inclusion is matched against a file's base name. Exclusion is matched
//! against the entry's full path, so an unanchored exclusion such as `vendor`
//! also hits `/srv/app/vendor_tools/x.php`; anchor it (`(^|/)vendor$`) when
//! only whole directory names should be pruned.

use regex::Regex;
use std::borrow::Cow;
use std::path::Path;

use crate::error::PatternError;

/// Files whose name ends in `.php`, any case.
pub const DEFAULT_INCLUSION: &str = r"(?i)\.php$";

const DELIMITERS: [char; 3] = ['/', '#', '~'];

#[derive(Debug, Clone)]
pub struct PathFilter {
    inclusion: Regex,
    exclusion: Option<Regex>,
}

impl Default for PathFilter {
    fn default() -> Self {
        Self {
            inclusion: default_inclusion(),
            exclusion: None,
        }
    }
}

impl PathFilter {
    pub fn new(inclusion: Regex, exclusion: Option<Regex>) -> Self {
        Self {
            inclusion,
            exclusion,
        }
    }

    /// Builds a filter from user-supplied pattern text. Empty strings count as
    /// "not supplied".
    pub fn from_patterns(
        inclusion: Option<&str>,
        exclusion: Option<&str>,
    ) -> Result<Self, PatternError> {
        let inclusion = match inclusion.filter(|p| !p.trim().is_empty()) {
            Some(p) => compile_pattern("inclusion", p)?,
            None => default_inclusion(),
        };
        let exclusion = exclusion
            .filter(|p| !p.trim().is_empty())
            .map(|p| compile_pattern("exclusion", p))
            .transpose()?;
        Ok(Self::new(inclusion, exclusion))
    }

    pub fn inclusion(&self) -> &Regex {
        &self.inclusion
    }

    pub fn exclusion(&self) -> Option<&Regex> {
        self.exclusion.as_ref()
    }

    /// File-inclusion check. Anything that is not a regular file passes so the
    /// walk can still descend; pruning is [`PathFilter::prunes`].
    pub fn accept(&self, path: &Path, is_file: bool) -> bool {
        if !is_file {
            return true;
        }
        path.file_name()
            .is_some_and(|name| self.inclusion.is_match(&name.to_string_lossy()))
    }

    /// True when the exclusion pattern matches the entry's full path.
    pub fn excludes(&self, path: &Path) -> bool {
        match &self.exclusion {
            Some(re) => re.is_match(&path.to_string_lossy()),
            None => false,
        }
    }

    /// Directory pruning: an excluded directory is never entered.
    pub fn prunes(&self, path: &Path, is_dir: bool) -> bool {
        is_dir && self.excludes(path)
    }

    /// Final verdict for a leaf entry found during the walk.
    pub fn selects_file(&self, path: &Path) -> bool {
        self.accept(path, true) && !self.excludes(path)
    }
}

fn default_inclusion() -> Regex {
    Regex::new(DEFAULT_INCLUSION).unwrap_or_else(|_| unreachable!("default pattern is valid"))
}

/// Compiles either a bare regex (`\.php$`) or a delimited one with trailing
/// flags (`/\.(?:php)$/i`).
pub fn compile_pattern(role: &'static str, raw: &str) -> Result<Regex, PatternError> {
    let source = strip_delimiters(raw)?;
    Regex::new(&source).map_err(|source| PatternError::Regex {
        role,
        pattern: raw.to_string(),
        source,
    })
}

fn strip_delimiters(raw: &str) -> Result<Cow<'_, str>, PatternError> {
    let raw = raw.trim();
    let Some(delim) = raw.chars().next().filter(|c| DELIMITERS.contains(c)) else {
        return Ok(Cow::Borrowed(raw));
    };
    let Some(end) = raw.rfind(delim).filter(|&end| end > 0) else {
        return Ok(Cow::Borrowed(raw));
    };

    let body = &raw[delim.len_utf8()..end];
    let flags = &raw[end + delim.len_utf8()..];
    if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
        return Ok(Cow::Borrowed(raw));
    }

    let mut inline = String::new();
    for flag in flags.chars() {
        match flag {
            'i' | 'm' | 's' | 'x' => {
                if !inline.contains(flag) {
                    inline.push(flag);
                }
            }
            // Unicode matching is always on.
            'u' => {}
            other => {
                return Err(PatternError::Flag {
                    flag: other,
                    pattern: raw.to_string(),
                });
            }
        }
    }

    if inline.is_empty() {
        Ok(Cow::Borrowed(body))
    } else {
        Ok(Cow::Owned(format!("(?{inline}){body}")))
    }
}
