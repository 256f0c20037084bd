use regex::Regex;

use crate::app::{Result, TubechanError};
use crate::domain::FeedOptions;

const STRAIGHT: char = '"';
const OPEN: char = '«';
const CLOSE: char = '»';

/// Cleans display titles: strips a configured pattern, then optionally
/// rewrites straight quotes as guillemet pairs and drops one wrapping pair.
#[derive(Debug, Clone, Default)]
pub struct TitleNormalizer {
    clean: Option<Regex>,
    unquote: bool,
}

impl TitleNormalizer {
    pub fn new(pattern: Option<&str>, unquote: bool) -> Result<Self> {
        let clean = match pattern.filter(|p| !p.is_empty()) {
            Some(p) => Some(
                Regex::new(p)
                    .map_err(|e| TubechanError::Config(format!("title pattern `{}`: {}", p, e)))?,
            ),
            None => None,
        };
        Ok(Self { clean, unquote })
    }

    pub fn from_options(options: &FeedOptions) -> Result<Self> {
        Self::new(options.title_clean.as_deref(), options.title_unquote)
    }

    pub fn normalize(&self, title: &str) -> String {
        let cleaned = match &self.clean {
            Some(re) => re.replace_all(title, ""),
            None => title.into(),
        };
        let mut title = cleaned.trim().to_string();

        if self.unquote {
            title = pair_straight_quotes(&title);
            if let Some(inner) = strip_wrapping_pair(&title) {
                title = inner.to_string();
            }
        }

        title.trim().to_string()
    }
}

/// Replaces straight quotes two at a time with `«` and `»`. An odd one out
/// becomes an opening guillemet.
fn pair_straight_quotes(title: &str) -> String {
    let mut opening = true;
    title
        .chars()
        .map(|c| {
            if c != STRAIGHT {
                return c;
            }
            let replacement = if opening { OPEN } else { CLOSE };
            opening = !opening;
            replacement
        })
        .collect()
}

/// The text inside `«...»` when the guillemets wrap the whole title and
/// nothing inside is a quote.
fn strip_wrapping_pair(title: &str) -> Option<&str> {
    let inner = title.strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    if inner.contains([STRAIGHT, OPEN, CLOSE]) {
        return None;
    }
    Some(inner)
}
