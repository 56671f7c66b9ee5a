//! Package version ordering.
//!
//! Versions are free-form strings such as `1.2.0`, `2!1.0`, `1.0a1`,
//! `1.0.post2` or `3.1+local.7`. They are split into components on `.`, `-`
//! and `_`, each component is split into digit and letter runs, and the result
//! is compared component-wise with missing components treated as zero.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SprigError, SprigResult};

/// One run inside a version component.
///
/// The derived order is the version order: `dev` sorts before every other
/// string, strings sort before numbers and `post` sorts after everything.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {
    Dev,
    Str(String),
    Int(u64),
    Post,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Dev => f.write_str("dev"),
            Segment::Str(s) => f.write_str(s),
            Segment::Int(n) => write!(f, "{}", n),
            Segment::Post => f.write_str("post"),
        }
    }
}

const ZERO: Segment = Segment::Int(0);

type Component = Vec<Segment>;

/// A parsed version with a total order.
///
/// The original text is kept for display and identity; comparisons use the
/// parsed components, so `1.2` and `1.2.0` compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OrderedVersion {
    raw: String,
    epoch: u64,
    public: Vec<Component>,
    local: Vec<Component>,
}

impl OrderedVersion {
    /// Parse a version string
    pub fn parse(input: &str) -> SprigResult<Self> {
        let malformed = |reason: &str| SprigError::MalformedVersion {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let text = input.trim();
        if text.is_empty() {
            return Err(malformed("version is empty"));
        }
        if let Some(bad) = text
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+' | '!')))
        {
            return Err(malformed(&format!("illegal character '{}'", bad)));
        }

        let lowered = text.to_ascii_lowercase();

        let (epoch, rest) = match lowered.split_once('!') {
            Some((epoch, rest)) => {
                let epoch = epoch
                    .parse::<u64>()
                    .map_err(|_| malformed("epoch must be a non-negative integer"))?;
                (epoch, rest)
            },
            None => (0, lowered.as_str()),
        };
        if rest.contains('!') {
            return Err(malformed("more than one epoch separator"));
        }

        let (public, local) = match rest.split_once('+') {
            Some((public, local)) => {
                if local.contains('+') {
                    return Err(malformed("more than one local version separator"));
                }
                (public, Some(local))
            },
            None => (rest, None),
        };

        let public = parse_components(public).map_err(|reason| malformed(&reason))?;
        let local = match local {
            Some(local) => parse_components(local).map_err(|reason| malformed(&reason))?,
            None => Vec::new(),
        };

        Ok(Self {
            raw: text.to_string(),
            epoch,
            public,
            local,
        })
    }

    /// The version text as it was written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Check whether this version lies under `prefix`, as in `1.2.*`.
    ///
    /// Every component of the prefix but the last must equal the matching
    /// component here; the last one must be a leading run of the matching
    /// component, so `1.0` is a prefix of `1.0a1` but not of `1.01`.
    pub fn starts_with(&self, prefix: &OrderedVersion) -> bool {
        if self.epoch != prefix.epoch {
            return false;
        }
        let Some((last, init)) = prefix.public.split_last() else {
            return true;
        };

        for (i, component) in init.iter().enumerate() {
            let ours = self.public.get(i).map(Vec::as_slice).unwrap_or(&[]);
            if compare_component(ours, component) != Ordering::Equal {
                return false;
            }
        }

        let ours = self.public.get(init.len()).map(Vec::as_slice).unwrap_or(&[]);
        last.iter().enumerate().all(|(i, segment)| match ours.get(i) {
            Some(s) => s == segment,
            None => *segment == ZERO,
        })
    }

    /// Check the `~=` compatible release operator
    pub fn is_compatible_with(&self, base: &OrderedVersion) -> bool {
        if self < base {
            return false;
        }
        if base.public.len() < 2 {
            return true;
        }
        let mut prefix = base.clone();
        prefix.public.pop();
        prefix.local.clear();
        self.starts_with(&prefix)
    }
}

fn parse_components(text: &str) -> Result<Vec<Component>, String> {
    text.split(['.', '-', '_'])
        .map(|part| {
            if part.is_empty() {
                return Err("empty version component".to_string());
            }
            parse_component(part)
        })
        .collect()
}

fn parse_component(part: &str) -> Result<Component, String> {
    let mut segments = Vec::new();
    let mut chars = part.char_indices().peekable();

    while let Some(&(start, first)) = chars.peek() {
        let numeric = first.is_ascii_digit();
        let mut end = start;
        while let Some(&(i, c)) = chars.peek() {
            if c.is_ascii_digit() != numeric {
                break;
            }
            end = i + c.len_utf8();
            chars.next();
        }

        let run = &part[start..end];
        let segment = if numeric {
            Segment::Int(
                run.parse()
                    .map_err(|_| format!("numeric component '{}' is too large", run))?,
            )
        } else {
            match run {
                "dev" => Segment::Dev,
                "post" => Segment::Post,
                _ => Segment::Str(run.to_string()),
            }
        };
        segments.push(segment);
    }

    // A component that starts with letters sorts as if it had a leading zero
    if !matches!(segments.first(), Some(Segment::Int(_))) {
        segments.insert(0, ZERO);
    }
    Ok(segments)
}

fn compare_component(a: &[Segment], b: &[Segment]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).unwrap_or(&ZERO);
        let y = b.get(i).unwrap_or(&ZERO);
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

fn compare_components(a: &[Component], b: &[Component]) -> Ordering {
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).map(Vec::as_slice).unwrap_or(&[]);
        let y = b.get(i).map(Vec::as_slice).unwrap_or(&[]);
        match compare_component(x, y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

impl Ord for OrderedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_components(&self.public, &other.public))
            .then_with(|| compare_components(&self.local, &other.local))
    }
}

impl PartialOrd for OrderedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OrderedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedVersion {}

impl FromStr for OrderedVersion {
    type Err = SprigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OrderedVersion {
    type Error = SprigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OrderedVersion> for String {
    fn from(version: OrderedVersion) -> Self {
        version.raw
    }
}

impl fmt::Display for OrderedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
