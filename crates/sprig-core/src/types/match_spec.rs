//! Match spec grammar.
//!
//! A match spec selects package records by name, version, build and origin:
//!
//! ```text
//! numpy
//! numpy 1.26              # fuzzy: any 1.26.x
//! numpy 1.26.4 py311_0    # exact version and build
//! numpy=1.26=py311*       # same, with a build glob
//! numpy>=1.20,<2|==2.1.0  # ',' binds tighter than '|'
//! conda-forge::numpy
//! conda-forge/linux-64::numpy[build_number='>=1', fn='numpy-1.26.4-py311_0.tar.bz2']
//! ```

use std::fmt;
use std::str::FromStr;

use glob::Pattern;

use super::platform::is_known_subdir;
use super::record::PackageRecord;
use super::version::OrderedVersion;
use crate::error::{SprigError, SprigResult};

/// Comparison operator in a version or build number constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,         // ==1.0
    Ne,         // !=1.0
    Gt,         // >1.0
    Ge,         // >=1.0
    Lt,         // <1.0
    Le,         // <=1.0
    StartsWith, // 1.0.* or =1.0
    NotStartsWith,
    Compatible, // ~=1.0.2
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::StartsWith => "",
            Op::NotStartsWith => "!=",
            Op::Compatible => "~=",
        }
    }
}

/// Version constraint tree
#[derive(Debug, Clone, PartialEq)]
pub enum VersionSpec {
    Any,
    Constraint(Op, OrderedVersion),
    All(Vec<VersionSpec>),
    AnyOf(Vec<VersionSpec>),
}

impl VersionSpec {
    /// Parse a version constraint such as `>=1.0,<2|3.*`.
    ///
    /// With `bare_is_prefix` an operator-less version like `1.2` means `1.2.*`,
    /// otherwise it means `==1.2`.
    pub fn parse(text: &str, bare_is_prefix: bool) -> Result<Self, String> {
        let alternatives = text
            .split('|')
            .map(|alt| {
                let terms = alt
                    .split(',')
                    .map(|term| parse_term(term.trim(), bare_is_prefix))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(collapse(terms, true))
            })
            .collect::<Result<Vec<_>, String>>()?;
        Ok(collapse(alternatives, false))
    }

    /// Check whether a version satisfies this constraint
    pub fn matches(&self, version: &OrderedVersion) -> bool {
        match self {
            VersionSpec::Any => true,
            VersionSpec::Constraint(op, v) => match op {
                Op::Eq => version == v,
                Op::Ne => version != v,
                Op::Gt => version > v,
                Op::Ge => version >= v,
                Op::Lt => version < v,
                Op::Le => version <= v,
                Op::StartsWith => version.starts_with(v),
                Op::NotStartsWith => !version.starts_with(v),
                Op::Compatible => version.is_compatible_with(v),
            },
            VersionSpec::All(specs) => specs.iter().all(|s| s.matches(version)),
            VersionSpec::AnyOf(specs) => specs.iter().any(|s| s.matches(version)),
        }
    }

    fn exact(&self) -> Option<&OrderedVersion> {
        match self {
            VersionSpec::Constraint(Op::Eq, v) => Some(v),
            _ => None,
        }
    }
}

fn collapse(mut specs: Vec<VersionSpec>, is_and: bool) -> VersionSpec {
    if specs.len() > 1 && specs.iter().any(|s| matches!(s, VersionSpec::Any)) {
        // `*` is a no-op inside an AND and absorbs everything inside an OR
        if !is_and {
            return VersionSpec::Any;
        }
        specs.retain(|s| !matches!(s, VersionSpec::Any));
    }
    match specs.len() {
        1 => specs.remove(0),
        _ if is_and => VersionSpec::All(specs),
        _ => VersionSpec::AnyOf(specs),
    }
}

fn parse_term(term: &str, bare_is_prefix: bool) -> Result<VersionSpec, String> {
    if term.is_empty() {
        return Err(term.to_string());
    }
    if term == "*" {
        return Ok(VersionSpec::Any);
    }

    const OPERATORS: &[(&str, Op)] = &[
        ("==", Op::Eq),
        ("!=", Op::Ne),
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("~=", Op::Compatible),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("=", Op::StartsWith),
    ];

    let (op, rest) = OPERATORS
        .iter()
        .find_map(|(symbol, op)| term.strip_prefix(symbol).map(|rest| (Some(*op), rest)))
        .unwrap_or((None, term));

    let (starred, version_text) = match rest.strip_suffix(".*").or_else(|| rest.strip_suffix('*')) {
        Some(stripped) => (true, stripped),
        None => (false, rest),
    };
    let version = OrderedVersion::parse(version_text).map_err(|_| term.to_string())?;

    let op = match (op, starred) {
        (None, true) | (Some(Op::StartsWith), _) | (Some(Op::Eq), true) => Op::StartsWith,
        (Some(Op::Ne), true) => Op::NotStartsWith,
        (None, false) if bare_is_prefix => Op::StartsWith,
        (None, false) => Op::Eq,
        // `>=1.2.*` means `>=1.2`
        (Some(op), _) => op,
    };
    Ok(VersionSpec::Constraint(op, version))
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Any => f.write_str("*"),
            VersionSpec::Constraint(Op::StartsWith, v) => write!(f, "{}.*", v),
            VersionSpec::Constraint(Op::NotStartsWith, v) => write!(f, "!={}.*", v),
            VersionSpec::Constraint(op, v) => write!(f, "{}{}", op.symbol(), v),
            VersionSpec::All(specs) => write_joined(f, specs, ","),
            VersionSpec::AnyOf(specs) => write_joined(f, specs, "|"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, specs: &[VersionSpec], sep: &str) -> fmt::Result {
    for (i, spec) in specs.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{}", spec)?;
    }
    Ok(())
}

/// Exact string or `*` glob, used for names and build strings
#[derive(Debug, Clone, PartialEq)]
pub enum StringMatch {
    Exact(String),
    Glob(Pattern),
}

impl StringMatch {
    fn parse(text: &str) -> Result<Self, String> {
        if text.contains('*') {
            Pattern::new(text).map(StringMatch::Glob).map_err(|_| text.to_string())
        } else {
            Ok(StringMatch::Exact(text.to_string()))
        }
    }

    /// Check whether a value matches
    pub fn matches(&self, value: &str) -> bool {
        match self {
            StringMatch::Exact(s) => s == value,
            StringMatch::Glob(p) => p.matches(value),
        }
    }

    /// The literal value when this is not a glob
    pub fn exact(&self) -> Option<&str> {
        match self {
            StringMatch::Exact(s) => Some(s),
            StringMatch::Glob(_) => None,
        }
    }
}

impl fmt::Display for StringMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringMatch::Exact(s) => f.write_str(s),
            StringMatch::Glob(p) => f.write_str(p.as_str()),
        }
    }
}

/// Build number constraint (`3`, `>=2`, ...)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildNumberSpec {
    pub op: Op,
    pub value: u64,
}

impl BuildNumberSpec {
    fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let (op, digits) = [("==", Op::Eq), ("!=", Op::Ne), (">=", Op::Ge), ("<=", Op::Le), (">", Op::Gt), ("<", Op::Lt)]
            .iter()
            .find_map(|(symbol, op)| text.strip_prefix(symbol).map(|rest| (*op, rest)))
            .unwrap_or((Op::Eq, text));
        let value = digits.trim().parse().map_err(|_| text.to_string())?;
        Ok(Self { op, value })
    }

    /// Check whether a build number satisfies this constraint
    pub fn matches(&self, build_number: u64) -> bool {
        match self.op {
            Op::Ne => build_number != self.value,
            Op::Gt => build_number > self.value,
            Op::Ge => build_number >= self.value,
            Op::Lt => build_number < self.value,
            Op::Le => build_number <= self.value,
            _ => build_number == self.value,
        }
    }
}

impl fmt::Display for BuildNumberSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Op::Eq => write!(f, "{}", self.value),
            op => write!(f, "{}{}", op.symbol(), self.value),
        }
    }
}

/// A query over package records. Empty fields match anything.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSpec {
    pub name: StringMatch,
    pub version: Option<VersionSpec>,
    pub build: Option<StringMatch>,
    pub build_number: Option<BuildNumberSpec>,
    pub channel: Option<String>,
    pub subdir: Option<String>,
    pub file_name: Option<String>,
}

const BRACKET_KEYS: &[&str] = &["version", "build", "build_number", "channel", "subdir", "fn", "name"];

impl MatchSpec {
    /// Parse a match spec string
    pub fn parse(input: &str) -> SprigResult<Self> {
        let invalid = |token: &str| SprigError::InvalidSpec {
            spec: input.to_string(),
            token: token.to_string(),
        };

        let text = input.trim();
        if text.is_empty() {
            return Err(invalid(""));
        }

        // Bracket list
        let (body, brackets) = match text.find('[') {
            Some(open) => {
                let inner = text[open + 1..].strip_suffix(']').ok_or_else(|| invalid("["))?;
                (&text[..open], Some(inner))
            },
            None => (text, None),
        };
        if body.contains(']') {
            return Err(invalid("]"));
        }

        // Channel prefix
        let (channel, subdir, body) = match body.rsplit_once("::") {
            Some((prefix, rest)) => {
                if prefix.trim().is_empty() {
                    return Err(invalid("::"));
                }
                let (channel, subdir) = split_channel_subdir(prefix.trim());
                (Some(channel.to_string()), subdir.map(str::to_string), rest)
            },
            None => (None, None, body),
        };

        let body = normalize_whitespace(body);
        let name_end = body
            .find(|c: char| c == ' ' || "=<>!~,|".contains(c))
            .unwrap_or(body.len());
        let (name_text, rest) = body.split_at(name_end);

        if name_text.is_empty() {
            return Err(invalid(body.split(' ').next().unwrap_or(&body)));
        }
        if let Some(bad) = name_text
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "-_.*".contains(*c)))
        {
            return Err(invalid(&bad.to_string()));
        }
        let name = StringMatch::parse(&name_text.to_ascii_lowercase()).map_err(|t| invalid(&t))?;

        let (version_text, build_text, bare_is_prefix) = split_version_build(rest).map_err(|t| invalid(&t))?;

        let mut spec = Self {
            name,
            version: None,
            build: None,
            build_number: None,
            channel,
            subdir,
            file_name: None,
        };

        if let Some(version_text) = version_text {
            spec.version = Some(VersionSpec::parse(version_text, bare_is_prefix).map_err(|t| invalid(&t))?);
        }
        if let Some(build_text) = build_text {
            spec.build = Some(parse_build(build_text).map_err(|t| invalid(&t))?);
        }

        if let Some(inner) = brackets {
            for item in split_bracket_items(inner) {
                let item = item.trim();
                if item.is_empty() {
                    continue;
                }
                let (key, value) = item.split_once('=').ok_or_else(|| invalid(item))?;
                let key = key.trim();
                if !BRACKET_KEYS.contains(&key) {
                    return Err(invalid(key));
                }
                let value = unquote(value.trim());
                if value.is_empty() {
                    return Err(invalid(item));
                }
                spec.apply_bracket(key, value).map_err(|t| invalid(&t))?;
            }
        }

        spec.version = spec.version.filter(|v| !matches!(v, VersionSpec::Any));
        Ok(spec)
    }

    fn apply_bracket(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "version" => self.version = Some(VersionSpec::parse(value, false)?),
            "build" => self.build = Some(parse_build(value)?),
            "build_number" => self.build_number = Some(BuildNumberSpec::parse(value)?),
            "channel" => {
                let (channel, subdir) = split_channel_subdir(value);
                self.channel = Some(channel.to_string());
                if let Some(subdir) = subdir {
                    self.subdir = Some(subdir.to_string());
                }
            },
            "subdir" => self.subdir = Some(value.to_string()),
            "fn" => self.file_name = Some(value.to_string()),
            "name" => {
                let name = StringMatch::parse(&value.to_ascii_lowercase())?;
                if self.name != name {
                    return Err(value.to_string());
                }
            },
            _ => return Err(key.to_string()),
        }
        Ok(())
    }

    /// Check whether a record satisfies every constrained field
    pub fn matches(&self, record: &PackageRecord) -> bool {
        self.name.matches(&record.name)
            && self.version.as_ref().map_or(true, |v| v.matches(&record.version))
            && self.build.as_ref().map_or(true, |b| b.matches(&record.build))
            && self.build_number.map_or(true, |b| b.matches(record.build_number))
            && self.matches_origin(record)
            && self.file_name.as_ref().map_or(true, |f| *f == record.file_name())
    }

    /// Check only the channel and subdir constraints
    pub fn matches_origin(&self, record: &PackageRecord) -> bool {
        self.subdir.as_ref().map_or(true, |s| *s == record.subdir)
            && self.channel.as_ref().map_or(true, |c| channel_matches(c, &record.channel))
    }

    /// Exact package name, if the name is not a glob
    pub fn exact_name(&self) -> Option<&str> {
        self.name.exact()
    }

    /// Literal value of `field` when it is constrained to a single exact value
    pub fn get_exact_value(&self, field: &str) -> Option<String> {
        match field {
            "name" => self.name.exact().map(str::to_string),
            "version" => self.version.as_ref().and_then(VersionSpec::exact).map(|v| v.to_string()),
            "build" => self.build.as_ref().and_then(StringMatch::exact).map(str::to_string),
            "build_number" => self
                .build_number
                .filter(|b| b.op == Op::Eq)
                .map(|b| b.value.to_string()),
            "channel" => self.channel.clone(),
            "subdir" => self.subdir.clone(),
            "fn" => self.file_name.clone(),
            _ => None,
        }
    }
}

fn channel_matches(spec_channel: &str, record_channel: &str) -> bool {
    let spec_channel = spec_channel.trim_end_matches('/');
    let record_channel = record_channel.trim_end_matches('/');
    spec_channel == record_channel || record_channel.ends_with(&format!("/{}", spec_channel))
}

fn split_channel_subdir(text: &str) -> (&str, Option<&str>) {
    match text.rsplit_once('/') {
        Some((channel, subdir)) if is_known_subdir(subdir) && !channel.is_empty() => (channel, Some(subdir)),
        _ => (text, None),
    }
}

fn parse_build(text: &str) -> Result<StringMatch, String> {
    if let Some(bad) = text
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || "-_.+*".contains(*c)))
    {
        return Err(bad.to_string());
    }
    StringMatch::parse(text)
}

/// Collapse whitespace runs and drop whitespace around operators,
/// so `numpy >= 1.0, < 2` reads as `numpy >=1.0,<2`.
fn normalize_whitespace(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let chars: Vec<char> = body.trim().chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if !c.is_whitespace() {
            out.push(c);
            i += 1;
            continue;
        }
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let prev = out.chars().last();
        let next = chars.get(i).copied();
        let after_operator = prev.map_or(false, |p| "<>=!~,|".contains(p));
        let before_separator = next.map_or(false, |n| ",|".contains(n));
        if !after_operator && !before_separator {
            out.push(' ');
        }
    }
    out
}

/// Split what follows the name into version text, build text and whether a
/// bare version is fuzzy.
fn split_version_build(rest: &str) -> Result<(Option<&str>, Option<&str>, bool), String> {
    if rest.is_empty() {
        return Ok((None, None, false));
    }

    if let Some(spaced) = rest.strip_prefix(' ') {
        let tokens: Vec<&str> = spaced.split(' ').collect();
        return match tokens.as_slice() {
            [version] => Ok((Some(*version), None, true)),
            [version, build] => Ok((Some(*version), Some(*build), false)),
            [_, _, extra, ..] => Err(extra.to_string()),
            [] => Ok((None, None, false)),
        };
    }

    // `name=1.2` and `name=1.2=build`
    if let Some(eq_form) = rest.strip_prefix('=').filter(|r| !r.starts_with('=')) {
        let parts: Vec<&str> = eq_form.split('=').collect();
        return match parts.as_slice() {
            [version] => Ok((Some(*version), None, true)),
            [version, build] => Ok((Some(*version), Some(*build), false)),
            [_, _, extra, ..] => Err(extra.to_string()),
            [] => Ok((None, None, false)),
        };
    }

    // operator form, optionally followed by a build
    match rest.split_once(' ') {
        Some((_, build)) if build.contains(' ') => Err(build.split(' ').last().unwrap_or(build).to_string()),
        Some((version, build)) => Ok((Some(version), Some(build), false)),
        None => Ok((Some(rest), None, false)),
    }
}

fn split_bracket_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (None, '\'' | '"') => quote = Some(c),
            (Some(q), _) if q == c => quote = None,
            (None, ',') => {
                items.push(&inner[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    items.push(&inner[start..]);
    items
}

fn unquote(value: &str) -> &str {
    for q in ['\'', '"'] {
        if let Some(inner) = value.strip_prefix(q).and_then(|v| v.strip_suffix(q)) {
            return inner;
        }
    }
    value
}

impl FromStr for MatchSpec {
    type Err = SprigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut brackets: Vec<String> = Vec::new();

        match (&self.channel, &self.subdir) {
            (Some(channel), Some(subdir)) => write!(f, "{}/{}::", channel, subdir)?,
            (Some(channel), None) => write!(f, "{}::", channel)?,
            (None, Some(subdir)) => brackets.push(format!("subdir={}", subdir)),
            (None, None) => {},
        }

        write!(f, "{}", self.name)?;

        match (&self.version, &self.build) {
            (Some(version), build) => {
                let rendered = version.to_string();
                let starts_with_operator = rendered.starts_with(|c: char| "=<>!~".contains(c));
                if !starts_with_operator {
                    f.write_str(" ")?;
                }
                f.write_str(&rendered)?;
                if let Some(build) = build {
                    write!(f, " {}", build)?;
                }
            },
            (None, Some(build)) => write!(f, " * {}", build)?,
            (None, None) => {},
        }

        if let Some(build_number) = self.build_number {
            brackets.push(format!("build_number='{}'", build_number));
        }
        if let Some(file_name) = &self.file_name {
            brackets.push(format!("fn='{}'", file_name));
        }
        if !brackets.is_empty() {
            write!(f, "[{}]", brackets.join(", "))?;
        }
        Ok(())
    }
}
