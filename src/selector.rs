use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use regex::{Regex, RegexBuilder};

use crate::error::{Result, SpliceError};

/// Criteria describing which node of a document an operation targets.
///
/// Selectors are validated when they are built and are immutable afterwards,
/// so a selector that exists is always well formed. They carry no reference to
/// any document and can be reused across apply calls.
///
/// ```
/// use markdown_splice::Selector;
///
/// let heading = Selector::builder().select_type("h2").contains("Usage").build()?;
/// let paragraph = Selector::builder()
///     .select_type("p")
///     .within(heading)
///     .build()?;
/// assert_eq!(paragraph.ordinal(), 1);
/// # Ok::<(), markdown_splice::SpliceError>(())
/// ```
#[derive(Debug, Clone, PartialEq, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct Selector {
    alias: Option<String>,
    select_type: Option<String>,
    contains: Option<String>,
    regex: Option<RegexSelector>,
    /// 1-based index among the matching nodes
    ordinal: usize,
    scope: Option<Scope>,
}

/// Relative positioning of a selector against another node.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// Only nodes following the anchor qualify.
    After(Anchor),
    /// Only nodes inside the anchor qualify.
    Within(Anchor),
}

/// The node a [`Scope`] is relative to, inline or by alias.
#[derive(Debug, Clone, PartialEq)]
pub enum Anchor {
    Selector(Box<Selector>),
    Ref(String),
}

impl Selector {
    pub fn builder() -> SelectorBuilder {
        SelectorBuilder::default()
    }

    pub fn after(&self) -> Option<&Selector> {
        match &self.scope {
            Some(Scope::After(Anchor::Selector(selector))) => Some(selector),
            _ => None,
        }
    }

    pub fn after_ref(&self) -> Option<&str> {
        match &self.scope {
            Some(Scope::After(Anchor::Ref(name))) => Some(name),
            _ => None,
        }
    }

    pub fn within(&self) -> Option<&Selector> {
        match &self.scope {
            Some(Scope::Within(Anchor::Selector(selector))) => Some(selector),
            _ => None,
        }
    }

    pub fn within_ref(&self) -> Option<&str> {
        match &self.scope {
            Some(Scope::Within(Anchor::Ref(name))) => Some(name),
            _ => None,
        }
    }

    /// Whether `text` passes the substring and pattern filters.
    ///
    /// The node type filter and scoping are resolved by the document engine.
    pub fn matches_text(&self, text: &str) -> bool {
        if let Some(needle) = &self.contains {
            if !text.contains(needle.as_str()) {
                return false;
            }
        }

        self.regex
            .as_ref()
            .map_or(true, |regex| regex.is_match(text))
    }
}

impl Display for Selector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut parts = vec![];
        if let Some(alias) = &self.alias {
            parts.push(format!("as {alias}"));
        }
        if let Some(select_type) = &self.select_type {
            parts.push(format!("type={select_type}"));
        }
        if let Some(contains) = &self.contains {
            parts.push(format!("contains={contains:?}"));
        }
        if let Some(regex) = &self.regex {
            parts.push(format!("regex={regex}"));
        }
        if self.ordinal != 1 {
            parts.push(format!("ordinal={}", self.ordinal));
        }
        match &self.scope {
            Some(Scope::After(anchor)) => parts.push(format!("after({anchor})")),
            Some(Scope::Within(anchor)) => parts.push(format!("within({anchor})")),
            None => {}
        }

        if parts.is_empty() {
            f.write_str("any")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

impl Display for Anchor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Selector(selector) => Display::fmt(selector, f),
            Anchor::Ref(name) => write!(f, "ref {name}"),
        }
    }
}

/// A compiled pattern together with the flags it was written with.
#[derive(Debug, Clone, fieldwork::Fieldwork)]
#[fieldwork(get)]
pub struct RegexSelector {
    pattern: String,
    #[fieldwork(get(copy))]
    flags: RegexFlags,
    #[fieldwork(skip)]
    compiled: Regex,
}

impl RegexSelector {
    pub fn new(pattern: &str, flags: RegexFlags) -> Result<Self> {
        let compiled = RegexBuilder::new(pattern)
            .case_insensitive(flags.ignore_case)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_all)
            .build()
            .map_err(|error| SpliceError::InvalidRegex(error.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            flags,
            compiled,
        })
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.compiled.is_match(text)
    }
}

impl PartialEq for RegexSelector {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.flags == other.flags
    }
}

impl Display for RegexSelector {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.flags)
    }
}

/// The regex flags a selector may carry.
///
/// Only case-insensitivity (`i`), multi-line anchors (`m`) and
/// dot-matches-newline (`s`) are honored. `u` is accepted and ignored since
/// matching is always Unicode-aware. Any other flag is an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RegexFlags {
    pub ignore_case: bool,
    pub multi_line: bool,
    pub dot_all: bool,
}

impl RegexFlags {
    pub fn is_empty(&self) -> bool {
        !(self.ignore_case || self.multi_line || self.dot_all)
    }
}

impl FromStr for RegexFlags {
    type Err = SpliceError;

    fn from_str(flags: &str) -> Result<Self> {
        let mut parsed = RegexFlags::default();
        for flag in flags.chars() {
            match flag.to_ascii_lowercase() {
                'i' => parsed.ignore_case = true,
                'm' => parsed.multi_line = true,
                's' => parsed.dot_all = true,
                'u' => {}
                other => {
                    return Err(SpliceError::InvalidRegex(format!(
                        "unsupported regex flag `{other}`; only `i`, `m` and `s` are honored"
                    )))
                }
            }
        }
        Ok(parsed)
    }
}

impl Display for RegexFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.ignore_case {
            f.write_str("i")?;
        }
        if self.multi_line {
            f.write_str("m")?;
        }
        if self.dot_all {
            f.write_str("s")?;
        }
        Ok(())
    }
}

/// Collects selector fields and validates them in [`SelectorBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct SelectorBuilder {
    alias: Option<String>,
    select_type: Option<String>,
    contains: Option<String>,
    regex: Option<(String, String)>,
    ordinal: Option<usize>,
    after: Option<Selector>,
    after_ref: Option<String>,
    within: Option<Selector>,
    within_ref: Option<String>,
}

impl SelectorBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn select_type(mut self, select_type: impl Into<String>) -> Self {
        self.select_type = Some(select_type.into());
        self
    }

    pub fn contains(mut self, contains: impl Into<String>) -> Self {
        self.contains = Some(contains.into());
        self
    }

    pub fn regex(self, pattern: impl Into<String>) -> Self {
        self.regex_with_flags(pattern, "")
    }

    pub fn regex_with_flags(mut self, pattern: impl Into<String>, flags: impl Into<String>) -> Self {
        self.regex = Some((pattern.into(), flags.into()));
        self
    }

    pub fn ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    pub fn after(mut self, anchor: Selector) -> Self {
        self.after = Some(anchor);
        self
    }

    pub fn after_ref(mut self, alias: impl Into<String>) -> Self {
        self.after_ref = Some(alias.into());
        self
    }

    pub fn within(mut self, container: Selector) -> Self {
        self.within = Some(container);
        self
    }

    pub fn within_ref(mut self, alias: impl Into<String>) -> Self {
        self.within_ref = Some(alias.into());
        self
    }

    pub fn build(self) -> Result<Selector> {
        let Self {
            alias,
            select_type,
            contains,
            regex,
            ordinal,
            after,
            after_ref,
            within,
            within_ref,
        } = self;

        let has_after = after.is_some() || after_ref.is_some();
        let has_within = within.is_some() || within_ref.is_some();
        if has_after && has_within {
            return Err(SpliceError::ConflictingScope);
        }

        let scope = match (after, after_ref, within, within_ref) {
            (Some(_), Some(_), _, _) => {
                return Err(SpliceError::InvalidArgument(
                    "use either `after` or `after_ref`, not both".into(),
                ))
            }
            (_, _, Some(_), Some(_)) => {
                return Err(SpliceError::InvalidArgument(
                    "use either `within` or `within_ref`, not both".into(),
                ))
            }
            (Some(anchor), None, None, None) => {
                Some(Scope::After(Anchor::Selector(Box::new(anchor))))
            }
            (None, Some(name), None, None) => Some(Scope::After(Anchor::Ref(non_empty(
                name,
                "after_ref",
            )?))),
            (None, None, Some(container), None) => {
                Some(Scope::Within(Anchor::Selector(Box::new(container))))
            }
            (None, None, None, Some(name)) => Some(Scope::Within(Anchor::Ref(non_empty(
                name,
                "within_ref",
            )?))),
            _ => None,
        };

        let ordinal = ordinal.unwrap_or(1);
        if ordinal == 0 {
            return Err(SpliceError::InvalidArgument(
                "`select_ordinal` must be 1 or greater".into(),
            ));
        }

        let alias = alias.map(|alias| non_empty(alias, "alias")).transpose()?;

        let regex = regex
            .map(|(pattern, flags)| RegexSelector::new(&pattern, flags.parse()?))
            .transpose()?;

        Ok(Selector {
            alias,
            select_type,
            contains,
            regex,
            ordinal,
            scope,
        })
    }
}

fn non_empty(value: String, field: &str) -> Result<String> {
    if value.trim().is_empty() {
        Err(SpliceError::InvalidArgument(format!(
            "`{field}` cannot be empty"
        )))
    } else {
        Ok(value)
    }
}
