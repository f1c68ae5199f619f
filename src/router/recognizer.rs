//! Segment recognizers for path parameters.
//!
//! A recognizer decides whether one concrete request segment can stand for a
//! `{name}` placeholder, based only on the primitive type(s) declared for the
//! parameter's schema:
//!
//! | declared type          | accepted segment          |
//! |------------------------|---------------------------|
//! | `string`, untyped      | any non-empty text        |
//! | `number`, `integer`    | ASCII digits only         |
//! | `boolean`              | exactly `true` or `false` |
//! | anything else          | any non-empty text        |
//!
//! Several declared types are combined with OR. Because `string` accepts
//! everything, the reachable combinations collapse to four patterns, which
//! are compiled once and shared.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

static ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:.+)$").expect("Failed to compile recognizer regex"));
static DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]+)$").expect("Failed to compile recognizer regex"));
static BOOLEAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:true|false)$").expect("Failed to compile recognizer regex"));
static DIGITS_OR_BOOLEAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[0-9]+|true|false)$").expect("Failed to compile recognizer regex")
});

/// Literal form a declared primitive type can serialize to inside a path segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentClass {
    /// `number` / `integer`
    Digits,
    /// `boolean`
    Boolean,
    /// `string`, untyped, or unknown
    Any,
}

impl SegmentClass {
    /// Map an OpenAPI primitive type name; `None` for names outside the table
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(SegmentClass::Any),
            "number" | "integer" => Some(SegmentClass::Digits),
            "boolean" => Some(SegmentClass::Boolean),
            _ => None,
        }
    }
}

/// Compiled accept-test for one parameter position in the route tree
#[derive(Clone)]
pub struct Recognizer {
    classes: BTreeSet<SegmentClass>,
    regex: &'static Regex,
}

impl Recognizer {
    /// Recognizer accepting any non-empty segment
    #[must_use]
    pub fn unconstrained() -> Self {
        Self::from_classes(BTreeSet::from([SegmentClass::Any]))
    }

    /// Build a recognizer from the declared type names of a parameter schema.
    ///
    /// An empty list, or any name outside the supported table, yields the
    /// unconstrained recognizer.
    #[must_use]
    pub fn for_types<S: AsRef<str>>(types: &[S]) -> Self {
        let mut classes = BTreeSet::new();
        for name in types {
            match SegmentClass::from_type_name(name.as_ref()) {
                Some(class) => {
                    classes.insert(class);
                }
                None => return Self::unconstrained(),
            }
        }
        if classes.is_empty() {
            return Self::unconstrained();
        }
        Self::from_classes(classes)
    }

    /// Disjunction of two recognizers
    #[must_use]
    pub fn union(&self, other: &Recognizer) -> Self {
        let classes = self.classes.union(&other.classes).copied().collect();
        Self::from_classes(classes)
    }

    fn from_classes(mut classes: BTreeSet<SegmentClass>) -> Self {
        if classes.contains(&SegmentClass::Any) {
            classes = BTreeSet::from([SegmentClass::Any]);
        }
        let digits = classes.contains(&SegmentClass::Digits);
        let boolean = classes.contains(&SegmentClass::Boolean);
        let regex: &'static Regex = match (digits, boolean) {
            _ if classes.contains(&SegmentClass::Any) => &ANY,
            (true, true) => &DIGITS_OR_BOOLEAN,
            (true, false) => &DIGITS,
            (false, true) => &BOOLEAN,
            (false, false) => &ANY,
        };
        Self { classes, regex }
    }

    /// Whether `segment` is accepted in full
    #[inline]
    #[must_use]
    pub fn is_match(&self, segment: &str) -> bool {
        self.regex.is_match(segment)
    }

    /// Anchored pattern source
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn is_unconstrained(&self) -> bool {
        self.classes.contains(&SegmentClass::Any)
    }

    /// Segment classes this recognizer accepts, in a fixed order
    pub fn classes(&self) -> impl Iterator<Item = SegmentClass> + '_ {
        self.classes.iter().copied()
    }
}

impl PartialEq for Recognizer {
    fn eq(&self, other: &Self) -> bool {
        self.classes == other.classes
    }
}

impl Eq for Recognizer {}

impl fmt::Debug for Recognizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recognizer")
            .field("pattern", &self.as_str())
            .finish()
    }
}
