use std::fmt::{Display, Formatter};
use std::ops::BitOr;

/// The structural shape of a [crate::common::Value].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Ordered, duplicate-key tolerant document.
    OrderedDocument,
    /// Unique-keyed map.
    UnorderedDocument,
    /// Ordered sequence of values.
    Array,
    /// Anything else: strings, numbers, booleans, null and extended literals.
    Scalar,
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Shape::OrderedDocument => write!(f, "ordered document"),
            Shape::UnorderedDocument => write!(f, "unordered document"),
            Shape::Array => write!(f, "array"),
            Shape::Scalar => write!(f, "scalar"),
        }
    }
}

/// The set of value shapes an operation accepts.
///
/// Built per call-site from the constants below:
///
/// ```rust
/// use docshell::common::AllowedShapes;
///
/// const FILTER: AllowedShapes = AllowedShapes::ORDERED_DOCUMENT.union(AllowedShapes::UNORDERED_DOCUMENT);
/// assert!(FILTER.contains(AllowedShapes::UNORDERED_DOCUMENT));
/// assert!(!FILTER.contains(AllowedShapes::ARRAY));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AllowedShapes(u8);

impl AllowedShapes {
    pub const NONE: AllowedShapes = AllowedShapes(0);
    pub const ORDERED_DOCUMENT: AllowedShapes = AllowedShapes(1);
    pub const UNORDERED_DOCUMENT: AllowedShapes = AllowedShapes(1 << 1);
    pub const ARRAY: AllowedShapes = AllowedShapes(1 << 2);
    pub const ARRAY_OF_ORDERED_DOCUMENT: AllowedShapes = AllowedShapes(1 << 3);

    /// Both document forms; what filters, projections and sort specs accept.
    pub const ANY_DOCUMENT: AllowedShapes =
        AllowedShapes::ORDERED_DOCUMENT.union(AllowedShapes::UNORDERED_DOCUMENT);

    pub const fn union(self, other: AllowedShapes) -> AllowedShapes {
        AllowedShapes(self.0 | other.0)
    }

    pub const fn contains(self, other: AllowedShapes) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether a value of `shape` is accepted without coercion.
    pub fn accepts(self, shape: Shape) -> bool {
        match shape {
            Shape::OrderedDocument => self.contains(AllowedShapes::ORDERED_DOCUMENT),
            Shape::UnorderedDocument => self.contains(AllowedShapes::UNORDERED_DOCUMENT),
            Shape::Array => self.contains(AllowedShapes::ARRAY),
            Shape::Scalar => false,
        }
    }
}

impl BitOr for AllowedShapes {
    type Output = AllowedShapes;

    fn bitor(self, rhs: AllowedShapes) -> AllowedShapes {
        self.union(rhs)
    }
}

impl Display for AllowedShapes {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = [
            (AllowedShapes::ORDERED_DOCUMENT, "ordered document"),
            (AllowedShapes::UNORDERED_DOCUMENT, "unordered document"),
            (AllowedShapes::ARRAY, "array"),
            (AllowedShapes::ARRAY_OF_ORDERED_DOCUMENT, "array of ordered documents"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();

        if names.is_empty() {
            write!(f, "nothing")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}
