//! Shared primitives for the pagehand automation crates.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for the browser instance managed by the driver.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct BrowserId(pub Uuid);

/// Unique identifier for a page/tab.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct PageId(pub Uuid);

/// Unique identifier for a CDP session.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SessionId(pub Uuid);

impl BrowserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BrowserId {
    fn default() -> Self {
        Self::new()
    }
}

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Selector engine tag accepted by the element resolver.
///
/// `Css` queries the structural selector language (`querySelector`); `XPath`
/// evaluates a path expression over the document tree and can reach nodes
/// structural selectors cannot.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(rename_all = "lowercase"))]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum SelectorEngine {
    Css,
    XPath,
}

/// Raised when a wire-level engine tag does not name a known engine.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("unsupported selector engine '{0}'")]
pub struct UnknownEngine(pub String);

impl SelectorEngine {
    /// Parse the wire tag used in option bags (`"css"` / `"xpath"`).
    pub fn parse(tag: &str) -> Result<Self, UnknownEngine> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "css" => Ok(SelectorEngine::Css),
            "xpath" => Ok(SelectorEngine::XPath),
            other => Err(UnknownEngine(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorEngine::Css => "css",
            SelectorEngine::XPath => "xpath",
        }
    }
}

impl fmt::Display for SelectorEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual rectangle a rendered node currently occupies, in viewport
/// coordinates. Captured immediately before any pointer action; a box with
/// no area means the element is not interactable.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Center of the box; the target for pointer positioning.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether the box occupies any renderable area.
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Helper return shape: a bare value in single-element mode (or when a
/// multi-element query matched exactly one node) and an ordered list
/// otherwise.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde-full", serde(untagged))]
#[derive(Clone, Debug, PartialEq)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Collapse a per-element result list according to the multiplicity
    /// rule: exactly one value unwraps to `One`, anything else is `Many`.
    pub fn from_results(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            OneOrMany::One(values.remove(0))
        } else {
            OneOrMany::Many(values)
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into an ordered list regardless of shape.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}
