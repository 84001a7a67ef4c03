//! Document metadata model.
//!
//! [`Metadata`] is the caller-owned value consumed by the composer on save
//! and produced by a reader on open. It carries the PDF version, the classic
//! Info-dictionary text fields, and the document's viewer preferences.

use serde::{Deserialize, Serialize};

/// A PDF version as `major.minor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfVersion {
    /// Major version, always 1 for the documents this crate produces.
    pub major: u8,
    /// Minor version. Values of 5 and above enable full stream compression
    /// on save.
    pub minor: u8,
}

impl PdfVersion {
    /// Create a version.
    pub fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parse a version from a header string such as `"1.7"`.
    ///
    /// Unparseable input falls back to the default (1.7).
    pub fn parse(text: &str) -> Self {
        let mut parts = text.trim().splitn(2, '.');
        let major = parts.next().and_then(|p| p.parse().ok());
        let minor = parts.next().and_then(|p| p.parse().ok());
        match (major, minor) {
            (Some(major), Some(minor)) => Self { major, minor },
            _ => Self::default(),
        }
    }
}

impl Default for PdfVersion {
    fn default() -> Self {
        Self { major: 1, minor: 7 }
    }
}

impl std::fmt::Display for PdfVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Page layout preferences advertised to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageLayout {
    /// One page at a time.
    #[default]
    SinglePage,
    /// Pages in one continuous column.
    OneColumn,
    /// Two columns, odd pages on the left.
    TwoColumnLeft,
    /// Two columns, odd pages on the right.
    TwoColumnRight,
    /// Two pages at a time, odd pages on the left.
    TwoPageLeft,
    /// Two pages at a time, odd pages on the right.
    TwoPageRight,
}

impl PageLayout {
    /// The catalog name for this layout.
    pub fn as_name(&self) -> &'static str {
        match self {
            PageLayout::SinglePage => "SinglePage",
            PageLayout::OneColumn => "OneColumn",
            PageLayout::TwoColumnLeft => "TwoColumnLeft",
            PageLayout::TwoColumnRight => "TwoColumnRight",
            PageLayout::TwoPageLeft => "TwoPageLeft",
            PageLayout::TwoPageRight => "TwoPageRight",
        }
    }

    /// Parse a catalog name, defaulting to `SinglePage` for unknown values.
    pub fn from_name(name: &str) -> Self {
        match name {
            "OneColumn" => PageLayout::OneColumn,
            "TwoColumnLeft" => PageLayout::TwoColumnLeft,
            "TwoColumnRight" => PageLayout::TwoColumnRight,
            "TwoPageLeft" => PageLayout::TwoPageLeft,
            "TwoPageRight" => PageLayout::TwoPageRight,
            _ => PageLayout::SinglePage,
        }
    }
}

/// Document metadata.
///
/// Text fields are `None` when absent; [`Metadata::new`] trims whitespace and
/// drops empty strings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metadata {
    /// PDF version of the document.
    pub version: PdfVersion,
    /// Document title.
    pub title: Option<String>,
    /// Document author.
    pub author: Option<String>,
    /// Document subject.
    pub subject: Option<String>,
    /// Document keywords (comma-separated).
    pub keywords: Option<String>,
    /// Creating application.
    pub creator: Option<String>,
    /// Producing library or driver.
    pub producer: Option<String>,
    /// Viewer page layout preference.
    pub page_layout: PageLayout,
}

impl Metadata {
    /// Check if all text fields are unset.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.subject.is_none()
            && self.keywords.is_none()
            && self.creator.is_none()
            && self.producer.is_none()
    }

    /// Create metadata from optional strings, trimming whitespace.
    pub fn new(
        title: Option<String>,
        author: Option<String>,
        subject: Option<String>,
        keywords: Option<String>,
        creator: Option<String>,
        producer: Option<String>,
    ) -> Self {
        let to_string_opt = |opt: Option<String>| {
            opt.filter(|s| !s.trim().is_empty())
                .map(|s| s.trim().to_string())
        };

        Self {
            version: PdfVersion::default(),
            title: to_string_opt(title),
            author: to_string_opt(author),
            subject: to_string_opt(subject),
            keywords: to_string_opt(keywords),
            creator: to_string_opt(creator),
            producer: to_string_opt(producer),
            page_layout: PageLayout::default(),
        }
    }
}
