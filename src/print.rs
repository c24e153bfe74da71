//! # Filled Output
//!
//! The in-memory result of a fill: a sequence of pages holding elements at
//! absolute page coordinates. Exporting these to a final file format is
//! somebody else's job; they serialize to JSON for tooling and tests.

use serde::Serialize;

/// Which report section an element was printed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "section", content = "group")]
pub enum BandKind {
    Background,
    Title,
    PageHeader,
    ColumnHeader,
    GroupHeader(String),
    Detail,
    GroupFooter(String),
    ColumnFooter,
    PageFooter,
    LastPageFooter,
    Summary,
    NoData,
}

impl BandKind {
    /// Short label used in log lines and error messages.
    pub fn label(&self) -> String {
        match self {
            BandKind::Background => "background".to_string(),
            BandKind::Title => "title".to_string(),
            BandKind::PageHeader => "page header".to_string(),
            BandKind::ColumnHeader => "column header".to_string(),
            BandKind::GroupHeader(g) => format!("{g} header"),
            BandKind::Detail => "detail".to_string(),
            BandKind::GroupFooter(g) => format!("{g} footer"),
            BandKind::ColumnFooter => "column footer".to_string(),
            BandKind::PageFooter => "page footer".to_string(),
            BandKind::LastPageFooter => "last page footer".to_string(),
            BandKind::Summary => "summary".to_string(),
            BandKind::NoData => "no data".to_string(),
        }
    }
}

/// A filled page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub width: f64,
    pub height: f64,
    /// Value of `PAGE_NUMBER` when the page was opened.
    pub number: u32,
    pub elements: Vec<PrintElement>,
}

impl Page {
    pub fn new(width: f64, height: f64, number: u32) -> Self {
        Self {
            width,
            height,
            number,
            elements: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Elements printed by the given section.
    pub fn elements_of(&self, band: &BandKind) -> impl Iterator<Item = &PrintElement> + '_ {
        let band = band.clone();
        self.elements.iter().filter(move |e| e.band == band)
    }

    pub fn find(&self, id: u64) -> Option<&PrintElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub(crate) fn find_mut(&mut self, id: u64) -> Option<&mut PrintElement> {
        self.elements.iter_mut().find(|e| e.id == id)
    }
}

/// A positioned element on a page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintElement {
    /// Unique within one fill; stable across relocation.
    pub id: u64,
    /// Absolute position on the page (top-left corner).
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub band: BandKind,
    /// Column the element flowed in; `None` for page-wide fixed content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    pub content: PrintContent,
}

impl PrintElement {
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// The text of a text element, lines joined with `\n`.
    pub fn text(&self) -> Option<String> {
        match &self.content {
            PrintContent::Text { lines } => Some(lines.join("\n")),
            PrintContent::Frame => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PrintContent {
    Text { lines: Vec<String> },
    Frame,
}
