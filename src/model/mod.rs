//! # Report Model
//!
//! The static definition of a report: page geometry, the bands of every
//! section, the ordered groups, and the variables the calculator keeps.
//! It is created once (usually deserialized from JSON) and reused across
//! every row of a fill. Nothing in here changes while filling; the per-fill
//! state lives in [`crate::fill`].
//!
//! A report is made of **bands**: horizontal strips of absolutely positioned
//! elements. Bands are stacked by the filler into pages, and split across
//! page/column boundaries when their content stretches past the room left.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QuireError;

/// A complete report definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Report name, used in log lines.
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub page: PageConfig,

    #[serde(default)]
    pub columns: ColumnLayout,

    #[serde(default)]
    pub background: Option<Band>,
    #[serde(default)]
    pub title: Option<Band>,
    #[serde(default)]
    pub page_header: Option<Band>,
    #[serde(default)]
    pub column_header: Option<Band>,
    #[serde(default)]
    pub detail: Section,
    #[serde(default)]
    pub column_footer: Option<Band>,
    #[serde(default)]
    pub page_footer: Option<Band>,
    /// Replaces the page footer on the final page when present.
    #[serde(default)]
    pub last_page_footer: Option<Band>,
    #[serde(default)]
    pub summary: Option<Band>,
    /// Printed instead of everything else when there are no rows and
    /// `when_no_data` is [`WhenNoData::NoDataSection`].
    #[serde(default)]
    pub no_data: Option<Band>,

    /// Groups ordered outermost first.
    #[serde(default)]
    pub groups: Vec<Group>,

    #[serde(default)]
    pub variables: Vec<VariableDef>,

    #[serde(default)]
    pub when_no_data: WhenNoData,

    /// Start a new page right after the title.
    #[serde(default)]
    pub title_new_page: bool,
    /// Always start the summary on a new page.
    #[serde(default)]
    pub summary_new_page: bool,
    /// Print page header and footer on summary pages.
    #[serde(default)]
    pub summary_with_page_header_and_footer: bool,
    /// The column footer follows the content instead of sitting at the bottom.
    #[serde(default)]
    pub float_column_footer: bool,
}

/// Configuration for a page: size and margins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// Page size. Defaults to A4.
    #[serde(default = "PageSize::default")]
    pub size: PageSize,

    /// Page margins in points (1/72 inch).
    #[serde(default = "default_margin")]
    pub margin: Edges,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            margin: default_margin(),
        }
    }
}

fn default_margin() -> Edges {
    Edges::uniform(20.0)
}

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A3,
    A5,
    Letter,
    Legal,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.0, 842.0),
            PageSize::A3 => (842.0, 1190.0),
            PageSize::A5 => (420.0, 595.0),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Legal => (612.0, 1008.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

/// Edge values (top, right, bottom, left) used for page margins.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Edges {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Edges {
    pub fn uniform(v: f64) -> Self {
        Self {
            top: v,
            right: v,
            bottom: v,
            left: v,
        }
    }

    pub fn horizontal(&self) -> f64 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f64 {
        self.top + self.bottom
    }
}

/// How the printable width is partitioned into columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLayout {
    #[serde(default = "default_one")]
    pub count: usize,
    /// Column width in points. `None` splits the printable width evenly.
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub spacing: f64,
    #[serde(default)]
    pub direction: RunDirection,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            count: 1,
            width: None,
            spacing: 0.0,
            direction: RunDirection::Ltr,
        }
    }
}

fn default_one() -> usize {
    1
}

/// Order in which columns are filled across the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunDirection {
    #[default]
    Ltr,
    Rtl,
}

/// An ordered sequence of bands filled together as one logical unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub bands: Vec<Band>,
}

impl Section {
    pub fn new(bands: Vec<Band>) -> Self {
        Self { bands }
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }
}

/// A horizontal content strip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Band {
    /// Declared (design) height in points.
    #[serde(default)]
    pub height: f64,

    #[serde(default)]
    pub split_type: SplitType,

    /// Evaluated before each fill attempt; the band is skipped when falsy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_when: Option<Expression>,

    #[serde(default)]
    pub elements: Vec<Element>,
}

impl Band {
    /// A band of the given height with no elements.
    pub fn empty(height: f64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    /// A band with one text element spanning its full height.
    pub fn text(height: f64, width: f64, expression: Expression) -> Self {
        Self {
            height,
            elements: vec![Element::text(0.0, 0.0, width, height, expression)],
            ..Default::default()
        }
    }

    pub fn with_split_type(mut self, split_type: SplitType) -> Self {
        self.split_type = split_type;
        self
    }

    pub fn with_print_when(mut self, condition: Expression) -> Self {
        self.print_when = Some(condition);
        self
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.push(element);
        self
    }

    /// Minimum room needed before any of the band can be placed.
    pub fn break_height(&self) -> f64 {
        match self.split_type {
            SplitType::Immediate if !self.elements.is_empty() => self
                .elements
                .iter()
                .map(|e| e.y + e.height)
                .fold(self.height, f64::min),
            _ => self.height,
        }
    }

    pub fn is_split_prevented(&self) -> bool {
        self.split_type == SplitType::Prevent
    }
}

/// How a band may be split across a page/column boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitType {
    /// Split only when stretching content overflows.
    #[default]
    Stretch,
    /// Never split: move the whole band to the next page/column instead.
    Prevent,
    /// Split anywhere; the band may start as soon as its first element fits.
    Immediate,
}

/// An absolutely positioned element inside a band.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub kind: ElementKind,
    #[serde(default)]
    pub evaluation_time: EvaluationTime,
}

impl Element {
    pub fn text(x: f64, y: f64, width: f64, height: f64, expression: Expression) -> Self {
        Self {
            x,
            y,
            width,
            height,
            kind: ElementKind::Text {
                expression,
                line_height: height,
                stretch: true,
            },
            evaluation_time: EvaluationTime::Now,
        }
    }

    pub fn frame(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            kind: ElementKind::Frame,
            evaluation_time: EvaluationTime::Now,
        }
    }

    pub fn evaluated_at(mut self, time: EvaluationTime) -> Self {
        self.evaluation_time = time;
        self
    }
}

/// What an element shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementKind {
    /// Text, one line per `\n`. A stretching text element grows to fit its
    /// lines and may be split between lines.
    Text {
        expression: Expression,
        #[serde(rename = "lineHeight")]
        line_height: f64,
        #[serde(default = "default_true")]
        stretch: bool,
    },
    /// A fixed-size box (rectangle, image placeholder). Never split.
    Frame,
}

fn default_true() -> bool {
    true
}

/// When an element's expression is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvaluationTime {
    /// While the band is filled.
    #[default]
    Now,
    /// When the band has finished filling (after all its continuations).
    Band,
    /// When the named group ends.
    Group(String),
    Column,
    Page,
    Report,
}

/// A value-producing expression over fields and variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    Literal { value: Value },
    /// A field of the current row. Dotted names traverse nested objects.
    Field { name: String },
    Variable { name: String },
    Concat { parts: Vec<Expression> },
    Equals {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Not { expr: Box<Expression> },
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal {
            value: value.into(),
        }
    }

    pub fn field(name: &str) -> Self {
        Expression::Field {
            name: name.to_string(),
        }
    }

    pub fn variable(name: &str) -> Self {
        Expression::Variable {
            name: name.to_string(),
        }
    }

    pub fn concat(parts: Vec<Expression>) -> Self {
        Expression::Concat { parts }
    }
}

/// A data-driven grouping scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub name: String,
    /// The grouping key; the group breaks when its value changes between rows.
    pub expression: Expression,
    #[serde(default)]
    pub header: Section,
    #[serde(default)]
    pub footer: Section,
    #[serde(default)]
    pub footer_position: FooterPosition,
    #[serde(default)]
    pub start_new_page: bool,
    #[serde(default)]
    pub start_new_column: bool,
    #[serde(default)]
    pub reset_page_number: bool,
    #[serde(default)]
    pub keep_together: bool,
    #[serde(default)]
    pub reprint_header_on_each_page: bool,
    /// Do not start the header with less than this much room left in the column.
    #[serde(default)]
    pub min_height_to_start_new_page: f64,
}

impl Group {
    pub fn new(name: &str, expression: Expression) -> Self {
        Self {
            name: name.to_string(),
            expression,
            header: Section::default(),
            footer: Section::default(),
            footer_position: FooterPosition::Normal,
            start_new_page: false,
            start_new_column: false,
            reset_page_number: false,
            keep_together: false,
            reprint_header_on_each_page: false,
            min_height_to_start_new_page: 0.0,
        }
    }
}

/// Vertical placement of a closing group footer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FooterPosition {
    /// Right after the group content.
    #[default]
    Normal,
    /// At the column bottom, stacked with the footers of inner groups.
    StackAtBottom,
    /// At the column bottom, immediately, whatever follows.
    ForceAtBottom,
    /// At the column bottom only if every following footer joins it there.
    CollateAtBottom,
}

/// Document shape when the data source yields no rows at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WhenNoData {
    #[default]
    NoPages,
    BlankPage,
    AllSectionsNoDetail,
    NoDataSection,
}

/// A calculated variable kept by the calculator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDef {
    pub name: String,
    pub expression: Expression,
    #[serde(default)]
    pub calculation: Calculation,
    #[serde(default)]
    pub reset: ResetType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Calculation {
    /// Holds the latest value of the expression.
    #[default]
    Nothing,
    Count,
    Sum,
    Highest,
    Lowest,
    First,
}

/// When a variable goes back to its initial value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetType {
    None,
    #[default]
    Report,
    Page,
    Column,
    Group(String),
}

impl Report {
    /// Page width and height in points.
    pub fn page_dimensions(&self) -> (f64, f64) {
        self.page.size.dimensions()
    }

    /// Width of one column: the declared width, or the printable width split evenly.
    pub fn column_width(&self) -> f64 {
        let count = self.columns.count.max(1) as f64;
        match self.columns.width {
            Some(w) => w,
            None => {
                let (page_w, _) = self.page_dimensions();
                let printable = page_w - self.page.margin.horizontal();
                (printable - self.columns.spacing * (count - 1.0)) / count
            }
        }
    }

    pub fn group_index(&self, name: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.name == name)
    }

    /// Check the geometry before filling: the filler relies on these to
    /// guarantee that breaking a page always creates room.
    pub fn validate(&self) -> Result<(), QuireError> {
        let (page_w, page_h) = self.page_dimensions();
        let margin = &self.page.margin;

        if self.columns.count == 0 {
            return Err(QuireError::InvalidReport(
                "column count must be at least 1".to_string(),
            ));
        }

        let count = self.columns.count as f64;
        let used_width =
            self.column_width() * count + self.columns.spacing * (count - 1.0) + margin.horizontal();
        if used_width > page_w + 0.001 {
            return Err(QuireError::InvalidReport(format!(
                "columns need {used_width}pt but the page is {page_w}pt wide"
            )));
        }

        let height = |band: &Option<Band>| band.as_ref().map(|b| b.height).unwrap_or(0.0);
        let fixed = margin.vertical()
            + height(&self.page_header)
            + height(&self.column_header)
            + height(&self.column_footer)
            + height(&self.page_footer).max(height(&self.last_page_footer));
        let usable = page_h - fixed;
        if usable < 0.0 {
            return Err(QuireError::InvalidReport(format!(
                "page headers and footers need {fixed}pt but the page is {page_h}pt tall"
            )));
        }

        for variable in &self.variables {
            if let ResetType::Group(name) = &variable.reset {
                if self.group_index(name).is_none() {
                    return Err(QuireError::InvalidReport(format!(
                        "variable `{}` resets on unknown group `{name}`",
                        variable.name
                    )));
                }
            }
        }

        Ok(())
    }
}
