//! # Band Fill Protocol
//!
//! A [`FillBand`] is the per-fill runtime of one band definition. The filler
//! drives it through `evaluate` → `fill` (→ `fill` again while it
//! `will_overflow`), or `fill` → `refill` when a split-prevented band has to
//! be deferred to a fresh column.
//!
//! Filling places as much content as fits the available height:
//! - text elements that stretch grow to their line count and split between lines
//! - frames and fixed text move whole to the next fill
//! - untouched elements keep their vertical distance from content already consumed
//!
//! A continuation fill always happens at the top of a fresh column or page,
//! so if it cannot place anything, nothing ever will: the first pending
//! element is clipped to the room available instead of looping forever.

use serde_json::Value;

use crate::calc::{is_truthy, value_to_text, Calculator, Evaluation};
use crate::error::QuireError;
use crate::model::{Band, Element, ElementKind, EvaluationTime, Expression, Report};
use crate::print::{BandKind, PrintContent};

const EPSILON: f64 = 0.001;

/// Fill state of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandState {
    NotStarted,
    Filled,
    Overflowed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    Pending,
    Continuing,
    Done,
}

#[derive(Debug, Clone)]
struct ElementFill {
    lines: Vec<String>,
    printed_lines: usize,
    progress: Progress,
}

impl ElementFill {
    fn new() -> Self {
        Self {
            lines: Vec::new(),
            printed_lines: 0,
            progress: Progress::Pending,
        }
    }
}

/// An element placed by one fill, positioned relative to the band's top.
#[derive(Debug, Clone)]
pub struct BandElement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub content: PrintContent,
    /// Expression to evaluate later, and when.
    pub deferred: Option<(EvaluationTime, Expression)>,
}

/// The content produced by one fill of a band.
#[derive(Debug, Clone, Default)]
pub struct PrintBand {
    pub height: f64,
    pub elements: Vec<BandElement>,
}

/// Runtime of one band within a fill.
#[derive(Debug, Clone)]
pub struct FillBand<'r> {
    kind: BandKind,
    def: Option<&'r Band>,
    to_print: bool,
    state: BandState,
    elements: Vec<ElementFill>,
    /// Band height consumed by previous fills of the current content.
    consumed: f64,
}

impl<'r> FillBand<'r> {
    pub fn new(kind: BandKind, def: Option<&'r Band>) -> Self {
        let elements = def
            .map(|d| d.elements.iter().map(|_| ElementFill::new()).collect())
            .unwrap_or_default();
        Self {
            kind,
            def,
            to_print: false,
            state: BandState::NotStarted,
            elements,
            consumed: 0.0,
        }
    }

    pub fn kind(&self) -> &BandKind {
        &self.kind
    }

    /// No band was defined for this slot.
    pub fn is_missing(&self) -> bool {
        self.def.is_none()
    }

    /// Declared height; zero for a missing band.
    pub fn height(&self) -> f64 {
        self.def.map(|d| d.height).unwrap_or(0.0)
    }

    pub fn break_height(&self) -> f64 {
        self.def.map(|d| d.break_height()).unwrap_or(0.0)
    }

    pub fn is_split_prevented(&self) -> bool {
        self.def.map(|d| d.is_split_prevented()).unwrap_or(false)
    }

    pub fn has_print_when(&self) -> bool {
        self.def.map(|d| d.print_when.is_some()).unwrap_or(false)
    }

    pub fn is_to_print(&self) -> bool {
        self.to_print
    }

    pub fn state(&self) -> BandState {
        self.state
    }

    pub fn will_overflow(&self) -> bool {
        self.state == BandState::Overflowed
    }

    /// Decide whether the band prints this time. A missing band never does.
    pub fn evaluate_print_when(
        &mut self,
        calc: &dyn Calculator,
        evaluation: Evaluation,
    ) -> Result<(), QuireError> {
        self.to_print = match self.def {
            None => false,
            Some(Band {
                print_when: Some(condition),
                ..
            }) => is_truthy(&calc.evaluate(condition, evaluation)?),
            Some(_) => true,
        };
        Ok(())
    }

    /// Evaluate element content and start over from the first element.
    pub fn evaluate(
        &mut self,
        calc: &dyn Calculator,
        evaluation: Evaluation,
    ) -> Result<(), QuireError> {
        let Some(def) = self.def else {
            return Ok(());
        };
        for (element, fill) in def.elements.iter().zip(self.elements.iter_mut()) {
            fill.lines = match (&element.kind, &element.evaluation_time) {
                (ElementKind::Text { expression, .. }, EvaluationTime::Now) => {
                    split_lines(&calc.evaluate(expression, evaluation)?)
                }
                _ => Vec::new(),
            };
        }
        self.rewind();
        Ok(())
    }

    /// Discard any partial fill so the next fill starts from scratch.
    pub fn rewind(&mut self) {
        for fill in &mut self.elements {
            fill.printed_lines = 0;
            fill.progress = Progress::Pending;
        }
        self.consumed = 0.0;
        self.state = BandState::NotStarted;
    }

    /// Fill again from scratch, after a deferral created fresh room.
    pub fn refill(&mut self, available_height: f64) -> PrintBand {
        self.rewind();
        self.fill(available_height)
    }

    /// Fill with unbounded height. Used for column and page footers.
    pub fn fill_fixed(&mut self) -> PrintBand {
        self.fill(f64::INFINITY)
    }

    /// Place as much of the remaining content as fits `available_height`.
    pub fn fill(&mut self, available_height: f64) -> PrintBand {
        let Some(def) = self.def else {
            self.state = BandState::Filled;
            return PrintBand::default();
        };

        let available = available_height.max(0.0);
        let first = self.state == BandState::NotStarted;
        let mut placed: Vec<BandElement> = Vec::new();
        let mut bottom: f64 = 0.0;
        let mut overflow = false;

        for (element, fill) in def.elements.iter().zip(self.elements.iter_mut()) {
            if fill.progress == Progress::Done {
                continue;
            }
            let y = match fill.progress {
                Progress::Continuing => 0.0,
                _ => (element.y - self.consumed).max(0.0),
            };

            match place_element(element, fill, y, available) {
                Some(piece) => {
                    bottom = bottom.max(piece.y + piece.height);
                    placed.push(piece);
                    if fill.progress != Progress::Done {
                        overflow = true;
                    }
                }
                None => overflow = true,
            }
        }

        if overflow && !first && placed.is_empty() {
            if let Some(piece) = self.clip_first_pending(def, available) {
                bottom = bottom.max(piece.y + piece.height);
                placed.push(piece);
                overflow = self
                    .elements
                    .iter()
                    .any(|fill| fill.progress != Progress::Done);
            }
        }

        let height = if overflow {
            available
        } else if first {
            bottom.max(def.height).min(available)
        } else {
            bottom
        };

        self.consumed += height;
        self.state = if overflow {
            BandState::Overflowed
        } else {
            BandState::Filled
        };

        PrintBand {
            height,
            elements: placed,
        }
    }

    fn clip_first_pending(&mut self, def: &Band, available: f64) -> Option<BandElement> {
        let (element, fill) = def
            .elements
            .iter()
            .zip(self.elements.iter_mut())
            .filter(|(_, fill)| fill.progress != Progress::Done)
            .min_by(|(a, _), (b, _)| a.y.total_cmp(&b.y))?;

        log::warn!(
            "{}: element at y={} does not fit a fresh column ({}pt), clipping",
            self.kind.label(),
            element.y,
            available
        );

        let piece = match &element.kind {
            ElementKind::Text {
                stretch: true,
                line_height,
                ..
            } if fill.printed_lines < fill.lines.len() => {
                let n = ((available / line_height).floor() as usize).max(1);
                let end = (fill.printed_lines + n).min(fill.lines.len());
                let lines = fill.lines[fill.printed_lines..end].to_vec();
                fill.printed_lines = end;
                fill.progress = if end == fill.lines.len() {
                    Progress::Done
                } else {
                    Progress::Continuing
                };
                BandElement {
                    x: element.x,
                    y: 0.0,
                    width: element.width,
                    height: available,
                    content: PrintContent::Text { lines },
                    deferred: None,
                }
            }
            _ => {
                fill.progress = Progress::Done;
                whole_element(element, fill, 0.0, available)
            }
        };
        Some(piece)
    }
}

/// Try to place (part of) `element` at `y` within `available`.
fn place_element(
    element: &Element,
    fill: &mut ElementFill,
    y: f64,
    available: f64,
) -> Option<BandElement> {
    let deferred = element.evaluation_time != EvaluationTime::Now;

    let stretch_line_height = match &element.kind {
        ElementKind::Text {
            stretch: true,
            line_height,
            ..
        } if !deferred && *line_height > 0.0 => Some(*line_height),
        _ => None,
    };

    let Some(line_height) = stretch_line_height else {
        // Unsplittable: whole or not at all
        if y + element.height <= available + EPSILON {
            fill.progress = Progress::Done;
            return Some(whole_element(element, fill, y, element.height));
        }
        return None;
    };

    let remaining = fill.lines.len() - fill.printed_lines;
    let content_height = remaining as f64 * line_height;
    let needed = if fill.progress == Progress::Pending {
        content_height.max(element.height)
    } else {
        content_height
    };

    if y + needed <= available + EPSILON {
        let lines = fill.lines[fill.printed_lines..].to_vec();
        fill.printed_lines = fill.lines.len();
        fill.progress = Progress::Done;
        return Some(BandElement {
            x: element.x,
            y,
            width: element.width,
            height: needed,
            content: PrintContent::Text { lines },
            deferred: None,
        });
    }

    let fit = (((available - y) + EPSILON) / line_height).floor().max(0.0) as usize;
    if fit == 0 {
        return None;
    }
    let end = fill.printed_lines + fit.min(remaining);
    let lines = fill.lines[fill.printed_lines..end].to_vec();
    fill.printed_lines = end;
    fill.progress = Progress::Continuing;
    Some(BandElement {
        x: element.x,
        y,
        width: element.width,
        height: lines.len() as f64 * line_height,
        content: PrintContent::Text { lines },
        deferred: None,
    })
}

fn whole_element(element: &Element, fill: &ElementFill, y: f64, height: f64) -> BandElement {
    let deferred = match (&element.kind, &element.evaluation_time) {
        (_, EvaluationTime::Now) => None,
        (ElementKind::Text { expression, .. }, time) => Some((time.clone(), expression.clone())),
        (ElementKind::Frame, _) => None,
    };
    let content = match element.kind {
        ElementKind::Text { .. } => PrintContent::Text {
            lines: fill.lines.clone(),
        },
        ElementKind::Frame => PrintContent::Frame,
    };
    BandElement {
        x: element.x,
        y,
        width: element.width,
        height: height.min(element.height),
        content,
        deferred,
    }
}

pub(crate) fn split_lines(value: &Value) -> Vec<String> {
    let text = value_to_text(value);
    if text.is_empty() {
        Vec::new()
    } else {
        text.split('\n').map(str::to_string).collect()
    }
}

/// Addresses one band of the report within a [`BandSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandId {
    Background,
    Title,
    PageHeader,
    ColumnHeader,
    ColumnFooter,
    PageFooter,
    LastPageFooter,
    Summary,
    NoData,
    Detail(usize),
    GroupHeader(usize, usize),
    GroupFooter(usize, usize),
}

/// Runtime bands of every section of a report.
#[derive(Debug, Clone)]
pub struct BandSet<'r> {
    background: FillBand<'r>,
    title: FillBand<'r>,
    page_header: FillBand<'r>,
    column_header: FillBand<'r>,
    column_footer: FillBand<'r>,
    page_footer: FillBand<'r>,
    last_page_footer: FillBand<'r>,
    summary: FillBand<'r>,
    no_data: FillBand<'r>,
    detail: Vec<FillBand<'r>>,
    group_headers: Vec<Vec<FillBand<'r>>>,
    group_footers: Vec<Vec<FillBand<'r>>>,
}

impl<'r> BandSet<'r> {
    pub fn new(report: &'r Report) -> Self {
        Self {
            background: FillBand::new(BandKind::Background, report.background.as_ref()),
            title: FillBand::new(BandKind::Title, report.title.as_ref()),
            page_header: FillBand::new(BandKind::PageHeader, report.page_header.as_ref()),
            column_header: FillBand::new(BandKind::ColumnHeader, report.column_header.as_ref()),
            column_footer: FillBand::new(BandKind::ColumnFooter, report.column_footer.as_ref()),
            page_footer: FillBand::new(BandKind::PageFooter, report.page_footer.as_ref()),
            last_page_footer: FillBand::new(
                BandKind::LastPageFooter,
                report.last_page_footer.as_ref(),
            ),
            summary: FillBand::new(BandKind::Summary, report.summary.as_ref()),
            no_data: FillBand::new(BandKind::NoData, report.no_data.as_ref()),
            detail: report
                .detail
                .bands
                .iter()
                .map(|b| FillBand::new(BandKind::Detail, Some(b)))
                .collect(),
            group_headers: report
                .groups
                .iter()
                .map(|g| {
                    g.header
                        .bands
                        .iter()
                        .map(|b| FillBand::new(BandKind::GroupHeader(g.name.clone()), Some(b)))
                        .collect()
                })
                .collect(),
            group_footers: report
                .groups
                .iter()
                .map(|g| {
                    g.footer
                        .bands
                        .iter()
                        .map(|b| FillBand::new(BandKind::GroupFooter(g.name.clone()), Some(b)))
                        .collect()
                })
                .collect(),
        }
    }

    pub fn get(&self, id: BandId) -> &FillBand<'r> {
        match id {
            BandId::Background => &self.background,
            BandId::Title => &self.title,
            BandId::PageHeader => &self.page_header,
            BandId::ColumnHeader => &self.column_header,
            BandId::ColumnFooter => &self.column_footer,
            BandId::PageFooter => &self.page_footer,
            BandId::LastPageFooter => &self.last_page_footer,
            BandId::Summary => &self.summary,
            BandId::NoData => &self.no_data,
            BandId::Detail(i) => &self.detail[i],
            BandId::GroupHeader(g, i) => &self.group_headers[g][i],
            BandId::GroupFooter(g, i) => &self.group_footers[g][i],
        }
    }

    pub fn get_mut(&mut self, id: BandId) -> &mut FillBand<'r> {
        match id {
            BandId::Background => &mut self.background,
            BandId::Title => &mut self.title,
            BandId::PageHeader => &mut self.page_header,
            BandId::ColumnHeader => &mut self.column_header,
            BandId::ColumnFooter => &mut self.column_footer,
            BandId::PageFooter => &mut self.page_footer,
            BandId::LastPageFooter => &mut self.last_page_footer,
            BandId::Summary => &mut self.summary,
            BandId::NoData => &mut self.no_data,
            BandId::Detail(i) => &mut self.detail[i],
            BandId::GroupHeader(g, i) => &mut self.group_headers[g][i],
            BandId::GroupFooter(g, i) => &mut self.group_footers[g][i],
        }
    }

    pub fn detail_count(&self) -> usize {
        self.detail.len()
    }

    pub fn group_header_count(&self, group: usize) -> usize {
        self.group_headers[group].len()
    }

    pub fn group_footer_count(&self, group: usize) -> usize {
        self.group_footers[group].len()
    }

    pub fn any_detail_print_when(&self) -> bool {
        self.detail.iter().any(|b| b.has_print_when())
    }
}
