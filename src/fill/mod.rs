//! # Filling
//!
//! The vertical flow engine. It pulls rows from a [`DataSource`], asks the
//! [`Calculator`] which groups changed, and stacks bands into columns and
//! pages, breaking whenever the next band does not fit.
//!
//! A fill runs in three phases:
//!
//! 1. **Start**: open the first page, then title, page header, column
//!    header, every group header and the first detail.
//! 2. **Content**, per row: footers of the groups that changed (with the
//!    previous row's values), their headers, then the detail.
//! 3. **End**: every group footer, then the summary and the last page footer.
//!
//! The filler never overlaps bands: `offset_y` only grows within a column,
//! and a band that does not fit triggers a column break (or a page break
//! from the last column). Headers and footers filled during a break are
//! placed before flowing content resumes.
//!
//! Pages are accumulated and handed to the [`PageSink`] once the fill
//! succeeded and every deferred element is resolved.

mod band;
mod bound;
mod breaks;
mod footers;
mod range;
mod summary;

pub use band::{BandState, FillBand, PrintBand};
pub use breaks::CancelToken;
pub use range::ElementRange;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::calc::{Calculator, Evaluation, RecordCalculator, ResetScope};
use crate::data::{DataSource, JsonRows, Row};
use crate::error::{HeaderKind, QuireError};
use crate::model::{Report, RunDirection, WhenNoData};
use crate::print::{Page, PrintElement};
use crate::scriptlet::{NoopScriptlet, Scriptlet};
use crate::sink::PageSink;

use band::{BandId, BandSet};
use bound::{BoundElement, BoundElements, BoundScope};
use breaks::BreakGuard;
use footers::{flush_group_footers, place_group_footer};
use range::{expand_or_move, expand_range, GroupFooterRange, KeepTogetherRange};

/// Options for one filler.
#[derive(Debug, Clone, Default)]
pub struct FillOptions {
    /// Identifies the filler in log lines.
    pub id: String,
    /// Set when this report is filled inside a parent report.
    pub subreport: Option<SubreportContext>,
    pub cancel: Option<CancelToken>,
}

/// How a subreport sits in its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubreportContext {
    /// Columns of the parent report (already multiplied up the chain).
    pub parent_column_count: usize,
    /// Stretch the subreport to the bottom of the parent page: footers go
    /// to the page bottom instead of following the content.
    pub run_to_bottom: bool,
}

/// What a successful fill produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillStats {
    pub rows: usize,
    pub pages: usize,
}

/// Fills one report definition. Reusable; fills may not overlap.
pub struct ReportFiller {
    report: Report,
    options: FillOptions,
    filling: AtomicBool,
}

struct FillGuard<'a>(&'a AtomicBool);

impl Drop for FillGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ReportFiller {
    pub fn new(report: Report) -> Result<Self, QuireError> {
        report.validate()?;
        let id = report.name.clone();
        Ok(Self {
            report,
            options: FillOptions {
                id,
                ..Default::default()
            },
            filling: AtomicBool::new(false),
        })
    }

    pub fn with_options(mut self, options: FillOptions) -> Self {
        self.options = options;
        self
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn options(&self) -> &FillOptions {
        &self.options
    }

    /// Fill the report with the built-in calculator and no hooks.
    pub fn fill_rows(&self, rows: Vec<Row>) -> Result<Vec<Page>, QuireError> {
        let mut source = JsonRows::new(rows);
        let mut calculator = RecordCalculator::new(&self.report);
        let mut pages = Vec::new();
        self.fill_report(&mut source, &mut calculator, &mut NoopScriptlet, &mut pages)?;
        Ok(pages)
    }

    /// Run one complete fill. Pages reach `sink` only if the fill succeeds.
    pub fn fill_report(
        &self,
        source: &mut dyn DataSource,
        calculator: &mut dyn Calculator,
        scriptlet: &mut dyn Scriptlet,
        sink: &mut dyn PageSink,
    ) -> Result<FillStats, QuireError> {
        if self
            .filling
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(QuireError::FillInProgress);
        }
        let _guard = FillGuard(&self.filling);

        let start = Instant::now();
        let mut context = FillContext::new(&self.report, &self.options, calculator, scriptlet);
        context.run(source)?;

        let stats = FillStats {
            rows: context.rows,
            pages: context.pages.len(),
        };
        let last = context.pages.len().saturating_sub(1);
        for (i, page) in context.pages.into_iter().enumerate() {
            sink.add_page(page, i == last)?;
        }

        log::info!(
            "fill {}: {} rows into {} pages in {:.1}ms",
            self.options.id,
            stats.rows,
            stats.pages,
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(stats)
    }
}

/// Whether a page, column or group has received flowing content yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeState {
    Fresh,
    Started,
}

#[derive(Debug, Clone, Copy)]
struct Scopes {
    page: ScopeState,
    column: ScopeState,
    group: ScopeState,
}

/// Which of its sections a group printed last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupPhase {
    Idle,
    HeaderPrinted,
    FooterPrinted,
}

#[derive(Debug, Clone, Copy)]
struct GroupState {
    changed: bool,
    /// First group to change on this row; the ones inside it change too.
    top_level_change: bool,
    phase: GroupPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageFooterMode {
    Regular,
    Last,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    offset_x: f64,
    offset_y: f64,
}

/// Page and column geometry, fixed for the whole fill.
#[derive(Debug, Clone)]
struct Geometry {
    page_width: f64,
    page_height: f64,
    top_margin: f64,
    bottom_margin: f64,
    left_margin: f64,
    right_margin: f64,
    column_count: usize,
    column_width: f64,
    column_spacing: f64,
    direction: RunDirection,
}

impl Geometry {
    fn new(report: &Report) -> Self {
        let (page_width, page_height) = report.page_dimensions();
        let margin = &report.page.margin;
        Self {
            page_width,
            page_height,
            top_margin: margin.top,
            bottom_margin: margin.bottom,
            left_margin: margin.left,
            right_margin: margin.right,
            column_count: report.columns.count.max(1),
            column_width: report.column_width(),
            column_spacing: report.columns.spacing,
            direction: report.columns.direction,
        }
    }

    /// Left edge of column `index`.
    fn column_x(&self, index: usize) -> f64 {
        let step = index as f64 * (self.column_spacing + self.column_width);
        match self.direction {
            RunDirection::Ltr => self.left_margin + step,
            RunDirection::Rtl => self.page_width - self.right_margin - self.column_width - step,
        }
    }
}

/// State of one fill in progress.
pub(crate) struct FillContext<'a> {
    report: &'a Report,
    options: &'a FillOptions,
    calc: &'a mut dyn Calculator,
    scriptlet: &'a mut dyn Scriptlet,
    bands: BandSet<'a>,
    geometry: Geometry,

    pages: Vec<Page>,
    cursor: Cursor,
    column_index: usize,
    column_footer_offset_y: f64,
    last_page_column_footer_offset_y: f64,
    column_header_offset_y: f64,
    footer_mode: PageFooterMode,

    scopes: Scopes,
    groups: Vec<GroupState>,
    keep_together: Option<KeepTogetherRange>,
    breaks: BreakGuard,
    bound: BoundElements,
    next_element_id: u64,
    rows: usize,
}

impl<'a> FillContext<'a> {
    fn new(
        report: &'a Report,
        options: &'a FillOptions,
        calc: &'a mut dyn Calculator,
        scriptlet: &'a mut dyn Scriptlet,
    ) -> Self {
        let geometry = Geometry::new(report);
        let bands = BandSet::new(report);

        let bottom = geometry.page_height - geometry.bottom_margin;
        let column_footer = bands.get(BandId::ColumnFooter).height();
        let column_footer_offset_y =
            bottom - bands.get(BandId::PageFooter).height() - column_footer;
        let last_page_column_footer_offset_y =
            bottom - bands.get(BandId::LastPageFooter).height() - column_footer;
        log::debug!(
            "fill {}: page height {}, column footer at {}, last page column footer at {}",
            options.id,
            geometry.page_height,
            column_footer_offset_y,
            last_page_column_footer_offset_y
        );

        Self {
            report,
            options,
            calc,
            scriptlet,
            bands,
            pages: Vec::new(),
            cursor: Cursor {
                offset_x: geometry.left_margin,
                offset_y: geometry.top_margin,
            },
            column_index: 0,
            column_footer_offset_y,
            last_page_column_footer_offset_y,
            column_header_offset_y: geometry.top_margin,
            footer_mode: PageFooterMode::Regular,
            scopes: Scopes {
                page: ScopeState::Fresh,
                column: ScopeState::Fresh,
                group: ScopeState::Fresh,
            },
            groups: vec![
                GroupState {
                    changed: false,
                    top_level_change: false,
                    phase: GroupPhase::Idle,
                };
                report.groups.len()
            ],
            keep_together: None,
            breaks: BreakGuard::default(),
            bound: BoundElements::default(),
            next_element_id: 0,
            rows: 0,
            geometry,
        }
    }

    fn run(&mut self, source: &mut dyn DataSource) -> Result<(), QuireError> {
        self.set_last_page_footer(false);

        if self.next(source)? {
            self.fill_report_start()?;
            while self.next(source)? {
                self.fill_report_content()?;
            }
            self.fill_report_end()?;
        } else {
            log::debug!(
                "fill {}: no data, {:?}",
                self.options.id,
                self.report.when_no_data
            );
            match self.report.when_no_data {
                WhenNoData::NoPages => {}
                WhenNoData::BlankPage => {
                    self.calc.set_page_number(1);
                    self.push_page();
                }
                WhenNoData::AllSectionsNoDetail => {
                    self.init_report_variables()?;
                    self.open_first_page();
                    self.fill_background()?;
                    self.fill_title()?;
                    self.fill_page_header(Evaluation::Default)?;
                    self.fill_column_header(Evaluation::Default)?;
                    self.fill_group_headers(true)?;
                    self.fill_group_footers(true)?;
                    self.fill_summary()?;
                }
                WhenNoData::NoDataSection => {
                    self.init_report_variables()?;
                    self.open_first_page();
                    self.fill_background()?;
                    self.fill_no_data()?;
                }
            }
        }

        // Anything still deferred closes with the report.
        self.resolve_group_bound_elements(Evaluation::Default, true)?;
        self.resolve_column_bound_elements(Evaluation::Default)?;
        self.resolve_page_bound_elements(Evaluation::Default)?;
        self.resolve_report_bound_elements()
    }

    fn next(&mut self, source: &mut dyn DataSource) -> Result<bool, QuireError> {
        match source.next_row()? {
            Some(row) => {
                self.calc.load_row(row);
                self.rows += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_subreport(&self) -> bool {
        self.options.subreport.is_some()
    }

    /// Number of fresh columns a header may try before giving up.
    fn master_column_count(&self) -> usize {
        let parent = self
            .options
            .subreport
            .map(|s| s.parent_column_count.max(1))
            .unwrap_or(1);
        parent * self.geometry.column_count
    }

    // ─── Phases ─────────────────────────────────────────────────────

    fn fill_report_start(&mut self) -> Result<(), QuireError> {
        log::debug!("fill {}: report start", self.options.id);
        self.init_report_variables()?;
        self.open_first_page();
        self.fill_background()?;
        self.fill_title()?;
        self.fill_page_header(Evaluation::Default)?;
        self.fill_column_header(Evaluation::Default)?;
        self.fill_group_headers(true)?;
        self.fill_detail()
    }

    fn fill_report_content(&mut self) -> Result<(), QuireError> {
        let changed = self.calc.estimate_group_ruptures()?;
        let mut outer_changed = false;
        for (state, changed) in self.groups.iter_mut().zip(changed) {
            state.top_level_change = changed && !outer_changed;
            state.changed = changed;
            outer_changed |= changed;
        }

        self.fill_group_footers(false)?;
        self.resolve_group_bound_elements(Evaluation::Old, false)?;

        self.scriptlet.before_group_init()?;
        self.calc.initialize_variables(ResetScope::Group)?;
        self.scriptlet.after_group_init()?;

        self.fill_group_headers(false)?;
        self.fill_detail()
    }

    fn fill_report_end(&mut self) -> Result<(), QuireError> {
        log::debug!("fill {}: report end", self.options.id);
        self.fill_group_footers(true)?;
        self.fill_summary()
    }

    // ─── Variables and scopes ───────────────────────────────────────

    fn init_report_variables(&mut self) -> Result<(), QuireError> {
        self.scriptlet.before_report_init()?;
        self.calc.initialize_variables(ResetScope::Report)?;
        self.scriptlet.after_report_init()
    }

    fn init_page_variables(&mut self) -> Result<(), QuireError> {
        self.scriptlet.before_page_init()?;
        self.calc.initialize_variables(ResetScope::Page)?;
        self.calc.initialize_variables(ResetScope::Column)?;
        self.scriptlet.after_page_init()
    }

    fn init_column_variables(&mut self) -> Result<(), QuireError> {
        self.scriptlet.before_column_init()?;
        self.calc.initialize_variables(ResetScope::Column)?;
        self.scriptlet.after_column_init()
    }

    /// Resolve what closes with the page, then start the next page's variables.
    fn close_page_scope(&mut self, evaluation: Evaluation) -> Result<(), QuireError> {
        self.close_page_scope_with(evaluation, false)
    }

    fn close_page_scope_with(
        &mut self,
        evaluation: Evaluation,
        final_groups: bool,
    ) -> Result<(), QuireError> {
        self.resolve_group_bound_elements(evaluation, final_groups)?;
        self.resolve_column_bound_elements(evaluation)?;
        self.resolve_page_bound_elements(evaluation)?;
        self.init_page_variables()
    }

    fn set_last_page_footer(&mut self, last: bool) {
        if last {
            self.footer_mode = PageFooterMode::Last;
            self.column_footer_offset_y = self.last_page_column_footer_offset_y;
        } else {
            self.footer_mode = PageFooterMode::Regular;
        }
    }

    // ─── Pages and columns ──────────────────────────────────────────

    fn push_page(&mut self) {
        let number = self.calc.page_number();
        log::debug!("fill {}: page {} (#{})", self.options.id, self.pages.len() + 1, number);
        self.pages.push(Page::new(
            self.geometry.page_width,
            self.geometry.page_height,
            number,
        ));
    }

    fn open_first_page(&mut self) {
        self.calc.set_page_number(1);
        self.push_page();
        self.set_first_column();
        self.cursor.offset_y = self.geometry.top_margin;
    }

    /// Start a new page, numbered from 1 again if `reset_page_number`.
    fn add_page(&mut self, reset_page_number: bool) -> Result<(), QuireError> {
        let number = if reset_page_number {
            1
        } else {
            self.calc.page_number() + 1
        };
        self.calc.set_page_number(number);
        self.push_page();
        self.set_first_column();
        self.cursor.offset_y = self.geometry.top_margin;
        self.fill_background()
    }

    fn set_first_column(&mut self) {
        self.column_index = 0;
        self.cursor.offset_x = self.geometry.left_margin;
        self.calc.set_column_number(1);
    }

    fn set_offset_x(&mut self) {
        self.cursor.offset_x = self.geometry.column_x(self.column_index);
    }

    fn current_page(&self) -> usize {
        self.pages.len().saturating_sub(1)
    }

    fn range_here(&self) -> ElementRange {
        ElementRange::new(
            self.current_page(),
            self.column_index,
            self.scopes.page == ScopeState::Fresh,
            self.scopes.column == ScopeState::Fresh,
            self.cursor.offset_y,
        )
    }

    // ─── Band helpers ───────────────────────────────────────────────

    fn evaluate_print_when(&mut self, id: BandId, evaluation: Evaluation) -> Result<bool, QuireError> {
        let band = self.bands.get_mut(id);
        band.evaluate_print_when(&*self.calc, evaluation)?;
        Ok(band.is_to_print())
    }

    fn evaluate_band(&mut self, id: BandId, evaluation: Evaluation) -> Result<(), QuireError> {
        self.bands.get_mut(id).evaluate(&*self.calc, evaluation)
    }

    fn resolve_band_bound_elements_of(
        &mut self,
        id: BandId,
        evaluation: Evaluation,
    ) -> Result<(), QuireError> {
        let kind = self.bands.get(id).kind().clone();
        self.resolve_band_bound_elements(&kind, evaluation)
    }

    /// Put a filled band on the current page at the cursor and advance past it.
    fn place_band(&mut self, id: BandId, printed: PrintBand) {
        let kind = self.bands.get(id).kind().clone();
        let column = match id {
            BandId::Background => None,
            _ => Some(self.column_index),
        };
        let page_index = self.current_page();
        let (x, y) = (self.cursor.offset_x, self.cursor.offset_y);

        let Some(page) = self.pages.last_mut() else {
            log::warn!("{} filled with no page open", kind.label());
            return;
        };
        for element in printed.elements {
            let id = self.next_element_id;
            self.next_element_id += 1;
            if let Some((time, expression)) = element.deferred {
                if let Some(scope) = BoundScope::for_time(&time, &kind, self.report) {
                    self.bound.register(
                        scope,
                        BoundElement {
                            id,
                            page: page_index,
                            expression,
                        },
                    );
                }
            }
            page.elements.push(PrintElement {
                id,
                x: x + element.x,
                y: y + element.y,
                width: element.width,
                height: element.height,
                band: kind.clone(),
                column,
                content: element.content,
            });
        }

        if column.is_some() {
            self.cursor.offset_y += printed.height;
        }
    }

    /// Fill a band with unbounded height at the cursor.
    fn fill_fixed_band(&mut self, id: BandId, evaluation: Evaluation) -> Result<(), QuireError> {
        self.evaluate_band(id, evaluation)?;
        let printed = self.bands.get_mut(id).fill_fixed();
        self.place_band(id, printed);
        self.resolve_band_bound_elements_of(id, evaluation)
    }

    /// Fill a header band only if it fits whole in the column.
    fn fill_band_no_overflow(&mut self, id: BandId, evaluation: Evaluation) -> Result<bool, QuireError> {
        let available = self.column_footer_offset_y - self.cursor.offset_y;
        if available < self.bands.get(id).height() {
            return Ok(false);
        }
        self.evaluate_band(id, evaluation)?;
        let printed = self.bands.get_mut(id).fill(available);
        if self.bands.get(id).will_overflow() {
            self.bands.get_mut(id).rewind();
            return Ok(false);
        }
        self.place_band(id, printed);
        self.resolve_band_bound_elements_of(id, evaluation)?;
        Ok(true)
    }

    /// Break columns until `needed` fits below the cursor.
    fn ensure_room(
        &mut self,
        id: BandId,
        needed: f64,
        eval_prev: Evaluation,
        eval_next: Evaluation,
    ) -> Result<(), QuireError> {
        let mut breaks = 0;
        while needed > self.column_footer_offset_y - self.cursor.offset_y {
            let fresh = self.column_footer_offset_y - self.column_header_offset_y;
            if needed > fresh || breaks > 2 * self.geometry.column_count {
                return Err(QuireError::ColumnOverflow {
                    band: self.bands.get(id).kind().label(),
                    break_height: needed,
                    available: fresh,
                });
            }
            self.column_break(eval_prev, eval_next)?;
            breaks += 1;
        }
        Ok(())
    }

    /// Fill a flowing band, continuing it in the next columns while it overflows.
    fn fill_column_band(&mut self, id: BandId, evaluation: Evaluation) -> Result<ElementRange, QuireError> {
        self.evaluate_band(id, evaluation)?;
        let mut printed = self
            .bands
            .get_mut(id)
            .fill(self.column_footer_offset_y - self.cursor.offset_y);

        let band = self.bands.get(id);
        if band.will_overflow() && (band.is_split_prevented() || self.keep_together.is_some()) {
            self.column_break(evaluation, evaluation)?;
            printed = self
                .bands
                .get_mut(id)
                .refill(self.column_footer_offset_y - self.cursor.offset_y);
        }

        let mut range = self.range_here();
        self.place_band(id, printed);
        range.expand(self.cursor.offset_y);

        while self.bands.get(id).will_overflow() {
            self.column_break(evaluation, evaluation)?;
            let printed = self
                .bands
                .get_mut(id)
                .fill(self.column_footer_offset_y - self.cursor.offset_y);
            self.place_band(id, printed);
        }

        self.resolve_band_bound_elements_of(id, evaluation)?;
        Ok(range)
    }

    /// Title-like bands: fill from the cursor down to the page bottom,
    /// continuing on new pages without headers.
    fn fill_page_band(&mut self, id: BandId) -> Result<(), QuireError> {
        let room = |ctx: &Self| {
            ctx.geometry.page_height - ctx.geometry.bottom_margin - ctx.cursor.offset_y
        };

        let break_height = self.bands.get(id).break_height();
        while break_height > room(self) {
            if self.cursor.offset_y <= self.geometry.top_margin {
                return Err(QuireError::ColumnOverflow {
                    band: self.bands.get(id).kind().label(),
                    break_height,
                    available: room(self),
                });
            }
            self.add_page(false)?;
        }

        self.evaluate_band(id, Evaluation::Default)?;
        let available = room(self);
        let mut printed = self.bands.get_mut(id).fill(available);
        let band = self.bands.get(id);
        if band.will_overflow() && band.is_split_prevented() && self.is_subreport() {
            self.close_page_scope(Evaluation::Default)?;
            self.add_page(false)?;
            let available = room(self);
            printed = self.bands.get_mut(id).refill(available);
        }
        self.place_band(id, printed);

        while self.bands.get(id).will_overflow() {
            self.close_page_scope(Evaluation::Default)?;
            self.add_page(false)?;
            let available = room(self);
            let printed = self.bands.get_mut(id).fill(available);
            self.place_band(id, printed);
        }
        self.resolve_band_bound_elements_of(id, Evaluation::Default)
    }

    // ─── Sections ───────────────────────────────────────────────────

    fn fill_background(&mut self) -> Result<(), QuireError> {
        let room = self.geometry.page_height - self.geometry.bottom_margin - self.cursor.offset_y;
        if self.bands.get(BandId::Background).height() > room {
            return Ok(());
        }
        if self.evaluate_print_when(BandId::Background, Evaluation::Default)? {
            self.evaluate_band(BandId::Background, Evaluation::Default)?;
            let printed = self.bands.get_mut(BandId::Background).fill(room);
            self.place_band(BandId::Background, printed);
            self.resolve_band_bound_elements_of(BandId::Background, Evaluation::Default)?;
        }
        Ok(())
    }

    fn fill_title(&mut self) -> Result<(), QuireError> {
        if !self.evaluate_print_when(BandId::Title, Evaluation::Default)? {
            return Ok(());
        }
        log::debug!("fill {}: title at {}", self.options.id, self.cursor.offset_y);
        self.fill_page_band(BandId::Title)?;

        if self.report.title_new_page {
            self.close_page_scope(Evaluation::Default)?;
            self.add_page(false)?;
        }
        Ok(())
    }

    fn fill_no_data(&mut self) -> Result<(), QuireError> {
        if !self.evaluate_print_when(BandId::NoData, Evaluation::Default)? {
            return Ok(());
        }
        log::debug!("fill {}: no data section at {}", self.options.id, self.cursor.offset_y);
        self.fill_page_band(BandId::NoData)
    }

    fn fill_page_header(&mut self, evaluation: Evaluation) -> Result<(), QuireError> {
        if self.evaluate_print_when(BandId::PageHeader, Evaluation::Default)? {
            log::debug!("fill {}: page header at {}", self.options.id, self.cursor.offset_y);
            let attempts = self.header_reattempts();
            let mut filled = self.fill_band_no_overflow(BandId::PageHeader, evaluation)?;
            for _ in 0..attempts {
                if filled {
                    break;
                }
                self.close_page_scope(evaluation)?;
                self.add_page(false)?;
                filled = self.fill_band_no_overflow(BandId::PageHeader, evaluation)?;
            }
            if !filled {
                return Err(QuireError::HeaderOverflow {
                    header: HeaderKind::Page,
                    attempts: attempts + 1,
                });
            }
        }
        self.column_header_offset_y = self.cursor.offset_y;
        self.scopes.page = ScopeState::Fresh;
        self.scopes.column = ScopeState::Fresh;
        Ok(())
    }

    fn header_reattempts(&self) -> usize {
        let count = self.master_column_count();
        if self.breaks.is_active() {
            count.saturating_sub(1)
        } else {
            count
        }
    }

    fn fill_column_header(&mut self, evaluation: Evaluation) -> Result<(), QuireError> {
        if self.evaluate_print_when(BandId::ColumnHeader, Evaluation::Default)? {
            log::debug!("fill {}: column header at {}", self.options.id, self.cursor.offset_y);
            let attempts = self.header_reattempts();
            self.set_offset_x();
            let mut filled = self.fill_band_no_overflow(BandId::ColumnHeader, evaluation)?;
            for _ in 0..attempts {
                if filled {
                    break;
                }
                // Give up on the remaining columns of this page.
                while self.column_index + 1 < self.geometry.column_count {
                    self.resolve_group_bound_elements(evaluation, false)?;
                    self.resolve_column_bound_elements(evaluation)?;
                    self.init_column_variables()?;
                    self.column_index += 1;
                    self.set_offset_x();
                    self.cursor.offset_y = self.column_header_offset_y;
                    self.calc.set_column_number(self.column_index as u32 + 1);
                }
                self.fill_page_footer(evaluation)?;
                self.close_page_scope(evaluation)?;
                self.add_page(false)?;
                self.fill_page_header(evaluation)?;
                self.set_offset_x();
                filled = self.fill_band_no_overflow(BandId::ColumnHeader, evaluation)?;
            }
            if !filled {
                return Err(QuireError::HeaderOverflow {
                    header: HeaderKind::Column,
                    attempts: attempts + 1,
                });
            }
        }
        self.set_offset_x();
        self.scopes.column = ScopeState::Fresh;
        Ok(())
    }

    fn fill_column_footer(&mut self, evaluation: Evaluation) -> Result<(), QuireError> {
        self.set_offset_x();

        if let Some(sub) = self.options.subreport {
            if !sub.run_to_bottom && self.column_index == 0 {
                self.column_footer_offset_y = self.cursor.offset_y;
            }
        }

        let before = self.cursor.offset_y;
        if !self.report.float_column_footer {
            self.cursor.offset_y = self.column_footer_offset_y;
        }
        if self.evaluate_print_when(BandId::ColumnFooter, Evaluation::Default)? {
            log::debug!("fill {}: column footer at {}", self.options.id, self.cursor.offset_y);
            self.fill_fixed_band(BandId::ColumnFooter, evaluation)?;
        }
        if self.report.float_column_footer {
            self.cursor.offset_y += self.column_footer_offset_y - before;
        }
        Ok(())
    }

    fn fill_page_footer(&mut self, evaluation: Evaluation) -> Result<(), QuireError> {
        let id = match self.footer_mode {
            PageFooterMode::Regular => BandId::PageFooter,
            PageFooterMode::Last => BandId::LastPageFooter,
        };
        self.cursor.offset_x = self.geometry.left_margin;

        let run_to_bottom = self.options.subreport.map_or(true, |s| s.run_to_bottom);
        if run_to_bottom {
            self.cursor.offset_y = self.geometry.page_height
                - self.bands.get(id).height()
                - self.geometry.bottom_margin;
        }
        if self.evaluate_print_when(id, Evaluation::Default)? {
            log::debug!("fill {}: page footer at {}", self.options.id, self.cursor.offset_y);
            self.fill_fixed_band(id, evaluation)?;
        }
        Ok(())
    }

    // ─── Groups ─────────────────────────────────────────────────────

    fn fill_group_headers(&mut self, fill_all: bool) -> Result<(), QuireError> {
        for i in 0..self.groups.len() {
            if !(fill_all || self.groups[i].changed) {
                continue;
            }
            let range = self.fill_group_header(i)?;
            if self.keep_together.is_none() && self.report.groups[i].keep_together {
                self.keep_together = Some(KeepTogetherRange {
                    range,
                    group_index: i,
                });
            }
        }
        Ok(())
    }

    fn fill_group_header(&mut self, i: usize) -> Result<ElementRange, QuireError> {
        let report = self.report;
        let group = &report.groups[i];
        log::debug!("fill {}: {} header at {}", self.options.id, group.name, self.cursor.offset_y);

        let eval_prev = if self.groups[i].top_level_change {
            Evaluation::Old
        } else {
            Evaluation::Default
        };

        if (group.start_new_page || group.reset_page_number) && self.scopes.page == ScopeState::Started {
            self.page_break(group.reset_page_number, eval_prev, Evaluation::Default, true)?;
        } else if group.start_new_column && self.scopes.column == ScopeState::Started {
            self.column_break(eval_prev, Evaluation::Default)?;
        }

        let mut range: Option<ElementRange> = None;
        for b in 0..self.bands.group_header_count(i) {
            let id = BandId::GroupHeader(i, b);
            let to_print = self.evaluate_print_when(id, Evaluation::Default)?;
            if to_print {
                let needed = self
                    .bands
                    .get(id)
                    .break_height()
                    .max(group.min_height_to_start_new_page);
                self.ensure_room(id, needed, eval_prev, Evaluation::Default)?;
            }
            if b == 0 {
                self.scopes.group = ScopeState::Fresh;
            }
            if to_print {
                let placed = self.fill_column_band(id, Evaluation::Default)?;
                range = Some(expand_range(range, placed));
            }
        }

        self.groups[i].phase = GroupPhase::HeaderPrinted;
        self.scopes.group = ScopeState::Fresh;
        Ok(range.unwrap_or_else(|| self.range_here()))
    }

    /// Reprint headers of groups that asked for it on each page.
    fn fill_group_headers_reprint(&mut self, evaluation: Evaluation) -> Result<(), QuireError> {
        for i in 0..self.groups.len() {
            let state = self.groups[i];
            let reprint = self.report.groups[i].reprint_header_on_each_page
                && (!state.changed || state.phase == GroupPhase::HeaderPrinted);
            if !reprint {
                continue;
            }
            log::debug!(
                "fill {}: reprinting {} header",
                self.options.id,
                self.report.groups[i].name
            );
            for b in 0..self.bands.group_header_count(i) {
                let id = BandId::GroupHeader(i, b);
                if self.evaluate_print_when(id, evaluation)? {
                    let needed = self
                        .bands
                        .get(id)
                        .break_height()
                        .max(self.report.groups[i].min_height_to_start_new_page);
                    self.ensure_room(id, needed, evaluation, evaluation)?;
                    self.fill_column_band(id, evaluation)?;
                }
            }
        }
        Ok(())
    }

    fn fill_group_footers(&mut self, fill_all: bool) -> Result<(), QuireError> {
        if self.groups.is_empty() {
            return Ok(());
        }
        let evaluation = if fill_all {
            Evaluation::Default
        } else {
            Evaluation::Old
        };

        let mut carry: Option<GroupFooterRange> = None;
        for i in (0..self.groups.len()).rev() {
            if !(fill_all || self.groups[i].changed) {
                continue;
            }
            let position = self.report.groups[i].footer_position;
            if let Some(placed) = self.fill_group_footer(i, evaluation)? {
                let placement = place_group_footer(
                    carry.take(),
                    placed,
                    position,
                    &mut self.pages,
                    self.column_footer_offset_y,
                );
                carry = placement.carry;
                if placement.at_bottom {
                    self.cursor.offset_y = self.column_footer_offset_y;
                }
            }
            // Kept together until the owning group or one outside it closes.
            if self
                .keep_together
                .as_ref()
                .is_some_and(|keep| i <= keep.group_index)
            {
                self.keep_together = None;
            }
        }

        if flush_group_footers(carry, &mut self.pages, self.column_footer_offset_y) {
            self.cursor.offset_y = self.column_footer_offset_y;
        }
        Ok(())
    }

    fn fill_group_footer(
        &mut self,
        i: usize,
        evaluation: Evaluation,
    ) -> Result<Option<GroupFooterRange>, QuireError> {
        log::debug!(
            "fill {}: {} footer at {}",
            self.options.id,
            self.report.groups[i].name,
            self.cursor.offset_y
        );
        let position = self.report.groups[i].footer_position;

        let mut carry: Option<GroupFooterRange> = None;
        for b in 0..self.bands.group_footer_count(i) {
            let id = BandId::GroupFooter(i, b);
            if !self.evaluate_print_when(id, evaluation)? {
                continue;
            }
            let needed = self.bands.get(id).break_height();
            self.ensure_room(id, needed, evaluation, evaluation)?;
            let placed = self.fill_column_band(id, evaluation)?;
            carry = Some(expand_or_move(
                carry,
                GroupFooterRange::new(placed, position),
                &mut self.pages,
                self.column_footer_offset_y,
            ));
        }

        self.scopes.page = ScopeState::Started;
        self.scopes.column = ScopeState::Started;
        self.groups[i].phase = GroupPhase::FooterPrinted;
        Ok(carry)
    }

    // ─── Detail ─────────────────────────────────────────────────────

    fn fill_detail(&mut self) -> Result<(), QuireError> {
        log::trace!("fill {}: detail at {}", self.options.id, self.cursor.offset_y);

        if self.bands.any_detail_print_when() {
            self.calc.estimate_variables()?;
        }

        let eval_prev = if self.scopes.group == ScopeState::Fresh {
            Evaluation::Default
        } else {
            Evaluation::Old
        };
        for b in 0..self.bands.detail_count() {
            let id = BandId::Detail(b);
            if self.evaluate_print_when(id, Evaluation::Estimated)? {
                let needed = self.bands.get(id).break_height();
                self.ensure_room(id, needed, eval_prev, Evaluation::Default)?;
                break;
            }
        }

        self.scriptlet.before_detail_eval()?;
        self.calc.calculate_variables()?;
        self.scriptlet.after_detail_eval()?;

        for b in 0..self.bands.detail_count() {
            let id = BandId::Detail(b);
            if self.evaluate_print_when(id, Evaluation::Default)? {
                self.fill_column_band(id, Evaluation::Default)?;
            }
        }

        self.scopes.page = ScopeState::Started;
        self.scopes.column = ScopeState::Started;
        self.scopes.group = ScopeState::Started;
        Ok(())
    }
}
