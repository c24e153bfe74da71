//! Summary placement.
//!
//! The summary closes the report. Where it goes depends on whether a last
//! page footer exists and whether summary pages carry the page header and
//! footer:
//!
//! - no last page footer, summary fits after the content: same page
//! - no last page footer otherwise: its own page(s)
//! - last page footer, with page bands on summary pages
//! - last page footer, without page bands on summary pages
//!
//! In every case the last page footer ends up on the final page and the
//! deferred elements of all remaining scopes are resolved.

use crate::calc::Evaluation;
use crate::error::QuireError;

use super::band::BandId;
use super::FillContext;

const DEFAULT: Evaluation = Evaluation::Default;

impl FillContext<'_> {
    pub(super) fn fill_summary(&mut self) -> Result<(), QuireError> {
        log::debug!("fill {}: summary at {}", self.options.id, self.cursor.offset_y);
        self.cursor.offset_x = self.geometry.left_margin;

        if self.bands.get(BandId::LastPageFooter).is_missing() {
            if self.summary_fits_here(self.column_footer_offset_y) {
                self.fill_summary_no_last_footer_same_page()?;
            } else {
                self.fill_summary_no_last_footer_new_page()?;
            }
        } else if self.report.summary_with_page_header_and_footer {
            self.fill_summary_with_last_footer_and_page_bands()?;
        } else {
            self.fill_summary_with_last_footer_no_page_bands()?;
        }

        self.resolve_group_bound_elements(DEFAULT, true)?;
        self.resolve_column_bound_elements(DEFAULT)?;
        self.resolve_page_bound_elements(DEFAULT)?;
        self.resolve_report_bound_elements()
    }

    fn summary_fits_here(&self, limit: f64) -> bool {
        !self.report.summary_new_page
            && self.column_index == 0
            && self.bands.get(BandId::Summary).break_height() <= limit - self.cursor.offset_y
    }

    fn summary_to_print(&mut self) -> Result<bool, QuireError> {
        self.evaluate_print_when(BandId::Summary, DEFAULT)
    }

    fn with_page_bands(&self) -> bool {
        self.report.summary_with_page_header_and_footer
    }

    /// Room for the summary on a page of its own.
    fn summary_page_room(&self) -> f64 {
        let footer = if self.with_page_bands() {
            self.bands.get(BandId::PageFooter).height()
        } else {
            0.0
        };
        self.geometry.page_height - self.geometry.bottom_margin - self.cursor.offset_y - footer
    }

    /// Close the page and open a summary page, with its header if asked.
    fn new_summary_page(&mut self, with_header: bool, final_groups: bool) -> Result<(), QuireError> {
        self.close_page_scope_with(DEFAULT, final_groups)?;
        self.add_page(false)?;
        if with_header {
            self.fill_page_header(DEFAULT)?;
        }
        Ok(())
    }

    fn fill_summary_piece(&mut self, available: f64) -> Result<(), QuireError> {
        let printed = self.bands.get_mut(BandId::Summary).fill(available);
        self.place_band(BandId::Summary, printed);
        Ok(())
    }

    fn refill_summary_piece(&mut self, available: f64) -> Result<(), QuireError> {
        let printed = self.bands.get_mut(BandId::Summary).refill(available);
        self.place_band(BandId::Summary, printed);
        Ok(())
    }

    fn summary_split_prevented(&self) -> bool {
        let summary = self.bands.get(BandId::Summary);
        summary.will_overflow() && summary.is_split_prevented()
    }

    fn fill_page_and_column_footers(&mut self) -> Result<(), QuireError> {
        self.fill_column_footer(DEFAULT)?;
        self.fill_page_footer(DEFAULT)
    }

    fn fill_summary_no_last_footer_same_page(&mut self) -> Result<(), QuireError> {
        if !self.summary_to_print()? {
            return self.fill_page_and_column_footers();
        }
        self.evaluate_band(BandId::Summary, DEFAULT)?;
        let printed = self
            .bands
            .get_mut(BandId::Summary)
            .fill(self.column_footer_offset_y - self.cursor.offset_y);

        if self.summary_split_prevented() {
            self.fill_page_and_column_footers()?;
            self.new_summary_page(self.with_page_bands(), true)?;
            self.refill_summary_piece(self.summary_page_room())?;
            return self.fill_summary_overflow();
        }

        self.place_band(BandId::Summary, printed);
        self.fill_page_and_column_footers()?;
        if self.bands.get(BandId::Summary).will_overflow() {
            self.new_summary_page(self.with_page_bands(), true)?;
            self.fill_summary_piece(self.summary_page_room())?;
            self.fill_summary_overflow()
        } else {
            self.resolve_band_bound_elements_of(BandId::Summary, DEFAULT)
        }
    }

    fn fill_summary_no_last_footer_new_page(&mut self) -> Result<(), QuireError> {
        self.fill_page_and_column_footers()?;
        if !self.summary_to_print()? {
            return Ok(());
        }
        self.new_summary_page(self.with_page_bands(), true)?;
        self.evaluate_band(BandId::Summary, DEFAULT)?;
        self.fill_fresh_summary_page()?;
        self.fill_summary_overflow()
    }

    /// Fill the summary at the top of a summary page. A split-prevented
    /// subreport summary gets one more fresh page to try on.
    fn fill_fresh_summary_page(&mut self) -> Result<(), QuireError> {
        let available = self.summary_page_room();
        let printed = self.bands.get_mut(BandId::Summary).fill(available);
        if self.summary_split_prevented() && self.is_subreport() {
            if self.with_page_bands() {
                self.fill_page_footer(DEFAULT)?;
            }
            self.new_summary_page(self.with_page_bands(), true)?;
            return self.refill_summary_piece(self.summary_page_room());
        }
        self.place_band(BandId::Summary, printed);
        Ok(())
    }

    fn fill_summary_with_last_footer_and_page_bands(&mut self) -> Result<(), QuireError> {
        if self.summary_fits_here(self.column_footer_offset_y) {
            if !self.summary_to_print()? {
                self.set_last_page_footer(true);
                return self.fill_page_and_column_footers();
            }
            self.evaluate_band(BandId::Summary, DEFAULT)?;
            let printed = self
                .bands
                .get_mut(BandId::Summary)
                .fill(self.column_footer_offset_y - self.cursor.offset_y);
            if self.summary_split_prevented() {
                self.fill_page_and_column_footers()?;
                self.new_summary_page(true, true)?;
                self.refill_summary_piece(self.summary_page_room())?;
            } else {
                self.place_band(BandId::Summary, printed);
                if !self.bands.get(BandId::Summary).will_overflow() {
                    self.set_last_page_footer(true);
                }
                self.fill_column_footer(DEFAULT)?;
            }
            return self.fill_summary_overflow();
        }

        if self.column_index == 0 && self.cursor.offset_y <= self.last_page_column_footer_offset_y {
            if !self.summary_to_print()? {
                self.set_last_page_footer(true);
                return self.fill_page_and_column_footers();
            }
            self.fill_page_and_column_footers()?;
            self.new_summary_page(true, true)?;
            self.evaluate_band(BandId::Summary, DEFAULT)?;
            self.fill_fresh_summary_page()?;
            return self.fill_summary_overflow();
        }

        // The last page footer does not fit here: it goes on a page of its
        // own, together with the summary if there is one.
        self.fill_page_and_column_footers()?;
        self.new_summary_page(true, false)?;
        if self.summary_to_print()? {
            self.evaluate_band(BandId::Summary, DEFAULT)?;
            self.fill_fresh_summary_page()?;
        }
        self.fill_summary_overflow()
    }

    fn fill_summary_with_last_footer_no_page_bands(&mut self) -> Result<(), QuireError> {
        if self.summary_fits_here(self.last_page_column_footer_offset_y) {
            self.set_last_page_footer(true);
            if !self.summary_to_print()? {
                return self.fill_page_and_column_footers();
            }
            self.evaluate_band(BandId::Summary, DEFAULT)?;
            let printed = self
                .bands
                .get_mut(BandId::Summary)
                .fill(self.column_footer_offset_y - self.cursor.offset_y);
            if self.summary_split_prevented() {
                self.fill_page_and_column_footers()?;
                self.new_summary_page(false, true)?;
                self.refill_summary_piece(self.summary_page_room())?;
            } else {
                self.place_band(BandId::Summary, printed);
                self.fill_page_and_column_footers()?;
            }
            return self.fill_summary_overflow();
        }

        if self.summary_fits_here(self.column_footer_offset_y) {
            if !self.summary_to_print()? {
                if self.cursor.offset_y > self.last_page_column_footer_offset_y {
                    self.page_break(false, DEFAULT, DEFAULT, false)?;
                }
                self.set_last_page_footer(true);
                return self.fill_page_and_column_footers();
            }
            self.evaluate_band(BandId::Summary, DEFAULT)?;
            let printed = self
                .bands
                .get_mut(BandId::Summary)
                .fill(self.column_footer_offset_y - self.cursor.offset_y);
            if self.summary_split_prevented() {
                if self.cursor.offset_y <= self.last_page_column_footer_offset_y {
                    self.set_last_page_footer(true);
                    self.fill_page_and_column_footers()?;
                    self.new_summary_page(false, true)?;
                    self.refill_summary_piece(self.summary_page_room())?;
                } else {
                    self.page_break(false, DEFAULT, DEFAULT, false)?;
                    self.set_last_page_footer(true);
                    self.refill_summary_piece(
                        self.last_page_column_footer_offset_y - self.cursor.offset_y,
                    )?;
                    self.fill_page_and_column_footers()?;
                }
            } else {
                self.place_band(BandId::Summary, printed);
                self.page_break(false, DEFAULT, DEFAULT, false)?;
                self.set_last_page_footer(true);
                if self.bands.get(BandId::Summary).will_overflow() {
                    self.fill_summary_piece(
                        self.last_page_column_footer_offset_y - self.cursor.offset_y,
                    )?;
                }
                self.fill_page_and_column_footers()?;
            }
            return self.fill_summary_overflow();
        }

        if self.column_index == 0 && self.cursor.offset_y <= self.last_page_column_footer_offset_y {
            self.set_last_page_footer(true);
            self.fill_page_and_column_footers()?;
            if self.summary_to_print()? {
                self.new_summary_page(false, true)?;
                self.evaluate_band(BandId::Summary, DEFAULT)?;
                self.fill_fresh_summary_page()?;
                self.fill_summary_overflow()?;
            }
            return Ok(());
        }

        self.fill_page_and_column_footers()?;
        self.new_summary_page(true, false)?;
        self.set_last_page_footer(true);

        if self.report.summary_new_page {
            self.fill_page_footer(DEFAULT)?;
            if self.summary_to_print()? {
                self.new_summary_page(false, true)?;
                self.evaluate_band(BandId::Summary, DEFAULT)?;
                self.fill_fresh_summary_page()?;
                self.fill_summary_overflow()?;
            }
            return Ok(());
        }

        if !self.summary_to_print()? {
            return self.fill_page_footer(DEFAULT);
        }
        self.evaluate_band(BandId::Summary, DEFAULT)?;
        let printed = self
            .bands
            .get_mut(BandId::Summary)
            .fill(self.column_footer_offset_y - self.cursor.offset_y);
        if self.summary_split_prevented() {
            self.fill_page_footer(DEFAULT)?;
            self.new_summary_page(false, true)?;
            self.refill_summary_piece(self.summary_page_room())?;
        } else {
            self.place_band(BandId::Summary, printed);
            self.fill_page_footer(DEFAULT)?;
        }
        self.fill_summary_overflow()
    }

    /// Continue an overflowing summary on new pages, then close the last one.
    fn fill_summary_overflow(&mut self) -> Result<(), QuireError> {
        while self.bands.get(BandId::Summary).will_overflow() {
            if self.with_page_bands() {
                self.fill_page_footer(DEFAULT)?;
            }
            self.new_summary_page(self.with_page_bands(), true)?;
            self.fill_summary_piece(self.summary_page_room())?;
        }
        self.resolve_band_bound_elements_of(BandId::Summary, DEFAULT)?;

        if self.with_page_bands() {
            let last_footer_top = self.geometry.page_height
                - self.geometry.bottom_margin
                - self.bands.get(BandId::LastPageFooter).height();
            if self.cursor.offset_y > last_footer_top {
                self.fill_page_footer(DEFAULT)?;
                self.new_summary_page(true, true)?;
            }
            if !self.bands.get(BandId::LastPageFooter).is_missing() {
                self.set_last_page_footer(true);
            }
            self.fill_page_footer(DEFAULT)?;
        }
        Ok(())
    }
}
