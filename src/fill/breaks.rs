//! # Page and Column Breaks
//!
//! A break closes the current column (or page), resolves the deferred
//! elements of the scopes that closed, opens the next one with its headers,
//! and carries keep-together content over to it.
//!
//! Only one page break may be in progress at a time. Headers and footers
//! filled during a break can themselves overflow and ask for another page;
//! that recursion can never terminate, so it is reported as
//! [`QuireError::InfiniteLoopCreatingPage`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::calc::Evaluation;
use crate::error::QuireError;
use crate::print::PrintElement;

use super::range::{add_content, remove_content, ElementRange};
use super::{FillContext, ScopeState};

/// Proof that a page break is in progress. Only [`BreakGuard::enter`] makes one.
#[derive(Debug)]
pub struct BreakToken {
    _private: (),
}

#[derive(Debug, Default)]
pub struct BreakGuard {
    active: bool,
}

impl BreakGuard {
    pub fn enter(&mut self) -> Result<BreakToken, QuireError> {
        if self.active {
            return Err(QuireError::InfiniteLoopCreatingPage);
        }
        self.active = true;
        Ok(BreakToken { _private: () })
    }

    pub fn exit(&mut self, token: BreakToken) {
        drop(token);
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Cooperative cancellation, checked at every page and column break.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl FillContext<'_> {
    fn check_cancelled(&self) -> Result<(), QuireError> {
        match &self.options.cancel {
            Some(token) if token.is_cancelled() => {
                log::info!("fill {} cancelled on page {}", self.options.id, self.pages.len());
                Err(QuireError::Cancelled)
            }
            _ => Ok(()),
        }
    }

    /// Close the page and open the next one.
    pub(super) fn page_break(
        &mut self,
        reset_page_number: bool,
        eval_prev: Evaluation,
        eval_next: Evaluation,
        reprint_group_headers: bool,
    ) -> Result<(), QuireError> {
        let token = self.breaks.enter()?;
        self.check_cancelled()?;
        log::debug!("fill {}: page break after page {}", self.options.id, self.pages.len());

        if let Some(keep) = self.keep_together.as_mut() {
            keep.range.expand(self.cursor.offset_y);
        }

        self.fill_column_footer(eval_prev)?;
        self.fill_page_footer(eval_prev)?;
        self.close_page_scope(eval_prev)?;

        let moved = self.take_keep_together_content(|range| !range.is_new_page());

        self.add_page(reset_page_number)?;
        self.fill_page_header(eval_next)?;
        self.fill_column_header(eval_next)?;

        let relocated = self.place_keep_together_content(moved);
        if !relocated && reprint_group_headers {
            self.fill_group_headers_reprint(eval_next)?;
        }

        self.breaks.exit(token);
        Ok(())
    }

    /// Move on to the next column, or the next page from the last column.
    pub(super) fn column_break(
        &mut self,
        eval_prev: Evaluation,
        eval_next: Evaluation,
    ) -> Result<(), QuireError> {
        if self.column_index + 1 >= self.geometry.column_count {
            return self.page_break(false, eval_prev, eval_next, true);
        }
        self.check_cancelled()?;
        log::debug!(
            "fill {}: column break {} -> {} on page {}",
            self.options.id,
            self.column_index,
            self.column_index + 1,
            self.pages.len()
        );

        if let Some(keep) = self.keep_together.as_mut() {
            keep.range.expand(self.cursor.offset_y);
        }

        self.fill_column_footer(eval_prev)?;
        self.resolve_group_bound_elements(eval_prev, false)?;
        self.resolve_column_bound_elements(eval_prev)?;
        self.init_column_variables()?;

        let moved = self.take_keep_together_content(|range| !range.is_new_column());

        self.column_index += 1;
        self.set_offset_x();
        self.cursor.offset_y = self.column_header_offset_y;
        self.calc.set_column_number(self.column_index as u32 + 1);

        self.fill_column_header(eval_next)?;
        self.place_keep_together_content(moved);
        Ok(())
    }

    /// Pull the keep-together content off its page when `movable` says so.
    fn take_keep_together_content(
        &mut self,
        movable: impl Fn(&ElementRange) -> bool,
    ) -> Option<(ElementRange, Vec<PrintElement>)> {
        let keep = self.keep_together.as_ref()?;
        if !movable(&keep.range) {
            return None;
        }
        let range = keep.range.clone();
        let elements = remove_content(&mut self.pages, &range);
        Some((range, elements))
    }

    /// Put removed keep-together content at the cursor and continue below it.
    fn place_keep_together_content(
        &mut self,
        moved: Option<(ElementRange, Vec<PrintElement>)>,
    ) -> bool {
        let Some((old, elements)) = moved else {
            return false;
        };
        if elements.is_empty() {
            return false;
        }

        let page = self.pages.len() - 1;
        let dx = self.geometry.column_x(self.column_index) - self.geometry.column_x(old.column());
        let dy = self.cursor.offset_y - old.top_y();
        for element in &elements {
            self.bound.relocate(element.id, page);
        }
        add_content(&mut self.pages[page], elements, self.column_index, dx, dy);

        let mut range = ElementRange::new(
            page,
            self.column_index,
            self.scopes.page == ScopeState::Fresh,
            true,
            self.cursor.offset_y,
        );
        range.expand(self.cursor.offset_y + old.height());
        self.cursor.offset_y += old.height();
        if let Some(keep) = self.keep_together.as_mut() {
            keep.range = range;
        }
        log::debug!(
            "fill {}: kept group content together in column {} of page {}",
            self.options.id,
            self.column_index,
            page + 1
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_enter_is_an_infinite_loop() {
        let mut guard = BreakGuard::default();
        let token = guard.enter().unwrap();
        assert!(matches!(
            guard.enter(),
            Err(QuireError::InfiniteLoopCreatingPage)
        ));
        guard.exit(token);
        assert!(!guard.is_active());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        token.cancel();
        assert!(observer.is_cancelled());
    }
}
