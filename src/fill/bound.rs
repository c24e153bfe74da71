//! Deferred element resolution.
//!
//! Text elements evaluated later than "now" are placed with their declared
//! size and registered here, keyed by the scope whose closing resolves them.
//! Resolving a scope takes its entries out of the registry, so each element
//! is resolved exactly once however many times the scope is closed.

use crate::calc::Evaluation;
use crate::error::QuireError;
use crate::model::{EvaluationTime, Expression, Report};
use crate::print::{BandKind, PrintContent};

use super::band::split_lines;
use super::FillContext;

/// The scope whose closing resolves a deferred element.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundScope {
    Band(BandKind),
    Group(usize),
    Column,
    Page,
    Report,
}

impl BoundScope {
    /// Scope for an element declared with `time`, printed by `band`.
    /// `None` for elements evaluated immediately or naming an unknown group.
    pub fn for_time(time: &EvaluationTime, band: &BandKind, report: &Report) -> Option<Self> {
        match time {
            EvaluationTime::Now => None,
            EvaluationTime::Band => Some(BoundScope::Band(band.clone())),
            EvaluationTime::Group(name) => match report.group_index(name) {
                Some(i) => Some(BoundScope::Group(i)),
                None => {
                    log::warn!("element bound to unknown group `{name}` resolves with the report");
                    Some(BoundScope::Report)
                }
            },
            EvaluationTime::Column => Some(BoundScope::Column),
            EvaluationTime::Page => Some(BoundScope::Page),
            EvaluationTime::Report => Some(BoundScope::Report),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BoundElement {
    pub id: u64,
    /// Index of the page currently holding the element.
    pub page: usize,
    pub expression: Expression,
}

#[derive(Debug, Clone, Default)]
pub struct BoundElements {
    entries: Vec<(BoundScope, BoundElement)>,
}

impl BoundElements {
    pub fn register(&mut self, scope: BoundScope, element: BoundElement) {
        self.entries.push((scope, element));
    }

    /// Remove and return every entry whose scope matches.
    pub fn take(&mut self, matches: impl Fn(&BoundScope) -> bool) -> Vec<BoundElement> {
        let (taken, kept): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|(scope, _)| matches(scope));
        self.entries = kept;
        taken.into_iter().map(|(_, element)| element).collect()
    }

    /// Record that element `id` now lives on `page`.
    pub fn relocate(&mut self, id: u64, page: usize) {
        for (_, element) in self.entries.iter_mut().filter(|(_, e)| e.id == id) {
            element.page = page;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FillContext<'_> {
    fn resolve(&mut self, elements: Vec<BoundElement>, evaluation: Evaluation) -> Result<(), QuireError> {
        for element in elements {
            let lines = split_lines(&self.calc.evaluate(&element.expression, evaluation)?);
            match self
                .pages
                .get_mut(element.page)
                .and_then(|page| page.find_mut(element.id))
            {
                Some(printed) => printed.content = PrintContent::Text { lines },
                None => log::warn!("deferred element {} is no longer on page {}", element.id, element.page),
            }
        }
        Ok(())
    }

    pub(super) fn resolve_band_bound_elements(
        &mut self,
        band: &BandKind,
        evaluation: Evaluation,
    ) -> Result<(), QuireError> {
        let elements = self
            .bound
            .take(|scope| matches!(scope, BoundScope::Band(kind) if kind == band));
        self.resolve(elements, evaluation)
    }

    /// Resolve elements of groups that just closed, or of every group when
    /// `is_final`.
    pub(super) fn resolve_group_bound_elements(
        &mut self,
        evaluation: Evaluation,
        is_final: bool,
    ) -> Result<(), QuireError> {
        let closing: Vec<bool> = self
            .groups
            .iter()
            .map(|g| is_final || g.changed)
            .collect();
        let elements = self.bound.take(|scope| match scope {
            BoundScope::Group(i) => closing.get(*i).copied().unwrap_or(false),
            _ => false,
        });
        self.resolve(elements, evaluation)
    }

    pub(super) fn resolve_column_bound_elements(
        &mut self,
        evaluation: Evaluation,
    ) -> Result<(), QuireError> {
        let elements = self.bound.take(|scope| *scope == BoundScope::Column);
        self.resolve(elements, evaluation)
    }

    pub(super) fn resolve_page_bound_elements(
        &mut self,
        evaluation: Evaluation,
    ) -> Result<(), QuireError> {
        let elements = self.bound.take(|scope| *scope == BoundScope::Page);
        self.resolve(elements, evaluation)
    }

    pub(super) fn resolve_report_bound_elements(&mut self) -> Result<(), QuireError> {
        let elements = self.bound.take(|scope| *scope == BoundScope::Report);
        self.resolve(elements, Evaluation::Default)
    }
}
