//! Lifecycle hooks fired by the filler around variable initialization and
//! detail evaluation.
//!
//! Hooks fire at their documented points whether or not any content prints.
//! Every method has an empty default, so an implementation only overrides
//! what it cares about.

use crate::error::QuireError;

pub trait Scriptlet {
    fn before_report_init(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
    fn after_report_init(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
    fn before_page_init(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
    fn after_page_init(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
    fn before_column_init(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
    fn after_column_init(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
    fn before_group_init(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
    fn after_group_init(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
    fn before_detail_eval(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
    fn after_detail_eval(&mut self) -> Result<(), QuireError> {
        Ok(())
    }
}

/// A scriptlet that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScriptlet;

impl Scriptlet for NoopScriptlet {}
