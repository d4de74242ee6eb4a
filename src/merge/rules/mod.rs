//! Table-specific merge rules.
//!
//! The rule for a table is chosen once, when the table starts, and every
//! row of every feed goes through it. Namespace merges use only the agency
//! and translations rules; every other table is passed through and scoped
//! generically.

pub mod agency;
pub mod calendar;
pub mod calendar_dates;
pub mod keyed;
pub mod shapes;
pub mod translations;
pub mod trips;

use gtfs_schema::TableDescriptor;

use crate::archive::TableData;
use crate::feed::MergeType;

use super::context::{Flow, MergeContext, RunState};
use super::frame::{RowFrame, RowPlan};
use super::table::TableKind;
use keyed::KeyedRule;
use shapes::ShapesRule;

/// The handler for one table.
#[derive(Debug)]
pub enum TableRule {
    Agency,
    Calendar,
    CalendarDates,
    Trips,
    Shapes(ShapesRule),
    Keyed(KeyedRule),
    Translations,
    Passthrough,
}

impl TableRule {
    /// Pick the rule for `table` and run its start-of-table checks.
    ///
    /// `written` holds the copies of the table that will be merged.
    ///
    /// # Errors
    /// Halts when the inputs cannot be merged safely.
    pub fn select(
        kind: TableKind,
        table: &TableDescriptor,
        ctx: &MergeContext<'_>,
        inputs: &[Option<TableData>],
        written: &[&TableData],
        state: &mut RunState,
    ) -> Flow<Self> {
        if kind == TableKind::Agency {
            agency::start_table(ctx, inputs, state)?;
            return Ok(Self::Agency);
        }
        if kind == TableKind::Translations {
            return Ok(Self::Translations);
        }
        if ctx.merge_type == MergeType::Namespace {
            return Ok(Self::Passthrough);
        }
        Ok(match kind {
            TableKind::Calendar => Self::Calendar,
            TableKind::CalendarDates => Self::CalendarDates,
            TableKind::Trips => Self::Trips,
            TableKind::Shapes => Self::Shapes(ShapesRule::default()),
            TableKind::Stops | TableKind::Routes => Self::Keyed(KeyedRule::select(table, written)?),
            TableKind::Agency
            | TableKind::FeedInfo
            | TableKind::Translations
            | TableKind::Other => Self::Passthrough,
        })
    }

    /// The field rows are identified by.
    #[must_use]
    pub fn key_field(&self, table: &TableDescriptor) -> Option<&'static str> {
        match self {
            Self::Keyed(rule) => rule.key_field(table),
            _ => table.key_field,
        }
    }

    /// Called before the rows of a feed that is only checked.
    pub fn start_check(&self, data: &TableData, feed_index: usize, state: &mut RunState) {
        if matches!(self, Self::Agency) {
            agency::start_older_feed(data, feed_index, state);
        }
    }

    /// Check a row of a feed whose copy of the table is not written.
    ///
    /// # Errors
    /// Halts when the row contradicts what was written.
    pub fn check_row(&self, frame: &RowFrame<'_>, state: &RunState) -> Flow<()> {
        match self {
            Self::Agency => agency::check_row(frame, state),
            _ => Ok(()),
        }
    }

    /// Decide what to do with one row.
    ///
    /// # Errors
    /// Halts on unparseable dates.
    pub fn plan_row(
        &mut self,
        frame: &RowFrame<'_>,
        ctx: &MergeContext<'_>,
        state: &mut RunState,
    ) -> Flow<RowPlan> {
        if matches!(self, Self::Translations) {
            return Ok(translations::plan_row(frame, ctx, &mut state.result));
        }
        let Some(rc) = ctx.reconcile.as_ref() else {
            return Ok(RowPlan::keep());
        };
        let config = ctx.config;
        Ok(match self {
            Self::Calendar => calendar::plan_row(frame, rc, config, &mut state.result)?,
            Self::CalendarDates => calendar_dates::plan_row(frame, rc, config, &mut state.result)?,
            Self::Trips => trips::plan_row(frame, rc, config, &mut state.result),
            Self::Shapes(rule) => rule.plan_row(frame, config, &mut state.result),
            Self::Keyed(rule) => rule.plan_row(frame, config, &state.registry, &mut state.result),
            Self::Agency | Self::Translations | Self::Passthrough => RowPlan::keep(),
        })
    }
}
