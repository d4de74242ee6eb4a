//! Table kinds and how each feed takes part in a table.

use super::context::{FeedRole, MergeContext};
use super::strategy::MergeStrategy;
use crate::feed::MergeType;

/// Tables whose merge behaviour differs from the generic rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableKind {
    Agency,
    Calendar,
    CalendarDates,
    Trips,
    Shapes,
    Stops,
    Routes,
    FeedInfo,
    Translations,
    Other,
}

impl TableKind {
    #[must_use]
    pub fn of(table: &str) -> Self {
        match table {
            "agency" => Self::Agency,
            "calendar" => Self::Calendar,
            "calendar_dates" => Self::CalendarDates,
            "trips" => Self::Trips,
            "shapes" => Self::Shapes,
            "stops" => Self::Stops,
            "routes" => Self::Routes,
            "feed_info" => Self::FeedInfo,
            "translations" => Self::Translations,
            _ => Self::Other,
        }
    }

    /// Whether the table's rows name a service.
    #[must_use]
    pub const fn defines_services(self) -> bool {
        matches!(self, Self::Calendar | Self::CalendarDates)
    }

    /// How a feed in `role` takes part in this table.
    #[must_use]
    pub fn disposition(self, ctx: &MergeContext<'_>, role: FeedRole) -> Disposition {
        if ctx.merge_type == MergeType::Namespace || role != FeedRole::Active {
            return Disposition::Write;
        }
        let strategy = ctx
            .reconcile
            .as_ref()
            .map_or(MergeStrategy::Default, |rc| rc.plan.strategy);
        match self {
            Self::Agency => Disposition::CheckOnly,
            Self::FeedInfo => Disposition::Skip,
            Self::CalendarDates => Disposition::Write,
            _ if strategy == MergeStrategy::ExtendFuture => Disposition::Skip,
            _ => Disposition::Write,
        }
    }
}

/// How one feed's copy of a table is handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Rows are merged into the output.
    Write,
    /// Rows are checked against what was written, then discarded.
    CheckOnly,
    /// The feed's copy of the table is ignored.
    Skip,
}
