//! Shared utilities: calendar arithmetic, Arrow column access, logging.

pub mod arrow;
pub mod dates;
pub mod logging;

pub use dates::{days_in_month, days_in_month_of, from_date32, month_end, month_start, to_date32};
