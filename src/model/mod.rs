//! Types that represent the core data model, such as `ExpenseRecord` and `CategoryMap`.
mod amount;
mod category;
mod cell;
mod layout;
mod mapping;
mod month;
mod record;
mod row_col;
mod table;

pub use amount::{grouped, Amount, AmountError, AmountFormat};
pub use category::{CategoryMap, MacroCategory};
pub use cell::Cell;
pub use layout::{Layout, MonthSource, RowHeaders};
pub use mapping::{Header, Mapping, MappingError};
pub use month::{Month, MonthError};
pub use record::ExpenseRecord;
pub use row_col::RowCol;
pub use table::RawTable;
