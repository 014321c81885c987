//! Domain types: periods, identifiers, and the two table shapes every
//! pipeline produces.

pub mod identifier;
pub mod panel;
pub mod period;
pub mod table;

pub use identifier::{IdentifierBatch, IdentifierKind, RawIdentifier};
pub use panel::{PanelRow, PanelTable};
pub use period::{DateRange, Period};
pub use table::MonthlyTable;
