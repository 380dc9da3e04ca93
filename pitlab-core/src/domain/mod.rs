//! Domain types for pitlab

pub mod bar;
pub mod fundamentals;
pub mod records;
pub mod series;
pub mod ticker;

pub use bar::Bar;
pub use fundamentals::{FieldSet, FundamentalField, Fundamentals, FundamentalsRecord};
pub use records::{MarketCapPoint, SectorInfo, SectorLabel, SplitEvent};
pub use series::{first_unsorted_index, Dated, Series};
pub use ticker::{Ticker, TickerError};
