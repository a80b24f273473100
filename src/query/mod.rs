//! Pure query layer over a loaded listing collection.
//!
//! Nothing here suspends or mutates its input: the catalog recomputes the
//! visible view by calling [`filter`] then [`sort`], and the facet lists and
//! price history are derived the same way.

pub mod facets;
pub mod filter;
pub mod history;
pub mod sort;

pub use facets::{distinct_buildings, distinct_floorplan_types, Facets};
pub use filter::{filter, FilterCriteria};
pub use history::{is_newest_first, parse_fetch_date, project, summarize, HistorySummary, PriceSample};
pub use sort::{sort, SortCriteria, SortKey, SortOrder};
