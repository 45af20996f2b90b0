//! rMATS event tables and their resolution onto splice-graph fragments.

pub mod io;
pub mod resolver;

pub use io::{EventRecord, EventSpan, EventTable, EventTableError, ExonSpan, OverhangSpan};
pub use resolver::{EventResolver, FragmentMap, ResolveError, ResolveOptions};
