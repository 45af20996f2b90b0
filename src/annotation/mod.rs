pub mod builder;
pub mod io;

pub use builder::{BuildError, FragmentBuilder};
pub use io::{ExonicPart, ParseError, PartitionAnnotation, PartitionReader, PartitionRecord};
