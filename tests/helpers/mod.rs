pub mod builders;
pub mod flaky;

pub use builders::{standard_catalog, verb_set, ClusterBuilder, SpecBuilder};
pub use flaky::FlakyCluster;
