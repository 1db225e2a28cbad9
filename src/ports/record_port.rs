//! Input table port trait.

use crate::domain::error::WhatifError;
use crate::domain::order::RawOrder;
use crate::domain::reconstruct::BucketRecord;
use crate::domain::scenario::ScenarioRecord;

/// Source of the raw input tables consumed by a run.
pub trait RecordSource {
    fn read_orders(&self) -> Result<Vec<RawOrder>, WhatifError>;

    fn read_buckets(&self) -> Result<Vec<BucketRecord>, WhatifError>;

    fn read_scenarios(&self) -> Result<Vec<ScenarioRecord>, WhatifError>;
}
