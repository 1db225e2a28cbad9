//! Bar source port trait.

use crate::domain::bar::Bar;
use crate::domain::error::WhatifError;

pub trait BarSource {
    /// Fetch the cached bars for one symbol.
    ///
    /// Returns [`WhatifError::NoData`] when the source has nothing for the
    /// symbol; other errors are treated as fatal by the loader.
    fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, WhatifError>;
}
