//! Output table port trait.

use crate::domain::error::WhatifError;
use crate::domain::position::Position;
use crate::domain::simulate::SimulationResult;

/// Port for writing the reconstructed-positions and simulation tables.
pub trait ReportPort {
    fn write_positions(&self, positions: &[Position]) -> Result<(), WhatifError>;

    fn write_results(&self, results: &[SimulationResult]) -> Result<(), WhatifError>;
}
