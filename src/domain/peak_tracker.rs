//! Rally-peak / pullback state machine.
//!
//! The tracker follows a running high (the candidate peak). Once price has
//! pulled back far enough from it and then reclaimed far enough off the
//! pullback low, the candidate is committed as the anchor peak. The anchor
//! is the reference high used to measure how deep an entry's dip was.

use super::bar::Bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerParams {
    /// Drawdown from the candidate peak that starts a pullback.
    pub pullback_pct: f64,
    /// Rebound off the pullback low that confirms the peak.
    pub reclaim_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    SeekingPeak,
    InPullback,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackerState {
    pub phase: Phase,
    pub candidate_peak: Option<f64>,
    pub pullback_low: Option<f64>,
    pub anchor_peak: Option<f64>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pure transition: the state after observing `bar`.
    pub fn step(self, bar: &Bar, params: &TrackerParams) -> TrackerState {
        let mut next = self;

        let peak = match next.candidate_peak {
            Some(p) if p >= bar.high => p,
            _ => bar.high,
        };
        next.candidate_peak = Some(peak);

        match next.phase {
            Phase::SeekingPeak => {
                let drawdown = (peak - bar.low) / peak;
                if drawdown >= params.pullback_pct {
                    next.phase = Phase::InPullback;
                    next.pullback_low = Some(bar.low);
                }
            }
            Phase::InPullback => {
                let low = next.pullback_low.map_or(bar.low, |l| l.min(bar.low));
                next.pullback_low = Some(low);

                let reclaim = (bar.close - low) / low;
                if reclaim >= params.reclaim_pct {
                    next.anchor_peak = Some(peak);
                    next.phase = Phase::SeekingPeak;
                    next.pullback_low = None;
                }
            }
        }

        next
    }

    /// Fold `step` over `bars`, starting from a fresh state.
    pub fn run(bars: &[Bar], params: &TrackerParams) -> TrackerState {
        bars.iter()
            .fold(TrackerState::new(), |state, bar| state.step(bar, params))
    }

    /// Last committed anchor, else the best high seen so far.
    pub fn anchor_peak(&self) -> Option<f64> {
        self.anchor_peak.or(self.candidate_peak)
    }

    pub fn has_committed(&self) -> bool {
        self.anchor_peak.is_some()
    }
}
