//! Schedule representation (C5, `spec.md` §4.4): charge/export windows and
//! their limits, plus the normalisation operations the optimiser uses to
//! mutate them.
//!
//! Grounded on the teacher's `Schedule`/`ScheduleEntry` gap-tolerant
//! lookup and `validate()` shape, generalised from a single ordered list of
//! power entries to the two disjoint window lists `spec.md` describes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A half-open `[start_min, end_min)` window on the minute-offset time grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Window {
    pub start_min: u32,
    pub end_min: u32,
}

impl Window {
    pub fn new(start_min: u32, end_min: u32) -> Self {
        Self { start_min, end_min }
    }

    pub fn len_minutes(&self) -> u32 {
        self.end_min.saturating_sub(self.start_min)
    }

    pub fn contains(&self, minute: u32) -> bool {
        minute >= self.start_min && minute < self.end_min
    }

    pub fn overlaps(&self, other: &Window) -> bool {
        self.start_min < other.end_min && other.start_min < self.end_min
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleValidationError {
    #[error("window list is not sorted ascending")]
    NotSorted,
    #[error("windows overlap: {0:?} and {1:?}")]
    Overlap(Window, Window),
    #[error("charge_windows and charge_limits have different lengths")]
    ChargeLengthMismatch,
    #[error("export_windows and export_limits have different lengths")]
    ExportLengthMismatch,
    #[error("charge limit {0} outside [reserve_min, soc_max]")]
    ChargeLimitOutOfBounds(f64),
    #[error("export limit {0} outside [0, 100]")]
    ExportLimitOutOfBounds(f64),
}

/// The mutable schedule the optimiser hill-climbs over (`spec.md` §3 "Schedule S").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub charge_windows: Vec<Window>,
    /// Target SOC (kWh) for each charge window, same index as `charge_windows`.
    pub charge_limits: Vec<f64>,
    pub export_windows: Vec<Window>,
    /// Export limit (SOC%) for each export window, same index as `export_windows`.
    /// `100` = disabled, `<99` = forced export floor, `99` = freeze.
    pub export_limits: Vec<f64>,
}

impl Schedule {
    pub fn empty() -> Self {
        Self {
            charge_windows: Vec::new(),
            charge_limits: Vec::new(),
            export_windows: Vec::new(),
            export_limits: Vec::new(),
        }
    }

    /// Index of the charge window containing `minute`, if any.
    pub fn charge_window_at(&self, minute: u32) -> Option<usize> {
        self.charge_windows.iter().position(|w| w.contains(minute))
    }

    /// Index of the export window containing `minute`, if any.
    pub fn export_window_at(&self, minute: u32) -> Option<usize> {
        self.export_windows.iter().position(|w| w.contains(minute))
    }

    /// Validates the invariants from `spec.md` §3: each list disjoint and
    /// ascending, lengths matching their limits, limits within bounds.
    pub fn validate(&self, reserve_min_kwh: f64, soc_max_kwh: f64) -> Result<(), ScheduleValidationError> {
        if self.charge_windows.len() != self.charge_limits.len() {
            return Err(ScheduleValidationError::ChargeLengthMismatch);
        }
        if self.export_windows.len() != self.export_limits.len() {
            return Err(ScheduleValidationError::ExportLengthMismatch);
        }
        Self::check_disjoint_ascending(&self.charge_windows)?;
        Self::check_disjoint_ascending(&self.export_windows)?;
        for &limit in &self.charge_limits {
            if limit < reserve_min_kwh || limit > soc_max_kwh {
                return Err(ScheduleValidationError::ChargeLimitOutOfBounds(limit));
            }
        }
        for &limit in &self.export_limits {
            if !(0.0..=100.0).contains(&limit) {
                return Err(ScheduleValidationError::ExportLimitOutOfBounds(limit));
            }
        }
        Ok(())
    }

    fn check_disjoint_ascending(windows: &[Window]) -> Result<(), ScheduleValidationError> {
        for pair in windows.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.start_min > b.start_min {
                return Err(ScheduleValidationError::NotSorted);
            }
            if a.overlaps(&b) {
                return Err(ScheduleValidationError::Overlap(a, b));
            }
        }
        Ok(())
    }

    /// Merges adjacent windows sharing the same limit (`spec.md` §4.4
    /// `combine`), used when `combine_charge_slots`/`combine_discharge_slots`
    /// is on.
    pub fn combine_charge(&mut self) {
        let (windows, limits) = Self::combine_list(&self.charge_windows, &self.charge_limits);
        self.charge_windows = windows;
        self.charge_limits = limits;
    }

    pub fn combine_export(&mut self) {
        let (windows, limits) = Self::combine_list(&self.export_windows, &self.export_limits);
        self.export_windows = windows;
        self.export_limits = limits;
    }

    fn combine_list(windows: &[Window], limits: &[f64]) -> (Vec<Window>, Vec<f64>) {
        if windows.is_empty() {
            return (Vec::new(), Vec::new());
        }
        let mut out_windows = vec![windows[0]];
        let mut out_limits = vec![limits[0]];
        for i in 1..windows.len() {
            let prev = *out_windows.last().unwrap();
            let prev_limit = *out_limits.last().unwrap();
            if windows[i].start_min == prev.end_min && limits[i] == prev_limit {
                out_windows.last_mut().unwrap().end_min = windows[i].end_min;
            } else {
                out_windows.push(windows[i]);
                out_limits.push(limits[i]);
            }
        }
        (out_windows, out_limits)
    }

    /// Splits `window` at each boundary in `boundaries` (minute offsets
    /// strictly inside the window), duplicating its limit to every
    /// resulting sub-window. Used for fine-grained passes (`spec.md` §4.4
    /// `split`).
    pub fn split_charge_window(&mut self, index: usize, boundaries: &[u32]) {
        Self::split_list(&mut self.charge_windows, &mut self.charge_limits, index, boundaries);
    }

    pub fn split_export_window(&mut self, index: usize, boundaries: &[u32]) {
        Self::split_list(&mut self.export_windows, &mut self.export_limits, index, boundaries);
    }

    fn split_list(windows: &mut Vec<Window>, limits: &mut Vec<f64>, index: usize, boundaries: &[u32]) {
        let window = windows[index];
        let limit = limits[index];
        let mut cuts: Vec<u32> = boundaries
            .iter()
            .copied()
            .filter(|&b| b > window.start_min && b < window.end_min)
            .collect();
        cuts.sort_unstable();
        cuts.dedup();
        if cuts.is_empty() {
            return;
        }
        let mut new_windows = Vec::with_capacity(cuts.len() + 1);
        let mut cursor = window.start_min;
        for cut in cuts {
            new_windows.push(Window::new(cursor, cut));
            cursor = cut;
        }
        new_windows.push(Window::new(cursor, window.end_min));
        let new_limits = vec![limit; new_windows.len()];
        windows.splice(index..=index, new_windows);
        limits.splice(index..=index, new_limits);
    }

    /// Ensures charge and export windows are disjoint by clipping the
    /// lower-value window where they overlap (`spec.md` §4.4
    /// `remove_overlap`). Per §3's invariant, export takes precedence when
    /// its limit is `<99`.
    pub fn remove_overlap(&mut self) {
        let mut new_charge = Vec::with_capacity(self.charge_windows.len());
        let mut new_charge_limits = Vec::with_capacity(self.charge_limits.len());
        for (ci, charge) in self.charge_windows.iter().enumerate() {
            let mut remaining = vec![*charge];
            for export in &self.export_windows {
                remaining = remaining
                    .into_iter()
                    .flat_map(|w| clip_overlap(w, *export))
                    .collect();
            }
            for w in remaining {
                new_charge.push(w);
                new_charge_limits.push(self.charge_limits[ci]);
            }
        }
        self.charge_windows = new_charge;
        self.charge_limits = new_charge_limits;
    }
}

/// Returns the parts of `window` that fall outside `cut`, splitting it into
/// zero, one or two remaining pieces.
fn clip_overlap(window: Window, cut: Window) -> Vec<Window> {
    if !window.overlaps(&cut) {
        return vec![window];
    }
    let mut parts = Vec::new();
    if window.start_min < cut.start_min {
        parts.push(Window::new(window.start_min, cut.start_min));
    }
    if window.end_min > cut.end_min {
        parts.push(Window::new(cut.end_min, window.end_min));
    }
    parts
}
