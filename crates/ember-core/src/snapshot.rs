//! Latest published readings, shared between the monitor and HTTP workers
//!
//! The monitor task is the only writer. Readers copy the whole snapshot out
//! inside one critical section, so a gas value from one cycle is never paired
//! with an IR value from another.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorSnapshot {
    /// Averaged gas reading (raw code or millivolts, see `calibrated`)
    pub gas_value: u16,
    /// Averaged IR reading (raw code or millivolts, see `calibrated`)
    pub ir_value: u16,
    pub alarm_active: bool,
    /// Whether the values above are millivolts
    pub calibrated: bool,
    /// Monitor cycle that produced this snapshot, starting at 1.
    /// Zero means nothing has been published yet.
    pub sequence: u32,
    /// Milliseconds since boot at publication
    pub captured_at_ms: u64,
}

impl SensorSnapshot {
    pub const EMPTY: Self = Self {
        gas_value: 0,
        ir_value: 0,
        alarm_active: false,
        calibrated: false,
        sequence: 0,
        captured_at_ms: 0,
    };

    pub const fn is_published(&self) -> bool {
        self.sequence != 0
    }

    /// Age relative to `now_ms`, `None` before the first publication.
    pub const fn age_ms(&self, now_ms: u64) -> Option<u64> {
        if self.is_published() {
            Some(now_ms.saturating_sub(self.captured_at_ms))
        } else {
            None
        }
    }
}

/// Single-writer, many-reader snapshot slot.
pub struct SnapshotCell {
    inner: Mutex<CriticalSectionRawMutex, Cell<SensorSnapshot>>,
}

impl SnapshotCell {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(SensorSnapshot::EMPTY)),
        }
    }

    /// Replace the snapshot as a whole.
    pub fn publish(&self, snapshot: SensorSnapshot) {
        self.inner.lock(|cell| cell.set(snapshot));
    }

    /// Copy of the most recent snapshot.
    pub fn latest(&self) -> SensorSnapshot {
        self.inner.lock(|cell| cell.get())
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new()
    }
}
