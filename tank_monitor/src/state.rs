/// Holder for the latest snapshot.
///
/// Owned by the monitor and only touched from the main loop, so a plain
/// value is enough.

use crate::model::TankSnapshot;

#[derive(Debug, Default)]
pub struct StateStore {
    snapshot: TankSnapshot,
    updates: u64,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current snapshot.
    pub fn update(&mut self, snapshot: TankSnapshot) {
        self.snapshot = snapshot;
        self.updates += 1;
    }

    pub fn read(&self) -> TankSnapshot {
        self.snapshot
    }

    /// Number of completed sample cycles since boot
    pub fn updates(&self) -> u64 {
        self.updates
    }
}
