/*
    hlc - Hybrid Logical Clock

    Timestamps every operation with a reading that is globally comparable
    across replicas and consistent with causality.
*/

pub mod clock;
pub mod errors;
pub mod timestamp;
pub mod wall_clock;

pub use clock::Hlc;
pub use errors::{HlcError, HlcResult};
pub use timestamp::{HlcTimestamp, FIELD_SEPARATOR, MAX_WALLTIME};
pub use wall_clock::{ManualClock, SystemClock, WallClock};
