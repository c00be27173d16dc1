//! Error type for capacity reservation.

/// Error returned by [`AvlTree::try_reserve`](crate::AvlTree::try_reserve).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveError {
    /// The request exceeds the `u32` slot index space, or the backing
    /// block size would overflow `isize`.
    CapacityOverflow {
        /// Slot count the arena would have needed.
        requested: usize,
    },
}

impl std::fmt::Display for ReserveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReserveError::CapacityOverflow { requested } => {
                write!(f, "capacity overflow: {} slots requested", requested)
            }
        }
    }
}

impl std::error::Error for ReserveError {}

/// Result type for capacity reservation.
pub type Result<T> = std::result::Result<T, ReserveError>;
