use std::fmt;

use crate::WorkletValueId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkletError {
    /// A background ref was looked up before its init value arrived.
    MissingRef { wvid: WorkletValueId },
    InvalidInitPatch { reason: String },
    /// A hydration context was not a worklet object.
    InvalidContext { reason: String },
    /// The first-screen map can only be cleared after hydration.
    NotHydrated,
    AlreadyCleared,
    /// First-screen lookup after clear with recovery disabled.
    FirstScreenCleared { wvid: WorkletValueId },
}

impl fmt::Display for WorkletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkletError::MissingRef { wvid } => write!(f, "worklet ref {wvid} is not registered"),
            WorkletError::InvalidInitPatch { reason } => {
                write!(f, "invalid worklet ref init patch: {reason}")
            }
            WorkletError::InvalidContext { reason } => {
                write!(f, "invalid worklet context: {reason}")
            }
            WorkletError::NotHydrated => {
                write!(f, "first-screen refs cannot be cleared before hydration")
            }
            WorkletError::AlreadyCleared => write!(f, "first-screen refs were already cleared"),
            WorkletError::FirstScreenCleared { wvid } => {
                write!(f, "first-screen ref {wvid} requested after the map was cleared")
            }
        }
    }
}

impl std::error::Error for WorkletError {}
