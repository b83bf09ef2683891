// Runtime binding options.

/// What to do when an array has the right element type, byte order, rank and shape but a
/// stride pattern the requested view cannot express.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MismatchPolicy {
    /// Fail with a type error.
    #[default]
    Reject,
    /// Densify into fresh storage. The resulting view is read-only, since writes to a copy
    /// would never reach the caller's array.
    Copy,
}

/// Options applied when binding host arrays to native views.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BindOptions {
    pub on_mismatch: MismatchPolicy,
}

impl BindOptions {
    /// Zero-copy only.
    pub fn strict() -> Self {
        Self { on_mismatch: MismatchPolicy::Reject }
    }

    /// Opt in to copying layouts that cannot be viewed in place.
    pub fn copy_on_mismatch() -> Self {
        Self { on_mismatch: MismatchPolicy::Copy }
    }

    pub fn allows_copy(&self) -> bool {
        self.on_mismatch == MismatchPolicy::Copy
    }
}
