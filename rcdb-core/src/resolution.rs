//! Pull-once configuration fields.

/// A configuration value that may be left for the server to supply.
///
/// Fields move forward only: `Unspecified` → `PendingResolution` →
/// `Resolved`, or straight to `Resolved`. Once resolved a field is only
/// changed by an explicit set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// Not configured and not yet observed in storage.
    Unspecified,
    /// Storage had no copy when last checked; the empty default was pushed.
    PendingResolution,
    /// Configured by the caller or adopted from the stored design document.
    Resolved(T),
}

impl<T: Clone + Default> Resolution<T> {
    pub fn from_config(value: Option<T>) -> Self {
        value.map_or(Self::Unspecified, Self::Resolved)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The value to generate with: the resolved value, or the default.
    pub fn effective(&self) -> T {
        match self {
            Self::Resolved(value) => value.clone(),
            Self::Unspecified | Self::PendingResolution => T::default(),
        }
    }

    /// Adopts `stored` unless already resolved. Returns true if adopted.
    pub(crate) fn resolve_from(&mut self, stored: &T) -> bool {
        if self.is_resolved() {
            return false;
        }
        *self = Self::Resolved(stored.clone());
        true
    }

    pub(crate) fn mark_pending(&mut self) {
        if matches!(self, Self::Unspecified) {
            *self = Self::PendingResolution;
        }
    }

    pub(crate) fn set(&mut self, value: T) {
        *self = Self::Resolved(value);
    }
}
