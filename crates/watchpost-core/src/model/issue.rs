//! Issues

/// A problem affecting a host
///
/// Carries no fields yet. Issues are mapped to the wire with a placeholder
/// id only; the type exists so reporters can already return them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Issue;

impl Issue {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}
