use std::fmt;

/// Lifecycle state of a component configuration.
///
/// Variants are declared in ascending order so that "at or below
/// `Disposing`" checks can use plain comparisons:
/// `Disposed < Disposing < Satisfied < Building < Built`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ComponentState {
    Disposed,
    Disposing,
    Satisfied,
    Building,
    Built,
}

impl ComponentState {
    /// True for `Disposing` and `Disposed`.
    pub fn is_disposing_or_below(self) -> bool {
        self <= ComponentState::Disposing
    }

    /// Whether moving from `self` to `next` respects the lifecycle order.
    ///
    /// `Satisfied -> Building -> {Built | Disposed}`, `Built -> Disposing -> Disposed`,
    /// and any live state may start disposing.
    pub fn can_transition_to(self, next: ComponentState) -> bool {
        use ComponentState::*;
        matches!(
            (self, next),
            (Satisfied, Building)
                | (Building, Built)
                | (Building, Disposed)
                | (Satisfied, Disposing)
                | (Building, Disposing)
                | (Built, Disposing)
                | (Disposing, Disposed)
        )
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ComponentState::Disposed => "DISPOSED",
            ComponentState::Disposing => "DISPOSING",
            ComponentState::Satisfied => "SATISFIED",
            ComponentState::Building => "BUILDING",
            ComponentState::Built => "BUILT",
        };
        f.write_str(label)
    }
}

/// Why a component configuration is being deactivated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeactivationReason {
    Unspecified,
    Disabled,
    ReferenceUnsatisfied,
    ConfigurationModified,
    ConfigurationDeleted,
    Disposed,
    OwnerStopped,
}

impl DeactivationReason {
    /// Numeric code handed to component deactivation callbacks
    pub fn code(self) -> u8 {
        match self {
            DeactivationReason::Unspecified => 0,
            DeactivationReason::Disabled => 1,
            DeactivationReason::ReferenceUnsatisfied => 2,
            DeactivationReason::ConfigurationModified => 3,
            DeactivationReason::ConfigurationDeleted => 4,
            DeactivationReason::Disposed => 5,
            DeactivationReason::OwnerStopped => 6,
        }
    }
}

impl fmt::Display for DeactivationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}
