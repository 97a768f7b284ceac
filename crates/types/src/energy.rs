use core::fmt;

/// The metering currency (spec glossary: "Energy"). Every observable
/// action debits it; exhaustion is terminal.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Energy(pub u64);

impl Energy {
    pub const ZERO: Energy = Energy(0);

    pub fn checked_sub(self, amount: Energy) -> Option<Energy> {
        self.0.checked_sub(amount.0).map(Energy)
    }

    pub fn saturating_add(self, amount: Energy) -> Energy {
        Energy(self.0.saturating_add(amount.0))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl core::ops::Sub for Energy {
    type Output = Energy;
    fn sub(self, rhs: Energy) -> Energy {
        Energy(self.0.saturating_sub(rhs.0))
    }
}

impl core::ops::Add for Energy {
    type Output = Energy;
    fn add(self, rhs: Energy) -> Energy {
        self.saturating_add(rhs)
    }
}
