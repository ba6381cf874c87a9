use fastnum::UD128;

/// Minimum-deposit policy applied to the live token balance of a watched
/// address.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BalanceGate {
    threshold: UD128,
}

impl BalanceGate {
    pub fn new(threshold: UD128) -> Self { Self { threshold } }

    pub fn threshold(&self) -> UD128 { self.threshold }

    /// Whether the balance is large enough to sweep.
    pub fn clears(&self, balance: UD128) -> bool { balance >= self.threshold }
}
