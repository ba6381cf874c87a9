//! Bindings for the watched token contract.

use alloy::{primitives::FixedBytes, sol, sol_types::SolCall};

sol! {
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256 balance);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// Selector of `transfer(address,uint256)`.
pub const TRANSFER_SELECTOR: FixedBytes<4> = FixedBytes(IERC20::transferCall::SELECTOR);
