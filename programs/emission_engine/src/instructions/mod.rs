/**
 * Instructions for the Emission Engine
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

pub mod transfers;
pub mod vesting;
pub mod distributor;
pub mod farming;
pub mod liquidity;

pub use vesting::*;
pub use distributor::*;
pub use farming::*;
pub use liquidity::*;
