/**
 * Vester State
 *
 * Time-gated release of a pre-funded allocation to a single recipient.
 * The recipient is either a wallet or a share distributor PDA.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;

use crate::{
    math::{elapsed_fraction, emission_curve, emission_curve_end, mul_div_amount},
    EngineError,
    FRACTION_ONE,
    SALE_UPFRONT_DIVISOR,
    VESTING_SEGMENTS,
};

// =============================================================================
// CURVES
// =============================================================================

/// Unlock curve of a vesting schedule
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum VestingCurve {
    /// Constant rate from begin to end
    Linear = 0,
    /// Segmented emission curve, each segment 2.4% slower than the previous
    Emission = 1,
    /// 20% on the first claim after begin, the rest on the emission curve
    Sale = 2,
    /// Emission curve quantized to segments: a whole segment unlocks at its start
    Stepped = 3,
}

impl Default for VestingCurve {
    fn default() -> Self {
        Self::Linear
    }
}

impl VestingCurve {
    /// Cumulative amount of `total` unlocked at `now`
    pub fn vested_amount(
        &self,
        total: u64,
        vesting_begin: i64,
        vesting_end: i64,
        now: i64,
    ) -> Result<u64> {
        require!(vesting_end > vesting_begin, EngineError::InvalidSchedule);

        if now < vesting_begin {
            return Ok(0);
        }
        if now >= vesting_end {
            return Ok(total);
        }

        let elapsed = now - vesting_begin;
        let duration = vesting_end - vesting_begin;

        match self {
            VestingCurve::Linear => {
                mul_div_amount(total, elapsed as u128, duration as u128)
            }
            VestingCurve::Emission => {
                let point = emission_curve(elapsed_fraction(elapsed, duration)?);
                mul_div_amount(total, point, emission_curve_end())
            }
            VestingCurve::Sale => {
                if elapsed == 0 {
                    return Ok(0);
                }
                let upfront = total / SALE_UPFRONT_DIVISOR;
                let point = emission_curve(elapsed_fraction(elapsed, duration)?);
                let curved = mul_div_amount(total - upfront, point, emission_curve_end())?;
                upfront
                    .checked_add(curved)
                    .ok_or(error!(EngineError::MathOverflow))
            }
            VestingCurve::Stepped => {
                let segments = VESTING_SEGMENTS as u128;
                let current = (elapsed as u128) * segments / (duration as u128);
                let unlocked_segments = (current + 1).min(segments);
                let point = emission_curve(unlocked_segments * FRACTION_ONE / segments);
                mul_div_amount(total, point, emission_curve_end())
            }
        }
    }
}

// =============================================================================
// VESTER ACCOUNT
// =============================================================================

/// Vester account
/// Holds `total_amount` in its vault and releases it by elapsed time
#[account]
#[derive(Default)]
pub struct Vester {
    /// Creator-chosen id (PDA seed)
    pub id: u64,

    /// Token mint being vested
    pub mint: Pubkey,

    /// Token account holding the unreleased allocation (PDA owned)
    pub vault: Pubkey,

    /// Account that funded the schedule
    pub creator: Pubkey,

    /// Receives every release; only it can claim or reassign
    pub recipient: Pubkey,

    /// Unlock curve
    pub curve: VestingCurve,

    /// Total allocation
    pub total_amount: u64,

    /// Unix timestamp when unlocking starts
    pub vesting_begin: i64,

    /// Unix timestamp when everything is unlocked
    pub vesting_end: i64,

    /// Amount released so far (lifetime)
    pub claimed_amount: u64,

    /// Bump seed for PDA
    pub bump: u8,

    /// Reserved for future use
    pub reserved: [u8; 32],
}

impl Vester {
    pub const LEN: usize = 8 + // discriminator
        8 +  // id
        32 + // mint
        32 + // vault
        32 + // creator
        32 + // recipient
        1 +  // curve
        8 +  // total_amount
        8 +  // vesting_begin
        8 +  // vesting_end
        8 +  // claimed_amount
        1 +  // bump
        32;  // reserved

    /// Reject schedules that end before they begin
    pub fn validate_schedule(vesting_begin: i64, vesting_end: i64) -> Result<()> {
        require!(vesting_end > vesting_begin, EngineError::InvalidSchedule);
        Ok(())
    }

    /// Cumulative amount unlocked at `now`
    pub fn vested_amount(&self, now: i64) -> Result<u64> {
        self.curve
            .vested_amount(self.total_amount, self.vesting_begin, self.vesting_end, now)
    }

    /// Amount a claim at `now` would release
    pub fn claimable(&self, now: i64) -> Result<u64> {
        let vested = self.vested_amount(now)?;
        Ok(vested.saturating_sub(self.claimed_amount))
    }

    /// Book the release of everything unlocked so far and return it.
    /// Caller transfers the returned amount out of the vault.
    pub fn release(&mut self, now: i64) -> Result<u64> {
        let amount = self.claimable(now)?;
        if amount == 0 {
            return Ok(0);
        }

        self.claimed_amount = self
            .claimed_amount
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;
        require!(
            self.claimed_amount <= self.total_amount,
            EngineError::MathOverflow
        );

        Ok(amount)
    }

    /// Release on behalf of `caller`, who must be the recipient
    pub fn claim(&mut self, caller: Pubkey, now: i64) -> Result<u64> {
        require_keys_eq!(caller, self.recipient, EngineError::Unauthorized);
        self.release(now)
    }

    /// Reassign the schedule (current recipient only)
    pub fn set_recipient(&mut self, caller: Pubkey, new_recipient: Pubkey) -> Result<Pubkey> {
        require_keys_eq!(caller, self.recipient, EngineError::Unauthorized);
        let old = self.recipient;
        self.recipient = new_recipient;
        Ok(old)
    }

    /// Length of one vesting segment (farming epoch) in seconds
    pub fn segment_length(&self) -> i64 {
        (self.vesting_end - self.vesting_begin) / VESTING_SEGMENTS as i64
    }

    /// Nothing left to release
    pub fn is_fully_vested(&self) -> bool {
        self.claimed_amount >= self.total_amount
    }
}
