/**
 * Share Distributor State
 *
 * Splits everything released by an upstream vester pro rata to shares,
 * through a cumulative per-share index (2^160 fixed point).
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;
use ethnum::U256;

use crate::{
    math::{accrued_amount, index_increment, pack_index, unpack_index},
    state::Vester,
    EngineError,
    MAX_INITIAL_RECIPIENTS,
};

/// Who may change the recipient registry
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistributorMode {
    /// Admin edits shares at any time
    Owned = 0,
    /// Registry fixed at construction
    Initialized = 1,
}

impl Default for DistributorMode {
    fn default() -> Self {
        Self::Owned
    }
}

/// One entry of an initialized distributor's fixed registry
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct RecipientInput {
    pub account: Pubkey,
    pub shares: u64,
}

// =============================================================================
// DISTRIBUTOR ACCOUNT
// =============================================================================

#[account]
#[derive(Default)]
pub struct Distributor {
    /// Creator-chosen id (PDA seed)
    pub id: u64,

    /// Owned or Initialized
    pub mode: DistributorMode,

    /// Registry editor (Owned mode only)
    pub admin: Pubkey,

    /// Token mint distributed
    pub mint: Pubkey,

    /// Upstream vester whose recipient is this distributor
    pub vester: Pubkey,

    /// Token account holding pulled but unclaimed tokens (PDA owned)
    pub vault: Pubkey,

    /// Cumulative tokens per share, scaled by 2^160, `[hi, lo]`
    pub share_index: [u128; 2],

    /// Sum of all recipient shares
    pub total_shares: u64,

    /// Pulled while nobody held shares, folded in at the next accrual
    pub undistributed: u64,

    /// Lifetime tokens pulled from upstream
    pub total_received: u64,

    /// Lifetime tokens paid to recipients
    pub total_claimed: u64,

    /// Recipients with non-zero shares
    pub recipient_count: u32,

    /// Bump seed for PDA
    pub bump: u8,

    /// Reserved for future use
    pub reserved: [u8; 32],
}

impl Distributor {
    pub const LEN: usize = 8 + // discriminator
        8 +  // id
        1 +  // mode
        32 + // admin
        32 + // mint
        32 + // vester
        32 + // vault
        32 + // share_index
        8 +  // total_shares
        8 +  // undistributed
        8 +  // total_received
        8 +  // total_claimed
        4 +  // recipient_count
        1 +  // bump
        32;  // reserved

    pub fn index(&self) -> U256 {
        unpack_index(self.share_index)
    }

    /// Book `amount` newly received from upstream
    pub fn accrue(&mut self, amount: u64) -> Result<()> {
        self.total_received = self
            .total_received
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;

        let pending = self
            .undistributed
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;

        if self.total_shares == 0 {
            self.undistributed = pending;
            return Ok(());
        }
        if pending == 0 {
            return Ok(());
        }

        let increment = index_increment(pending, self.total_shares as u128)?;
        let index = self
            .index()
            .checked_add(increment)
            .ok_or(EngineError::MathOverflow)?;

        self.share_index = pack_index(index);
        self.undistributed = 0;
        Ok(())
    }

    /// Release whatever the upstream vester has unlocked and accrue it.
    /// Returns the amount the caller must move from the vester vault.
    /// A vester pointing elsewhere contributes nothing.
    pub fn pull(&mut self, self_key: Pubkey, vester: &mut Vester, now: i64) -> Result<u64> {
        let released = if vester.recipient == self_key {
            vester.claim(self_key, now)?
        } else {
            0
        };

        self.accrue(released)?;
        Ok(released)
    }

    /// Move a position's pending accrual into its credit
    pub fn settle(&self, position: &mut RecipientPosition) -> Result<()> {
        let index = self.index();
        let last = unpack_index(position.last_share_index);
        let delta = index.checked_sub(last).ok_or(EngineError::MathOverflow)?;

        let accrued = accrued_amount(position.shares as u128, delta)?;
        position.credit = position
            .credit
            .checked_add(accrued)
            .ok_or(EngineError::MathOverflow)?;
        position.last_share_index = self.share_index;
        Ok(())
    }

    /// Settle at the old weight, then apply `shares`
    fn apply_shares(&mut self, position: &mut RecipientPosition, shares: u64) -> Result<()> {
        self.settle(position)?;

        let old = position.shares;
        self.total_shares = self
            .total_shares
            .checked_sub(old)
            .and_then(|total| total.checked_add(shares))
            .ok_or(EngineError::MathOverflow)?;

        if old == 0 && shares > 0 {
            self.recipient_count = self.recipient_count.saturating_add(1);
        } else if old > 0 && shares == 0 {
            self.recipient_count = self.recipient_count.saturating_sub(1);
        }

        position.shares = shares;
        Ok(())
    }

    /// Admin sets the shares of one recipient (Owned mode).
    /// Upstream must already be pulled for `now`.
    pub fn edit_recipient(
        &mut self,
        caller: Pubkey,
        position: &mut RecipientPosition,
        shares: u64,
    ) -> Result<()> {
        require!(self.mode == DistributorMode::Owned, EngineError::Unauthorized);
        require_keys_eq!(caller, self.admin, EngineError::Unauthorized);
        self.apply_shares(position, shares)
    }

    /// Registry entry written once at construction (Initialized mode)
    pub fn register_initial(&mut self, position: &mut RecipientPosition, shares: u64) -> Result<()> {
        require!(shares > 0, EngineError::InvalidValue);
        require!(position.shares == 0, EngineError::InvalidValue);
        self.apply_shares(position, shares)
    }

    /// Settle and zero the position's credit, returning the amount to pay
    pub fn take_credit(&mut self, position: &mut RecipientPosition) -> Result<u64> {
        self.settle(position)?;

        let amount = position.credit;
        position.credit = 0;
        self.total_claimed = self
            .total_claimed
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;
        Ok(amount)
    }

    pub fn set_admin(&mut self, caller: Pubkey, new_admin: Pubkey) -> Result<Pubkey> {
        require!(self.mode == DistributorMode::Owned, EngineError::Unauthorized);
        require_keys_eq!(caller, self.admin, EngineError::Unauthorized);
        let old = self.admin;
        self.admin = new_admin;
        Ok(old)
    }

    /// Registry of an initialized distributor: 1..=32 distinct accounts, no zero shares
    pub fn validate_initial_recipients(recipients: &[RecipientInput]) -> Result<()> {
        require!(!recipients.is_empty(), EngineError::InvalidValue);
        require!(
            recipients.len() <= MAX_INITIAL_RECIPIENTS,
            EngineError::TooManyRecipients
        );

        for (i, recipient) in recipients.iter().enumerate() {
            require!(recipient.shares > 0, EngineError::InvalidValue);
            require!(
                !recipients[..i].iter().any(|r| r.account == recipient.account),
                EngineError::InvalidValue
            );
        }
        Ok(())
    }
}

// =============================================================================
// RECIPIENT POSITION
// =============================================================================

/// Per-recipient record, PDA of (distributor, account)
#[account]
#[derive(Default)]
pub struct RecipientPosition {
    pub distributor: Pubkey,

    /// Owner of the accrual, paid on claim
    pub account: Pubkey,

    pub shares: u64,

    /// Distributor index at the last settlement
    pub last_share_index: [u128; 2],

    /// Settled but unclaimed tokens
    pub credit: u64,

    pub bump: u8,
}

impl RecipientPosition {
    pub const LEN: usize = 8 + // discriminator
        32 + // distributor
        32 + // account
        8 +  // shares
        32 + // last_share_index
        8 +  // credit
        1;   // bump

    /// Bind a freshly created position to its distributor and owner
    pub fn open(&mut self, distributor: Pubkey, account: Pubkey, bump: u8) {
        if self.distributor == Pubkey::default() {
            self.distributor = distributor;
            self.account = account;
            self.bump = bump;
        }
    }
}
