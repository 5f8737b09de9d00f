/**
 * Farming Pool State
 *
 * Receives a distributor stream in whole epochs and drips each epoch
 * linearly over one vesting segment to borrowers, weighted by their
 * normalized borrow principal.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;
use ethnum::U256;

use crate::{
    math::{accrued_amount, index_increment, mul_div_amount, mul_div_down, pack_index, unpack_index},
    state::{Distributor, RecipientPosition, Vester},
    EngineError,
    BORROW_INDEX_ONE,
    VESTING_SEGMENTS,
};

/// Token movements produced by pulling through vester and distributor
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpstreamPull {
    /// Vester vault -> distributor vault
    pub vested: u64,
    /// Distributor vault -> farming vault
    pub paid: u64,
}

// =============================================================================
// FARMING POOL ACCOUNT
// =============================================================================

#[account]
#[derive(Default)]
pub struct FarmingPool {
    /// Creator-chosen id (PDA seed)
    pub id: u64,

    /// May rotate the borrow tracker
    pub admin: Pubkey,

    /// Reward token mint
    pub mint: Pubkey,

    /// Upstream distributor holding this pool's position
    pub distributor: Pubkey,

    /// Vester feeding the upstream distributor
    pub vester: Pubkey,

    /// Lending market authority allowed to report borrows
    pub borrow_tracker: Pubkey,

    /// Token account holding pulled but unclaimed rewards (PDA owned)
    pub vault: Pubkey,

    /// Copied from the upstream vester, anchors the epoch grid
    pub vesting_begin: i64,

    /// Epoch length in seconds (one vesting segment)
    pub segment_length: i64,

    /// False until the first epoch starts
    pub has_epoch: bool,

    pub epoch_begin: i64,

    /// Tokens dripped over the current epoch
    pub epoch_amount: u64,

    /// Part of `epoch_amount` already folded into the index
    pub epoch_dripped: u64,

    /// Last time the index was brought up to date
    pub last_update: i64,

    /// Cumulative tokens per weight unit, scaled by 2^160, `[hi, lo]`
    pub share_index: [u128; 2],

    /// Sum of all borrower weights
    pub total_weight: u128,

    /// Dripped while nobody had weight
    pub undistributed: u64,

    /// Lifetime tokens received from upstream
    pub total_received: u64,

    /// Lifetime tokens paid to borrowers
    pub total_claimed: u64,

    /// Bump seed for PDA
    pub bump: u8,

    /// Reserved for future use
    pub reserved: [u8; 32],
}

impl FarmingPool {
    pub const LEN: usize = 8 + // discriminator
        8 +  // id
        32 + // admin
        32 + // mint
        32 + // distributor
        32 + // vester
        32 + // borrow_tracker
        32 + // vault
        8 +  // vesting_begin
        8 +  // segment_length
        1 +  // has_epoch
        8 +  // epoch_begin
        8 +  // epoch_amount
        8 +  // epoch_dripped
        8 +  // last_update
        32 + // share_index
        16 + // total_weight
        8 +  // undistributed
        8 +  // total_received
        8 +  // total_claimed
        1 +  // bump
        32;  // reserved

    /// Epoch grid length for a vester schedule
    pub fn segment_length_for(vesting_begin: i64, vesting_end: i64) -> Result<i64> {
        require!(vesting_end > vesting_begin, EngineError::InvalidSchedule);
        let duration = vesting_end - vesting_begin;
        // epochs must tile the vesting window exactly
        require!(duration % VESTING_SEGMENTS as i64 == 0, EngineError::InvalidSchedule);
        let length = duration / VESTING_SEGMENTS as i64;
        require!(length > 0, EngineError::InvalidSchedule);
        Ok(length)
    }

    pub fn index(&self) -> U256 {
        unpack_index(self.share_index)
    }

    pub fn epoch_end(&self) -> i64 {
        self.epoch_begin.saturating_add(self.segment_length)
    }

    /// A new epoch may start at `now`
    pub fn advance_due(&self, now: i64) -> bool {
        now >= self.vesting_begin && (!self.has_epoch || now >= self.epoch_end())
    }

    /// Pull vester -> distributor -> this pool and return both hops
    pub fn pull_upstream(
        &mut self,
        self_key: Pubkey,
        distributor_key: Pubkey,
        distributor: &mut Distributor,
        vester: &mut Vester,
        position: &mut RecipientPosition,
        now: i64,
    ) -> Result<UpstreamPull> {
        require_keys_eq!(position.distributor, distributor_key, EngineError::InvalidPosition);
        require_keys_eq!(position.account, self_key, EngineError::InvalidPosition);

        let vested = distributor.pull(distributor_key, vester, now)?;
        let paid = distributor.take_credit(position)?;
        Ok(UpstreamPull { vested, paid })
    }

    /// Start a new epoch if the current one is over and upstream had anything
    pub fn advance(
        &mut self,
        self_key: Pubkey,
        distributor_key: Pubkey,
        distributor: &mut Distributor,
        vester: &mut Vester,
        position: &mut RecipientPosition,
        now: i64,
    ) -> Result<UpstreamPull> {
        if !self.advance_due(now) {
            return Ok(UpstreamPull::default());
        }

        let pulled =
            self.pull_upstream(self_key, distributor_key, distributor, vester, position, now)?;
        if pulled.paid > 0 {
            self.begin_epoch(now, pulled.paid)?;
        }
        Ok(pulled)
    }

    /// Close out the running epoch and open one aligned to the segment grid
    pub fn begin_epoch(&mut self, now: i64, amount: u64) -> Result<()> {
        require!(self.segment_length > 0, EngineError::InvalidSchedule);
        require!(now >= self.vesting_begin, EngineError::TooSoon);

        self.update_index(now)?;

        self.total_received = self
            .total_received
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;

        // Whatever the previous epoch still held rolls into this one
        let leftover = self.epoch_amount.saturating_sub(self.epoch_dripped);
        self.epoch_amount = amount
            .checked_add(leftover)
            .ok_or(EngineError::MathOverflow)?;
        self.epoch_dripped = 0;
        self.epoch_begin = now - (now - self.vesting_begin) % self.segment_length;
        self.last_update = self.epoch_begin;
        self.has_epoch = true;
        Ok(())
    }

    /// Fold the drip since `last_update`, plus anything parked, into the index
    pub fn update_index(&mut self, now: i64) -> Result<()> {
        let drip = self.collect_drip(now)?;
        self.distribute(drip)
    }

    /// Advance the epoch drip to `now` and return the newly released amount
    fn collect_drip(&mut self, now: i64) -> Result<u64> {
        if !self.has_epoch {
            return Ok(0);
        }

        let until = now.min(self.epoch_end());
        if until <= self.last_update {
            return Ok(0);
        }

        let target = if until >= self.epoch_end() {
            self.epoch_amount
        } else {
            mul_div_amount(
                self.epoch_amount,
                (until - self.epoch_begin) as u128,
                self.segment_length as u128,
            )?
        };
        let drip = target.saturating_sub(self.epoch_dripped);

        self.epoch_dripped = target.max(self.epoch_dripped);
        self.last_update = until;
        Ok(drip)
    }

    fn distribute(&mut self, amount: u64) -> Result<()> {
        let pending = self
            .undistributed
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;

        if self.total_weight == 0 {
            self.undistributed = pending;
            return Ok(());
        }
        if pending == 0 {
            return Ok(());
        }

        let increment = index_increment(pending, self.total_weight)?;
        let index = self
            .index()
            .checked_add(increment)
            .ok_or(EngineError::MathOverflow)?;

        self.share_index = pack_index(index);
        self.undistributed = 0;
        Ok(())
    }

    pub fn settle(&self, position: &mut FarmingPosition) -> Result<()> {
        let last = unpack_index(position.last_share_index);
        let delta = self
            .index()
            .checked_sub(last)
            .ok_or(EngineError::MathOverflow)?;

        let accrued = accrued_amount(position.weight, delta)?;
        position.credit = position
            .credit
            .checked_add(accrued)
            .ok_or(EngineError::MathOverflow)?;
        position.last_share_index = self.share_index;
        Ok(())
    }

    /// Borrow tracker reports a borrower's principal and the market borrow index.
    /// Settles at the old weight before applying the new one.
    pub fn track_borrow(
        &mut self,
        caller: Pubkey,
        position: &mut FarmingPosition,
        borrow_balance: u64,
        borrow_index: u128,
        now: i64,
    ) -> Result<()> {
        require_keys_eq!(caller, self.borrow_tracker, EngineError::Unauthorized);
        require!(borrow_index > 0, EngineError::InvalidValue);

        self.update_index(now)?;
        self.settle(position)?;

        let weight = mul_div_down(borrow_balance as u128, BORROW_INDEX_ONE, borrow_index)?;
        self.total_weight = self
            .total_weight
            .checked_sub(position.weight)
            .and_then(|total| total.checked_add(weight))
            .ok_or(EngineError::MathOverflow)?;
        position.weight = weight;
        Ok(())
    }

    /// Bring the index to `now`, settle, and zero the position's credit
    pub fn take_credit(&mut self, position: &mut FarmingPosition, now: i64) -> Result<u64> {
        self.update_index(now)?;
        self.settle(position)?;

        let amount = position.credit;
        position.credit = 0;
        self.total_claimed = self
            .total_claimed
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;
        Ok(amount)
    }

    pub fn set_borrow_tracker(&mut self, caller: Pubkey, new_borrow_tracker: Pubkey) -> Result<Pubkey> {
        require_keys_eq!(caller, self.admin, EngineError::Unauthorized);
        let old = self.borrow_tracker;
        self.borrow_tracker = new_borrow_tracker;
        Ok(old)
    }
}

// =============================================================================
// FARMING POSITION
// =============================================================================

/// Per-borrower record, PDA of (farming pool, borrower)
#[account]
#[derive(Default)]
pub struct FarmingPosition {
    pub farming_pool: Pubkey,

    pub account: Pubkey,

    /// borrow_balance * 1e18 / borrow_index at the last report
    pub weight: u128,

    pub last_share_index: [u128; 2],

    pub credit: u64,

    pub bump: u8,
}

impl FarmingPosition {
    pub const LEN: usize = 8 + // discriminator
        32 + // farming_pool
        32 + // account
        16 + // weight
        32 + // last_share_index
        8 +  // credit
        1;   // bump

    pub fn open(&mut self, farming_pool: Pubkey, account: Pubkey, bump: u8) {
        if self.farming_pool == Pubkey::default() {
            self.farming_pool = farming_pool;
            self.account = account;
            self.bump = bump;
        }
    }
}
