/**
 * Liquidity Generator State
 *
 * Contribution window -> finalize into two router LP positions ->
 * time lock -> delivery to the reserves manager.
 * Contributors are rewarded through two owned distributors
 * administered by the generator PDA.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;

use crate::{
    state::{Distributor, RecipientPosition},
    EngineError,
    BPS_DENOMINATOR,
};

/// Lifecycle of a generator, derived from time and flags
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorPhase {
    /// Before the contribution window
    Pending,
    /// Accepting deposits
    Open,
    /// Window over, waiting for governance to finalize
    Closed,
    /// LP positions held, waiting for unlock
    Finalized,
    /// LP handed to the reserves manager
    Delivered,
}

/// Configuration passed to `init_liquidity_generator`
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LiquidityGeneratorParams {
    pub governance: Pubkey,
    pub reserves_manager: Pubkey,
    pub period_begin: i64,
    pub period_duration: i64,
    /// Deposits in `[period_begin, period_begin + bonus_duration)` also earn bonus shares
    pub bonus_duration: i64,
    pub per_tx_min: u64,
    /// 0 = unbounded
    pub per_tx_max: u64,
    /// Share of pooled assets sent to router 0, rest to router 1
    pub router0_bps: u16,
    pub router0: Pubkey,
    pub router1: Pubkey,
    pub unlock_timestamp: i64,
    /// Paired token amount funded at init
    pub liquidity_token_amount: u64,
}

impl LiquidityGeneratorParams {
    pub fn validate(&self) -> Result<()> {
        require!(self.period_duration > 0, EngineError::InvalidConfig);
        require!(
            self.bonus_duration >= 0 && self.bonus_duration <= self.period_duration,
            EngineError::InvalidConfig
        );
        require!(
            self.per_tx_max == 0 || self.per_tx_max >= self.per_tx_min,
            EngineError::InvalidConfig
        );
        require!(
            self.router0_bps as u64 <= BPS_DENOMINATOR,
            EngineError::InvalidConfig
        );

        let period_end = self
            .period_begin
            .checked_add(self.period_duration)
            .ok_or(EngineError::MathOverflow)?;
        require!(
            self.unlock_timestamp >= period_end,
            EngineError::InvalidUnlockTimestamp
        );
        Ok(())
    }
}

/// Amounts handed to each router at finalize
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiquiditySplit {
    pub base0: u64,
    pub token0: u64,
    pub base1: u64,
    pub token1: u64,
}

// =============================================================================
// LIQUIDITY GENERATOR ACCOUNT
// =============================================================================

#[account]
#[derive(Default)]
pub struct LiquidityGenerator {
    /// Creator-chosen id (PDA seed)
    pub id: u64,

    /// Finalizes, postpones and delivers
    pub governance: Pubkey,

    /// Final owner of the LP positions
    pub reserves_manager: Pubkey,

    /// Contributed asset
    pub base_mint: Pubkey,

    /// Emitted token paired with the base asset
    pub token_mint: Pubkey,

    pub base_vault: Pubkey,
    pub token_vault: Pubkey,

    /// LP custody per router
    pub lp_vault0: Pubkey,
    pub lp_vault1: Pubkey,

    /// Ordinary rewards: shares = lifetime contribution
    pub distributor: Pubkey,

    /// Bonus rewards: shares = contribution inside the bonus window
    pub bonus_distributor: Pubkey,

    pub router0: Pubkey,
    pub router1: Pubkey,

    pub period_begin: i64,
    pub period_end: i64,
    pub bonus_end: i64,

    pub per_tx_min: u64,
    pub per_tx_max: u64,

    pub router0_bps: u16,

    /// Earliest delivery time, can only move later
    pub unlock_timestamp: i64,

    pub liquidity_token_amount: u64,

    /// Sum of all deposits
    pub total_contributed: u64,

    /// LP received from each router at finalize
    pub lp_minted0: u64,
    pub lp_minted1: u64,

    pub finalized: bool,
    pub delivered: bool,

    /// Bump seed for PDA
    pub bump: u8,

    /// Reserved for future use
    pub reserved: [u8; 32],
}

impl LiquidityGenerator {
    pub const LEN: usize = 8 + // discriminator
        8 +  // id
        32 + // governance
        32 + // reserves_manager
        32 + // base_mint
        32 + // token_mint
        32 + // base_vault
        32 + // token_vault
        32 + // lp_vault0
        32 + // lp_vault1
        32 + // distributor
        32 + // bonus_distributor
        32 + // router0
        32 + // router1
        8 +  // period_begin
        8 +  // period_end
        8 +  // bonus_end
        8 +  // per_tx_min
        8 +  // per_tx_max
        2 +  // router0_bps
        8 +  // unlock_timestamp
        8 +  // liquidity_token_amount
        8 +  // total_contributed
        8 +  // lp_minted0
        8 +  // lp_minted1
        1 +  // finalized
        1 +  // delivered
        1 +  // bump
        32;  // reserved

    /// Copy validated parameters into the account
    pub fn configure(&mut self, params: &LiquidityGeneratorParams) -> Result<()> {
        params.validate()?;

        self.governance = params.governance;
        self.reserves_manager = params.reserves_manager;
        self.period_begin = params.period_begin;
        self.period_end = params.period_begin + params.period_duration;
        self.bonus_end = params.period_begin + params.bonus_duration;
        self.per_tx_min = params.per_tx_min;
        self.per_tx_max = params.per_tx_max;
        self.router0_bps = params.router0_bps;
        self.router0 = params.router0;
        self.router1 = params.router1;
        self.unlock_timestamp = params.unlock_timestamp;
        self.liquidity_token_amount = params.liquidity_token_amount;
        Ok(())
    }

    pub fn phase(&self, now: i64) -> GeneratorPhase {
        if self.delivered {
            GeneratorPhase::Delivered
        } else if self.finalized {
            GeneratorPhase::Finalized
        } else if now < self.period_begin {
            GeneratorPhase::Pending
        } else if now < self.period_end {
            GeneratorPhase::Open
        } else {
            GeneratorPhase::Closed
        }
    }

    /// Validate a deposit against the window and bounds and book it.
    /// Returns whether it lands in the bonus window.
    pub fn record_deposit(&mut self, now: i64, amount: u64) -> Result<bool> {
        require!(now >= self.period_begin, EngineError::TooSoon);
        require!(now < self.period_end, EngineError::TooLate);
        require!(amount > 0, EngineError::InvalidValue);
        require!(amount >= self.per_tx_min, EngineError::InvalidValue);
        require!(
            self.per_tx_max == 0 || amount <= self.per_tx_max,
            EngineError::InvalidValue
        );

        self.total_contributed = self
            .total_contributed
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;

        Ok(now < self.bonus_end)
    }

    /// Grow a participant's shares in one of the reward distributors.
    /// Upstream of `distributor` must already be pulled.
    pub fn credit_contribution(
        &self,
        self_key: Pubkey,
        distributor: &mut Distributor,
        position: &mut RecipientPosition,
        amount: u64,
    ) -> Result<()> {
        require_keys_eq!(distributor.admin, self_key, EngineError::InvalidDistributor);

        let shares = position
            .shares
            .checked_add(amount)
            .ok_or(EngineError::MathOverflow)?;
        distributor.edit_recipient(self_key, position, shares)
    }

    /// Lock the generator and split pooled assets between the routers.
    /// Marks finalized before any router is called.
    pub fn begin_finalize(&mut self, caller: Pubkey, now: i64) -> Result<LiquiditySplit> {
        require_keys_eq!(caller, self.governance, EngineError::Unauthorized);
        require!(now >= self.period_end, EngineError::TooSoon);
        require!(!self.finalized, EngineError::AlreadyFinalized);

        self.finalized = true;

        let bps = self.router0_bps as u128;
        let base0 = (self.total_contributed as u128 * bps / BPS_DENOMINATOR as u128) as u64;
        let token0 = (self.liquidity_token_amount as u128 * bps / BPS_DENOMINATOR as u128) as u64;

        Ok(LiquiditySplit {
            base0,
            token0,
            base1: self.total_contributed - base0,
            token1: self.liquidity_token_amount - token0,
        })
    }

    pub fn record_minted(&mut self, lp_minted0: u64, lp_minted1: u64) {
        self.lp_minted0 = lp_minted0;
        self.lp_minted1 = lp_minted1;
    }

    /// Move the unlock later, never earlier. Returns the previous value.
    pub fn postpone_unlock_timestamp(&mut self, caller: Pubkey, new_unlock_timestamp: i64) -> Result<i64> {
        require_keys_eq!(caller, self.governance, EngineError::Unauthorized);
        require!(!self.delivered, EngineError::AlreadyDelivered);
        require!(
            new_unlock_timestamp > self.unlock_timestamp,
            EngineError::InvalidUnlockTimestamp
        );

        let old = self.unlock_timestamp;
        self.unlock_timestamp = new_unlock_timestamp;
        Ok(old)
    }

    /// Check delivery preconditions and mark delivered
    pub fn begin_delivery(&mut self, caller: Pubkey, now: i64) -> Result<()> {
        require_keys_eq!(caller, self.governance, EngineError::Unauthorized);
        require!(self.finalized, EngineError::NotFinalized);
        require!(!self.delivered, EngineError::AlreadyDelivered);
        require!(now >= self.unlock_timestamp, EngineError::StillLocked);

        self.delivered = true;
        Ok(())
    }
}
