/**
 * Emission Engine
 *
 * Vesting curves, share-weighted distributors, borrow-weighted farming
 * pools and a bootstrap liquidity generator for a fixed supply token.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 *
 * License: BSL 1.1 (converts to MIT after Dec 2028)
 */

use anchor_lang::prelude::*;

pub mod math;
pub mod state;
pub mod instructions;

use state::*;
use instructions::*;

declare_id!("7yuQoeA8FhPbm7gtGk6aYYvbXqL5k5SJGC8jjn2zcuov");

// =============================================================================
// SEEDS
// =============================================================================

pub const VESTER_SEED: &[u8] = b"vester";
pub const VESTER_VAULT_SEED: &[u8] = b"vester_vault";
pub const DISTRIBUTOR_SEED: &[u8] = b"distributor";
pub const DISTRIBUTOR_VAULT_SEED: &[u8] = b"distributor_vault";
pub const POSITION_SEED: &[u8] = b"position";
pub const FARMING_POOL_SEED: &[u8] = b"farming_pool";
pub const FARMING_VAULT_SEED: &[u8] = b"farming_vault";
pub const FARMING_POSITION_SEED: &[u8] = b"farming_position";
pub const LIQUIDITY_GENERATOR_SEED: &[u8] = b"liquidity_generator";
pub const BASE_VAULT_SEED: &[u8] = b"base_vault";
pub const TOKEN_VAULT_SEED: &[u8] = b"token_vault";
pub const LP_VAULT_SEED: &[u8] = b"lp_vault";

// =============================================================================
// CONSTANTS
// =============================================================================

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Fixed-point one for normalized elapsed time
pub const FRACTION_ONE: u128 = 1_000_000_000_000_000_000;

/// Number of equal segments (epochs) in every vesting schedule
pub const VESTING_SEGMENTS: u64 = 100;

/// Per-segment slope decay of the emission curve: 0.976
pub const SEGMENT_DECAY_NUMERATOR: u128 = 976;
pub const SEGMENT_DECAY_DENOMINATOR: u128 = 1_000;

/// Sale schedules release 1/5 (20%) of the total on the first claim
pub const SALE_UPFRONT_DIVISOR: u64 = 5;

/// Share indices are scaled by 2^160
pub const SHARE_INDEX_SCALE_BITS: u32 = 160;

/// Borrow balances are normalized by the market borrow index (1e18 scale)
pub const BORROW_INDEX_ONE: u128 = 1_000_000_000_000_000_000;

/// Maximum recipients fixed at construction of an initialized distributor
pub const MAX_INITIAL_RECIPIENTS: usize = 32;

/// Default split of pooled liquidity towards router 0: 65%
pub const DEFAULT_ROUTER0_BPS: u16 = 6500;

/// Anchor discriminator of the routers' `add_liquidity` instruction
/// (first 8 bytes of sha256("global:add_liquidity"))
pub const ADD_LIQUIDITY_DISCRIMINATOR: [u8; 8] = [0xb5, 0x9d, 0x59, 0x43, 0x8f, 0xb6, 0x34, 0x48];

// =============================================================================
// PROGRAM
// =============================================================================

#[program]
pub mod emission_engine {
    use super::*;

    // =========================================================================
    // VESTER
    // =========================================================================

    /// Create a vester and fund its vault with the full allocation
    pub fn init_vester(
        ctx: Context<InitVester>,
        id: u64,
        curve: VestingCurve,
        recipient: Pubkey,
        total_amount: u64,
        vesting_begin: i64,
        vesting_end: i64,
    ) -> Result<()> {
        instructions::vesting::init_handler(
            ctx,
            id,
            curve,
            recipient,
            total_amount,
            vesting_begin,
            vesting_end,
        )
    }

    /// Release everything unlocked so far to the recipient
    pub fn claim_vester(ctx: Context<ClaimVester>) -> Result<u64> {
        instructions::vesting::claim_handler(ctx)
    }

    /// Hand the schedule to a new recipient (current recipient only)
    pub fn set_vester_recipient(
        ctx: Context<SetVesterRecipient>,
        new_recipient: Pubkey,
    ) -> Result<()> {
        instructions::vesting::set_recipient_handler(ctx, new_recipient)
    }

    // =========================================================================
    // SHARE DISTRIBUTOR
    // =========================================================================

    /// Create a distributor whose registry is edited by `admin`
    pub fn init_owned_distributor(
        ctx: Context<InitDistributor>,
        id: u64,
        admin: Pubkey,
    ) -> Result<()> {
        instructions::distributor::init_owned_handler(ctx, id, admin)
    }

    /// Create a distributor with a registry fixed forever
    /// Recipient position PDAs are passed as remaining accounts, in order
    pub fn init_initialized_distributor<'info>(
        ctx: Context<'_, '_, 'info, 'info, InitDistributor<'info>>,
        id: u64,
        recipients: Vec<RecipientInput>,
    ) -> Result<()> {
        instructions::distributor::init_initialized_handler(ctx, id, recipients)
    }

    /// Set the shares of one recipient (admin only, owned mode)
    pub fn edit_recipient(ctx: Context<EditRecipient>, shares: u64) -> Result<()> {
        instructions::distributor::edit_recipient_handler(ctx, shares)
    }

    /// Claim the signer's accrued share
    pub fn claim_distributor(ctx: Context<ClaimDistributor>) -> Result<u64> {
        instructions::distributor::claim_handler(ctx)
    }

    /// Claim on behalf of any recipient (paid to the recipient)
    pub fn claim_distributor_account(ctx: Context<ClaimDistributor>) -> Result<u64> {
        instructions::distributor::claim_account_handler(ctx)
    }

    /// Transfer edit rights (admin only, owned mode)
    pub fn set_distributor_admin(
        ctx: Context<SetDistributorAdmin>,
        new_admin: Pubkey,
    ) -> Result<()> {
        instructions::distributor::set_admin_handler(ctx, new_admin)
    }

    // =========================================================================
    // FARMING POOL
    // =========================================================================

    /// Create a farming pool fed by a distributor position
    pub fn init_farming_pool(
        ctx: Context<InitFarmingPool>,
        id: u64,
        borrow_tracker: Pubkey,
    ) -> Result<()> {
        instructions::farming::init_handler(ctx, id, borrow_tracker)
    }

    /// Start a new epoch when the current one is over (anyone)
    pub fn advance(ctx: Context<AdvanceFarming>) -> Result<()> {
        instructions::farming::advance_handler(ctx)
    }

    /// Borrow tracker hook: a borrower's principal changed
    pub fn track_borrow(
        ctx: Context<TrackBorrow>,
        borrow_balance: u64,
        borrow_index: u128,
    ) -> Result<()> {
        instructions::farming::track_borrow_handler(ctx, borrow_balance, borrow_index)
    }

    /// Claim the signer's farming rewards
    pub fn claim_farming(ctx: Context<ClaimFarming>) -> Result<u64> {
        instructions::farming::claim_handler(ctx)
    }

    /// Claim farming rewards on behalf of any borrower
    pub fn claim_farming_account(ctx: Context<ClaimFarming>) -> Result<u64> {
        instructions::farming::claim_account_handler(ctx)
    }

    /// Rotate the lending market authority allowed to report borrows
    pub fn set_borrow_tracker(
        ctx: Context<SetBorrowTracker>,
        new_borrow_tracker: Pubkey,
    ) -> Result<()> {
        instructions::farming::set_borrow_tracker_handler(ctx, new_borrow_tracker)
    }

    // =========================================================================
    // LIQUIDITY GENERATOR
    // =========================================================================

    /// Create the contribution window and fund the paired token side
    pub fn init_liquidity_generator(
        ctx: Context<InitLiquidityGenerator>,
        id: u64,
        params: LiquidityGeneratorParams,
    ) -> Result<()> {
        instructions::liquidity::init_handler(ctx, id, params)
    }

    /// Contribute base asset during the window
    pub fn deposit(ctx: Context<Deposit>, amount: u64) -> Result<()> {
        instructions::liquidity::deposit_handler(ctx, amount)
    }

    /// Convert pooled contributions into two LP positions (governance)
    /// Remaining accounts: router 0 accounts, then router 1 accounts
    pub fn finalize<'info>(
        ctx: Context<'_, '_, 'info, 'info, Finalize<'info>>,
        router0_accounts_len: u8,
    ) -> Result<()> {
        instructions::liquidity::finalize_handler(ctx, router0_accounts_len)
    }

    /// Move the unlock timestamp later (governance, never earlier)
    pub fn postpone_unlock_timestamp(
        ctx: Context<PostponeUnlockTimestamp>,
        new_unlock_timestamp: i64,
    ) -> Result<()> {
        instructions::liquidity::postpone_unlock_handler(ctx, new_unlock_timestamp)
    }

    /// Hand both LP positions to the reserves manager once unlocked
    pub fn deliver_liquidity_to_reserves_manager(
        ctx: Context<DeliverLiquidity>,
    ) -> Result<()> {
        instructions::liquidity::deliver_handler(ctx)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[error_code]
pub enum EngineError {
    #[msg("Unauthorized")]
    Unauthorized,

    #[msg("Invalid vesting schedule")]
    InvalidSchedule,

    #[msg("Too soon")]
    TooSoon,

    #[msg("Too late")]
    TooLate,

    #[msg("Invalid value")]
    InvalidValue,

    #[msg("Already finalized")]
    AlreadyFinalized,

    #[msg("Not finalized")]
    NotFinalized,

    #[msg("Liquidity is still locked")]
    StillLocked,

    #[msg("Unlock timestamp can only be postponed")]
    InvalidUnlockTimestamp,

    #[msg("Liquidity already delivered")]
    AlreadyDelivered,

    #[msg("Math overflow")]
    MathOverflow,

    #[msg("Division by zero")]
    DivisionByZero,

    #[msg("Invalid vault account")]
    InvalidVault,

    #[msg("Upstream source does not match")]
    InvalidUpstream,

    #[msg("Position does not belong to this account")]
    InvalidPosition,

    #[msg("Distributor is not controlled by this generator")]
    InvalidDistributor,

    #[msg("Invalid router program")]
    InvalidRouter,

    #[msg("Too many recipients")]
    TooManyRecipients,

    #[msg("Invalid configuration")]
    InvalidConfig,
}

// =============================================================================
// EVENTS
// =============================================================================

#[event]
pub struct VesterInitialized {
    pub vester: Pubkey,
    pub mint: Pubkey,
    pub recipient: Pubkey,
    pub curve: VestingCurve,
    pub total_amount: u64,
    pub vesting_begin: i64,
    pub vesting_end: i64,
}

#[event]
pub struct VesterClaimed {
    pub vester: Pubkey,
    pub recipient: Pubkey,
    pub amount: u64,
    pub claimed_amount: u64,
}

#[event]
pub struct VesterRecipientSet {
    pub vester: Pubkey,
    pub old_recipient: Pubkey,
    pub new_recipient: Pubkey,
}

#[event]
pub struct DistributorInitialized {
    pub distributor: Pubkey,
    pub vester: Pubkey,
    pub mode: DistributorMode,
    pub admin: Pubkey,
    pub total_shares: u64,
}

#[event]
pub struct RecipientEdited {
    pub distributor: Pubkey,
    pub account: Pubkey,
    pub shares: u64,
    pub total_shares: u64,
}

#[event]
pub struct DistributorClaimed {
    pub distributor: Pubkey,
    pub account: Pubkey,
    pub amount: u64,
}

#[event]
pub struct DistributorAdminSet {
    pub distributor: Pubkey,
    pub old_admin: Pubkey,
    pub new_admin: Pubkey,
}

#[event]
pub struct FarmingPoolInitialized {
    pub farming_pool: Pubkey,
    pub distributor: Pubkey,
    pub borrow_tracker: Pubkey,
    pub segment_length: i64,
}

#[event]
pub struct EpochAdvanced {
    pub farming_pool: Pubkey,
    pub epoch_begin: i64,
    pub epoch_amount: u64,
}

#[event]
pub struct BorrowTracked {
    pub farming_pool: Pubkey,
    pub borrower: Pubkey,
    pub weight: u128,
    pub total_weight: u128,
}

#[event]
pub struct FarmingClaimed {
    pub farming_pool: Pubkey,
    pub account: Pubkey,
    pub amount: u64,
}

#[event]
pub struct BorrowTrackerSet {
    pub farming_pool: Pubkey,
    pub old_borrow_tracker: Pubkey,
    pub new_borrow_tracker: Pubkey,
}

#[event]
pub struct LiquidityGeneratorInitialized {
    pub liquidity_generator: Pubkey,
    pub governance: Pubkey,
    pub period_begin: i64,
    pub period_end: i64,
    pub bonus_end: i64,
    pub unlock_timestamp: i64,
}

#[event]
pub struct Deposited {
    pub liquidity_generator: Pubkey,
    pub participant: Pubkey,
    pub amount: u64,
    pub contribution: u64,
    pub bonus: bool,
    pub total_contributed: u64,
}

#[event]
pub struct LiquidityFinalized {
    pub liquidity_generator: Pubkey,
    pub base_to_router0: u64,
    pub base_to_router1: u64,
    pub lp_minted0: u64,
    pub lp_minted1: u64,
}

#[event]
pub struct UnlockPostponed {
    pub liquidity_generator: Pubkey,
    pub old_unlock_timestamp: i64,
    pub new_unlock_timestamp: i64,
}

#[event]
pub struct LiquidityDelivered {
    pub liquidity_generator: Pubkey,
    pub reserves_manager: Pubkey,
    pub lp_amount0: u64,
    pub lp_amount1: u64,
}
