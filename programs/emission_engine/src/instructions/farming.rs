/**
 * Farming Pool Instructions
 *
 * `advance` is permissionless and also runs implicitly before every
 * borrow report and claim.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::{
    instructions::transfers::{pay_from_distributor, pay_from_farming_pool, release_from_vester},
    state::{Distributor, FarmingPool, FarmingPosition, RecipientPosition, Vester},
    BorrowTracked,
    BorrowTrackerSet,
    EngineError,
    EpochAdvanced,
    FarmingClaimed,
    FarmingPoolInitialized,
    FARMING_POOL_SEED,
    FARMING_POSITION_SEED,
    FARMING_VAULT_SEED,
    POSITION_SEED,
};

// =============================================================================
// INIT FARMING POOL
// =============================================================================

#[derive(Accounts)]
#[instruction(id: u64)]
pub struct InitFarmingPool<'info> {
    #[account(mut)]
    pub admin: Signer<'info>,

    #[account(has_one = vester @ EngineError::InvalidUpstream)]
    pub distributor: Box<Account<'info, Distributor>>,

    pub vester: Account<'info, Vester>,

    #[account(address = distributor.mint)]
    pub mint: Account<'info, Mint>,

    #[account(
        init,
        payer = admin,
        space = FarmingPool::LEN,
        seeds = [FARMING_POOL_SEED, distributor.key().as_ref(), &id.to_le_bytes()],
        bump,
    )]
    pub farming_pool: Account<'info, FarmingPool>,

    #[account(
        init,
        payer = admin,
        token::mint = mint,
        token::authority = farming_pool,
        seeds = [FARMING_VAULT_SEED, farming_pool.key().as_ref()],
        bump,
    )]
    pub farming_vault: Account<'info, TokenAccount>,

    /// The pool's own position in the distributor, zero shares until edited
    #[account(
        init_if_needed,
        payer = admin,
        space = RecipientPosition::LEN,
        seeds = [POSITION_SEED, distributor.key().as_ref(), farming_pool.key().as_ref()],
        bump,
    )]
    pub pool_position: Box<Account<'info, RecipientPosition>>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn init_handler(ctx: Context<InitFarmingPool>, id: u64, borrow_tracker: Pubkey) -> Result<()> {
    let vester = &ctx.accounts.vester;
    let segment_length = FarmingPool::segment_length_for(vester.vesting_begin, vester.vesting_end)?;

    let pool = &mut ctx.accounts.farming_pool;
    pool.id = id;
    pool.admin = ctx.accounts.admin.key();
    pool.mint = ctx.accounts.mint.key();
    pool.distributor = ctx.accounts.distributor.key();
    pool.vester = vester.key();
    pool.borrow_tracker = borrow_tracker;
    pool.vault = ctx.accounts.farming_vault.key();
    pool.vesting_begin = vester.vesting_begin;
    pool.segment_length = segment_length;
    pool.bump = ctx.bumps.farming_pool;

    let pool_key = pool.key();
    let distributor_key = ctx.accounts.distributor.key();
    ctx.accounts
        .pool_position
        .open(distributor_key, pool_key, ctx.bumps.pool_position);

    msg!(
        "Farming pool created: epochs of {}s from {}",
        segment_length,
        pool.vesting_begin
    );

    emit!(FarmingPoolInitialized {
        farming_pool: pool.key(),
        distributor: pool.distributor,
        borrow_tracker,
        segment_length,
    });

    Ok(())
}

// =============================================================================
// ADVANCE
// =============================================================================

/// The pool plus its whole upstream chain
#[derive(Accounts)]
pub struct AdvanceFarming<'info> {
    #[account(
        mut,
        seeds = [FARMING_POOL_SEED, farming_pool.distributor.as_ref(), &farming_pool.id.to_le_bytes()],
        bump = farming_pool.bump,
        has_one = distributor @ EngineError::InvalidUpstream,
        has_one = vester @ EngineError::InvalidUpstream,
    )]
    pub farming_pool: Account<'info, FarmingPool>,

    #[account(
        mut,
        constraint = farming_vault.key() == farming_pool.vault @ EngineError::InvalidVault,
    )]
    pub farming_vault: Account<'info, TokenAccount>,

    #[account(
        mut,
        has_one = vester @ EngineError::InvalidUpstream,
    )]
    pub distributor: Account<'info, Distributor>,

    /// The pool's own position in the distributor
    #[account(
        mut,
        seeds = [POSITION_SEED, distributor.key().as_ref(), farming_pool.key().as_ref()],
        bump = pool_position.bump,
    )]
    pub pool_position: Account<'info, RecipientPosition>,

    #[account(
        mut,
        constraint = distributor_vault.key() == distributor.vault @ EngineError::InvalidVault,
    )]
    pub distributor_vault: Account<'info, TokenAccount>,

    #[account(mut)]
    pub vester: Account<'info, Vester>,

    #[account(
        mut,
        constraint = vester_vault.key() == vester.vault @ EngineError::InvalidVault,
    )]
    pub vester_vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

impl<'info> AdvanceFarming<'info> {
    /// Start the next epoch if due, moving tokens down the chain
    pub fn advance(&mut self, now: i64) -> Result<()> {
        if !self.farming_pool.advance_due(now) {
            return Ok(());
        }

        let pool_key = self.farming_pool.key();
        let distributor_key = self.distributor.key();
        let pulled = self.farming_pool.advance(
            pool_key,
            distributor_key,
            &mut self.distributor,
            &mut self.vester,
            &mut self.pool_position,
            now,
        )?;

        release_from_vester(
            &self.vester,
            &self.vester_vault,
            self.distributor_vault.to_account_info(),
            &self.token_program,
            pulled.vested,
        )?;
        pay_from_distributor(
            &self.distributor,
            &self.distributor_vault,
            self.farming_vault.to_account_info(),
            &self.token_program,
            pulled.paid,
        )?;

        if pulled.paid > 0 {
            let pool = &self.farming_pool;
            msg!(
                "Epoch started at {}: {} tokens over {}s",
                pool.epoch_begin,
                pool.epoch_amount,
                pool.segment_length
            );

            emit!(EpochAdvanced {
                farming_pool: pool_key,
                epoch_begin: pool.epoch_begin,
                epoch_amount: pool.epoch_amount,
            });
        }

        Ok(())
    }
}

pub fn advance_handler(ctx: Context<AdvanceFarming>) -> Result<()> {
    let clock = Clock::get()?;
    ctx.accounts.advance(clock.unix_timestamp)
}

// =============================================================================
// TRACK BORROW
// =============================================================================

#[derive(Accounts)]
pub struct TrackBorrow<'info> {
    /// Lending market authority registered on the pool
    pub borrow_tracker: Signer<'info>,

    /// Rent payer for a borrower's first position
    #[account(mut)]
    pub payer: Signer<'info>,

    /// CHECK: only the key is used, as position owner
    pub borrower: UncheckedAccount<'info>,

    pub pool: AdvanceFarming<'info>,

    #[account(
        init_if_needed,
        payer = payer,
        space = FarmingPosition::LEN,
        seeds = [FARMING_POSITION_SEED, pool.farming_pool.key().as_ref(), borrower.key().as_ref()],
        bump,
    )]
    pub position: Account<'info, FarmingPosition>,

    pub system_program: Program<'info, System>,
}

pub fn track_borrow_handler(
    ctx: Context<TrackBorrow>,
    borrow_balance: u64,
    borrow_index: u128,
) -> Result<()> {
    let clock = Clock::get()?;
    let accounts = &mut *ctx.accounts;

    accounts.pool.advance(clock.unix_timestamp)?;

    let pool_key = accounts.pool.farming_pool.key();
    let borrower = accounts.borrower.key();
    accounts
        .position
        .open(pool_key, borrower, ctx.bumps.position);

    accounts.pool.farming_pool.track_borrow(
        accounts.borrow_tracker.key(),
        &mut accounts.position,
        borrow_balance,
        borrow_index,
        clock.unix_timestamp,
    )?;

    msg!(
        "Borrow tracked: {} weight {} (total {})",
        borrower,
        accounts.position.weight,
        accounts.pool.farming_pool.total_weight
    );

    emit!(BorrowTracked {
        farming_pool: pool_key,
        borrower,
        weight: accounts.position.weight,
        total_weight: accounts.pool.farming_pool.total_weight,
    });

    Ok(())
}

// =============================================================================
// CLAIM
// =============================================================================

#[derive(Accounts)]
pub struct ClaimFarming<'info> {
    pub caller: Signer<'info>,

    pub pool: AdvanceFarming<'info>,

    #[account(
        mut,
        seeds = [FARMING_POSITION_SEED, pool.farming_pool.key().as_ref(), position.account.as_ref()],
        bump = position.bump,
        constraint = position.farming_pool == pool.farming_pool.key() @ EngineError::InvalidPosition,
    )]
    pub position: Account<'info, FarmingPosition>,

    #[account(
        mut,
        token::mint = pool.farming_pool.mint,
        token::authority = position.account,
    )]
    pub recipient_token_account: Account<'info, TokenAccount>,
}

fn claim_position(accounts: &mut ClaimFarming) -> Result<u64> {
    let clock = Clock::get()?;
    accounts.pool.advance(clock.unix_timestamp)?;

    // Credit is zeroed before the payout leaves the vault
    let amount = accounts
        .pool
        .farming_pool
        .take_credit(&mut accounts.position, clock.unix_timestamp)?;

    pay_from_farming_pool(
        &accounts.pool.farming_pool,
        &accounts.pool.farming_vault,
        accounts.recipient_token_account.to_account_info(),
        &accounts.pool.token_program,
        amount,
    )?;

    msg!("Farming paid {} to {}", amount, accounts.position.account);

    emit!(FarmingClaimed {
        farming_pool: accounts.pool.farming_pool.key(),
        account: accounts.position.account,
        amount,
    });

    Ok(amount)
}

pub fn claim_handler(ctx: Context<ClaimFarming>) -> Result<u64> {
    require_keys_eq!(
        ctx.accounts.caller.key(),
        ctx.accounts.position.account,
        EngineError::Unauthorized
    );
    claim_position(ctx.accounts)
}

pub fn claim_account_handler(ctx: Context<ClaimFarming>) -> Result<u64> {
    claim_position(ctx.accounts)
}

// =============================================================================
// SET BORROW TRACKER
// =============================================================================

#[derive(Accounts)]
pub struct SetBorrowTracker<'info> {
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [FARMING_POOL_SEED, farming_pool.distributor.as_ref(), &farming_pool.id.to_le_bytes()],
        bump = farming_pool.bump,
    )]
    pub farming_pool: Account<'info, FarmingPool>,
}

pub fn set_borrow_tracker_handler(
    ctx: Context<SetBorrowTracker>,
    new_borrow_tracker: Pubkey,
) -> Result<()> {
    let pool = &mut ctx.accounts.farming_pool;
    let old_borrow_tracker = pool.set_borrow_tracker(ctx.accounts.admin.key(), new_borrow_tracker)?;

    msg!("Borrow tracker: {} -> {}", old_borrow_tracker, new_borrow_tracker);

    emit!(BorrowTrackerSet {
        farming_pool: pool.key(),
        old_borrow_tracker,
        new_borrow_tracker,
    });

    Ok(())
}
