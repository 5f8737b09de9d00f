/**
 * Vester Instructions
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;
use anchor_spl::token::{transfer, Mint, Token, TokenAccount, Transfer};

use crate::{
    instructions::transfers::release_from_vester,
    state::{Vester, VestingCurve},
    EngineError,
    VesterClaimed,
    VesterInitialized,
    VesterRecipientSet,
    VESTER_SEED,
    VESTER_VAULT_SEED,
};

// =============================================================================
// INIT VESTER
// =============================================================================

#[derive(Accounts)]
#[instruction(id: u64)]
pub struct InitVester<'info> {
    #[account(mut)]
    pub creator: Signer<'info>,

    pub mint: Account<'info, Mint>,

    #[account(
        init,
        payer = creator,
        space = Vester::LEN,
        seeds = [VESTER_SEED, creator.key().as_ref(), mint.key().as_ref(), &id.to_le_bytes()],
        bump,
    )]
    pub vester: Account<'info, Vester>,

    #[account(
        init,
        payer = creator,
        token::mint = mint,
        token::authority = vester,
        seeds = [VESTER_VAULT_SEED, vester.key().as_ref()],
        bump,
    )]
    pub vester_vault: Account<'info, TokenAccount>,

    #[account(
        mut,
        token::mint = mint,
        token::authority = creator,
    )]
    pub source_token_account: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn init_handler(
    ctx: Context<InitVester>,
    id: u64,
    curve: VestingCurve,
    recipient: Pubkey,
    total_amount: u64,
    vesting_begin: i64,
    vesting_end: i64,
) -> Result<()> {
    Vester::validate_schedule(vesting_begin, vesting_end)?;
    require!(total_amount > 0, EngineError::InvalidValue);

    let vester = &mut ctx.accounts.vester;
    vester.id = id;
    vester.mint = ctx.accounts.mint.key();
    vester.vault = ctx.accounts.vester_vault.key();
    vester.creator = ctx.accounts.creator.key();
    vester.recipient = recipient;
    vester.curve = curve;
    vester.total_amount = total_amount;
    vester.vesting_begin = vesting_begin;
    vester.vesting_end = vesting_end;
    vester.claimed_amount = 0;
    vester.bump = ctx.bumps.vester;

    // Fund the full allocation up front
    transfer(
        CpiContext::new(
            ctx.accounts.token_program.to_account_info(),
            Transfer {
                from: ctx.accounts.source_token_account.to_account_info(),
                to: ctx.accounts.vester_vault.to_account_info(),
                authority: ctx.accounts.creator.to_account_info(),
            },
        ),
        total_amount,
    )?;

    msg!(
        "Vester created: {:?} curve, {} tokens from {} to {}",
        curve,
        total_amount,
        vesting_begin,
        vesting_end
    );

    emit!(VesterInitialized {
        vester: ctx.accounts.vester.key(),
        mint: ctx.accounts.mint.key(),
        recipient,
        curve,
        total_amount,
        vesting_begin,
        vesting_end,
    });

    Ok(())
}

// =============================================================================
// CLAIM
// =============================================================================

#[derive(Accounts)]
pub struct ClaimVester<'info> {
    pub recipient: Signer<'info>,

    #[account(
        mut,
        seeds = [VESTER_SEED, vester.creator.as_ref(), vester.mint.as_ref(), &vester.id.to_le_bytes()],
        bump = vester.bump,
        has_one = recipient @ EngineError::Unauthorized,
    )]
    pub vester: Account<'info, Vester>,

    #[account(
        mut,
        constraint = vester_vault.key() == vester.vault @ EngineError::InvalidVault,
    )]
    pub vester_vault: Account<'info, TokenAccount>,

    #[account(
        mut,
        token::mint = vester.mint,
    )]
    pub recipient_token_account: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

pub fn claim_handler(ctx: Context<ClaimVester>) -> Result<u64> {
    let clock = Clock::get()?;
    let recipient = ctx.accounts.recipient.key();

    let amount = ctx.accounts.vester.claim(recipient, clock.unix_timestamp)?;
    if amount == 0 {
        msg!("Nothing vested yet");
        return Ok(0);
    }

    release_from_vester(
        &ctx.accounts.vester,
        &ctx.accounts.vester_vault,
        ctx.accounts.recipient_token_account.to_account_info(),
        &ctx.accounts.token_program,
        amount,
    )?;

    let vester = &ctx.accounts.vester;
    msg!(
        "Vested {} released ({} of {} total)",
        amount,
        vester.claimed_amount,
        vester.total_amount
    );

    emit!(VesterClaimed {
        vester: vester.key(),
        recipient,
        amount,
        claimed_amount: vester.claimed_amount,
    });

    Ok(amount)
}

// =============================================================================
// SET RECIPIENT
// =============================================================================

#[derive(Accounts)]
pub struct SetVesterRecipient<'info> {
    pub recipient: Signer<'info>,

    #[account(
        mut,
        seeds = [VESTER_SEED, vester.creator.as_ref(), vester.mint.as_ref(), &vester.id.to_le_bytes()],
        bump = vester.bump,
    )]
    pub vester: Account<'info, Vester>,
}

pub fn set_recipient_handler(ctx: Context<SetVesterRecipient>, new_recipient: Pubkey) -> Result<()> {
    let vester = &mut ctx.accounts.vester;
    let old_recipient = vester.set_recipient(ctx.accounts.recipient.key(), new_recipient)?;

    msg!("Vester recipient: {} -> {}", old_recipient, new_recipient);

    emit!(VesterRecipientSet {
        vester: vester.key(),
        old_recipient,
        new_recipient,
    });

    Ok(())
}
