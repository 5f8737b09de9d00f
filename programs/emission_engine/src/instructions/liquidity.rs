/**
 * Liquidity Generator Instructions
 *
 * FLOW:
 * - deposit:  base asset in, shares in the ordinary (and bonus) distributor
 * - finalize: pooled base + paired token -> router 0 / router 1 LP
 * - deliver:  after the unlock, LP -> reserves manager
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;
use anchor_lang::solana_program::instruction::{AccountMeta, Instruction};
use anchor_lang::solana_program::program::invoke_signed;
use anchor_spl::token::{transfer, Mint, Token, TokenAccount, Transfer};

use crate::instructions::distributor::*;
use crate::{
    instructions::transfers::pay_from_generator,
    state::{
        Distributor, DistributorMode, LiquidityGenerator, LiquidityGeneratorParams,
        RecipientPosition,
    },
    Deposited,
    EngineError,
    LiquidityDelivered,
    LiquidityFinalized,
    LiquidityGeneratorInitialized,
    UnlockPostponed,
    ADD_LIQUIDITY_DISCRIMINATOR,
    BASE_VAULT_SEED,
    LIQUIDITY_GENERATOR_SEED,
    LP_VAULT_SEED,
    POSITION_SEED,
    TOKEN_VAULT_SEED,
};

/// Arguments of the routers' `add_liquidity` instruction
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug)]
pub struct AddLiquidityArgs {
    pub base_amount: u64,
    pub token_amount: u64,
    /// 0: accept whatever ratio the pool gives
    pub min_liquidity: u64,
}

// =============================================================================
// INIT LIQUIDITY GENERATOR
// =============================================================================

#[derive(Accounts)]
#[instruction(id: u64)]
pub struct InitLiquidityGenerator<'info> {
    #[account(mut)]
    pub creator: Signer<'info>,

    pub base_mint: Box<Account<'info, Mint>>,
    pub token_mint: Box<Account<'info, Mint>>,

    /// Pool token of router 0
    pub lp_mint0: Box<Account<'info, Mint>>,

    /// Pool token of router 1
    pub lp_mint1: Box<Account<'info, Mint>>,

    #[account(
        init,
        payer = creator,
        space = LiquidityGenerator::LEN,
        seeds = [
            LIQUIDITY_GENERATOR_SEED,
            base_mint.key().as_ref(),
            token_mint.key().as_ref(),
            &id.to_le_bytes(),
        ],
        bump,
    )]
    pub liquidity_generator: Box<Account<'info, LiquidityGenerator>>,

    #[account(
        init,
        payer = creator,
        token::mint = base_mint,
        token::authority = liquidity_generator,
        seeds = [BASE_VAULT_SEED, liquidity_generator.key().as_ref()],
        bump,
    )]
    pub base_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        init,
        payer = creator,
        token::mint = token_mint,
        token::authority = liquidity_generator,
        seeds = [TOKEN_VAULT_SEED, liquidity_generator.key().as_ref()],
        bump,
    )]
    pub token_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        init,
        payer = creator,
        token::mint = lp_mint0,
        token::authority = liquidity_generator,
        seeds = [LP_VAULT_SEED, liquidity_generator.key().as_ref(), &[0]],
        bump,
    )]
    pub lp_vault0: Box<Account<'info, TokenAccount>>,

    #[account(
        init,
        payer = creator,
        token::mint = lp_mint1,
        token::authority = liquidity_generator,
        seeds = [LP_VAULT_SEED, liquidity_generator.key().as_ref(), &[1]],
        bump,
    )]
    pub lp_vault1: Box<Account<'info, TokenAccount>>,

    /// Ordinary rewards, must be administered by the generator
    #[account(
        constraint = distributor.mode == DistributorMode::Owned @ EngineError::InvalidDistributor,
        constraint = distributor.admin == liquidity_generator.key() @ EngineError::InvalidDistributor,
    )]
    pub distributor: Box<Account<'info, Distributor>>,

    /// Bonus rewards, must be administered by the generator
    #[account(
        constraint = bonus_distributor.mode == DistributorMode::Owned @ EngineError::InvalidDistributor,
        constraint = bonus_distributor.admin == liquidity_generator.key() @ EngineError::InvalidDistributor,
        constraint = bonus_distributor.key() != distributor.key() @ EngineError::InvalidDistributor,
    )]
    pub bonus_distributor: Box<Account<'info, Distributor>>,

    /// Funds the paired token side
    #[account(
        mut,
        token::mint = token_mint,
        token::authority = creator,
    )]
    pub source_token_account: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn init_handler(
    ctx: Context<InitLiquidityGenerator>,
    id: u64,
    params: LiquidityGeneratorParams,
) -> Result<()> {
    let accounts = &mut *ctx.accounts;
    let generator = &mut accounts.liquidity_generator;

    generator.configure(&params)?;
    generator.id = id;
    generator.base_mint = accounts.base_mint.key();
    generator.token_mint = accounts.token_mint.key();
    generator.base_vault = accounts.base_vault.key();
    generator.token_vault = accounts.token_vault.key();
    generator.lp_vault0 = accounts.lp_vault0.key();
    generator.lp_vault1 = accounts.lp_vault1.key();
    generator.distributor = accounts.distributor.key();
    generator.bonus_distributor = accounts.bonus_distributor.key();
    generator.bump = ctx.bumps.liquidity_generator;

    if params.liquidity_token_amount > 0 {
        transfer(
            CpiContext::new(
                accounts.token_program.to_account_info(),
                Transfer {
                    from: accounts.source_token_account.to_account_info(),
                    to: accounts.token_vault.to_account_info(),
                    authority: accounts.creator.to_account_info(),
                },
            ),
            params.liquidity_token_amount,
        )?;
    }

    let generator = &accounts.liquidity_generator;
    msg!("Liquidity generator created");
    msg!("  Window: {} -> {}", generator.period_begin, generator.period_end);
    msg!("  Bonus until: {}", generator.bonus_end);
    msg!("  Unlock: {}", generator.unlock_timestamp);

    emit!(LiquidityGeneratorInitialized {
        liquidity_generator: generator.key(),
        governance: generator.governance,
        period_begin: generator.period_begin,
        period_end: generator.period_end,
        bonus_end: generator.bonus_end,
        unlock_timestamp: generator.unlock_timestamp,
    });

    Ok(())
}

// =============================================================================
// DEPOSIT
// =============================================================================

#[derive(Accounts)]
pub struct Deposit<'info> {
    #[account(mut)]
    pub participant: Signer<'info>,

    #[account(
        mut,
        seeds = [
            LIQUIDITY_GENERATOR_SEED,
            liquidity_generator.base_mint.as_ref(),
            liquidity_generator.token_mint.as_ref(),
            &liquidity_generator.id.to_le_bytes(),
        ],
        bump = liquidity_generator.bump,
        has_one = base_vault @ EngineError::InvalidVault,
        constraint = liquidity_generator.distributor == ordinary.distributor.key() @ EngineError::InvalidDistributor,
        constraint = liquidity_generator.bonus_distributor == bonus.distributor.key() @ EngineError::InvalidDistributor,
    )]
    pub liquidity_generator: Box<Account<'info, LiquidityGenerator>>,

    #[account(mut)]
    pub base_vault: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        token::mint = liquidity_generator.base_mint,
        token::authority = participant,
    )]
    pub participant_base_account: Box<Account<'info, TokenAccount>>,

    pub ordinary: DistributorUpstream<'info>,

    #[account(
        init_if_needed,
        payer = participant,
        space = RecipientPosition::LEN,
        seeds = [POSITION_SEED, ordinary.distributor.key().as_ref(), participant.key().as_ref()],
        bump,
    )]
    pub position: Box<Account<'info, RecipientPosition>>,

    pub bonus: DistributorUpstream<'info>,

    #[account(
        init_if_needed,
        payer = participant,
        space = RecipientPosition::LEN,
        seeds = [POSITION_SEED, bonus.distributor.key().as_ref(), participant.key().as_ref()],
        bump,
    )]
    pub bonus_position: Box<Account<'info, RecipientPosition>>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn deposit_handler(ctx: Context<Deposit>, amount: u64) -> Result<()> {
    let clock = Clock::get()?;
    let now = clock.unix_timestamp;
    let accounts = &mut *ctx.accounts;

    let bonus = accounts.liquidity_generator.record_deposit(now, amount)?;

    transfer(
        CpiContext::new(
            accounts.token_program.to_account_info(),
            Transfer {
                from: accounts.participant_base_account.to_account_info(),
                to: accounts.base_vault.to_account_info(),
                authority: accounts.participant.to_account_info(),
            },
        ),
        amount,
    )?;

    let generator_key = accounts.liquidity_generator.key();
    let participant = accounts.participant.key();

    accounts.ordinary.sync(&accounts.token_program, now)?;
    let distributor_key = accounts.ordinary.distributor.key();
    accounts
        .position
        .open(distributor_key, participant, ctx.bumps.position);
    accounts.liquidity_generator.credit_contribution(
        generator_key,
        &mut accounts.ordinary.distributor,
        &mut accounts.position,
        amount,
    )?;

    if bonus {
        accounts.bonus.sync(&accounts.token_program, now)?;
        let bonus_key = accounts.bonus.distributor.key();
        accounts
            .bonus_position
            .open(bonus_key, participant, ctx.bumps.bonus_position);
        accounts.liquidity_generator.credit_contribution(
            generator_key,
            &mut accounts.bonus.distributor,
            &mut accounts.bonus_position,
            amount,
        )?;
    }

    let contribution = accounts.position.shares;
    let total_contributed = accounts.liquidity_generator.total_contributed;
    msg!(
        "Deposit {} ({}bonus): contribution {} of {}",
        amount,
        if bonus { "" } else { "no " },
        contribution,
        total_contributed
    );

    emit!(Deposited {
        liquidity_generator: generator_key,
        participant,
        amount,
        contribution,
        bonus,
        total_contributed,
    });

    Ok(())
}

// =============================================================================
// FINALIZE
// =============================================================================

#[derive(Accounts)]
pub struct Finalize<'info> {
    pub governance: Signer<'info>,

    #[account(
        mut,
        seeds = [
            LIQUIDITY_GENERATOR_SEED,
            liquidity_generator.base_mint.as_ref(),
            liquidity_generator.token_mint.as_ref(),
            &liquidity_generator.id.to_le_bytes(),
        ],
        bump = liquidity_generator.bump,
        has_one = base_vault @ EngineError::InvalidVault,
        has_one = token_vault @ EngineError::InvalidVault,
        has_one = lp_vault0 @ EngineError::InvalidVault,
        has_one = lp_vault1 @ EngineError::InvalidVault,
    )]
    pub liquidity_generator: Box<Account<'info, LiquidityGenerator>>,

    #[account(mut)]
    pub base_vault: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub token_vault: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub lp_vault0: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub lp_vault1: Box<Account<'info, TokenAccount>>,

    /// CHECK: matched against the configured router 0
    #[account(executable, address = liquidity_generator.router0 @ EngineError::InvalidRouter)]
    pub router0_program: UncheckedAccount<'info>,

    /// CHECK: matched against the configured router 1
    #[account(executable, address = liquidity_generator.router1 @ EngineError::InvalidRouter)]
    pub router1_program: UncheckedAccount<'info>,
}

/// CPI one router's `add_liquidity`, signed by the generator
fn add_liquidity<'info>(
    generator: &Account<'info, LiquidityGenerator>,
    router: AccountInfo<'info>,
    router_accounts: &[AccountInfo<'info>],
    base_amount: u64,
    token_amount: u64,
) -> Result<()> {
    if base_amount == 0 {
        return Ok(());
    }

    let generator_key = generator.key();
    let metas: Vec<AccountMeta> = router_accounts
        .iter()
        .map(|account| AccountMeta {
            pubkey: *account.key,
            is_signer: account.is_signer || *account.key == generator_key,
            is_writable: account.is_writable,
        })
        .collect();

    let mut data = ADD_LIQUIDITY_DISCRIMINATOR.to_vec();
    AddLiquidityArgs {
        base_amount,
        token_amount,
        min_liquidity: 0,
    }
    .serialize(&mut data)
    .map_err(|_| ProgramError::InvalidInstructionData)?;

    let ix = Instruction {
        program_id: router.key(),
        accounts: metas,
        data,
    };

    let mut account_infos = router_accounts.to_vec();
    account_infos.push(router);

    let id = generator.id.to_le_bytes();
    let signer_seeds: &[&[&[u8]]] = &[&[
        LIQUIDITY_GENERATOR_SEED,
        generator.base_mint.as_ref(),
        generator.token_mint.as_ref(),
        id.as_ref(),
        &[generator.bump],
    ]];

    invoke_signed(&ix, &account_infos, signer_seeds)?;
    Ok(())
}

/// Remaining accounts: `router0_accounts_len` accounts for router 0, the rest for router 1
pub fn finalize_handler<'info>(
    ctx: Context<'_, '_, 'info, 'info, Finalize<'info>>,
    router0_accounts_len: u8,
) -> Result<()> {
    let clock = Clock::get()?;
    let governance = ctx.accounts.governance.key();

    // Marked finalized before either router runs
    let split = ctx
        .accounts
        .liquidity_generator
        .begin_finalize(governance, clock.unix_timestamp)?;

    let split_at = router0_accounts_len as usize;
    require!(
        split_at <= ctx.remaining_accounts.len(),
        EngineError::InvalidRouter
    );
    let (router0_accounts, router1_accounts) = ctx.remaining_accounts.split_at(split_at);

    let lp_before0 = ctx.accounts.lp_vault0.amount;
    let lp_before1 = ctx.accounts.lp_vault1.amount;

    add_liquidity(
        &ctx.accounts.liquidity_generator,
        ctx.accounts.router0_program.to_account_info(),
        router0_accounts,
        split.base0,
        split.token0,
    )?;
    add_liquidity(
        &ctx.accounts.liquidity_generator,
        ctx.accounts.router1_program.to_account_info(),
        router1_accounts,
        split.base1,
        split.token1,
    )?;

    ctx.accounts.lp_vault0.reload()?;
    ctx.accounts.lp_vault1.reload()?;
    let lp_minted0 = ctx
        .accounts
        .lp_vault0
        .amount
        .checked_sub(lp_before0)
        .ok_or(EngineError::MathOverflow)?;
    let lp_minted1 = ctx
        .accounts
        .lp_vault1
        .amount
        .checked_sub(lp_before1)
        .ok_or(EngineError::MathOverflow)?;

    ctx.accounts
        .liquidity_generator
        .record_minted(lp_minted0, lp_minted1);

    msg!("Liquidity finalized");
    msg!("  Router 0: {} base + {} token -> {} LP", split.base0, split.token0, lp_minted0);
    msg!("  Router 1: {} base + {} token -> {} LP", split.base1, split.token1, lp_minted1);

    emit!(LiquidityFinalized {
        liquidity_generator: ctx.accounts.liquidity_generator.key(),
        base_to_router0: split.base0,
        base_to_router1: split.base1,
        lp_minted0,
        lp_minted1,
    });

    Ok(())
}

// =============================================================================
// POSTPONE UNLOCK
// =============================================================================

#[derive(Accounts)]
pub struct PostponeUnlockTimestamp<'info> {
    pub governance: Signer<'info>,

    #[account(
        mut,
        seeds = [
            LIQUIDITY_GENERATOR_SEED,
            liquidity_generator.base_mint.as_ref(),
            liquidity_generator.token_mint.as_ref(),
            &liquidity_generator.id.to_le_bytes(),
        ],
        bump = liquidity_generator.bump,
    )]
    pub liquidity_generator: Box<Account<'info, LiquidityGenerator>>,
}

pub fn postpone_unlock_handler(
    ctx: Context<PostponeUnlockTimestamp>,
    new_unlock_timestamp: i64,
) -> Result<()> {
    let generator = &mut ctx.accounts.liquidity_generator;
    let old_unlock_timestamp =
        generator.postpone_unlock_timestamp(ctx.accounts.governance.key(), new_unlock_timestamp)?;

    msg!("Unlock postponed: {} -> {}", old_unlock_timestamp, new_unlock_timestamp);

    emit!(UnlockPostponed {
        liquidity_generator: generator.key(),
        old_unlock_timestamp,
        new_unlock_timestamp,
    });

    Ok(())
}

// =============================================================================
// DELIVER TO RESERVES MANAGER
// =============================================================================

#[derive(Accounts)]
pub struct DeliverLiquidity<'info> {
    pub governance: Signer<'info>,

    #[account(
        mut,
        seeds = [
            LIQUIDITY_GENERATOR_SEED,
            liquidity_generator.base_mint.as_ref(),
            liquidity_generator.token_mint.as_ref(),
            &liquidity_generator.id.to_le_bytes(),
        ],
        bump = liquidity_generator.bump,
        has_one = base_vault @ EngineError::InvalidVault,
        has_one = token_vault @ EngineError::InvalidVault,
        has_one = lp_vault0 @ EngineError::InvalidVault,
        has_one = lp_vault1 @ EngineError::InvalidVault,
    )]
    pub liquidity_generator: Box<Account<'info, LiquidityGenerator>>,

    #[account(mut)]
    pub base_vault: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub token_vault: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub lp_vault0: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub lp_vault1: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        token::mint = lp_vault0.mint,
        token::authority = liquidity_generator.reserves_manager,
    )]
    pub reserves_lp_account0: Box<Account<'info, TokenAccount>>,

    #[account(
        mut,
        token::mint = lp_vault1.mint,
        token::authority = liquidity_generator.reserves_manager,
    )]
    pub reserves_lp_account1: Box<Account<'info, TokenAccount>>,

    /// Receives base asset the routers did not take
    #[account(
        mut,
        token::mint = liquidity_generator.base_mint,
        token::authority = liquidity_generator.reserves_manager,
    )]
    pub reserves_base_account: Box<Account<'info, TokenAccount>>,

    /// Receives paired token the routers did not take
    #[account(
        mut,
        token::mint = liquidity_generator.token_mint,
        token::authority = liquidity_generator.reserves_manager,
    )]
    pub reserves_token_account: Box<Account<'info, TokenAccount>>,

    pub token_program: Program<'info, Token>,
}

pub fn deliver_handler(ctx: Context<DeliverLiquidity>) -> Result<()> {
    let clock = Clock::get()?;
    let accounts = &mut *ctx.accounts;

    // Marked delivered before any transfer
    accounts
        .liquidity_generator
        .begin_delivery(accounts.governance.key(), clock.unix_timestamp)?;

    let lp_amount0 = accounts.lp_vault0.amount;
    let lp_amount1 = accounts.lp_vault1.amount;
    let base_left = accounts.base_vault.amount;
    let token_left = accounts.token_vault.amount;

    let generator = &accounts.liquidity_generator;
    let token_program = &accounts.token_program;
    pay_from_generator(
        generator,
        &accounts.lp_vault0,
        accounts.reserves_lp_account0.to_account_info(),
        token_program,
        lp_amount0,
    )?;
    pay_from_generator(
        generator,
        &accounts.lp_vault1,
        accounts.reserves_lp_account1.to_account_info(),
        token_program,
        lp_amount1,
    )?;
    pay_from_generator(
        generator,
        &accounts.base_vault,
        accounts.reserves_base_account.to_account_info(),
        token_program,
        base_left,
    )?;
    pay_from_generator(
        generator,
        &accounts.token_vault,
        accounts.reserves_token_account.to_account_info(),
        token_program,
        token_left,
    )?;

    msg!("Liquidity delivered to {}", generator.reserves_manager);
    msg!("  LP: {} + {}", lp_amount0, lp_amount1);

    emit!(LiquidityDelivered {
        liquidity_generator: generator.key(),
        reserves_manager: generator.reserves_manager,
        lp_amount0,
        lp_amount1,
    });

    Ok(())
}
