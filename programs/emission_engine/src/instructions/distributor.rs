/**
 * Share Distributor Instructions
 *
 * Every instruction that touches shares or credit first pulls the
 * upstream vester, so accrual is always settled at the old shares.
 *
 * Made by LabsX402 for Solana
 * https://x.com/LabsX402
 */

use anchor_lang::prelude::*;
use anchor_lang::system_program::{create_account, CreateAccount};
use anchor_spl::token::{Mint, Token, TokenAccount};

use crate::{
    instructions::transfers::{pay_from_distributor, release_from_vester},
    state::{Distributor, DistributorMode, RecipientInput, RecipientPosition, Vester},
    DistributorAdminSet,
    DistributorClaimed,
    DistributorInitialized,
    EngineError,
    RecipientEdited,
    DISTRIBUTOR_SEED,
    DISTRIBUTOR_VAULT_SEED,
    POSITION_SEED,
};

/// Pull the vester into the distributor and move the released tokens
pub fn sync_distributor<'info>(
    distributor: &mut Account<'info, Distributor>,
    vester: &mut Account<'info, Vester>,
    vester_vault: &Account<'info, TokenAccount>,
    distributor_vault: &Account<'info, TokenAccount>,
    token_program: &Program<'info, Token>,
    now: i64,
) -> Result<u64> {
    let distributor_key = distributor.key();
    let released = distributor.pull(distributor_key, vester, now)?;

    release_from_vester(
        vester,
        vester_vault,
        distributor_vault.to_account_info(),
        token_program,
        released,
    )?;

    if released > 0 {
        msg!("Pulled {} from vester into distributor", released);
    }
    Ok(released)
}

/// A distributor with its vester, for instructions that edit it from elsewhere
#[derive(Accounts)]
pub struct DistributorUpstream<'info> {
    #[account(
        mut,
        seeds = [DISTRIBUTOR_SEED, distributor.vester.as_ref(), &distributor.id.to_le_bytes()],
        bump = distributor.bump,
        has_one = vester @ EngineError::InvalidUpstream,
    )]
    pub distributor: Box<Account<'info, Distributor>>,

    #[account(
        mut,
        constraint = distributor_vault.key() == distributor.vault @ EngineError::InvalidVault,
    )]
    pub distributor_vault: Box<Account<'info, TokenAccount>>,

    #[account(mut)]
    pub vester: Box<Account<'info, Vester>>,

    #[account(
        mut,
        constraint = vester_vault.key() == vester.vault @ EngineError::InvalidVault,
    )]
    pub vester_vault: Box<Account<'info, TokenAccount>>,
}

impl<'info> DistributorUpstream<'info> {
    pub fn sync(&mut self, token_program: &Program<'info, Token>, now: i64) -> Result<u64> {
        sync_distributor(
            &mut self.distributor,
            &mut self.vester,
            &self.vester_vault,
            &self.distributor_vault,
            token_program,
            now,
        )
    }
}

// =============================================================================
// INIT DISTRIBUTOR
// =============================================================================

#[derive(Accounts)]
#[instruction(id: u64)]
pub struct InitDistributor<'info> {
    #[account(mut)]
    pub payer: Signer<'info>,

    /// Upstream vester; it pays this distributor once its recipient is set to it
    pub vester: Account<'info, Vester>,

    #[account(address = vester.mint)]
    pub mint: Account<'info, Mint>,

    #[account(
        init,
        payer = payer,
        space = Distributor::LEN,
        seeds = [DISTRIBUTOR_SEED, vester.key().as_ref(), &id.to_le_bytes()],
        bump,
    )]
    pub distributor: Account<'info, Distributor>,

    #[account(
        init,
        payer = payer,
        token::mint = mint,
        token::authority = distributor,
        seeds = [DISTRIBUTOR_VAULT_SEED, distributor.key().as_ref()],
        bump,
    )]
    pub distributor_vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

fn configure_distributor(
    accounts: &mut InitDistributor,
    id: u64,
    mode: DistributorMode,
    admin: Pubkey,
    bump: u8,
) {
    let distributor = &mut accounts.distributor;
    distributor.id = id;
    distributor.mode = mode;
    distributor.admin = admin;
    distributor.mint = accounts.mint.key();
    distributor.vester = accounts.vester.key();
    distributor.vault = accounts.distributor_vault.key();
    distributor.bump = bump;
}

pub fn init_owned_handler(ctx: Context<InitDistributor>, id: u64, admin: Pubkey) -> Result<()> {
    let bump = ctx.bumps.distributor;
    configure_distributor(ctx.accounts, id, DistributorMode::Owned, admin, bump);

    let distributor = &ctx.accounts.distributor;
    msg!("Owned distributor created, admin {}", admin);

    emit!(DistributorInitialized {
        distributor: distributor.key(),
        vester: distributor.vester,
        mode: DistributorMode::Owned,
        admin,
        total_shares: 0,
    });

    Ok(())
}

/// Remaining accounts: one uninitialized position PDA per recipient, same order
pub fn init_initialized_handler<'info>(
    ctx: Context<'_, '_, 'info, 'info, InitDistributor<'info>>,
    id: u64,
    recipients: Vec<RecipientInput>,
) -> Result<()> {
    Distributor::validate_initial_recipients(&recipients)?;
    require!(
        ctx.remaining_accounts.len() == recipients.len(),
        EngineError::InvalidValue
    );

    let bump = ctx.bumps.distributor;
    configure_distributor(
        ctx.accounts,
        id,
        DistributorMode::Initialized,
        Pubkey::default(),
        bump,
    );

    let distributor_key = ctx.accounts.distributor.key();
    let rent = Rent::get()?;
    let lamports = rent.minimum_balance(RecipientPosition::LEN);

    for (recipient, position_info) in recipients.iter().zip(ctx.remaining_accounts.iter()) {
        let (expected, position_bump) = Pubkey::find_program_address(
            &[
                POSITION_SEED,
                distributor_key.as_ref(),
                recipient.account.as_ref(),
            ],
            ctx.program_id,
        );
        require_keys_eq!(position_info.key(), expected, EngineError::InvalidPosition);

        let seeds = &[
            POSITION_SEED,
            distributor_key.as_ref(),
            recipient.account.as_ref(),
            &[position_bump],
        ];
        create_account(
            CpiContext::new_with_signer(
                ctx.accounts.system_program.to_account_info(),
                CreateAccount {
                    from: ctx.accounts.payer.to_account_info(),
                    to: position_info.clone(),
                },
                &[seeds],
            ),
            lamports,
            RecipientPosition::LEN as u64,
            ctx.program_id,
        )?;

        let mut position = RecipientPosition::default();
        position.open(distributor_key, recipient.account, position_bump);
        ctx.accounts
            .distributor
            .register_initial(&mut position, recipient.shares)?;

        let mut data = position_info.try_borrow_mut_data()?;
        let mut writer: &mut [u8] = &mut data[..];
        position.try_serialize(&mut writer)?;
    }

    let distributor = &ctx.accounts.distributor;
    msg!(
        "Initialized distributor created: {} recipients, {} shares",
        distributor.recipient_count,
        distributor.total_shares
    );

    emit!(DistributorInitialized {
        distributor: distributor_key,
        vester: distributor.vester,
        mode: DistributorMode::Initialized,
        admin: Pubkey::default(),
        total_shares: distributor.total_shares,
    });

    Ok(())
}

// =============================================================================
// EDIT RECIPIENT
// =============================================================================

#[derive(Accounts)]
pub struct EditRecipient<'info> {
    #[account(mut)]
    pub admin: Signer<'info>,

    /// CHECK: only the key is used, as position owner
    pub recipient: UncheckedAccount<'info>,

    #[account(
        mut,
        seeds = [DISTRIBUTOR_SEED, distributor.vester.as_ref(), &distributor.id.to_le_bytes()],
        bump = distributor.bump,
        has_one = vester @ EngineError::InvalidUpstream,
    )]
    pub distributor: Account<'info, Distributor>,

    #[account(
        init_if_needed,
        payer = admin,
        space = RecipientPosition::LEN,
        seeds = [POSITION_SEED, distributor.key().as_ref(), recipient.key().as_ref()],
        bump,
    )]
    pub position: Account<'info, RecipientPosition>,

    #[account(mut)]
    pub vester: Account<'info, Vester>,

    #[account(
        mut,
        constraint = vester_vault.key() == vester.vault @ EngineError::InvalidVault,
    )]
    pub vester_vault: Account<'info, TokenAccount>,

    #[account(
        mut,
        constraint = distributor_vault.key() == distributor.vault @ EngineError::InvalidVault,
    )]
    pub distributor_vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

pub fn edit_recipient_handler(ctx: Context<EditRecipient>, shares: u64) -> Result<()> {
    let clock = Clock::get()?;
    let accounts = &mut *ctx.accounts;

    sync_distributor(
        &mut accounts.distributor,
        &mut accounts.vester,
        &accounts.vester_vault,
        &accounts.distributor_vault,
        &accounts.token_program,
        clock.unix_timestamp,
    )?;

    let distributor_key = accounts.distributor.key();
    let recipient = accounts.recipient.key();
    accounts
        .position
        .open(distributor_key, recipient, ctx.bumps.position);

    let admin = accounts.admin.key();
    accounts
        .distributor
        .edit_recipient(admin, &mut accounts.position, shares)?;

    msg!(
        "Recipient {} now holds {} of {} shares",
        recipient,
        shares,
        accounts.distributor.total_shares
    );

    emit!(RecipientEdited {
        distributor: distributor_key,
        account: recipient,
        shares,
        total_shares: accounts.distributor.total_shares,
    });

    Ok(())
}

// =============================================================================
// CLAIM
// =============================================================================

#[derive(Accounts)]
pub struct ClaimDistributor<'info> {
    pub caller: Signer<'info>,

    /// CHECK: position owner, matched against the position
    #[account(address = position.account @ EngineError::InvalidPosition)]
    pub recipient: UncheckedAccount<'info>,

    #[account(
        mut,
        seeds = [DISTRIBUTOR_SEED, distributor.vester.as_ref(), &distributor.id.to_le_bytes()],
        bump = distributor.bump,
        has_one = vester @ EngineError::InvalidUpstream,
    )]
    pub distributor: Account<'info, Distributor>,

    #[account(
        mut,
        seeds = [POSITION_SEED, distributor.key().as_ref(), position.account.as_ref()],
        bump = position.bump,
        has_one = distributor @ EngineError::InvalidPosition,
    )]
    pub position: Account<'info, RecipientPosition>,

    #[account(
        mut,
        token::mint = distributor.mint,
        token::authority = position.account,
    )]
    pub recipient_token_account: Account<'info, TokenAccount>,

    #[account(mut)]
    pub vester: Account<'info, Vester>,

    #[account(
        mut,
        constraint = vester_vault.key() == vester.vault @ EngineError::InvalidVault,
    )]
    pub vester_vault: Account<'info, TokenAccount>,

    #[account(
        mut,
        constraint = distributor_vault.key() == distributor.vault @ EngineError::InvalidVault,
    )]
    pub distributor_vault: Account<'info, TokenAccount>,

    pub token_program: Program<'info, Token>,
}

fn claim_position(accounts: &mut ClaimDistributor) -> Result<u64> {
    let clock = Clock::get()?;

    sync_distributor(
        &mut accounts.distributor,
        &mut accounts.vester,
        &accounts.vester_vault,
        &accounts.distributor_vault,
        &accounts.token_program,
        clock.unix_timestamp,
    )?;

    // Credit is zeroed before the payout leaves the vault
    let amount = accounts.distributor.take_credit(&mut accounts.position)?;

    pay_from_distributor(
        &accounts.distributor,
        &accounts.distributor_vault,
        accounts.recipient_token_account.to_account_info(),
        &accounts.token_program,
        amount,
    )?;

    msg!("Distributor paid {} to {}", amount, accounts.position.account);

    emit!(DistributorClaimed {
        distributor: accounts.distributor.key(),
        account: accounts.position.account,
        amount,
    });

    Ok(amount)
}

/// Claim by the position owner
pub fn claim_handler(ctx: Context<ClaimDistributor>) -> Result<u64> {
    require_keys_eq!(
        ctx.accounts.caller.key(),
        ctx.accounts.position.account,
        EngineError::Unauthorized
    );
    claim_position(ctx.accounts)
}

/// Claim by anyone, paid to the position owner.
/// Positions held by engine accounts (farming pools) are pulled by their owner only.
pub fn claim_account_handler(ctx: Context<ClaimDistributor>) -> Result<u64> {
    require!(
        ctx.accounts.recipient.owner != ctx.program_id,
        EngineError::InvalidPosition
    );
    claim_position(ctx.accounts)
}

// =============================================================================
// SET ADMIN
// =============================================================================

#[derive(Accounts)]
pub struct SetDistributorAdmin<'info> {
    pub admin: Signer<'info>,

    #[account(
        mut,
        seeds = [DISTRIBUTOR_SEED, distributor.vester.as_ref(), &distributor.id.to_le_bytes()],
        bump = distributor.bump,
    )]
    pub distributor: Account<'info, Distributor>,
}

pub fn set_admin_handler(ctx: Context<SetDistributorAdmin>, new_admin: Pubkey) -> Result<()> {
    let distributor = &mut ctx.accounts.distributor;
    let old_admin = distributor.set_admin(ctx.accounts.admin.key(), new_admin)?;

    msg!("Distributor admin: {} -> {}", old_admin, new_admin);

    emit!(DistributorAdminSet {
        distributor: distributor.key(),
        old_admin,
        new_admin,
    });

    Ok(())
}
