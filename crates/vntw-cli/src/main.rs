//! Value Network CLI
//!
//! Deploys the token, vesting contract and dev pool from a TOML config and
//! drives their operations against a JSON state file.

mod config;
mod state;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crate::config::{DeployConfig, LoggingConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vntw_core::{Address, Amount, ProposalId, Timestamp};
use vntw_token::{ProposalStatus, TokenSystem};

#[derive(Parser)]
#[command(name = "vntw")]
#[command(version)]
#[command(about = "Value Network - burn-on-transfer token with vesting and M-of-N dev pool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// State file
    #[arg(short, long, global = true, default_value = "vntw-state.json", env = "VNTW_STATE")]
    state: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample deployment config
    InitConfig {
        #[arg(short, long, default_value = "vntw.toml")]
        output: PathBuf,
    },

    /// Deploy token, vesting and dev pool
    Deploy {
        /// Deployment config path
        #[arg(short, long, default_value = "vntw.toml")]
        config: PathBuf,

        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Show token and deployment information
    Info,

    /// Show the balance of an address
    Balance {
        /// Address (hex or @label)
        address: Address,
    },

    /// Transfer tokens (burn applies)
    Transfer {
        #[arg(long)]
        from: Address,
        #[arg(long)]
        to: Address,
        amount: Amount,
    },

    /// Destroy tokens held by an address
    Burn {
        #[arg(long)]
        holder: Address,
        amount: Amount,
    },

    /// Change the burn rate (admin only)
    SetBurnRate {
        #[arg(long)]
        caller: Address,
        /// Basis points, 0-10000
        bps: u32,
    },

    /// Vesting schedule operations
    Schedule {
        #[command(subcommand)]
        schedule: ScheduleCommands,
    },

    /// Dev pool operations
    Pool {
        #[command(subcommand)]
        pool: PoolCommands,
    },

    /// Print journaled events as JSON lines
    Events {
        /// Only events with a sequence number above this
        #[arg(long, default_value = "0")]
        since: u64,
    },
}

#[derive(Subcommand)]
enum ScheduleCommands {
    /// Create a schedule (vesting owner only)
    Create {
        #[arg(long)]
        caller: Address,
        beneficiary: Address,
        amount: Amount,
        #[arg(long)]
        start: Timestamp,
        #[arg(long, default_value = "0")]
        cliff: Timestamp,
        #[arg(long)]
        duration: Timestamp,
    },
    /// Show a schedule and its vested amount
    Show {
        beneficiary: Address,
        /// Evaluation time (defaults to now)
        #[arg(long)]
        now: Option<Timestamp>,
    },
    /// Release vested tokens to the beneficiary
    Release {
        beneficiary: Address,
        #[arg(long)]
        now: Option<Timestamp>,
    },
}

#[derive(Subcommand)]
enum PoolCommands {
    /// Propose a release
    Propose {
        #[arg(long)]
        proposer: Address,
        beneficiary: Address,
        amount: Amount,
        #[arg(long)]
        now: Option<Timestamp>,
    },
    /// Approve a proposal
    Approve {
        id: ProposalId,
        #[arg(long)]
        signer: Address,
    },
    /// Execute a proposal that reached the threshold
    Execute {
        id: ProposalId,
        #[arg(long)]
        now: Option<Timestamp>,
    },
    /// Revoke an open proposal
    Revoke {
        id: ProposalId,
        #[arg(long)]
        signer: Address,
        #[arg(long)]
        now: Option<Timestamp>,
    },
    /// Show one proposal, or all of them
    Show { id: Option<ProposalId> },
}

/// Default filter: `--verbose`, then the deploy config's level, then warn
fn log_directive(verbose: bool, logging: Option<&LoggingConfig>) -> String {
    if verbose {
        "debug".to_string()
    } else {
        logging.map_or_else(|| "warn".to_string(), |l| l.level.clone())
    }
}

fn init_logging(directive: &str, json: bool) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Wall clock seconds, used only when `--now` is omitted
fn resolve_now(now: Option<Timestamp>) -> Timestamp {
    now.unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as Timestamp)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let deploy_config = match &cli.command {
        Commands::Deploy { config, .. } => Some(DeployConfig::load(config)?),
        _ => None,
    };
    let logging = deploy_config.as_ref().map(|c| &c.logging);
    init_logging(
        &log_directive(cli.verbose, logging),
        cli.log_json || logging.is_some_and(LoggingConfig::is_json),
    );

    match cli.command {
        Commands::InitConfig { output } => {
            if output.exists() {
                bail!("{} already exists", output.display());
            }
            std::fs::write(&output, DeployConfig::sample().to_toml()?)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Sample config written to {}", output.display());
        }

        Commands::Deploy { config, force } => {
            let deploy_config =
                deploy_config.with_context(|| format!("loading {}", config.display()))?;
            let lock = state::StateLock::acquire(&cli.state)?;
            if lock.exists() && !force {
                bail!(
                    "state file {} already exists (use --force to redeploy)",
                    cli.state.display()
                );
            }
            let system = deploy(&deploy_config)?;
            lock.save(&system)?;

            let deployment = system.deployment();
            println!("token deployed to: {}", deployment.token);
            println!("vesting deployed to: {}", deployment.vesting);
            println!("devpool deployed to: {}", deployment.dev_pool);
        }

        Commands::Info => {
            let system = state::load(&cli.state)?;
            system.read(|s| {
                println!("Token:        {} ({})", s.ledger.name(), s.ledger.symbol());
                println!("Decimals:     {}", s.ledger.decimals());
                println!("Total supply: {}", s.ledger.total_supply());
                println!("Total burned: {}", s.ledger.total_burned());
                println!("Burn rate:    {} bps", s.ledger.burn_rate_bps());
                println!("Admin:        {}", s.ledger.admin());
                println!();
                println!("Token:        {}", s.deployment.token);
                println!("Vesting:      {}", s.deployment.vesting);
                println!("  reserve:    {}", s.ledger.balance_of(&s.deployment.vesting));
                println!("  committed:  {}", s.vesting.total_committed());
                println!("  schedules:  {}", s.vesting.schedules().count());
                println!("Dev pool:     {}", s.deployment.dev_pool);
                println!("  threshold:  {} of {}", s.dev_pool.threshold(), s.dev_pool.signers().count());
                println!("  proposals:  {}", s.dev_pool.proposals().count());
            });
        }

        Commands::Balance { address } => {
            let system = state::load(&cli.state)?;
            println!("{}", system.balance_of(&address));
        }

        Commands::Transfer { from, to, amount } => {
            let lock = state::StateLock::acquire(&cli.state)?;
            let system = lock.load()?;
            let receipt = system.transfer(from, to, amount).context("transfer failed")?;
            lock.save(&system)?;
            println!(
                "Transferred {} (burned {}, received {})",
                receipt.amount, receipt.burned, receipt.net
            );
        }

        Commands::Burn { holder, amount } => {
            let lock = state::StateLock::acquire(&cli.state)?;
            let system = lock.load()?;
            system.burn(holder, amount).context("burn failed")?;
            lock.save(&system)?;
            println!("Burned {}", amount);
        }

        Commands::SetBurnRate { caller, bps } => {
            let lock = state::StateLock::acquire(&cli.state)?;
            let system = lock.load()?;
            system.set_burn_rate(caller, bps).context("set-burn-rate failed")?;
            lock.save(&system)?;
            println!("Burn rate set to {} bps", bps);
        }

        Commands::Schedule { schedule } => run_schedule(&cli.state, schedule)?,

        Commands::Pool { pool } => run_pool(&cli.state, pool)?,

        Commands::Events { since } => {
            let system = state::load(&cli.state)?;
            for event in system.events_since(since) {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }

    Ok(())
}

/// Deploy and create the configured schedules
fn deploy(config: &DeployConfig) -> Result<TokenSystem> {
    let params = config.deploy_params()?;
    let deployer = params.deployer;
    let system = TokenSystem::deploy(params).context("deployment failed")?;

    for schedule in &config.schedules {
        let beneficiary = config::parse_address(&schedule.beneficiary)?;
        system
            .create_schedule(
                deployer,
                beneficiary,
                schedule.amount,
                schedule.start,
                schedule.cliff,
                schedule.duration,
            )
            .with_context(|| format!("creating schedule for {}", schedule.beneficiary))?;
    }

    tracing::info!(schedules = config.schedules.len(), "Deployment complete");
    Ok(system)
}

fn run_schedule(state_path: &Path, command: ScheduleCommands) -> Result<()> {
    let lock = state::StateLock::acquire(state_path)?;
    let system = lock.load()?;

    match command {
        ScheduleCommands::Create {
            caller,
            beneficiary,
            amount,
            start,
            cliff,
            duration,
        } => {
            system
                .create_schedule(caller, beneficiary, amount, start, cliff, duration)
                .context("create schedule failed")?;
            lock.save(&system)?;
            println!("Schedule created for {}", beneficiary);
        }
        ScheduleCommands::Show { beneficiary, now } => {
            let now = resolve_now(now);
            let Some(schedule) = system.schedule(&beneficiary) else {
                bail!("no schedule for {}", beneficiary);
            };
            println!("Beneficiary: {}", schedule.beneficiary);
            println!("Allocated:   {}", schedule.total_allocated);
            println!("Start:       {}", schedule.start);
            println!("Cliff ends:  {}", schedule.cliff_end());
            println!("Ends:        {}", schedule.end());
            println!("Released:    {}", schedule.released);
            println!("Vested@{}: {}", now, schedule.vested_at(now));
            println!("Releasable:  {}", schedule.releasable_at(now));
        }
        ScheduleCommands::Release { beneficiary, now } => {
            let release = system
                .release(beneficiary, resolve_now(now))
                .context("release failed")?;
            lock.save(&system)?;
            println!(
                "Released {} to {} (burned {}, total released {})",
                release.amount(),
                beneficiary,
                release.receipt.burned,
                release.released_total
            );
        }
    }
    Ok(())
}

fn run_pool(state_path: &Path, command: PoolCommands) -> Result<()> {
    let lock = state::StateLock::acquire(state_path)?;
    let system = lock.load()?;

    match command {
        PoolCommands::Propose {
            proposer,
            beneficiary,
            amount,
            now,
        } => {
            let id = system
                .propose(proposer, beneficiary, amount, resolve_now(now))
                .context("propose failed")?;
            lock.save(&system)?;
            println!("Proposal {} created", id);
        }
        PoolCommands::Approve { id, signer } => {
            let approvals = system.approve(id, signer).context("approve failed")?;
            lock.save(&system)?;
            println!("Proposal {} has {} approval(s)", id, approvals);
        }
        PoolCommands::Execute { id, now } => {
            let result = system.execute_if_ready(id, resolve_now(now));
            // A failed release still marks the proposal executed
            lock.save(&system)?;
            let execution = result.context("execute failed")?;
            println!(
                "Proposal {} executed: released {} (burned {})",
                id,
                execution.release.amount(),
                execution.release.receipt.burned
            );
        }
        PoolCommands::Revoke { id, signer, now } => {
            system
                .revoke(id, signer, resolve_now(now))
                .context("revoke failed")?;
            lock.save(&system)?;
            println!("Proposal {} revoked", id);
        }
        PoolCommands::Show { id } => {
            let proposals: Vec<_> = match id {
                Some(id) => match system.proposal(id) {
                    Some(p) => vec![p],
                    None => bail!("unknown proposal {}", id),
                },
                None => system.read(|s| s.dev_pool.proposals().cloned().collect()),
            };
            for p in proposals {
                let detail = match p.status {
                    ProposalStatus::Executed { executed_at, released } => {
                        format!(" at {} released {}", executed_at, released)
                    }
                    ProposalStatus::Revoked { revoked_by, revoked_at } => {
                        format!(" by {} at {}", revoked_by, revoked_at)
                    }
                    _ => String::new(),
                };
                println!(
                    "#{} {} -> {} amount {} approvals {} [{}{}]",
                    p.id,
                    p.proposer,
                    p.beneficiary,
                    p.amount,
                    p.approvals(),
                    p.status.name(),
                    detail
                );
            }
        }
    }
    Ok(())
}
