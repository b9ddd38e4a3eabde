//! goldchainc: queries the custody-fee endpoints of a running daemon.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use api::PluginClient;
use lib_types::CoinOutputId;

#[derive(Parser)]
#[command(name = "goldchainc")]
#[command(about = "Goldchain custody-fee command line client")]
struct Cli {
    /// Address the daemon's API listens on
    #[arg(long, default_value = "http://localhost:23110")]
    addr: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query the consensus custody-fee endpoints
    Consensus {
        #[command(subcommand)]
        command: CoinOutputCommand,
    },
    /// Query the explorer custody-fee endpoints
    Explorer {
        #[command(subcommand)]
        command: ExplorerCommand,
    },
}

#[derive(Subcommand)]
enum CoinOutputCommand {
    /// Get all the custody-related info for a coin output
    Custodyfeeinfo(CustodyFeeInfoArgs),
}

#[derive(Subcommand)]
enum ExplorerCommand {
    /// Get all the custody-related info for a coin output
    Custodyfeeinfo(CustodyFeeInfoArgs),
    /// Get the latest chain facts
    Chainfacts {
        #[arg(long, value_enum, default_value_t = Encoding::Human)]
        encoding: Encoding,
    },
}

#[derive(clap::Args)]
struct CustodyFeeInfoArgs {
    /// The coin output id to look up
    id: String,

    /// Compute the fee for a specific timestamp
    #[arg(long, conflicts_with = "height")]
    time: Option<u64>,

    /// Compute the fee for the timestamp of a specific block height
    #[arg(long)]
    height: Option<u64>,

    /// Do not compute the fee and spendable value as part of the result
    #[arg(long = "no-fee")]
    no_fee: bool,

    #[arg(long, value_enum, default_value_t = Encoding::Human)]
    encoding: Encoding,
}

#[derive(Clone, Copy, ValueEnum)]
enum Encoding {
    /// Indented JSON
    Human,
    /// Compact JSON
    Json,
}

fn print_encoded(value: &impl Serialize, encoding: Encoding) -> Result<()> {
    let rendered = match encoding {
        Encoding::Human => serde_json::to_string_pretty(value)?,
        Encoding::Json => serde_json::to_string(value)?,
    };
    println!("{rendered}");
    Ok(())
}

fn custody_fee_info(client: &PluginClient, args: &CustodyFeeInfoArgs) -> Result<()> {
    let id: CoinOutputId = args
        .id
        .parse()
        .with_context(|| format!("error while decoding coin output id {:?}", args.id))?;
    if args.no_fee {
        let info = client
            .coin_output_info_pre_computation(&id)
            .context("error while getting coin output custody-related info")?;
        return print_encoded(&info, args.encoding);
    }
    let info = match (args.time, args.height) {
        (Some(time), _) => client.coin_output_info_on(&id, time),
        (None, Some(height)) => client.coin_output_info_at(&id, height),
        (None, None) => client.coin_output_info(&id),
    }
    .context("error while getting coin output custody-related info")?;
    print_encoded(&info, args.encoding)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Consensus { command: CoinOutputCommand::Custodyfeeinfo(args) } => {
            let client = PluginClient::new_consensus_client(cli.addr);
            custody_fee_info(&client, &args)
        }
        Command::Explorer { command } => {
            let client = PluginClient::new_explorer_client(cli.addr);
            match command {
                ExplorerCommand::Custodyfeeinfo(args) => custody_fee_info(&client, &args),
                ExplorerCommand::Chainfacts { encoding } => {
                    let facts = client.chain_facts().context("failed to get chain facts")?;
                    print_encoded(&facts, encoding)
                }
            }
        }
    }
}
