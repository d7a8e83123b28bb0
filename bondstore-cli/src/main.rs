mod replay;

use std::path::{Path, PathBuf};

use bondstore::ble::{BondEvent, bond_type};
use bondstore::{
    Address, BondKind, BondRecord, Config, EventBridge, Field, FileStorage, SecretBridge,
    ADDR_TYPE_PUBLIC,
};
use log::{info, warn};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(clap::Parser)]
#[command(name = "bondctl")]
#[command(about = "Inspect and maintain a BLE bonding keystore")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List stored bonds
    List {
        /// Only this kind: own, peer or cccd
        #[arg(long)]
        kind: Option<BondKind>,
    },
    /// Delete one bond
    Delete {
        #[arg(long)]
        kind: BondKind,
        /// Peer address, AA:BB:CC:DD:EE:FF
        #[arg(long)]
        addr: Address,
        /// 0 public, 1 random
        #[arg(long, default_value_t = ADDR_TYPE_PUBLIC)]
        addr_type: u8,
        /// Characteristic value handle (cccd only)
        #[arg(long)]
        handle: Option<u16>,
    },
    /// Forget every bond
    Clear,
    /// Feed a JSON-lines event trace through the bridge
    Replay {
        file: PathBuf,
        /// Replay as get/set-secret events against the secrets file
        #[arg(long)]
        secrets: bool,
    },
    /// List stored secrets
    Secrets,
}

fn main() {
    env_logger::init();
    let cli: Cli = clap::Parser::parse();

    if let Err(e) = run(cli) {
        eprintln!("bondctl: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult {
    let home = bondstore::bondstore_home()?;
    let config = Config::load_or_create(&home)?;
    info!("Using {}", home.display());

    match cli.command {
        Commands::List { kind } => list(&config, &home, kind),
        Commands::Delete { kind, addr, addr_type, handle } => {
            delete(&config, &home, kind, addr, addr_type, handle)
        }
        Commands::Clear => clear(&config, &home),
        Commands::Replay { file, secrets: false } => replay_bonds(&config, &home, &file),
        Commands::Replay { file, secrets: true } => replay_secrets(&config, &home, &file),
        Commands::Secrets => secrets(&config, &home),
    }
}

fn open(config: &Config, home: &Path) -> EventBridge<FileStorage> {
    EventBridge::open(FileStorage::new(config.store_path(home)), config.queue_depth)
}

fn key_len(key: &Option<Vec<u8>>) -> String {
    match key {
        Some(k) => format!("{} bytes", k.len()),
        None => "-".to_string(),
    }
}

fn list(config: &Config, home: &Path, kind: Option<BondKind>) -> CliResult {
    let bridge = open(config, home);
    let kinds = match kind {
        Some(k) => vec![k],
        None => BondKind::ALL.to_vec(),
    };

    for kind in kinds {
        let records = bridge.store().records(kind);
        println!("{kind}: {} record(s)", records.len());
        for record in records {
            match record {
                BondRecord::OwnSecurity(r) | BondRecord::PeerSecurity(r) => println!(
                    "  {} type={} key_size={} ediv={} ltk={} irk={} csrk={} authenticated={} sc={}",
                    r.address,
                    r.address_type,
                    r.key_size,
                    r.ediv.map_or("-".to_string(), |e| e.to_string()),
                    key_len(&r.long_term_key),
                    key_len(&r.identity_resolving_key),
                    key_len(&r.signing_key),
                    r.authenticated,
                    r.secure_connection,
                ),
                BondRecord::Cccd(r) => println!(
                    "  {} type={} handle={:#06x} flags={:#x} value_changed={}",
                    r.address,
                    r.address_type,
                    r.characteristic_value_handle,
                    r.flags,
                    r.value_changed,
                ),
            }
        }
    }
    Ok(())
}

fn delete(
    config: &Config,
    home: &Path,
    kind: BondKind,
    addr: Address,
    addr_type: u8,
    handle: Option<u16>,
) -> CliResult {
    let mut bridge = open(config, home);
    let fields: Vec<Field> = vec![
        kind.discriminator().into(),
        addr_type.into(),
        addr.to_bytes().into(),
        Field::None,
        Field::None,
        handle.into(),
    ];

    match bridge.handle(BondEvent::Delete.code(), &fields)? {
        Some(_) => {
            bridge.run_pending()?;
            println!("Deleted {kind} bond for {addr}");
        }
        None => println!("No {kind} bond for {addr}"),
    }
    Ok(())
}

fn clear(config: &Config, home: &Path) -> CliResult {
    let mut bridge = open(config, home);
    bridge.clear();
    bridge.run_pending()?;
    println!("Cleared {}", config.store_path(home).display());
    Ok(())
}

fn replay_bonds(config: &Config, home: &Path, file: &Path) -> CliResult {
    let events = replay::parse(&std::fs::read_to_string(file)?)?;
    let mut bridge = open(config, home);

    for ev in events {
        match bridge.handle(ev.event, &ev.fields) {
            Ok(Some(reply)) => println!("{}: {} -> {}", ev.line, ev.event, replay::describe(&reply)),
            Ok(None) => println!("{}: {} -> none", ev.line, ev.event),
            Err(e) => warn!("line {}: {e}", ev.line),
        }
        bridge.run_pending()?;
    }

    let store = bridge.store();
    println!(
        "{} own, {} peer, {} cccd",
        store.len(BondKind::OwnSecurity),
        store.len(BondKind::PeerSecurity),
        store.len(BondKind::ClientConfigDescriptor)
    );
    Ok(())
}

fn replay_secrets(config: &Config, home: &Path, file: &Path) -> CliResult {
    let events = replay::parse(&std::fs::read_to_string(file)?)?;
    let storage = FileStorage::new(config.secrets_path(home));
    let mut bridge = SecretBridge::open(storage, config.queue_depth);

    for ev in events {
        match bridge.handle(ev.event, &ev.fields) {
            Ok(Some(reply)) => println!("{}: {} -> {}", ev.line, ev.event, replay::describe(&[reply])),
            Ok(None) => println!("{}: {} -> none", ev.line, ev.event),
            Err(e) => warn!("line {}: {e}", ev.line),
        }
        bridge.run_pending()?;
    }
    println!("{} secret(s)", bridge.secrets().len());
    Ok(())
}

fn secrets(config: &Config, home: &Path) -> CliResult {
    let storage = FileStorage::new(config.secrets_path(home));
    let bridge = SecretBridge::open(storage, config.queue_depth);

    println!("{} secret(s)", bridge.secrets().len());
    for (sec_type, key, value) in bridge.secrets().iter() {
        let kind = match i64::from(sec_type) {
            bond_type::OUR_SEC => "own",
            bond_type::PEER_SEC => "peer",
            bond_type::CCCD => "cccd",
            _ => "other",
        };
        println!("  type={sec_type} ({kind}) key={} bytes value={} bytes", key.len(), value.len());
    }
    Ok(())
}
