use std::process::ExitCode;

use anyhow::Context;
use byte_unit::{Byte, UnitType};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use url::Url;

use dpaper::backend::DeviceClient;
use dpaper::config::{self, Config};
use dpaper::device::{SettingKey, WifiNetworkConfig, WifiSecurity};
use dpaper::matcher;
use dpaper::pairs;
use dpaper::transfer::{DeleteScope, Transfers};
use dpaper::tree::RemoteTreeIndex;
use dpaper::{Error, SyncPolicy};

/// Manage the document library of an e-paper reading device.
#[derive(Debug, Parser)]
#[command(name = "dpaperctl")]
struct Cli {
    /// Device base URL, overriding the configured one
    #[arg(long, global = true)]
    url: Option<Url>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Copy a local file to the device
    Upload {
        local: Utf8PathBuf,
        remote: Utf8PathBuf,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Copy a document from the device, matching partial names
    Download {
        remote: Utf8PathBuf,
        local: Utf8PathBuf,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Reconcile a local directory with a device folder
    Sync {
        local: Utf8PathBuf,
        remote: Utf8PathBuf,
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Run every configured sync pair in order
    Syncpairs {
        #[command(flatten)]
        policy: PolicyArgs,
    },
    /// Delete entries on the device, matching partial names
    Delete {
        remote: Utf8PathBuf,
        /// What to delete when the target is a folder
        #[arg(long, value_enum, default_value_t = ScopeArg::Entry)]
        scope: ScopeArg,
        /// Act on every match when the name matches several entries
        #[arg(long)]
        all_matches: bool,
    },
    /// Create a folder on the device
    Mkdir {
        remote: Utf8PathBuf,
        /// Create missing parent folders as well
        #[arg(short, long)]
        parents: bool,
    },
    /// Print the device content tree
    Tree {
        remote: Option<Utf8PathBuf>,
        /// Folders only
        #[arg(short = 'd', long)]
        folders_only: bool,
    },
    /// List the entries of a device folder
    Ls { remote: Option<Utf8PathBuf> },
    /// Show device storage and battery status
    Status,
    /// Read or change device settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Manage note templates on the device
    Templates {
        #[command(subcommand)]
        command: TemplateCommand,
    },
    /// Manage the device's wifi networks
    Wifi {
        #[command(subcommand)]
        command: WifiCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    Get { key: SettingKey },
    Set { key: SettingKey, value: String },
}

#[derive(Debug, Subcommand)]
enum TemplateCommand {
    /// List the installed templates
    List,
    /// Install a PDF as a new template
    Add { name: String, file: Utf8PathBuf },
    /// Rename an installed template
    Rename { name: String, new_name: String },
    /// Remove an installed template
    Delete { name: String },
}

#[derive(Debug, Subcommand)]
enum WifiCommand {
    /// List the registered networks
    List,
    /// Scan for visible networks
    Scan,
    /// Register a network
    Add {
        ssid: String,
        /// Network security, 'open' or 'psk'
        #[arg(long, default_value_t)]
        security: WifiSecurity,
        /// Passphrase, required for psk networks
        #[arg(long)]
        password: Option<String>,
        /// Use this static address instead of DHCP
        #[arg(long)]
        static_address: Option<String>,
        #[arg(long)]
        gateway: Option<String>,
        #[arg(long)]
        network_mask: Option<u8>,
        #[arg(long)]
        dns1: Option<String>,
        #[arg(long)]
        dns2: Option<String>,
        /// Route through the device's proxy settings
        #[arg(long)]
        proxy: bool,
    },
    /// Forget a registered network
    Delete {
        ssid: String,
        #[arg(long, default_value_t)]
        security: WifiSecurity,
    },
    /// Turn the wifi radio on
    On,
    /// Turn the wifi radio off
    Off,
}

/// What to do with entries present on both sides. At most one; the default
/// is to leave them alone.
#[derive(Debug, Args)]
#[group(multiple = false)]
struct PolicyArgs {
    /// Leave entries present on both sides untouched (default)
    #[arg(long)]
    skip: bool,
    /// The local copy overwrites the device copy
    #[arg(long)]
    local_wins: bool,
    /// The device copy overwrites the local copy
    #[arg(long)]
    remote_wins: bool,
    /// The more recently modified copy wins
    #[arg(long)]
    newer: bool,
}

impl PolicyArgs {
    fn policy(&self) -> Option<SyncPolicy> {
        if self.skip {
            Some(SyncPolicy::Skip)
        } else if self.local_wins {
            Some(SyncPolicy::LocalWins)
        } else if self.remote_wins {
            Some(SyncPolicy::RemoteWins)
        } else if self.newer {
            Some(SyncPolicy::Newer)
        } else {
            None
        }
    }

    fn policy_or_default(&self) -> SyncPolicy {
        self.policy().unwrap_or(SyncPolicy::Skip)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    /// The named document or empty folder only
    Entry,
    /// Documents directly inside the folder
    Files,
    /// Everything inside the folder, keeping the folder
    Contents,
    /// The folder and everything inside it
    All,
}

impl From<ScopeArg> for DeleteScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Entry => DeleteScope::SingleEntry,
            ScopeArg::Files => DeleteScope::FilesOnly,
            ScopeArg::Contents => DeleteScope::ContentsRecursive,
            ScopeArg::All => DeleteScope::FullRecursive,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("interrupted, stopping after the current operation");
                cancel.cancel();
            }
        });
    }

    let client = connect(cli.url)?;
    run(cli.command, client, &cancel).await
}

fn connect(url_override: Option<Url>) -> anyhow::Result<DeviceClient> {
    let url = match url_override {
        Some(url) => url,
        None => {
            let config_file = config::config_file()?;
            let config = Config::load_from_file(&config_file)
                .with_context(|| format!("no --url given and {config_file} not usable"))?;
            let device = config
                .device
                .context("no device configured, run with --url or fill in the config file")?;
            device
                .url
                .parse::<Url>()
                .with_context(|| format!("configured device URL '{}'", device.url))?
        }
    };
    Ok(DeviceClient::new(url)?)
}

async fn run(
    command: Command,
    client: DeviceClient,
    cancel: &CancellationToken,
) -> anyhow::Result<ExitCode> {
    let transfers = Transfers::new(client.clone());
    match command {
        Command::Upload {
            local,
            remote,
            policy,
        } => {
            transfers
                .upload_file(&local, &remote, policy.policy_or_default(), cancel)
                .await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Download {
            remote,
            local,
            policy,
        } => download(&transfers, &remote, &local, policy.policy_or_default(), cancel).await,
        Command::Sync {
            local,
            remote,
            policy,
        } => {
            let reconciler = dpaper::reconcile::Reconciler::new(client);
            let summary = reconciler
                .run(&local, &remote, policy.policy_or_default(), cancel)
                .await?;
            println!("{summary}");
            Ok(exit_for(summary.is_clean()))
        }
        Command::Syncpairs { policy } => {
            let pairs_file = config::pairs_file()?;
            let pairs = config::load_pairs(&pairs_file)?;
            if pairs.is_empty() {
                println!("no sync pairs configured in {pairs_file}");
                return Ok(ExitCode::SUCCESS);
            }
            let summary = pairs::sync_all(client, &pairs, policy.policy(), cancel).await?;
            print!("{summary}");
            Ok(exit_for(summary.is_clean()))
        }
        Command::Delete {
            remote,
            scope,
            all_matches,
        } => delete(&transfers, &remote, scope.into(), all_matches, cancel).await,
        Command::Mkdir { remote, parents } => {
            if parents {
                transfers.ensure_folders(&remote, cancel).await?;
            } else {
                transfers.mkdir(&remote, cancel).await?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Tree {
            remote,
            folders_only,
        } => {
            let root = remote.unwrap_or_default();
            let index = RemoteTreeIndex::snapshot(&client, &root, cancel).await?;
            print!("{}", index.render(&root, folders_only)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Ls { remote } => {
            let folder = remote.unwrap_or_default();
            use dpaper::RemoteContentService;
            for node in client.list_children(&folder, cancel).await? {
                match (node.size(), node.mtime()) {
                    (Some(size), Some(mtime)) => {
                        let size = Byte::from_u64(size).get_appropriate_unit(UnitType::Binary);
                        println!("{:10.1}  {}  {}", size, mtime.format("%Y-%m-%d %H:%M"), node.name());
                    }
                    _ => println!("{:>10}  {:>16}  {}/", "-", "-", node.name()),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let storage = client.storage(cancel).await?;
            let battery = client.battery(cancel).await?;
            let firmware = client.firmware_version(cancel).await?;
            let mac = client.mac_address(cancel).await?;
            let used = Byte::from_u64(storage.used()).get_appropriate_unit(UnitType::Binary);
            let capacity = Byte::from_u64(storage.capacity).get_appropriate_unit(UnitType::Binary);
            println!("storage:  {used:.1} used of {capacity:.1}");
            println!(
                "battery:  {}%{} ({})",
                battery.level,
                if battery.plugged { ", plugged in" } else { "" },
                battery.health
            );
            println!("firmware: {firmware}");
            println!("mac:      {mac}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Config { command } => {
            match command {
                ConfigCommand::Get { key } => {
                    println!("{}", client.get_setting(key, cancel).await?);
                }
                ConfigCommand::Set { key, value } => {
                    client.set_setting(key, &value, cancel).await?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Templates { command } => {
            match command {
                TemplateCommand::List => {
                    for template in client.list_templates(cancel).await? {
                        println!("{}", template.name);
                    }
                }
                TemplateCommand::Add { name, file } => {
                    if file.extension() != Some("pdf") {
                        anyhow::bail!("templates must be PDF files, got {file}");
                    }
                    let data = tokio::fs::File::open(&file)
                        .await
                        .with_context(|| format!("opening {file}"))?;
                    client.add_template(&name, data, cancel).await?;
                }
                TemplateCommand::Rename { name, new_name } => {
                    client.rename_template(&name, &new_name, cancel).await?;
                }
                TemplateCommand::Delete { name } => {
                    client.delete_template(&name, cancel).await?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Wifi { command } => {
            match command {
                WifiCommand::List => {
                    for ap in client.wifi_networks(cancel).await? {
                        println!("{}  ({})", ap.ssid, ap.security);
                    }
                }
                WifiCommand::Scan => {
                    for ap in client.scan_wifi(cancel).await? {
                        println!("{}  ({})", ap.ssid, ap.security);
                    }
                }
                WifiCommand::Add {
                    ssid,
                    security,
                    password,
                    static_address,
                    gateway,
                    network_mask,
                    dns1,
                    dns2,
                    proxy,
                } => {
                    let network = WifiNetworkConfig {
                        ssid,
                        security,
                        password,
                        dhcp: static_address.is_none(),
                        static_address,
                        gateway,
                        network_mask,
                        dns1,
                        dns2,
                        proxy,
                    };
                    client.add_wifi_network(&network, cancel).await?;
                }
                WifiCommand::Delete { ssid, security } => {
                    client.delete_wifi_network(&ssid, security, cancel).await?;
                }
                WifiCommand::On => client.set_wifi_enabled(true, cancel).await?,
                WifiCommand::Off => client.set_wifi_enabled(false, cancel).await?,
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Partial-name download. Several matches go into `local` as a directory.
async fn download(
    transfers: &Transfers<DeviceClient>,
    remote: &Utf8Path,
    local: &Utf8Path,
    policy: SyncPolicy,
    cancel: &CancellationToken,
) -> anyhow::Result<ExitCode> {
    let index = RemoteTreeIndex::snapshot(transfers.remote(), Utf8Path::new(""), cancel).await?;
    let matches = matcher::resolve_fragment(&index, remote)?;
    let mut failures = 0;
    if matches.len() == 1 && !local.is_dir() {
        transfers
            .download_file(matches[0].path(), local, policy, cancel)
            .await?;
    } else {
        for node in &matches {
            let target = local.join(node.name());
            if let Err(err) = transfers
                .download_file(node.path(), &target, policy, cancel)
                .await
            {
                if err.is_cancelled() {
                    anyhow::bail!(err);
                }
                log::error!("{}: {err}", node.path());
                failures += 1;
            }
        }
    }
    Ok(exit_for(failures == 0))
}

/// Partial-name delete. More than one match needs `--all-matches`.
async fn delete(
    transfers: &Transfers<DeviceClient>,
    remote: &Utf8Path,
    scope: DeleteScope,
    all_matches: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<ExitCode> {
    let index = RemoteTreeIndex::snapshot(transfers.remote(), Utf8Path::new(""), cancel).await?;
    let matches = matcher::resolve_fragment(&index, remote)?;
    if matches.len() > 1 && !all_matches {
        let fragment = remote.file_name().unwrap_or("");
        eprintln!("{}", matcher::ambiguity_error(fragment, &matches));
        eprintln!("pass --all-matches to delete all of them");
        return Ok(ExitCode::FAILURE);
    }
    let mut failures = 0;
    for node in &matches {
        if let Err(err) = transfers.delete(node.path(), scope, cancel).await {
            if err.is_cancelled() {
                anyhow::bail!(Error::Cancelled);
            }
            log::error!("{}: {err}", node.path());
            failures += 1;
        }
    }
    Ok(exit_for(failures == 0))
}

fn exit_for(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
