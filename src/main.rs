use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, LevelFilter};

use wifi_oxide::attack::BeaconMode;
use wifi_oxide::interface::{DriverError, PortalService, SettingsStore, StatusDisplay};
use wifi_oxide::status::{MessageLog, MessageType, StatusLogger, StatusMessage};

#[derive(Parser)]
#[command(name = "wifi_oxide")]
#[command(author, version, about = "80211 attack and reconnaissance engine")]
struct Arguments {
    /// Monitor mode interface to use
    #[arg(short, long)]
    interface: String,

    /// ISO 3166 country code for the capture channel list
    #[arg(long, default_value = "US")]
    country: String,

    /// Milliseconds between beacon rounds
    #[arg(long, default_value_t = 100)]
    broadcast_speed: u64,

    /// Seconds to scan for access points before acting
    #[arg(long, default_value_t = 15)]
    scan_time: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan and list access points
    Scan,

    /// Sniff for stations talking to the scanned APs
    Stations,

    /// Deauthenticate clients. With no target every scanned AP is hit
    Deauth {
        /// Scan indices of the APs to attack, first one is primary
        #[arg(short, long, value_delimiter = ',')]
        targets: Vec<usize>,

        /// Attack every BSSID advertising this SSID
        #[arg(long)]
        ssid: Option<String>,

        /// Sniff for stations this many seconds before attacking
        #[arg(long, default_value_t = 10)]
        listen: u64,
    },

    /// Broadcast fake beacons
    Beacon {
        /// Single SSID to advertise
        #[arg(long)]
        ssid: Option<String>,

        /// Random 8 character SSIDs
        #[arg(long)]
        random: bool,

        #[arg(long)]
        rickroll: bool,

        /// Replay the SSIDs of scanned APs
        #[arg(long)]
        replay: bool,

        /// Cycle through these SSIDs
        #[arg(long, value_delimiter = ',')]
        list: Vec<String>,
    },

    /// Flood a WPA3 AP with SAE commits
    Sae {
        /// Scan index of the target AP
        target: usize,

        /// Password the commits are derived from
        #[arg(short, long, default_value = "password")]
        password: String,
    },

    /// Answer probe requests and rotate the soft AP through probed SSIDs
    Karma {
        /// Only answer for these SSIDs
        #[arg(long, value_delimiter = ',')]
        ssids: Vec<String>,
    },

    /// Show signal strength of an AP or one of its stations
    Track {
        /// Scan index of the AP
        target: usize,

        /// Index of a discovered station to track instead of the AP
        #[arg(long)]
        station: Option<usize>,

        /// Sniff for stations this many seconds before tracking one
        #[arg(long, default_value_t = 10)]
        listen: u64,
    },

    /// Hop channels without attacking
    Hop {
        /// Stay on this channel instead of hopping
        #[arg(long)]
        channel: Option<u8>,

        /// Hop every common channel instead of the country list
        #[arg(long)]
        live: bool,
    },
}

struct CliSettings {
    broadcast_speed: Duration,
    country: String,
}

impl SettingsStore for CliSettings {
    fn broadcast_speed(&self) -> Duration {
        self.broadcast_speed
    }

    fn wifi_country(&self) -> String {
        self.country.clone()
    }

    fn station_credentials(&self) -> Option<(String, String)> {
        None
    }
}

/// No web server ships with the CLI.
struct NullPortal;

impl PortalService for NullPortal {
    fn start_portal(
        &self,
        _content_ref: &str,
        _ssid: &str,
        _password: &str,
        _ap_ssid: &str,
        _domain: &str,
    ) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("captive portal"))
    }

    fn stop_portal(&self) {}

    fn is_active(&self) -> bool {
        false
    }
}

struct ConsoleDisplay {
    log: Arc<Mutex<MessageLog>>,
}

impl ConsoleDisplay {
    fn add(&self, message_type: MessageType, content: String) {
        if let Ok(mut log) = self.log.lock() {
            log.add_message(StatusMessage::new(message_type, content));
        }
    }
}

impl StatusDisplay for ConsoleDisplay {
    fn show_attack(&self, name: &str, target: &str) {
        self.add(MessageType::Priority, format!("{name} => {target}"));
    }

    fn show_status(&self, line: &str) {
        self.add(MessageType::Status, line.to_string());
    }
}

fn beacon_mode(
    ssid: Option<String>,
    random: bool,
    rickroll: bool,
    replay: bool,
    list: &[String],
) -> Result<BeaconMode> {
    Ok(match (ssid, random, rickroll, replay, list.is_empty()) {
        (Some(ssid), false, false, false, true) => BeaconMode::StaticSsid(ssid),
        (None, true, false, false, true) => BeaconMode::RandomSsid,
        (None, false, true, false, true) => BeaconMode::RickrollLyricsCycle,
        (None, false, false, true, true) => BeaconMode::ReplayScannedSsids,
        (None, false, false, false, false) => BeaconMode::SavedList,
        _ => bail!("pick exactly one of --ssid, --random, --rickroll, --replay or --list"),
    })
}

/// Sleep until Ctrl-C or, when given, `limit` runs out.
fn wait(running: &AtomicBool, limit: Option<Duration>) {
    let started = Instant::now();
    while running.load(Ordering::SeqCst) {
        if limit.is_some_and(|limit| started.elapsed() >= limit) {
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(target_os = "linux")]
fn main() -> Result<()> {
    use nix::net::if_::if_nametoindex;
    use wifi_oxide::oui::OuiLookup;
    use wifi_oxide::radio::MonitorRadio;
    use wifi_oxide::{Collaborators, Engine, EngineConfig};

    let args = Arguments::parse();

    let message_log = Arc::new(Mutex::new(MessageLog::new(true, None)));
    let level = if args.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    StatusLogger::new(message_log.clone(), level)
        .install()
        .context("installing logger")?;
    info!("Starting...");

    let ifindex = if_nametoindex(args.interface.as_str())
        .with_context(|| format!("no interface named {}", args.interface))?;
    let radio = MonitorRadio::open(ifindex as i32).map_err(|e| anyhow!(e))?;

    let collaborators = Collaborators {
        radio: Arc::new(radio),
        vendors: Arc::new(OuiLookup::new().map_err(|e| anyhow!(e))?),
        portal: Arc::new(NullPortal),
        settings: Arc::new(CliSettings {
            broadcast_speed: Duration::from_millis(args.broadcast_speed),
            country: args.country.clone(),
        }),
        display: Arc::new(ConsoleDisplay {
            log: message_log.clone(),
        }),
    };
    let engine = Engine::new(collaborators, EngineConfig::default());

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    if let Command::Hop { channel, live } = args.command {
        match (channel, live) {
            (Some(channel), _) => engine.set_fixed_channel(channel)?,
            (None, true) => engine.start_live_ap_hop()?,
            (None, false) => engine.start_capture_hop()?,
        }
        wait(&running, None);
        engine.stop_all();
        return Ok(());
    }

    engine.start_scan(Duration::from_secs(args.scan_time))?;
    engine.stop_scan()?;

    match args.command {
        Command::Scan => {}
        Command::Stations => {
            engine.start_station_scan()?;
            wait(&running, None);
        }
        Command::Deauth {
            targets,
            ssid,
            listen,
        } => {
            if !targets.is_empty() {
                engine.select_multiple_aps(&targets)?;
            }
            engine.start_station_scan()?;
            wait(&running, Some(Duration::from_secs(listen)));
            engine.stop_monitor_mode();

            match ssid {
                Some(ssid) => engine.start_deauth_ssid(&ssid)?,
                None => engine.start_deauth()?,
            }
            wait(&running, None);
        }
        Command::Beacon {
            ssid,
            random,
            rickroll,
            replay,
            list,
        } => {
            let mode = beacon_mode(ssid, random, rickroll, replay, &list)?;
            if let Ok(mut beacon_list) = engine.beacon_list().lock() {
                for entry in &list {
                    beacon_list.add(entry)?;
                }
                if !list.is_empty() {
                    beacon_list.show();
                }
            }
            engine.start_beacon(mode)?;
            wait(&running, None);
        }
        Command::Sae { target, password } => {
            engine.select_ap(target)?;
            engine.start_sae_flood(&password)?;
            wait(&running, None);
        }
        Command::Karma { ssids } => {
            if !ssids.is_empty() {
                engine.set_karma_ssids(&ssids);
            }
            engine.start_karma()?;
            wait(&running, None);
        }
        Command::Track {
            target,
            station,
            listen,
        } => {
            engine.select_ap(target)?;
            match station {
                Some(index) => {
                    engine.start_station_scan()?;
                    wait(&running, Some(Duration::from_secs(listen)));
                    engine.stop_monitor_mode();
                    engine.select_station(index)?;
                    engine.track_sta()?;
                }
                None => engine.track_ap()?,
            }
            wait(&running, None);
        }
        Command::Hop { .. } => {}
    }

    engine.stop_all();
    info!("Done.");
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn main() -> Result<()> {
    bail!("wifi_oxide needs a Linux monitor mode interface")
}
