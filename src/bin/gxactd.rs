//! gxactd - administrative CLI for the remote two-phase-commit log
//! directory.
//!
//! This binary does not itself participate in a host transaction
//! runtime's commit path (that's [`gxact::Coordinator`] and
//! [`gxact::bridge`], embedded directly into the host process). It only
//! exposes the operational surface: list sets left in flight, and kick
//! off recovery for one of them by hand.

use std::path::PathBuf;
use std::sync::Arc;

use log::info;

use gxact::remote::{RemoteConnection, RemoteConnector, RemoteEndpoint};
use gxact::{admin_surface, Config, Result};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = Config::default();
    let mut list = false;
    let mut cleanup_target: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-root" | "-d" => {
                if i + 1 < args.len() {
                    config = config.data_root(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--list" | "-l" => {
                list = true;
            }
            "--cleanup" | "-c" => {
                if i + 1 < args.len() {
                    cleanup_target = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("gxactd - administer the remote two-phase-commit log directory");
                println!();
                println!("Usage: gxactd [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --data-root DIR   Data root containing extglobalxact (default: .)");
                println!("  -l, --list            List sets left in flight, as JSON");
                println!("  -c, --cleanup FILE    Launch recovery for one in-flight set by file name");
                println!("  -h, --help            Show this help");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let connector: Arc<dyn RemoteConnector> = Arc::new(LiveConnector);
    let admin = admin_surface(&config, connector)?;

    if list {
        println!("{}", admin.list_in_flight_json()?);
    }

    if let Some(filename) = cleanup_target {
        info!("launching recovery for '{}'", filename);
        admin.cleanup(&filename)?;
    }

    if !list && cleanup_target.is_none() {
        println!("nothing to do; pass --list or --cleanup FILE (see --help)");
    }

    Ok(())
}

/// A placeholder [`RemoteConnector`] left for the host to replace with a
/// real driver (`tokio_postgres`, `postgres`, or whatever client the
/// embedding database uses). `gxactd` itself never opens a live remote
/// connection outside of recovery.
struct LiveConnector;

impl RemoteConnector for LiveConnector {
    fn connect(&self, endpoint: &RemoteEndpoint) -> Result<Box<dyn RemoteConnection>> {
        Err(gxact::GxactError::FeatureNotSupported(format!(
            "gxactd was built without a live remote driver; cannot connect to {}",
            endpoint
        )))
    }
}
