//! `srv` command line server

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use srv::{limits, PathPolicy, Server, ServerConfig, DOCUMENT_ROOT_DEFAULT, INDEX_DEFAULT};

// used by the library only
use {ascii as _, chrono as _, httpdate as _, lazy_static as _, mio as _, socket2 as _};

/// Serves static files below a document root
#[derive(Parser, Debug)]
#[command(name = "srv", version, about)]
struct Args {
    /// Port to listen on, repeat for several listeners
    #[arg(short, long = "port", default_value = "80", env = "SRV_PORT")]
    ports: Vec<u16>,

    /// Address the listeners bind to
    #[arg(long, default_value = "0.0.0.0", env = "SRV_BIND")]
    bind: IpAddr,

    /// Document root
    #[arg(short, long, default_value = DOCUMENT_ROOT_DEFAULT, env = "SRV_ROOT")]
    root: PathBuf,

    /// File served for directory requests
    #[arg(long, default_value = INDEX_DEFAULT)]
    index: String,

    /// Number of worker threads
    #[arg(long, default_value_t = limits::WORKERS_DEFAULT)]
    workers: usize,

    /// Maximum of concurrently open connections
    #[arg(long, default_value_t = limits::CONNECTION_LIMIT_DEFAULT)]
    connections: usize,

    /// Resolve `.` and `..` like plain path text instead of keeping paths below the root
    #[arg(long)]
    compat_paths: bool,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let bind = self.bind;
        ServerConfig {
            addr: self
                .ports
                .into_iter()
                .map(|port| SocketAddr::new(bind, port))
                .collect(),
            document_root: self.root,
            index: self.index,
            workers: self.workers,
            connection_limit: self.connections,
            path_policy: if self.compat_paths {
                PathPolicy::Compatible
            } else {
                PathPolicy::Contained
            },
            ..ServerConfig::default()
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    log::debug!("{args:?}");

    match Server::new(args.into_config()) {
        Ok(server) => {
            log::info!("serving on {:?}", server.local_addrs());
            server.join();
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("server start failed: {err}");
            eprintln!("srv: {err}");
            ExitCode::FAILURE
        }
    }
}
