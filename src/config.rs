use std::path::PathBuf;

use structopt::StructOpt;

use crate::routing::{RouteEntry, RouteTable};
use crate::session::Sequencing;

#[derive(Debug, StructOpt, Clone)]
#[structopt(
    name = "smtp-mailbox",
    about = "A minimal SMTP server storing mail for locally routed domains"
)]
pub struct Opt {
    /// Run as daemon
    #[structopt(short = "d", long = "daemon")]
    pub daemon: bool,

    /// PID file written in daemon mode
    #[structopt(long = "pid-file", default_value = "/tmp/smtp-mailbox.pid", parse(from_os_str))]
    pub pid_file: PathBuf,

    /// Listening port
    #[structopt(short = "p", long = "port", default_value = "1025")]
    pub port: u16,

    /// Listening address
    #[structopt(short = "a", long = "address", default_value = "127.0.0.1")]
    pub address: String,

    /// Domain route as domain=target, where a target of "local" stores mail
    /// on disk (can be specified multiple times)
    #[structopt(long = "route", number_of_values = 1)]
    pub routes: Vec<RouteEntry>,

    /// Root directory of the local mailboxes
    #[structopt(long = "mailbox", default_value = "mailbox", parse(from_os_str))]
    pub mailbox_dir: PathBuf,

    /// Reject out-of-order commands with 503
    #[structopt(long = "strict")]
    pub strict: bool,

    /// Log file path
    #[structopt(long = "logs", parse(from_os_str))]
    pub log_file: Option<PathBuf>,

    /// Verbose mode - log every command and reply
    #[structopt(short = "v", long = "verbose")]
    pub verbose: bool,
}

impl Opt {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            address: self.address.clone(),
            port: self.port,
            mailbox_dir: self.mailbox_dir.clone(),
            routes: self.routes.iter().cloned().collect(),
            sequencing: if self.strict {
                Sequencing::Strict
            } else {
                Sequencing::Lenient
            },
        }
    }
}

/// Everything the server needs, fixed at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
    pub mailbox_dir: PathBuf,
    pub routes: RouteTable,
    pub sequencing: Sequencing,
}

impl ServerConfig {
    pub fn new(routes: RouteTable, mailbox_dir: impl Into<PathBuf>) -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 1025,
            mailbox_dir: mailbox_dir.into(),
            routes,
            sequencing: Sequencing::default(),
        }
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
