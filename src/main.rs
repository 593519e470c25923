use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};
use structopt::StructOpt;

use smtp_mailbox::{daemon, utils, Opt, SmtpServer};

fn main() -> Result<()> {
    let opt = Opt::from_args();

    // Fork before any runtime threads exist.
    if opt.daemon {
        daemon::daemonize(&opt.pid_file)?;
    }

    utils::init_logging(opt.log_file.as_deref(), opt.verbose)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(opt))
}

async fn run(opt: Opt) -> Result<()> {
    let config = opt.server_config();

    info!("smtp-mailbox v{}", env!("CARGO_PKG_VERSION"));
    info!("PID: {}", std::process::id());
    info!("Mailbox directory: {:?}", config.mailbox_dir);
    info!("Sequencing: {:?}", config.sequencing);
    if config.routes.is_empty() {
        warn!("No --route given, no mail will be stored");
    } else {
        info!("{} domain route(s) loaded", config.routes.len());
    }

    let server = Arc::new(SmtpServer::new(config));
    let listener = server.bind().await?;
    server.run(listener, shutdown_signal()).await
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = utils::wait_for_signal("interrupt", tokio::signal::ctrl_c());
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {}", e);
            interrupt.await;
            info!("Received interrupt signal, shutting down...");
            return;
        }
    };

    tokio::select! {
        () = interrupt => info!("Received interrupt signal, shutting down..."),
        Some(()) = terminate.recv() => info!("Received SIGTERM, shutting down..."),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    utils::wait_for_signal("interrupt", tokio::signal::ctrl_c()).await;
    info!("Received interrupt signal, shutting down...");
}
