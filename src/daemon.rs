use std::path::Path;

/// Detaches from the terminal. Must run before the tokio runtime is built,
/// since forking only carries the calling thread into the child.
#[cfg(unix)]
pub fn daemonize(pid_file: &Path) -> anyhow::Result<()> {
    use daemonize::Daemonize;

    eprintln!("[INFO] Starting daemon mode, PID file {:?}", pid_file);

    Daemonize::new()
        .pid_file(pid_file)
        .chown_pid_file(true)
        .working_directory(".")
        .start()
        .map_err(|e| anyhow::anyhow!("Failed to start daemon mode: {}", e))
}

#[cfg(not(unix))]
pub fn daemonize(_pid_file: &Path) -> anyhow::Result<()> {
    eprintln!("[INFO] Daemon mode not supported on this platform, staying in foreground");
    Ok(())
}
