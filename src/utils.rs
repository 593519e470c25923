use chrono::Local;
use env_logger::{Builder, Env, Target};
use log::warn;
use std::fs::OpenOptions;
use std::future::Future;
use std::io::Write;
use std::path::Path;

/// Sets up the global logger. `RUST_LOG` takes precedence over `verbose`.
pub fn init_logging(log_file: Option<&Path>, verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(default_level));

    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} {:<5} {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

/// Escapes control and non-ASCII characters so client input can be logged.
pub fn safe_log_string(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\0' => result.push_str("\\0"),
            '\r' => result.push_str("\\r"),
            '\n' => result.push_str("\\n"),
            '\t' | ' ' => result.push(c),
            c if c.is_ascii_graphic() => result.push(c),
            c if c.is_ascii_control() => result.push_str(&format!("\\x{:02x}", c as u32)),
            c => result.push_str(&format!("\\u{{{:x}}}", c as u32)),
        }
    }
    result
}

/// Resolves when `signal` fires. If its handler cannot be installed the error
/// is logged and this never resolves, so the server keeps running.
pub async fn wait_for_signal<F>(name: &str, signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Cannot listen for {}: {}", name, e);
        std::future::pending::<()>().await;
    }
}
