use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::{debug, error, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio::time;

use crate::config::ServerConfig;
use crate::interpreter::{Interpreter, Next};
use crate::mailstore::MailStore;
use crate::reply::Reply;
use crate::session::Session;
use crate::utils::safe_log_string;

const ACCEPT_ERROR_PAUSE: Duration = Duration::from_millis(100);

pub struct SmtpServer {
    config: ServerConfig,
    interpreter: Interpreter,
    store: MailStore,
}

impl SmtpServer {
    pub fn new(config: ServerConfig) -> Self {
        let routes = Arc::new(config.routes.clone());
        Self {
            interpreter: Interpreter::new(config.sequencing),
            store: MailStore::new(config.mailbox_dir.clone(), routes),
            config,
        }
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.listen_address();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("Server listening on {}", addr);
        Ok(listener)
    }

    /// Accepts connections until `shutdown` resolves, then drops the listener
    /// and waits for the sessions already running to end on their own.
    pub async fn run<F>(self: Arc<Self>, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, client_addr)) => {
                        info!("Client connected: {}", client_addr);
                        let this = Arc::clone(&self);
                        sessions.spawn(async move {
                            if let Err(e) = this.handle_connection(stream, client_addr).await {
                                warn!("{} Connection aborted: {:#}", client_addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                        time::sleep(ACCEPT_ERROR_PAUSE).await;
                    }
                },
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        error!("Session task failed: {}", e);
                    }
                }
            }
        }

        drop(listener);
        info!("Server has been shut down, {} session(s) still running", sessions.len());
        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                error!("Session task failed: {}", e);
            }
        }
        Ok(())
    }

    /// Runs one session over `stream` until QUIT, end of input or a
    /// transport error.
    pub async fn handle_connection<S>(&self, stream: S, client_addr: SocketAddr) -> Result<()>
    where
        S: AsyncRead + AsyncWrite,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let mut session = Session::new();
        let mut line = Vec::new();

        send_reply(&mut writer, &Reply::greeting()).await?;

        loop {
            line.clear();
            let n = reader
                .read_until(b'\n', &mut line)
                .await
                .context("Error reading from client")?;
            if n == 0 {
                info!("{} Client closed the connection", client_addr);
                return Ok(());
            }

            let text = String::from_utf8_lossy(&line);
            let command = text.trim();
            debug!("{} >> {}", client_addr, safe_log_string(command));

            let transition = self.interpreter.execute(command, &mut session);
            debug!("{} << {}", client_addr, transition.reply);
            send_reply(&mut writer, &transition.reply).await?;

            match transition.next {
                Next::Command => {}
                Next::ReadData => {
                    let body = read_body(&mut reader).await?;
                    debug!("{} received {} bytes of data", client_addr, body.len());
                    let reply = self.interpreter.finish_data(&mut session, body);
                    send_reply(&mut writer, &reply).await?;

                    let report = self.store.persist(&session).await;
                    info!(
                        "{} Message from {} stored for {} recipient(s), {} skipped, {} failed",
                        client_addr,
                        safe_log_string(&session.sender_mail),
                        report.stored.len(),
                        report.skipped.len(),
                        report.failed.len()
                    );
                }
                Next::Close => {
                    if let Err(e) = writer.shutdown().await {
                        debug!("{} Error closing connection: {}", client_addr, e);
                    }
                    info!("{} Connection closed", client_addr);
                    return Ok(());
                }
            }
        }
    }
}

async fn send_reply<W>(writer: &mut W, reply: &Reply) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(reply.to_wire().as_bytes())
        .await
        .context("Error writing to client")?;
    writer.flush().await.context("Error writing to client")?;
    Ok(())
}

/// Reads message lines verbatim, terminators included, up to a line that is
/// a lone dot once surrounding whitespace is trimmed. No dot-unstuffing.
async fn read_body<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader
            .read_until(b'\n', &mut line)
            .await
            .context("Error reading data")?;
        if n == 0 {
            bail!("Connection closed before end of data");
        }

        if String::from_utf8_lossy(&line).trim() == "." {
            return Ok(body);
        }
        body.extend_from_slice(&line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Route, RouteTable};
    use tempfile::TempDir;
    use tokio::io::{duplex, AsyncReadExt};

    fn server(root: &std::path::Path) -> SmtpServer {
        let mut routes = RouteTable::new();
        routes.insert("domain.com", Route::Local);
        SmtpServer::new(ServerConfig::new(routes, root))
    }

    fn peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    #[tokio::test]
    async fn test_scripted_session() {
        let tmp = TempDir::new().unwrap();
        let server = server(tmp.path());
        let (client, server_side) = duplex(4096);

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(
                b"HELO Client\r\nMAIL FROM:<s@example.com>\r\nRCPT TO:<local@domain.com>\r\n\
                  DATA\r\nHello\r\n..\r\n.\r\nQUIT\r\nHELO again\r\n",
            )
            .await
            .unwrap();

        server.handle_connection(server_side, peer()).await.unwrap();

        let mut output = String::new();
        client_read.read_to_string(&mut output).await.unwrap();
        assert_eq!(
            output,
            "220 Welcome to the SMTP server\r\n\
             250 Hello client\r\n\
             250 OK\r\n\
             250 OK\r\n\
             354 End data with <CR><LF>.<CR><LF>\r\n\
             250 OK\r\n\
             221 Bye\r\n"
        );

        let dir = tmp.path().join("local");
        let files: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
        assert_eq!(files.len(), 1);
        let content = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert_eq!(
            content,
            "From: s@example.com\r\nTo: local@domain.com\r\n\r\nHello\r\n..\r\n"
        );
    }

    #[tokio::test]
    async fn test_eof_during_data_aborts_without_reply() {
        let tmp = TempDir::new().unwrap();
        let server = server(tmp.path());
        let (client, server_side) = duplex(4096);

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write
            .write_all(b"RCPT TO:<local@domain.com>\r\nDATA\r\npartial body\r\n")
            .await
            .unwrap();
        client_write.shutdown().await.unwrap();

        let result = server.handle_connection(server_side, peer()).await;
        assert!(result.is_err());

        let mut output = String::new();
        client_read.read_to_string(&mut output).await.unwrap();
        assert!(output.ends_with("354 End data with <CR><LF>.<CR><LF>\r\n"));
        assert!(!tmp.path().join("local").exists());
    }

    #[tokio::test]
    async fn test_invalid_utf8_does_not_end_session() {
        let tmp = TempDir::new().unwrap();
        let server = server(tmp.path());
        let (client, server_side) = duplex(4096);

        let (mut client_read, mut client_write) = tokio::io::split(client);
        client_write.write_all(b"\xff\xfe\r\nQUIT\r\n").await.unwrap();

        server.handle_connection(server_side, peer()).await.unwrap();

        let mut output = String::new();
        client_read.read_to_string(&mut output).await.unwrap();
        assert!(output.contains("502 Unrecognized command\r\n"));
        assert!(output.ends_with("221 Bye\r\n"));
    }
}
