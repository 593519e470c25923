//! A minimal inbound SMTP server.
//!
//! Each accepted connection gets its own [`Session`], driven by the
//! [`Interpreter`] through HELO/EHLO, MAIL FROM, RCPT TO, DATA, RSET and QUIT.
//! When a DATA phase completes, the [`MailStore`] writes one copy of the
//! message per recipient whose domain the [`RouteTable`] marks as local.
//! Recipients on any other domain are accepted but dropped: there is no
//! relaying.

pub mod command;
pub mod config;
pub mod daemon;
pub mod interpreter;
pub mod mailstore;
pub mod reply;
pub mod routing;
pub mod server;
pub mod session;
pub mod utils;

pub use command::{Command, CommandError};
pub use config::{Opt, ServerConfig};
pub use interpreter::{Interpreter, Next, Transition};
pub use mailstore::{DeliveryReport, MailStore};
pub use reply::Reply;
pub use routing::{Delivery, Route, RouteEntry, RouteTable};
pub use server::SmtpServer;
pub use session::{Sequencing, Session, SessionState};
