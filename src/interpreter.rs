//! The command state machine

use log::debug;

use crate::command::Command;
use crate::reply::Reply;
use crate::session::{Sequencing, Session};

/// What the connection loop does after sending the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Command,
    /// Switch to raw line accumulation until the lone-dot terminator.
    ReadData,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub reply: Reply,
    pub next: Next,
}

impl Transition {
    fn stay(reply: Reply) -> Self {
        Self {
            reply,
            next: Next::Command,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter {
    sequencing: Sequencing,
}

impl Interpreter {
    pub fn new(sequencing: Sequencing) -> Self {
        Self { sequencing }
    }

    /// Runs one command line against the session. Errors never leave the
    /// session modified.
    pub fn execute(&self, line: &str, session: &mut Session) -> Transition {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => return Transition::stay(e.reply()),
        };

        if !self.sequencing.permits(&command, session.state()) {
            debug!(
                "{} rejected in state {:?}",
                command.verb(),
                session.state()
            );
            return Transition::stay(Reply::bad_sequence());
        }

        match command {
            Command::Helo(domain) => self.helo(domain, session),
            Command::Mail(sender) => self.mail(sender, session),
            Command::Rcpt(recipient) => self.rcpt(recipient, session),
            Command::Data => self.data(session),
            Command::Rset => self.rset(session),
            Command::Quit => self.quit(session),
        }
    }

    /// Ends the DATA phase with the accumulated body.
    pub fn finish_data(&self, session: &mut Session, body: Vec<u8>) -> Reply {
        session.complete_data(body);
        Reply::ok()
    }

    fn helo(&self, domain: String, session: &mut Session) -> Transition {
        let reply = Reply::hello(&domain);
        session.greet(domain);
        Transition::stay(reply)
    }

    fn mail(&self, sender: String, session: &mut Session) -> Transition {
        if self.sequencing == Sequencing::Strict {
            session.clear_transaction();
        }
        session.set_sender(sender);
        Transition::stay(Reply::ok())
    }

    fn rcpt(&self, recipient: String, session: &mut Session) -> Transition {
        session.add_recipient(recipient);
        Transition::stay(Reply::ok())
    }

    fn data(&self, session: &mut Session) -> Transition {
        session.begin_data();
        Transition {
            reply: Reply::start_data(),
            next: Next::ReadData,
        }
    }

    fn rset(&self, session: &mut Session) -> Transition {
        session.reset();
        Transition::stay(Reply::ok())
    }

    fn quit(&self, session: &mut Session) -> Transition {
        session.close();
        Transition {
            reply: Reply::bye(),
            next: Next::Close,
        }
    }
}
