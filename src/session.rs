use crate::command::Command;

/// Where a connection is in the mail transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, no HELO yet.
    #[default]
    Fresh,
    Greeted,
    SenderSet,
    /// At least one RCPT TO accepted; more may follow.
    RecipientsPresent,
    DataPhase,
    Closed,
}

/// How strictly command ordering is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sequencing {
    /// Any command is accepted in any order.
    #[default]
    Lenient,
    /// Out-of-order commands are rejected with 503.
    Strict,
}

impl Sequencing {
    pub fn permits(self, command: &Command, state: SessionState) -> bool {
        use SessionState::*;

        if self == Sequencing::Lenient {
            return true;
        }
        match command {
            Command::Helo(_) => matches!(state, Fresh | Greeted | SenderSet | RecipientsPresent),
            Command::Mail(_) => state == Greeted,
            Command::Rcpt(_) => matches!(state, SenderSet | RecipientsPresent),
            Command::Data => state == RecipientsPresent,
            Command::Rset | Command::Quit => true,
        }
    }
}

/// Per-connection record of the mail transaction. Owned by the connection's
/// task and never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub domain: String,
    pub sender_mail: String,
    pub recipient_mail: Vec<String>,
    /// Raw message bytes as received, not necessarily UTF-8.
    pub body: Vec<u8>,
    state: SessionState,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Back to the zero value, domain included.
    pub fn reset(&mut self) {
        *self = Session::default();
    }

    /// Drops sender, recipients and body but keeps the greeting.
    pub fn clear_transaction(&mut self) {
        self.sender_mail.clear();
        self.recipient_mail.clear();
        self.body.clear();
        if self.state != SessionState::Fresh {
            self.state = SessionState::Greeted;
        }
    }

    pub fn greet(&mut self, domain: String) {
        self.domain = domain;
        if self.state == SessionState::Fresh {
            self.state = SessionState::Greeted;
        }
    }

    pub fn set_sender(&mut self, sender: String) {
        self.sender_mail = sender;
        self.state = SessionState::SenderSet;
    }

    pub fn add_recipient(&mut self, recipient: String) {
        self.recipient_mail.push(recipient);
        self.state = SessionState::RecipientsPresent;
    }

    pub fn begin_data(&mut self) {
        self.state = SessionState::DataPhase;
    }

    /// Stores the received body. Sender and recipients stay in place until
    /// the next RSET.
    pub fn complete_data(&mut self, body: Vec<u8>) {
        self.body = body;
        self.state = SessionState::Greeted;
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }
}
