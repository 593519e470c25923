//! Replies sent back to the client

use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub text: Cow<'static, str>,
}

impl Reply {
    pub const fn new(code: u16, text: &'static str) -> Self {
        Self {
            code,
            text: Cow::Borrowed(text),
        }
    }

    /// Sent as soon as a connection is accepted.
    pub const fn greeting() -> Self {
        Self::new(220, "Welcome to the SMTP server")
    }

    pub fn hello(domain: &str) -> Self {
        Self {
            code: 250,
            text: Cow::Owned(format!("Hello {}", domain)),
        }
    }

    pub const fn ok() -> Self {
        Self::new(250, "OK")
    }

    pub const fn start_data() -> Self {
        Self::new(354, "End data with <CR><LF>.<CR><LF>")
    }

    pub const fn bye() -> Self {
        Self::new(221, "Bye")
    }

    pub const fn syntax_error() -> Self {
        Self::new(501, "Syntax error in parameters or arguments")
    }

    pub const fn unrecognized() -> Self {
        Self::new(502, "Unrecognized command")
    }

    pub const fn bad_sequence() -> Self {
        Self::new(503, "Bad sequence of commands")
    }

    /// The reply as written on the wire, CRLF included.
    pub fn to_wire(&self) -> String {
        format!("{}\r\n", self)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.text)
    }
}
