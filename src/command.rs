//! Parsing of a single command line

use thiserror::Error;

use crate::reply::Reply;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO or EHLO, with the domain already lower-cased.
    Helo(String),
    Mail(String),
    Rcpt(String),
    Data,
    Rset,
    Quit,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("syntax error in parameters or arguments")]
    Syntax,
    #[error("unrecognized command")]
    Unrecognized,
}

impl CommandError {
    pub fn reply(&self) -> Reply {
        match self {
            CommandError::Syntax => Reply::syntax_error(),
            CommandError::Unrecognized => Reply::unrecognized(),
        }
    }
}

impl Command {
    /// Parses one line with its terminator already trimmed. Only the verb is
    /// case-insensitive; arguments keep their case except the HELO domain.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let verb = match parts.first() {
            Some(verb) => verb.to_ascii_uppercase(),
            None => return Err(CommandError::Unrecognized),
        };

        match verb.as_str() {
            "HELO" | "EHLO" => match parts.as_slice() {
                [_, domain] => Ok(Command::Helo(domain.to_lowercase())),
                _ => Err(CommandError::Syntax),
            },
            "MAIL" => parse_path(&parts, "FROM:").map(Command::Mail),
            "RCPT" => parse_path(&parts, "TO:").map(Command::Rcpt),
            "DATA" => Ok(Command::Data),
            "RSET" => Ok(Command::Rset),
            "QUIT" => Ok(Command::Quit),
            _ => Err(CommandError::Unrecognized),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Command::Helo(_) => "HELO",
            Command::Mail(_) => "MAIL",
            Command::Rcpt(_) => "RCPT",
            Command::Data => "DATA",
            Command::Rset => "RSET",
            Command::Quit => "QUIT",
        }
    }
}

/// Extracts the address from `MAIL FROM:<addr>` / `RCPT TO:<addr>`, also
/// accepting the address as a separate token (`MAIL FROM: <addr>`).
fn parse_path(parts: &[&str], prefix: &str) -> Result<String, CommandError> {
    let keyword = parts.get(1).copied().ok_or(CommandError::Unrecognized)?;
    match keyword.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => {}
        _ => return Err(CommandError::Unrecognized),
    }

    let rest = &keyword[prefix.len()..];
    let raw = if rest.is_empty() {
        parts.get(2).copied().ok_or(CommandError::Syntax)?
    } else {
        rest
    };

    let address = raw.trim_matches(&['<', '>'][..]);
    if address.is_empty() {
        return Err(CommandError::Syntax);
    }
    Ok(address.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helo() {
        assert_eq!(
            Command::parse("HELO Client.Example.COM"),
            Ok(Command::Helo("client.example.com".to_string()))
        );
        assert_eq!(
            Command::parse("ehlo relay.local"),
            Ok(Command::Helo("relay.local".to_string()))
        );
        assert_eq!(Command::parse("HELO"), Err(CommandError::Syntax));
        assert_eq!(Command::parse("HELO a b"), Err(CommandError::Syntax));
    }

    #[test]
    fn test_mail_from_forms() {
        let expected = Ok(Command::Mail("Sender@Example.com".to_string()));
        assert_eq!(Command::parse("MAIL FROM:<Sender@Example.com>"), expected);
        assert_eq!(Command::parse("mail from:<Sender@Example.com>"), expected);
        assert_eq!(Command::parse("MAIL FROM: <Sender@Example.com>"), expected);
        assert_eq!(Command::parse("MAIL FROM:Sender@Example.com"), expected);
    }

    #[test]
    fn test_mail_from_errors() {
        assert_eq!(Command::parse("MAIL"), Err(CommandError::Unrecognized));
        assert_eq!(Command::parse("MAIL TO:<a@b.c>"), Err(CommandError::Unrecognized));
        assert_eq!(Command::parse("MAIL FROM:"), Err(CommandError::Syntax));
        assert_eq!(Command::parse("MAIL FROM:<>"), Err(CommandError::Syntax));
        assert_eq!(Command::parse("MAIL FROM: <>"), Err(CommandError::Syntax));
    }

    #[test]
    fn test_rcpt_to() {
        assert_eq!(
            Command::parse("RCPT TO:<local@domain.com>"),
            Ok(Command::Rcpt("local@domain.com".to_string()))
        );
        assert_eq!(
            Command::parse("RCPT TO: <local@domain.com>"),
            Ok(Command::Rcpt("local@domain.com".to_string()))
        );
        assert_eq!(Command::parse("RCPT"), Err(CommandError::Unrecognized));
        assert_eq!(Command::parse("RCPT TO:"), Err(CommandError::Syntax));
    }

    #[test]
    fn test_non_ascii_keyword_does_not_panic() {
        assert_eq!(Command::parse("RCPT Tö:<a@b.c>"), Err(CommandError::Unrecognized));
        assert_eq!(Command::parse("MAIL é"), Err(CommandError::Unrecognized));
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(Command::parse("DATA"), Ok(Command::Data));
        assert_eq!(Command::parse("rset"), Ok(Command::Rset));
        assert_eq!(Command::parse("Quit"), Ok(Command::Quit));
        assert_eq!(Command::parse("FOO"), Err(CommandError::Unrecognized));
        assert_eq!(Command::parse(""), Err(CommandError::Unrecognized));
        assert_eq!(Command::parse("   "), Err(CommandError::Unrecognized));
    }

    #[test]
    fn test_error_replies() {
        assert_eq!(CommandError::Syntax.reply().code, 501);
        assert_eq!(CommandError::Unrecognized.reply().code, 502);
    }
}
