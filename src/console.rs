use std::time::Duration;

use anyhow::{Result, anyhow, bail};

use crate::types::RecordId;

/// Commands typed on stdin while a watch is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Refresh,
    TogglePause,
    Interval(Duration),
    Table(RecordId),
}

impl ConsoleCommand {
    pub const HELP: &'static str = "<enter>/r refresh, p pause/resume, i <ms> interval, t <id> refresh one table";

    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or("r");
        let argument = words.next();

        if words.next().is_some() {
            bail!("too many arguments: {}", line.trim());
        }

        match (command, argument) {
            ("r" | "refresh", None) => Ok(Self::Refresh),
            ("p" | "pause", None) => Ok(Self::TogglePause),
            ("i" | "interval", Some(millis)) => {
                let millis: u64 = millis
                    .parse()
                    .map_err(|_| anyhow!("interval must be a number of milliseconds: {millis}"))?;
                if millis == 0 {
                    bail!("interval must be > 0");
                }

                Ok(Self::Interval(Duration::from_millis(millis)))
            }
            ("t" | "table", Some(table_id)) => table_id
                .parse()
                .map(Self::Table)
                .map_err(|_| anyhow!("table id must be a number: {table_id}")),
            _ => bail!("unknown command `{}` ({})", line.trim(), Self::HELP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_line_refreshes() {
        assert_eq!(ConsoleCommand::parse("").unwrap(), ConsoleCommand::Refresh);
        assert_eq!(ConsoleCommand::parse("  r ").unwrap(), ConsoleCommand::Refresh);
    }

    #[test]
    fn parses_arguments() {
        assert_eq!(ConsoleCommand::parse("p").unwrap(), ConsoleCommand::TogglePause);
        assert_eq!(
            ConsoleCommand::parse("i 2500").unwrap(),
            ConsoleCommand::Interval(Duration::from_millis(2_500))
        );
        assert_eq!(ConsoleCommand::parse("table 12").unwrap(), ConsoleCommand::Table(12));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(ConsoleCommand::parse("i").is_err());
        assert!(ConsoleCommand::parse("i 0").is_err());
        assert!(ConsoleCommand::parse("i soon").is_err());
        assert!(ConsoleCommand::parse("t 1 2").is_err());
        assert!(ConsoleCommand::parse("r now").is_err());
        assert!(ConsoleCommand::parse("quit").is_err());
    }
}
