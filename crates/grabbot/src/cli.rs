use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mediagrab")]
#[command(author, version, about = "Telegram bot that downloads Instagram posts and YouTube videos", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (default)
    Run,

    /// Log into Instagram once and store the session file for instaloader
    CreateSession {
        /// Let instaloader prompt for the password or 2FA code on the terminal
        #[arg(long)]
        interactive: bool,
    },

    /// Delete every leftover job directory under TEMP_FILES_DIR
    Sweep,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["mediagrab"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_create_session_flags() {
        let cli = Cli::try_parse_from(["mediagrab", "create-session", "--interactive"]).unwrap();
        assert_eq!(cli.command, Some(Commands::CreateSession { interactive: true }));

        let cli = Cli::try_parse_from(["mediagrab", "sweep"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Sweep));
    }

    #[test]
    fn test_unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["mediagrab", "download"]).is_err());
    }
}
