use std::path::Path;

use super::btclient_error::BtClientError;
use super::error_message::ErrorMessage;
use crate::config::cfg::Cfg;
use crate::logger::logger_receiver::Logger;
use crate::logger::logger_sender::LoggerSender;
use crate::torrent_handler::handler::TorrentHandler;
use crate::torrent_parser::torrent::Torrent;

const CONFIG_FILE_PATH: &str = "config.cfg";

/// Parsed command-line arguments: `--torrent <path> [--verbose]`.
#[derive(Debug, PartialEq)]
pub struct Args {
    pub torrent_path: String,
    pub verbose: bool,
}

impl Args {
    /// Parses the arguments following the program name.
    pub fn parse(arguments: &[String]) -> Result<Args, BtClientError> {
        let mut torrent_path = None;
        let mut verbose = false;

        let mut iter = arguments.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--torrent" => {
                    let path = iter.next().ok_or_else(|| {
                        BtClientError::ArgumentError(ErrorMessage::new(
                            "--torrent requires a path argument".to_string(),
                        ))
                    })?;
                    torrent_path = Some(path.clone());
                }
                "--verbose" => verbose = true,
                other => {
                    return Err(BtClientError::ArgumentError(ErrorMessage::new(format!(
                        "unrecognized argument: {other}"
                    ))))
                }
            }
        }

        let torrent_path = torrent_path.ok_or_else(|| {
            BtClientError::ArgumentError(ErrorMessage::new(
                "missing required --torrent <path> argument".to_string(),
            ))
        })?;

        Ok(Args {
            torrent_path,
            verbose,
        })
    }
}

/// The BitTorrent download client application: loads configuration, parses a
/// single torrent, and drives its download to completion.
pub struct BtClient {
    config: Cfg,
    logger: Logger,
    torrent: Torrent,
}

impl BtClient {
    /// Reads the configuration file (`./config.cfg`), starts a logger writing
    /// to the directory it names, and parses the given `.torrent` file.
    pub fn init(args: Args) -> Result<Self, BtClientError> {
        let config = Self::read_configuration_file(CONFIG_FILE_PATH)?;
        let logger = Logger::new(&config.log_directory, args.verbose)?;

        let logger_sender = logger.new_sender();
        let _ = logger_sender.info("Initializing client...");
        let _ = logger_sender.info("Configuration file loaded correctly.");

        let torrent = Self::parse_torrent(&logger_sender, &args.torrent_path)?;

        Ok(Self {
            config,
            logger,
            torrent,
        })
    }

    /// Runs the download to completion (or a fatal error).
    pub fn run(self) -> Result<(), BtClientError> {
        let logger_sender = self.logger.new_sender();
        let _ = logger_sender.info("Starting download...");

        let mut handler = TorrentHandler::new(self.torrent, self.config, logger_sender.clone());
        handler.handle()?;

        let _ = logger_sender.info("Client finished.");
        Ok(())
    }

    fn read_configuration_file(path: &str) -> Result<Cfg, BtClientError> {
        Cfg::new(path).map_err(|io_error| {
            BtClientError::ConfigurationFileError(ErrorMessage::new(format!(
                "couldn't read configuration file {path}: {io_error}"
            )))
        })
    }

    fn parse_torrent(
        logger_sender: &LoggerSender,
        torrent_path: &str,
    ) -> Result<Torrent, BtClientError> {
        match Torrent::from_file(Path::new(torrent_path)) {
            Ok(torrent) => {
                let _ = logger_sender.info(&format!("Torrent {torrent_path} parsed correctly."));
                Ok(torrent)
            }
            Err(error) => {
                let _ = logger_sender.error(&format!(
                    "Couldn't parse torrent file {torrent_path}: {error}"
                ));
                Err(BtClientError::TorrentFileError(error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args_requires_torrent_path() {
        let args = vec!["--verbose".to_string()];
        assert!(Args::parse(&args).is_err());
    }

    #[test]
    fn test_parse_args_with_torrent_and_verbose() {
        let args = vec![
            "--torrent".to_string(),
            "file.torrent".to_string(),
            "--verbose".to_string(),
        ];
        let parsed = Args::parse(&args).unwrap();
        assert_eq!(
            parsed,
            Args {
                torrent_path: "file.torrent".to_string(),
                verbose: true,
            }
        );
    }

    #[test]
    fn test_parse_args_defaults_verbose_to_false() {
        let args = vec!["--torrent".to_string(), "file.torrent".to_string()];
        let parsed = Args::parse(&args).unwrap();
        assert!(!parsed.verbose);
    }

    #[test]
    fn test_parse_args_rejects_unrecognized_flag() {
        let args = vec!["--bogus".to_string()];
        assert!(Args::parse(&args).is_err());
    }

    #[test]
    fn test_parse_args_torrent_missing_value() {
        let args = vec!["--torrent".to_string()];
        assert!(Args::parse(&args).is_err());
    }
}
