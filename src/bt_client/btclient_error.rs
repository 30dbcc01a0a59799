use std::fmt;

use super::error_message::ErrorMessage;
use crate::logger::logger_error::LoggerError;
use crate::torrent_handler::handler::TorrentHandlerError;
use crate::torrent_parser::torrent::TorrentError;

/// Fatal errors that can abort the client before or during a download.
#[derive(Debug)]
pub enum BtClientError {
    ArgumentError(ErrorMessage),
    ConfigurationFileError(ErrorMessage),
    LogError(LoggerError),
    TorrentFileError(TorrentError),
    TorrentHandlerError(TorrentHandlerError),
}

impl fmt::Display for BtClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BtClientError::ArgumentError(msg) => write!(f, "argument error: {msg:?}"),
            BtClientError::ConfigurationFileError(msg) => {
                write!(f, "configuration error: {msg:?}")
            }
            BtClientError::LogError(err) => write!(f, "logging error: {err}"),
            BtClientError::TorrentFileError(err) => write!(f, "torrent file error: {err}"),
            BtClientError::TorrentHandlerError(err) => write!(f, "download failed: {err:?}"),
        }
    }
}

impl std::error::Error for BtClientError {}

impl From<LoggerError> for BtClientError {
    fn from(err: LoggerError) -> BtClientError {
        BtClientError::LogError(err)
    }
}

impl From<TorrentError> for BtClientError {
    fn from(err: TorrentError) -> BtClientError {
        BtClientError::TorrentFileError(err)
    }
}

impl From<TorrentHandlerError> for BtClientError {
    fn from(err: TorrentHandlerError) -> BtClientError {
        BtClientError::TorrentHandlerError(err)
    }
}
