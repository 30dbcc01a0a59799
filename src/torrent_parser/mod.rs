pub mod info;
pub mod torrent;
