#![forbid(unsafe_code)]

pub mod batch;
pub mod classify;
pub mod cli;
pub mod crawl;
pub mod enrich;
pub mod formats;
pub mod infobox;
pub mod logging;
pub mod persist;
pub mod sink;
pub mod summary;
pub mod wiki;
pub mod zodiac;
