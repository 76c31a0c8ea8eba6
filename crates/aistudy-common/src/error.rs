use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("maintenance error: {0}")]
    Maintenance(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
