/// Errors raised while talking to Discord.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("discord token is empty")]
    MissingToken,

    #[error("discord login failed: {0}")]
    Login(#[source] serenity::Error),

    #[error(transparent)]
    Serenity(#[from] serenity::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for meshrelay_channels::Error {
    fn from(err: Error) -> Self {
        meshrelay_channels::Error::external("discord", err)
    }
}
