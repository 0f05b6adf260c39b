use std::sync::Arc;

use {
    async_trait::async_trait,
    secrecy::{ExposeSecret, Secret},
    serenity::{
        builder::{CreateAllowedMentions, CreateMessage},
        http::Http,
        model::{
            channel::{Channel, ChannelType},
            id::ChannelId,
        },
    },
    tracing::{debug, info},
};

use meshrelay_channels::{ChannelResolver, ChatChannel, Error as ChannelError};

use crate::error::{Error, Result};

/// Authenticated Discord REST session.
#[derive(Clone)]
pub struct DiscordDestination {
    http: Arc<Http>,
    bot_name: String,
}

impl DiscordDestination {
    /// Authenticate with `token` and confirm it by fetching the bot user.
    pub async fn login(token: &Secret<String>) -> Result<Self> {
        let token = token.expose_secret().trim();
        if token.is_empty() {
            return Err(Error::MissingToken);
        }

        let http = Arc::new(Http::new(token));
        let user = http.get_current_user().await.map_err(Error::Login)?;
        info!(bot_id = %user.id, "discord logged in as {}", user.name);

        Ok(Self {
            http,
            bot_name: user.name.clone(),
        })
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }
}

#[async_trait]
impl ChannelResolver for DiscordDestination {
    fn platform(&self) -> &str {
        "discord"
    }

    async fn resolve_channel(
        &self,
        id: &str,
    ) -> meshrelay_channels::Result<Option<Arc<dyn ChatChannel>>> {
        let channel_id = parse_channel_id(id).ok_or_else(|| ChannelError::invalid_channel_id(id))?;

        let channel = self
            .http
            .get_channel(channel_id)
            .await
            .map_err(Error::from)?;

        if !is_text_based(&channel) {
            debug!(channel_id = id, "discord channel is not text based");
            return Ok(None);
        }

        Ok(Some(Arc::new(DiscordTextChannel {
            http: Arc::clone(&self.http),
            channel_id,
            id: id.to_string(),
        })))
    }
}

/// A Discord channel that accepts messages.
pub struct DiscordTextChannel {
    http: Arc<Http>,
    channel_id: ChannelId,
    id: String,
}

#[async_trait]
impl ChatChannel for DiscordTextChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, text: &str) -> meshrelay_channels::Result<()> {
        // Mesh users must not be able to ping anyone.
        let message = CreateMessage::new()
            .content(text)
            .allowed_mentions(CreateAllowedMentions::new());
        self.channel_id
            .send_message(&self.http, message)
            .await
            .map_err(Error::from)?;
        Ok(())
    }
}

/// Discord ids are non-zero unsigned snowflakes.
fn parse_channel_id(id: &str) -> Option<ChannelId> {
    id.trim()
        .parse::<u64>()
        .ok()
        .filter(|&n| n != 0)
        .map(ChannelId::new)
}

fn is_text_based(channel: &Channel) -> bool {
    match channel {
        Channel::Guild(gc) => is_text_kind(gc.kind),
        Channel::Private(_) => true,
        _ => false,
    }
}

fn is_text_kind(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::Text
            | ChannelType::News
            | ChannelType::Voice
            | ChannelType::Stage
            | ChannelType::NewsThread
            | ChannelType::PublicThread
            | ChannelType::PrivateThread
    )
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("123456789012345678", Some(123_456_789_012_345_678))]
    #[case(" 42 ", Some(42))]
    #[case("0", None)]
    #[case("general", None)]
    #[case("", None)]
    #[case("-5", None)]
    fn channel_id_parsing(#[case] raw: &str, #[case] expected: Option<u64>) {
        assert_eq!(parse_channel_id(raw).map(ChannelId::get), expected);
    }

    #[rstest]
    #[case(ChannelType::Text, true)]
    #[case(ChannelType::News, true)]
    #[case(ChannelType::PublicThread, true)]
    #[case(ChannelType::Voice, true)]
    #[case(ChannelType::Category, false)]
    #[case(ChannelType::Forum, false)]
    fn text_kinds(#[case] kind: ChannelType, #[case] expected: bool) {
        assert_eq!(is_text_kind(kind), expected);
    }

    #[test]
    fn channel_error_wraps_discord_error() {
        let err: ChannelError = Error::MissingToken.into();
        assert!(err.to_string().contains("discord token is empty"));
    }
}
