use anyhow::Context;
use async_trait::async_trait;

use super::MessagingProvider;

pub struct TwilioRelay {
    account_sid: String,
    auth_token: String,
    from_number: String,
    /// Prepended to both addresses, e.g. `whatsapp:`.
    channel: String,
    api_base: String,
    client: reqwest::Client,
}

impl TwilioRelay {
    pub fn new(
        account_sid: String,
        auth_token: String,
        from_number: String,
        channel: String,
        api_base: String,
    ) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            channel,
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn address(&self, number: &str) -> String {
        if self.channel.is_empty() || number.starts_with(&self.channel) {
            number.to_string()
        } else {
            format!("{}{}", self.channel, number)
        }
    }
}

#[async_trait]
impl MessagingProvider for TwilioRelay {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        );
        let to = self.address(to);
        let from = self.address(&self.from_number);

        self.client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to.as_str()), ("From", from.as_str()), ("Body", body)])
            .send()
            .await
            .context("failed to send Twilio message")?
            .error_for_status()
            .context("Twilio API returned error")?;

        Ok(())
    }
}
