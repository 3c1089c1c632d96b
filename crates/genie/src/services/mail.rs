/// Delivery of notification messages.
pub trait MailService: Send + Sync {
    fn send_email(&self, to: &str, subject: &str, body: &str) -> crate::Result<()>;
}

/// Used when no mail delivery is configured, only logs the messages.
#[derive(Default, Debug, Clone)]
pub struct LoggingMailService;

impl MailService for LoggingMailService {
    fn send_email(&self, to: &str, subject: &str, _body: &str) -> crate::Result<()> {
        log::info!("Mail delivery is not configured, dropping message to {to}: {subject}");
        Ok(())
    }
}
