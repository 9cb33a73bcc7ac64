/// Outbound mail capability. Delivery is fire-and-forget: implementations
/// report success with a bool and must never panic the request. Codes are
/// 6-digit strings valid for 15 minutes.
pub trait Mailer: Send {
    fn send_verification_email(&self, email: &str, code: &str) -> bool;
    fn send_password_reset_email(&self, email: &str, code: &str) -> bool;
}

/// Logs instead of sending. Used until an SMTP relay is configured, and by
/// deployments that deliver mail out of process.
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_verification_email(&self, email: &str, _code: &str) -> bool {
        tracing::info!(email, "verification email requested (log-only mailer)");
        true
    }

    fn send_password_reset_email(&self, email: &str, _code: &str) -> bool {
        tracing::info!(email, "password reset email requested (log-only mailer)");
        true
    }
}
