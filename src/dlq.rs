use crate::domain::{DeadLetterQueue, Error};
use crate::logging::ALERT_TARGET;

/// Reports rejected commands through `tracing`, with the message the submitter
/// would see as `reply`. Slab misconfiguration also goes to the alert target.
#[derive(Default, Debug)]
pub struct TracingDlq {}

impl DeadLetterQueue for TracingDlq {
    fn report(&self, error: &Error) {
        if error.is_configuration() {
            tracing::error!(
                target: ALERT_TARGET,
                error = %error,
                reply = %error.client_message(),
                "command rejected"
            );
        } else {
            tracing::warn!(error = %error, reply = %error.client_message(), "command rejected");
        }
    }
}
