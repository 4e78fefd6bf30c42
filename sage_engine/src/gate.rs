//! Sender Gate: authorizes a [`Submission`] before the Reader ever looks
//! at its bytes.
//!
//! A fixed, short-circuiting chain — unlike independently configurable
//! rule toggles, Gate checks always run in the same order.

use chrono::{NaiveTime, Timelike};

use crate::finding::{Diagnostic, Finding, Locator, Scope, Severity};
use crate::model::{Channel, Frequency, Schema, Sender, Submission};

/// Checks 1-3 and 5 are terminal: the first one to fail stops the
/// pipeline and returns a single ERROR Finding. Check 4 (deadline) never
/// stops the pipeline — a late submission still proceeds, accumulating a
/// WARNING into the returned [`Diagnostic`] instead.
pub fn check(schema: &Schema, submission: &Submission) -> Result<Diagnostic, Finding> {
    let sender = find_sender(schema, submission)?;
    check_package_authorized(sender, submission)?;
    check_channel_allowed(sender, submission)?;
    check_channel_credential(sender, submission)?;

    let mut diagnostic = Diagnostic::new();
    if let Some(warning) = check_deadline(sender, submission) {
        diagnostic.push(warning);
    }
    Ok(diagnostic)
}

fn find_sender<'a>(schema: &'a Schema, submission: &Submission) -> Result<&'a Sender, Finding> {
    schema.sender_by_id(&submission.sender_id).ok_or_else(|| {
        terminal(format!(
            "sender '{}' is not a registered sender",
            submission.sender_id
        ))
    })
}

fn check_package_authorized(sender: &Sender, submission: &Submission) -> Result<(), Finding> {
    if sender.packages.iter().any(|p| p == &submission.package_name) {
        Ok(())
    } else {
        Err(terminal(format!(
            "sender '{}' is not authorized to submit package '{}'",
            sender.sender_id, submission.package_name
        )))
    }
}

fn check_channel_allowed(sender: &Sender, submission: &Submission) -> Result<(), Finding> {
    if sender.allowed_methods.contains(&submission.channel) {
        Ok(())
    } else {
        Err(terminal(format!(
            "sender '{}' is not authorized to submit via channel '{:?}'",
            sender.sender_id, submission.channel
        )))
    }
}

/// Step 4: lateness is a WARNING, never fatal — a late receipt still
/// proceeds but produces a WARNING Finding.
fn check_deadline(sender: &Sender, submission: &Submission) -> Option<Finding> {
    let deadline = NaiveTime::parse_from_str(&sender.submission_frequency.deadline, "%H:%M").ok()?;
    let receipt_time = submission.receipt_time.time();
    let late = match sender.submission_frequency.frequency {
        // Daily/weekly/monthly all compare against the same local
        // time-of-day deadline; only the window's calendar granularity
        // differs, which this engine does not need to resolve because it
        // evaluates exactly one submission at a time.
        Frequency::Daily | Frequency::Weekly | Frequency::Monthly => {
            receipt_time.num_seconds_from_midnight() > deadline.num_seconds_from_midnight()
        }
    };
    if late {
        Some(Finding::new(
            Severity::Warning,
            Scope::Authorization,
            Locator::default(),
            format!(
                "submission received at {} after the declared {:?} deadline of {}",
                receipt_time.format("%H:%M"),
                sender.submission_frequency.frequency,
                sender.submission_frequency.deadline
            ),
        ))
    } else {
        None
    }
}

/// Step 5: channel-specific credentials — api key for
/// `api`, envelope sender in `allowed_senders` for `email`, source host
/// for `sftp`. `filesystem`/`direct_upload` carry no credential check.
fn check_channel_credential(sender: &Sender, submission: &Submission) -> Result<(), Finding> {
    let Some(config) = sender.channel_config.get(&submission.channel) else {
        return Err(terminal(format!(
            "sender '{}' has no channel_config for '{:?}'",
            sender.sender_id, submission.channel
        )));
    };

    match submission.channel {
        Channel::Api => match (&config.api_key, &submission.channel_credential) {
            (Some(expected), Some(presented)) if expected == presented => Ok(()),
            _ => Err(terminal(format!(
                "sender '{}' presented an invalid api_key",
                sender.sender_id
            ))),
        },
        Channel::Email => match &submission.channel_credential {
            Some(envelope_sender) if config.allowed_senders.iter().any(|s| s == envelope_sender) => Ok(()),
            _ => Err(terminal(format!(
                "sender '{}' submitted from an unrecognized envelope sender",
                sender.sender_id
            ))),
        },
        Channel::Sftp => match &submission.channel_credential {
            Some(host) if config.allowed_hosts.iter().any(|h| h == host) => Ok(()),
            _ => Err(terminal(format!(
                "sender '{}' connected from an unrecognized source host",
                sender.sender_id
            ))),
        },
        Channel::Filesystem | Channel::DirectUpload => Ok(()),
    }
}

fn terminal(message: String) -> Finding {
    Finding::new(Severity::Error, Scope::Authorization, Locator::default(), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChannelConfig, SubmissionFrequency};
    use std::collections::HashMap;

    fn sender_fixture() -> Sender {
        let mut channel_config = HashMap::new();
        channel_config.insert(
            Channel::Api,
            ChannelConfig {
                api_key: Some("secret-key".into()),
                ..Default::default()
            },
        );
        channel_config.insert(
            Channel::Sftp,
            ChannelConfig {
                allowed_hosts: vec!["10.0.0.1".into()],
                ..Default::default()
            },
        );
        channel_config.insert(Channel::Email, ChannelConfig::default());
        Sender {
            sender_id: "TEST001".into(),
            responsible_person: "Ana".into(),
            allowed_methods: vec![Channel::Sftp, Channel::Email],
            channel_config,
            submission_frequency: SubmissionFrequency {
                frequency: Frequency::Daily,
                deadline: "23:59".into(),
            },
            packages: vec!["ventas_pkg".into()],
        }
    }

    fn submission_fixture(channel: Channel, hour: u32, minute: u32) -> Submission {
        use chrono::{TimeZone, Utc};
        let channel_credential = match channel {
            Channel::Sftp => Some("10.0.0.1".into()),
            _ => None,
        };
        Submission {
            sender_id: "TEST001".into(),
            package_name: "ventas_pkg".into(),
            channel,
            blob: Vec::new(),
            filename: "f.csv".into(),
            receipt_time: Utc.with_ymd_and_hms(2026, 1, 2, hour, minute, 0).unwrap(),
            channel_credential,
        }
    }

    #[test]
    fn scenario_4_disallowed_channel_is_terminal_error() {
        let schema = Schema {
            catalogs: Vec::new(),
            packages: Vec::new(),
            senders: vec![sender_fixture()],
        };
        let submission = submission_fixture(Channel::Api, 10, 0);
        let err = check(&schema, &submission).unwrap_err();
        assert_eq!(err.severity, Severity::Error);
        assert_eq!(err.scope, Scope::Authorization);
    }

    #[test]
    fn scenario_5_late_daily_submission_is_a_single_warning() {
        let schema = Schema {
            catalogs: Vec::new(),
            packages: Vec::new(),
            senders: vec![sender_fixture()],
        };
        let submission = submission_fixture(Channel::Sftp, 0, 30);
        let diagnostic = check(&schema, &submission).unwrap();
        assert_eq!(diagnostic.findings.len(), 1);
        assert_eq!(diagnostic.findings[0].severity, Severity::Warning);
    }

    #[test]
    fn on_time_submission_has_no_findings() {
        let schema = Schema {
            catalogs: Vec::new(),
            packages: Vec::new(),
            senders: vec![sender_fixture()],
        };
        let submission = submission_fixture(Channel::Sftp, 10, 0);
        let diagnostic = check(&schema, &submission).unwrap();
        assert!(diagnostic.findings.is_empty());
    }

    #[test]
    fn unknown_sender_is_terminal() {
        let schema = Schema {
            catalogs: Vec::new(),
            packages: Vec::new(),
            senders: Vec::new(),
        };
        let submission = submission_fixture(Channel::Sftp, 10, 0);
        assert!(check(&schema, &submission).is_err());
    }

    #[test]
    fn undeclared_package_is_terminal() {
        let schema = Schema {
            catalogs: Vec::new(),
            packages: Vec::new(),
            senders: vec![sender_fixture()],
        };
        let mut submission = submission_fixture(Channel::Sftp, 10, 0);
        submission.package_name = "other_pkg".into();
        assert!(check(&schema, &submission).is_err());
    }
}
