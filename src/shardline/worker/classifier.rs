//! Record classification
//!
//! A [`Classifier`] turns a raw payload into one of three outcomes. Only
//! `Accept` leads to a store write; `Ignore` is a normal business outcome
//! and `Invalid` is logged as an error.

use crate::shardline::config::ClassifierConfig;
use crate::shardline::error::ClassifyError;
use crate::shardline::kafka::InboundMessage;
use serde::{Deserialize, Serialize};

/// An accepted record ready for storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    /// Shard selector and storage key
    pub routing_key: String,
    /// Serialized value to store
    pub value: String,
}

/// Why a well-formed record was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    WrongEvent,
    ExcludedState,
    TooFewFollowers,
    MissingIdentifier,
}

#[derive(Debug)]
pub enum Classification {
    Accept(ParsedRecord),
    Ignore(IgnoreReason),
    Invalid(ClassifyError),
}

impl Classification {
    pub fn is_accept(&self) -> bool {
        matches!(self, Classification::Accept(_))
    }
}

pub trait Classifier: Send + Sync {
    fn classify(&self, message: &InboundMessage) -> Classification;
}

/// Raw transmit event as published upstream
#[derive(Debug, Clone, Default, Deserialize)]
struct TransmitEvent {
    #[serde(default)]
    uid: String,
    #[serde(default)]
    mid: String,
    #[serde(default)]
    follow: i64,
    #[serde(default)]
    src_uid: String,
    #[serde(default)]
    src_mid: String,
    #[serde(default)]
    state: i64,
    #[serde(default)]
    event: i64,
}

/// Stored form of an accepted transmit event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransmitRecord {
    pub uid: String,
    pub mid: String,
    pub src_mid: String,
    pub follow: i64,
}

/// Accepts transmit events from accounts above a follower threshold
pub struct TransmitClassifier {
    config: ClassifierConfig,
}

impl TransmitClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    fn check(&self, event: &TransmitEvent) -> Result<(), IgnoreReason> {
        if event.event != self.config.required_event {
            return Err(IgnoreReason::WrongEvent);
        }
        if self.config.is_excluded_state(event.state) {
            return Err(IgnoreReason::ExcludedState);
        }
        if event.follow <= self.config.min_followers {
            return Err(IgnoreReason::TooFewFollowers);
        }
        if [&event.uid, &event.mid, &event.src_uid, &event.src_mid]
            .iter()
            .any(|id| id.is_empty())
        {
            return Err(IgnoreReason::MissingIdentifier);
        }
        Ok(())
    }
}

impl Classifier for TransmitClassifier {
    fn classify(&self, message: &InboundMessage) -> Classification {
        if message.payload.is_empty() {
            return Classification::Invalid(ClassifyError::MissingField("payload"));
        }
        let event: TransmitEvent = match serde_json::from_slice(&message.payload) {
            Ok(event) => event,
            Err(e) => return Classification::Invalid(e.into()),
        };
        if let Err(reason) = self.check(&event) {
            return Classification::Ignore(reason);
        }

        let routing_key = format!("{}{}", event.src_mid, self.config.key_suffix);
        let record = TransmitRecord {
            uid: event.uid,
            mid: event.mid,
            src_mid: event.src_mid,
            follow: event.follow,
        };
        match serde_json::to_string(&record) {
            Ok(value) => Classification::Accept(ParsedRecord { routing_key, value }),
            Err(e) => Classification::Invalid(e.into()),
        }
    }
}
