use crate::unit::common::*;
use shardline::shardline::worker::{
    Classification, Classifier, IgnoreReason, TransmitClassifier, TransmitRecord,
};

fn classify(value: serde_json::Value) -> Classification {
    TransmitClassifier::new(ClassifierConfig::default())
        .classify(&InboundMessage::new(value.to_string(), 1))
}

#[test]
fn test_accepted_record_uses_source_mid_key() {
    let Classification::Accept(record) = classify(transmit_event("88001")) else {
        panic!("expected accept");
    };
    assert_eq!(record.routing_key, "88001_transmit_new");

    let stored: TransmitRecord = serde_json::from_str(&record.value).unwrap();
    assert_eq!(
        stored,
        TransmitRecord {
            uid: "1001".to_string(),
            mid: "2002".to_string(),
            src_mid: "88001".to_string(),
            follow: 500,
        }
    );
}

#[test]
fn test_wrong_event_is_ignored() {
    for event in [0, 1, 3, 99] {
        let mut value = transmit_event("1");
        value["event"] = json!(event);
        assert!(matches!(
            classify(value),
            Classification::Ignore(IgnoreReason::WrongEvent)
        ));
    }
}

#[test]
fn test_excluded_state_is_ignored() {
    for state in 5..=11 {
        let mut value = transmit_event("1");
        value["state"] = json!(state);
        assert!(matches!(
            classify(value),
            Classification::Ignore(IgnoreReason::ExcludedState)
        ));
    }
}

#[test]
fn test_follower_threshold() {
    for (follow, accepted) in [(0, false), (150, false), (151, true), (10_000, true)] {
        let mut value = transmit_event("1");
        value["follow"] = json!(follow);
        assert_eq!(classify(value).is_accept(), accepted, "follow {}", follow);
    }
}

#[test]
fn test_missing_identifier_is_ignored() {
    for field in ["uid", "mid", "src_uid", "src_mid"] {
        let mut value = transmit_event("1");
        value.as_object_mut().unwrap().remove(field);
        assert!(
            matches!(
                classify(value),
                Classification::Ignore(IgnoreReason::MissingIdentifier)
            ),
            "missing {}",
            field
        );
    }
}

#[test]
fn test_malformed_payloads_are_invalid() {
    let classifier = TransmitClassifier::new(ClassifierConfig::default());
    for payload in ["", "not json", "[1,2", "{\"follow\": \"many\"}"] {
        let result = classifier.classify(&InboundMessage::new(payload, 1));
        assert!(
            matches!(result, Classification::Invalid(_)),
            "payload {:?}",
            payload
        );
    }
}

#[test]
fn test_rejected_inputs_are_never_accepted() {
    let config = ClassifierConfig::default();
    let classifier = TransmitClassifier::new(config.clone());
    for event in [1, 2, 3] {
        for state in 0..45 {
            for follow in [0, 149, 150, 151, 1_000] {
                for src_mid in ["", "77"] {
                    let mut value = transmit_event(src_mid);
                    value["event"] = json!(event);
                    value["state"] = json!(state);
                    value["follow"] = json!(follow);

                    let should_reject = event != config.required_event
                        || config.is_excluded_state(state)
                        || follow <= config.min_followers
                        || src_mid.is_empty();
                    let result =
                        classifier.classify(&InboundMessage::new(value.to_string(), 1));
                    assert_eq!(
                        result.is_accept(),
                        !should_reject,
                        "event {} state {} follow {} src_mid {:?}",
                        event,
                        state,
                        follow,
                        src_mid
                    );
                }
            }
        }
    }
}

#[test]
fn test_custom_thresholds() {
    let config = ClassifierConfig {
        required_event: 7,
        min_followers: 0,
        excluded_states: vec![],
        key_suffix: "_fwd".to_string(),
    };
    let classifier = TransmitClassifier::new(config);
    let mut value = transmit_event("5");
    value["event"] = json!(7);
    value["state"] = json!(8);
    value["follow"] = json!(1);
    let Classification::Accept(record) =
        classifier.classify(&InboundMessage::new(value.to_string(), 1))
    else {
        panic!("expected accept");
    };
    assert_eq!(record.routing_key, "5_fwd");
}
