//! Topic-0 signature table and payload decoding for raw logs.
//!
//! Decoding never fails: a log whose signature is unknown, or whose known
//! signature lacks the topics or data it needs, becomes
//! [`EventPayload::Other`] with the reason attached.

use std::collections::HashMap;

use alloy_primitives::{hex, Address, B256, U256};
use alloy_sol_types::{sol, SolEvent};

use crate::domain::event::{EventKind, EventPayload};
use crate::domain::id::ProposalId;
use crate::port::outbound::chain::RawLog;

sol! {
    /// ERC-1967 proxy implementation change.
    event Upgraded(address indexed implementation);

    /// Governor proposal submission.
    event ProposalCreated(
        uint256 proposalId,
        address proposer,
        address[] targets,
        uint256[] values,
        string[] signatures,
        bytes[] calldatas,
        uint256 voteStart,
        uint256 voteEnd,
        string description
    );

    event ProposalExecuted(uint256 proposalId);

    /// Governor vote. `support` is 0 against, 1 for, 2 abstain.
    event VoteCast(address indexed voter, uint256 proposalId, uint8 support, uint256 weight, string reason);
}

const SUPPORT_FOR: u8 = 1;

#[derive(Debug, Clone)]
pub struct EventClassifier {
    table: HashMap<B256, EventKind>,
}

impl Default for EventClassifier {
    fn default() -> Self {
        let table = [
            (Upgraded::SIGNATURE_HASH, EventKind::UpgradeExecuted),
            (ProposalCreated::SIGNATURE_HASH, EventKind::UpgradeProposed),
            (ProposalExecuted::SIGNATURE_HASH, EventKind::UpgradeExecuted),
            (VoteCast::SIGNATURE_HASH, EventKind::GovernanceVote),
        ]
        .into_iter()
        .collect();
        Self { table }
    }
}

impl EventClassifier {
    /// Default table extended (or overridden) by `extra`.
    #[must_use]
    pub fn with_signatures(extra: impl IntoIterator<Item = (B256, EventKind)>) -> Self {
        let mut classifier = Self::default();
        classifier.table.extend(extra);
        classifier
    }

    #[must_use]
    pub fn kind_of(&self, topic0: &B256) -> Option<EventKind> {
        self.table.get(topic0).copied()
    }

    #[must_use]
    pub fn classify(&self, log: &RawLog) -> EventPayload {
        let topics: Vec<B256> = match log.topics.iter().map(|t| t.parse::<B256>()).collect() {
            Ok(topics) => topics,
            Err(e) => return other(log, &format!("malformed topic: {e}")),
        };
        let Some(&topic0) = topics.first() else {
            return other(log, "log has no topics");
        };
        let Some(kind) = self.kind_of(&topic0) else {
            return other(log, "unknown event signature");
        };
        let data = match hex::decode(&log.data) {
            Ok(data) => data,
            Err(e) => return other(log, &format!("malformed data: {e}")),
        };
        decode(kind, &topics, &data).unwrap_or_else(|reason| other(log, &reason))
    }
}

fn decode(kind: EventKind, topics: &[B256], data: &[u8]) -> Result<EventPayload, String> {
    let topic0 = topics[0];
    let topics = topics.iter().copied();

    if topic0 == Upgraded::SIGNATURE_HASH && kind == EventKind::UpgradeExecuted {
        let event = Upgraded::decode_raw_log(topics, data).map_err(|e| failure::<Upgraded>(&e))?;
        return Ok(EventPayload::UpgradeExecuted {
            proposal_id: None,
            implementation: Some(address(&event.implementation)),
        });
    }
    if topic0 == ProposalCreated::SIGNATURE_HASH && kind == EventKind::UpgradeProposed {
        let event =
            ProposalCreated::decode_raw_log(topics, data).map_err(|e| failure::<ProposalCreated>(&e))?;
        return Ok(EventPayload::UpgradeProposed {
            proposal_id: Some(proposal_id(event.proposalId)),
            calldata_bytes: data.len(),
        });
    }
    if topic0 == ProposalExecuted::SIGNATURE_HASH && kind == EventKind::UpgradeExecuted {
        let event =
            ProposalExecuted::decode_raw_log(topics, data).map_err(|e| failure::<ProposalExecuted>(&e))?;
        return Ok(EventPayload::UpgradeExecuted {
            proposal_id: Some(proposal_id(event.proposalId)),
            implementation: None,
        });
    }
    if topic0 == VoteCast::SIGNATURE_HASH && kind == EventKind::GovernanceVote {
        let event = VoteCast::decode_raw_log(topics, data).map_err(|e| failure::<VoteCast>(&e))?;
        return Ok(EventPayload::GovernanceVote {
            proposal_id: proposal_id(event.proposalId),
            voter: address(&event.voter),
            support: event.support == SUPPORT_FOR,
        });
    }

    // Configured signatures: only the leading id word is assumed.
    match kind {
        EventKind::UpgradeExecuted => leading_id(data)
            .map(|id| EventPayload::UpgradeExecuted {
                proposal_id: Some(id),
                implementation: None,
            })
            .ok_or_else(|| "execution log without a leading id word".to_string()),
        EventKind::UpgradeProposed => leading_id(data)
            .map(|id| EventPayload::UpgradeProposed {
                proposal_id: Some(id),
                calldata_bytes: data.len(),
            })
            .ok_or_else(|| "proposal log without a leading id word".to_string()),
        EventKind::ParameterChange => Ok(EventPayload::ParameterChange {
            signature: hex::encode_prefixed(topic0),
            calldata_bytes: data.len(),
        }),
        EventKind::GovernanceVote => Err("vote signature with an unknown layout".to_string()),
        EventKind::Other => Err("signature mapped to other".to_string()),
    }
}

fn failure<E: SolEvent>(error: &alloy_sol_types::Error) -> String {
    format!("{}: {error}", E::SIGNATURE)
}

fn proposal_id(value: U256) -> ProposalId {
    ProposalId::new(value.to_string())
}

fn leading_id(data: &[u8]) -> Option<ProposalId> {
    let word = data.get(..32)?;
    U256::try_from_be_slice(word).map(proposal_id)
}

fn address(value: &Address) -> String {
    hex::encode_prefixed(value)
}

fn other(log: &RawLog, reason: &str) -> EventPayload {
    EventPayload::Other {
        reason: reason.to_string(),
        topics: log.topics.clone(),
        data: log.data.clone(),
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, Bytes};

    use super::*;

    fn log(topics: Vec<String>, data: String) -> RawLog {
        RawLog {
            address: "0xabc".into(),
            topics,
            data,
            block_number: 10,
            tx_hash: "0x01".into(),
            log_index: 0,
        }
    }

    fn encoded(event: &impl SolEvent) -> RawLog {
        let data = event.encode_log_data();
        log(
            data.topics().iter().map(hex::encode_prefixed).collect(),
            hex::encode_prefixed(&data.data),
        )
    }

    fn proposal(id: u64) -> ProposalCreated {
        ProposalCreated {
            proposalId: U256::from(id),
            proposer: Address::ZERO,
            targets: vec![address!("00000000000000000000000000000000000000aa")],
            values: vec![U256::ZERO],
            signatures: vec!["upgradeTo(address)".into()],
            calldatas: vec![Bytes::from_static(&[0xde, 0xad])],
            voteStart: U256::from(100),
            voteEnd: U256::from(200),
            description: "Upgrade pool implementation".into(),
        }
    }

    #[test]
    fn upgraded_decodes_implementation() {
        let event = Upgraded {
            implementation: address!("aabbccddeeff00112233445566778899aabbccdd"),
        };
        let payload = EventClassifier::default().classify(&encoded(&event));
        assert_eq!(
            payload,
            EventPayload::UpgradeExecuted {
                proposal_id: None,
                implementation: Some("0xaabbccddeeff00112233445566778899aabbccdd".into()),
            }
        );
    }

    #[test]
    fn proposal_created_carries_id_and_size() {
        let raw = encoded(&proposal(42));
        let payload = EventClassifier::default().classify(&raw);
        assert_eq!(payload.kind(), EventKind::UpgradeProposed);
        assert_eq!(payload.proposal_id().map(ProposalId::as_str), Some("42"));
        assert_eq!(payload.size_hint(), (raw.data.len() - 2) / 2);
    }

    #[test]
    fn vote_cast_reads_support() {
        let event = VoteCast {
            voter: address!("00000000000000000000000000000000000000bb"),
            proposalId: U256::from(9),
            support: 1,
            weight: U256::from(1000),
            reason: String::new(),
        };
        match EventClassifier::default().classify(&encoded(&event)) {
            EventPayload::GovernanceVote {
                proposal_id,
                support,
                voter,
            } => {
                assert_eq!(proposal_id.as_str(), "9");
                assert_eq!(voter, "0x00000000000000000000000000000000000000bb");
                assert!(support);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn large_proposal_ids_stay_decimal() {
        let mut event = proposal(0);
        event.proposalId = U256::MAX;
        let payload = EventClassifier::default().classify(&encoded(&event));
        assert_eq!(
            payload.proposal_id().map(ProposalId::as_str),
            Some(U256::MAX.to_string().as_str())
        );
    }

    #[test]
    fn malformed_known_signature_is_other_with_reason() {
        let topic = hex::encode_prefixed(ProposalExecuted::SIGNATURE_HASH);
        let payload = EventClassifier::default().classify(&log(vec![topic.clone()], "0x1234".into()));
        match payload {
            EventPayload::Other { reason, .. } => assert!(reason.contains("ProposalExecuted")),
            other => panic!("unexpected payload {other:?}"),
        }

        let bad_hex = EventClassifier::default().classify(&log(vec![topic], "0xzz".into()));
        assert_eq!(bad_hex.kind(), EventKind::Other);
    }

    #[test]
    fn unknown_signature_and_missing_topics_are_other() {
        let classifier = EventClassifier::default();
        let unknown = hex::encode_prefixed(B256::repeat_byte(0x11));
        assert_eq!(classifier.classify(&log(vec![unknown], "0x".into())).kind(), EventKind::Other);
        assert_eq!(classifier.classify(&log(vec!["0xdead".into()], "0x".into())).kind(), EventKind::Other);
        assert_eq!(classifier.classify(&log(vec![], "0x".into())).kind(), EventKind::Other);
    }

    #[test]
    fn configured_signature_maps_to_parameter_change() {
        let topic = B256::repeat_byte(0xbe);
        let classifier = EventClassifier::with_signatures([(topic, EventKind::ParameterChange)]);
        let payload = classifier.classify(&log(vec![hex::encode_prefixed(topic)], "0x00ff".into()));
        assert_eq!(
            payload,
            EventPayload::ParameterChange {
                signature: hex::encode_prefixed(topic),
                calldata_bytes: 2,
            }
        );
    }
}
