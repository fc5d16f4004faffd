use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeMap;

/// Body of `GET /api/summary`.
///
/// Only `ticket_transfers` is required. The remaining top-level fields are
/// sent by the summary server but every figure on the board is recomputed
/// from the transfers and holdings themselves.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub ticket_transfers: Vec<TicketTransfer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hodl_tickets: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hodl_addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tickets: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_hodl_tickets: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketTransfer {
    pub sender: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TicketTransfer {
    pub fn new(sender: impl Into<String>, amount: f64) -> Self {
        Self {
            sender: sender.into(),
            amount,
            timestamp: None,
            tx_hash: None,
            comment: None,
        }
    }
}

/// Everything the board shows, derived from one payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TicketSummary {
    /// Per-sender sums, largest first.
    pub regular: Vec<(String, f64)>,
    pub regular_total: f64,
    /// HODL holdings, largest first.
    pub hodl: Vec<(String, f64)>,
    pub hodl_total: f64,
}

impl TicketSummary {
    pub fn from_payload(payload: &SummaryPayload) -> Self {
        let (per_sender, regular_total) = sum_by_sender(&payload.ticket_transfers);
        let regular = sorted_desc(per_sender);

        let hodl = payload
            .hodl_tickets
            .as_ref()
            .map(|tickets| {
                sorted_desc(tickets.iter().map(|(addr, count)| (addr.clone(), *count)))
            })
            .unwrap_or_default();
        let hodl_total = hodl.iter().map(|(_, count)| count).sum();

        Self {
            regular,
            regular_total,
            hodl,
            hodl_total,
        }
    }

    pub fn regular_total_text(&self) -> String {
        format_total(self.regular_total)
    }

    pub fn hodl_total_text(&self) -> String {
        format_total(self.hodl_total)
    }
}

/// Single pass over the transfers: per-sender sums plus the grand total.
pub fn sum_by_sender(transfers: &[TicketTransfer]) -> (BTreeMap<String, f64>, f64) {
    let mut per_sender: BTreeMap<String, f64> = BTreeMap::new();
    let mut total = 0.0;
    for transfer in transfers {
        *per_sender.entry(transfer.sender.clone()).or_insert(0.0) += transfer.amount;
        total += transfer.amount;
    }
    (per_sender, total)
}

// stable sort, so equal values keep the map's (address) order
fn sorted_desc(entries: impl IntoIterator<Item = (String, f64)>) -> Vec<(String, f64)> {
    entries
        .into_iter()
        .sorted_by(|a, b| b.1.total_cmp(&a.1))
        .collect()
}

pub fn format_total(total: f64) -> String {
    if total == 0.0 {
        String::from("0")
    } else {
        format_amount(total)
    }
}

pub fn format_amount(value: f64) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;

    fn payload(
        transfers: &[(&str, f64)],
        hodl: Option<&[(&str, f64)]>,
    ) -> SummaryPayload {
        SummaryPayload {
            ticket_transfers: transfers
                .iter()
                .map(|(sender, amount)| TicketTransfer::new(*sender, *amount))
                .collect(),
            hodl_tickets: hodl.map(|entries| {
                entries
                    .iter()
                    .map(|(addr, count)| (addr.to_string(), *count))
                    .collect()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn from_payload__aggregates_and_sorts_example_payload() {
        // given
        let payload = payload(
            &[("X", 5.0), ("X", 3.0), ("Y", 10.0)],
            Some(&[("Z", 7.0)]),
        );

        // when
        let summary = TicketSummary::from_payload(&payload);

        // then
        assert_eq!(summary.regular_total_text(), "18");
        assert_eq!(
            summary.regular,
            vec![("Y".to_string(), 10.0), ("X".to_string(), 8.0)]
        );
        assert_eq!(summary.hodl_total_text(), "7");
        assert_eq!(summary.hodl, vec![("Z".to_string(), 7.0)]);
    }

    #[test]
    fn from_payload__empty_transfers_and_missing_hodl_render_zeroes() {
        // given
        let payload = payload(&[], None);

        // when
        let summary = TicketSummary::from_payload(&payload);

        // then
        assert_eq!(summary.regular_total_text(), "0");
        assert_eq!(summary.hodl_total_text(), "0");
        assert!(summary.regular.is_empty());
        assert!(summary.hodl.is_empty());
    }

    #[test]
    fn from_payload__equal_values_are_ordered_by_address() {
        // given
        let payload = payload(
            &[("carol", 2.0), ("alice", 2.0), ("bob", 5.0)],
            Some(&[("zed", 1.0), ("amy", 1.0)]),
        );

        // when
        let summary = TicketSummary::from_payload(&payload);

        // then
        let senders: Vec<_> = summary.regular.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(senders, vec!["bob", "alice", "carol"]);
        let holders: Vec<_> = summary.hodl.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(holders, vec!["amy", "zed"]);
    }

    #[test]
    fn sum_by_sender__sums_repeated_senders() {
        // given
        let transfers = vec![
            TicketTransfer::new("X", 5.0),
            TicketTransfer::new("X", 3.0),
            TicketTransfer::new("Y", 10.0),
        ];

        // when
        let (per_sender, total) = sum_by_sender(&transfers);

        // then
        assert_eq!(per_sender.get("X"), Some(&8.0));
        assert_eq!(per_sender.get("Y"), Some(&10.0));
        assert_eq!(total, 18.0);
    }

    #[test]
    fn format_total__uses_plain_numeric_text() {
        assert_eq!(format_total(0.0), "0");
        assert_eq!(format_total(-0.0), "0");
        assert_eq!(format_total(18.0), "18");
        assert_eq!(format_total(2.5), "2.5");
        assert_eq!(format_total(-3.0), "-3");
    }

    #[test]
    fn deserialize__missing_or_null_hodl_tickets_is_empty() {
        // given
        let absent = r#"{"ticket_transfers": []}"#;
        let null = r#"{"ticket_transfers": [], "hodl_tickets": null}"#;

        // when
        let absent: SummaryPayload = serde_json::from_str(absent).unwrap();
        let null: SummaryPayload = serde_json::from_str(null).unwrap();

        // then
        assert!(TicketSummary::from_payload(&absent).hodl.is_empty());
        assert!(TicketSummary::from_payload(&null).hodl.is_empty());
    }

    #[test]
    fn deserialize__accepts_full_server_payload() {
        // given
        let body = r#"{
            "ticket_transfers": [
                {
                    "sender": "EQAbc",
                    "amount": 2.0,
                    "timestamp": 1749646400,
                    "tx_hash": "9f2e",
                    "comment": "hodl"
                }
            ],
            "hodl_addresses": ["EQAbc"],
            "hodl_tickets": {"EQAbc": 3},
            "total_tickets": 2.0,
            "total_hodl_tickets": 3,
            "unrelated": true
        }"#;

        // when
        let payload: SummaryPayload = serde_json::from_str(body).unwrap();

        // then
        let transfer = &payload.ticket_transfers[0];
        assert_eq!(transfer.timestamp, Some(1749646400));
        assert_eq!(transfer.comment.as_deref(), Some("hodl"));
        assert_eq!(payload.hodl_addresses, vec!["EQAbc".to_string()]);
        let summary = TicketSummary::from_payload(&payload);
        assert_eq!(summary.regular_total_text(), "2");
        assert_eq!(summary.hodl_total_text(), "3");
    }

    #[test]
    fn deserialize__transfer_without_amount_is_rejected() {
        let body = r#"{"ticket_transfers": [{"sender": "EQAbc"}]}"#;
        assert!(serde_json::from_str::<SummaryPayload>(body).is_err());
    }

    fn transfers_strategy() -> impl Strategy<Value = Vec<(String, u32)>> {
        prop::collection::vec(("[a-e]{1,2}", 0u32..10_000), 0..40)
    }

    proptest! {
        #[test]
        fn from_payload__regular_total_matches_transfers_and_summary(
            entries in transfers_strategy()
        ) {
            let payload = SummaryPayload {
                ticket_transfers: entries
                    .iter()
                    .map(|(sender, amount)| TicketTransfer::new(sender.clone(), *amount as f64))
                    .collect(),
                ..Default::default()
            };

            let summary = TicketSummary::from_payload(&payload);

            let transfer_sum: f64 = entries.iter().map(|(_, a)| *a as f64).sum();
            let summary_sum: f64 = summary.regular.iter().map(|(_, v)| v).sum();
            prop_assert_eq!(summary.regular_total, transfer_sum);
            prop_assert_eq!(summary.regular_total, summary_sum);
        }

        #[test]
        fn from_payload__rows_never_increase(
            entries in transfers_strategy(),
            hodl in prop::collection::btree_map("[a-z]{1,6}", 0u32..500, 0..20)
        ) {
            let payload = SummaryPayload {
                ticket_transfers: entries
                    .iter()
                    .map(|(sender, amount)| TicketTransfer::new(sender.clone(), *amount as f64))
                    .collect(),
                hodl_tickets: Some(hodl.iter().map(|(k, v)| (k.clone(), *v as f64)).collect()),
                ..Default::default()
            };

            let summary = TicketSummary::from_payload(&payload);

            prop_assert!(summary.regular.windows(2).all(|w| w[0].1 >= w[1].1));
            prop_assert!(summary.hodl.windows(2).all(|w| w[0].1 >= w[1].1));
            prop_assert_eq!(summary.hodl.len(), hodl.len());
        }
    }
}
