use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest<'a> {
    #[serde(rename = "ApplicantUsername")]
    pub username: &'a str,
    #[serde(rename = "ApplicantPassword")]
    pub password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsResponse {
    pub message: TransactionsMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsMessage {
    pub payload: TransactionsPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsPayload {
    #[serde(rename = "transList", default)]
    pub trans_list: Vec<LendingTransaction>,
}

/// One record of the unified transaction history.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LendingTransaction {
    #[serde(default)]
    pub classification: String,
    #[serde(default)]
    pub principal: Option<Decimal>,
    #[serde(default)]
    pub net_interest: Option<Decimal>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub borrower_name: Option<String>,
    #[serde(default)]
    pub loan_id: Option<serde_json::Value>,
    #[serde(default)]
    pub transaction_date: String,
}

/// Classifications that move cash in or out of the client account and
/// never touch a loan.
pub const EXCLUDED_CLASSIFICATIONS: [&str; 3] = [
    "depositDomestic",
    "withdrawalRequestedByUser",
    "withdrawalDomesticForced",
];

/// Cash leaving the client account to fund a loan.
pub const LOAN_FUNDING: &str = "withdrawalActiveLoan";

impl LendingTransaction {
    pub fn is_excluded(&self) -> bool {
        EXCLUDED_CLASSIFICATIONS.contains(&self.classification.as_str())
    }

    /// Instrument name: `borrower - (loanId)`.
    pub fn instrument_name(&self) -> String {
        let loan_id = match &self.loan_id {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        format!(
            "{} - ({})",
            self.borrower_name.as_deref().unwrap_or_default(),
            loan_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_transactions_payload() {
        let json = r#"{
            "message": {
                "payload": {
                    "transList": [
                        {
                            "classification": "withdrawalActiveLoan",
                            "principal": null,
                            "netInterest": null,
                            "amount": -5000,
                            "borrowerName": "Byggmester AS",
                            "loanId": 1234,
                            "transactionDate": "2023-03-01"
                        }
                    ]
                }
            }
        }"#;
        let response: TransactionsResponse = serde_json::from_str(json).unwrap();
        let record = &response.message.payload.trans_list[0];
        assert_eq!(record.amount, Some(dec!(-5000)));
        assert_eq!(record.instrument_name(), "Byggmester AS - (1234)");
        assert!(!record.is_excluded());
    }

    #[test]
    fn test_login_request_field_names() {
        let body = serde_json::to_value(LoginRequest {
            username: "me@example.com",
            password: "pw",
        })
        .unwrap();
        assert_eq!(body["ApplicantUsername"], "me@example.com");
        assert_eq!(body["ApplicantPassword"], "pw");
    }
}
