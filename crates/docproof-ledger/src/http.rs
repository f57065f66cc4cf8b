//! HTTP implementation of the Ledger trait.
//!
//! Talks to a Horizon-style REST API:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | `load_account` | `GET accounts/{address}` |
//! | `submit` | `POST transactions` with `{"tx": <base64 envelope>}` |
//! | `query_transactions` | `GET accounts/{address}/transactions` or `GET transactions` |
//! | `transaction_operations` | `GET transactions/{id}/operations` |

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use docproof_core::{Address, TransactionId};

use crate::envelope::SignedEnvelope;
use crate::error::{LedgerError, Result};
use crate::model::{
    AccountSnapshot, Operation, SubmitReceipt, TransactionFilter, TransactionQuery,
    TransactionSummary, MAX_PAGE_LIMIT,
};
use crate::traits::Ledger;

/// REST client for a ledger node or gateway.
#[derive(Clone)]
pub struct HttpLedger {
    base_url: Url,
    http: Client,
}

impl HttpLedger {
    /// Create a client for the given base URL (e.g. `https://horizon-testnet.stellar.org/`).
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        Self::with_http_client(
            base_url,
            Client::builder().timeout(Duration::from_secs(30)).build()?,
        )
    }

    /// Use an existing reqwest client (custom TLS, proxies, middleware).
    pub fn with_http_client(base_url: impl AsRef<str>, http: Client) -> Result<Self> {
        let mut url = Url::parse(base_url.as_ref())?;
        if !url.path().ends_with('/') {
            let mut path = url.path().trim_end_matches('/').to_owned();
            path.push('/');
            url.set_path(&path);
        }
        Ok(Self {
            base_url: url,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL for a transaction stream query.
    pub fn transactions_url(&self, query: &TransactionQuery) -> Result<Url> {
        let path = match &query.filter {
            TransactionFilter::Account(address) => format!("accounts/{address}/transactions"),
            TransactionFilter::Network => "transactions".to_string(),
        };
        let mut url = self.base_url.join(&path)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("order", query.order.as_str());
            pairs.append_pair("limit", &query.limit.min(MAX_PAGE_LIMIT).to_string());
            if let Some(cursor) = &query.cursor {
                pairs.append_pair("cursor", cursor);
            }
        }
        Ok(url)
    }

    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let response = self.http.get(url).send().await?;
        Self::map_response(response).await
    }

    async fn map_response<T>(response: Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        if !response.status().is_success() {
            return Err(Self::map_api_error(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    async fn map_api_error(response: Response) -> LedgerError {
        let status = response.status();
        let bytes = response.bytes().await.unwrap_or_default();
        map_error_body(status, &bytes)
    }
}

/// Translate a non-success response body into a ledger error.
fn map_error_body(status: StatusCode, body: &[u8]) -> LedgerError {
    let problem = serde_json::from_slice::<ProblemResponse>(body).ok();

    if status == StatusCode::NOT_FOUND {
        let detail = problem
            .and_then(|p| p.detail.or(p.title))
            .unwrap_or_else(|| "resource missing".into());
        return LedgerError::NotFound(detail);
    }

    if let Some(codes) = problem
        .as_ref()
        .and_then(|p| p.extras.as_ref())
        .and_then(|e| e.result_codes.as_ref())
    {
        return LedgerError::Rejected {
            code: codes.transaction.clone(),
            operation_codes: codes.operations.clone().unwrap_or_default(),
        };
    }

    if status == StatusCode::BAD_REQUEST {
        let detail = problem
            .and_then(|p| p.detail.or(p.title))
            .unwrap_or_else(|| String::from_utf8_lossy(body).to_string());
        return LedgerError::BadRequest(detail);
    }

    let message = problem
        .and_then(|p| p.detail.or(p.title))
        .unwrap_or_else(|| String::from_utf8_lossy(body).to_string());
    LedgerError::Server {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn load_account(&self, address: &Address) -> Result<AccountSnapshot> {
        let url = self.base_url.join(&format!("accounts/{address}"))?;
        self.get_json::<AccountResponse>(url).await?.try_into()
    }

    async fn submit(&self, envelope: &SignedEnvelope) -> Result<SubmitReceipt> {
        let url = self.base_url.join("transactions")?;
        let body = SubmitRequest {
            tx: envelope.to_base64()?,
        };
        debug!(source = %envelope.envelope.source, "submitting transaction");
        let response = self.http.post(url).json(&body).send().await?;
        let accepted: SubmitResponse = Self::map_response(response).await?;
        Ok(SubmitReceipt {
            transaction_id: TransactionId::new(accepted.hash),
            ledger: accepted.ledger,
        })
    }

    async fn query_transactions(
        &self,
        query: &TransactionQuery,
    ) -> Result<Vec<TransactionSummary>> {
        let url = self.transactions_url(query)?;
        let page: PageResponse<TransactionRecord> = self.get_json(url).await?;
        page.embedded
            .records
            .into_iter()
            .map(TransactionSummary::try_from)
            .collect()
    }

    async fn transaction_operations(&self, id: &TransactionId) -> Result<Vec<Operation>> {
        let mut url = self.base_url.join(&format!("transactions/{id}/operations"))?;
        url.query_pairs_mut()
            .append_pair("limit", &MAX_PAGE_LIMIT.to_string());
        let page: PageResponse<OperationRecord> = self.get_json(url).await?;
        page.embedded
            .records
            .into_iter()
            .map(Operation::try_from)
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SubmitRequest {
    tx: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    hash: String,
    ledger: u32,
}

#[derive(Debug, Deserialize)]
struct ProblemResponse {
    title: Option<String>,
    detail: Option<String>,
    extras: Option<ProblemExtras>,
}

#[derive(Debug, Deserialize)]
struct ProblemExtras {
    result_codes: Option<ResultCodes>,
}

#[derive(Debug, Deserialize)]
struct ResultCodes {
    transaction: String,
    operations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account_id: String,
    sequence: String,
    #[serde(default)]
    data: HashMap<String, String>,
}

impl TryFrom<AccountResponse> for AccountSnapshot {
    type Error = LedgerError;

    fn try_from(value: AccountResponse) -> Result<Self> {
        let sequence = value
            .sequence
            .parse::<u64>()
            .map_err(|_| LedgerError::Decode(format!("invalid sequence {:?}", value.sequence)))?;
        let mut data = BTreeMap::new();
        for (key, encoded) in value.data {
            let decoded = STANDARD.decode(&encoded).map_err(|e| {
                LedgerError::Decode(format!("data entry {key:?} is not base64: {e}"))
            })?;
            data.insert(key, Bytes::from(decoded));
        }
        Ok(AccountSnapshot {
            address: Address::new(value.account_id),
            sequence,
            data,
        })
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse<T> {
    #[serde(rename = "_embedded")]
    embedded: Embedded<T>,
}

#[derive(Debug, Deserialize)]
struct Embedded<T> {
    records: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TransactionRecord {
    hash: String,
    paging_token: String,
    successful: bool,
    source_account: String,
    created_at: DateTime<Utc>,
    ledger: u32,
}

impl TryFrom<TransactionRecord> for TransactionSummary {
    type Error = LedgerError;

    fn try_from(value: TransactionRecord) -> Result<Self> {
        Ok(TransactionSummary {
            id: TransactionId::new(value.hash),
            source: Address::new(value.source_account),
            created_at: value.created_at,
            ledger: value.ledger,
            paging_token: value.paging_token,
            successful: value.successful,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OperationRecord {
    #[serde(rename = "type")]
    kind: String,
    source_account: Option<String>,
    name: Option<String>,
    value: Option<String>,
    function: Option<String>,
    contract_id: Option<String>,
    #[serde(default)]
    parameters: Vec<ParameterRecord>,
}

#[derive(Debug, Deserialize)]
struct ParameterRecord {
    value: String,
}

impl TryFrom<OperationRecord> for Operation {
    type Error = LedgerError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        let source = record.source_account.map(Address::new);
        match record.kind.as_str() {
            "manage_data" => {
                let name = record
                    .name
                    .ok_or_else(|| LedgerError::Decode("manage_data without name".into()))?;
                let value = record
                    .value
                    .map(|v| STANDARD.decode(v).map(Bytes::from))
                    .transpose()
                    .map_err(|e| LedgerError::Decode(format!("manage_data value: {e}")))?;
                Ok(Operation::ManageData {
                    source,
                    name,
                    value,
                })
            }
            "invoke_host_function" => Ok(Operation::InvokeContract {
                source,
                contract: record.contract_id.unwrap_or_default(),
                function: record.function.unwrap_or_default(),
                args: record.parameters.into_iter().map(|p| p.value).collect(),
            }),
            other => Ok(Operation::Other {
                kind: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Order;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let ledger = HttpLedger::new("https://horizon.example.org/api").unwrap();
        assert_eq!(ledger.base_url().as_str(), "https://horizon.example.org/api/");
    }

    #[test]
    fn test_transactions_url() {
        let ledger = HttpLedger::new("https://horizon.example.org/").unwrap();
        let query = TransactionQuery {
            filter: TransactionFilter::Account(Address::new("GABC")),
            order: Order::Descending,
            limit: 500,
            cursor: Some("12345".into()),
        };
        let url = ledger.transactions_url(&query).unwrap();
        assert_eq!(
            url.as_str(),
            "https://horizon.example.org/accounts/GABC/transactions?order=desc&limit=200&cursor=12345"
        );

        let network = ledger
            .transactions_url(&TransactionQuery::network(10))
            .unwrap();
        assert_eq!(
            network.as_str(),
            "https://horizon.example.org/transactions?order=desc&limit=10"
        );
    }

    #[test]
    fn test_account_response_decodes_data() {
        let json = r#"{
            "account_id": "GABC",
            "sequence": "4294967296",
            "data": { "doc:ContractV1": "YWJj" }
        }"#;
        let response: AccountResponse = serde_json::from_str(json).unwrap();
        let snapshot = AccountSnapshot::try_from(response).unwrap();
        assert_eq!(snapshot.sequence, 4294967296);
        assert_eq!(snapshot.data["doc:ContractV1"].as_ref(), b"abc");
    }

    #[test]
    fn test_operation_records() {
        let json = r#"{
            "_embedded": { "records": [
                { "type": "manage_data", "source_account": "GABC", "name": "doc:a", "value": "YWJj" },
                { "type": "invoke_host_function", "function": "register_document",
                  "contract_id": "CREG", "parameters": [ {"value": "GABC"}, {"value": "ff"}, {"value": "a"} ] },
                { "type": "payment" }
            ] }
        }"#;
        let page: PageResponse<OperationRecord> = serde_json::from_str(json).unwrap();
        let ops: Vec<Operation> = page
            .embedded
            .records
            .into_iter()
            .map(|r| Operation::try_from(r).unwrap())
            .collect();

        assert!(matches!(&ops[0], Operation::ManageData { name, .. } if name == "doc:a"));
        assert!(matches!(&ops[1], Operation::InvokeContract { args, .. } if args.len() == 3));
        assert!(matches!(&ops[2], Operation::Other { kind } if kind == "payment"));
    }

    #[test]
    fn test_error_mapping() {
        let not_found = map_error_body(StatusCode::NOT_FOUND, br#"{"title":"Resource Missing"}"#);
        assert!(matches!(not_found, LedgerError::NotFound(_)));

        let rejected = map_error_body(
            StatusCode::BAD_REQUEST,
            br#"{"title":"Transaction Failed","extras":{"result_codes":{"transaction":"tx_failed","operations":["op_already_exists"]}}}"#,
        );
        assert!(rejected.is_entry_exists());

        let server = map_error_body(StatusCode::BAD_GATEWAY, b"upstream down");
        assert!(matches!(server, LedgerError::Server { status: 502, .. }));
    }
}
