//! HTTP relay for contract reads
//!
//! The chart panel reads the funder list through a relay endpoint instead of
//! calling the node directly: `POST /relay/read-contract` with
//! `{ address, abi, functionName, args }`, answered with the decoded result
//! as JSON. A non-2xx answer to `getFunder` means "no more data".

use crate::core::aggregation::FunderSource;
use crate::core::types::{address_hex, parse_address, Address, U256};
use crate::error::{DashboardError, Result};
use crate::network::abi::ContractFunction;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};

/// Path of the read endpoint on the relay
pub const READ_CONTRACT_PATH: &str = "/relay/read-contract";

/// Request body sent to the relay
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadContractRequest {
    pub address: Address,
    pub abi: Vec<Value>,
    pub function_name: &'static str,
    pub args: Vec<Value>,
}

impl ReadContractRequest {
    pub fn new(address: Address, function: ContractFunction, args: Vec<Value>) -> Result<Self> {
        Ok(ReadContractRequest {
            address,
            abi: vec![function.abi_fragment()?],
            function_name: function.name(),
            args,
        })
    }
}

pub struct RelayClient {
    http: Client,
    endpoint: String,
    contract: Address,
}

impl RelayClient {
    pub fn new(base_url: &str, contract: Address) -> Result<RelayClient> {
        let http = Client::builder()
            .user_agent("fundme-dashboard")
            .build()
            .map_err(|e| DashboardError::Relay(format!("build http client: {e}")))?;
        Ok(RelayClient {
            http,
            endpoint: format!("{}{READ_CONTRACT_PATH}", base_url.trim_end_matches('/')),
            contract,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn read(&self, function: ContractFunction, args: Vec<Value>) -> Result<Value> {
        let body = ReadContractRequest::new(self.contract, function, args)?;
        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| DashboardError::Relay(format!("{}: {e}", function.name())))?;

        let status = response.status();
        if !status.is_success() {
            debug!("relay {} answered {status}", function.name());
            return Err(DashboardError::RelayStatus {
                function: function.name().to_string(),
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| DashboardError::Relay(format!("{}: bad body: {e}", function.name())))
    }
}

/// A relay address result; `null` or empty reads as the null address
pub fn address_from_json(value: &Value) -> Result<Address> {
    match value {
        Value::Null => Ok(Address::zero()),
        Value::String(s) if s.is_empty() => Ok(Address::zero()),
        Value::String(s) => parse_address(s),
        other => Err(DashboardError::Relay(format!("expected address, got {other}"))),
    }
}

/// A relay integer result: bigints arrive as decimal strings, small values as numbers
pub fn amount_from_json(value: &Value) -> Result<U256> {
    match value {
        Value::Null => Ok(U256::zero()),
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| DashboardError::Relay(format!("expected unsigned amount, got {n}"))),
        Value::String(s) => U256::from_dec_str(s.trim_end_matches('n'))
            .map_err(|_| DashboardError::Relay(format!("expected unsigned amount, got {s}"))),
        other => Err(DashboardError::Relay(format!("expected amount, got {other}"))),
    }
}

#[async_trait]
impl FunderSource for RelayClient {
    async fn funder_at(&self, index: u64) -> Result<Address> {
        let value = self.read(ContractFunction::FunderAt, vec![json!(index)]).await?;
        address_from_json(&value)
    }

    async fn amount_funded_by(&self, funder: &Address) -> Result<U256> {
        let value = self
            .read(ContractFunction::AmountFundedBy, vec![json!(address_hex(funder))])
            .await?;
        amount_from_json(&value)
    }

    fn is_end_of_data(&self, error: &DashboardError) -> bool {
        matches!(error, DashboardError::RelayStatus { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregation::{aggregate_funders, ScanEnd, CHART_FUNDER_CAP};
    use crate::testnet::http_stub::HttpStub;

    fn contract() -> Address {
        parse_address("0x00000000000000000000000000000000000000c0").unwrap()
    }

    /// Relay over a two-entry funder array; anything past it answers 500
    async fn two_funder_relay() -> HttpStub {
        HttpStub::start(|request| match request["functionName"].as_str() {
            Some("getFunder") => match request["args"][0].as_u64() {
                Some(i) if i < 2 => (200, json!(format!("0x{:040x}", i + 1)).to_string()),
                _ => (500, json!({ "error": "execution reverted" }).to_string()),
            },
            Some("getAddressToAmountFunded") => (200, json!("1000000000000000000").to_string()),
            _ => (404, String::new()),
        })
        .await
    }

    #[test]
    fn test_request_body_shape() {
        let body = ReadContractRequest::new(contract(), ContractFunction::FunderAt, vec![json!(2)]).unwrap();
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["address"], "0x00000000000000000000000000000000000000c0");
        assert_eq!(value["functionName"], "getFunder");
        assert_eq!(value["args"], json!([2]));
        assert_eq!(value["abi"][0]["name"], "getFunder");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = RelayClient::new("http://localhost:5000/", Address::zero()).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:5000/relay/read-contract");
    }

    #[test]
    fn test_address_from_json() {
        assert!(address_from_json(&Value::Null).unwrap().is_zero());
        assert!(address_from_json(&json!("0x0000000000000000000000000000000000000000"))
            .unwrap()
            .is_zero());
        assert!(address_from_json(&json!(5)).is_err());
        assert!(address_from_json(&json!("0x12")).is_err());
    }

    #[test]
    fn test_amount_from_json() {
        assert_eq!(
            amount_from_json(&json!("1500000000000000000")).unwrap(),
            U256::from(1_500_000_000_000_000_000u64)
        );
        assert_eq!(amount_from_json(&json!("42n")).unwrap(), U256::from(42u32));
        assert_eq!(amount_from_json(&json!(42)).unwrap(), U256::from(42u32));
        assert_eq!(amount_from_json(&Value::Null).unwrap(), U256::zero());
        assert!(amount_from_json(&json!(-1)).is_err());
        assert!(amount_from_json(&json!("abc")).is_err());
    }

    #[tokio::test]
    async fn test_read_posts_function_and_args() {
        let relay = two_funder_relay().await;
        let client = RelayClient::new(&relay.url(), contract()).unwrap();

        let value = client.read(ContractFunction::FunderAt, vec![json!(1)]).await.unwrap();
        assert_eq!(value, json!("0x0000000000000000000000000000000000000002"));

        let sent = relay.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["address"], "0x00000000000000000000000000000000000000c0");
        assert_eq!(sent[0]["abi"][0]["outputs"][0]["type"], "address");
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported_structurally() {
        let relay = two_funder_relay().await;
        let client = RelayClient::new(&relay.url(), contract()).unwrap();

        let err = client
            .read(ContractFunction::FunderAt, vec![json!(2)])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DashboardError::RelayStatus {
                function: "getFunder".to_string(),
                status: 500
            }
        );
        assert!(client.is_end_of_data(&err));
        assert!(!client.is_end_of_data(&DashboardError::Relay("timeout".to_string())));
    }

    #[tokio::test]
    async fn test_scan_through_relay_ends_cleanly_on_error_status() {
        let relay = two_funder_relay().await;
        let client = RelayClient::new(&relay.url(), contract()).unwrap();

        let scan = aggregate_funders(&client, CHART_FUNDER_CAP).await;
        assert_eq!(scan.end, ScanEnd::EndOfData { index: 2 });
        assert_eq!(scan.totals.funder_count, 2);
        assert_eq!(scan.totals.total_funded, U256::from(2_000_000_000_000_000_000u64));
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_a_failed_fetch() {
        // bind and release a port so nothing is listening on it
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let client = RelayClient::new(&url, contract()).unwrap();

        let scan = aggregate_funders(&client, CHART_FUNDER_CAP).await;
        assert!(matches!(scan.end, ScanEnd::FetchFailed { index: 0, .. }));
        assert_eq!(scan.totals.funder_count, 0);
    }
}
