//! ABIs of the FundMe contract and its price feed
//!
//! The human-readable signatures below are parsed once with `ethers::abi`.
//! Selectors, argument encoding and return decoding all come from the parsed
//! functions.

use crate::core::types::{Address, PriceQuote, U256};
use crate::error::{DashboardError, Result};
use ethers::abi::{parse_abi, Abi, Function, Param, StateMutability, Token};
use ethers::types::Bytes;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

const CONTRACT_SIGNATURES: &[&str] = &[
    "function MINIMUM_USD() external view returns (uint256)",
    "function getVersion() external view returns (uint256)",
    "function getPriceFeed() external view returns (address)",
    "function getOwner() external view returns (address)",
    "function getAddressToAmountFunded(address fundingAddress) external view returns (uint256)",
    "function getFunder(uint256 index) external view returns (address)",
    "function fund() external payable",
    "function withdraw() external",
    "function cheaperWithdraw() external",
    "function latestRoundData() external view returns (uint80 roundId, int256 answer, uint256 startedAt, uint256 updatedAt, uint80 answeredInRound)",
];

static CONTRACT_ABI: Lazy<std::result::Result<Abi, String>> =
    Lazy::new(|| parse_abi(CONTRACT_SIGNATURES).map_err(|e| e.to_string()));

/// Read and write functions of the FundMe contract and its price feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractFunction {
    MinimumUsd,
    Version,
    PriceFeed,
    Owner,
    AmountFundedBy,
    FunderAt,
    Fund,
    Withdraw,
    CheaperWithdraw,
    LatestRoundData,
}

impl ContractFunction {
    pub fn name(&self) -> &'static str {
        match self {
            ContractFunction::MinimumUsd => "MINIMUM_USD",
            ContractFunction::Version => "getVersion",
            ContractFunction::PriceFeed => "getPriceFeed",
            ContractFunction::Owner => "getOwner",
            ContractFunction::AmountFundedBy => "getAddressToAmountFunded",
            ContractFunction::FunderAt => "getFunder",
            ContractFunction::Fund => "fund",
            ContractFunction::Withdraw => "withdraw",
            ContractFunction::CheaperWithdraw => "cheaperWithdraw",
            ContractFunction::LatestRoundData => "latestRoundData",
        }
    }

    /// Parsed ABI entry
    pub fn abi(&self) -> Result<&'static Function> {
        let abi = match Lazy::force(&CONTRACT_ABI) {
            Ok(abi) => abi,
            Err(e) => return Err(DashboardError::Abi(e.clone())),
        };
        abi.function(self.name())
            .map_err(|e| DashboardError::Abi(format!("{}: {e}", self.name())))
    }

    pub fn selector(&self) -> Result<[u8; 4]> {
        Ok(self.abi()?.short_signature())
    }

    /// JSON ABI fragment, as sent to the HTTP relay
    pub fn abi_fragment(&self) -> Result<Value> {
        let function = self.abi()?;
        let mutability = match function.state_mutability {
            StateMutability::Pure => "pure",
            StateMutability::View => "view",
            StateMutability::NonPayable => "nonpayable",
            StateMutability::Payable => "payable",
        };
        Ok(json!({
            "type": "function",
            "name": function.name,
            "inputs": fragment_params(&function.inputs),
            "outputs": fragment_params(&function.outputs),
            "stateMutability": mutability,
        }))
    }
}

fn fragment_params(params: &[Param]) -> Vec<Value> {
    params
        .iter()
        .map(|p| json!({ "name": p.name, "type": p.kind.to_string() }))
        .collect()
}

/// Selector followed by the encoded arguments
pub fn encode_call(function: ContractFunction, args: &[Token]) -> Result<Bytes> {
    function
        .abi()?
        .encode_input(args)
        .map(Bytes::from)
        .map_err(|e| DashboardError::Abi(format!("encode {}: {e}", function.name())))
}

/// Arguments of a call, `data` including its selector
pub fn decode_call(function: ContractFunction, data: &[u8]) -> Result<Vec<Token>> {
    let args = data
        .get(4..)
        .ok_or_else(|| DashboardError::Abi(format!("{}: call data too short", function.name())))?;
    function
        .abi()?
        .decode_input(args)
        .map_err(|e| DashboardError::Abi(format!("decode {} input: {e}", function.name())))
}

pub fn decode_output(function: ContractFunction, data: &[u8]) -> Result<Vec<Token>> {
    function
        .abi()?
        .decode_output(data)
        .map_err(|e| DashboardError::Abi(format!("decode {} output: {e}", function.name())))
}

fn token(tokens: &[Token], index: usize) -> Result<&Token> {
    tokens
        .get(index)
        .ok_or_else(|| DashboardError::Abi(format!("missing value {index}")))
}

pub fn uint_at(tokens: &[Token], index: usize) -> Result<U256> {
    match token(tokens, index)? {
        Token::Uint(value) => Ok(*value),
        other => Err(DashboardError::Abi(format!("expected uint at {index}, got {other}"))),
    }
}

pub fn u64_at(tokens: &[Token], index: usize) -> Result<u64> {
    let value = uint_at(tokens, index)?;
    if value.bits() > 64 {
        return Err(DashboardError::Abi(format!("value {index} does not fit in u64")));
    }
    Ok(value.as_u64())
}

pub fn u128_at(tokens: &[Token], index: usize) -> Result<u128> {
    let value = uint_at(tokens, index)?;
    if value.bits() > 128 {
        return Err(DashboardError::Abi(format!("value {index} does not fit in u128")));
    }
    Ok(value.as_u128())
}

/// Two's complement `int256`, limited to values that fit in `i128`
pub fn i128_at(tokens: &[Token], index: usize) -> Result<i128> {
    let raw = match token(tokens, index)? {
        Token::Int(raw) => *raw,
        other => return Err(DashboardError::Abi(format!("expected int at {index}, got {other}"))),
    };
    let mut word = [0u8; 32];
    raw.to_big_endian(&mut word);
    let negative = word[0] & 0x80 != 0;
    let sign_byte = if negative { 0xff } else { 0x00 };
    let (high, low) = word.split_at(16);
    // the high half must be pure sign extension for the value to fit
    if high.iter().any(|b| *b != sign_byte) || (low[0] & 0x80 != 0) != negative {
        return Err(DashboardError::Abi(format!("value {index} does not fit in i128")));
    }
    let mut buf = [0u8; 16];
    buf.copy_from_slice(low);
    Ok(i128::from_be_bytes(buf))
}

pub fn address_at(tokens: &[Token], index: usize) -> Result<Address> {
    match token(tokens, index)? {
        Token::Address(address) => Ok(*address),
        other => Err(DashboardError::Abi(format!("expected address at {index}, got {other}"))),
    }
}

/// Decode the five values returned by `latestRoundData()`
pub fn decode_round_data(data: &[u8]) -> Result<PriceQuote> {
    let tokens = decode_output(ContractFunction::LatestRoundData, data)?;
    Ok(PriceQuote {
        round_id: u128_at(&tokens, 0)?,
        answer: i128_at(&tokens, 1)?,
        started_at: u64_at(&tokens, 2)?,
        updated_at: u64_at(&tokens, 3)?,
        answered_in_round: u128_at(&tokens, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::abi::encode;

    fn negative(magnitude: u64) -> U256 {
        U256::MAX - U256::from(magnitude - 1)
    }

    #[test]
    fn test_selectors_match_deployed_contract() {
        let expected = [
            (ContractFunction::MinimumUsd, [0x6b, 0x69, 0xa5, 0x92]),
            (ContractFunction::Version, [0x0d, 0x8e, 0x6e, 0x2c]),
            (ContractFunction::PriceFeed, [0x9e, 0x87, 0xa5, 0xcd]),
            (ContractFunction::Owner, [0x89, 0x3d, 0x20, 0xe8]),
            (ContractFunction::AmountFundedBy, [0x03, 0x43, 0xfb, 0x25]),
            (ContractFunction::FunderAt, [0xd7, 0xb4, 0x75, 0x0c]),
            (ContractFunction::Fund, [0xb6, 0x0d, 0x42, 0x88]),
            (ContractFunction::Withdraw, [0x3c, 0xcf, 0xd6, 0x0b]),
            (ContractFunction::CheaperWithdraw, [0xbe, 0x26, 0x93, 0xf0]),
            (ContractFunction::LatestRoundData, [0xfe, 0xaf, 0x96, 0x8c]),
        ];
        for (function, selector) in expected {
            assert_eq!(function.selector().unwrap(), selector, "{}", function.name());
        }
    }

    #[test]
    fn test_encode_funder_at() {
        let data = encode_call(ContractFunction::FunderAt, &[Token::Uint(U256::from(3u32))]).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &[0xd7, 0xb4, 0x75, 0x0c]);
        assert_eq!(data[35], 3);
        assert!(data[4..35].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_encode_rejects_wrong_argument_type() {
        let result = encode_call(ContractFunction::FunderAt, &[Token::Address(Address::zero())]);
        assert!(matches!(result, Err(DashboardError::Abi(_))));
    }

    #[test]
    fn test_decode_call_arguments() {
        let funder = Address::from_low_u64_be(0xaa);
        let data = encode_call(ContractFunction::AmountFundedBy, &[Token::Address(funder)]).unwrap();
        let args = decode_call(ContractFunction::AmountFundedBy, &data).unwrap();
        assert_eq!(address_at(&args, 0).unwrap(), funder);
        assert!(decode_call(ContractFunction::AmountFundedBy, &[0x03]).is_err());
    }

    #[test]
    fn test_decode_round_data() {
        let data = encode(&[
            Token::Uint(U256::from(7u32)),
            Token::Int(U256::from(250_000_000_000u64)),
            Token::Uint(U256::from(1_700_000_000u64)),
            Token::Uint(U256::from(1_700_000_100u64)),
            Token::Uint(U256::from(7u32)),
        ]);

        let quote = decode_round_data(&data).unwrap();
        assert_eq!(quote.round_id, 7);
        assert_eq!(quote.answer, 250_000_000_000);
        assert_eq!(quote.updated_at, 1_700_000_100);
        assert_eq!(quote.price(), 2500.0);
    }

    #[test]
    fn test_decode_negative_int() {
        let tokens = vec![Token::Int(negative(5))];
        assert_eq!(i128_at(&tokens, 0).unwrap(), -5);

        // below i128::MIN
        let tokens = vec![Token::Int(negative(1) << 200)];
        assert!(i128_at(&tokens, 0).is_err());
    }

    #[test]
    fn test_short_data_is_an_error() {
        assert!(decode_output(ContractFunction::Version, &[0u8; 31]).is_err());
        assert!(decode_round_data(&[0u8; 64]).is_err());
        assert!(decode_output(ContractFunction::Owner, &[]).is_err());
    }

    #[test]
    fn test_wide_values_are_rejected() {
        let tokens = vec![Token::Uint(U256::from(u64::MAX) + 1)];
        assert!(u64_at(&tokens, 0).is_err());
        assert_eq!(u128_at(&tokens, 0).unwrap(), u64::MAX as u128 + 1);
        assert!(address_at(&tokens, 0).is_err());
    }

    #[test]
    fn test_abi_fragment_names() {
        let fragment = ContractFunction::FunderAt.abi_fragment().unwrap();
        assert_eq!(fragment["name"], "getFunder");
        assert_eq!(fragment["inputs"][0]["type"], "uint256");
        assert_eq!(fragment["outputs"][0]["type"], "address");
        assert_eq!(
            ContractFunction::Fund.abi_fragment().unwrap()["stateMutability"],
            "payable"
        );
        assert_eq!(
            ContractFunction::LatestRoundData.abi_fragment().unwrap()["outputs"][0]["type"],
            "uint80"
        );
    }
}
