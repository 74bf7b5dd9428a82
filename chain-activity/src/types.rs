//! Domain types shared by the fetchers and the state snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::chains::ChainId;
use crate::error::ParseError;

/// An EVM account address (`0x` followed by 40 hex digits).
///
/// The casing returned by the wallet is preserved; comparisons that matter
/// for display go through [`Address::matches`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against another hex address.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }

    /// Abbreviated form, e.g. `0x1234...abcd`.
    pub fn short(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| ParseError::Address(s.to_string()))?;
        if digits.len() != 40 || hex::decode(digits).is_err() {
            return Err(ParseError::Address(s.to_string()));
        }
        Ok(Address(format!("0x{}", digits)))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Opaque continuation token returned by the data provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    /// Wrap a provider page key; empty keys mean "no more pages".
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Direction of a transaction relative to the session account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// One entry of the activity list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: String,
    pub from: String,
    pub to: String,
    /// Decimal amount in display units
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_usd: Option<String>,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
    pub status: TxStatus,
    pub chain_id: ChainId,
    pub token_symbol: String,
}

impl Transaction {
    pub fn direction(&self, account: &Address) -> Direction {
        if account.matches(&self.from) {
            Direction::Sent
        } else {
            Direction::Received
        }
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp)
    }
}

/// A fungible balance held by the session account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub symbol: String,
    pub name: String,
    /// Display balance with four decimal places
    pub balance: String,
    pub contract_address: String,
    pub decimals: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub is_native: bool,
}

/// NFT token standard family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NftStandard {
    #[serde(rename = "ERC721")]
    Erc721,
    #[serde(rename = "ERC1155")]
    Erc1155,
    #[serde(untagged)]
    Other(String),
}

impl NftStandard {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Erc721 => "ERC721",
            Self::Erc1155 => "ERC1155",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for NftStandard {
    fn from(s: &str) -> Self {
        match s.to_ascii_uppercase().replace('-', "").as_str() {
            "ERC721" => Self::Erc721,
            "ERC1155" => Self::Erc1155,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl fmt::Display for NftStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Nft {
    pub contract_address: String,
    pub token_id: String,
    pub name: String,
    pub collection_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "type")]
    pub standard: NftStandard,
}

/// The message currently shown in the global notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorState {
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl ErrorState {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// Wallet session lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Address set by hand, no wallet behind it
    ReadOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "0xAbC0000000000000000000000000000000001234";

    #[test]
    fn test_address_parse() {
        let addr: Address = ACCOUNT.parse().unwrap();
        assert_eq!(addr.as_str(), ACCOUNT);
        assert!("0x1234".parse::<Address>().is_err());
        assert!("abc0000000000000000000000000000000001234".parse::<Address>().is_err());
        assert!("0xzz00000000000000000000000000000000001234".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_short() {
        let addr: Address = ACCOUNT.parse().unwrap();
        assert_eq!(addr.short(), "0xAbC0...1234");
    }

    #[test]
    fn test_direction_is_case_insensitive() {
        let addr: Address = ACCOUNT.parse().unwrap();
        let mut tx = Transaction {
            hash: "0x01".into(),
            from: ACCOUNT.to_lowercase(),
            to: String::new(),
            value: "1".into(),
            value_usd: None,
            timestamp: 0,
            status: TxStatus::Confirmed,
            chain_id: ChainId::ETHEREUM,
            token_symbol: "ETH".into(),
        };
        assert_eq!(tx.direction(&addr), Direction::Sent);

        tx.from = "0x0000000000000000000000000000000000000001".into();
        assert_eq!(tx.direction(&addr), Direction::Received);
    }

    #[test]
    fn test_page_cursor_empty_is_none() {
        assert!(PageCursor::new("").is_none());
        assert_eq!(PageCursor::new("K1").unwrap().as_str(), "K1");
    }

    #[test]
    fn test_nft_standard_parse() {
        assert_eq!(NftStandard::from("erc721"), NftStandard::Erc721);
        assert_eq!(NftStandard::from("ERC-1155"), NftStandard::Erc1155);
        assert_eq!(
            NftStandard::from("CryptoPunks"),
            NftStandard::Other("CryptoPunks".into())
        );
    }
}
