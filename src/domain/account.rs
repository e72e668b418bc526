//! Account domain models and display formatting

use serde::{Deserialize, Serialize};

/// The signed-in account as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub username: String,
    pub balance: u64,
    #[serde(rename = "coin_name")]
    pub currency_name: String,
    #[serde(rename = "coin_symbol")]
    pub currency_symbol: String,
    pub bank_name: String,
}

impl AccountSnapshot {
    pub fn display_balance(&self) -> String {
        format_amount(self.balance, &self.currency_symbol)
    }
}

/// Aggregate figures across all accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankStats {
    pub total_accounts: u64,
    /// Balances held by bank-owned accounts
    pub total_assets: u64,
    /// Balances held by customer accounts
    pub total_liabilities: u64,
    #[serde(rename = "coin_name")]
    pub currency_name: String,
    #[serde(rename = "coin_symbol")]
    pub currency_symbol: String,
}

/// Contact entry advertised by the mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintContact {
    pub method: String,
    pub info: String,
}

/// Mint metadata proxied by the backend. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MintInfo {
    pub name: Option<String>,
    pub pubkey: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub description_long: Option<String>,
    #[serde(default)]
    pub contact: Vec<MintContact>,
    pub motd: Option<String>,
    pub icon_url: Option<String>,
    pub nuts: Option<serde_json::Value>,
}

/// Format an amount with thousands separators followed by the currency symbol
pub fn format_amount(amount: u64, symbol: &str) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if symbol.is_empty() {
        grouped
    } else {
        format!("{} {}", grouped, symbol)
    }
}

/// Shorten a payment request for display: `first20...last20` when longer than 40 chars
pub fn truncate_payment_request(request: &str) -> String {
    let chars: Vec<char> = request.chars().collect();
    if chars.len() <= 40 {
        return request.to_string();
    }
    let head: String = chars[..20].iter().collect();
    let tail: String = chars[chars.len() - 20..].iter().collect();
    format!("{}...{}", head, tail)
}
