//! KEM credits and token airdrops

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Fixed conversion from credits to airdrop tokens
pub const AIRDROP_RATIO: f64 = 0.05;

/// Social actions that earn credits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialAction {
    Like,
    Comment,
    Post,
    Tip,
    Share,
    Referral,
}

impl SocialAction {
    pub fn credits(&self) -> u64 {
        match self {
            SocialAction::Like => 1,
            SocialAction::Comment => 2,
            SocialAction::Post => 5,
            SocialAction::Tip => 3,
            SocialAction::Share => 2,
            SocialAction::Referral => 25,
        }
    }
}

#[derive(Default, Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreditAccount {
    pub earned: u64,
    pub redeemed: u64,
}

impl CreditAccount {
    pub fn available(&self) -> u64 {
        self.earned.saturating_sub(self.redeemed)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AirdropClaim {
    pub user: String,
    pub wallet: String,
    pub credits: u64,
    pub tokens: f64,
    pub claimed_at: DateTime<Utc>,
}

/// `0x` followed by exactly 40 hex digits
pub fn is_valid_eth_address(address: &str) -> bool {
    address
        .strip_prefix("0x")
        .map_or(false, |hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

pub fn tokens_for(credits: u64) -> f64 {
    credits as f64 * AIRDROP_RATIO
}

/// Per-user credit balances
#[derive(Default)]
pub struct CreditLedger {
    accounts: DashMap<String, CreditAccount>,
}

impl CreditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a user for an action; returns their new available balance
    pub fn award(&self, user: &str, action: SocialAction) -> u64 {
        let mut account = self.accounts.entry(user.to_string()).or_default();
        account.earned += action.credits();
        account.available()
    }

    pub fn account(&self, user: &str) -> CreditAccount {
        self.accounts.get(user).map(|a| a.clone()).unwrap_or_default()
    }

    /// Tokens the user would receive if they claimed now
    pub fn pending_airdrop(&self, user: &str) -> f64 {
        tokens_for(self.account(user).available())
    }

    /// Convert every available credit into an airdrop to `wallet`
    pub fn claim(&self, user: &str, wallet: &str) -> EngineResult<AirdropClaim> {
        if !is_valid_eth_address(wallet) {
            return Err(EngineError::InvalidAddress(wallet.to_string()));
        }

        let mut account = self.accounts.entry(user.to_string()).or_default();
        let credits = account.available();
        if credits == 0 {
            return Err(EngineError::InsufficientCredits {
                requested: 1,
                available: 0,
            });
        }
        account.redeemed += credits;

        let claim = AirdropClaim {
            user: user.to_string(),
            wallet: wallet.to_string(),
            credits,
            tokens: tokens_for(credits),
            claimed_at: Utc::now(),
        };
        info!(user, credits, tokens = claim.tokens, "Airdrop claimed");
        Ok(claim)
    }
}
