//! Session bankroll ledger. Records are only ever appended: a settlement is a
//! new record pointing at its wager, and a wager's status is derived from them.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::stats_engine::round_to;

pub type WagerId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Settlement {
    Won,
    Lost,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WagerStatus {
    Pending,
    Won,
    Lost,
    Void,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WagerSlip {
    pub fixture: String,
    pub pick: String,
    pub odd: f64,
    pub stake: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wager {
    pub id: WagerId,
    pub placed_at: DateTime<Utc>,
    pub fixture: String,
    pub pick: String,
    pub odd: f64,
    pub stake: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementRecord {
    pub wager_id: WagerId,
    pub settled_at: DateTime<Utc>,
    pub result: Settlement,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub starting_bankroll: f64,
    pub staked: f64,
    pub returned: f64,
    pub profit: f64,
    pub roi_pct: f64,
    pub bankroll: f64,
    pub pending: usize,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    starting_bankroll: f64,
    wagers: Vec<Wager>,
    settlements: Vec<SettlementRecord>,
}

impl Ledger {
    pub fn new(starting_bankroll: f64) -> Self {
        let starting_bankroll = if starting_bankroll.is_finite() {
            starting_bankroll.max(0.0)
        } else {
            0.0
        };
        Self {
            starting_bankroll,
            wagers: Vec::new(),
            settlements: Vec::new(),
        }
    }

    pub fn wagers(&self) -> &[Wager] {
        &self.wagers
    }

    pub fn settlements(&self) -> &[SettlementRecord] {
        &self.settlements
    }

    pub fn place(&mut self, slip: WagerSlip) -> Result<WagerId> {
        if !slip.stake.is_finite() || slip.stake <= 0.0 {
            return Err(anyhow::anyhow!("stake must be positive, got {}", slip.stake));
        }
        if !slip.odd.is_finite() || slip.odd <= 1.0 {
            return Err(anyhow::anyhow!("odd must exceed 1.00, got {}", slip.odd));
        }
        let id = self.wagers.len() as WagerId + 1;
        self.wagers.push(Wager {
            id,
            placed_at: Utc::now(),
            fixture: slip.fixture,
            pick: slip.pick,
            odd: slip.odd,
            stake: slip.stake,
        });
        Ok(id)
    }

    pub fn settle(&mut self, wager_id: WagerId, result: Settlement) -> Result<()> {
        if !self.wagers.iter().any(|w| w.id == wager_id) {
            return Err(anyhow::anyhow!("unknown wager #{wager_id}"));
        }
        if self.settlement_for(wager_id).is_some() {
            return Err(anyhow::anyhow!("wager #{wager_id} already settled"));
        }
        self.settlements.push(SettlementRecord {
            wager_id,
            settled_at: Utc::now(),
            result,
        });
        Ok(())
    }

    fn settlement_for(&self, wager_id: WagerId) -> Option<&SettlementRecord> {
        self.settlements.iter().find(|s| s.wager_id == wager_id)
    }

    pub fn status(&self, wager_id: WagerId) -> Option<WagerStatus> {
        self.wagers.iter().find(|w| w.id == wager_id)?;
        Some(match self.settlement_for(wager_id).map(|s| s.result) {
            None => WagerStatus::Pending,
            Some(Settlement::Won) => WagerStatus::Won,
            Some(Settlement::Lost) => WagerStatus::Lost,
            Some(Settlement::Void) => WagerStatus::Void,
        })
    }

    /// Pending stakes count as committed: they leave the bankroll but not the ROI base.
    pub fn summary(&self) -> LedgerSummary {
        let mut staked = 0.0;
        let mut returned = 0.0;
        let mut pending_stake = 0.0;
        let mut pending = 0;

        for w in &self.wagers {
            match self.status(w.id) {
                Some(WagerStatus::Pending) | None => {
                    pending += 1;
                    pending_stake += w.stake;
                }
                Some(WagerStatus::Won) => {
                    staked += w.stake;
                    returned += w.stake * w.odd;
                }
                Some(WagerStatus::Lost) => staked += w.stake,
                Some(WagerStatus::Void) => {}
            }
        }

        let profit = returned - staked;
        let roi_pct = if staked > 0.0 {
            round_to(100.0 * profit / staked, 1)
        } else {
            0.0
        };

        LedgerSummary {
            starting_bankroll: self.starting_bankroll,
            staked: round_to(staked, 2),
            returned: round_to(returned, 2),
            profit: round_to(profit, 2),
            roi_pct,
            bankroll: round_to(self.starting_bankroll + profit - pending_stake, 2),
            pending,
        }
    }
}
