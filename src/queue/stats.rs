use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::catalog::TradeItem;

use super::message::UserId;
use super::snapshot::write_atomic;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    pub item: TradeItem,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub trades: Vec<ItemCount>,
}

impl UserStats {
    fn add(&mut self, item: &TradeItem) {
        match self.trades.iter_mut().find(|entry| entry.item == *item) {
            Some(entry) => entry.count += 1,
            None => self.trades.push(ItemCount {
                item: item.clone(),
                count: 1,
            }),
        }
    }

    pub fn total(&self) -> u64 {
        self.trades.iter().map(|entry| entry.count).sum()
    }

    /// Items by count, highest first.
    pub fn by_count(&self) -> Vec<(String, u64)> {
        let mut rows: Vec<_> = self
            .trades
            .iter()
            .map(|entry| (entry.item.to_string(), entry.count))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows
    }
}

/// Completed trades per user and item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStats {
    pub users: BTreeMap<UserId, UserStats>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl TradeStats {
    pub fn record(&mut self, user: UserId, item: &TradeItem) {
        self.users.entry(user).or_default().add(item);
        self.updated_at = OffsetDateTime::now_utc().format(&Rfc3339).ok();
    }

    pub fn total_trades(&self) -> u64 {
        self.users.values().map(UserStats::total).sum()
    }

    pub fn total_users(&self) -> usize {
        self.users.len()
    }

    pub fn top_users(&self, limit: usize) -> Vec<(UserId, u64)> {
        let mut rows: Vec<_> = self
            .users
            .iter()
            .map(|(user, stats)| (*user, stats.total()))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1));
        rows.truncate(limit);
        rows
    }

    pub fn top_trades(&self, limit: usize) -> Vec<(String, u64)> {
        let mut totals: Vec<ItemCount> = Vec::new();
        for stats in self.users.values() {
            for entry in &stats.trades {
                match totals.iter_mut().find(|t| t.item == entry.item) {
                    Some(total) => total.count += entry.count,
                    None => totals.push(entry.clone()),
                }
            }
        }
        totals.sort_by(|a, b| b.count.cmp(&a.count));
        totals
            .into_iter()
            .take(limit)
            .map(|entry| (entry.item.to_string(), entry.count))
            .collect()
    }

    pub fn user_trades(&self, user: UserId, limit: usize) -> Vec<(String, u64)> {
        let mut rows = self
            .users
            .get(&user)
            .map(UserStats::by_count)
            .unwrap_or_default();
        rows.truncate(limit);
        rows
    }
}

/// Stats file; load failures fall back to empty stats.
#[derive(Debug, Clone)]
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> TradeStats {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return TradeStats::default(),
            Err(err) => {
                warn!("failed to read stats {}: {err}", self.path.display());
                return TradeStats::default();
            }
        };
        serde_json::from_slice(&bytes).unwrap_or_else(|err| {
            warn!("ignoring unreadable stats {}: {err}", self.path.display());
            TradeStats::default()
        })
    }

    pub fn save(&self, stats: &TradeStats) -> std::io::Result<()> {
        let data = serde_json::to_vec_pretty(stats)?;
        write_atomic(&self.path, &data)
    }
}
