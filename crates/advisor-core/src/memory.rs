//! In-memory storage collaborator
//!
//! Backs the single-process deployment and the test suites. Provides the
//! per-record atomicity the core expects from storage: each mutation takes
//! the write lock for the duration of the change.

use std::collections::HashMap;

use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::collaborators::Storage;
use crate::error::{AdvisorError, Result};
use crate::types::{Holding, ScheduleConfig};

#[derive(Default)]
struct State {
    holdings: HashMap<i64, Vec<Holding>>,
    schedules: HashMap<i64, ScheduleConfig>,
    fire_markers: HashMap<i64, NaiveDate>,
}

/// Process-local [`Storage`] implementation.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<State>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn holdings(&self, user_id: i64) -> Result<Vec<Holding>> {
        let state = self.state.read().await;
        Ok(state.holdings.get(&user_id).cloned().unwrap_or_default())
    }

    async fn add_holding(&self, user_id: i64, holding: Holding) -> Result<()> {
        if holding.quantity <= 0.0 || holding.average_cost <= 0.0 {
            return Err(AdvisorError::Storage(format!(
                "invalid holding for {}: quantity and cost must be positive",
                holding.ticker
            )));
        }

        let mut state = self.state.write().await;
        let positions = state.holdings.entry(user_id).or_default();

        if let Some(existing) = positions
            .iter_mut()
            .find(|position| position.ticker == holding.ticker)
        {
            // Merge with weighted average cost.
            let total_quantity = existing.quantity + holding.quantity;
            existing.average_cost = (existing.invested() + holding.invested()) / total_quantity;
            existing.quantity = total_quantity;
        } else {
            positions.push(holding);
        }
        Ok(())
    }

    async fn remove_holding(
        &self,
        user_id: i64,
        ticker: &str,
        quantity: Option<f64>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let positions = state
            .holdings
            .get_mut(&user_id)
            .ok_or_else(|| AdvisorError::Storage(format!("no holdings for user {user_id}")))?;

        let index = positions
            .iter()
            .position(|position| position.ticker == ticker)
            .ok_or_else(|| AdvisorError::Storage(format!("no holding in {ticker}")))?;

        match quantity {
            Some(quantity) if quantity <= 0.0 => Err(AdvisorError::Storage(
                "removal quantity must be positive".to_string(),
            )),
            Some(quantity) if quantity < positions[index].quantity => {
                positions[index].quantity -= quantity;
                Ok(())
            }
            // Full removal (or more than held) deletes the holding; quantity
            // never drops to zero or below.
            _ => {
                positions.remove(index);
                Ok(())
            }
        }
    }

    async fn schedule_config(&self, user_id: i64) -> Result<Option<ScheduleConfig>> {
        let state = self.state.read().await;
        Ok(state.schedules.get(&user_id).cloned())
    }

    async fn set_schedule_config(&self, config: ScheduleConfig) -> Result<()> {
        let mut state = self.state.write().await;
        state.schedules.insert(config.user_id, config);
        Ok(())
    }

    async fn schedule_configs(&self) -> Result<Vec<ScheduleConfig>> {
        let state = self.state.read().await;
        let mut configs: Vec<_> = state.schedules.values().cloned().collect();
        configs.sort_by_key(|config| config.user_id);
        Ok(configs)
    }

    async fn last_fired(&self, user_id: i64) -> Result<Option<NaiveDate>> {
        let state = self.state.read().await;
        Ok(state.fire_markers.get(&user_id).copied())
    }

    async fn set_last_fired(&self, user_id: i64, date: NaiveDate) -> Result<()> {
        let mut state = self.state.write().await;
        state.fire_markers.insert(user_id, date);
        Ok(())
    }
}
