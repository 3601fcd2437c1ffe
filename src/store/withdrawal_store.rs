use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::domain::{
    Error, NewWithdrawal, Result, UserId, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
    WithdrawalStore,
};

#[derive(Default, Debug)]
struct WithdrawalState {
    requests: BTreeMap<WithdrawalId, WithdrawalRequest>,
    by_user: HashMap<UserId, Vec<WithdrawalId>>,
    next_id: WithdrawalId,
}

#[derive(Default, Debug)]
pub struct InMemoryWithdrawalStore {
    state: Mutex<WithdrawalState>,
}

impl InMemoryWithdrawalStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WithdrawalStore for InMemoryWithdrawalStore {
    fn insert(&self, request: NewWithdrawal) -> WithdrawalRequest {
        let mut state = self.state.lock();
        state.next_id += 1;
        let request = request.into_request(state.next_id);
        state
            .by_user
            .entry(request.user_id)
            .or_default()
            .push(request.id);
        state.requests.insert(request.id, request.clone());
        request
    }

    fn get(&self, id: WithdrawalId) -> Option<WithdrawalRequest> {
        self.state.lock().requests.get(&id).cloned()
    }

    fn update(&self, expected: WithdrawalStatus, request: WithdrawalRequest) -> Result<()> {
        let mut state = self.state.lock();
        let stored = state
            .requests
            .get_mut(&request.id)
            .ok_or(Error::WithdrawalNotFound(request.id))?;
        if stored.status != expected {
            return Err(Error::InvalidTransition {
                id: request.id,
                from: stored.status.to_string(),
                action: "update",
            });
        }
        *stored = request;
        Ok(())
    }

    fn for_user(&self, user_id: UserId) -> Vec<WithdrawalRequest> {
        let state = self.state.lock();
        state
            .by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.requests.get(id).cloned())
            .collect()
    }

    fn with_status(&self, status: WithdrawalStatus) -> Vec<WithdrawalRequest> {
        self.state
            .lock()
            .requests
            .values()
            .filter(|w| w.status == status)
            .cloned()
            .collect()
    }

    fn all(&self) -> Vec<WithdrawalRequest> {
        self.state.lock().requests.values().cloned().collect()
    }
}
