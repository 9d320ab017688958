use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    Bonus, Client, CreateBonusRequest, ListBonusesRequest, ListRewardsRequest, Result,
    RewardCategory, UserInfo,
};

/// A call received by a [`MockClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MockCall {
    CreateBonus(CreateBonusRequest),
    GetBonus(String),
    UpdateBonus { id: String, reason: String },
    DeleteBonus(String),
    ListBonuses(ListBonusesRequest),
    ListRewards(ListRewardsRequest),
    MyUserInfo,
}

/// In-memory [`Client`] for tests.
///
/// Every call is recorded; results come from the public fields.
#[derive(Debug, Default)]
pub struct MockClient {
    /// Returned by `create_bonus`, `get_bonus` and `update_bonus`.
    pub bonus: Bonus,
    pub bonuses: Vec<Bonus>,
    pub rewards: Vec<RewardCategory>,
    pub user_info: UserInfo,
    calls: Mutex<Vec<MockCall>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls received so far, oldest first.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Payload of the most recent `create_bonus` call.
    pub fn last_created(&self) -> Option<CreateBonusRequest> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            MockCall::CreateBonus(request) => Some(request.clone()),
            _ => None,
        })
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Client for MockClient {
    async fn create_bonus(&self, request: &CreateBonusRequest) -> Result<Bonus> {
        self.record(MockCall::CreateBonus(request.clone()));
        Ok(self.bonus.clone())
    }

    async fn get_bonus(&self, id: &str) -> Result<Bonus> {
        self.record(MockCall::GetBonus(id.to_owned()));
        Ok(self.bonus.clone())
    }

    async fn update_bonus(&self, id: &str, reason: &str) -> Result<Bonus> {
        self.record(MockCall::UpdateBonus {
            id: id.to_owned(),
            reason: reason.to_owned(),
        });
        Ok(self.bonus.clone())
    }

    async fn delete_bonus(&self, id: &str) -> Result<()> {
        self.record(MockCall::DeleteBonus(id.to_owned()));
        Ok(())
    }

    async fn list_bonuses(&self, request: &ListBonusesRequest) -> Result<Vec<Bonus>> {
        self.record(MockCall::ListBonuses(request.clone()));
        Ok(self.bonuses.clone())
    }

    async fn list_rewards(&self, request: &ListRewardsRequest) -> Result<Vec<RewardCategory>> {
        self.record(MockCall::ListRewards(request.clone()));
        Ok(self.rewards.clone())
    }

    async fn my_user_info(&self) -> Result<UserInfo> {
        self.record(MockCall::MyUserInfo);
        Ok(self.user_info.clone())
    }

    fn close(self) {}
}

#[cfg(test)]
mod tests {
    use super::{MockCall, MockClient};
    use crate::{Bonus, Client, CreateBonusRequest, UserInfo};

    async fn thank_everyone(client: &impl Client) -> crate::Result<Bonus> {
        let me = client.my_user_info().await?;
        let reason = format!(
            "+1 from @{} for the launch #teamwork",
            me.username.unwrap_or_default()
        );
        client.create_bonus(&CreateBonusRequest::new(reason)).await
    }

    #[tokio::test]
    async fn records_inputs_and_returns_canned_outputs() {
        let client = MockClient {
            bonus: Bonus {
                id: Some("b42".to_owned()),
                ..Bonus::default()
            },
            user_info: UserInfo {
                username: Some("kit".to_owned()),
                ..UserInfo::default()
            },
            ..MockClient::default()
        };

        let bonus = thank_everyone(&client).await.expect("mock never fails");

        assert_eq!(bonus.id.as_deref(), Some("b42"));
        assert_eq!(
            client.last_created().map(|request| request.reason),
            Some("+1 from @kit for the launch #teamwork".to_owned())
        );
        assert_eq!(client.calls().len(), 2);
        assert_eq!(client.calls()[0], MockCall::MyUserInfo);
    }

    #[tokio::test]
    async fn works_behind_a_trait_object() {
        let client = MockClient::new();
        {
            let api: &dyn Client = &client;
            api.update_bonus("b1", "+2 renamed").await.expect("mock never fails");
            api.delete_bonus("b1").await.expect("mock never fails");
        }

        assert_eq!(
            client.calls(),
            vec![
                MockCall::UpdateBonus {
                    id: "b1".to_owned(),
                    reason: "+2 renamed".to_owned(),
                },
                MockCall::DeleteBonus("b1".to_owned()),
            ]
        );
        assert!(client.last_created().is_none());
        client.close();
    }
}
