use serde::{Deserialize, Serialize};

/// Payload for creating (or, with only `reason`, updating) a bonus.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CreateBonusRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub giver_email: Option<String>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_bonus_id: Option<String>,
}

impl CreateBonusRequest {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            ..Self::default()
        }
    }

    pub fn reply_to(mut self, parent_bonus_id: impl Into<String>) -> Self {
        self.parent_bonus_id = Some(parent_bonus_id.into());
        self
    }
}

/// Filters for listing bonuses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListBonusesRequest {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
    pub giver_email: Option<String>,
    pub receiver_email: Option<String>,
    pub hashtag: Option<String>,
    pub include_children: Option<bool>,
}

impl ListBonusesRequest {
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(skip) = self.skip {
            pairs.push(("skip", skip.to_string()));
        }
        if let Some(email) = &self.giver_email {
            pairs.push(("giver_email", email.clone()));
        }
        if let Some(email) = &self.receiver_email {
            pairs.push(("receiver_email", email.clone()));
        }
        if let Some(hashtag) = &self.hashtag {
            pairs.push(("hashtag", hashtag.clone()));
        }
        if let Some(include) = self.include_children {
            pairs.push(("include_children", include.to_string()));
        }
        pairs
    }
}

/// Filters for listing the rewards catalog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListRewardsRequest {
    pub catalog_country: Option<String>,
    pub request_country: Option<String>,
    pub personalize_for: Option<String>,
}

impl ListRewardsRequest {
    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        [
            ("catalog_country", &self.catalog_country),
            ("request_country", &self.request_country),
            ("personalize_for", &self.personalize_for),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|value| (key, value)))
        .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Bonus {
    pub id: Option<String>,
    pub created_at: Option<String>,
    pub reason: Option<String>,
    pub reason_html: Option<String>,
    pub amount: Option<i64>,
    pub amount_with_currency: Option<String>,
    pub value: Option<String>,
    pub giver: Option<UserInfo>,
    pub receiver: Option<UserInfo>,
    pub child_count: Option<u32>,
    #[serde(default)]
    pub child_bonuses: Vec<Bonus>,
    pub via: Option<String>,
    pub family_amount: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct UserInfo {
    pub id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub short_name: Option<String>,
    pub display_name: Option<String>,
    pub path: Option<String>,
    #[serde(rename = "full_pic_url")]
    pub full_picture_url: Option<String>,
    pub last_active_at: Option<String>,
    pub created_at: Option<String>,
    pub external_unique_id: Option<String>,
    pub budget_boost: Option<i64>,
    pub user_mode: Option<String>,
    pub time_zone: Option<String>,
    pub can_give: Option<bool>,
    pub can_receive: Option<bool>,
    #[serde(default)]
    pub give_amounts: Vec<i64>,
    pub status: Option<String>,
    pub manager_email: Option<String>,
    pub earning_balance: Option<i64>,
    pub earning_balance_with_currency: Option<String>,
    pub lifetime_earnings: Option<i64>,
    pub lifetime_earnings_with_currency: Option<String>,
    pub giving_balance: Option<i64>,
    pub giving_balance_with_currency: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub custom_properties: serde_json::Map<String, serde_json::Value>,
}

/// A group of rewards in the catalog, such as gift cards or donations.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RewardCategory {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Reward {
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub minimum_display_price: Option<String>,
    #[serde(default)]
    pub description: RewardDescription,
    pub disclaimer_html: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub denominations: Vec<RewardDenomination>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RewardDescription {
    pub text: Option<String>,
    pub html: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct RewardDenomination {
    pub id: Option<String>,
    pub name: Option<String>,
    pub price: Option<i64>,
    pub display_price: Option<String>,
}
