use crate::integration_tests::core::*;
use crate::integration_tests::test_cases::shared::wait_for_view;
use crate::{MurmurError, compare_messages};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::time::Duration;

/// Waits for a client's view to reach the expected shape, then checks that it
/// is ordered and free of duplicates.
pub struct VerifyViewTestCase {
    user: String,
    expected_count: Option<usize>,
    expected_has_more: Option<bool>,
    min_day_groups: usize,
    expect_error: bool,
    contains_message_key: Option<String>,
}

impl VerifyViewTestCase {
    pub fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            expected_count: None,
            expected_has_more: None,
            min_day_groups: 0,
            expect_error: false,
            contains_message_key: None,
        }
    }

    pub fn expect_message_count(mut self, count: usize) -> Self {
        self.expected_count = Some(count);
        self
    }

    pub fn expect_has_more(mut self, has_more: bool) -> Self {
        self.expected_has_more = Some(has_more);
        self
    }

    pub fn expect_min_day_groups(mut self, groups: usize) -> Self {
        self.min_day_groups = groups;
        self
    }

    pub fn expect_error(mut self) -> Self {
        self.expect_error = true;
        self
    }

    pub fn expect_message(mut self, key: &str) -> Self {
        self.contains_message_key = Some(key.to_string());
        self
    }
}

#[async_trait]
impl TestCase for VerifyViewTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let client = context.get_client(&self.user)?;
        let expected_id = match &self.contains_message_key {
            Some(key) => Some(context.get_message_id(key)?.clone()),
            None => None,
        };

        let view = wait_for_view(&client, Duration::from_secs(5), |v| {
            self.expected_count.is_none_or(|c| v.message_count == c)
                && self.expected_has_more.is_none_or(|h| v.has_more == h)
                && v.error.is_some() == self.expect_error
                && expected_id
                    .as_ref()
                    .is_none_or(|id| v.messages().any(|m| &m.id == id))
        })
        .await?;

        let messages: Vec<_> = view.messages().collect();
        assert!(
            messages
                .windows(2)
                .all(|w| compare_messages(w[0], w[1]) == Ordering::Less),
            "View of '{}' is not strictly ordered",
            self.user
        );
        assert!(
            view.groups.len() >= self.min_day_groups,
            "Expected at least {} day groups, got {}",
            self.min_day_groups,
            view.groups.len()
        );
        assert!(
            view.groups.windows(2).all(|w| w[0].date < w[1].date),
            "Day groups out of order"
        );

        tracing::info!(
            "✓ '{}' sees {} messages in {} day groups (has_more: {})",
            self.user,
            view.message_count,
            view.groups.len(),
            view.has_more
        );
        Ok(())
    }
}
