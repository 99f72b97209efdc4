use crate::integration_tests::core::*;
use crate::integration_tests::test_cases::shared::wait_for_view;
use crate::{MurmurError, Viewport};
use async_trait::async_trait;
use std::time::Duration;

/// Reports a scroll position for a client's active conversation and checks
/// the resulting scroll button state.
pub struct ReportViewportTestCase {
    user: String,
    viewport: Viewport,
    expect_scroll_button: bool,
}

impl ReportViewportTestCase {
    /// Scrolled to the very bottom of a long conversation.
    pub fn at_bottom(user: &str) -> Self {
        Self {
            user: user.to_string(),
            viewport: Viewport::new(1600.0, 2000.0, 400.0),
            expect_scroll_button: false,
        }
    }

    /// Scrolled well up into the history.
    pub fn scrolled_up(user: &str) -> Self {
        Self {
            user: user.to_string(),
            viewport: Viewport::new(200.0, 2000.0, 400.0),
            expect_scroll_button: true,
        }
    }
}

#[async_trait]
impl TestCase for ReportViewportTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let client = context.get_client(&self.user)?;
        client.report_viewport(self.viewport).await?;

        let view = wait_for_view(&client, Duration::from_secs(1), |v| {
            v.show_scroll_button == self.expect_scroll_button
        })
        .await?;

        if !self.expect_scroll_button {
            assert_eq!(view.unseen_messages, 0, "Reaching the bottom clears unseen messages");
        }

        tracing::info!(
            "✓ '{}' reported viewport {:?} (scroll button: {})",
            self.user,
            self.viewport,
            view.show_scroll_button
        );
        Ok(())
    }
}
