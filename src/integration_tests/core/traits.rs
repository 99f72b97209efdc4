use crate::MurmurError;
use crate::integration_tests::core::ScenarioContext;
use async_trait::async_trait;

/// One checked step of a scenario.
#[async_trait]
pub trait TestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError>;

    /// Runs the step and counts it towards the scenario's tally.
    async fn execute(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        let result = self.run(context).await;
        context.record_test(result.is_ok());
        result
    }
}

/// A sequence of test cases run against one store and one set of clients.
///
/// Scenarios only describe their steps. Timing, teardown and reporting are
/// handled by the registry.
#[async_trait]
pub trait Scenario: Send {
    /// Name used on the command line and in reports
    const NAME: &'static str;

    fn new(context: ScenarioContext) -> Self
    where
        Self: Sized;

    fn context(&self) -> &ScenarioContext;

    async fn run_scenario(&mut self) -> Result<(), MurmurError>;
}
