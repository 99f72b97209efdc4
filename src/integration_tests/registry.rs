use crate::integration_tests::core::*;
use crate::integration_tests::scenarios::*;
use crate::{InMemoryStore, MurmurConfig, MurmurError};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Every scenario the runner knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    Contacts,
    MessageSync,
    Pagination,
    ConversationSwitch,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 4] = [
        ScenarioKind::Contacts,
        ScenarioKind::MessageSync,
        ScenarioKind::Pagination,
        ScenarioKind::ConversationSwitch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScenarioKind::Contacts => ContactsScenario::NAME,
            ScenarioKind::MessageSync => MessageSyncScenario::NAME,
            ScenarioKind::Pagination => PaginationScenario::NAME,
            ScenarioKind::ConversationSwitch => ConversationSwitchScenario::NAME,
        }
    }

    async fn run(self, context: ScenarioContext) -> ScenarioOutcome {
        match self {
            ScenarioKind::Contacts => run_scenario::<ContactsScenario>(context).await,
            ScenarioKind::MessageSync => run_scenario::<MessageSyncScenario>(context).await,
            ScenarioKind::Pagination => run_scenario::<PaginationScenario>(context).await,
            ScenarioKind::ConversationSwitch => {
                run_scenario::<ConversationSwitchScenario>(context).await
            }
        }
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScenarioKind {
    type Err = MurmurError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| {
                let available: Vec<_> = Self::ALL.iter().map(|k| k.name()).collect();
                MurmurError::InvalidInput(format!(
                    "Unknown scenario '{}'. Available scenarios: {}",
                    s,
                    available.join(", ")
                ))
            })
    }
}

struct ScenarioOutcome {
    result: ScenarioResult,
    error: Option<MurmurError>,
}

/// Runs one scenario to completion and always tears it down, so a failing
/// scenario cannot leave live feeds behind for the next one.
async fn run_scenario<S: Scenario>(context: ScenarioContext) -> ScenarioOutcome {
    let start = Instant::now();
    tracing::info!("=== Running Scenario: {} ===", S::NAME);

    let mut scenario = S::new(context);
    let mut error = scenario.run_scenario().await.err();

    match scenario.context().teardown().await {
        Ok(()) => {}
        Err(e) if error.is_none() => error = Some(e),
        Err(e) => tracing::warn!("{} teardown after failure: {}", S::NAME, e),
    }

    let context = scenario.context();
    let duration = start.elapsed();
    let result = match &error {
        None => {
            tracing::info!(
                "✓ {} completed ({}/{}) in {:?}",
                S::NAME,
                context.tests_passed,
                context.tests_count,
                duration
            );
            ScenarioResult::new(S::NAME, context.tests_count, context.tests_passed, duration)
        }
        Some(e) => {
            tracing::error!(
                "✗ {} failed after {} passing steps in {:?}: {}",
                S::NAME,
                context.tests_passed,
                duration,
                e
            );
            ScenarioResult::failed(S::NAME, context.tests_count, context.tests_passed, duration)
        }
    };

    ScenarioOutcome { result, error }
}

/// Results of one runner invocation.
#[derive(Debug)]
pub struct RunSummary {
    pub results: Vec<ScenarioResult>,
    pub duration: Duration,
    first_error: Option<MurmurError>,
}

impl RunSummary {
    pub fn scenarios_failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }

    pub fn tests_passed(&self) -> u32 {
        self.results.iter().map(|r| r.tests_passed).sum()
    }

    pub fn tests_failed(&self) -> u32 {
        self.results.iter().map(|r| r.tests_failed).sum()
    }

    /// The first scenario error, if any scenario failed.
    pub fn into_result(self) -> Result<(), MurmurError> {
        match self.first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn log(&self) {
        tracing::info!("=== Integration Test Summary ===");
        for result in &self.results {
            tracing::info!(
                "  {} {} - {}/{} steps passed in {:?}",
                if result.success { "✓" } else { "✗" },
                result.scenario_name,
                result.tests_passed,
                result.tests_run,
                result.duration
            );
        }
        tracing::info!(
            "Scenarios: {} passed, {} failed. Steps: {} passed, {} failed. Total {:?}",
            self.results.len() - self.scenarios_failed(),
            self.scenarios_failed(),
            self.tests_passed(),
            self.tests_failed(),
            self.duration
        );
    }
}

/// Runs scenarios, each against its own fresh in-memory store.
pub struct ScenarioRegistry {
    config: MurmurConfig,
}

impl ScenarioRegistry {
    pub fn new(config: MurmurConfig) -> Self {
        Self { config }
    }

    /// Runs the scenario named `selection`, or all of them when `None`.
    ///
    /// Only an unknown name is an error here; scenario failures are reported
    /// in the summary.
    pub async fn run(&self, selection: Option<&str>) -> Result<RunSummary, MurmurError> {
        let kinds = match selection {
            Some(name) => vec![name.parse::<ScenarioKind>()?],
            None => ScenarioKind::ALL.to_vec(),
        };

        let start = Instant::now();
        let mut results = Vec::with_capacity(kinds.len());
        let mut first_error = None;
        for kind in kinds {
            let outcome = kind.run(self.fresh_context()).await;
            results.push(outcome.result);
            if first_error.is_none() {
                first_error = outcome.error;
            }
        }

        let summary = RunSummary {
            results,
            duration: start.elapsed(),
            first_error,
        };
        summary.log();
        Ok(summary)
    }

    fn fresh_context(&self) -> ScenarioContext {
        ScenarioContext::new(self.config.clone(), Arc::new(InMemoryStore::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> (ScenarioRegistry, tempfile::TempDir) {
        let logs = tempfile::TempDir::new().unwrap();
        (ScenarioRegistry::new(MurmurConfig::new(logs.path())), logs)
    }

    #[test]
    fn scenario_names_parse_case_insensitively() {
        for kind in ScenarioKind::ALL {
            assert_eq!(kind.name().parse::<ScenarioKind>().unwrap(), kind);
            assert_eq!(kind.name().to_uppercase().parse::<ScenarioKind>().unwrap(), kind);
        }
        assert_eq!(
            " Message-Sync ".parse::<ScenarioKind>().unwrap(),
            ScenarioKind::MessageSync
        );
    }

    #[test]
    fn unknown_scenario_lists_available_names() {
        match "basic-messaging".parse::<ScenarioKind>() {
            Err(MurmurError::InvalidInput(message)) => {
                assert!(message.contains("Unknown scenario 'basic-messaging'"));
                assert!(message.contains("conversation-switch"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn scenario_names_are_unique() {
        let mut names: Vec<_> = ScenarioKind::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ScenarioKind::ALL.len());
    }

    #[tokio::test]
    async fn unknown_selection_runs_nothing() {
        let (registry, _logs) = registry();
        assert!(matches!(
            registry.run(Some("nope")).await,
            Err(MurmurError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn contacts_scenario_passes_on_a_fresh_store() {
        let (registry, _logs) = registry();
        let summary = registry.run(Some("contacts")).await.unwrap();

        assert_eq!(summary.results.len(), 1);
        assert_eq!(summary.scenarios_failed(), 0);
        assert!(summary.tests_passed() > 0);
        summary.into_result().unwrap();
    }
}
