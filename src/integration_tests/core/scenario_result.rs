use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub tests_run: u32,
    pub tests_passed: u32,
    pub tests_failed: u32,
    pub duration: Duration,
    pub success: bool,
}

impl ScenarioResult {
    pub fn new(name: &str, tests_run: u32, tests_passed: u32, duration: Duration) -> Self {
        Self {
            scenario_name: name.to_string(),
            tests_run,
            tests_passed,
            tests_failed: tests_run - tests_passed,
            duration,
            success: tests_passed == tests_run,
        }
    }

    /// A scenario that aborted with an error, whatever its test counts say.
    pub fn failed(name: &str, tests_run: u32, tests_passed: u32, duration: Duration) -> Self {
        Self {
            success: false,
            ..Self::new(name, tests_run, tests_passed, duration)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_is_never_successful() {
        let ok = ScenarioResult::new("x", 3, 3, Duration::from_millis(1));
        let failed = ScenarioResult::failed("x", 3, 3, Duration::from_millis(1));
        assert!(ok.success);
        assert!(!failed.success);
        assert_eq!(failed.tests_failed, 0);
    }
}
