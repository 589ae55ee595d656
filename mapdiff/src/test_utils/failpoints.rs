use fail::FailScenario;

/// Configures fail points for the lifetime of the scenario and turns them off again on drop.
///
/// Fail point configuration is process global. The wrapped [`FailScenario`] holds the `fail`
/// crate's scenario lock until the fail points configured here are removed again, so scenarios
/// of concurrently running tests never overlap.
pub struct CustomFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<(String, String)>,
}

impl<'a> CustomFailScenario<'a> {
    pub fn setup(failpoints: &[(&str, &str)]) -> CustomFailScenario<'a> {
        let scenario = FailScenario::setup();
        let failpoints = failpoints
            .iter()
            .map(|(name, action)| (name.to_string(), action.to_string()))
            .collect::<Vec<_>>();

        for (name, action) in &failpoints {
            fail::cfg(name, action).unwrap();
        }

        Self {
            _scenario: scenario,
            failpoints,
        }
    }
}

impl Drop for CustomFailScenario<'_> {
    fn drop(&mut self) {
        for (name, _) in &self.failpoints {
            fail::remove(name);
        }
    }
}
