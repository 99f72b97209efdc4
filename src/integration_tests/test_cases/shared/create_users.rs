use crate::integration_tests::core::*;
use crate::{Identity, MurmurError};
use async_trait::async_trait;

pub struct CreateUsersTestCase {
    names: Vec<String>,
}

impl CreateUsersTestCase {
    pub fn with_names(names: Vec<&str>) -> Self {
        Self {
            names: names.into_iter().map(String::from).collect(),
        }
    }

    /// Registered email of the user created under `name`.
    pub fn email_for(name: &str) -> String {
        format!("{}@murmur.test", name)
    }

    fn display_name_for(name: &str) -> String {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl TestCase for CreateUsersTestCase {
    async fn run(&self, context: &mut ScenarioContext) -> Result<(), MurmurError> {
        tracing::info!("Creating {} users...", self.names.len());

        for name in &self.names {
            let identity = Identity::new(name.as_str(), Self::display_name_for(name))
                .with_email(Self::email_for(name));
            let client = context.add_client(name, identity)?;
            let profile = client.publish_profile().await?;

            assert_eq!(profile.email.as_deref(), Some(Self::email_for(name).as_str()));
            tracing::info!("✓ Created user '{}' ({})", name, profile.display_name);
        }

        Ok(())
    }
}
