//! Stack lookup by name.

use tracing::{debug, warn};

use crate::cloudformation::{CloudFormationApi, Stack};
use crate::error::Result;

/// Resolves the current state of a stack.
pub struct StackLookup<'a, C: CloudFormationApi + ?Sized> {
    api: &'a C,
}

impl<'a, C: CloudFormationApi + ?Sized> StackLookup<'a, C> {
    /// Creates a lookup over the given API.
    #[must_use]
    pub const fn new(api: &'a C) -> Self {
        Self { api }
    }

    /// Finds a stack by name.
    ///
    /// Returns `None` when the service reports that the stack does not exist.
    ///
    /// # Errors
    ///
    /// Returns any other service error unchanged.
    pub async fn find(&self, name: &str) -> Result<Option<Stack>> {
        let mut stacks = self.api.describe_stacks(name).await?;

        if stacks.len() > 1 {
            warn!("{} stacks match {name}; using the first", stacks.len());
        }

        if stacks.is_empty() {
            debug!("Stack {name} does not exist");
            return Ok(None);
        }

        let stack = stacks.swap_remove(0);
        debug!("Stack {name} is {}", stack.status);
        Ok(Some(stack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloudformation::MockCloudFormationApi;
    use crate::cloudformation::fake::{FakeCloudFormation, stack};
    use crate::error::CfnDeployError;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_absent_stack() {
        let fake = FakeCloudFormation::new();
        let found = assert_ok!(StackLookup::new(&fake).find("app").await);
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_existing_stack() {
        let fake = FakeCloudFormation::new().with_stack("app", "UPDATE_COMPLETE");
        let found = assert_ok!(StackLookup::new(&fake).find("app").await);
        assert_eq!(found.map(|s| s.status).as_deref(), Some("UPDATE_COMPLETE"));
    }

    #[tokio::test]
    async fn test_first_of_several_matches() {
        let mut api = MockCloudFormationApi::new();
        api.expect_describe_stacks().times(1).returning(|name| {
            Ok(vec![
                stack(name, "CREATE_COMPLETE", None, vec![]),
                stack(name, "DELETE_COMPLETE", None, vec![]),
            ])
        });

        let found = assert_ok!(StackLookup::new(&api).find("app").await);
        assert_eq!(found.map(|s| s.status).as_deref(), Some("CREATE_COMPLETE"));
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let fake = FakeCloudFormation::new();
        fake.fail_describe_stacks("AccessDenied");

        let err = assert_err!(StackLookup::new(&fake).find("app").await);
        match err {
            CfnDeployError::CloudFormation(e) => assert_eq!(e.code(), Some("AccessDenied")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
