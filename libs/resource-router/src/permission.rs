//! Permission evaluation.
//!
//! Rules are predicates over `(operation, actor, record?)`. A rule list is
//! AND-combined and evaluated in order, one rule at a time. The evaluator is
//! defaults-closed: an empty list denies.
//!
//! The router evaluates twice for point operations: first without a record
//! (operation-level gate, before any I/O) and then with the fetched record
//! (object-level gate). Rules that need a record must answer `true` when
//! called without one.

use std::sync::Arc;

use async_trait::async_trait;
use resource_security::{Actor, DEFAULT_OWNER_FIELD, is_owner};
use tracing::{debug, warn};

use crate::model::Record;
use crate::operation::Operation;

/// One permission predicate.
#[async_trait]
pub trait PermissionRule: Send + Sync {
    /// # Errors
    /// An error is treated exactly like a `false` answer.
    async fn check(
        &self,
        operation: Operation,
        actor: Option<&Actor>,
        record: Option<&Record>,
    ) -> anyhow::Result<bool>;
}

pub type Rule = Arc<dyn PermissionRule>;

/// Evaluate `rules` in order; the first `false` (or error) denies.
pub async fn check_permissions(
    operation: Operation,
    rules: &[Rule],
    actor: Option<&Actor>,
    record: Option<&Record>,
) -> bool {
    if rules.is_empty() {
        warn!(%operation, "No permission rules configured; denying");
        return false;
    }
    for (index, rule) in rules.iter().enumerate() {
        match rule.check(operation, actor, record).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(%operation, rule = index, "Permission rule denied");
                return false;
            }
            Err(e) => {
                debug!(%operation, rule = index, error = %e, "Permission rule failed; denying");
                return false;
            }
        }
    }
    true
}

/// Per-operation rule lists of one resource.
#[derive(Clone, Default)]
pub struct Permissions {
    list: Vec<Rule>,
    create: Vec<Rule>,
    read: Vec<Rule>,
    update: Vec<Rule>,
    delete: Vec<Rule>,
}

impl Permissions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The same rule list for every operation.
    #[must_use]
    pub fn all(rules: Vec<Rule>) -> Self {
        Self {
            list: rules.clone(),
            create: rules.clone(),
            read: rules.clone(),
            update: rules.clone(),
            delete: rules,
        }
    }

    #[must_use]
    pub fn list(mut self, rules: Vec<Rule>) -> Self {
        self.list = rules;
        self
    }

    #[must_use]
    pub fn create(mut self, rules: Vec<Rule>) -> Self {
        self.create = rules;
        self
    }

    #[must_use]
    pub fn read(mut self, rules: Vec<Rule>) -> Self {
        self.read = rules;
        self
    }

    #[must_use]
    pub fn update(mut self, rules: Vec<Rule>) -> Self {
        self.update = rules;
        self
    }

    #[must_use]
    pub fn delete(mut self, rules: Vec<Rule>) -> Self {
        self.delete = rules;
        self
    }

    #[must_use]
    pub fn rules_for(&self, operation: Operation) -> &[Rule] {
        match operation {
            Operation::List => &self.list,
            Operation::Create => &self.create,
            Operation::Read => &self.read,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }

    pub async fn check(
        &self,
        operation: Operation,
        actor: Option<&Actor>,
        record: Option<&Record>,
    ) -> bool {
        check_permissions(operation, self.rules_for(operation), actor, record).await
    }
}

/// Reusable rule variants.
pub mod rules {
    use super::{
        Actor, Arc, DEFAULT_OWNER_FIELD, Operation, PermissionRule, Record, Rule, async_trait,
        is_owner,
    };

    /// Always allows.
    pub struct AllowAny;

    #[async_trait]
    impl PermissionRule for AllowAny {
        async fn check(
            &self,
            _: Operation,
            _: Option<&Actor>,
            _: Option<&Record>,
        ) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    /// Administrators only.
    pub struct AdminOnly;

    #[async_trait]
    impl PermissionRule for AdminOnly {
        async fn check(
            &self,
            _: Operation,
            actor: Option<&Actor>,
            _: Option<&Record>,
        ) -> anyhow::Result<bool> {
            Ok(actor.is_some_and(Actor::is_admin))
        }
    }

    /// Any non-anonymous actor.
    pub struct Authenticated;

    #[async_trait]
    impl PermissionRule for Authenticated {
        async fn check(
            &self,
            _: Operation,
            actor: Option<&Actor>,
            _: Option<&Record>,
        ) -> anyhow::Result<bool> {
            Ok(actor.is_some_and(Actor::is_authenticated))
        }
    }

    /// Record owner or administrator. Allows when there is no record yet.
    pub struct OwnerOrAdmin {
        owner_field: String,
    }

    impl OwnerOrAdmin {
        #[must_use]
        pub fn with_field(owner_field: impl Into<String>) -> Self {
            Self {
                owner_field: owner_field.into(),
            }
        }
    }

    impl Default for OwnerOrAdmin {
        fn default() -> Self {
            Self::with_field(DEFAULT_OWNER_FIELD)
        }
    }

    fn owner_or_admin(actor: Option<&Actor>, record: Option<&Record>, owner_field: &str) -> bool {
        let Some(record) = record else {
            return true;
        };
        actor.is_some_and(|a| {
            a.is_admin() || (a.is_authenticated() && is_owner(a, record, owner_field))
        })
    }

    #[async_trait]
    impl PermissionRule for OwnerOrAdmin {
        async fn check(
            &self,
            _: Operation,
            actor: Option<&Actor>,
            record: Option<&Record>,
        ) -> anyhow::Result<bool> {
            Ok(owner_or_admin(actor, record, &self.owner_field))
        }
    }

    /// Owner or administrator for writes; anyone for `list`/`read`.
    pub struct OwnerOrAdminElseReadOnly {
        owner_field: String,
    }

    impl OwnerOrAdminElseReadOnly {
        #[must_use]
        pub fn with_field(owner_field: impl Into<String>) -> Self {
            Self {
                owner_field: owner_field.into(),
            }
        }
    }

    impl Default for OwnerOrAdminElseReadOnly {
        fn default() -> Self {
            Self::with_field(DEFAULT_OWNER_FIELD)
        }
    }

    #[async_trait]
    impl PermissionRule for OwnerOrAdminElseReadOnly {
        async fn check(
            &self,
            operation: Operation,
            actor: Option<&Actor>,
            record: Option<&Record>,
        ) -> anyhow::Result<bool> {
            if operation.is_read_only() {
                return Ok(true);
            }
            Ok(owner_or_admin(actor, record, &self.owner_field))
        }
    }

    /// Synchronous closure rule.
    pub struct FnRule<F>(F);

    #[async_trait]
    impl<F> PermissionRule for FnRule<F>
    where
        F: Fn(Operation, Option<&Actor>, Option<&Record>) -> bool + Send + Sync,
    {
        async fn check(
            &self,
            operation: Operation,
            actor: Option<&Actor>,
            record: Option<&Record>,
        ) -> anyhow::Result<bool> {
            Ok((self.0)(operation, actor, record))
        }
    }

    #[must_use]
    pub fn allow_any() -> Rule {
        Arc::new(AllowAny)
    }

    #[must_use]
    pub fn admin_only() -> Rule {
        Arc::new(AdminOnly)
    }

    #[must_use]
    pub fn authenticated() -> Rule {
        Arc::new(Authenticated)
    }

    #[must_use]
    pub fn owner_or_admin_rule() -> Rule {
        Arc::new(OwnerOrAdmin::default())
    }

    #[must_use]
    pub fn owner_or_admin_else_read_only() -> Rule {
        Arc::new(OwnerOrAdminElseReadOnly::default())
    }

    #[must_use]
    pub fn from_fn<F>(f: F) -> Rule
    where
        F: Fn(Operation, Option<&Actor>, Option<&Record>) -> bool + Send + Sync + 'static,
    {
        Arc::new(FnRule(f))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tracing_test::traced_test;

    use super::rules::{
        admin_only, allow_any, authenticated, from_fn, owner_or_admin_else_read_only,
        owner_or_admin_rule,
    };
    use super::*;

    fn record(owner: &str) -> Record {
        json!({"_id": "r1", "ownerId": owner})
            .as_object()
            .cloned()
            .unwrap_or_default()
    }

    #[tokio::test]
    #[traced_test]
    async fn empty_rule_list_denies() {
        let admin = Actor::admin("root");
        for op in Operation::ALL {
            assert!(!check_permissions(op, &[], Some(&admin), None).await);
        }
        assert!(logs_contain("No permission rules configured"));
    }

    #[tokio::test]
    async fn rules_are_and_combined_and_short_circuit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counting = from_fn(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        let rules = vec![admin_only(), counting];
        let user = Actor::user("u1");
        assert!(!check_permissions(Operation::Read, &rules, Some(&user), None).await);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let admin = Actor::admin("root");
        assert!(check_permissions(Operation::Read, &rules, Some(&admin), None).await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_rule_denies() {
        struct Broken;

        #[async_trait]
        impl PermissionRule for Broken {
            async fn check(
                &self,
                _: Operation,
                _: Option<&Actor>,
                _: Option<&Record>,
            ) -> anyhow::Result<bool> {
                anyhow::bail!("lookup failed")
            }
        }

        let rules: Vec<Rule> = vec![allow_any(), Arc::new(Broken)];
        assert!(!check_permissions(Operation::List, &rules, None, None).await);
    }

    #[tokio::test]
    async fn authenticated_rejects_missing_and_anonymous() {
        let rules = vec![authenticated()];
        assert!(!check_permissions(Operation::List, &rules, None, None).await);
        let anon = Actor::anonymous("a1");
        assert!(!check_permissions(Operation::List, &rules, Some(&anon), None).await);
        let user = Actor::user("u1");
        assert!(check_permissions(Operation::List, &rules, Some(&user), None).await);
    }

    #[tokio::test]
    async fn owner_or_admin_allows_pre_check_without_record() {
        let rules = vec![owner_or_admin_rule()];
        let user = Actor::user("u1");

        assert!(check_permissions(Operation::Update, &rules, Some(&user), None).await);
        assert!(
            check_permissions(Operation::Update, &rules, Some(&user), Some(&record("u1"))).await
        );
        assert!(
            !check_permissions(Operation::Update, &rules, Some(&user), Some(&record("u2"))).await
        );
        assert!(!check_permissions(Operation::Update, &rules, None, Some(&record("u2"))).await);

        let admin = Actor::admin("root");
        assert!(
            check_permissions(Operation::Delete, &rules, Some(&admin), Some(&record("u2"))).await
        );
    }

    #[tokio::test]
    async fn owner_else_read_only_opens_reads() {
        let rules = vec![owner_or_admin_else_read_only()];
        let stranger = Actor::user("u3");
        let theirs = record("u2");

        assert!(check_permissions(Operation::Read, &rules, Some(&stranger), Some(&theirs)).await);
        assert!(check_permissions(Operation::List, &rules, None, None).await);
        assert!(
            !check_permissions(Operation::Update, &rules, Some(&stranger), Some(&theirs)).await
        );
    }

    #[tokio::test]
    async fn permissions_route_rules_by_operation() {
        let permissions = Permissions::new()
            .list(vec![allow_any()])
            .create(vec![authenticated()]);

        assert!(permissions.check(Operation::List, None, None).await);
        assert!(!permissions.check(Operation::Create, None, None).await);
        // unset operations are empty, hence denied
        assert!(!permissions.check(Operation::Delete, Some(&Actor::admin("root")), None).await);
    }
}
