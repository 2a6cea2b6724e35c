use std::fmt;

use futures::future::BoxFuture;

use crate::config::IsolationMode;
use crate::error::HarnessResult;
use crate::models::Customer;
use crate::persistence::PersistenceBinding;

pub type ScenarioFuture<'a> = BoxFuture<'a, HarnessResult<()>>;

type ScenarioBody = dyn for<'a> Fn(ScenarioContext<'a>) -> ScenarioFuture<'a> + Send + Sync;

/// What a scenario body gets to work with: the session's binding and the seeded fixture
#[derive(Debug, Clone, Copy)]
pub struct ScenarioContext<'a> {
    binding: &'a PersistenceBinding,
    fixture: Option<&'a Customer>,
    isolation: IsolationMode,
}

impl<'a> ScenarioContext<'a> {
    pub fn new(
        binding: &'a PersistenceBinding,
        fixture: Option<&'a Customer>,
        isolation: IsolationMode,
    ) -> Self {
        Self {
            binding,
            fixture,
            isolation,
        }
    }

    pub fn binding(&self) -> &'a PersistenceBinding {
        self.binding
    }

    pub fn fixture(&self) -> Option<&'a Customer> {
        self.fixture
    }

    pub fn isolation(&self) -> IsolationMode {
        self.isolation
    }

    /// Rows present when the scenario starts
    pub fn baseline_count(&self) -> i64 {
        i64::from(self.fixture.is_some())
    }
}

/// A named scenario the session controller runs between fixture seed and teardown
pub struct Scenario {
    name: String,
    body: Box<ScenarioBody>,
}

impl Scenario {
    /// ```rust,no_run
    /// use ephemeral_harness::session::Scenario;
    /// use futures::FutureExt;
    ///
    /// let scenario = Scenario::new("table starts with the fixture", |ctx| {
    ///     async move {
    ///         let mut uow = ctx.binding().new_read_only_unit_of_work().await?;
    ///         let rows = uow.count().await?;
    ///         uow.rollback().await?;
    ///         ephemeral_harness::error::ensure_eq("rows", ctx.baseline_count(), rows)
    ///     }
    ///     .boxed()
    /// });
    /// ```
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(ScenarioContext<'a>) -> ScenarioFuture<'a> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn run<'a>(&self, ctx: ScenarioContext<'a>) -> ScenarioFuture<'a> {
        (self.body)(ctx)
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish()
    }
}
