use anyhow::Context;
use std::sync::Arc;

use crate::module::{InitCtx, Migration, Module};

/// Core modules are driven in this order; the HTTP server starts after all of them.
const CORE_MODULE_ORDER: &[&str] = &["db"];

#[derive(Clone, Copy)]
enum Phase<'c, 'a> {
    Init(&'c InitCtx<'a>),
    Start(&'c InitCtx<'a>),
    Stop,
}

impl Phase<'_, '_> {
    fn verb(self) -> &'static str {
        match self {
            Phase::Init(_) => "initialize",
            Phase::Start(_) => "start",
            Phase::Stop => "stop",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tier {
    Core,
    Custom,
}

impl Tier {
    fn label(self) -> &'static str {
        match self {
            Tier::Core => "core",
            Tier::Custom => "custom",
        }
    }
}

/// Holds every module of the application.
///
/// Core modules are infrastructure (the document store) and run in
/// `CORE_MODULE_ORDER`. Custom modules are features and run in
/// registration order. Stopping walks both lists backwards.
pub struct ModuleRegistry {
    core_modules: Vec<Arc<dyn Module>>,
    custom_modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            core_modules: Vec::new(),
            custom_modules: Vec::new(),
        }
    }

    pub fn register_core(&mut self, module: Arc<dyn Module>) {
        self.core_modules.push(module);
    }

    pub fn register_custom(&mut self, module: Arc<dyn Module>) {
        self.custom_modules.push(module);
    }

    /// Core modules followed by custom modules.
    pub fn modules(&self) -> Vec<&Arc<dyn Module>> {
        self.core_modules
            .iter()
            .chain(self.custom_modules.iter())
            .collect()
    }

    pub fn get_module(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules().into_iter().find(|module| module.name() == name)
    }

    pub fn core_module_count(&self) -> usize {
        self.core_modules.len()
    }

    pub fn custom_module_count(&self) -> usize {
        self.custom_modules.len()
    }

    pub async fn init_core_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        drive(Tier::Core, Phase::Init(ctx), self.ordered_core_modules()).await
    }

    pub async fn init_custom_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        drive(Tier::Custom, Phase::Init(ctx), self.custom_modules.iter().collect()).await
    }

    pub async fn start_core_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        drive(Tier::Core, Phase::Start(ctx), self.ordered_core_modules()).await
    }

    pub async fn start_custom_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        drive(Tier::Custom, Phase::Start(ctx), self.custom_modules.iter().collect()).await
    }

    /// Stop custom modules, last registered first.
    pub async fn stop_custom_modules(&self) -> anyhow::Result<()> {
        let modules = self.custom_modules.iter().rev().collect();
        drive(Tier::Custom, Phase::Stop, modules).await
    }

    /// Stop core modules in reverse `CORE_MODULE_ORDER`.
    pub async fn stop_core_modules(&self) -> anyhow::Result<()> {
        let mut modules = self.ordered_core_modules();
        modules.reverse();
        drive(Tier::Core, Phase::Stop, modules).await
    }

    /// Every migration paired with its owning module, sorted by module name then id.
    pub fn collect_migrations(&self) -> Vec<(String, Migration)> {
        let mut migrations: Vec<(String, Migration)> = self
            .modules()
            .into_iter()
            .flat_map(|module| {
                let owner = module.name();
                module
                    .migrations()
                    .into_iter()
                    .map(move |migration| (owner.to_string(), migration))
            })
            .collect();

        migrations.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(b.1.id)));
        migrations
    }

    fn ordered_core_modules(&self) -> Vec<&Arc<dyn Module>> {
        CORE_MODULE_ORDER
            .iter()
            .filter_map(|&name| self.core_modules.iter().find(|m| m.name() == name))
            .collect()
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn drive(tier: Tier, phase: Phase<'_, '_>, modules: Vec<&Arc<dyn Module>>) -> anyhow::Result<()> {
    tracing::info!(
        tier = tier.label(),
        phase = phase.verb(),
        count = modules.len(),
        "module lifecycle phase"
    );

    for module in modules {
        tracing::debug!(module = module.name(), tier = tier.label(), phase = phase.verb());

        let outcome = match phase {
            Phase::Init(ctx) => module.init(ctx).await,
            Phase::Start(ctx) => module.start(ctx).await,
            Phase::Stop => module.stop().await,
        };

        outcome.with_context(|| {
            format!(
                "failed to {} {} module '{}'",
                phase.verb(),
                tier.label(),
                module.name()
            )
        })?;
    }

    Ok(())
}
