use anyhow::anyhow;

use crate::error::catch_panic;
use crate::log::Logger;
use crate::render::RenderPipeline;

/// Pluggable game subsystem. Every hook is optional.
///
/// Systems talk to the engine only through these hooks and the pipeline they
/// are handed; an error or panic in one hook is contained to that system for
/// that frame.
pub trait System {
    /// Инициализация ресурсов, пока движок в `Loading`.
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn update(&mut self, _dt_ms: f64) -> anyhow::Result<()> {
        Ok(())
    }

    fn render(&mut self, _pipeline: &mut RenderPipeline) -> anyhow::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) {}
}

/// One contained failure.
#[derive(Debug)]
pub struct SystemFailure {
    pub name: String,
    pub error: anyhow::Error,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub ran: usize,
    pub failures: Vec<SystemFailure>,
}

impl DispatchReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Entry {
    name: String,
    system: Box<dyn System>,
    failures: u64,
}

/// Системы по имени, в порядке регистрации.
pub struct SystemRegistry {
    log: Logger,
    entries: Vec<Entry>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self {
            log: Logger::new("Systems"),
            entries: Vec::new(),
        }
    }

    /// Store `system` under `name`. An existing system with that name is
    /// replaced in place (keeping its slot in the order) and a warning is logged.
    pub fn register(&mut self, name: impl Into<String>, system: Box<dyn System>) {
        let name = name.into();
        if let Some(e) = self.entries.iter_mut().find(|e| e.name == name) {
            self.log.warn(format!("system '{name}' already registered, replacing"));
            e.system = system;
            e.failures = 0;
            return;
        }
        self.log.debug(format!("registered '{name}'"));
        self.entries.push(Entry { name, system, failures: 0 });
    }

    /// Remove `name`, running its shutdown hook. Returns whether it existed.
    pub fn unregister(&mut self, name: &str) -> bool {
        match self.entries.iter().position(|e| e.name == name) {
            Some(i) => {
                let mut e = self.entries.remove(i);
                self.shutdown_entry(&mut e);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Failures recorded for `name` since it was registered.
    pub fn failure_count(&self, name: &str) -> Option<u64> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.failures)
    }

    pub fn dispatch_init(&mut self) -> DispatchReport {
        self.dispatch("init", |s| s.init())
    }

    pub fn dispatch_update(&mut self, dt_ms: f64) -> DispatchReport {
        self.dispatch("update", |s| s.update(dt_ms))
    }

    pub fn dispatch_render(&mut self, pipeline: &mut RenderPipeline) -> DispatchReport {
        self.dispatch("render", |s| s.render(pipeline))
    }

    /// Shutdown лучше делать в обратном порядке регистрации.
    pub fn dispatch_shutdown(&mut self) {
        let mut entries = std::mem::take(&mut self.entries);
        for e in entries.iter_mut().rev() {
            self.shutdown_entry(e);
        }
        self.entries = entries;
    }

    fn shutdown_entry(&self, e: &mut Entry) {
        if let Err(err) = guarded(|| {
            e.system.shutdown();
            Ok(())
        }) {
            self.log.error(format!("shutdown of '{}' failed: {err:#}", e.name));
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn dispatch<F>(&mut self, hook: &str, mut call: F) -> DispatchReport
    where
        F: FnMut(&mut dyn System) -> anyhow::Result<()>,
    {
        let mut report = DispatchReport::default();

        for e in self.entries.iter_mut() {
            report.ran += 1;
            if let Err(error) = guarded(|| call(e.system.as_mut())) {
                e.failures += 1;
                self.log.error(format!("{hook} of '{}' failed: {error:#}", e.name));
                report.failures.push(SystemFailure { name: e.name.clone(), error });
            }
        }

        report
    }
}

impl Default for SystemRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Вызвать hook; panic → ошибка.
fn guarded<F>(f: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    catch_panic(f).unwrap_or_else(|msg| Err(anyhow!("panicked: {msg}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Trace = Rc<RefCell<Vec<String>>>;

    struct Probe {
        tag: &'static str,
        trace: Trace,
    }

    impl System for Probe {
        fn update(&mut self, dt_ms: f64) -> anyhow::Result<()> {
            self.trace.borrow_mut().push(format!("{}:{dt_ms}", self.tag));
            Ok(())
        }

        fn shutdown(&mut self) {
            self.trace.borrow_mut().push(format!("{}:down", self.tag));
        }
    }

    struct Failing;

    impl System for Failing {
        fn update(&mut self, _dt_ms: f64) -> anyhow::Result<()> {
            bail!("out of ammo")
        }
    }

    struct Panicking;

    impl System for Panicking {
        fn update(&mut self, _dt_ms: f64) -> anyhow::Result<()> {
            panic!("boom");
        }
    }

    /// Render-less, update-less system.
    struct Inert;
    impl System for Inert {}

    fn probe(tag: &'static str, trace: &Trace) -> Box<dyn System> {
        Box::new(Probe { tag, trace: trace.clone() })
    }

    #[test]
    fn dispatch_runs_in_registration_order() {
        let trace = Trace::default();
        let mut reg = SystemRegistry::new();
        reg.register("b", probe("b", &trace));
        reg.register("a", probe("a", &trace));
        reg.register("inert", Box::new(Inert));

        let report = reg.dispatch_update(16.0);
        assert!(report.is_clean());
        assert_eq!(report.ran, 3);
        assert_eq!(*trace.borrow(), vec!["b:16", "a:16"]);
        assert_eq!(reg.names(), vec!["b", "a", "inert"]);
    }

    #[test]
    fn failures_are_contained() {
        let trace = Trace::default();
        let mut reg = SystemRegistry::new();
        reg.register("first", probe("first", &trace));
        reg.register("failing", Box::new(Failing));
        reg.register("panicking", Box::new(Panicking));
        reg.register("last", probe("last", &trace));

        let report = reg.dispatch_update(8.0);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].name, "failing");
        assert!(report.failures[1].error.to_string().contains("boom"));
        assert_eq!(*trace.borrow(), vec!["first:8", "last:8"]);
        assert_eq!(reg.failure_count("failing"), Some(1));
        assert_eq!(reg.failure_count("last"), Some(0));
        assert_eq!(reg.failure_count("nope"), None);
    }

    #[test]
    fn re_register_replaces_in_place() {
        let trace = Trace::default();
        let mut reg = SystemRegistry::new();
        reg.register("player", probe("old", &trace));
        reg.register("hud", probe("hud", &trace));
        reg.register("player", probe("new", &trace));

        assert_eq!(reg.len(), 2);
        reg.dispatch_update(1.0);
        assert_eq!(*trace.borrow(), vec!["new:1", "hud:1"]);
    }

    #[test]
    fn unregister_reports_existence() {
        let trace = Trace::default();
        let mut reg = SystemRegistry::new();
        reg.register("a", probe("a", &trace));
        assert!(reg.unregister("a"));
        assert!(!reg.unregister("a"));
        assert!(!reg.contains("a"));
        assert_eq!(*trace.borrow(), vec!["a:down"]);
    }

    struct BadShutdown;

    impl System for BadShutdown {
        fn shutdown(&mut self) {
            panic!("double free");
        }
    }

    #[test]
    fn panicking_shutdown_is_contained() {
        let trace = Trace::default();
        let mut reg = SystemRegistry::new();
        reg.register("bad", Box::new(BadShutdown));
        assert!(reg.unregister("bad"));
        assert!(reg.is_empty());

        reg.register("a", probe("a", &trace));
        reg.register("bad", Box::new(BadShutdown));
        reg.register("b", probe("b", &trace));
        reg.dispatch_shutdown();
        assert_eq!(*trace.borrow(), vec!["b:down", "a:down"]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn shutdown_runs_in_reverse() {
        let trace = Trace::default();
        let mut reg = SystemRegistry::new();
        reg.register("a", probe("a", &trace));
        reg.register("b", probe("b", &trace));
        reg.dispatch_shutdown();
        assert_eq!(*trace.borrow(), vec!["b:down", "a:down"]);
    }
}
