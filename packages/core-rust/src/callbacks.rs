//! Before/around/after hooks for the `call` lifecycle event.
//!
//! Execution order is fixed relative to the business logic, not to the
//! order hooks of different phases were registered in:
//!
//! ```text
//! before*  ->  around-pre (outermost first)  ->  core  ->  around-post  ->  after*
//! ```

use std::fmt;
use std::sync::Arc;

use crate::context::Context;

pub type HookFn = Arc<dyn Fn(&mut Context) -> anyhow::Result<()> + Send + Sync>;
pub type AroundFn = Arc<dyn Fn(&mut Context, Next<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Phase and handler of one registered hook.
#[derive(Clone)]
pub enum Callback {
    Before(HookFn),
    After(HookFn),
    Around(AroundFn),
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callback::Before(_) => f.write_str("Before(..)"),
            Callback::After(_) => f.write_str("After(..)"),
            Callback::Around(_) => f.write_str("Around(..)"),
        }
    }
}

/// Continuation handed to an around hook.
///
/// Consumed by [`run`](Next::run), so it can be invoked at most once.
pub struct Next<'a> {
    inner: &'a mut dyn FnMut(&mut Context) -> anyhow::Result<()>,
}

impl Next<'_> {
    /// Runs the rest of the chain (inner arounds and the business logic).
    ///
    /// # Errors
    ///
    /// Propagates any error raised further down the chain.
    pub fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        (self.inner)(ctx)
    }
}

/// How a chain run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// Core ran and every after hook executed.
    Completed,
    /// An around hook returned without invoking its continuation.
    Halted,
}

/// Ordered hooks of one class for the `call` event.
#[derive(Debug, Clone, Default)]
pub struct CallbackChain {
    callbacks: Vec<Callback>,
}

impl CallbackChain {
    #[must_use]
    pub fn new(callbacks: Vec<Callback>) -> Self {
        Self { callbacks }
    }

    pub fn push(&mut self, callback: Callback) {
        self.callbacks.push(callback);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Runs the chain with `core` at its innermost point.
    ///
    /// # Errors
    ///
    /// The first error from any hook or from `core` aborts the chain and is
    /// returned unchanged.
    pub fn run<F>(&self, ctx: &mut Context, mut core: F) -> anyhow::Result<ChainOutcome>
    where
        F: FnMut(&mut Context) -> anyhow::Result<()>,
    {
        let mut arounds = Vec::new();
        for callback in &self.callbacks {
            match callback {
                Callback::Before(hook) => hook(ctx)?,
                Callback::Around(hook) => arounds.push(hook.clone()),
                Callback::After(_) => {}
            }
        }

        if !run_arounds(&arounds, ctx, &mut core)? {
            tracing::warn!(
                class = ctx.class_name(),
                "around callback did not invoke its continuation; chain halted"
            );
            return Ok(ChainOutcome::Halted);
        }

        for callback in &self.callbacks {
            if let Callback::After(hook) = callback {
                hook(ctx)?;
            }
        }
        Ok(ChainOutcome::Completed)
    }
}

/// Nests `arounds` outside-in around `core`. Returns whether `core` was reached.
fn run_arounds(
    arounds: &[AroundFn],
    ctx: &mut Context,
    core: &mut dyn FnMut(&mut Context) -> anyhow::Result<()>,
) -> anyhow::Result<bool> {
    let Some((outer, rest)) = arounds.split_first() else {
        core(ctx)?;
        return Ok(true);
    };

    let mut reached = false;
    {
        let mut continuation = |ctx: &mut Context| -> anyhow::Result<()> {
            reached = run_arounds(rest, ctx, core)?;
            Ok(())
        };
        outer(
            ctx,
            Next {
                inner: &mut continuation,
            },
        )?;
    }
    Ok(reached)
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::context::WriteGate;

    type Log = Arc<Mutex<Vec<String>>>;

    fn before(log: &Log, tag: &'static str) -> Callback {
        let log = log.clone();
        Callback::Before(Arc::new(move |_: &mut Context| -> anyhow::Result<()> {
            log.lock().push(tag.to_string());
            Ok(())
        }))
    }

    fn after(log: &Log, tag: &'static str) -> Callback {
        let log = log.clone();
        Callback::After(Arc::new(move |_: &mut Context| -> anyhow::Result<()> {
            log.lock().push(tag.to_string());
            Ok(())
        }))
    }

    fn around(log: &Log, tag: &'static str) -> Callback {
        let log = log.clone();
        Callback::Around(Arc::new(move |ctx: &mut Context, next: Next<'_>| -> anyhow::Result<()> {
            log.lock().push(format!("{tag}-pre"));
            next.run(ctx)?;
            log.lock().push(format!("{tag}-post"));
            Ok(())
        }))
    }

    fn run_chain(chain: &CallbackChain, log: &Log) -> anyhow::Result<ChainOutcome> {
        let mut ctx = Context::new("Test", WriteGate::Open);
        let core_log = log.clone();
        chain.run(&mut ctx, move |_| {
            core_log.lock().push("core".to_string());
            Ok(())
        })
    }

    #[test]
    fn phases_fire_relative_to_core() {
        let log: Log = Arc::default();
        // after registered first on purpose
        let chain = CallbackChain::new(vec![
            after(&log, "after"),
            around(&log, "around"),
            before(&log, "before"),
        ]);
        assert_eq!(run_chain(&chain, &log).unwrap(), ChainOutcome::Completed);
        assert_eq!(
            *log.lock(),
            vec!["before", "around-pre", "core", "around-post", "after"]
        );
    }

    #[test]
    fn arounds_nest_outside_in() {
        let log: Log = Arc::default();
        let chain = CallbackChain::new(vec![around(&log, "outer"), around(&log, "inner")]);
        run_chain(&chain, &log).unwrap();
        assert_eq!(
            *log.lock(),
            vec!["outer-pre", "inner-pre", "core", "inner-post", "outer-post"]
        );
    }

    #[test]
    fn skipped_continuation_halts_core_and_afters() {
        let log: Log = Arc::default();
        let chain = CallbackChain::new(vec![
            Callback::Around(Arc::new(|_: &mut Context, _next: Next<'_>| -> anyhow::Result<()> { Ok(()) })),
            after(&log, "after"),
        ]);
        assert_eq!(run_chain(&chain, &log).unwrap(), ChainOutcome::Halted);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn hook_error_aborts_chain() {
        let log: Log = Arc::default();
        let chain = CallbackChain::new(vec![
            Callback::Before(Arc::new(|_: &mut Context| -> anyhow::Result<()> { Err(anyhow::anyhow!("boom")) })),
            after(&log, "after"),
        ]);
        let err = run_chain(&chain, &log).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(log.lock().is_empty());
    }

    #[test]
    fn before_hooks_can_initialize_fields() {
        let chain = CallbackChain::new(vec![Callback::Before(Arc::new(|ctx: &mut Context| -> anyhow::Result<()> {
            ctx.set("user", "pending")?;
            Ok(())
        }))]);
        let mut ctx = Context::new("Test", WriteGate::Open);
        chain
            .run(&mut ctx, |ctx| {
                assert_eq!(ctx.get("user").and_then(|v| v.as_str()), Some("pending"));
                Ok(())
            })
            .unwrap();
    }
}
