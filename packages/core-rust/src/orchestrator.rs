//! Call orchestration.
//!
//! One [`Orchestrator`] runs one invocation of a [`ServiceClass`]:
//!
//! ```text
//! Built -> Restricting -> Validating -+-> Failed
//!                                     +-> ExecutingCallbacks -> Invoked -> Finalized
//! ```
//!
//! A restriction violation while building the context is raised, not
//! turned into a failed outcome. A class without a routine skips validation
//! and callbacks and finishes successfully with no data.

use tracing::{debug, debug_span, trace};

use crate::callbacks::ChainOutcome;
use crate::context::Context;
use crate::error::ServiceError;
use crate::outcome::Outcome;
use crate::service::ServiceClass;
use crate::types::Args;
use crate::validation::ValidationEngine;

/// Stage of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Built,
    Restricting,
    Validating,
    Failed,
    ExecutingCallbacks,
    Invoked,
    Finalized,
}

impl InvocationState {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, InvocationState::Failed | InvocationState::Finalized)
    }
}

/// Runs a single invocation of a service class.
pub struct Orchestrator<'a> {
    class: &'a ServiceClass,
    state: InvocationState,
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub fn new(class: &'a ServiceClass) -> Self {
        Self {
            class,
            state: InvocationState::Built,
        }
    }

    #[must_use]
    pub fn state(&self) -> InvocationState {
        self.state
    }

    fn transition(&mut self, next: InvocationState) {
        trace!(class = self.class.name(), from = ?self.state, to = ?next, "invocation state");
        self.state = next;
    }

    /// Runs the invocation to a terminal state.
    ///
    /// # Errors
    ///
    /// `UndeclaredFieldWrite` when an argument or a write during execution
    /// targets an undeclared field of a restricted class; `Routine` when the
    /// business logic or a callback returns an error.
    pub fn invoke(&mut self, args: Args) -> Result<Outcome, ServiceError> {
        let class = self.class;
        let class_name = class.name();
        let _span = debug_span!("service_call", class = class_name).entered();

        // The gate is computed from the class as it is now, so an
        // unrestrict declared after definition applies to this call.
        let gate = class.registry().write_gate();
        let mut ctx = Context::from_args(class_name, gate, args)?;
        self.transition(InvocationState::Restricting);

        let Some(routine) = class.routine() else {
            self.transition(InvocationState::Finalized);
            return Ok(self.finish(&mut ctx));
        };

        self.transition(InvocationState::Validating);
        let errors = ValidationEngine::validate(&ctx, &class.validations());
        if !errors.is_empty() {
            ctx.errors_mut().merge(&errors);
            self.transition(InvocationState::Failed);
            return Ok(self.finish(&mut ctx));
        }

        self.transition(InvocationState::ExecutingCallbacks);
        let chain = class.callbacks();
        let ran = chain
            .run(&mut ctx, |ctx| {
                let returned = routine(ctx)?;
                if !ctx.has_result() {
                    ctx.set_result(returned);
                }
                Ok(())
            })
            .map_err(|err| ServiceError::from_routine(class_name, err))?;
        if ran == ChainOutcome::Completed {
            self.transition(InvocationState::Invoked);
        }

        self.transition(InvocationState::Finalized);
        Ok(self.finish(&mut ctx))
    }

    fn finish(&self, ctx: &mut Context) -> Outcome {
        ctx.finalize();
        let outcome = Outcome::from_context(ctx);
        debug!(
            class = self.class.name(),
            success = outcome.success(),
            state = ?self.state,
            "service call complete"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::types::{args, Value, ValueType};
    use crate::validation::presence;

    #[test]
    fn type_mismatch_fails_without_running_logic() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let class = ServiceClass::define("Age", |d| {
            d.typed_input("age", ValueType::Integer);
            d.before(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
            d.perform(|_| Ok(Value::from(true)));
        })
        .unwrap();

        let mut orchestrator = Orchestrator::new(&class);
        let outcome = orchestrator.invoke(args([("age", "x")])).unwrap();
        assert_eq!(orchestrator.state(), InvocationState::Failed);
        assert!(orchestrator.state().is_terminal());
        assert!(outcome.failure());
        assert_eq!(
            outcome.errors().unwrap().get("age").unwrap(),
            ["must be a Integer".to_string()]
        );
        assert!(outcome.data().is_none());
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn nil_passes_type_constraint() {
        let class = ServiceClass::define("Age", |d| {
            d.typed_input("age", ValueType::Integer);
            d.perform(|_| Ok(Value::Null));
        })
        .unwrap();
        assert!(class.call(args([("age", Value::Null)])).unwrap().success());
        assert!(class.call(Args::new()).unwrap().success());
    }

    #[test]
    fn explicit_result_wins_over_return_value() {
        let class = ServiceClass::define("Explicit", |d| {
            d.perform(|ctx| {
                ctx.set("result", "X")?;
                Ok(Value::from("Y"))
            });
        })
        .unwrap();
        let outcome = class.call(Args::new()).unwrap();
        assert_eq!(outcome.data(), Some(&Value::from("X")));
    }

    #[test]
    fn return_value_becomes_data() {
        let class = ServiceClass::define("Double", |d| {
            d.typed_input("n", ValueType::Integer);
            d.perform(|ctx| {
                let n = ctx.get("n").and_then(Value::as_i64).unwrap_or_default();
                Ok(Value::from(n * 2))
            });
        })
        .unwrap();
        let mut orchestrator = Orchestrator::new(&class);
        let outcome = orchestrator.invoke(args([("n", 21)])).unwrap();
        assert_eq!(orchestrator.state(), InvocationState::Finalized);
        assert_eq!(outcome.data(), Some(&Value::Int(42)));
    }

    #[test]
    fn class_without_routine_succeeds_with_no_data() {
        let class = ServiceClass::define("Empty", |d| {
            d.input("name");
            d.validates(presence("name"));
        })
        .unwrap();
        let outcome = class.call(Args::new()).unwrap();
        assert!(outcome.success());
        assert!(outcome.data().is_none());
    }

    #[test]
    fn undeclared_argument_is_raised() {
        let class = ServiceClass::define("Strict", |d| {
            d.input("a");
            d.perform(|_| Ok(Value::Null));
        })
        .unwrap();
        let err = class.call(args([("b", 1)])).unwrap_err();
        assert!(matches!(
            err,
            ServiceError::UndeclaredFieldWrite { ref name, ref class } if name == "b" && class == "Strict"
        ));
    }

    #[test]
    fn caller_cannot_inject_result_or_errors() {
        let class = ServiceClass::define("Age", |d| {
            d.typed_input("age", ValueType::Integer);
            d.perform(|_| Ok(Value::from("ran")));
        })
        .unwrap();

        for (key, value) in [
            ("result", Value::from("injected")),
            ("data", Value::from(5)),
            ("errors", Value::from(serde_json::json!({"x": ["forced"]}))),
            ("error_messages", Value::from(vec![Value::from("forced")])),
        ] {
            let input = args([("age", Value::from(1)), (key, value)]);
            let err = class.call(input).unwrap_err();
            assert!(matches!(
                err,
                ServiceError::UndeclaredFieldWrite { ref name, .. } if name == key
            ));
        }

        // the routine's return value still reaches data when nothing interferes
        let outcome = class.call(args([("age", 1)])).unwrap();
        assert_eq!(outcome.data(), Some(&Value::from("ran")));
    }

    #[test]
    fn undeclared_write_inside_routine_is_raised() {
        let class = ServiceClass::define("Sneaky", |d| {
            d.perform(|ctx| {
                ctx.set("secret", 1)?;
                Ok(Value::Null)
            });
        })
        .unwrap();
        let err = class.call(Args::new()).unwrap_err();
        assert!(matches!(err, ServiceError::UndeclaredFieldWrite { name, .. } if name == "secret"));
    }

    #[test]
    fn output_is_writable_without_being_an_input() {
        let class = ServiceClass::define("Produce", |d| {
            d.output("token");
            d.perform(|ctx| {
                ctx.set("token", "abc")?;
                Ok(Value::Null)
            });
        })
        .unwrap();
        let outcome = class.call(Args::new()).unwrap();
        assert_eq!(outcome.get("token"), Some(&Value::from("abc")));
    }

    #[test]
    fn unrestricted_class_accepts_any_key() {
        let class = ServiceClass::define("Loose", |d| {
            d.unrestrict();
            d.perform(|ctx| {
                ctx.set("anything", 1)?;
                Ok(Value::Null)
            });
        })
        .unwrap();
        let outcome = class.call(args([("extra", true)])).unwrap();
        assert_eq!(outcome.get("extra"), Some(&Value::Bool(true)));
        assert_eq!(outcome.get("anything"), Some(&Value::Int(1)));
    }

    #[test]
    fn routine_errors_are_raised_not_captured() {
        let class = ServiceClass::define("Broken", |d| {
            d.perform(|_| Err(anyhow::anyhow!("disk full")));
        })
        .unwrap();
        let err = class.call(Args::new()).unwrap_err();
        assert!(matches!(err, ServiceError::Routine { .. }));
    }

    #[test]
    fn domain_failure_from_logic_keeps_data() {
        let class = ServiceClass::define("Charge", |d| {
            d.perform(|ctx| {
                ctx.fail("base", "card declined");
                Ok(Value::from("attempted"))
            });
        })
        .unwrap();
        let outcome = class.call(Args::new()).unwrap();
        assert!(outcome.failure());
        assert_eq!(outcome.error_messages().unwrap(), ["card declined".to_string()]);
        assert_eq!(outcome.data(), Some(&Value::from("attempted")));
    }

    #[test]
    fn callbacks_wrap_logic_in_fixed_order() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let (a, b, c, d_log) = (log.clone(), log.clone(), log.clone(), log.clone());
        let class = ServiceClass::define("Ordered", move |d| {
            d.after(move |_| {
                a.lock().push("after");
                Ok(())
            });
            d.around(move |ctx, next| {
                b.lock().push("around-pre");
                next.run(ctx)?;
                b.lock().push("around-post");
                Ok(())
            });
            d.before(move |_| {
                c.lock().push("before");
                Ok(())
            });
            d.perform(move |_| {
                d_log.lock().push("logic");
                Ok(Value::Null)
            });
        })
        .unwrap();
        class.call(Args::new()).unwrap();
        assert_eq!(
            *log.lock(),
            vec!["before", "around-pre", "logic", "around-post", "after"]
        );
    }
}
