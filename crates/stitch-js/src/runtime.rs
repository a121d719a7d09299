//! Sandbox runtime
//!
//! One QuickJS runtime + context per program. The document the program
//! sees lives on the Rust side and is shared with the bindings.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use rquickjs::convert::Coerced;
use rquickjs::{CatchResultExt, CaughtError, Context, Ctx, Runtime};
use stitch_dom::Document;

use crate::{bindings, console, JsError, MEMORY_LIMIT};

/// Wrapper classes (`Node`, `Element`, `Document`) over the `__dom` handles
const PRELUDE: &str = include_str!("prelude.js");

/// QuickJS runtime with the sandbox globals installed
pub struct SandboxRuntime {
    runtime: Runtime,
    context: Context,
    document: Rc<RefCell<Document>>,
}

impl SandboxRuntime {
    /// Create a runtime whose `document` starts as an empty html/head/body skeleton
    pub fn new() -> Result<Self, JsError> {
        let runtime = Runtime::new()?;
        runtime.set_memory_limit(MEMORY_LIMIT);
        runtime.set_max_stack_size(1024 * 1024);

        let context = Context::full(&runtime)?;
        let document = Rc::new(RefCell::new(Document::new()));

        context.with(|ctx| {
            console::install_console(&ctx)?;
            bindings::install_dom(&ctx, document.clone())?;
            bindings::install_host(&ctx)?;
            Ok::<_, rquickjs::Error>(())
        })?;
        context.with(|ctx| eval_caught(&ctx, PRELUDE))?;

        Ok(Self { runtime, context, document })
    }

    /// Evaluate a program, then drain queued promise jobs
    pub fn eval(&self, source: &str) -> Result<(), JsError> {
        self.context.with(|ctx| eval_caught(&ctx, source))?;
        self.run_pending_jobs()
    }

    /// Evaluate an expression and convert the result to a string
    pub fn eval_string(&self, source: &str) -> Result<String, JsError> {
        self.context.with(|ctx| {
            ctx.eval::<Coerced<String>, _>(source)
                .catch(&ctx)
                .map(|s| s.0)
                .map_err(|err| JsError::Exception(describe(&err)))
        })
    }

    /// The document scripts have been mutating
    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    fn run_pending_jobs(&self) -> Result<(), JsError> {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => {}
                Ok(false) => return Ok(()),
                Err(err) => {
                    let message = err.0.with(|ctx| {
                        CaughtError::from_error(&ctx, rquickjs::Error::Exception).to_string()
                    });
                    return Err(JsError::Exception(message));
                }
            }
        }
    }
}

fn eval_caught(ctx: &Ctx<'_>, source: &str) -> Result<(), JsError> {
    ctx.eval::<(), _>(source)
        .catch(ctx)
        .map_err(|err| JsError::Exception(describe(&err)))
}

/// Render a caught error, naming parse failures as `SyntaxError`
fn describe(err: &CaughtError<'_>) -> String {
    let message = err.to_string();
    let name = match err {
        CaughtError::Exception(ex) => ex.as_object().get::<_, String>("name").ok(),
        _ => None,
    };
    match name {
        Some(name) if name == "SyntaxError" && !message.contains("SyntaxError") => {
            format!("SyntaxError: {message}")
        }
        _ => message,
    }
}
