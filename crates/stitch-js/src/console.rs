//! Console API
//!
//! console.log/info/warn/error/debug, forwarded to `tracing` so the host
//! process sees script output on the sandbox's stderr.

use std::fmt::Write;

use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};

#[derive(Debug, Clone, Copy)]
enum Level {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl Level {
    fn method(self) -> &'static str {
        match self {
            Level::Log => "log",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Debug => "debug",
        }
    }
}

/// Install console API into the global object
pub fn install_console(ctx: &Ctx<'_>) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;

    for level in [Level::Log, Level::Info, Level::Warn, Level::Error, Level::Debug] {
        let log = Function::new(ctx.clone(), move |args: Rest<Value>| {
            emit(level, &format_args_line(&args.0));
        })?;
        console.set(level.method(), log)?;
    }

    ctx.globals().set("console", console)?;
    Ok(())
}

fn emit(level: Level, line: &str) {
    match level {
        Level::Error => tracing::error!(target: "sandbox", "{}", line),
        Level::Warn => tracing::warn!(target: "sandbox", "{}", line),
        Level::Debug => tracing::debug!(target: "sandbox", "{}", line),
        Level::Log | Level::Info => tracing::info!(target: "sandbox", "{}", line),
    }
}

/// Join console arguments the way browsers print them
fn format_args_line(values: &[Value<'_>]) -> String {
    let mut output = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        format_value(&mut output, value);
    }
    output
}

/// Format a JavaScript value for logging
fn format_value(out: &mut String, value: &Value<'_>) {
    if value.is_undefined() {
        out.push_str("undefined");
    } else if value.is_null() {
        out.push_str("null");
    } else if let Some(b) = value.as_bool() {
        write!(out, "{}", b).ok();
    } else if let Some(n) = value.as_int() {
        write!(out, "{}", n).ok();
    } else if let Some(n) = value.as_float() {
        write!(out, "{}", n).ok();
    } else if let Some(s) = value.as_string() {
        out.push_str(&s.to_string().unwrap_or_default());
    } else if value.is_function() {
        out.push_str("[Function]");
    } else if value.is_error() {
        let message = value
            .as_object()
            .and_then(|o| o.get::<_, String>("message").ok())
            .unwrap_or_default();
        write!(out, "Error: {}", message).ok();
    } else {
        match value.ctx().json_stringify(value.clone()) {
            Ok(Some(json)) => out.push_str(&json.to_string().unwrap_or_default()),
            _ => out.push_str("[Object]"),
        }
    }
}
