//! Script sandbox
//!
//! Script components and pre-render scripts run out of process. The
//! source file is swapped for a wrapper program (preamble + original
//! source + postamble), the sandbox executable runs it, and the original
//! bytes are put back on every exit path. The wrapper hands its result
//! back by writing a file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use smol::process::Command;
use smol::Timer;

use crate::component::ComponentDefinition;
use crate::config::SandboxConfig;
use crate::{BuildError, BuildResult};

/// Document used by pre-render scripts whose page does not exist yet
pub const DEFAULT_SKELETON: &str = "<!doctype html>\n<html lang=\"en\"><head><meta charset=\"utf-8\"><meta name=\"viewport\" content=\"width=device-width, initial-scale=1\"><title></title></head><body></body></html>";

/// Appended to the stderr of `.ts` scripts that fail to parse
pub const TYPESCRIPT_NOTE: &str =
    "note: .ts sources run as plain JavaScript; TypeScript-only syntax such as type annotations is not supported";

/// Runs wrapper programs in the sandbox subprocess
#[derive(Debug, Clone)]
pub struct SandboxRunner {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl SandboxRunner {
    pub fn new(config: &SandboxConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
        }
    }

    /// Execute a script component and return the markup it produced
    pub async fn render_component(
        &self,
        definition: &ComponentDefinition,
        original_markup: &str,
    ) -> BuildResult<String> {
        let output = tempfile::Builder::new()
            .prefix(".stitch-out-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| BuildError::io(std::env::temp_dir(), e))?
            .into_temp_path();

        let source = read_source(&definition.path).await?;
        let wrapper = component_wrapper(&source, original_markup, &definition.tag, &output);
        self.run_swapped(&definition.path, &wrapper).await?;

        let markup = smol::fs::read_to_string(&output)
            .await
            .map_err(|e| BuildError::io(output.to_path_buf(), e))?;
        if let Err(err) = output.close() {
            tracing::debug!("Could not remove sandbox output: {}", err);
        }
        Ok(markup)
    }

    /// Execute a pre-render script against `page` (created when missing)
    pub async fn prerender(&self, script: &Path, page: &Path) -> BuildResult<()> {
        let source = read_source(script).await?;
        let initial = match smol::fs::read_to_string(page).await {
            Ok(html) => html,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => DEFAULT_SKELETON.to_string(),
            Err(e) => return Err(BuildError::io(page, e)),
        };
        let wrapper = prerender_wrapper(&source, &initial, page);
        self.run_swapped(script, &wrapper).await
    }

    /// Swap `path` for `wrapper`, run it, and restore the original.
    ///
    /// A run failure is reported in preference to a restore failure.
    async fn run_swapped(&self, path: &Path, wrapper: &str) -> BuildResult<()> {
        let swap = SourceSwap::install(path, wrapper).await?;
        let result = self.run_program(path).await;
        let restored = swap.restore().await;
        match (result, restored) {
            (Err(err), Err(restore_err)) => {
                tracing::error!("{}", restore_err);
                Err(err)
            }
            (Err(err), Ok(())) | (Ok(()), Err(err)) => Err(err),
            (Ok(()), Ok(())) => Ok(()),
        }
    }

    /// Run the sandbox executable on `path` and wait for it to exit
    pub async fn run_program(&self, path: &Path) -> BuildResult<()> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Sandboxing {}", path.display());
        let child = command.spawn().map_err(|source| BuildError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let output = match self.timeout {
            None => child.output().await,
            Some(limit) => {
                let finished = async { Some(child.output().await) };
                let expired = async {
                    Timer::after(limit).await;
                    None
                };
                match smol::future::or(finished, expired).await {
                    Some(output) => output,
                    None => {
                        return Err(BuildError::ScriptTimeout {
                            path: path.to_path_buf(),
                            timeout: limit,
                        });
                    }
                }
            }
        }
        .map_err(|e| BuildError::io(path, e))?;

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            return Err(BuildError::ScriptExecution {
                path: path.to_path_buf(),
                status: output.status,
                stderr: annotate_stderr(path, stderr),
                stdout,
            });
        }
        for line in stderr.lines().chain(stdout.lines()) {
            tracing::debug!(target: "sandbox", "{}", line);
        }
        Ok(())
    }
}

fn annotate_stderr(path: &Path, mut stderr: String) -> String {
    let is_ts = path.extension().is_some_and(|ext| ext == "ts");
    if is_ts && stderr.contains("SyntaxError") {
        if !stderr.is_empty() && !stderr.ends_with('\n') {
            stderr.push('\n');
        }
        stderr.push_str(TYPESCRIPT_NOTE);
    }
    stderr
}

async fn read_source(path: &Path) -> BuildResult<String> {
    smol::fs::read_to_string(path)
        .await
        .map_err(|e| BuildError::io(path, e))
}

/// A source file temporarily replaced by a wrapper program.
///
/// `restore` puts the original back; dropping an unrestored swap does the
/// same synchronously, which covers early returns and panics.
#[derive(Debug)]
pub struct SourceSwap {
    path: PathBuf,
    original: Option<Vec<u8>>,
}

impl SourceSwap {
    /// Replace `path` with `wrapper`, remembering the original bytes
    pub async fn install(path: &Path, wrapper: &str) -> BuildResult<Self> {
        let original = smol::fs::read(path)
            .await
            .map_err(|e| BuildError::io(path, e))?;
        let swap = Self {
            path: path.to_path_buf(),
            original: Some(original),
        };
        smol::fs::write(path, wrapper)
            .await
            .map_err(|e| BuildError::io(path, e))?;
        Ok(swap)
    }

    /// Write the original bytes back
    pub async fn restore(mut self) -> BuildResult<()> {
        let Some(original) = self.original.take() else {
            return Ok(());
        };
        match smol::fs::write(&self.path, &original).await {
            Ok(()) => Ok(()),
            Err(e) => {
                // Leave it for Drop to retry
                self.original = Some(original);
                Err(BuildError::io(&self.path, e))
            }
        }
    }
}

impl Drop for SourceSwap {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            if let Err(err) = std::fs::write(&self.path, &original) {
                tracing::error!("Failed to restore {}: {}", self.path.display(), err);
            }
        }
    }
}

/// JavaScript string literal for `value`
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Wrapper for a script component.
///
/// The script sees its host element as `element`, rebuilt from the markup
/// the page author wrote; whatever `element.innerHTML` holds afterwards is
/// the rendered output.
pub fn component_wrapper(source: &str, original_markup: &str, tag: &str, output: &Path) -> String {
    format!(
        "const element = __componentElement({markup}, {tag});\n\
         {source}\n\
         ;__host.writeFile({output}, element.innerHTML);\n",
        markup = js_string(original_markup),
        tag = js_string(tag),
        output = js_string(&output.to_string_lossy()),
    )
}

/// Wrapper for a pre-render script; `document` starts as `initial_html`
pub fn prerender_wrapper(source: &str, initial_html: &str, page: &Path) -> String {
    format!(
        "__loadDocument({initial});\n\
         {source}\n\
         ;__host.writeFile({page}, \"<!doctype html>\\n\" + document.documentElement.outerHTML);\n",
        initial = js_string(initial_html),
        page = js_string(&page.to_string_lossy()),
    )
}
