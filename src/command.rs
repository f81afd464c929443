use std::io::{Read as _, Write as _};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::config::LlmConfig;
use crate::llm::{InferenceRequest, InferenceService};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs an external program per call: the system message and prompt go to
/// stdin, stdout is the response. The program is killed after `timeout`.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    pub program: String,
    pub args: Vec<String>,
    pub model: String,
    pub timeout: Duration,
}

pub fn build(config: &LlmConfig) -> anyhow::Result<Box<dyn InferenceService>> {
    let Some(program) = config.command.as_deref() else {
        anyhow::bail!("missing llm.command (required when engine is `command`)");
    };
    Ok(Box::new(CommandEngine {
        program: program.to_owned(),
        args: config.command_args.clone(),
        model: config.model.clone(),
        timeout: Duration::from_secs(config.timeout_secs.max(1)),
    }))
}

impl InferenceService for CommandEngine {
    fn complete(&self, request: &InferenceRequest) -> anyhow::Result<String> {
        tracing::debug!(
            engine = "command",
            command = %self.program,
            schema = %request.schema_name,
            "inference call"
        );

        let schema = request
            .schema
            .as_ref()
            .map(|schema| schema.to_string())
            .unwrap_or_default();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("HIRING_AGENT_SCHEMA_NAME", &request.schema_name)
            .env("HIRING_AGENT_SCHEMA", schema)
            .env("HIRING_AGENT_MODEL", &self.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("spawn inference command: {}", self.program))?;

        // Both pipes are pumped on threads: programs may answer before they
        // have read all of their input.
        let mut stdin = child.stdin.take().context("open inference command stdin")?;
        let input = format!("{}\n\n{}", request.system, request.prompt);
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let mut stdout = child.stdout.take().context("open inference command stdout")?;
        let reader = thread::spawn(move || {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).map(|_| buf)
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            if let Some(status) = child.try_wait().context("wait inference command")? {
                break status;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                anyhow::bail!(
                    "inference command timed out after {}s: {}",
                    self.timeout.as_secs(),
                    self.program
                );
            }
            thread::sleep(POLL_INTERVAL);
        };

        let written = writer
            .join()
            .map_err(|_| anyhow::anyhow!("inference command stdin writer panicked"))?;
        let stdout = reader
            .join()
            .map_err(|_| anyhow::anyhow!("inference command stdout reader panicked"))?
            .context("read inference command stdout")?;

        if !status.success() {
            anyhow::bail!("inference command failed: {} ({status})", self.program);
        }
        // A program may exit without reading all of its input.
        if let Err(err) = written
            && err.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(err).context("write inference command stdin");
        }

        let stdout = String::from_utf8(stdout).context("inference command stdout is not valid UTF-8")?;
        if stdout.trim().is_empty() {
            anyhow::bail!("inference command produced no output");
        }
        Ok(stdout)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn pipes_prompt_through_program() -> anyhow::Result<()> {
        let engine = CommandEngine {
            program: "cat".to_owned(),
            args: Vec::new(),
            model: "local".to_owned(),
            timeout: Duration::from_secs(10),
        };
        let out = engine.complete(&InferenceRequest {
            system: "SYSTEM".to_owned(),
            prompt: "{\"a\": 1}".to_owned(),
            schema_name: "basics".to_owned(),
            schema: None,
        })?;
        assert_eq!(out, "SYSTEM\n\n{\"a\": 1}");
        Ok(())
    }

    #[test]
    fn failing_program_is_an_error() {
        let engine = CommandEngine {
            program: "false".to_owned(),
            args: Vec::new(),
            model: "local".to_owned(),
            timeout: Duration::from_secs(10),
        };
        let result = engine.complete(&InferenceRequest {
            system: String::new(),
            prompt: String::new(),
            schema_name: "basics".to_owned(),
            schema: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn large_prompts_stream_through() -> anyhow::Result<()> {
        let engine = CommandEngine {
            program: "cat".to_owned(),
            args: Vec::new(),
            model: "local".to_owned(),
            timeout: Duration::from_secs(10),
        };
        let prompt = "x".repeat(300 * 1024);
        let out = engine.complete(&InferenceRequest {
            system: "SYSTEM".to_owned(),
            prompt: prompt.clone(),
            schema_name: "work".to_owned(),
            schema: None,
        })?;
        assert_eq!(out.len(), "SYSTEM\n\n".len() + prompt.len());
        Ok(())
    }

    #[test]
    fn slow_program_is_killed_at_the_timeout() {
        let engine = CommandEngine {
            program: "sleep".to_owned(),
            args: vec!["30".to_owned()],
            model: "local".to_owned(),
            timeout: Duration::from_secs(1),
        };
        let started = Instant::now();
        let result = engine.complete(&InferenceRequest {
            system: String::new(),
            prompt: String::new(),
            schema_name: "basics".to_owned(),
            schema: None,
        });
        let err = result.err().map(|err| err.to_string()).unwrap_or_default();
        assert!(err.contains("timed out"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
