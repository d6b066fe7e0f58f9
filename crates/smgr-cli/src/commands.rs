//! Subcommand handlers.
//!
//! Each handler wires a fresh coordinator, one worker context and the
//! reference collaborators, issues a single request from the worker and
//! reports the settled outcome.

use anyhow::{Context, Result};
use smgr_runtime::components::{PendingPrompt, PromptAnswer, PromptQueue, UsageLedger};
use smgr_runtime::{
    ExecutionContext, MemoryPermissionStore, PersistentStoragePermission, Principal, SmgrConfig,
    StorageManager,
};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info};

/// Process exit code for a request that settled with a failure.
pub const EXIT_REQUEST_FAILED: i32 = 1;

/// Contexts and collaborators for one command.
struct Session {
    coordinator: ExecutionContext,
    worker: ExecutionContext,
    ledger: Arc<UsageLedger>,
    prompts: Arc<PromptQueue>,
    store: Arc<MemoryPermissionStore>,
    manager: StorageManager,
}

impl Session {
    fn new(config: &SmgrConfig) -> Self {
        let coordinator = ExecutionContext::spawn("coordinator");
        let worker = ExecutionContext::spawn("worker");
        let ledger = Arc::new(UsageLedger::from_config(
            coordinator.handle(),
            &config.accounting,
        ));
        let store = Arc::new(MemoryPermissionStore::new());
        let prompts = Arc::new(PromptQueue::with_store(Arc::clone(&store)));

        let manager = StorageManager::builder(
            coordinator.handle(),
            Arc::clone(&ledger) as _,
            Arc::clone(&prompts) as _,
        )
        .with_config(config)
        .with_store(Arc::clone(&store) as _)
        .build();

        debug!(
            coordinator = %coordinator.id(),
            worker = %worker.id(),
            enabled = config.enabled,
            "session ready"
        );

        Self {
            coordinator,
            worker,
            ledger,
            prompts,
            store,
            manager,
        }
    }

    async fn close(self) {
        self.worker.join().await;
        self.coordinator.join().await;
    }
}

/// Ledger seeding for `estimate`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateSeed {
    pub usage: Option<u64>,
    pub quota: Option<u64>,
    pub fail_code: Option<u32>,
}

/// Runs `estimate` and returns the process exit code.
pub async fn estimate(config: &SmgrConfig, principal: &str, seed: EstimateSeed) -> Result<i32> {
    let principal = parse_principal(principal)?;
    let session = Session::new(config);

    if let Some(usage) = seed.usage {
        session.ledger.set_usage(&principal, usage);
    }
    if let Some(quota) = seed.quota {
        session.ledger.set_quota(&principal, quota);
    }
    if let Some(code) = seed.fail_code {
        session.ledger.fail_with(&principal, code);
    }

    let manager = session.manager.clone();
    let completion = session
        .worker
        .handle()
        .invoke(move || manager.request_usage_estimate(principal))
        .await??;
    let request = completion.request_id();
    let outcome = completion
        .await
        .with_context(|| format!("request {request} was abandoned"))?;
    session.close().await;

    match outcome {
        Ok(estimate) => {
            info!(%request, usage = estimate.usage, quota = estimate.quota, "estimate settled");
            println!("usage={} quota={}", estimate.usage, estimate.quota);
            Ok(0)
        }
        Err(failure) => {
            info!(%request, code = failure.result_code(), "estimate failed");
            println!("error: {failure} (code {})", failure.result_code());
            Ok(EXIT_REQUEST_FAILED)
        }
    }
}

/// How `persist` answers a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answering {
    /// Ask on stdin.
    Interactive,
    /// Answer every prompt the same way.
    Fixed(PromptAnswer),
}

/// Runs `persist` and returns the process exit code.
pub async fn persist(
    config: &SmgrConfig,
    principal: &str,
    stored: Option<PersistentStoragePermission>,
    answering: Answering,
) -> Result<i32> {
    let principal = parse_principal(principal)?;
    let session = Session::new(config);

    if let Some(permission) = stored {
        session.store.set(&principal, permission);
    }

    let mut prompts = session.prompts.subscribe();
    let manager = session.manager.clone();
    let completion = session
        .worker
        .handle()
        .invoke(move || manager.request_persistent_storage(principal))
        .await??;
    let request = completion.request_id();

    tokio::pin!(completion);
    let outcome = loop {
        tokio::select! {
            outcome = &mut completion => break outcome,
            Some(prompt) = prompts.recv() => {
                let answer = match answering {
                    Answering::Fixed(answer) => answer,
                    Answering::Interactive => ask(&prompt).await?,
                };
                session.prompts.answer(&prompt.id, answer)?;
            }
        }
    };
    let outcome = outcome.with_context(|| format!("request {request} was abandoned"))?;
    session.close().await;

    match outcome {
        Ok(permission) => {
            info!(%request, %permission, "persist settled");
            println!("{permission}");
            Ok(0)
        }
        Err(failure) => {
            println!("error: {failure} (code {})", failure.result_code());
            Ok(EXIT_REQUEST_FAILED)
        }
    }
}

/// Prints the resolved configuration.
pub fn config(config: &SmgrConfig) -> Result<i32> {
    let toml = config
        .to_toml()
        .context("failed to serialize configuration")?;
    print!("{toml}");
    Ok(0)
}

fn parse_principal(input: &str) -> Result<Principal> {
    input
        .parse()
        .with_context(|| format!("invalid principal: {input}"))
}

/// Asks on stderr, reads one line from stdin.
async fn ask(prompt: &PendingPrompt) -> Result<PromptAnswer> {
    eprint!(
        "Allow {} to store data persistently? [y/n] ",
        prompt.principal
    );
    std::io::stderr().flush()?;

    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;

    Ok(parse_answer(&line))
}

/// `y`/`yes` allows, `n`/`no` denies, anything else dismisses.
fn parse_answer(line: &str) -> PromptAnswer {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => PromptAnswer::Allow,
        "n" | "no" => PromptAnswer::Deny,
        _ => PromptAnswer::Dismiss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_answer_variants() {
        assert_eq!(parse_answer("y\n"), PromptAnswer::Allow);
        assert_eq!(parse_answer(" YES "), PromptAnswer::Allow);
        assert_eq!(parse_answer("n"), PromptAnswer::Deny);
        assert_eq!(parse_answer("No\n"), PromptAnswer::Deny);
        assert_eq!(parse_answer(""), PromptAnswer::Dismiss);
        assert_eq!(parse_answer("\n"), PromptAnswer::Dismiss);
        assert_eq!(parse_answer("maybe"), PromptAnswer::Dismiss);
    }

    #[test]
    fn parse_principal_accepts_system_and_origins() {
        assert_eq!(parse_principal("system").unwrap(), Principal::System);
        assert!(parse_principal("https://example.com").is_ok());
        assert!(parse_principal("not a url").is_err());
    }

    #[tokio::test]
    async fn estimate_exit_codes() {
        let config = SmgrConfig::default();
        let ok = estimate(
            &config,
            "https://a.test",
            EstimateSeed {
                usage: Some(5),
                ..EstimateSeed::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(ok, 0);

        let failed = estimate(
            &config,
            "https://a.test",
            EstimateSeed {
                fail_code: Some(7),
                ..EstimateSeed::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(failed, EXIT_REQUEST_FAILED);
    }

    #[tokio::test]
    async fn disabled_manager_is_an_error() {
        let config = SmgrConfig {
            enabled: false,
            ..SmgrConfig::default()
        };
        let err = estimate(&config, "system", EstimateSeed::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn persist_with_fixed_answer() {
        let config = SmgrConfig::default();
        let code = persist(
            &config,
            "https://a.test",
            None,
            Answering::Fixed(PromptAnswer::Deny),
        )
        .await
        .unwrap();
        assert_eq!(code, 0);
    }
}
