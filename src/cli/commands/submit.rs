//! Submit command implementation
//!
//! Drives the asynchronous job orchestrator from the command line: the job
//! is submitted under a process id, its outcome is posted to the callback
//! URL, and the command polls until the task is done.

use crate::cli::commands::{
    exit_code_for, load_config_or_default, read_dataset, read_job, write_json,
};
use crate::core::jobs::{JobOrchestrator, TaskResult, TaskStatus};
use crate::domain::ProcessId;
use clap::Args;
use std::time::Duration;

/// Arguments for the submit command
#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// Job description (JSON)
    #[arg(short, long)]
    pub job: String,

    /// Dataset to anonymize (JSON)
    #[arg(short, long)]
    pub input: String,

    /// URL receiving the success or failure callback
    #[arg(long, env = "VEIL_CALLBACK_URL")]
    pub callback_url: String,

    /// Process id of the task (generated when absent)
    #[arg(long)]
    pub process_id: Option<String>,

    /// Also write the anonymized dataset to this path
    #[arg(short, long)]
    pub output: Option<String>,

    /// Interval between status checks
    #[arg(long, default_value = "200")]
    pub poll_interval_ms: u64,

    /// Time to stay alive after completion for callback delivery
    #[arg(long, default_value = "2000")]
    pub linger_ms: u64,
}

impl SubmitArgs {
    /// Execute the submit command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config_or_default(config_path) {
            Ok(config) => config,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let process_id = match &self.process_id {
            Some(id) => match ProcessId::new(id.as_str()) {
                Ok(id) => id,
                Err(e) => {
                    println!("❌ Invalid process id: {e}");
                    return Ok(2);
                }
            },
            None => ProcessId::generate(),
        };

        let (job, dataset) = match (read_job(&self.job), read_dataset(&self.input)) {
            (Ok(job), Ok(dataset)) => (job, dataset),
            (Err(e), _) | (_, Err(e)) => {
                println!("❌ {e:#}");
                return Ok(2);
            }
        };

        let orchestrator = JobOrchestrator::from_config(&config)?;
        let receipt = match orchestrator
            .submit(process_id.clone(), job, dataset, &self.callback_url)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                println!("❌ Job rejected [{}]", e.code());
                println!("   Error: {e}");
                return Ok(2);
            }
        };
        println!("📨 {}", receipt.message);

        let poll_interval = Duration::from_millis(self.poll_interval_ms.max(1));
        loop {
            match orchestrator.status(&process_id) {
                TaskStatus::Running => {}
                TaskStatus::Done => break,
                TaskStatus::NotFound => {
                    println!("❌ Task {process_id} disappeared before completion");
                    return Ok(5);
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!(process_id = %process_id, "Received SIGINT (Ctrl+C), cancelling task");
                    println!("\n⚠️  Shutdown signal received, cancelling task...");
                    orchestrator.cancel(&process_id);
                    return Ok(5);
                }
            }
        }

        let code = match orchestrator.result(&process_id) {
            TaskResult::Ready(dataset) => {
                println!("✅ Task {process_id} succeeded ({} records)", dataset.row_count());
                if let Some(path) = &self.output {
                    write_json(dataset.as_ref(), Some(path))?;
                    println!("   Dataset written to {path}");
                }
                0
            }
            TaskResult::Failed(e) => {
                println!("❌ Task {process_id} failed [{}]", e.code());
                println!("   Error: {e}");
                exit_code_for(&e)
            }
            TaskResult::StillRunning | TaskResult::NotFound => {
                println!("❌ Task {process_id} has no result");
                5
            }
        };

        println!("   Callback: {}", self.callback_url);
        tokio::time::sleep(Duration::from_millis(self.linger_ms)).await;
        Ok(code)
    }
}
