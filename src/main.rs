//! vetflow CLI
//!
//! ワークフロー定義（TOML）を読み込み、インメモリのサービスと
//! 標準入力で応答するオペレーターで実行します。
//!
//! ```text
//! vetflow check workflows/check_in.toml
//! vetflow run workflows/check_in.toml --patient Fido --settings vetflow.toml
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};

use vetflow::config::{EngineSettings, WorkflowDefinition};
use vetflow::engine::{TaskContext, TaskRegistry, WorkflowExecutor};
use vetflow::service::{
    ChannelOperator, InMemoryObjectService, ObjectService, OperatorResponse, PendingPrompt, Prompt,
    Services, TextDocumentService,
};

/// vetflow CLI
#[derive(Parser)]
#[command(name = "vetflow")]
#[command(about = "業務プロセスのワークフローを実行する", long_about = None)]
#[command(version)]
struct Cli {
    /// エンジン設定ファイル
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ワークフローを実行する
    Run {
        /// ワークフロー定義ファイル
        workflow: PathBuf,

        /// コンテキストに設定する患者名
        #[arg(long)]
        patient: Option<String>,

        /// 結果を JSON で出力する
        #[arg(long)]
        json: bool,
    },

    /// ワークフロー定義を検証する
    Check {
        /// ワークフロー定義ファイル
        workflow: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "実行に失敗しました");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let settings = match &cli.settings {
        Some(path) => EngineSettings::from_file(path)?,
        None => EngineSettings::default(),
    };
    let _guard = vetflow::logging::init(&settings.logging)?;

    let (operator, prompts) = ChannelOperator::channel(1);
    let objects = Arc::new(InMemoryObjectService::new());
    let services = Services::new(
        objects.clone(),
        Arc::new(TextDocumentService),
        Arc::new(operator),
    )
    .with_settings(settings);
    let registry = TaskRegistry::with_defaults();

    match cli.command {
        Commands::Check { workflow } => {
            let definition = WorkflowDefinition::from_file(&workflow)?;
            let built = registry.build(&definition, &services)?;
            println!(
                "{}: {} ステップ (break_on_skip={}, break_on_cancel={})",
                definition.name(),
                built.len(),
                definition.break_on_skip(),
                definition.break_on_cancel()
            );
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run {
            workflow,
            patient,
            json,
        } => {
            let definition = WorkflowDefinition::from_file(&workflow)?;
            let built = registry.build(&definition, &services)?;
            drop(services);

            let mut context = TaskContext::new();
            if let Some(name) = patient {
                let mut entity = objects.create("party.patientpet").await?;
                entity.set("name", name);
                context.set_patient(objects.save(&entity).await?)?;
            }

            let console = tokio::spawn(answer_from_stdin(prompts));
            let mut executor = WorkflowExecutor::new(built).with_context(context);
            let result = executor.execute().await?;
            drop(executor);
            console.abort();

            info!(workflow = %result.workflow_name, status = ?result.status, "ワークフローが終了しました");
            if json {
                println!("{}", result.to_json()?);
            } else {
                println!("{}: {:?} ({:?})", result.workflow_name, result.status, result.total_duration);
                for step in &result.steps {
                    match &step.error {
                        Some(e) => println!("  [{}] {}: {:?} - {e}", step.index, step.step_name, step.status),
                        None => println!("  [{}] {}: {:?}", step.index, step.step_name, step.status),
                    }
                }
            }

            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

/// 標準入力の 1 行をオペレーターの応答として返す
///
/// 空行または `o` は OK、`s` はスキップ、`c` はキャンセル、`r` はリトライ、
/// 数値は候補の選択。入力が閉じられたらキャンセル。
async fn answer_from_stdin(mut prompts: mpsc::Receiver<PendingPrompt>) {
    while let Some(pending) = prompts.recv().await {
        eprintln!("{}", describe(pending.prompt()));
        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).map(|read| (read, line))
        })
        .await;

        let response = match line {
            Ok(Ok((0, _))) | Ok(Err(_)) | Err(_) => OperatorResponse::Cancel,
            Ok(Ok((_, line))) => parse_response(line.trim()),
        };
        pending.respond(response);
    }
}

fn parse_response(input: &str) -> OperatorResponse {
    match input {
        "" | "o" | "ok" => OperatorResponse::Ok,
        "s" | "skip" => OperatorResponse::Skip,
        "r" | "retry" => OperatorResponse::Retry,
        other => match other.parse::<usize>() {
            Ok(index) => OperatorResponse::Selected(index),
            Err(_) => OperatorResponse::Cancel,
        },
    }
}

fn describe(prompt: &Prompt) -> String {
    match prompt {
        Prompt::Confirm { title, message, .. } => format!("[確認] {title}: {message} (o/s/c)"),
        Prompt::Edit { entity, .. } => format!("[編集] {} (o/s/c)", entity.kind()),
        Prompt::Select {
            kind, candidates, ..
        } => {
            let mut text = format!("[選択] {kind}");
            for (i, candidate) in candidates.iter().enumerate() {
                text.push_str(&format!("\n  {i}: {:?}", candidate.id()));
            }
            text
        }
        Prompt::Deliver {
            document, method, ..
        } => format!("[配信] {} を {method:?} (o/r/s/c)", document.name),
        Prompt::Retry { title, reason } => format!("[リトライ] {title}: {reason} (r/c)"),
    }
}
