use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use inbox_pilot::annotate::AnnotationPipeline;
use inbox_pilot::config::AppConfig;
use inbox_pilot::decision::FixedPolicy;
use inbox_pilot::ledger::ActivityLedger;
use inbox_pilot::oracle::create_oracle;
use inbox_pilot::pipeline::{IngestOutcome, IngestionGate, RawMessage};
use inbox_pilot::store::{LibSqlStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-... (or OPENAI_API_KEY with INBOX_PILOT_BACKEND=openai)");
        std::process::exit(1);
    });

    eprintln!("📬 Inbox Pilot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.oracle.model);
    eprintln!("   User: {}", config.user_id);
    eprintln!("   Automation: {}", config.automation_policy);
    eprintln!("   Database: {}", config.db_path);
    eprintln!("   Feed one JSON message per line on stdin. Ctrl-D to exit.\n");

    let oracle = create_oracle(&config.oracle)?;

    let store: Arc<dyn Store> = Arc::new(
        LibSqlStore::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );

    let ledger = Arc::new(ActivityLedger::new(store.clone()));
    let gate = IngestionGate::new(
        store,
        AnnotationPipeline::new(oracle, &config.annotation),
        Arc::new(FixedPolicy(config.automation_policy)),
        ledger,
    );

    // Resume anything a previous run left mid-annotation.
    let recovered = gate.recover_stuck(config.recovery_grace).await?;
    if recovered > 0 {
        eprintln!("   Recovered {recovered} message(s) from a previous run\n");
    }

    let stdin = tokio::io::stdin();
    let reader = BufReader::new(stdin);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let raw: RawMessage = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                eprintln!("Skipping unparseable line: {e}");
                continue;
            }
        };

        match gate.ingest(&config.user_id, raw).await {
            Ok(IngestOutcome::Created(processed)) => {
                let auto_send = processed.decision.should_auto_send(config.auto_send_threshold);
                let report = serde_json::json!({
                    "message_id": processed.message.id,
                    "external_id": processed.message.external_id,
                    "classification": processed.message.classification,
                    "priority_score": processed.message.priority_score,
                    "summary": processed.message.summary,
                    "decision": processed.decision,
                    "auto_send": auto_send,
                    "ledger_fault": processed.ledger_fault,
                });
                println!("{report}");
            }
            Ok(IngestOutcome::Duplicate { external_id }) => {
                println!("{}", serde_json::json!({ "duplicate": external_id }));
            }
            Err(e) => {
                eprintln!("Ingest failed: {e}");
            }
        }
    }

    Ok(())
}
