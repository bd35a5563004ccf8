use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use consultation_flow::{
    AuthSession, ConsultationFlow, ConsultationSession, ConsultationState, ExecutionStatus,
    FlowRunner, HttpApiClient, InMemorySessionStorage,
    auth::{self, AuthStore},
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

const NEW_COMMAND: &str = "/new";
const QUIT_COMMAND: &str = "/quit";

/// Reads answers line by line until `/quit` or end of input
pub async fn run(
    client: HttpApiClient,
    store: Arc<dyn AuthStore>,
    auth_session: AuthSession,
) -> Result<()> {
    let reset_delay = client.config().reset_delay;
    let flow = Arc::new(ConsultationFlow::new(Arc::new(client)));
    let runner = FlowRunner::new(flow, Arc::new(InMemorySessionStorage::new()), reset_delay);

    let session_id = runner.start(Some(auth_session.user.username.clone())).await?;
    info!(session_id = %session_id, username = %auth_session.user.username, "Chat started");
    println!("Escribe {NEW_COMMAND} para empezar de nuevo o {QUIT_COMMAND} para salir.\n");
    print_last_message(&runner.session(&session_id).await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            QUIT_COMMAND => break,
            NEW_COMMAND => {
                let session = runner.new_consultation(&session_id).await?;
                print_last_message(&session);
                continue;
            }
            _ => {}
        }

        let result = runner.submit(&session_id, &line).await?;
        match &result.status {
            ExecutionStatus::AuthRequired(reason) => {
                warn!(reason = %reason, "Service rejected the session");
                auth::logout(store.as_ref()).await?;
                bail!(
                    "{}",
                    result.response.unwrap_or_else(|| reason.to_string())
                );
            }
            ExecutionStatus::Busy => {
                println!("Todavía estoy procesando tu respuesta anterior.");
                continue;
            }
            _ => {}
        }

        if let Some(response) = &result.response {
            println!("\n{response}\n");
        }

        if result.status == ExecutionStatus::WaitingForInput
            && result.state == ConsultationState::AwaitingPlantSelection
        {
            print_recommendation(&runner.session(&session_id).await?);
        }

        if result.status == ExecutionStatus::Completed {
            // give the scheduled reset time to run before the next question
            tokio::time::sleep(reset_delay + Duration::from_millis(100)).await;
            print_last_message(&runner.session(&session_id).await?);
        }
    }

    info!(session_id = %session_id, "Chat finished");
    Ok(())
}

fn print_recommendation(session: &ConsultationSession) {
    let Some(recommendation) = &session.last_recommendation else {
        return;
    };

    if !recommendation.plants.is_empty() {
        println!("Plantas sugeridas:");
        for (i, plant) in recommendation.plants.iter().enumerate() {
            println!(
                "  {}. {} ({}) - {}",
                i + 1,
                plant.name,
                plant.effectiveness,
                plant.description
            );
        }
    }
    if !recommendation.confidences.is_empty() {
        println!("Confianza:");
        for entry in &recommendation.confidences {
            println!("  {:<24} {:>8.2}", entry.name, entry.confidence);
        }
    }
    if let Some(method) = &recommendation.recommended_method {
        println!("Método recomendado: {method}");
    }
    println!();
}

fn print_last_message(session: &ConsultationSession) {
    if let Some(entry) = session.last_message() {
        println!("{}\n", entry.content);
    }
}

async fn print_prompt() -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(b"> ").await?;
    stdout.flush().await?;
    Ok(())
}
