use anyhow::{bail, Result};
use deskpilot::agent::{AgentLoop, RunStateManager, RunStatus};
use deskpilot::capture::PrimaryScreenCapturer;
use deskpilot::config::Config;
use deskpilot::host::NoopHost;
use deskpilot::input::EnigoDriver;
use deskpilot::llm::AnthropicPlanner;
use deskpilot::screen::PrimaryDisplayProbe;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let instructions = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if instructions.is_empty() {
        bail!("usage: deskpilot <task instructions>");
    }

    let config = Config::load().unwrap_or_default();
    let planner = AnthropicPlanner::new(
        config.resolve_api_key(),
        config.model.clone(),
        PrimaryDisplayProbe,
    );
    let driver = EnigoDriver::new()?;

    let state = RunStateManager::new();
    {
        // Ctrl-C requests a cooperative stop; the loop obeys at its next
        // checkpoint
        let stop = state.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("stop requested");
                stop.request_stop();
            }
        });
    }

    let mut agent = AgentLoop::new(
        state,
        planner,
        driver,
        PrimaryScreenCapturer,
        NoopHost,
        PrimaryDisplayProbe,
    );
    let final_state = agent.run(instructions).await;

    match final_state.status {
        RunStatus::Finished => {
            log::info!("run finished successfully");
            Ok(())
        }
        RunStatus::Failed => bail!(
            "run failed: {}",
            final_state.error.unwrap_or_else(|| "unknown error".to_string())
        ),
        RunStatus::Idle | RunStatus::Running => {
            log::info!("run stopped");
            Ok(())
        }
    }
}
