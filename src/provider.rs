use std::sync::mpsc::{Receiver, Sender};
use std::thread;

use tracing::{info, warn};

use crate::analysis::{MatchRequest, analyze_match};
use crate::api_football::{self, ApiFootballConfig, Fixture};
use crate::narrative::{self, NarrativeConfig};
use crate::state::{Delta, ProviderCommand};

/// Runs provider commands on a worker thread until the command channel closes.
pub fn spawn_provider(tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || {
        let api_cfg = ApiFootballConfig::from_env();
        let narrative_cfg = NarrativeConfig::from_env();

        if !api_cfg.is_configured() {
            let _ = tx.send(Delta::Log(
                "[WARN] API_FOOTBALL_KEY not set: only manual \"Home vs Away\" analysis (estimated stats)"
                    .to_string(),
            ));
        }
        if narrative_cfg.api_key.is_none() {
            let _ = tx.send(Delta::Log(
                "[INFO] OPENAI_API_KEY not set: narratives disabled".to_string(),
            ));
        }

        while let Ok(cmd) = cmd_rx.recv() {
            handle_command(cmd, &api_cfg, &narrative_cfg, &tx);
        }
        info!("provider channel closed");
    });
}

fn handle_command(
    cmd: ProviderCommand,
    api_cfg: &ApiFootballConfig,
    narrative_cfg: &NarrativeConfig,
    tx: &Sender<Delta>,
) {
    match cmd {
        ProviderCommand::SearchTeams { query } => {
            match api_football::search_teams(api_cfg, &query) {
                Ok(teams) => {
                    let _ = tx.send(Delta::SetTeams { query, teams });
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "team search failed");
                    let _ = tx.send(Delta::RequestFailed(format!("Team search error: {err:#}")));
                }
            }
        }
        ProviderCommand::FetchFixtures { team } => {
            match api_football::fetch_upcoming_fixtures(api_cfg, team.id) {
                Ok(fixtures) => {
                    let _ = tx.send(Delta::SetFixtures { team, fixtures });
                }
                Err(err) => {
                    warn!(team = team.id, error = %format!("{err:#}"), "fixtures fetch failed");
                    let _ = tx.send(Delta::RequestFailed(format!("Fixtures error: {err:#}")));
                }
            }
        }
        ProviderCommand::AnalyzeFixture { fixture } => analyze_fixture(api_cfg, &fixture, tx),
        ProviderCommand::AnalyzeManual { home, away } => {
            let analysis = analyze_match(MatchRequest::manual(home, away));
            let _ = tx.send(Delta::SetAnalysis(Box::new(analysis)));
        }
        ProviderCommand::GenerateNarrative { analysis } => {
            // The LLM is slow; keep the worker free for other commands.
            let cfg = narrative_cfg.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                let key = analysis.key();
                match narrative::generate_narrative(&cfg, &analysis) {
                    Ok(text) => {
                        let _ = tx.send(Delta::SetNarrative { key, text });
                    }
                    Err(err) => {
                        warn!(fixture = %key, error = %format!("{err:#}"), "narrative failed");
                        let _ = tx.send(Delta::NarrativeFailed {
                            key,
                            error: format!("{err:#}"),
                        });
                    }
                }
            });
        }
    }
}

fn analyze_fixture(cfg: &ApiFootballConfig, fixture: &Fixture, tx: &Sender<Delta>) {
    let data = api_football::load_fixture_data(cfg, fixture);
    for w in &data.warnings {
        let _ = tx.send(Delta::Log(format!("[WARN] {w}")));
    }
    let analysis = analyze_match(data.request);
    info!(
        fixture = fixture.id,
        estimated = analysis.any_estimated(),
        value = analysis.value.is_some(),
        "analysis ready"
    );
    let _ = tx.send(Delta::SetAnalysis(Box::new(analysis)));
}
