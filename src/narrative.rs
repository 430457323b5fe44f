use std::env;
use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::{MatchAnalysis, TeamReport};
use crate::http_client::http_client;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_TEMPERATURE: f64 = 0.3;
const DEFAULT_TIMEOUT_SECS: u64 = 45;

#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub timeout: Duration,
}

impl NarrativeConfig {
    pub fn from_env() -> Self {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let base_url = env::var("NARRATIVE_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = env::var("NARRATIVE_MODEL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let temperature = env::var("NARRATIVE_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(DEFAULT_TEMPERATURE)
            .clamp(0.0, 2.0);
        let timeout_secs = env::var("NARRATIVE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS)
            .clamp(5, 300);

        Self {
            api_key,
            base_url,
            model,
            temperature,
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

pub fn system_prompt() -> &'static str {
    "You are a senior football data analyst. You write sharp, factual betting \
     analysis grounded only in the numbers you are given."
}

pub fn build_prompt(analysis: &MatchAnalysis) -> String {
    let mut p = String::new();
    let _ = writeln!(
        p,
        "Write a direct analysis of the match below. No introduction, no filler."
    );
    let _ = writeln!(p);
    let _ = writeln!(p, "MATCH: {}", analysis.label());
    if let Some(comp) = analysis.competition.as_deref() {
        let _ = writeln!(p, "Competition: {comp}");
    }
    if let Some(kickoff) = analysis.kickoff.as_deref() {
        let _ = writeln!(p, "Kickoff: {kickoff}");
    }
    let _ = writeln!(p);
    let _ = writeln!(p, "TEAM INDICES (0-100):");
    write_team_line(&mut p, "Home", &analysis.home);
    write_team_line(&mut p, "Away", &analysis.away);
    let _ = writeln!(p);

    let o = &analysis.outcome;
    let _ = writeln!(
        p,
        "MODEL 1X2: home {}% / draw {}% / away {}%",
        o.home_win_pct, o.draw_pct, o.away_win_pct
    );
    let g = &analysis.goals;
    let _ = writeln!(
        p,
        "GOALS (Poisson): over 1.5 {}% / over 2.5 {}% / both teams score {}%",
        g.over1_5_pct, g.over2_5_pct, g.both_teams_score_pct
    );

    match analysis.value.as_ref() {
        Some(v) => {
            let _ = writeln!(
                p,
                "VALUE SIGNAL: {} at {:.2} (model {}%, edge {:.2})",
                v.outcome.label(),
                v.odd,
                v.model_pct,
                v.edge
            );
        }
        None => {
            let _ = writeln!(p, "VALUE SIGNAL: none");
        }
    }

    if let Some(h2h) = analysis.head_to_head.as_ref() {
        let _ = writeln!(
            p,
            "HEAD TO HEAD (last {}): {} {} wins, {} draws, {} {} wins, {:.2} goals per match",
            h2h.meetings.len(),
            analysis.home.name,
            h2h.home_side_wins,
            h2h.draws,
            analysis.away.name,
            h2h.away_side_wins,
            h2h.avg_goals
        );
    }

    let _ = writeln!(p);
    let _ = writeln!(p, "RECOMMENDED BETS:");
    for tier in &analysis.tiers {
        let _ = writeln!(
            p,
            "- {}: {} (odd {:.2}, model {}%)",
            tier.level.label(),
            tier.pick.label(),
            tier.odd,
            tier.model_pct
        );
    }

    let _ = writeln!(p);
    let _ = writeln!(p, "RULES:");
    let _ = writeln!(
        p,
        "1. Explain the dynamic using the indices and expected goals."
    );
    let _ = writeln!(
        p,
        "2. Justify each recommended bet (SAFE, MID, AGGRESSIVE) in one or two sentences."
    );
    let _ = writeln!(p, "3. Three paragraphs maximum. Be precise and numerical.");
    if analysis.any_estimated() {
        let _ = writeln!(
            p,
            "4. Some indices are ESTIMATES, not measured form. Say so and lower your confidence."
        );
    }
    p
}

fn write_team_line(p: &mut String, side: &str, team: &TeamReport) {
    let i = &team.indices;
    let form = team
        .snapshot
        .as_ref()
        .map(|s| s.form_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| "-".to_string());
    let _ = writeln!(
        p,
        "- {side} {}: attack {}, defense {}, momentum {}, xG {:.2}, form {}{}",
        team.name,
        i.attack,
        i.defense,
        i.momentum,
        i.expected_goals,
        form,
        if i.is_estimated { " [ESTIMATE]" } else { "" }
    );
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

pub fn generate_narrative(cfg: &NarrativeConfig, analysis: &MatchAnalysis) -> Result<String> {
    let Some(api_key) = cfg.api_key.as_deref() else {
        return Err(anyhow::anyhow!("OPENAI_API_KEY not set"));
    };
    let prompt = build_prompt(analysis);
    let body = ChatRequest {
        model: &cfg.model,
        temperature: cfg.temperature,
        messages: vec![
            ChatMessage {
                role: "system",
                content: system_prompt(),
            },
            ChatMessage {
                role: "user",
                content: &prompt,
            },
        ],
    };

    info!(model = %cfg.model, fixture = %analysis.key(), "requesting narrative");
    let resp = http_client()?
        .post(format!("{}/chat/completions", cfg.base_url))
        .bearer_auth(api_key)
        .timeout(cfg.timeout)
        .json(&body)
        .send()
        .context("narrative request failed")?;

    let status = resp.status();
    let text = resp.text().context("failed reading narrative body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("narrative http {status}: {text}"));
    }
    parse_chat_response(&text)
}

pub fn parse_chat_response(raw: &str) -> Result<String> {
    let response: ChatResponse =
        serde_json::from_str(raw).context("invalid chat completion json")?;
    response
        .choices
        .into_iter()
        .find_map(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow::anyhow!("chat completion returned no text"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{MatchRequest, analyze_match};

    #[test]
    fn prompt_flags_estimates() {
        let analysis = analyze_match(MatchRequest::manual("Real Madrid", "Manchester City"));
        let prompt = build_prompt(&analysis);
        assert!(prompt.contains("MATCH: Real Madrid vs Manchester City"));
        assert!(prompt.contains("[ESTIMATE]"));
        assert!(prompt.contains("ESTIMATES, not measured form"));
        assert!(prompt.contains("AGGRESSIVE"));
    }

    #[test]
    fn chat_response_text_is_extracted() {
        let raw = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"  Tight game.  "}}]}"#;
        assert_eq!(parse_chat_response(raw).unwrap(), "Tight game.");
    }

    #[test]
    fn empty_choices_is_an_error() {
        assert!(parse_chat_response(r#"{"choices":[]}"#).is_err());
        assert!(parse_chat_response(r#"{"choices":[{"message":{"content":null}}]}"#).is_err());
    }
}
