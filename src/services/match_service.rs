//! Match lifecycle operations behind the `/matches` routes.

use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::{
    dto::{
        common::ResolutionView,
        game::{MatchSnapshot, StartMatchRequest, SubmitAnswerRequest, SubmitAnswerResponse},
    },
    error::ServiceError,
    match_engine::{
        driver::{MatchHandle, MatchSetup, spawn_match},
        opponent::RandomOpponent,
        session::Rejection,
    },
    state::SharedState,
};

/// First and last roster numbers used for generated opponent names.
const ROSTER: std::ops::RangeInclusive<u32> = 2..=20;

/// Pick a roster name such as `Player_007`.
pub fn roster_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("Player_{:03}", rng.random_range(ROSTER))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Start a match against the simulated opponent and return its first snapshot.
pub fn start_match(state: &SharedState, request: StartMatchRequest) -> MatchSnapshot {
    let config = state.config();
    let topic = non_blank(request.topic).unwrap_or_else(|| config.default_topic.clone());
    let opponent_name = non_blank(request.opponent_name)
        .or_else(|| config.default_opponent_name.clone())
        .unwrap_or_else(|| roster_name(&mut rand::rng()));

    let setup = MatchSetup {
        id: Uuid::new_v4(),
        player_name: request.player_name.trim().to_string(),
        opponent_name,
        topic,
        rules: config.rules,
        timing: config.timing,
    };
    info!(
        match_id = %setup.id,
        player = %setup.player_name,
        opponent = %setup.opponent_name,
        topic = %setup.topic,
        "starting match"
    );

    let handle = spawn_match(
        setup,
        Box::new(RandomOpponent::new(config.opponent)),
        state.questions(),
        state.matches().clone(),
    );
    handle.snapshot()
}

/// Look up a running (or recently finished) match.
pub fn find_match(state: &SharedState, match_id: Uuid) -> Result<MatchHandle, ServiceError> {
    state
        .matches()
        .get(&match_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| ServiceError::NotFound(format!("match {match_id}")))
}

/// Current snapshot of a match.
pub fn get_match(state: &SharedState, match_id: Uuid) -> Result<MatchSnapshot, ServiceError> {
    find_match(state, match_id).map(|handle| handle.snapshot())
}

/// Submit the player's answer.
///
/// Late or out-of-phase submissions are answered with `accepted = false`;
/// only an option that is not on screen is a client error.
pub async fn submit_answer(
    state: &SharedState,
    match_id: Uuid,
    request: SubmitAnswerRequest,
) -> Result<SubmitAnswerResponse, ServiceError> {
    let handle = find_match(state, match_id)?;
    let reply = handle.submit_answer(request.option).await?;
    let snapshot = handle.snapshot();

    match reply {
        Ok(resolution) => Ok(SubmitAnswerResponse {
            accepted: true,
            reason: None,
            resolution: Some(ResolutionView::from(&resolution)),
            snapshot,
        }),
        Err(rejection @ Rejection::UnknownOption(_)) => {
            Err(ServiceError::InvalidInput(rejection.to_string()))
        }
        Err(rejection) => Ok(SubmitAnswerResponse {
            accepted: false,
            reason: Some(rejection.to_string()),
            resolution: None,
            snapshot,
        }),
    }
}

/// Stop a match and cancel all of its pending round work.
pub async fn abandon_match(state: &SharedState, match_id: Uuid) -> Result<(), ServiceError> {
    let handle = find_match(state, match_id)?;
    handle.abandon().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{
        config::AppConfig,
        dto::phase::VisibleMatchPhase,
        services::question_service::QuestionProvider,
        state::AppState,
    };

    fn state() -> SharedState {
        AppState::new(AppConfig::default(), QuestionProvider::offline())
    }

    fn request(opponent_name: Option<&str>, topic: Option<&str>) -> StartMatchRequest {
        StartMatchRequest {
            player_name: "  Ada  ".into(),
            opponent_name: opponent_name.map(str::to_string),
            topic: topic.map(str::to_string),
        }
    }

    #[test]
    fn roster_names_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let name = roster_name(&mut rng);
            let number: u32 = name.trim_start_matches("Player_").parse().unwrap();
            assert_eq!(name.len(), "Player_000".len());
            assert!((2..=20).contains(&number));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn started_match_is_registered_with_defaults() {
        let state = state();
        let snapshot = start_match(&state, request(None, Some("  ")));

        assert_eq!(snapshot.topic, AppConfig::default().default_topic);
        assert_eq!(snapshot.player.name, "Ada");
        assert!(snapshot.opponent.name.starts_with("Player_"));
        assert_eq!(snapshot.player.health, 100);
        assert_eq!(
            get_match(&state, snapshot.match_id).unwrap().match_id,
            snapshot.match_id
        );
    }

    #[tokio::test(start_paused = true)]
    async fn submissions_report_acceptance() {
        let state = state();
        let snapshot = start_match(&state, request(Some("Rival"), Some("Geography")));
        assert_eq!(snapshot.opponent.name, "Rival");

        let handle = find_match(&state, snapshot.match_id).unwrap();
        handle
            .watch()
            .wait_for(|snapshot| snapshot.phase == VisibleMatchPhase::Active)
            .await
            .unwrap();

        let unknown = submit_answer(
            &state,
            snapshot.match_id,
            SubmitAnswerRequest {
                option: "Lyon".into(),
            },
        )
        .await;
        assert!(matches!(unknown, Err(ServiceError::InvalidInput(_))));

        let accepted = submit_answer(
            &state,
            snapshot.match_id,
            SubmitAnswerRequest {
                option: "Berlin".into(),
            },
        )
        .await
        .unwrap();
        assert!(accepted.accepted);
        assert_eq!(accepted.snapshot.phase, VisibleMatchPhase::Resolved);
        assert_eq!(accepted.snapshot.player.health, 90);

        let late = submit_answer(
            &state,
            snapshot.match_id,
            SubmitAnswerRequest {
                option: "Paris".into(),
            },
        )
        .await
        .unwrap();
        assert!(!late.accepted);
        assert!(late.reason.is_some());
        assert_eq!(late.snapshot.player.health, 90);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_matches_disappear() {
        let state = state();
        let snapshot = start_match(&state, request(None, None));

        abandon_match(&state, snapshot.match_id).await.unwrap();
        for _ in 0..10 {
            if state.matches().is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            get_match(&state, snapshot.match_id),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            abandon_match(&state, snapshot.match_id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
