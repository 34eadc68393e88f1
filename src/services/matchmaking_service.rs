//! Player registration and lobby matchmaking.

use std::time::SystemTime;

use tracing::info;

use crate::{
    dao::models::UserEntity,
    dto::{
        matchmaking::{JoinMatchmakingRequest, JoinMatchmakingResponse},
        user::{RegisterUserRequest, RegisterUserResponse},
        validation::validate_display_name,
    },
    error::ServiceError,
    state::SharedState,
};

/// Register a player under a trimmed display name.
pub async fn register_user(
    state: &SharedState,
    request: RegisterUserRequest,
) -> Result<RegisterUserResponse, ServiceError> {
    validate_display_name(&request.name)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let store = state.require_session_store().await?;
    let user = UserEntity::new(&request.name, SystemTime::now());
    store.create_user(user.clone()).await?;

    info!(user_id = %user.id, name = %user.name, "registered user");
    Ok(user.into())
}

/// Put a registered player into the oldest open lobby for the topic, or open one.
pub async fn join_matchmaking(
    state: &SharedState,
    request: JoinMatchmakingRequest,
) -> Result<JoinMatchmakingResponse, ServiceError> {
    let topic = request
        .topic
        .map(|topic| topic.trim().to_string())
        .filter(|topic| !topic.is_empty())
        .unwrap_or_else(|| state.config().default_topic.clone());

    let store = state.require_session_store().await?;
    let ticket = store
        .join_or_create_lobby(topic, request.user_id, state.config().matchmaking)
        .await?;

    info!(
        user_id = %request.user_id,
        match_id = %ticket.match_id,
        topic = %ticket.topic,
        created = ticket.created,
        "player joined matchmaking"
    );
    Ok(ticket.into())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use uuid::Uuid;

    use super::*;
    use crate::{
        config::{AppConfig, DEFAULT_TOPIC},
        dao::session_store::memory::MemorySessionStore,
        services::question_service::QuestionProvider,
        state::AppState,
    };

    async fn state_with_store() -> SharedState {
        let state = AppState::new(AppConfig::default(), QuestionProvider::offline());
        state
            .set_session_store(Some(Arc::new(MemorySessionStore::new())))
            .await;
        state
    }

    fn register(name: &str) -> RegisterUserRequest {
        RegisterUserRequest { name: name.into() }
    }

    #[tokio::test]
    async fn degraded_mode_refuses_registration() {
        let state = AppState::new(AppConfig::default(), QuestionProvider::offline());
        assert!(matches!(
            register_user(&state, register("Ada")).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn registration_trims_and_validates_names() {
        let state = state_with_store().await;

        let user = register_user(&state, register("  Grace  ")).await.unwrap();
        assert_eq!(user.name, "Grace");
        assert!(user.created_at.contains('T'));

        assert!(matches!(
            register_user(&state, register(" Al ")).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn players_of_one_topic_share_a_lobby() {
        let state = state_with_store().await;
        let ada = register_user(&state, register("Ada")).await.unwrap();
        let grace = register_user(&state, register("Grace")).await.unwrap();

        let first = join_matchmaking(
            &state,
            JoinMatchmakingRequest {
                user_id: ada.user_id,
                topic: None,
            },
        )
        .await
        .unwrap();
        let second = join_matchmaking(
            &state,
            JoinMatchmakingRequest {
                user_id: grace.user_id,
                topic: Some(format!(" {DEFAULT_TOPIC} ")),
            },
        )
        .await
        .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.match_id, second.match_id);
        assert_eq!(second.topic, DEFAULT_TOPIC);
        assert!(second.remaining_time_ms <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn unknown_users_are_not_found() {
        let state = state_with_store().await;
        let result = join_matchmaking(
            &state,
            JoinMatchmakingRequest {
                user_id: Uuid::new_v4(),
                topic: Some("Science".into()),
            },
        )
        .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
